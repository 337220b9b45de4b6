//! Known Agda releases and the toolchains that build them.
//!
//! Used to turn the symbolic versions `latest` and `recommended` into
//! concrete ones.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::HACKAGE_PACKAGE_NAME;
use crate::index::PackageInfoCache;
use crate::version::{Version, VersionRange};

/// Catalog bundled with the library.
const EMBEDDED_CATALOG: &str = include_str!("../../data/versions.yml");

/// Errors that can occur while loading the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse version catalog: {0}")]
  Parse(#[source] serde_yaml::Error),
}

/// Toolchains known to build one Agda release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgdaRelease {
  pub ghc: Vec<String>,
}

/// Supported versions of Agda and of the build tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCatalog {
  pub agda: BTreeMap<String, AgdaRelease>,
  #[serde(default)]
  pub cabal: Vec<String>,
  #[serde(default)]
  pub stack: Vec<String>,
}

/// Newest parseable version in `versions`.
fn newest<'a>(versions: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
  versions
    .into_iter()
    .filter_map(|v| Version::parse(v).ok().map(|parsed| (parsed, v)))
    .max_by(|(a, _), (b, _)| a.cmp(b))
    .map(|(_, v)| v)
}

impl VersionCatalog {
  pub fn from_yaml(content: &str) -> Result<Self, CatalogError> {
    serde_yaml::from_str(content).map_err(CatalogError::Parse)
  }

  pub fn load(path: &Path) -> Result<Self, CatalogError> {
    let content = fs::read_to_string(path).map_err(|source| CatalogError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_yaml(&content)
  }

  /// The catalog bundled with this release.
  pub fn embedded() -> Result<Self, CatalogError> {
    Self::from_yaml(EMBEDDED_CATALOG)
  }

  /// Whether `version` is a known Agda release.
  pub fn knows_agda(&self, version: &str) -> bool {
    self.agda.contains_key(version)
  }

  /// Newest Agda release that the package info cache does not deprecate.
  pub fn latest_agda(&self, info: Option<&PackageInfoCache>) -> Option<&str> {
    newest(self.agda.keys().map(String::as_str).filter(|v| {
      info.is_none_or(|cache| !cache.is_deprecated(&format!("{HACKAGE_PACKAGE_NAME}-{v}")))
    }))
  }

  /// GHC versions known to build `agda`.
  pub fn ghc_for(&self, agda: &str) -> &[String] {
    self.agda.get(agda).map(|r| r.ghc.as_slice()).unwrap_or_default()
  }

  /// Newest GHC known to build `agda` that lies in `range`.
  pub fn recommended_ghc(&self, agda: &str, range: &VersionRange) -> Option<&str> {
    newest(
      self
        .ghc_for(agda)
        .iter()
        .map(String::as_str)
        .filter(|ghc| range.matches(ghc)),
    )
  }

  pub fn latest_cabal(&self) -> Option<&str> {
    newest(self.cabal.iter().map(String::as_str))
  }

  pub fn latest_stack(&self) -> Option<&str> {
    newest(self.stack.iter().map(String::as_str))
  }
}
