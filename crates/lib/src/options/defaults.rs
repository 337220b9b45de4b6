//! Declared options and flags with their defaults.
//!
//! The declarations are a YAML document read once at resolution time:
//!
//! ```yaml
//! inputs:
//!   agda-version:
//!     description: Version of Agda to build.
//!     default: latest
//!     required: true
//!   force-build:
//!     description: Always build from source.
//!     kind: flag
//!     default: "false"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Declarations bundled with the library.
const EMBEDDED_DECLARATIONS: &str = include_str!("../../data/options.yml");

/// Errors that can occur while loading declarations.
#[derive(Debug, Error)]
pub enum DeclarationError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse option declarations: {0}")]
  Parse(#[source] serde_yaml::Error),
}

/// Whether a declared input is free text or a boolean flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
  #[default]
  Option,
  Flag,
}

/// One declared input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub default: Option<String>,
  #[serde(default)]
  pub kind: InputKind,
  /// The resolved value must be non-empty.
  #[serde(default)]
  pub required: bool,
}

/// All declared inputs, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declarations {
  pub inputs: BTreeMap<String, Declaration>,
}

impl Declarations {
  pub fn from_yaml(content: &str) -> Result<Self, DeclarationError> {
    serde_yaml::from_str(content).map_err(DeclarationError::Parse)
  }

  pub fn load(path: &Path) -> Result<Self, DeclarationError> {
    let content = fs::read_to_string(path).map_err(|source| DeclarationError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_yaml(&content)
  }

  /// The declarations bundled with this release.
  pub fn embedded() -> Result<Self, DeclarationError> {
    Self::from_yaml(EMBEDDED_DECLARATIONS)
  }

  pub fn get(&self, name: &str) -> Option<&Declaration> {
    self.inputs.get(name)
  }

  /// Declared free-text options.
  pub fn options(&self) -> impl Iterator<Item = (&str, &Declaration)> {
    self.of_kind(InputKind::Option)
  }

  /// Declared boolean flags.
  pub fn flags(&self) -> impl Iterator<Item = (&str, &Declaration)> {
    self.of_kind(InputKind::Flag)
  }

  fn of_kind(&self, kind: InputKind) -> impl Iterator<Item = (&str, &Declaration)> {
    self
      .inputs
      .iter()
      .filter(move |(_, decl)| decl.kind == kind)
      .map(|(name, decl)| (name.as_str(), decl))
  }
}
