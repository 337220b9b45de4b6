//! Resolution of raw inputs into `BuildOptions`.
//!
//! Options are trimmed and fall back to their declared default when absent or
//! empty. Flags are true unless their raw value is one of the falsy forms
//! (absent, empty, `false`); every other value, including `"0"`, is true.
//!
//! Validation is fail-fast: the first violated constraint aborts resolution
//! with a `OptionsError` describing it.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use super::catalog::VersionCatalog;
use super::defaults::Declarations;
use super::inputs::Inputs;
use super::names;
use super::{BuildOptions, Flags};
use crate::consts::{DEFAULT_BDIST_TEMPLATE, LATEST, NIGHTLY, RECOMMENDED};
use crate::index::PackageInfoCache;
use crate::template::{Template, TemplateError};
use crate::version::{Version, VersionError, VersionRange};

/// Configuration errors. Any of these aborts the run before pipeline work.
#[derive(Debug, Error)]
pub enum OptionsError {
  #[error("input '{0}' is not declared")]
  Undeclared(&'static str),

  #[error("input '{0}' is required but empty")]
  Missing(String),

  #[error("agda-version 'nightly' is not supported, pick a released version")]
  Nightly,

  #[error("ghc-version-match-exact is not supported, use ghc-version-range instead")]
  ExactMatchUnsupported,

  #[error("invalid ghc-version-range: {0}")]
  InvalidRange(#[source] VersionError),

  #[error("'{0}' and '{1}' cannot both be set")]
  ConflictingFlags(&'static str, &'static str),

  #[error("the default bdist-name template is invalid: {0}")]
  DefaultTemplate(#[source] TemplateError),

  #[error("invalid bdist-name template '{template}': {source}")]
  Template {
    template: String,
    #[source]
    source: TemplateError,
  },

  #[error("invalid {name} '{value}': {source}")]
  InvalidVersion {
    name: &'static str,
    value: String,
    #[source]
    source: VersionError,
  },

  #[error("unsupported agda-version '{0}'")]
  UnknownAgdaVersion(String),

  #[error("no known {0} version")]
  NoKnownVersion(&'static str),

  #[error("no GHC version known to build Agda {agda} satisfies '{range}'")]
  NoCompatibleGhc { agda: String, range: String },

  #[error("ghc-version '{ghc}' does not satisfy ghc-version-range '{range}'")]
  GhcOutOfRange { ghc: String, range: String },

  #[error("bdist-retention-days must be a positive integer, got '{0}'")]
  InvalidRetention(String),
}

/// Whether a raw flag value counts as set.
///
/// Only a missing value, the empty string and `false` are falsy.
pub fn is_flag_set(raw: Option<&str>) -> bool {
  !matches!(raw, None | Some("") | Some("false"))
}

/// Remove all whitespace from a template.
fn normalize_template(template: &str) -> String {
  template.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Split a directory list on newlines and the platform path separator.
fn parse_dirs(raw: &str) -> Vec<PathBuf> {
  raw
    .lines()
    .flat_map(|line| std::env::split_paths(line.trim()).collect::<Vec<_>>())
    .filter(|path| !path.as_os_str().is_empty())
    .collect()
}

/// Merges inputs with declared defaults and validates the result.
pub struct OptionsResolver<'a> {
  declarations: &'a Declarations,
  catalog: &'a VersionCatalog,
  package_info: Option<&'a PackageInfoCache>,
}

/// Raw values after merging with defaults.
struct Merged {
  options: BTreeMap<String, String>,
  flags: BTreeMap<String, bool>,
}

impl Merged {
  fn option(&self, name: &'static str) -> Result<&str, OptionsError> {
    self
      .options
      .get(name)
      .map(String::as_str)
      .ok_or(OptionsError::Undeclared(name))
  }

  /// A flag that may be left undeclared, counting as unset.
  fn optional_flag(&self, name: &str) -> bool {
    self.flags.get(name).copied().unwrap_or_default()
  }

  fn flag(&self, name: &'static str) -> Result<bool, OptionsError> {
    self.flags.get(name).copied().ok_or(OptionsError::Undeclared(name))
  }
}

impl<'a> OptionsResolver<'a> {
  pub fn new(declarations: &'a Declarations, catalog: &'a VersionCatalog) -> Self {
    Self {
      declarations,
      catalog,
      package_info: None,
    }
  }

  /// Consult a package info cache when picking the latest Agda release. The
  /// cache is attached to the resolved options for the pipeline.
  pub fn with_package_info(mut self, cache: &'a PackageInfoCache) -> Self {
    self.package_info = Some(cache);
    self
  }

  /// Resolve `inputs` into validated build options.
  pub fn resolve(&self, inputs: &impl Inputs) -> Result<BuildOptions, OptionsError> {
    let merged = self.merge(inputs)?;

    let agda_requested = merged.option(names::AGDA_VERSION)?;
    if agda_requested == NIGHTLY {
      return Err(OptionsError::Nightly);
    }

    if merged.optional_flag(names::GHC_VERSION_MATCH_EXACT) {
      return Err(OptionsError::ExactMatchUnsupported);
    }

    let range_raw = merged.option(names::GHC_VERSION_RANGE)?;
    let range = VersionRange::parse(range_raw).map_err(OptionsError::InvalidRange)?;

    let flags = Flags {
      enable_stack: merged.flag(names::ENABLE_STACK)?,
      force_build: merged.flag(names::FORCE_BUILD)?,
      force_no_build: merged.flag(names::FORCE_NO_BUILD)?,
      bdist_upload: merged.flag(names::BDIST_UPLOAD)?,
      bdist_compress_exe: merged.flag(names::BDIST_COMPRESS_EXE)?,
      force_no_cluster_counting: merged.flag(names::FORCE_NO_CLUSTER_COUNTING)?,
      force_no_optimise_heavily: merged.flag(names::FORCE_NO_OPTIMISE_HEAVILY)?,
      force_no_executable_static: merged.flag(names::FORCE_NO_EXECUTABLE_STATIC)?,
      force_no_split_sections: merged.flag(names::FORCE_NO_SPLIT_SECTIONS)?,
    };
    if flags.force_build && flags.force_no_build {
      return Err(OptionsError::ConflictingFlags(names::FORCE_BUILD, names::FORCE_NO_BUILD));
    }

    let bdist_name = resolve_template(merged.option(names::BDIST_NAME)?)?;

    let retention_raw = merged.option(names::BDIST_RETENTION_DAYS)?;
    let bdist_retention_days = retention_raw
      .parse::<u32>()
      .ok()
      .filter(|days| *days > 0)
      .ok_or_else(|| OptionsError::InvalidRetention(retention_raw.to_string()))?;

    let agda = self.resolve_agda(agda_requested)?;
    let ghc = self.resolve_ghc(&agda, merged.option(names::GHC_VERSION)?, &range)?;
    let cabal = resolve_tool(
      names::CABAL_VERSION,
      "cabal",
      merged.option(names::CABAL_VERSION)?,
      self.catalog.latest_cabal(),
    )?;
    let stack = resolve_tool(
      names::STACK_VERSION,
      "stack",
      merged.option(names::STACK_VERSION)?,
      self.catalog.latest_stack(),
    )?;

    let options = BuildOptions {
      agda,
      ghc,
      ghc_version_range: range.as_str().to_string(),
      cabal,
      stack,
      bdist_name,
      bdist_retention_days,
      extra_include_dirs: parse_dirs(merged.option(names::EXTRA_INCLUDE_DIRS)?),
      extra_lib_dirs: parse_dirs(merged.option(names::EXTRA_LIB_DIRS)?),
      flags,
      icu: None,
      upx: None,
      package_info: self.package_info.cloned(),
    };

    debug!(
      agda = %options.agda,
      ghc = %options.ghc,
      tool = options.build_tool(),
      "resolved build options"
    );

    Ok(options)
  }

  /// Merge every declared input with its default.
  fn merge(&self, inputs: &impl Inputs) -> Result<Merged, OptionsError> {
    let mut options = BTreeMap::new();
    for (name, decl) in self.declarations.options() {
      let value = inputs
        .lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| decl.default.as_ref().map(|d| d.trim().to_string()))
        .unwrap_or_default();

      if decl.required && value.is_empty() {
        return Err(OptionsError::Missing(name.to_string()));
      }
      options.insert(name.to_string(), value);
    }

    let mut flags = BTreeMap::new();
    for (name, decl) in self.declarations.flags() {
      let raw = inputs.lookup(name).or_else(|| decl.default.clone());
      flags.insert(name.to_string(), is_flag_set(raw.as_deref()));
    }

    Ok(Merged { options, flags })
  }

  fn resolve_agda(&self, requested: &str) -> Result<String, OptionsError> {
    if requested == LATEST {
      return self
        .catalog
        .latest_agda(self.package_info)
        .map(str::to_string)
        .ok_or(OptionsError::NoKnownVersion("agda"));
    }
    if !self.catalog.knows_agda(requested) {
      return Err(OptionsError::UnknownAgdaVersion(requested.to_string()));
    }
    Ok(requested.to_string())
  }

  fn resolve_ghc(&self, agda: &str, requested: &str, range: &VersionRange) -> Result<String, OptionsError> {
    if requested == RECOMMENDED || requested == LATEST {
      return self
        .catalog
        .recommended_ghc(agda, range)
        .map(str::to_string)
        .ok_or_else(|| OptionsError::NoCompatibleGhc {
          agda: agda.to_string(),
          range: range.to_string(),
        });
    }

    Version::parse(requested).map_err(|source| OptionsError::InvalidVersion {
      name: names::GHC_VERSION,
      value: requested.to_string(),
      source,
    })?;
    if !range.matches(requested) {
      return Err(OptionsError::GhcOutOfRange {
        ghc: requested.to_string(),
        range: range.to_string(),
      });
    }
    if !self.catalog.ghc_for(agda).iter().any(|known| known == requested) {
      debug!(agda = %agda, ghc = %requested, "GHC version is not known to build this Agda release");
    }
    Ok(requested.to_string())
  }
}

fn resolve_tool(
  name: &'static str,
  tool: &'static str,
  requested: &str,
  latest: Option<&str>,
) -> Result<String, OptionsError> {
  if requested == LATEST {
    return latest.map(str::to_string).ok_or(OptionsError::NoKnownVersion(tool));
  }
  Version::parse(requested).map_err(|source| OptionsError::InvalidVersion {
    name,
    value: requested.to_string(),
    source,
  })?;
  Ok(requested.to_string())
}

/// Validate the name template. An empty template stands for the default one,
/// which is itself checked so that a broken default surfaces here.
fn resolve_template(raw: &str) -> Result<String, OptionsError> {
  if raw.is_empty() {
    Template::parse(DEFAULT_BDIST_TEMPLATE).map_err(OptionsError::DefaultTemplate)?;
    return Ok(String::new());
  }
  let template = normalize_template(raw);
  Template::parse(&template).map_err(|source| OptionsError::Template {
    template: template.clone(),
    source,
  })?;
  Ok(template)
}
