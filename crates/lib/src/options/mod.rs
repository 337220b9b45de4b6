//! Build options.
//!
//! Raw inputs are merged with declared defaults and validated into a single
//! `BuildOptions` record (see `resolve`). The record is immutable once
//! resolved: preparatory steps that learn more (the ICU or UPX version, the
//! package info cache) return an updated copy instead of mutating it.

pub mod catalog;
pub mod defaults;
pub mod inputs;
pub mod resolve;

use std::path::PathBuf;

use serde::Serialize;

use crate::index::PackageInfoCache;

pub use catalog::VersionCatalog;
pub use defaults::{Declaration, Declarations, InputKind};
pub use inputs::{Chain, EnvInputs, FnInputs, Inputs, MapInputs};
pub use resolve::{OptionsError, OptionsResolver, is_flag_set};

/// Names of the declared inputs.
pub mod names {
  pub const AGDA_VERSION: &str = "agda-version";
  pub const GHC_VERSION: &str = "ghc-version";
  pub const GHC_VERSION_RANGE: &str = "ghc-version-range";
  pub const GHC_VERSION_MATCH_EXACT: &str = "ghc-version-match-exact";
  pub const CABAL_VERSION: &str = "cabal-version";
  pub const STACK_VERSION: &str = "stack-version";
  pub const BDIST_NAME: &str = "bdist-name";
  pub const BDIST_RETENTION_DAYS: &str = "bdist-retention-days";
  pub const EXTRA_INCLUDE_DIRS: &str = "extra-include-dirs";
  pub const EXTRA_LIB_DIRS: &str = "extra-lib-dirs";

  pub const ENABLE_STACK: &str = "enable-stack";
  pub const FORCE_BUILD: &str = "force-build";
  pub const FORCE_NO_BUILD: &str = "force-no-build";
  pub const BDIST_UPLOAD: &str = "bdist-upload";
  pub const BDIST_COMPRESS_EXE: &str = "bdist-compress-exe";
  pub const FORCE_NO_CLUSTER_COUNTING: &str = "force-no-cluster-counting";
  pub const FORCE_NO_OPTIMISE_HEAVILY: &str = "force-no-optimise-heavily";
  pub const FORCE_NO_EXECUTABLE_STATIC: &str = "force-no-executable-static";
  pub const FORCE_NO_SPLIT_SECTIONS: &str = "force-no-split-sections";

  /// Free-text options read into `BuildOptions`.
  pub const OPTIONS: &[&str] = &[
    AGDA_VERSION,
    GHC_VERSION,
    GHC_VERSION_RANGE,
    CABAL_VERSION,
    STACK_VERSION,
    BDIST_NAME,
    BDIST_RETENTION_DAYS,
    EXTRA_INCLUDE_DIRS,
    EXTRA_LIB_DIRS,
  ];

  /// Boolean flags. All but `ghc-version-match-exact` are read into `Flags`.
  pub const FLAGS: &[&str] = &[
    GHC_VERSION_MATCH_EXACT,
    ENABLE_STACK,
    FORCE_BUILD,
    FORCE_NO_BUILD,
    BDIST_UPLOAD,
    BDIST_COMPRESS_EXE,
    FORCE_NO_CLUSTER_COUNTING,
    FORCE_NO_OPTIMISE_HEAVILY,
    FORCE_NO_EXECUTABLE_STATIC,
    FORCE_NO_SPLIT_SECTIONS,
  ];
}

/// Resolved boolean flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Flags {
  pub enable_stack: bool,
  pub force_build: bool,
  pub force_no_build: bool,
  pub bdist_upload: bool,
  pub bdist_compress_exe: bool,
  pub force_no_cluster_counting: bool,
  pub force_no_optimise_heavily: bool,
  pub force_no_executable_static: bool,
  pub force_no_split_sections: bool,
}

impl Flags {
  /// Value of a flag by its declared name.
  pub fn get(&self, name: &str) -> Option<bool> {
    let value = match name {
      names::ENABLE_STACK => self.enable_stack,
      names::FORCE_BUILD => self.force_build,
      names::FORCE_NO_BUILD => self.force_no_build,
      names::BDIST_UPLOAD => self.bdist_upload,
      names::BDIST_COMPRESS_EXE => self.bdist_compress_exe,
      names::FORCE_NO_CLUSTER_COUNTING => self.force_no_cluster_counting,
      names::FORCE_NO_OPTIMISE_HEAVILY => self.force_no_optimise_heavily,
      names::FORCE_NO_EXECUTABLE_STATIC => self.force_no_executable_static,
      names::FORCE_NO_SPLIT_SECTIONS => self.force_no_split_sections,
      _ => return None,
    };
    Some(value)
  }
}

/// Fully resolved configuration of one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildOptions {
  /// Agda version to build.
  pub agda: String,
  /// GHC version to build with.
  pub ghc: String,
  /// Acceptable GHC versions, as written.
  pub ghc_version_range: String,
  pub cabal: String,
  pub stack: String,
  /// Whitespace-free name template; empty means the default template.
  pub bdist_name: String,
  pub bdist_retention_days: u32,
  pub extra_include_dirs: Vec<PathBuf>,
  pub extra_lib_dirs: Vec<PathBuf>,
  pub flags: Flags,

  /// ICU version linked against, once ICU has been set up.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub icu: Option<String>,
  /// UPX version used for compression, once UPX has been found.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub upx: Option<String>,
  /// Hackage status cache, once loaded.
  #[serde(skip)]
  pub package_info: Option<PackageInfoCache>,
}

impl BuildOptions {
  /// Record the ICU installation the build will link against.
  pub fn with_icu(mut self, version: impl Into<String>, include_dir: PathBuf, lib_dir: PathBuf) -> Self {
    self.icu = Some(version.into());
    if !self.extra_include_dirs.contains(&include_dir) {
      self.extra_include_dirs.push(include_dir);
    }
    if !self.extra_lib_dirs.contains(&lib_dir) {
      self.extra_lib_dirs.push(lib_dir);
    }
    self
  }

  /// Record the UPX version used to compress executables.
  pub fn with_upx(mut self, version: impl Into<String>) -> Self {
    self.upx = Some(version.into());
    self
  }

  pub fn with_package_info(mut self, cache: PackageInfoCache) -> Self {
    self.package_info = Some(cache);
    self
  }

  /// Turn cluster counting off, e.g. because ICU could not be set up.
  pub fn without_cluster_counting(mut self) -> Self {
    self.flags.force_no_cluster_counting = true;
    self
  }

  /// Name of the build tool in use.
  pub fn build_tool(&self) -> &'static str {
    if self.flags.enable_stack { "stack" } else { "cabal" }
  }
}

fn join_paths(paths: &[PathBuf]) -> String {
  paths
    .iter()
    .map(|p| p.to_string_lossy().into_owned())
    .collect::<Vec<_>>()
    .join("\n")
}

/// Resolved options answer lookups with their resolved values, so they can
/// be fed back through the resolver.
impl Inputs for BuildOptions {
  fn lookup(&self, name: &str) -> Option<String> {
    let value = match name {
      names::AGDA_VERSION => self.agda.clone(),
      names::GHC_VERSION => self.ghc.clone(),
      names::GHC_VERSION_RANGE => self.ghc_version_range.clone(),
      names::CABAL_VERSION => self.cabal.clone(),
      names::STACK_VERSION => self.stack.clone(),
      names::BDIST_NAME => self.bdist_name.clone(),
      names::BDIST_RETENTION_DAYS => self.bdist_retention_days.to_string(),
      names::EXTRA_INCLUDE_DIRS => join_paths(&self.extra_include_dirs),
      names::EXTRA_LIB_DIRS => join_paths(&self.extra_lib_dirs),
      other => return self.flags.get(other).map(|b| b.to_string()),
    };
    Some(value)
  }
}
