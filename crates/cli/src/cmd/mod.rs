//! Subcommand implementations and the configuration they share.

mod build;
mod info;
mod name;
mod options;
mod probe;

pub use build::cmd_build;
pub use info::cmd_info;
pub use name::cmd_name;
pub use options::cmd_options;
pub use probe::cmd_probe;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::debug;

use agdist_lib::context::Context;
use agdist_lib::index::{PackageIndex, PackageInfoCache};
use agdist_lib::options::{BuildOptions, Chain, Declarations, EnvInputs, MapInputs, OptionsResolver, VersionCatalog};

/// Where inputs and static metadata come from.
#[derive(Debug, Args)]
pub struct ConfigArgs {
  /// Set an input, e.g. `--input agda-version=2.6.4` (repeatable, overrides INPUT_* variables)
  #[arg(short, long = "input", value_name = "NAME=VALUE", global = true, value_parser = MapInputs::parse_pair)]
  pub inputs: Vec<(String, String)>,

  /// Package index mapping distribution names to download URLs
  #[arg(long, value_name = "PATH", global = true)]
  pub index: Option<PathBuf>,

  /// Input declarations with their defaults
  #[arg(long, value_name = "PATH", global = true)]
  pub options_file: Option<PathBuf>,

  /// Catalog of known Agda and toolchain versions
  #[arg(long, value_name = "PATH", global = true)]
  pub versions_file: Option<PathBuf>,

  /// Hackage package status cache
  #[arg(long, value_name = "PATH", global = true)]
  pub package_info: Option<PathBuf>,
}

/// Everything loaded once per invocation.
pub struct Session {
  pub declarations: Declarations,
  pub catalog: VersionCatalog,
  pub package_info: PackageInfoCache,
  pub context: Context,
  inputs: MapInputs,
}

impl ConfigArgs {
  /// Load the static metadata and detect the running system.
  pub fn load(&self) -> Result<Session> {
    let declarations = match &self.options_file {
      Some(path) => Declarations::load(path).with_context(|| format!("Failed to load {}", path.display()))?,
      None => Declarations::embedded().context("Failed to load embedded input declarations")?,
    };
    let catalog = match &self.versions_file {
      Some(path) => VersionCatalog::load(path).with_context(|| format!("Failed to load {}", path.display()))?,
      None => VersionCatalog::embedded().context("Failed to load embedded version catalog")?,
    };
    let package_info = match &self.package_info {
      Some(path) => PackageInfoCache::load(path).with_context(|| format!("Failed to load {}", path.display()))?,
      None => PackageInfoCache::embedded().context("Failed to load embedded package info")?,
    };
    let index = match &self.index {
      Some(path) => PackageIndex::load(path).with_context(|| format!("Failed to load {}", path.display()))?,
      None => PackageIndex::embedded().context("Failed to load embedded package index")?,
    };
    debug!(entries = index.len(), "package index loaded");

    let context = Context::detect(index).context("Failed to detect platform")?;
    let inputs = self.inputs.iter().cloned().collect();

    Ok(Session {
      declarations,
      catalog,
      package_info,
      context,
      inputs,
    })
  }
}

impl Session {
  /// Resolve explicit inputs, falling back to `INPUT_*` environment variables.
  pub fn resolve(&self) -> Result<BuildOptions> {
    let inputs = Chain::new().then(&self.inputs).then(EnvInputs::new());
    OptionsResolver::new(&self.declarations, &self.catalog)
      .with_package_info(&self.package_info)
      .resolve(&inputs)
      .context("Invalid inputs")
  }
}
