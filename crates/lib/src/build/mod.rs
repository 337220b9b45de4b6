//! Building Agda from source.
//!
//! The build itself belongs to the external build tools; this module only
//! decides how to invoke them. [`BuildStep`] is the seam the pipeline calls,
//! [`ExternalBuild`] the implementation that runs Cabal or Stack.

pub mod driver;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::compat::Features;
use crate::context::Context;
use crate::exec::{ExecError, Executor};
use crate::options::BuildOptions;

pub use driver::BuildDriver;

/// Errors that can occur while building from source.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error("source directory not found: {0}")]
  MissingSource(PathBuf),

  #[error("failed to create {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("{tool} failed: {source}")]
  Tool {
    tool: &'static str,
    #[source]
    source: ExecError,
  },
}

/// Builds the executables of `options` from `source` into `bin_dir`.
#[async_trait]
pub trait BuildStep: Send + Sync {
  async fn build(&self, options: &BuildOptions, ctx: &Context, source: &Path, bin_dir: &Path)
  -> Result<(), BuildError>;
}

/// Builds by running Cabal or Stack.
pub struct ExternalBuild {
  executor: Arc<dyn Executor>,
}

impl ExternalBuild {
  pub fn new(executor: Arc<dyn Executor>) -> Self {
    Self { executor }
  }
}

#[async_trait]
impl BuildStep for ExternalBuild {
  async fn build(
    &self,
    options: &BuildOptions,
    ctx: &Context,
    source: &Path,
    bin_dir: &Path,
  ) -> Result<(), BuildError> {
    if !source.is_dir() {
      return Err(BuildError::MissingSource(source.to_path_buf()));
    }
    tokio::fs::create_dir_all(bin_dir).await.map_err(|source| BuildError::Io {
      path: bin_dir.to_path_buf(),
      source,
    })?;

    let driver = BuildDriver::for_options(options);
    let features = Features::evaluate(options, ctx);
    info!(
      tool = driver.program(),
      agda = %options.agda,
      ghc = %options.ghc,
      cluster_counting = features.cluster_counting,
      optimise_heavily = features.optimise_heavily,
      "building from source"
    );

    let tool_error = |source| BuildError::Tool {
      tool: driver.program(),
      source,
    };

    let build = driver.build_cmd(options, &features, source, bin_dir);
    self.executor.run(&build).await.map_err(tool_error)?;

    if let Some(install) = driver.install_cmd(options, &features, source, bin_dir) {
      self.executor.run(&install).await.map_err(tool_error)?;
    }

    info!(bin_dir = ?bin_dir, "build finished");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::exec::Output;
  use crate::index::PackageIndex;
  use crate::options::Flags;
  use crate::platform::Platform;
  use crate::platform::arch::Arch;
  use crate::platform::os::Os;
  use crate::util::testutil::RecordingExecutor;

  fn options(enable_stack: bool) -> BuildOptions {
    BuildOptions {
      agda: "2.6.4".to_string(),
      ghc: "9.4.7".to_string(),
      ghc_version_range: "*".to_string(),
      cabal: "3.10.3.0".to_string(),
      stack: "2.15.7".to_string(),
      bdist_name: String::new(),
      bdist_retention_days: 8,
      extra_include_dirs: Vec::new(),
      extra_lib_dirs: Vec::new(),
      flags: Flags {
        enable_stack,
        ..Flags::default()
      },
      icu: None,
      upx: None,
      package_info: None,
    }
  }

  fn context() -> Context {
    Context::new(Platform::new(Arch::X86_64, Os::Linux), "22.04", PackageIndex::default())
  }

  #[tokio::test]
  async fn cabal_builds_then_installs() {
    let source = tempfile::TempDir::new().unwrap();
    let bin = source.path().join("bin");
    let executor = Arc::new(RecordingExecutor::succeeding());

    ExternalBuild::new(executor.clone())
      .build(&options(false), &context(), source.path(), &bin)
      .await
      .unwrap();

    let calls = executor.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].args[0], "build");
    assert_eq!(calls[1].args[0], "install");
    assert!(bin.is_dir());
  }

  #[tokio::test]
  async fn stack_builds_once() {
    let source = tempfile::TempDir::new().unwrap();
    let executor = Arc::new(RecordingExecutor::succeeding());

    ExternalBuild::new(executor.clone())
      .build(&options(true), &context(), source.path(), &source.path().join("bin"))
      .await
      .unwrap();

    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].program, "stack");
  }

  #[tokio::test]
  async fn failed_build_skips_install() {
    let source = tempfile::TempDir::new().unwrap();
    let executor = Arc::new(RecordingExecutor::new(|_| Output {
      code: Some(1),
      ..Output::default()
    }));

    let result = ExternalBuild::new(executor.clone())
      .build(&options(false), &context(), source.path(), &source.path().join("bin"))
      .await;

    assert!(matches!(result, Err(BuildError::Tool { tool: "cabal", .. })));
    assert_eq!(executor.calls().len(), 1);
  }

  #[tokio::test]
  async fn missing_source_directory() {
    let executor = Arc::new(RecordingExecutor::succeeding());
    let result = ExternalBuild::new(executor)
      .build(&options(false), &context(), Path::new("/nonexistent/agda"), Path::new("/tmp/bin"))
      .await;
    assert!(matches!(result, Err(BuildError::MissingSource(_))));
  }
}
