//! Smoke test of an assembled distribution.
//!
//! Runs `agda --version` against the distribution's own data directory and
//! type-checks a tiny module. A failure means the distribution is broken and
//! must not be published.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::consts::{DATA_DIR_ENV, DATA_DIR_NAME, PACKAGE_NAME};
use crate::exec::{Cmd, ExecError, Executor};
use crate::platform::os::Os;
use crate::version;

/// Ways a distribution can fail its smoke test.
#[derive(Debug, Error)]
pub enum VerifyError {
  #[error("executable not found: {0}")]
  MissingExecutable(PathBuf),

  #[error("{step} failed: {source}")]
  Exec {
    step: &'static str,
    #[source]
    source: ExecError,
  },

  #[error("expected Agda {expected}, executable reports '{reported}'")]
  VersionMismatch { expected: String, reported: String },

  #[error("failed to write test module: {0}")]
  Io(#[source] std::io::Error),
}

const TEST_MODULE: &str = "module Test where\n\ndata Unit : Set where\n  unit : Unit\n";

/// Version from `agda --version` output such as `Agda version 2.6.4-abc1234`.
pub fn reported_version(output: &str) -> Option<&str> {
  let token = output.lines().next()?.split_whitespace().last()?;
  token.split('-').next()
}

/// Smoke-test the distribution at `dist_dir`, which must contain Agda
/// `expected`.
pub async fn verify(executor: &dyn Executor, dist_dir: &Path, expected: &str, os: Os) -> Result<(), VerifyError> {
  let agda = dist_dir.join("bin").join(os.exe_name(PACKAGE_NAME));
  if !agda.is_file() {
    return Err(VerifyError::MissingExecutable(agda));
  }
  let data_dir = dist_dir.join(DATA_DIR_NAME);
  let command = |scratch: Option<&Path>| {
    let cmd = Cmd::new(agda.to_string_lossy()).env(DATA_DIR_ENV, data_dir.to_string_lossy());
    match scratch {
      Some(dir) => cmd.cwd(dir),
      None => cmd,
    }
  };

  let output = executor
    .run(&command(None).arg("--version"))
    .await
    .map_err(|source| VerifyError::Exec {
      step: "agda --version",
      source,
    })?;
  let reported = reported_version(&output).unwrap_or_default();
  if !version::eq(reported, expected) {
    return Err(VerifyError::VersionMismatch {
      expected: expected.to_string(),
      reported: output,
    });
  }

  let scratch = tempfile::TempDir::new().map_err(VerifyError::Io)?;
  tokio::fs::write(scratch.path().join("Test.agda"), TEST_MODULE)
    .await
    .map_err(VerifyError::Io)?;
  executor
    .run(&command(Some(scratch.path())).arg("Test.agda"))
    .await
    .map_err(|source| VerifyError::Exec {
      step: "type-checking Test.agda",
      source,
    })?;

  info!(dist = ?dist_dir, version = %expected, "distribution verified");
  Ok(())
}
