//! Assembling a self-contained distribution directory.
//!
//! ```text
//! dist/
//!   bin/agda, bin/agda-mode
//!   data/...
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::consts::{DATA_DIR_NAME, EXECUTABLES};
use crate::platform::os::Os;
use crate::util::fs::{copy_dir, make_executable};

/// Errors that can occur while assembling a distribution.
#[derive(Debug, Error)]
pub enum PackageError {
  #[error("build produced no executable at {0}")]
  MissingExecutable(PathBuf),

  #[error("data directory not found: {0}")]
  MissingDataDir(PathBuf),

  #[error("failed to copy {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("packaging task failed: {0}")]
  Task(String),
}

/// Executables of a distribution rooted at `dist_dir`.
pub fn executables(dist_dir: &Path, os: Os) -> Vec<PathBuf> {
  EXECUTABLES
    .iter()
    .map(|exe| dist_dir.join("bin").join(os.exe_name(exe)))
    .collect()
}

/// Copy the built executables from `bin_dir` and the data directory into a
/// fresh `dist_dir`. Returns the copied executables.
pub async fn assemble(bin_dir: &Path, data_dir: &Path, dist_dir: &Path, os: Os) -> Result<Vec<PathBuf>, PackageError> {
  let bin_dir = bin_dir.to_path_buf();
  let data_dir = data_dir.to_path_buf();
  let dist_dir = dist_dir.to_path_buf();
  tokio::task::spawn_blocking(move || assemble_blocking(&bin_dir, &data_dir, &dist_dir, os))
    .await
    .map_err(|e| PackageError::Task(e.to_string()))?
}

fn assemble_blocking(bin_dir: &Path, data_dir: &Path, dist_dir: &Path, os: Os) -> Result<Vec<PathBuf>, PackageError> {
  let io_error = |path: &Path| {
    let path = path.to_path_buf();
    move |source| PackageError::Io { path, source }
  };

  if !data_dir.is_dir() {
    return Err(PackageError::MissingDataDir(data_dir.to_path_buf()));
  }
  if dist_dir.exists() {
    fs::remove_dir_all(dist_dir).map_err(io_error(dist_dir))?;
  }
  let dist_bin = dist_dir.join("bin");
  fs::create_dir_all(&dist_bin).map_err(io_error(&dist_bin))?;

  let copied = executables(dist_dir, os);
  for dst in &copied {
    let Some(name) = dst.file_name() else { continue };
    let src = bin_dir.join(name);
    if !src.is_file() {
      return Err(PackageError::MissingExecutable(src));
    }
    fs::copy(&src, dst).map_err(io_error(&src))?;
    make_executable(dst).map_err(io_error(dst))?;
  }

  let dist_data = dist_dir.join(DATA_DIR_NAME);
  let files = copy_dir(data_dir, &dist_data).map_err(io_error(data_dir))?;

  info!(dist = ?dist_dir, executables = copied.len(), data_files = files, "assembled distribution");
  Ok(copied)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn fixture(temp: &TempDir) -> (PathBuf, PathBuf) {
    let bin = temp.path().join("build/bin");
    fs::create_dir_all(&bin).unwrap();
    for exe in EXECUTABLES {
      fs::write(bin.join(Os::Linux.exe_name(exe)), exe).unwrap();
    }
    let data = temp.path().join("source/src/data");
    fs::create_dir_all(data.join("lib/prim")).unwrap();
    fs::write(data.join("lib/prim/Agda.agda"), "module Agda where").unwrap();
    (bin, data)
  }

  #[tokio::test]
  async fn copies_executables_and_data() {
    let temp = TempDir::new().unwrap();
    let (bin, data) = fixture(&temp);
    let dist = temp.path().join("dist");

    let exes = assemble(&bin, &data, &dist, Os::Linux).await.unwrap();

    assert_eq!(exes, executables(&dist, Os::Linux));
    assert_eq!(fs::read_to_string(dist.join("bin/agda-mode")).unwrap(), "agda-mode");
    assert!(dist.join("data/lib/prim/Agda.agda").is_file());
  }

  #[tokio::test]
  async fn stale_distribution_is_replaced() {
    let temp = TempDir::new().unwrap();
    let (bin, data) = fixture(&temp);
    let dist = temp.path().join("dist");
    fs::create_dir_all(&dist).unwrap();
    fs::write(dist.join("leftover"), "").unwrap();

    assemble(&bin, &data, &dist, Os::Linux).await.unwrap();
    assert!(!dist.join("leftover").exists());
  }

  #[tokio::test]
  async fn missing_executable() {
    let temp = TempDir::new().unwrap();
    let (bin, data) = fixture(&temp);
    fs::remove_file(bin.join("agda-mode")).unwrap();

    let result = assemble(&bin, &data, &temp.path().join("dist"), Os::Linux).await;
    assert!(matches!(result, Err(PackageError::MissingExecutable(p)) if p.ends_with("agda-mode")));
  }

  #[test]
  fn windows_executables_carry_suffix() {
    let exes = executables(Path::new("dist"), Os::Windows);
    assert_eq!(exes[0], Path::new("dist").join("bin").join("agda.exe"));
  }
}
