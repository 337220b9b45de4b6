//! Publishing a distribution as a named artifact.
//!
//! The storage service is a collaborator behind [`ArtifactStore`]; its
//! contract is `upload(name, files, base_dir, options) -> UploadResult`.
//! Files that fail to upload are reported in the result rather than as an
//! error. [`LocalStore`] is the implementation used by the CLI.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::util::fs::list_files;
use crate::util::hash::hash_file;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Name of the manifest written next to the stored files.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Errors that prevent an upload from starting or completing at all.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("failed to list {path}: {source}")]
  List {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("I/O error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write manifest: {0}")]
  Manifest(#[from] serde_json::Error),

  #[error("invalid artifact name '{0}': must be a single path component")]
  InvalidName(String),

  #[error("storage task failed: {0}")]
  Task(String),
}

/// Accept only names that stay a single directory below the store root.
pub fn check_artifact_name(name: &str) -> Result<(), StoreError> {
  let mut components = Path::new(name).components();
  match (components.next(), components.next()) {
    (Some(Component::Normal(part)), None) if part == OsStr::new(name) => Ok(()),
    _ => Err(StoreError::InvalidName(name.to_string())),
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
  pub retention_days: u32,
}

/// Outcome of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
  pub artifact_name: String,
  /// Files that could not be uploaded, relative to the base directory.
  pub failed_items: Vec<String>,
}

/// Storage for named artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
  async fn upload(
    &self,
    name: &str,
    files: &[PathBuf],
    base_dir: &Path,
    options: UploadOptions,
  ) -> Result<UploadResult, StoreError>;
}

/// Upload every regular file below `dist_dir` as artifact `name`.
pub async fn publish(
  store: &dyn ArtifactStore,
  name: &str,
  dist_dir: &Path,
  options: UploadOptions,
) -> Result<UploadResult, StoreError> {
  let files = list_files(dist_dir).map_err(|source| StoreError::List {
    path: dist_dir.to_path_buf(),
    source,
  })?;
  info!(artifact = %name, files = files.len(), "publishing");

  let result = store.upload(name, &files, dist_dir, options).await?;
  if !result.failed_items.is_empty() {
    warn!(artifact = %result.artifact_name, failed = ?result.failed_items, "some files were not uploaded");
  }
  Ok(result)
}

/// One stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
  pub path: String,
  pub sha256: String,
  pub size: u64,
}

/// Record of a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
  pub name: String,
  /// Unix timestamp of the upload.
  pub created: u64,
  /// Unix timestamp after which the artifact may be deleted.
  pub expires: u64,
  pub files: Vec<ManifestEntry>,
}

/// Stores artifacts as directories under a root, one per artifact name.
#[derive(Debug, Clone)]
pub struct LocalStore {
  root: PathBuf,
}

impl LocalStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Store under the default artifacts directory.
  pub fn default_location() -> Self {
    Self::new(crate::platform::paths::artifacts_dir())
  }

  pub fn artifact_dir(&self, name: &str) -> PathBuf {
    self.root.join(name)
  }

  /// Read back the manifest of a stored artifact.
  pub fn manifest(&self, name: &str) -> Result<Manifest, StoreError> {
    check_artifact_name(name)?;
    let path = self.artifact_dir(name).join(MANIFEST_FILE);
    let content = std::fs::read_to_string(&path).map_err(|source| StoreError::Io { path, source })?;
    Ok(serde_json::from_str(&content)?)
  }

  fn store_file(file: &Path, base_dir: &Path, target_dir: &Path) -> Result<ManifestEntry, String> {
    let rel = file
      .strip_prefix(base_dir)
      .map_err(|_| format!("{} is outside {}", file.display(), base_dir.display()))?;
    let target = target_dir.join(rel);
    if let Some(parent) = target.parent() {
      std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    let size = std::fs::copy(file, &target).map_err(|e| e.to_string())?;
    let sha256 = hash_file(&target).map_err(|e| e.to_string())?;
    Ok(ManifestEntry {
      path: rel.to_string_lossy().replace('\\', "/"),
      sha256,
      size,
    })
  }

  /// Copy and hash every file, splitting stored entries from failed paths.
  fn store_files(files: &[PathBuf], base_dir: &Path, target_dir: &Path) -> (Vec<ManifestEntry>, Vec<String>) {
    let mut entries = Vec::new();
    let mut failed_items = Vec::new();
    for file in files {
      match Self::store_file(file, base_dir, target_dir) {
        Ok(entry) => entries.push(entry),
        Err(message) => {
          warn!(file = ?file, error = %message, "failed to store file");
          let rel = file.strip_prefix(base_dir).unwrap_or(file);
          failed_items.push(rel.to_string_lossy().into_owned());
        }
      }
    }
    (entries, failed_items)
  }
}

#[async_trait]
impl ArtifactStore for LocalStore {
  async fn upload(
    &self,
    name: &str,
    files: &[PathBuf],
    base_dir: &Path,
    options: UploadOptions,
  ) -> Result<UploadResult, StoreError> {
    check_artifact_name(name)?;
    let target_dir = self.artifact_dir(name);
    if target_dir.exists() {
      tokio::fs::remove_dir_all(&target_dir)
        .await
        .map_err(|source| StoreError::Io {
          path: target_dir.clone(),
          source,
        })?;
    }
    tokio::fs::create_dir_all(&target_dir)
      .await
      .map_err(|source| StoreError::Io {
        path: target_dir.clone(),
        source,
      })?;

    let (entries, failed_items) = {
      let files = files.to_vec();
      let base_dir = base_dir.to_path_buf();
      let target_dir = target_dir.clone();
      tokio::task::spawn_blocking(move || Self::store_files(&files, &base_dir, &target_dir))
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    };

    let created = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_secs())
      .unwrap_or_default();
    let manifest = Manifest {
      name: name.to_string(),
      created,
      expires: created + u64::from(options.retention_days) * SECONDS_PER_DAY,
      files: entries,
    };
    let manifest_path = target_dir.join(MANIFEST_FILE);
    tokio::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)
      .await
      .map_err(|source| StoreError::Io {
        path: manifest_path,
        source,
      })?;

    info!(artifact = %name, stored = manifest.files.len(), dir = ?target_dir, "artifact stored");
    Ok(UploadResult {
      artifact_name: name.to_string(),
      failed_items,
    })
  }
}
