//! Static lookup tables loaded once at startup.
//!
//! - `PackageIndex`: composite key -> download URL of a prebuilt distribution
//! - `PackageInfoCache`: Hackage package status, to avoid refetching it

pub mod info;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::platform::arch::Arch;
use crate::platform::os::Os;

pub use info::{PackageInfo, PackageInfoCache, PackageStatus};

/// Index bundled with the library.
const EMBEDDED_INDEX: &str = include_str!("../../data/bdist-index.json");

/// Errors that can occur while loading static lookup tables.
#[derive(Debug, Error)]
pub enum IndexError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {what}: {source}")]
  Parse {
    what: String,
    #[source]
    source: serde_json::Error,
  },
}

/// Read-only mapping from distribution key to download URL.
///
/// # Format
///
/// ```json
/// {
///   "agda-2.6.4-x86_64-linux": "https://.../agda-2.6.4-x86_64-linux.zip"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageIndex {
  entries: BTreeMap<String, String>,
}

impl PackageIndex {
  /// Build the composite key for a package on a platform.
  pub fn key(package: &str, version: &str, arch: Arch, os: Os) -> String {
    format!("{package}-{version}-{arch}-{os}")
  }

  /// Parse an index from JSON text.
  pub fn from_json(content: &str) -> Result<Self, IndexError> {
    serde_json::from_str(content).map_err(|source| IndexError::Parse {
      what: "package index".to_string(),
      source,
    })
  }

  /// Load an index from a JSON file.
  pub fn load(path: &Path) -> Result<Self, IndexError> {
    let content = fs::read_to_string(path).map_err(|source| IndexError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json(&content)
  }

  /// The index bundled with this release.
  pub fn embedded() -> Result<Self, IndexError> {
    Self::from_json(EMBEDDED_INDEX)
  }

  /// Look up a download URL by key.
  pub fn lookup(&self, key: &str) -> Option<&str> {
    self.entries.get(key).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl FromIterator<(String, String)> for PackageIndex {
  fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
    Self {
      entries: iter.into_iter().collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  const SAMPLE: &str = r#"{
    "agda-2.6.4-x86_64-linux": "https://example.com/agda-2.6.4-x86_64-linux.zip",
    "agda-2.6.4-aarch64-macos": "https://example.com/agda-2.6.4-aarch64-macos.zip"
  }"#;

  #[test]
  fn key_joins_components() {
    assert_eq!(
      PackageIndex::key("agda", "2.6.4", Arch::X86_64, Os::Linux),
      "agda-2.6.4-x86_64-linux"
    );
  }

  #[test]
  fn lookup_by_key() {
    let index = PackageIndex::from_json(SAMPLE).unwrap();
    assert_eq!(
      index.lookup(&PackageIndex::key("agda", "2.6.4", Arch::Aarch64, Os::MacOs)),
      Some("https://example.com/agda-2.6.4-aarch64-macos.zip")
    );
    assert_eq!(index.lookup(&PackageIndex::key("agda", "2.6.4", Arch::X86_64, Os::Windows)), None);
  }

  #[test]
  fn load_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("index.json");
    std::fs::write(&path, SAMPLE).unwrap();

    let index = PackageIndex::load(&path).unwrap();
    assert_eq!(index.len(), 2);
  }

  #[test]
  fn load_missing_file_is_read_error() {
    let result = PackageIndex::load(Path::new("/nonexistent/index.json"));
    assert!(matches!(result, Err(IndexError::Read { .. })));
  }

  #[test]
  fn embedded_index_parses() {
    assert!(PackageIndex::embedded().is_ok());
  }

  #[test]
  fn rejects_non_string_urls() {
    let result = PackageIndex::from_json(r#"{"agda-2.6.4-x86_64-linux": 3}"#);
    assert!(matches!(result, Err(IndexError::Parse { .. })));
  }
}
