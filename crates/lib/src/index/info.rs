//! Cached Hackage package status.
//!
//! Looking up whether a package version is deprecated requires a network
//! round-trip to Hackage, so the answers are shipped as a cache that tolerates
//! some staleness. The cache is advisory: it steers version selection away
//! from deprecated releases but is never treated as authoritative.
//!
//! # Format
//!
//! ```json
//! {
//!   "packages": {
//!     "Agda-2.6.4": { "status": "normal", "lastModified": 1697414400 }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::IndexError;

/// Cache bundled with the library.
const EMBEDDED_INFO: &str = include_str!("../../data/package-info.json");

/// Lifecycle status of a package version on Hackage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
  Normal,
  Deprecated,
}

/// A cached status entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
  pub status: PackageStatus,
  /// Unix timestamp of the last change to this entry.
  pub last_modified: u64,
}

/// Mapping from `<package>-<version>` to its cached status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfoCache {
  pub packages: BTreeMap<String, PackageInfo>,
}

impl PackageInfoCache {
  /// Parse a cache from JSON text.
  pub fn from_json(content: &str) -> Result<Self, IndexError> {
    serde_json::from_str(content).map_err(|source| IndexError::Parse {
      what: "package info cache".to_string(),
      source,
    })
  }

  /// Load a cache from a JSON file.
  pub fn load(path: &Path) -> Result<Self, IndexError> {
    let content = fs::read_to_string(path).map_err(|source| IndexError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json(&content)
  }

  /// The cache bundled with this release.
  pub fn embedded() -> Result<Self, IndexError> {
    Self::from_json(EMBEDDED_INFO)
  }

  pub fn get(&self, package: &str) -> Option<&PackageInfo> {
    self.packages.get(package)
  }

  /// Whether the cache marks `package` as deprecated. Unknown packages are not.
  pub fn is_deprecated(&self, package: &str) -> bool {
    self
      .get(package)
      .is_some_and(|info| info.status == PackageStatus::Deprecated)
  }

  /// Timestamp of the newest entry, if any.
  pub fn last_modified(&self) -> Option<u64> {
    self.packages.values().map(|info| info.last_modified).max()
  }

  /// Whether the newest entry is older than `max_age` at time `now`.
  ///
  /// An empty cache is always stale.
  pub fn is_stale(&self, max_age: Duration, now: SystemTime) -> bool {
    let Some(newest) = self.last_modified() else {
      return true;
    };
    let now = now.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    now.saturating_sub(newest) > max_age.as_secs()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SAMPLE: &str = r#"{
    "packages": {
      "Agda-2.6.2": { "status": "deprecated", "lastModified": 1630000000 },
      "Agda-2.6.4": { "status": "normal", "lastModified": 1697414400 }
    }
  }"#;

  #[test]
  fn deprecated_lookup() {
    let cache = PackageInfoCache::from_json(SAMPLE).unwrap();
    assert!(cache.is_deprecated("Agda-2.6.2"));
    assert!(!cache.is_deprecated("Agda-2.6.4"));
    assert!(!cache.is_deprecated("Agda-9.9.9"));
  }

  #[test]
  fn staleness_uses_newest_entry() {
    let cache = PackageInfoCache::from_json(SAMPLE).unwrap();
    let day = Duration::from_secs(24 * 60 * 60);

    let fresh = UNIX_EPOCH + Duration::from_secs(1697414400) + day;
    assert!(!cache.is_stale(2 * day, fresh));

    let old = UNIX_EPOCH + Duration::from_secs(1697414400) + 3 * day;
    assert!(cache.is_stale(2 * day, old));
  }

  #[test]
  fn empty_cache_is_stale() {
    assert!(PackageInfoCache::default().is_stale(Duration::from_secs(u64::MAX), SystemTime::now()));
  }

  #[test]
  fn embedded_cache_parses() {
    let cache = PackageInfoCache::embedded().unwrap();
    assert!(!cache.packages.is_empty());
  }

  #[test]
  fn rejects_unknown_status() {
    let result = PackageInfoCache::from_json(r#"{"packages": {"Agda-2.6.4": {"status": "gone", "lastModified": 0}}}"#);
    assert!(result.is_err());
  }
}
