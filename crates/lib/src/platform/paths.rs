use crate::consts::APP_NAME;
use std::path::PathBuf;

/// Overrides the data directory (artifact store, package info cache)
pub const DATA_DIR_ENV: &str = "AGDIST_DATA_DIR";

/// Overrides the cache directory (downloads, scratch builds)
pub const CACHE_DIR_ENV: &str = "AGDIST_CACHE_DIR";

fn env_path(var: &str) -> Option<PathBuf> {
  std::env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Returns the user's home directory, or the temp directory if unset
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  env_path("USERPROFILE").unwrap_or_else(std::env::temp_dir)
}

/// Returns the user's home directory, or the temp directory if unset
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  env_path("HOME").unwrap_or_else(std::env::temp_dir)
}

/// Returns the directory for data files for the application
#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  if let Some(dir) = env_path(DATA_DIR_ENV) {
    return dir;
  }
  env_path("APPDATA")
    .unwrap_or_else(|| home_dir().join("AppData").join("Roaming"))
    .join(APP_NAME)
}

/// Returns the directory for data files for the application
#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  if let Some(dir) = env_path(DATA_DIR_ENV) {
    return dir;
  }
  env_path("XDG_DATA_HOME")
    .unwrap_or_else(|| home_dir().join(".local").join("share"))
    .join(APP_NAME)
}

/// Returns the directory for cache files for the application
#[cfg(windows)]
pub fn cache_dir() -> PathBuf {
  if let Some(dir) = env_path(CACHE_DIR_ENV) {
    return dir;
  }
  env_path("LOCALAPPDATA")
    .unwrap_or_else(|| home_dir().join("AppData").join("Local"))
    .join(APP_NAME)
    .join("Cache")
}

/// Returns the directory for cache files for the application
#[cfg(not(windows))]
pub fn cache_dir() -> PathBuf {
  if let Some(dir) = env_path(CACHE_DIR_ENV) {
    return dir;
  }
  env_path("XDG_CACHE_HOME")
    .unwrap_or_else(|| home_dir().join(".cache"))
    .join(APP_NAME)
}

/// Root of the local artifact store
pub fn artifacts_dir() -> PathBuf {
  data_dir().join("artifacts")
}

#[cfg(test)]
#[cfg(not(windows))]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn explicit_override_wins() {
    temp_env::with_vars(
      [
        (DATA_DIR_ENV, Some("/srv/agdist")),
        ("XDG_DATA_HOME", Some("/custom/data")),
      ],
      || {
        assert_eq!(data_dir(), PathBuf::from("/srv/agdist"));
        assert_eq!(artifacts_dir(), PathBuf::from("/srv/agdist/artifacts"));
      },
    );
  }

  #[test]
  #[serial]
  fn xdg_fallback_to_home_directories() {
    temp_env::with_vars(
      [
        (DATA_DIR_ENV, None::<&str>),
        (CACHE_DIR_ENV, None::<&str>),
        ("XDG_DATA_HOME", None::<&str>),
        ("XDG_CACHE_HOME", None::<&str>),
        ("HOME", Some("/home/user")),
      ],
      || {
        assert_eq!(data_dir(), PathBuf::from("/home/user/.local/share").join(APP_NAME));
        assert_eq!(cache_dir(), PathBuf::from("/home/user/.cache").join(APP_NAME));
      },
    );
  }
}
