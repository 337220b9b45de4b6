//! File system helpers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Recursively copy the contents of `src` into `dst`, creating `dst`.
///
/// Symlinks are followed; their targets are copied as regular files.
pub fn copy_dir(src: &Path, dst: &Path) -> io::Result<u64> {
  let mut copied = 0;
  fs::create_dir_all(dst)?;

  for entry in WalkDir::new(src).follow_links(true) {
    let entry = entry.map_err(io::Error::other)?;
    let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
    let target = dst.join(rel);

    if entry.file_type().is_dir() {
      fs::create_dir_all(&target)?;
    } else {
      if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
      }
      fs::copy(entry.path(), &target)?;
      copied += 1;
    }
  }

  Ok(copied)
}

/// Regular files below `dir`, sorted. Directories and symlinks are skipped.
pub fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
  let mut files = Vec::new();
  for entry in WalkDir::new(dir).sort_by_file_name() {
    let entry = entry.map_err(io::Error::other)?;
    if entry.file_type().is_file() {
      files.push(entry.into_path());
    }
  }
  Ok(files)
}

/// Mark a file as executable on Unix. A no-op elsewhere.
pub fn make_executable(path: &Path) -> io::Result<()> {
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
  }
  #[cfg(not(unix))]
  let _ = path;
  Ok(())
}
