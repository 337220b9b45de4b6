//! Downloading and unpacking prebuilt distributions.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::util::fs::make_executable;
use crate::util::hash::hash_bytes;

/// Errors that can occur while fetching a distribution.
///
/// All of them are degradable: the pipeline falls back to building.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("failed to fetch {url}: {source}")]
  Http {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("failed to fetch {url}: HTTP {status}")]
  Status { url: String, status: u16 },

  #[error("I/O error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid archive {path}: {message}")]
  Archive { path: PathBuf, message: String },

  #[error("extraction task failed: {0}")]
  Task(String),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> FetchError + '_ {
  move |source| FetchError::Io {
    path: path.to_path_buf(),
    source,
  }
}

/// Downloads a URL into a directory.
#[async_trait]
pub trait Fetcher: Send + Sync {
  /// Download `url` into `dest_dir` and return the path of the file.
  async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, FetchError>;
}

/// Fetches over HTTP(S).
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Fetcher for HttpFetcher {
  async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, FetchError> {
    info!(url = %url, "fetching URL");

    tokio::fs::create_dir_all(dest_dir).await.map_err(io_error(dest_dir))?;
    let dest_path = dest_dir.join(url_to_filename(url));

    let response = self.client.get(url).send().await.map_err(|source| FetchError::Http {
      url: url.to_string(),
      source,
    })?;

    if !response.status().is_success() {
      return Err(FetchError::Status {
        url: url.to_string(),
        status: response.status().as_u16(),
      });
    }

    let bytes = response.bytes().await.map_err(|source| FetchError::Http {
      url: url.to_string(),
      source,
    })?;

    let mut file = tokio::fs::File::create(&dest_path).await.map_err(io_error(&dest_path))?;
    file.write_all(&bytes).await.map_err(io_error(&dest_path))?;
    file.flush().await.map_err(io_error(&dest_path))?;

    info!(path = ?dest_path, size = bytes.len(), "download complete");
    Ok(dest_path)
  }
}

/// Convert a URL to a safe filename.
///
/// Takes the last path component without its query string. Falls back to a
/// hash of the URL if nothing usable remains.
pub fn url_to_filename(url: &str) -> String {
  if let Some(filename) = url.rsplit('/').next() {
    let filename = filename.split('?').next().unwrap_or(filename);

    let sanitized: String = filename
      .chars()
      .map(|c| {
        if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
          c
        } else {
          '_'
        }
      })
      .collect();

    if !sanitized.is_empty() && sanitized != "." && sanitized != ".." {
      return sanitized;
    }
  }

  format!("download_{}", &hash_bytes(url.as_bytes())[..16])
}

/// Unpack a zip archive into `dest` on the blocking pool.
///
/// Entries keep their paths. Entries escaping `dest` are rejected, and
/// everything under `bin/` is made executable.
pub async fn extract_zip(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>, FetchError> {
  let archive = archive.to_path_buf();
  let dest = dest.to_path_buf();
  tokio::task::spawn_blocking(move || unpack_zip(&archive, &dest))
    .await
    .map_err(|e| FetchError::Task(e.to_string()))?
}

fn unpack_zip(archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>, FetchError> {
  let invalid = |message: String| FetchError::Archive {
    path: archive_path.to_path_buf(),
    message,
  };

  fs::create_dir_all(dest).map_err(io_error(dest))?;
  let file = File::open(archive_path).map_err(io_error(archive_path))?;
  let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| invalid(e.to_string()))?;

  let mut extracted = Vec::new();
  for i in 0..archive.len() {
    let mut entry = archive.by_index(i).map_err(|e| invalid(e.to_string()))?;
    let name = entry
      .enclosed_name()
      .ok_or_else(|| invalid(format!("unsafe entry name '{}'", entry.name())))?;
    let dest_path = dest.join(&name);

    if entry.is_dir() {
      fs::create_dir_all(&dest_path).map_err(io_error(&dest_path))?;
      continue;
    }

    if let Some(parent) = dest_path.parent() {
      fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let mut outfile = File::create(&dest_path).map_err(io_error(&dest_path))?;
    std::io::copy(&mut entry, &mut outfile).map_err(io_error(&dest_path))?;

    if name.starts_with("bin") {
      make_executable(&dest_path).map_err(io_error(&dest_path))?;
    }
    debug!(path = ?dest_path, "extracted");
    extracted.push(dest_path);
  }

  info!(archive = ?archive_path, files = extracted.len(), "unpacked archive");
  Ok(extracted)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use tempfile::TempDir;
  use zip::write::SimpleFileOptions;

  fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, content) in entries {
      writer.start_file(*name, SimpleFileOptions::default()).unwrap();
      writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
  }

  #[test]
  fn url_to_filename_strips_query() {
    assert_eq!(
      url_to_filename("https://example.com/agda-2.6.4-x86_64-linux.zip?token=abc"),
      "agda-2.6.4-x86_64-linux.zip"
    );
  }

  #[test]
  fn url_to_filename_fallback_for_empty() {
    assert!(url_to_filename("https://example.com/").starts_with("download_"));
  }

  #[tokio::test]
  async fn extracts_distribution_layout() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("agda.zip");
    write_zip(
      &archive,
      &[("bin/agda", "#!/bin/sh\n"), ("data/lib/prim/Agda/Primitive.agda", "module")],
    );

    let dest = temp.path().join("install");
    let files = extract_zip(&archive, &dest).await.unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(
      fs::read_to_string(dest.join("data/lib/prim/Agda/Primitive.agda")).unwrap(),
      "module"
    );

    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      let mode = fs::metadata(dest.join("bin/agda")).unwrap().permissions().mode();
      assert_eq!(mode & 0o777, 0o755);
    }
  }

  #[tokio::test]
  async fn rejects_escaping_entries() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("evil.zip");
    write_zip(&archive, &[("../escape", "x")]);

    let result = extract_zip(&archive, &temp.path().join("install")).await;
    assert!(matches!(result, Err(FetchError::Archive { .. })));
    assert!(!temp.path().join("escape").exists());
  }

  #[tokio::test]
  async fn corrupt_archive() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("broken.zip");
    fs::write(&archive, "not a zip").unwrap();

    let result = extract_zip(&archive, &temp.path().join("install")).await;
    assert!(matches!(result, Err(FetchError::Archive { .. })));
  }

  #[tokio::test]
  async fn unreachable_host_is_http_error() {
    let temp = TempDir::new().unwrap();
    let result = HttpFetcher::new().fetch("http://127.0.0.1:9/agda.zip", temp.path()).await;
    assert!(matches!(result, Err(FetchError::Http { .. })));
  }
}
