//! `agdist build`: produce, verify and optionally publish a distribution.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::info;

use agdist_lib::dist::{LocalStore, Pipeline, Source, WorkDirs};
use agdist_lib::exec::ProcessExecutor;
use agdist_lib::platform::paths;

use crate::cmd::ConfigArgs;
use crate::output::{OutputFormat, format_duration, print_json, print_stat, print_success, print_warning};

/// Run the pipeline for the resolved inputs.
///
/// The work directory defaults to `<cache>/work` and the store to the
/// artifacts directory; the store is only written when `bdist-upload` is set.
pub fn cmd_build(
  config: &ConfigArgs,
  source: &Path,
  work_dir: Option<PathBuf>,
  store: Option<PathBuf>,
  format: OutputFormat,
) -> Result<()> {
  if !source.is_dir() {
    bail!("Source directory not found: {}", source.display());
  }

  let session = config.load()?;
  let options = session.resolve()?;

  let work = WorkDirs::new(work_dir.unwrap_or_else(|| paths::cache_dir().join("work")));
  let store = store.map(LocalStore::new).unwrap_or_else(LocalStore::default_location);
  info!(source = %source.display(), work_dir = %work.root().display(), "starting pipeline");

  let pipeline = Pipeline::new(&session.context, Arc::new(ProcessExecutor)).with_store(Arc::new(store));

  let started = Instant::now();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt
    .block_on(pipeline.run(options, source, &work))
    .context("Pipeline failed")?;

  if format.is_json() {
    return print_json(&serde_json::json!({
      "source": outcome.source,
      "name": outcome.name,
      "dist_dir": outcome.dist_dir,
      "options": outcome.options,
      "upload": outcome.upload,
    }));
  }

  let how = match outcome.source {
    Source::Downloaded => "Downloaded",
    Source::Built => "Built",
  };
  print_success(&format!("{how} {} in {}", outcome.name, format_duration(started.elapsed())));
  print_stat("Distribution", &outcome.dist_dir.display().to_string());
  if let Some(icu) = &outcome.options.icu {
    print_stat("ICU", icu);
  }
  if let Some(upx) = &outcome.options.upx {
    print_stat("UPX", upx);
  }

  if let Some(upload) = &outcome.upload {
    print_stat("Published as", &upload.artifact_name);
    for item in &upload.failed_items {
      print_warning(&format!("Failed to upload {item}"));
    }
  }

  Ok(())
}
