//! Orchestration of the distribution pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::fetch::{Fetcher, HttpFetcher, extract_zip};
use super::package::{self, PackageError};
use super::publish::{ArtifactStore, StoreError, UploadOptions, UploadResult, check_artifact_name, publish};
use super::tools::{IcuInstall, Toolbox};
use super::verify::{VerifyError, verify};
use crate::build::{BuildError, BuildStep, ExternalBuild};
use crate::compat;
use crate::consts::{DATA_DIR_NAME, DEFAULT_BDIST_TEMPLATE, HACKAGE_PACKAGE_NAME, PACKAGE_INFO_MAX_AGE};
use crate::context::Context;
use crate::exec::Executor;
use crate::index::PackageInfoCache;
use crate::options::BuildOptions;
use crate::template::{TemplateError, distribution_name, render_name};

/// Errors that abort the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("no prebuilt distribution available for '{key}' and building is disabled")]
  NoPrebuilt { key: String },

  #[error("failed to render distribution name: {0}")]
  Name(#[from] TemplateError),

  #[error("distribution name '{0}' is not usable as an artifact name")]
  InvalidName(String),

  #[error(transparent)]
  Build(#[from] BuildError),

  #[error(transparent)]
  Package(#[from] PackageError),

  #[error("distribution failed verification: {0}")]
  Verification(#[source] VerifyError),

  #[error("failed to publish distribution: {0}")]
  Publish(#[from] StoreError),
}

/// Scratch directories owned by one pipeline run.
#[derive(Debug, Clone)]
pub struct WorkDirs {
  root: PathBuf,
}

impl WorkDirs {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Executables produced by the build.
  pub fn bin(&self) -> PathBuf {
    self.root.join("build").join("bin")
  }

  /// The assembled distribution.
  pub fn dist(&self) -> PathBuf {
    self.root.join("dist")
  }

  pub fn downloads(&self) -> PathBuf {
    self.root.join("downloads")
  }

  /// A downloaded distribution, once unpacked.
  pub fn install(&self) -> PathBuf {
    self.root.join("install")
  }
}

/// Result of looking for a prebuilt distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Probe {
  pub key: String,
  pub url: Option<String>,
}

/// Where the final distribution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
  Downloaded,
  Built,
}

/// A finished pipeline run.
#[derive(Debug, Clone)]
pub struct Outcome {
  pub source: Source,
  pub name: String,
  pub dist_dir: PathBuf,
  /// The options after preparation, including ICU and UPX versions.
  pub options: BuildOptions,
  pub upload: Option<UploadResult>,
}

/// Runs probe, download or build, packaging, verification and publishing
/// strictly in sequence.
pub struct Pipeline<'a> {
  ctx: &'a Context,
  executor: Arc<dyn Executor>,
  fetcher: Arc<dyn Fetcher>,
  builder: Arc<dyn BuildStep>,
  store: Option<Arc<dyn ArtifactStore>>,
  toolbox: Toolbox,
}

impl<'a> Pipeline<'a> {
  /// A pipeline that downloads over HTTP and builds with the external tools.
  pub fn new(ctx: &'a Context, executor: Arc<dyn Executor>) -> Self {
    Self {
      ctx,
      fetcher: Arc::new(HttpFetcher::new()),
      builder: Arc::new(ExternalBuild::new(executor.clone())),
      store: None,
      toolbox: Toolbox::new(ctx.os(), executor.clone()),
      executor,
    }
  }

  pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
    self.fetcher = fetcher;
    self
  }

  pub fn with_builder(mut self, builder: Arc<dyn BuildStep>) -> Self {
    self.builder = builder;
    self
  }

  pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
    self.store = Some(store);
    self
  }

  /// Look up the default-named distribution of `options` in the index.
  pub fn probe(&self, options: &BuildOptions) -> Result<Probe, TemplateError> {
    let key = render_name(DEFAULT_BDIST_TEMPLATE, options, self.ctx)?;
    let url = self.ctx.index.lookup(&key).map(str::to_string);
    Ok(Probe { key, url })
  }

  /// Produce a verified distribution for `options`, building from `source`
  /// when no prebuilt one can be used.
  pub async fn run(&self, options: BuildOptions, source: &Path, work: &WorkDirs) -> Result<Outcome, PipelineError> {
    if options.flags.force_build {
      info!("force-build is set, skipping probe");
    } else {
      let probe = self.probe(&options)?;
      match &probe.url {
        Some(url) => {
          info!(key = %probe.key, url = %url, "found prebuilt distribution");
          if let Some(dist_dir) = self.try_download(url, &options, work).await {
            return Ok(Outcome {
              source: Source::Downloaded,
              name: probe.key,
              dist_dir,
              options,
              upload: None,
            });
          }
        }
        None => info!(key = %probe.key, "no prebuilt distribution"),
      }
      if options.flags.force_no_build {
        return Err(PipelineError::NoPrebuilt { key: probe.key });
      }
    }

    self.build(options, source, work).await
  }

  /// Download, unpack and verify a prebuilt distribution. Any failure
  /// returns `None` so the caller can build instead.
  async fn try_download(&self, url: &str, options: &BuildOptions, work: &WorkDirs) -> Option<PathBuf> {
    let archive = match self.fetcher.fetch(url, &work.downloads()).await {
      Ok(archive) => archive,
      Err(e) => {
        warn!(url = %url, error = %e, "download failed, building from source");
        return None;
      }
    };

    let install = work.install();
    if install.exists()
      && let Err(e) = tokio::fs::remove_dir_all(&install).await
    {
      warn!(path = ?install, error = %e, "could not clear install directory, building from source");
      return None;
    }
    if let Err(e) = extract_zip(&archive, &install).await {
      warn!(archive = ?archive, error = %e, "could not unpack download, building from source");
      return None;
    }
    if let Err(e) = verify(self.executor.as_ref(), &install, &options.agda, self.ctx.os()).await {
      warn!(error = %e, "downloaded distribution failed verification, building from source");
      return None;
    }

    info!(path = ?install, "using prebuilt distribution");
    Some(install)
  }

  /// Fill in the optional fields of `options` from the environment.
  async fn prepare(&self, mut options: BuildOptions) -> (BuildOptions, Option<IcuInstall>) {
    if options.package_info.is_none() {
      match PackageInfoCache::embedded() {
        Ok(cache) => options = options.with_package_info(cache),
        Err(e) => warn!(error = %e, "could not load package info cache"),
      }
    }
    if let Some(cache) = &options.package_info {
      if cache.is_stale(PACKAGE_INFO_MAX_AGE, SystemTime::now()) {
        warn!(
          last_modified = ?cache.last_modified(),
          "package info cache is stale, deprecation status may be out of date"
        );
      }
      if cache.is_deprecated(&format!("{HACKAGE_PACKAGE_NAME}-{}", options.agda)) {
        warn!(agda = %options.agda, "building a deprecated release");
      }
    }

    let mut icu = None;
    if compat::cluster_counting(&options) {
      match self.toolbox.install_icu().await {
        Ok(install) => {
          options = options.with_icu(&install.version, install.include_dir.clone(), install.lib_dir.clone());
          icu = Some(install);
        }
        Err(e) => {
          warn!(error = %e, "ICU setup failed, building without cluster counting");
          options = options.without_cluster_counting();
        }
      }
    }

    if compat::compress_executables(&options, self.ctx) {
      match self.toolbox.upx_version().await {
        Ok(version) => options = options.with_upx(version),
        Err(e) => warn!(error = %e, "UPX not available, executables will not be compressed"),
      }
    }

    (options, icu)
  }

  async fn build(&self, options: BuildOptions, source: &Path, work: &WorkDirs) -> Result<Outcome, PipelineError> {
    let os = self.ctx.os();
    let (options, icu) = self.prepare(options).await;
    let name = distribution_name(&options, self.ctx)?;
    check_artifact_name(&name).map_err(|_| PipelineError::InvalidName(name.clone()))?;
    info!(name = %name, "building distribution");

    let bin_dir = work.bin();
    self.builder.build(&options, self.ctx, source, &bin_dir).await?;

    let dist_dir = work.dist();
    let data_dir = source.join("src").join(DATA_DIR_NAME);
    let executables = package::assemble(&bin_dir, &data_dir, &dist_dir, os).await?;

    for exe in &executables {
      self.toolbox.inspect(exe).await;
    }

    if let Some(icu) = &icu
      && compat::cluster_counting(&options)
      && let Err(e) = self.toolbox.bundle_icu(icu, &dist_dir, &executables).await
    {
      warn!(error = %e, "could not bundle ICU");
    }

    if options.upx.is_some() && compat::compress_executables(&options, self.ctx) {
      for exe in &executables {
        match self.toolbox.compress(exe).await {
          Ok(()) => {
            self.toolbox.inspect(exe).await;
          }
          Err(e) => warn!(exe = ?exe, error = %e, "compression failed, keeping uncompressed executable"),
        }
      }
    }

    verify(self.executor.as_ref(), &dist_dir, &options.agda, os)
      .await
      .map_err(PipelineError::Verification)?;

    let upload = match (&self.store, options.flags.bdist_upload) {
      (Some(store), true) => {
        let upload_options = UploadOptions {
          retention_days: options.bdist_retention_days,
        };
        Some(publish(store.as_ref(), &name, &dist_dir, upload_options).await?)
      }
      (None, true) => {
        warn!("bdist-upload is set but no artifact store is configured");
        None
      }
      (_, false) => None,
    };

    Ok(Outcome {
      source: Source::Built,
      name,
      dist_dir,
      options,
      upload,
    })
  }
}
