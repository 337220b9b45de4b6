//! Process-wide facts established once at startup.
//!
//! The detected platform, its release and the static package index are read
//! once and then passed by reference into every component that needs them.
//! Tests construct a `Context` directly to simulate another platform.

use thiserror::Error;

use crate::index::{IndexError, PackageIndex};
use crate::platform::os::{self, Os};
use crate::platform::Platform;

/// Errors that can occur while detecting the runtime context.
#[derive(Debug, Error)]
pub enum ContextError {
  #[error("unsupported platform: {os}/{arch}")]
  UnsupportedPlatform { os: String, arch: String },

  #[error(transparent)]
  Index(#[from] IndexError),
}

/// Immutable runtime facts shared by the whole run.
#[derive(Debug, Clone)]
pub struct Context {
  pub platform: Platform,
  /// OS release, e.g. `11.7.10` on macOS or `22.04` on Ubuntu.
  pub release: String,
  pub index: PackageIndex,
}

impl Context {
  pub fn new(platform: Platform, release: impl Into<String>, index: PackageIndex) -> Self {
    Self {
      platform,
      release: release.into(),
      index,
    }
  }

  /// Detect platform and release of the running system.
  ///
  /// An undetectable release becomes `unknown`, which compatibility rules
  /// treat as unparseable.
  pub fn detect(index: PackageIndex) -> Result<Self, ContextError> {
    let platform = Platform::current().ok_or_else(|| ContextError::UnsupportedPlatform {
      os: std::env::consts::OS.to_string(),
      arch: std::env::consts::ARCH.to_string(),
    })?;
    let release = os::release().unwrap_or_else(|| "unknown".to_string());
    Ok(Self::new(platform, release, index))
  }

  pub fn os(&self) -> Os {
    self.platform.os
  }
}
