use std::fmt;
use std::str::FromStr;

/// Operating system variants agdist can build for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    Self::from_str(std::env::consts::OS).ok()
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "macos",
      Self::Windows => "windows",
    }
  }

  /// Suffix appended to executable names
  pub fn exe_suffix(&self) -> &'static str {
    match self {
      Self::Windows => ".exe",
      Self::Linux | Self::MacOs => "",
    }
  }

  /// Name of an executable on this OS (e.g. `agda.exe` on Windows)
  pub fn exe_name(&self, name: &str) -> String {
    format!("{name}{}", self.exe_suffix())
  }
}

impl FromStr for Os {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "linux" => Ok(Self::Linux),
      "macos" | "darwin" => Ok(Self::MacOs),
      "windows" | "win32" => Ok(Self::Windows),
      other => Err(format!("unsupported operating system: {other}")),
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Returns the OS release of the running system (e.g. `11.7.10` on macOS Big
/// Sur, `22.04` on Ubuntu Jammy)
///
/// Returns `None` if the release cannot be determined
pub fn release() -> Option<String> {
  sysinfo::System::os_version().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn current_returns_supported_os() {
    assert!(Os::current().is_some(), "Current OS should be supported");
  }

  #[test]
  fn parses_darwin_and_win32_aliases() {
    assert_eq!("darwin".parse::<Os>(), Ok(Os::MacOs));
    assert_eq!("win32".parse::<Os>(), Ok(Os::Windows));
  }

  #[test]
  fn only_windows_has_exe_suffix() {
    assert_eq!(Os::Windows.exe_name("agda"), "agda.exe");
    assert_eq!(Os::Linux.exe_name("agda"), "agda");
    assert_eq!(Os::MacOs.exe_name("agda-mode"), "agda-mode");
  }
}
