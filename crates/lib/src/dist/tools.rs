//! Platform-specific helper tools.
//!
//! Installing ICU, compressing executables, inspecting their dynamic
//! dependencies and relinking them against bundled libraries all differ per
//! OS. [`PlatformTools`] builds the command lines for one OS; [`Toolbox`]
//! runs them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::exec::{Cmd, ExecError, Executor};
use crate::platform::os::Os;

/// Errors from the optional tool steps. The pipeline degrades on all of them.
#[derive(Debug, Error)]
pub enum ToolError {
  #[error(transparent)]
  Exec(#[from] ExecError),

  #[error("unexpected output from {tool}: '{output}'")]
  Output { tool: &'static str, output: String },

  #[error("library not found: {0}")]
  MissingLibrary(PathBuf),

  #[error("failed to copy {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// An ICU installation to build and bundle against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcuInstall {
  pub version: String,
  pub include_dir: PathBuf,
  pub lib_dir: PathBuf,
}

impl IcuInstall {
  /// Major version, which is what shared library names carry.
  pub fn major(&self) -> &str {
    self.version.split('.').next().unwrap_or(&self.version)
  }
}

const ICU_PKG_CONFIG_NAME: &str = "icu-i18n";
const ICU_LIBRARIES: &[&str] = &["icudata", "icui18n", "icuuc"];

/// Command lines for one operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformTools {
  Linux,
  MacOs,
  Windows,
}

impl PlatformTools {
  pub fn for_os(os: Os) -> Self {
    match os {
      Os::Linux => Self::Linux,
      Os::MacOs => Self::MacOs,
      Os::Windows => Self::Windows,
    }
  }

  /// Lists the dynamic dependencies of an executable.
  pub fn inspect_cmd(&self, exe: &Path) -> Cmd {
    match self {
      Self::Linux => Cmd::new("ldd").path_arg(exe),
      Self::MacOs => Cmd::new("otool").arg("-L").path_arg(exe),
      Self::Windows => Cmd::new("dumpbin").arg("/dependents").path_arg(exe),
    }
  }

  /// Library references from the output of [`Self::inspect_cmd`].
  pub fn parse_dependencies(&self, output: &str) -> Vec<String> {
    match self {
      // libicuuc.so.74 => /usr/lib/x86_64-linux-gnu/libicuuc.so.74 (0x00007f...)
      Self::Linux => output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect(),
      // The first line names the inspected file.
      Self::MacOs => output
        .lines()
        .skip(1)
        .filter_map(|line| line.trim().split(" (").next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect(),
      Self::Windows => output
        .lines()
        .map(str::trim)
        .filter(|line| line.to_ascii_lowercase().ends_with(".dll") && !line.contains(' '))
        .map(str::to_string)
        .collect(),
    }
  }

  pub fn compress_cmd(&self, exe: &Path) -> Cmd {
    Cmd::new("upx").arg("--best").path_arg(exe)
  }

  pub fn upx_version_cmd(&self) -> Cmd {
    Cmd::new("upx").arg("--version")
  }

  /// Installs the ICU development package.
  pub fn icu_install_cmd(&self) -> Cmd {
    match self {
      Self::Linux => Cmd::new("sudo").args(["apt-get", "install", "-y", "libicu-dev"]),
      Self::MacOs => Cmd::new("brew").args(["install", "icu4c"]),
      Self::Windows => Cmd::new("pacman").args(["-S", "--noconfirm", "mingw-w64-x86_64-icu"]),
    }
  }

  /// Finds the prefix of a keg-only ICU, which pkg-config cannot see alone.
  pub fn icu_prefix_cmd(&self) -> Option<Cmd> {
    match self {
      Self::MacOs => Some(Cmd::new("brew").args(["--prefix", "icu4c"])),
      Self::Linux | Self::Windows => None,
    }
  }

  pub fn pkg_config_cmd(&self, query: &str) -> Cmd {
    Cmd::new("pkg-config").arg(query).arg(ICU_PKG_CONFIG_NAME)
  }

  /// Where bundled libraries go, relative to the distribution root.
  pub fn bundle_subdir(&self) -> &'static str {
    match self {
      Self::Linux | Self::MacOs => "lib",
      // DLLs are found next to the executable
      Self::Windows => "bin",
    }
  }

  /// Directory holding the shared ICU libraries of an installation.
  pub fn icu_shared_dir(&self, icu: &IcuInstall) -> PathBuf {
    match self {
      Self::Linux | Self::MacOs => icu.lib_dir.clone(),
      Self::Windows => icu.lib_dir.parent().map(|p| p.join("bin")).unwrap_or_else(|| icu.lib_dir.clone()),
    }
  }

  /// File names of the shared ICU libraries.
  pub fn icu_library_names(&self, icu: &IcuInstall) -> Vec<String> {
    let major = icu.major();
    ICU_LIBRARIES
      .iter()
      .map(|lib| match self {
        Self::Linux => format!("lib{lib}.so.{major}"),
        Self::MacOs => format!("lib{lib}.{major}.dylib"),
        // icudata and icui18n are shortened on Windows
        Self::Windows => {
          let short = match *lib {
            "icudata" => "icudt",
            "icui18n" => "icuin",
            other => other,
          };
          format!("{short}{major}.dll")
        }
      })
      .collect()
  }

  /// Point `exe` at the bundled copies of `libraries`.
  ///
  /// `dependencies` are the references currently recorded in `exe`, needed
  /// on macOS where each reference is rewritten individually.
  pub fn relink_cmds(&self, exe: &Path, libraries: &[String], dependencies: &[String]) -> Vec<Cmd> {
    match self {
      Self::Linux => vec![Cmd::new("patchelf").args(["--set-rpath", "$ORIGIN/../lib"]).path_arg(exe)],
      Self::MacOs => libraries
        .iter()
        .filter_map(|lib| {
          let old = dependencies.iter().find(|dep| dep.ends_with(lib.as_str()))?;
          Some(
            Cmd::new("install_name_tool")
              .arg("-change")
              .arg(old.as_str())
              .arg(format!("@executable_path/../lib/{lib}"))
              .path_arg(exe),
          )
        })
        .collect(),
      Self::Windows => Vec::new(),
    }
  }
}

/// Runs platform tools through an executor.
#[derive(Clone)]
pub struct Toolbox {
  pub tools: PlatformTools,
  executor: Arc<dyn Executor>,
}

impl Toolbox {
  pub fn new(os: Os, executor: Arc<dyn Executor>) -> Self {
    Self {
      tools: PlatformTools::for_os(os),
      executor,
    }
  }

  /// Log the dynamic dependencies of `exe`. Never fails.
  pub async fn inspect(&self, exe: &Path) -> Option<Vec<String>> {
    match self.executor.run(&self.tools.inspect_cmd(exe)).await {
      Ok(output) => {
        let deps = self.tools.parse_dependencies(&output);
        debug!(exe = ?exe, dependencies = ?deps, "dynamic dependencies");
        Some(deps)
      }
      Err(e) => {
        debug!(exe = ?exe, error = %e, "could not inspect dependencies");
        None
      }
    }
  }

  pub async fn compress(&self, exe: &Path) -> Result<(), ToolError> {
    self.executor.run(&self.tools.compress_cmd(exe)).await?;
    info!(exe = ?exe, "compressed");
    Ok(())
  }

  /// Version of the installed UPX, e.g. `4.2.2` from `upx 4.2.2`.
  pub async fn upx_version(&self) -> Result<String, ToolError> {
    let output = self.executor.run(&self.tools.upx_version_cmd()).await?;
    output
      .lines()
      .next()
      .and_then(|line| line.split_whitespace().nth(1))
      .map(str::to_string)
      .ok_or(ToolError::Output { tool: "upx", output })
  }

  /// Install ICU and locate its headers and libraries.
  pub async fn install_icu(&self) -> Result<IcuInstall, ToolError> {
    self.executor.run(&self.tools.icu_install_cmd()).await?;

    let mut pkg_config_path = None;
    if let Some(prefix_cmd) = self.tools.icu_prefix_cmd() {
      let prefix = self.executor.run(&prefix_cmd).await?;
      pkg_config_path = Some(Path::new(&prefix).join("lib").join("pkgconfig"));
    }

    let query = |q: &str| {
      let cmd = self.tools.pkg_config_cmd(q);
      match &pkg_config_path {
        Some(path) => cmd.env("PKG_CONFIG_PATH", path.to_string_lossy()),
        None => cmd,
      }
    };

    let version = self.executor.run(&query("--modversion")).await?;
    if version.is_empty() {
      return Err(ToolError::Output {
        tool: "pkg-config",
        output: version,
      });
    }
    let include_dir = PathBuf::from(self.executor.run(&query("--variable=includedir")).await?);
    let lib_dir = PathBuf::from(self.executor.run(&query("--variable=libdir")).await?);

    info!(version = %version, lib_dir = ?lib_dir, "ICU installed");
    Ok(IcuInstall {
      version,
      include_dir,
      lib_dir,
    })
  }

  /// Copy the ICU libraries into `dist_dir` and relink `executables`.
  pub async fn bundle_icu(
    &self,
    icu: &IcuInstall,
    dist_dir: &Path,
    executables: &[PathBuf],
  ) -> Result<Vec<PathBuf>, ToolError> {
    let shared_dir = self.tools.icu_shared_dir(icu);
    let bundle_dir = dist_dir.join(self.tools.bundle_subdir());
    tokio::fs::create_dir_all(&bundle_dir).await.map_err(|source| ToolError::Io {
      path: bundle_dir.clone(),
      source,
    })?;

    let names = self.tools.icu_library_names(icu);
    let mut bundled = Vec::new();
    for name in &names {
      let src = shared_dir.join(name);
      if !src.exists() {
        return Err(ToolError::MissingLibrary(src));
      }
      let dst = bundle_dir.join(name);
      tokio::fs::copy(&src, &dst)
        .await
        .map_err(|source| ToolError::Io { path: src.clone(), source })?;
      bundled.push(dst);
    }

    for exe in executables {
      let dependencies = self.inspect(exe).await.unwrap_or_default();
      for cmd in self.tools.relink_cmds(exe, &names, &dependencies) {
        self.executor.run(&cmd).await?;
      }
    }

    info!(libraries = bundled.len(), dir = ?bundle_dir, "bundled ICU");
    Ok(bundled)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{RecordingExecutor, failed, ok};

  fn icu() -> IcuInstall {
    IcuInstall {
      version: "74.2".to_string(),
      include_dir: PathBuf::from("/usr/include"),
      lib_dir: PathBuf::from("/usr/lib"),
    }
  }

  #[test]
  fn one_inspector_per_platform() {
    let exe = Path::new("agda");
    assert_eq!(PlatformTools::Linux.inspect_cmd(exe).to_string(), "ldd agda");
    assert_eq!(PlatformTools::MacOs.inspect_cmd(exe).to_string(), "otool -L agda");
    assert_eq!(PlatformTools::Windows.inspect_cmd(exe).to_string(), "dumpbin /dependents agda");
  }

  #[test]
  fn parse_ldd() {
    let output = "\tlinux-vdso.so.1 (0x00007ffd)\n\tlibicuuc.so.74 => /lib/libicuuc.so.74 (0x00007f)\n";
    assert_eq!(
      PlatformTools::Linux.parse_dependencies(output),
      vec!["linux-vdso.so.1", "libicuuc.so.74"]
    );
  }

  #[test]
  fn parse_otool() {
    let output = "dist/bin/agda:\n\t/opt/homebrew/opt/icu4c/lib/libicuuc.74.dylib (compatibility version 74.0.0, current version 74.2.0)\n\t/usr/lib/libSystem.B.dylib (compatibility version 1.0.0)\n";
    assert_eq!(
      PlatformTools::MacOs.parse_dependencies(output),
      vec!["/opt/homebrew/opt/icu4c/lib/libicuuc.74.dylib", "/usr/lib/libSystem.B.dylib"]
    );
  }

  #[test]
  fn parse_dumpbin() {
    let output = "Dump of file agda.exe\n\nFile Type: EXECUTABLE IMAGE\n\n  Image has the following dependencies:\n\n    icuuc74.dll\n    KERNEL32.dll\n\n  Summary\n";
    assert_eq!(
      PlatformTools::Windows.parse_dependencies(output),
      vec!["icuuc74.dll", "KERNEL32.dll"]
    );
  }

  #[test]
  fn icu_library_names_use_major_version() {
    assert_eq!(
      PlatformTools::Linux.icu_library_names(&icu()),
      vec!["libicudata.so.74", "libicui18n.so.74", "libicuuc.so.74"]
    );
    assert_eq!(
      PlatformTools::Windows.icu_library_names(&icu()),
      vec!["icudt74.dll", "icuin74.dll", "icuuc74.dll"]
    );
  }

  #[test]
  fn macos_relinks_each_reference() {
    let deps = vec!["/opt/icu4c/lib/libicuuc.74.dylib".to_string()];
    let names = PlatformTools::MacOs.icu_library_names(&icu());
    let cmds = PlatformTools::MacOs.relink_cmds(Path::new("agda"), &names, &deps);
    assert_eq!(cmds.len(), 1);
    assert_eq!(
      cmds[0].to_string(),
      "install_name_tool -change /opt/icu4c/lib/libicuuc.74.dylib @executable_path/../lib/libicuuc.74.dylib agda"
    );
  }

  #[tokio::test]
  async fn inspection_failure_is_swallowed() {
    let executor = Arc::new(RecordingExecutor::new(|_| failed("ldd: not a dynamic executable")));
    let toolbox = Toolbox::new(Os::Linux, executor.clone());
    assert_eq!(toolbox.inspect(Path::new("agda")).await, None);
    assert_eq!(executor.calls().len(), 1);
  }

  #[tokio::test]
  async fn upx_version_from_banner() {
    let executor = Arc::new(RecordingExecutor::new(|_| ok("upx 4.2.2\nUCL data compression library 1.03\n")));
    let toolbox = Toolbox::new(Os::Linux, executor);
    assert_eq!(toolbox.upx_version().await.unwrap(), "4.2.2");
  }

  #[tokio::test]
  async fn install_icu_on_macos_uses_brew_prefix() {
    let executor = Arc::new(RecordingExecutor::new(|cmd| match cmd.args.first().map(String::as_str) {
      Some("--prefix") => ok("/opt/homebrew/opt/icu4c\n"),
      Some("--modversion") => ok("74.2\n"),
      Some("--variable=includedir") => ok("/opt/homebrew/opt/icu4c/include"),
      Some("--variable=libdir") => ok("/opt/homebrew/opt/icu4c/lib"),
      _ => ok(""),
    }));
    let toolbox = Toolbox::new(Os::MacOs, executor.clone());

    let icu = toolbox.install_icu().await.unwrap();
    assert_eq!(icu.version, "74.2");
    assert_eq!(icu.lib_dir, PathBuf::from("/opt/homebrew/opt/icu4c/lib"));

    let expected = Path::new("/opt/homebrew/opt/icu4c")
      .join("lib")
      .join("pkgconfig")
      .to_string_lossy()
      .into_owned();
    let pkg_config = executor.calls().into_iter().find(|c| c.program == "pkg-config").unwrap();
    assert_eq!(pkg_config.env.get("PKG_CONFIG_PATH"), Some(&expected));
  }

  #[tokio::test]
  async fn bundle_icu_copies_and_relinks() {
    let temp = tempfile::TempDir::new().unwrap();
    let lib_dir = temp.path().join("icu/lib");
    std::fs::create_dir_all(&lib_dir).unwrap();
    for name in ["libicudata.so.74", "libicui18n.so.74", "libicuuc.so.74"] {
      std::fs::write(lib_dir.join(name), name).unwrap();
    }
    let icu = IcuInstall {
      lib_dir,
      ..icu()
    };

    let dist = temp.path().join("dist");
    let exe = dist.join("bin/agda");
    let executor = Arc::new(RecordingExecutor::succeeding());
    let toolbox = Toolbox::new(Os::Linux, executor.clone());

    let bundled = toolbox.bundle_icu(&icu, &dist, std::slice::from_ref(&exe)).await.unwrap();

    assert_eq!(bundled.len(), 3);
    assert!(dist.join("lib/libicuuc.so.74").exists());
    assert!(
      executor
        .command_lines()
        .iter()
        .any(|line| line.starts_with("patchelf --set-rpath $ORIGIN/../lib"))
    );
  }

  #[tokio::test]
  async fn bundle_icu_missing_library() {
    let temp = tempfile::TempDir::new().unwrap();
    let icu = IcuInstall {
      lib_dir: temp.path().to_path_buf(),
      ..icu()
    };
    let toolbox = Toolbox::new(Os::Linux, Arc::new(RecordingExecutor::succeeding()));
    let result = toolbox.bundle_icu(&icu, &temp.path().join("dist"), &[]).await;
    assert!(matches!(result, Err(ToolError::MissingLibrary(_))));
  }
}
