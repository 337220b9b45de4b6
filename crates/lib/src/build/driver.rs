//! Command lines for the two supported build tools.

use std::path::Path;

use crate::compat::Features;
use crate::consts::EXECUTABLES;
use crate::exec::Cmd;
use crate::options::BuildOptions;

const CLUSTER_COUNTING_FLAG: &str = "enable-cluster-counting";
const OPTIMISE_HEAVILY_FLAG: &str = "optimise-heavily";

/// The build tool used to compile Agda.
///
/// Cabal builds and then needs a separate install step to copy the
/// executables out; Stack copies them as part of the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildDriver {
  Cabal,
  Stack,
}

impl BuildDriver {
  pub fn for_options(options: &BuildOptions) -> Self {
    if options.flags.enable_stack { Self::Stack } else { Self::Cabal }
  }

  pub fn program(&self) -> &'static str {
    match self {
      Self::Cabal => "cabal",
      Self::Stack => "stack",
    }
  }

  /// Package flags for the enabled features.
  pub fn flag_args(&self, features: &Features) -> Vec<String> {
    let mut flags = Vec::new();
    if features.cluster_counting {
      flags.push(CLUSTER_COUNTING_FLAG);
    }
    if features.optimise_heavily {
      flags.push(OPTIMISE_HEAVILY_FLAG);
    }

    match self {
      Self::Cabal if flags.is_empty() => Vec::new(),
      Self::Cabal => {
        let joined = flags.iter().map(|f| format!("+{f}")).collect::<Vec<_>>().join(" ");
        vec![format!("--flags={joined}")]
      }
      Self::Stack => flags.iter().map(|f| format!("--flag=Agda:{f}")).collect(),
    }
  }

  /// Arguments shared by the build and install steps.
  pub fn config_args(&self, options: &BuildOptions, features: &Features) -> Vec<String> {
    let mut args = self.flag_args(features);

    match self {
      Self::Cabal => {
        if features.executable_static {
          args.push("--enable-executable-static".to_string());
        }
        if features.split_sections {
          args.push("--enable-split-sections".to_string());
        }
      }
      Self::Stack => {
        args.push("--system-ghc".to_string());
        args.push("--no-install-ghc".to_string());
        if features.executable_static {
          args.push("--ghc-options=-optl-static".to_string());
        }
        if features.split_sections {
          args.push("--ghc-options=-split-sections".to_string());
        }
      }
    }

    for dir in &options.extra_include_dirs {
      args.push(format!("--extra-include-dirs={}", dir.display()));
    }
    for dir in &options.extra_lib_dirs {
      args.push(format!("--extra-lib-dirs={}", dir.display()));
    }
    args
  }

  /// Build the executables inside `source`.
  pub fn build_cmd(&self, options: &BuildOptions, features: &Features, source: &Path, bin_dir: &Path) -> Cmd {
    let cmd = Cmd::new(self.program()).cwd(source).arg("build");
    match self {
      Self::Cabal => cmd
        .args(EXECUTABLES.iter().map(|exe| format!("exe:{exe}")))
        .args(self.config_args(options, features)),
      Self::Stack => cmd
        .args(self.config_args(options, features))
        .arg("--copy-bins")
        .arg(format!("--local-bin-path={}", bin_dir.display())),
    }
  }

  /// Copy the built executables into `bin_dir`. Stack has no separate step.
  pub fn install_cmd(&self, options: &BuildOptions, features: &Features, source: &Path, bin_dir: &Path) -> Option<Cmd> {
    match self {
      Self::Cabal => Some(
        Cmd::new(self.program())
          .cwd(source)
          .arg("install")
          .args(EXECUTABLES.iter().map(|exe| format!("exe:{exe}")))
          .args(self.config_args(options, features))
          .arg(format!("--installdir={}", bin_dir.display()))
          .arg("--install-method=copy")
          .arg("--overwrite-policy=always"),
      ),
      Self::Stack => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use super::*;
  use crate::options::Flags;

  fn options() -> BuildOptions {
    BuildOptions {
      agda: "2.6.4".to_string(),
      ghc: "9.4.7".to_string(),
      ghc_version_range: "*".to_string(),
      cabal: "3.10.3.0".to_string(),
      stack: "2.15.7".to_string(),
      bdist_name: String::new(),
      bdist_retention_days: 8,
      extra_include_dirs: vec![PathBuf::from("/opt/icu/include")],
      extra_lib_dirs: vec![PathBuf::from("/opt/icu/lib")],
      flags: Flags::default(),
      icu: None,
      upx: None,
      package_info: None,
    }
  }

  fn features(cluster_counting: bool, optimise_heavily: bool) -> Features {
    Features {
      cluster_counting,
      optimise_heavily,
      executable_static: false,
      split_sections: true,
      compress_executables: false,
    }
  }

  #[test]
  fn driver_follows_enable_stack() {
    let mut o = options();
    assert_eq!(BuildDriver::for_options(&o), BuildDriver::Cabal);
    o.flags.enable_stack = true;
    assert_eq!(BuildDriver::for_options(&o), BuildDriver::Stack);
  }

  #[test]
  fn cabal_flags_are_one_argument() {
    let args = BuildDriver::Cabal.flag_args(&features(true, true));
    assert_eq!(args, vec!["--flags=+enable-cluster-counting +optimise-heavily"]);
    assert!(BuildDriver::Cabal.flag_args(&features(false, false)).is_empty());
  }

  #[test]
  fn stack_flags_are_qualified() {
    let args = BuildDriver::Stack.flag_args(&features(false, true));
    assert_eq!(args, vec!["--flag=Agda:optimise-heavily"]);
  }

  #[test]
  fn cabal_build_and_install() {
    let o = options();
    let f = features(true, false);
    let source = Path::new("/src/agda");
    let bin = Path::new("/work/bin");

    let build = BuildDriver::Cabal.build_cmd(&o, &f, source, bin);
    assert_eq!(
      build.to_string(),
      "cabal build exe:agda exe:agda-mode --flags=+enable-cluster-counting --enable-split-sections \
       --extra-include-dirs=/opt/icu/include --extra-lib-dirs=/opt/icu/lib"
    );
    assert_eq!(build.cwd.as_deref(), Some(source));

    let install = BuildDriver::Cabal.install_cmd(&o, &f, source, bin).unwrap();
    assert!(install.args.contains(&"--installdir=/work/bin".to_string()));
    assert!(install.args.contains(&"--install-method=copy".to_string()));
  }

  #[test]
  fn stack_copies_bins_while_building() {
    let o = options();
    let f = features(false, false);
    let bin = Path::new("/work/bin");

    let build = BuildDriver::Stack.build_cmd(&o, &f, Path::new("/src"), bin);
    assert!(build.args.contains(&"--copy-bins".to_string()));
    assert!(build.args.contains(&"--local-bin-path=/work/bin".to_string()));
    assert!(BuildDriver::Stack.install_cmd(&o, &f, Path::new("/src"), bin).is_none());
  }
}
