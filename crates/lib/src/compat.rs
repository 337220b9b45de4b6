//! Compatibility rules for optional build features.
//!
//! Every rule is a conjunction of clauses from [`clause`]. A clause encodes
//! exactly one compatibility fact, so a new fact means a new clause rather
//! than an edit to an existing one. Clauses never fail: a version that cannot
//! be parsed makes its clause false, and with it the rule.

use serde::Serialize;

use crate::context::Context;
use crate::options::BuildOptions;
use crate::platform::os::Os;

/// Individual compatibility facts.
pub mod clause {
  use crate::options::BuildOptions;
  use crate::platform::os::Os;
  use crate::version;

  /// The `enable-cluster-counting` flag first appears in Agda 2.5.3.
  pub fn agda_has_cluster_counting_flag(o: &BuildOptions) -> bool {
    version::gte(&o.agda, "2.5.3")
  }

  /// text-icu only builds against current ICU releases from Agda 2.6.2 on.
  pub fn agda_supports_modern_icu(o: &BuildOptions) -> bool {
    version::gte(&o.agda, "2.6.2")
  }

  /// Stack passes the wrong search paths to text-icu's native dependency.
  pub fn not_built_with_stack(o: &BuildOptions) -> bool {
    !o.flags.enable_stack
  }

  pub fn cluster_counting_not_disabled(o: &BuildOptions) -> bool {
    !o.flags.force_no_cluster_counting
  }

  /// The `optimise-heavily` flag first appears in Agda 2.6.2.
  pub fn agda_has_optimise_heavily_flag(o: &BuildOptions) -> bool {
    version::gte(&o.agda, "2.6.2")
  }

  pub fn optimise_heavily_not_disabled(o: &BuildOptions) -> bool {
    !o.flags.force_no_optimise_heavily
  }

  /// Static linking against glibc fails on the Linux CI images.
  pub fn static_linking_supported_on(os: Os) -> bool {
    os != Os::Linux
  }

  /// `--enable-executable-static` requires GHC 8.4.
  pub fn ghc_supports_executable_static(o: &BuildOptions) -> bool {
    version::gte(&o.ghc, "8.4")
  }

  pub fn executable_static_not_disabled(o: &BuildOptions) -> bool {
    !o.flags.force_no_executable_static
  }

  /// Split sections has no effect on macOS.
  pub fn split_sections_effective_on(os: Os) -> bool {
    matches!(os, Os::Linux | Os::Windows)
  }

  /// `-split-sections` is available from GHC 8.0.
  pub fn ghc_supports_split_sections(o: &BuildOptions) -> bool {
    version::gte(&o.ghc, "8.0")
  }

  /// `--enable-split-sections` is available from Cabal 2.2.
  pub fn cabal_supports_split_sections(o: &BuildOptions) -> bool {
    version::gte(&o.cabal, "2.2")
  }

  pub fn split_sections_not_disabled(o: &BuildOptions) -> bool {
    !o.flags.force_no_split_sections
  }

  /// Compressed executables are unsigned, which breaks Gatekeeper on macOS
  /// and trips antivirus heuristics on Windows.
  pub fn compression_allowed_on(os: Os) -> bool {
    os == Os::Linux
  }

  /// Compression is opt-in.
  pub fn compression_requested(o: &BuildOptions) -> bool {
    o.flags.bdist_compress_exe
  }

  /// UPX produces broken binaries on macOS releases before 12.
  pub fn upx_supports_release(os: Os, release: &str) -> bool {
    os != Os::MacOs || version::gte(release, "12")
  }
}

/// Build Agda with the `enable-cluster-counting` flag.
pub fn cluster_counting(o: &BuildOptions) -> bool {
  clause::agda_has_cluster_counting_flag(o)
    && clause::cluster_counting_not_disabled(o)
    && clause::not_built_with_stack(o)
    && clause::agda_supports_modern_icu(o)
}

/// Build Agda with the `optimise-heavily` flag.
pub fn optimise_heavily(o: &BuildOptions) -> bool {
  clause::agda_has_optimise_heavily_flag(o) && clause::optimise_heavily_not_disabled(o)
}

/// Link executables statically.
pub fn executable_static(o: &BuildOptions, os: Os) -> bool {
  clause::static_linking_supported_on(os)
    && clause::ghc_supports_executable_static(o)
    && clause::executable_static_not_disabled(o)
}

/// Build with split sections.
pub fn split_sections(o: &BuildOptions, os: Os) -> bool {
  clause::split_sections_effective_on(os)
    && clause::ghc_supports_split_sections(o)
    && clause::cabal_supports_split_sections(o)
    && clause::split_sections_not_disabled(o)
}

/// Whether UPX can be used at all on this system.
pub fn upx_usable(ctx: &Context) -> bool {
  clause::upx_supports_release(ctx.os(), &ctx.release)
}

/// Compress the distributed executables with UPX.
pub fn compress_executables(o: &BuildOptions, ctx: &Context) -> bool {
  clause::compression_allowed_on(ctx.os()) && clause::compression_requested(o) && upx_usable(ctx)
}

/// Every feature decision for one set of options on one system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Features {
  pub cluster_counting: bool,
  pub optimise_heavily: bool,
  pub executable_static: bool,
  pub split_sections: bool,
  pub compress_executables: bool,
}

impl Features {
  pub fn evaluate(o: &BuildOptions, ctx: &Context) -> Self {
    Self {
      cluster_counting: cluster_counting(o),
      optimise_heavily: optimise_heavily(o),
      executable_static: executable_static(o, ctx.os()),
      split_sections: split_sections(o, ctx.os()),
      compress_executables: compress_executables(o, ctx),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::index::PackageIndex;
  use crate::options::Flags;
  use crate::platform::Platform;
  use crate::platform::arch::Arch;

  fn options(agda: &str, ghc: &str) -> BuildOptions {
    BuildOptions {
      agda: agda.to_string(),
      ghc: ghc.to_string(),
      ghc_version_range: "*".to_string(),
      cabal: "3.10.3.0".to_string(),
      stack: "2.15.7".to_string(),
      bdist_name: String::new(),
      bdist_retention_days: 8,
      extra_include_dirs: Vec::new(),
      extra_lib_dirs: Vec::new(),
      flags: Flags::default(),
      icu: None,
      upx: None,
      package_info: None,
    }
  }

  fn context(os: Os, release: &str) -> Context {
    Context::new(Platform::new(Arch::X86_64, os), release, PackageIndex::default())
  }

  #[test]
  fn scenario_linux_2_6_4_ghc_9_0_1() {
    let o = options("2.6.4", "9.0.1");
    assert!(cluster_counting(&o));
    assert!(optimise_heavily(&o));
    assert!(!executable_static(&o, Os::Linux));
    assert!(clause::ghc_supports_executable_static(&o));
  }

  #[test]
  fn cluster_counting_requires_2_5_3() {
    let mut o = options("2.5.0", "8.0.2");
    assert!(!cluster_counting(&o));

    o.flags.enable_stack = true;
    o.flags.force_no_cluster_counting = true;
    assert!(!cluster_counting(&o));
  }

  #[test]
  fn cluster_counting_between_2_5_3_and_2_6_2() {
    // The flag exists but text-icu cannot use a current ICU yet
    let o = options("2.5.3", "8.2.2");
    assert!(clause::agda_has_cluster_counting_flag(&o));
    assert!(!cluster_counting(&o));
  }

  #[test]
  fn stack_disables_cluster_counting() {
    let mut o = options("2.6.4", "9.4.7");
    o.flags.enable_stack = true;
    assert!(!cluster_counting(&o));
  }

  #[test]
  fn unparseable_versions_fail_closed() {
    let o = options("nightly", "9.x");
    assert!(!cluster_counting(&o));
    assert!(!optimise_heavily(&o));
    assert!(!executable_static(&o, Os::MacOs));
    assert!(!split_sections(&o, Os::Linux));
  }

  #[test]
  fn truncated_ghc_versions_compare_padded() {
    assert!(executable_static(&options("2.6.4", "8.4"), Os::MacOs));
    assert!(!executable_static(&options("2.6.4", "8.2.2"), Os::MacOs));
  }

  #[test]
  fn split_sections_by_platform_and_tools() {
    let mut o = options("2.6.4", "9.4.7");
    assert!(split_sections(&o, Os::Linux));
    assert!(split_sections(&o, Os::Windows));
    assert!(!split_sections(&o, Os::MacOs));

    o.cabal = "2.0.0.2".to_string();
    assert!(!split_sections(&o, Os::Linux));

    let o = options("2.5.2", "7.10.3");
    assert!(!split_sections(&o, Os::Linux));
  }

  #[test]
  fn compression_only_on_linux() {
    let mut o = options("2.6.4", "9.4.7");
    o.flags.bdist_compress_exe = true;
    assert!(compress_executables(&o, &context(Os::Linux, "22.04")));
    assert!(!compress_executables(&o, &context(Os::MacOs, "14.2")));
    assert!(!compress_executables(&o, &context(Os::Windows, "10")));
  }

  #[test]
  fn upx_on_old_macos() {
    assert!(!upx_usable(&context(Os::MacOs, "11.7.10")));
    assert!(upx_usable(&context(Os::MacOs, "12.0")));
    assert!(!upx_usable(&context(Os::MacOs, "unknown")));
    assert!(upx_usable(&context(Os::Linux, "unknown")));
  }

  /// Flipping a rule's opt-out only ever turns it off.
  #[test]
  fn opt_outs_only_disable() {
    type Rule = fn(&BuildOptions, &Context) -> bool;
    type Toggle = fn(&mut Flags);
    let rules: [(&str, Os, Rule, Toggle); 5] = [
      ("cluster-counting", Os::Linux, |o, _| cluster_counting(o), |f| {
        f.force_no_cluster_counting = !f.force_no_cluster_counting
      }),
      ("optimise-heavily", Os::Linux, |o, _| optimise_heavily(o), |f| {
        f.force_no_optimise_heavily = !f.force_no_optimise_heavily
      }),
      ("executable-static", Os::Windows, |o, c| executable_static(o, c.os()), |f| {
        f.force_no_executable_static = !f.force_no_executable_static
      }),
      ("split-sections", Os::Windows, |o, c| split_sections(o, c.os()), |f| {
        f.force_no_split_sections = !f.force_no_split_sections
      }),
      ("compress", Os::Linux, compress_executables, |f| {
        f.bdist_compress_exe = !f.bdist_compress_exe
      }),
    ];

    for (name, os, rule, toggle) in rules {
      let ctx = context(os, "10");
      let mut o = options("2.6.4", "9.4.7");
      o.flags.bdist_compress_exe = true;

      assert!(rule(&o, &ctx), "{name} should hold");
      toggle(&mut o.flags);
      assert!(!rule(&o, &ctx), "{name} should be disabled by its opt-out");
      toggle(&mut o.flags);
      assert!(rule(&o, &ctx), "{name} should hold again");
    }
  }

  #[test]
  fn features_summary() {
    let mut o = options("2.6.4", "9.0.1");
    o.flags.bdist_compress_exe = true;
    let features = Features::evaluate(&o, &context(Os::Linux, "22.04"));
    assert_eq!(
      features,
      Features {
        cluster_counting: true,
        optimise_heavily: true,
        executable_static: false,
        split_sections: true,
        compress_executables: true,
      }
    );
  }
}
