//! `agdist options`: resolve inputs and show the build options and the
//! features they enable on this system.

use anyhow::Result;

use agdist_lib::compat::Features;

use crate::cmd::ConfigArgs;
use crate::output::{OutputFormat, print_json, print_stat, print_success};

pub fn cmd_options(config: &ConfigArgs, format: OutputFormat) -> Result<()> {
  let session = config.load()?;
  let options = session.resolve()?;
  let features = Features::evaluate(&options, &session.context);

  if format.is_json() {
    return print_json(&serde_json::json!({ "options": options, "features": features }));
  }

  print_success(&format!("Agda {} with GHC {}", options.agda, options.ghc));
  print_stat("ghc-version-range", &options.ghc_version_range);
  print_stat("build tool", options.build_tool());
  if options.flags.enable_stack {
    print_stat("stack-version", &options.stack);
  } else {
    print_stat("cabal-version", &options.cabal);
  }
  if !options.bdist_name.is_empty() {
    print_stat("bdist-name", &options.bdist_name);
  }
  print_stat("bdist-retention-days", &options.bdist_retention_days.to_string());
  for dir in &options.extra_include_dirs {
    print_stat("extra-include-dir", &dir.display().to_string());
  }
  for dir in &options.extra_lib_dirs {
    print_stat("extra-lib-dir", &dir.display().to_string());
  }

  println!();
  println!("Features:");
  print_stat("cluster-counting", &features.cluster_counting.to_string());
  print_stat("optimise-heavily", &features.optimise_heavily.to_string());
  print_stat("executable-static", &features.executable_static.to_string());
  print_stat("split-sections", &features.split_sections.to_string());
  print_stat("compress-executables", &features.compress_executables.to_string());

  Ok(())
}
