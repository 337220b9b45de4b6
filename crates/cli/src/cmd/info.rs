//! `agdist info`: show what was detected about the running system.

use anyhow::Result;

use agdist_lib::platform::paths;

use crate::cmd::ConfigArgs;
use crate::output::{OutputFormat, print_json, print_stat};

pub fn cmd_info(config: &ConfigArgs, format: OutputFormat) -> Result<()> {
  let session = config.load()?;
  let ctx = &session.context;

  if format.is_json() {
    return print_json(&serde_json::json!({
      "platform": ctx.platform.triple(),
      "arch": ctx.platform.arch.as_str(),
      "os": ctx.os().as_str(),
      "release": ctx.release,
      "index_entries": ctx.index.len(),
      "data_dir": paths::data_dir(),
      "cache_dir": paths::cache_dir(),
      "artifacts_dir": paths::artifacts_dir(),
    }));
  }

  println!("System:");
  print_stat("Platform", &ctx.platform.triple());
  print_stat("Release", &ctx.release);
  print_stat("Index entries", &ctx.index.len().to_string());
  println!();
  println!("Paths:");
  print_stat("Data", &paths::data_dir().display().to_string());
  print_stat("Cache", &paths::cache_dir().display().to_string());
  print_stat("Artifacts", &paths::artifacts_dir().display().to_string());

  Ok(())
}
