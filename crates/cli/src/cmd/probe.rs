//! `agdist probe`: look up the default-named distribution in the index.

use std::sync::Arc;

use anyhow::{Context, Result};

use agdist_lib::dist::Pipeline;
use agdist_lib::exec::ProcessExecutor;

use crate::cmd::ConfigArgs;
use crate::output::{OutputFormat, print_info, print_json, print_stat, print_success};

pub fn cmd_probe(config: &ConfigArgs, format: OutputFormat) -> Result<()> {
  let session = config.load()?;
  let options = session.resolve()?;
  let pipeline = Pipeline::new(&session.context, Arc::new(ProcessExecutor));
  let probe = pipeline.probe(&options).context("Failed to render probe key")?;

  if format.is_json() {
    return print_json(&probe);
  }

  match &probe.url {
    Some(url) => {
      print_success(&format!("Prebuilt distribution found: {}", probe.key));
      print_stat("url", url);
    }
    None => {
      print_info(&format!("No prebuilt distribution for {}", probe.key));
      if options.flags.force_no_build {
        print_stat("force-no-build", "a build would fail");
      }
    }
  }

  Ok(())
}
