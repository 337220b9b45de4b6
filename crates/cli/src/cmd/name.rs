//! `agdist name`: print the distribution name.

use anyhow::{Context, Result};

use agdist_lib::template::distribution_name;

use crate::cmd::ConfigArgs;
use crate::output::{OutputFormat, print_json};

pub fn cmd_name(config: &ConfigArgs, format: OutputFormat) -> Result<()> {
  let session = config.load()?;
  let options = session.resolve()?;
  let name = distribution_name(&options, &session.context).context("Invalid bdist-name template")?;

  if format.is_json() {
    print_json(&serde_json::json!({ "name": name }))
  } else {
    // Bare so that scripts can capture it
    println!("{name}");
    Ok(())
  }
}
