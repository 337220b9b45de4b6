mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::ConfigArgs;
use crate::output::{OutputFormat, print_error};

#[derive(Parser)]
#[command(name = "agdist")]
#[command(author, version, about = "Build, package and publish Agda binary distributions", long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(flatten)]
  config: ConfigArgs,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Resolve inputs and print the resulting build options
  Options,

  /// Print the name of the distribution the inputs describe
  Name,

  /// Look up a prebuilt distribution in the package index
  Probe,

  /// Download or build, package, verify and publish a distribution
  Build {
    /// Agda source checkout to build from
    #[arg(short, long, default_value = ".")]
    source: PathBuf,

    /// Scratch directory for build output and downloads
    #[arg(short, long)]
    work_dir: Option<PathBuf>,

    /// Directory published distributions are stored in
    #[arg(long)]
    store: Option<PathBuf>,
  },

  /// Print detected platform facts
  Info,
}

fn main() {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  if let Err(err) = run(cli) {
    print_error(&format!("{err:#}"));
    std::process::exit(1);
  }
}

fn run(cli: Cli) -> Result<()> {
  match cli.command {
    Commands::Options => cmd::cmd_options(&cli.config, cli.output),
    Commands::Name => cmd::cmd_name(&cli.config, cli.output),
    Commands::Probe => cmd::cmd_probe(&cli.config, cli.output),
    Commands::Build {
      source,
      work_dir,
      store,
    } => cmd::cmd_build(&cli.config, &source, work_dir, store, cli.output),
    Commands::Info => cmd::cmd_info(&cli.config, cli.output),
  }
}
