use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

/// orchard - minimal continuous-integration build runner
#[derive(Parser)]
#[command(name = "orchard")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Orchard home directory (default: $ORCHARD_HOME or the data directory)
  #[arg(long, global = true, value_name = "DIR")]
  home: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every registered project
  Run,

  /// Build a single registered project
  Build {
    /// Name of the project, as listed in the registry
    project: String,
  },

  /// List registered projects
  Projects,
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::from_default_env()
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .without_time()
    .init();

  let home = cli.home.unwrap_or_else(orchard_lib::paths::home_dir);
  tracing::debug!(home = %home.display(), "using orchard home");

  match cli.command {
    Commands::Run => cmd::cmd_run(&home).await,
    Commands::Build { project } => cmd::cmd_build(&home, &project).await,
    Commands::Projects => cmd::cmd_projects(&home),
  }
}
