//! Batchflow command-line launcher.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use batchflow_logging::{init_logging, LogConfig};
use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser, Debug)]
#[command(name = "batchflow", version, about = "Typed batch conversion between files and databases")]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Do not write a log file under $BATCHFLOW_HOME/logs
    #[arg(long, global = true, env = "BATCHFLOW_NO_LOG_FILE")]
    no_log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream every record of a job from its source into its sink
    Run {
        /// Job file (TOML)
        job: PathBuf,
    },

    /// Validate a job's schemas and field mapping without touching data
    Check {
        /// Job file (TOML)
        job: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the first records a job would write
    Preview {
        /// Job file (TOML)
        job: PathBuf,

        /// Maximum number of records to show
        #[arg(short = 'n', long, default_value_t = cli::preview::DEFAULT_LIMIT)]
        limit: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run { job } => cli::run::run(cli::run::RunArgs { job }),
        Commands::Check { job, json } => cli::check::run(cli::check::CheckArgs { job, json }),
        Commands::Preview { job, limit, json } => {
            cli::preview::run(cli::preview::PreviewArgs { job, limit, json })
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: "batchflow",
        verbose: cli.verbose,
        log_file: !cli.no_log_file,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    match run_command(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:?}", err);
            ExitCode::from(1)
        }
    }
}
