//! # rpv
//!
//! Check replica placement against rule cases and constraint files.
//!
//! ## Commands
//!
//! - `list`: Show the case catalog
//! - `show`: Print a case's placement strategy document
//! - `run`: Run one case against a cluster snapshot
//! - `run-all`: Run every enabled case
//! - `verify`: Check a constraint file against a cluster snapshot
//!
//! ## Example
//!
//! ```bash
//! # What is there
//! rpv list --all
//!
//! # One case
//! rpv run replica-topology-spread --snapshot cluster.json
//!
//! # Ad-hoc constraints, JSON report
//! rpv verify --snapshot cluster.json --constraints constraints.toml --json
//! ```

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{list, run, show, verify};
use config::Config;

/// Check replica placement against rule cases and constraint files.
#[derive(Parser, Debug)]
#[command(name = "rpv")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: rpv.toml in the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the case catalog
    List {
        /// Only cases of this suite
        #[arg(long)]
        suite: Option<String>,

        /// Include disabled cases
        #[arg(long)]
        all: bool,
    },

    /// Print a case's placement strategy document
    Show {
        /// Case name
        case: String,
    },

    /// Run one case against a cluster snapshot
    Run {
        /// Case name
        case: String,

        /// Cluster snapshot (JSON)
        #[arg(long, short)]
        snapshot: Option<PathBuf>,

        /// Print a JSON report
        #[arg(long)]
        json: bool,

        /// Stop at the first failing volume
        #[arg(long)]
        fail_fast: bool,
    },

    /// Run every enabled case against a cluster snapshot
    RunAll {
        /// Cluster snapshot (JSON)
        #[arg(long, short)]
        snapshot: Option<PathBuf>,

        /// Only cases of this suite
        #[arg(long)]
        suite: Option<String>,

        /// Print a JSON report
        #[arg(long)]
        json: bool,

        /// Stop at the first failing case
        #[arg(long)]
        fail_fast: bool,
    },

    /// Check a constraint file against a cluster snapshot
    Verify {
        /// Cluster snapshot (JSON)
        #[arg(long, short)]
        snapshot: Option<PathBuf>,

        /// Constraint file (TOML, or JSON by extension)
        #[arg(long, short)]
        constraints: PathBuf,

        /// Print a JSON report
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(cli.verbose, &config);

    let passed = match cli.command {
        Commands::List { suite, all } => list::run(suite.as_deref(), all)?,
        Commands::Show { case } => show::run(&case)?,
        Commands::Run {
            case,
            snapshot,
            json,
            fail_fast,
        } => {
            let snapshot = snapshot_path(snapshot, &config)?;
            run::one(
                &case,
                &snapshot,
                json || config.output.json,
                fail_fast || config.runner.fail_fast,
            )
            .await?
        }
        Commands::RunAll {
            snapshot,
            suite,
            json,
            fail_fast,
        } => {
            let snapshot = snapshot_path(snapshot, &config)?;
            run::all(
                &snapshot,
                suite.as_deref(),
                json || config.output.json,
                fail_fast || config.runner.fail_fast,
            )
            .await?
        }
        Commands::Verify {
            snapshot,
            constraints,
            json,
        } => {
            let snapshot = snapshot_path(snapshot, &config)?;
            verify::run(&snapshot, &constraints, json || config.output.json).await?
        }
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}

/// `-v` wins over `RUST_LOG`, which wins over the config file.
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn snapshot_path(arg: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    arg.or_else(|| config.runner.snapshot.clone())
        .context("No snapshot given. Pass --snapshot or set runner.snapshot in the config file.")
}

/// Read a file into a string, naming the file on failure.
pub(crate) fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
