//! Syncwatch CLI
//!
//! Command-line tools for verifying that an entry reached its external
//! accounting system.
//!
//! # Commands
//!
//! - `simulate` - Run a reconciliation against a scripted sequence of signals
//! - `watch` - Trigger and watch a live sync through a REST status endpoint
//! - `profiles` - Print the effective configuration

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use syncwatch_engine::{EngineConfig, Lifecycle};
use tracing_subscriber::EnvFilter;

/// Syncwatch command-line sync verification tools.
#[derive(Parser)]
#[command(name = "syncwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a JSON engine configuration
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// JSON document
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LifecycleArg {
    /// First sync of the entry
    New,
    /// Re-sync of an entry that already exists
    Existing,
}

impl From<LifecycleArg> for Lifecycle {
    fn from(arg: LifecycleArg) -> Self {
        match arg {
            LifecycleArg::New => Lifecycle::New,
            LifecycleArg::Existing => Lifecycle::Existing,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation against scripted signals (no real waiting)
    Simulate {
        /// Whether the entry existed before this run
        #[arg(short, long, value_enum, default_value = "new")]
        lifecycle: LifecycleArg,

        /// Comma-separated signals: success, pending, failure, unknown,
        /// timeout, error, or any status text
        #[arg(short, long, value_delimiter = ',')]
        signals: Vec<String>,

        /// Make the trigger action fail
        #[arg(long)]
        trigger_fails: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Trigger a sync over HTTP and watch it to a verdict
    Watch {
        /// Base URL of the API
        #[arg(short, long)]
        url: String,

        /// Entry ID
        #[arg(short, long)]
        entry: String,

        /// The entry was already synced before
        #[arg(long)]
        existing: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Print the effective configuration
    Profiles,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Simulate {
            lifecycle,
            signals,
            trigger_fails,
            format,
        } => {
            commands::simulate::run(config, lifecycle.into(), &signals, trigger_fails, format)?;
        }
        Commands::Watch {
            url,
            entry,
            existing,
            format,
        } => {
            commands::watch::run(config, &url, &entry, Lifecycle::from_marker(existing), format)?;
        }
        Commands::Profiles => {
            commands::profiles::run(&config)?;
        }
        Commands::Version => {
            println!("Syncwatch CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
