//! recstore CLI
//!
//! Command-line tools for recstore directories.
//!
//! # Commands
//!
//! - `inspect` - Display store statistics and metadata
//! - `verify` - Check allocator and index invariants
//! - `get` - Print a single record
//! - `named` - List or look up named roots
//! - `dump-log` - Dump transaction log entries for debugging

mod commands;
mod error;

use clap::{Parser, Subcommand};
use error::CliError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// recstore command-line tools.
#[derive(Parser)]
#[command(name = "recstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display store statistics and metadata
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check allocator and index invariants
    Verify {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print a single record
    Get {
        /// Record id
        recid: u64,

        /// Print the payload as UTF-8 instead of hex
        #[arg(short, long)]
        utf8: bool,
    },

    /// List named roots, or look one up
    Named {
        /// Name to look up
        name: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Dump transaction log entries for debugging
    DumpLog {
        /// Maximum number of entries to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

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

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or(CliError::PathRequired { command: "inspect" })?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify { format } => {
            let path = cli.path.ok_or(CliError::PathRequired { command: "verify" })?;
            commands::verify::run(&path, &format)?;
        }
        Commands::Get { recid, utf8 } => {
            let path = cli.path.ok_or(CliError::PathRequired { command: "get" })?;
            commands::get::run(&path, recid, utf8)?;
        }
        Commands::Named { name, format } => {
            let path = cli.path.ok_or(CliError::PathRequired { command: "named" })?;
            commands::named::run(&path, name.as_deref(), &format)?;
        }
        Commands::DumpLog { limit, format } => {
            let path = cli.path.ok_or(CliError::PathRequired { command: "dump-log" })?;
            commands::dump_log::run(&path, limit, &format)?;
        }
        Commands::Version => {
            println!("recstore CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("recstore core v{}", recstore_core::VERSION);
        }
    }

    Ok(())
}
