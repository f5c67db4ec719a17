//! filemeta CLI
//!
//! Maintenance tools for filemeta stores.
//!
//! # Commands
//!
//! - `inspect` - Record counts per status and log size
//! - `list` - List records, optionally filtered
//! - `show` - Show the first record matching an id
//! - `remove` - Remove every record under an id prefix
//! - `set-status` / `set-note` - Update one record
//! - `verify` - Check the log and decode every record
//! - `compact` - Rewrite the log with live records only

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// filemeta command-line store tools.
#[derive(Parser)]
#[command(name = "filemeta")]
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

/// Output format for listing commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human readable.
    Text,
    /// Pretty-printed JSON.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Display record counts and log size
    Inspect {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// List records
    List {
        /// Only records in this status
        #[arg(short, long)]
        status: Option<String>,

        /// Only records of this file type
        #[arg(short = 't', long = "type")]
        file_type: Option<String>,

        /// Only records whose groups start with these, outermost first
        #[arg(short, long = "group")]
        groups: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Show the first record whose id starts with ID
    Show {
        /// Id or id prefix
        id: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Remove every record whose id starts with ID
    Remove {
        /// Id prefix
        id: String,
    },

    /// Move a record to another status
    SetStatus {
        /// Id or id prefix
        id: String,
        /// New status
        status: String,
    },

    /// Replace a record's note
    SetNote {
        /// Id or id prefix
        id: String,
        /// New note
        note: String,
    },

    /// Verify log integrity and decode every record
    Verify,

    /// Rewrite the log with only live records
    Compact,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let path = || cli.path.clone().ok_or("store path required (--path)");

    match cli.command {
        Commands::Inspect { format } => commands::inspect::run(&path()?, format)?,
        Commands::List {
            status,
            file_type,
            groups,
            format,
        } => {
            let filter = commands::list::ListFilter {
                status,
                file_type,
                groups,
            };
            commands::list::run(&path()?, &filter, format)?;
        }
        Commands::Show { id, format } => commands::show::run(&path()?, &id, format)?,
        Commands::Remove { id } => commands::modify::remove(&path()?, &id)?,
        Commands::SetStatus { id, status } => {
            commands::modify::set_status(&path()?, &id, &status)?;
        }
        Commands::SetNote { id, note } => commands::modify::set_note(&path()?, &id, &note)?,
        Commands::Verify => {
            let report = commands::verify::run(&path()?)?;
            if !report.is_ok() {
                std::process::exit(1);
            }
        }
        Commands::Compact => commands::compact::run(&path()?)?,
        Commands::Version => {
            println!("filemeta CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
