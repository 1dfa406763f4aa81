//! imgsync: publish image derivatives from a versioned source collection.
//!
//! # Usage
//!
//! ```text
//! imgsync run <SOURCE> <NAMESPACE> [--config <file>] [--dry-run] [--json]
//!             [--destination <dir>] [--volatile <dir>] [--canonical <dir>] [--lock-root <dir>]
//!             [--lenient] [--skip-conflicts] [--transfer rsync|copy] [--log-file <file>]
//! imgsync status <NAMESPACE> [--config <file>] [--json]
//! imgsync unlock <NAMESPACE> [--config <file>]
//! ```

mod commands;
mod log_rotation;
mod logging;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{run::RunArgs, status::StatusArgs, unlock::UnlockArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "imgsync",
    version,
    about = "Reconcile and publish image derivatives into a canonical tree",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish new and updated artifacts for one namespace.
    Run(RunArgs),

    /// Show lock, canonical and staging state for a namespace.
    Status(StatusArgs),

    /// Remove a run lock left behind by a killed run.
    Unlock(UnlockArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();
    if let Err(err) = dispatch(cli) {
        // One line per fatal condition: the context chain joined by ": ".
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Unlock(args) => args.run(),
    }
}
