//! idsync CLI
//!
//! Command-line interface for snapshot diffs and reconciliation runs

use clap::{Parser, Subcommand};
use idsync_core::logging_facility::{self, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "idsync")]
#[command(about = "idsync - Incremental identity reconciliation", long_about = None)]
struct Cli {
    /// Logging profile: development or production
    #[arg(long, global = true, default_value = "development")]
    log_profile: Profile,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compute the change set between two snapshot files
    Diff(commands::diff::DiffArgs),
    /// Run a reconciliation task over a folder layout
    Reconcile(commands::reconcile::ReconcileArgs),
}

fn main() {
    let cli = Cli::parse();
    logging_facility::init(cli.log_profile);

    let result = match cli.command {
        Commands::Diff(args) => commands::diff::execute(args),
        Commands::Reconcile(args) => commands::reconcile::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
