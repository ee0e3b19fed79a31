//! DynCohort CLI
//!
//! Command-line interface for dynamic cohort rules

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dyncohort_core::logging_facility::{init, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "dyncohort")]
#[command(about = "DynCohort - Rule-driven cohort membership", long_about = None)]
struct Cli {
    /// SQLite database (overrides settings and DYNCOHORT_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Settings file (defaults to ./dyncohort.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Human-readable debug logging instead of JSON
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    Migrate,
    /// Rule operations
    Rule(commands::rule::RuleArgs),
    /// Evaluate every enabled rule
    Process,
    /// Re-evaluate real-time rules for one user after a platform event
    Trigger(commands::process::TriggerArgs),
}

fn main() {
    let cli = Cli::parse();
    init(if cli.verbose {
        Profile::Development
    } else {
        Profile::Production
    });

    let target = commands::Target {
        db: cli.db,
        config: cli.config,
    };
    let result = match cli.command {
        Commands::Migrate => commands::migrate::execute(&target),
        Commands::Rule(args) => commands::rule::execute(&target, args),
        Commands::Process => commands::process::execute_process(&target),
        Commands::Trigger(args) => commands::process::execute_trigger(&target, args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
