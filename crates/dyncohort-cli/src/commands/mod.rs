//! CLI command handlers

use std::path::PathBuf;

use dyncohort_engine::{Engine, Settings};
use dyncohort_store::db::open_and_migrate;

pub mod migrate;
pub mod process;
pub mod rule;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Database and settings selected on the command line
#[derive(Debug, Clone)]
pub struct Target {
    pub db: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

impl Target {
    pub fn settings(&self) -> Result<Settings, Box<dyn std::error::Error>> {
        let mut settings = Settings::load(self.config.as_deref())?;
        if let Some(db) = &self.db {
            settings.database_path = db.clone();
        }
        Ok(settings)
    }

    /// Engine over the migrated database
    pub fn engine(&self) -> Result<Engine, Box<dyn std::error::Error>> {
        let settings = self.settings()?;
        let conn = open_and_migrate(&settings.database_path)?;
        Ok(Engine::new(conn, settings))
    }
}

/// Print a value as pretty JSON on stdout
pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
