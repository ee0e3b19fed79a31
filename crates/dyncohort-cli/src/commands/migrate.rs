//! Schema migration command
//!
//! Usage: dyncohort migrate [--db <PATH>]

use dyncohort_store::db::open;
use dyncohort_store::migrations::{applied_migrations, apply_migrations};

use super::{CliResult, Target};

pub fn execute(target: &Target) -> CliResult {
    let settings = target.settings()?;
    let mut conn = open(&settings.database_path)?;
    apply_migrations(&mut conn)?;
    let applied = applied_migrations(&conn)?;
    println!("Database ready: {}", settings.database_path.display());
    for (migration_id, checksum) in applied {
        println!("  applied: {} ({})", migration_id, &checksum[..checksum.len().min(12)]);
    }
    Ok(())
}
