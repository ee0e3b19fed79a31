//! Database connection management
//!
//! Provides utilities for opening and managing SQLite connections

use crate::errors::{from_rusqlite, io_error, Result};
use crate::migrations::apply_migrations;
use rusqlite::Connection;
use std::path::Path;

/// Open a SQLite database at the given path, creating parent directories
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_error("open_database", e))?;
    }
    let conn = Connection::open(path).map_err(from_rusqlite)?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(from_rusqlite)?;
    configure(&conn)?;
    Ok(conn)
}

/// Open an in-memory SQLite database (for testing)
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().map_err(from_rusqlite)?;
    configure(&conn)?;
    Ok(conn)
}

/// Configure a connection; cascade deletes rely on foreign keys
pub fn configure(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(from_rusqlite)?;
    Ok(())
}

/// Open a database file and bring its schema up to date
pub fn open_and_migrate<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let mut conn = open(path)?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

/// In-memory database with every migration applied
pub fn open_in_memory_migrated() -> Result<Connection> {
    let mut conn = open_in_memory()?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}
