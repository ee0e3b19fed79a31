//! Persisted domain event log

use crate::errors::{from_rusqlite, Result};
use dyncohort_core::events::{DomainEvent, EventSink};
use rusqlite::Connection;

/// One row of `dc_event_log`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLogEntry {
    pub id: i64,
    pub event_name: String,
    pub rule_id: Option<i64>,
    pub payload: String,
    pub created_at: i64,
}

/// Event sink appending to `dc_event_log`
pub struct SqliteEventLog<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteEventLog<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn append(&self, event: &DomainEvent) -> Result<i64> {
        let payload = event.payload()?;
        self.conn
            .execute(
                "INSERT INTO dc_event_log (event_name, rule_id, payload, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    event.name(),
                    event.rule_id(),
                    payload,
                    chrono::Utc::now().timestamp(),
                ],
            )
            .map_err(from_rusqlite)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Entries in insertion order, optionally for one rule only
    pub fn entries(&self, rule_id: Option<i64>) -> Result<Vec<EventLogEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, event_name, rule_id, payload, created_at FROM dc_event_log
                 WHERE ?1 IS NULL OR rule_id = ?1 ORDER BY id",
            )
            .map_err(from_rusqlite)?;
        let entries = stmt
            .query_map([rule_id], |row| {
                Ok(EventLogEntry {
                    id: row.get(0)?,
                    event_name: row.get(1)?,
                    rule_id: row.get(2)?,
                    payload: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(entries)
    }

    pub fn count(&self, event_name: &str) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM dc_event_log WHERE event_name = ?",
                [event_name],
                |row| row.get(0),
            )
            .map_err(from_rusqlite)
    }
}

impl EventSink for SqliteEventLog<'_> {
    fn emit(&self, event: &DomainEvent) -> dyncohort_core::Result<()> {
        self.append(event)
            .map(|_| ())
            .map_err(|e| dyncohort_core::errors::DynCohortError::Internal {
                message: e.to_string(),
            })
    }
}
