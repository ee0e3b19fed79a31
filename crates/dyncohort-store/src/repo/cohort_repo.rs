//! Cohort lookups and membership writes

use crate::errors::{from_rusqlite, Result};
use dyncohort_core::catalog::CohortInfo;
use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeSet;

/// Component recorded on cohorts whose membership a rule manages
pub const MANAGED_COMPONENT: &str = "tool_dynamic_cohorts";

pub struct CohortRepo;

impl CohortRepo {
    pub fn get(conn: &Connection, cohort_id: i64) -> Result<Option<CohortInfo>> {
        conn.query_row(
            "SELECT id, name, component FROM cohort WHERE id = ?",
            [cohort_id],
            |row| {
                Ok(CohortInfo {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    component: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(from_rusqlite)
    }

    /// Current member ids of a cohort
    pub fn members(conn: &Connection, cohort_id: i64) -> Result<BTreeSet<i64>> {
        let mut stmt = conn
            .prepare("SELECT userid FROM cohort_members WHERE cohortid = ?")
            .map_err(from_rusqlite)?;
        let members = stmt
            .query_map([cohort_id], |row| row.get(0))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<BTreeSet<i64>, _>>()
            .map_err(from_rusqlite)?;
        Ok(members)
    }

    pub fn is_member(conn: &Connection, cohort_id: i64, user_id: i64) -> Result<bool> {
        conn.prepare("SELECT 1 FROM cohort_members WHERE cohortid = ? AND userid = ?")
            .and_then(|mut stmt| stmt.exists([cohort_id, user_id]))
            .map_err(from_rusqlite)
    }

    /// Returns false when the user already was a member
    pub fn add_member(conn: &Connection, cohort_id: i64, user_id: i64, now: i64) -> Result<bool> {
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO cohort_members (cohortid, userid, timeadded)
                 VALUES (?1, ?2, ?3)",
                [cohort_id, user_id, now],
            )
            .map_err(from_rusqlite)?;
        Ok(inserted > 0)
    }

    /// Returns false when the user was not a member
    pub fn remove_member(conn: &Connection, cohort_id: i64, user_id: i64) -> Result<bool> {
        let removed = conn
            .execute(
                "DELETE FROM cohort_members WHERE cohortid = ? AND userid = ?",
                [cohort_id, user_id],
            )
            .map_err(from_rusqlite)?;
        Ok(removed > 0)
    }

    /// Add many users through one prepared statement; returns the number added
    pub fn add_members(
        conn: &Connection,
        cohort_id: i64,
        user_ids: &BTreeSet<i64>,
        now: i64,
    ) -> Result<usize> {
        let mut stmt = conn
            .prepare(
                "INSERT OR IGNORE INTO cohort_members (cohortid, userid, timeadded)
                 VALUES (?1, ?2, ?3)",
            )
            .map_err(from_rusqlite)?;
        let mut added = 0;
        for user_id in user_ids {
            added += stmt
                .execute([cohort_id, *user_id, now])
                .map_err(from_rusqlite)?;
        }
        Ok(added)
    }

    /// Remove many users through one prepared statement; returns the number removed
    pub fn remove_members(
        conn: &Connection,
        cohort_id: i64,
        user_ids: &BTreeSet<i64>,
    ) -> Result<usize> {
        let mut stmt = conn
            .prepare("DELETE FROM cohort_members WHERE cohortid = ? AND userid = ?")
            .map_err(from_rusqlite)?;
        let mut removed = 0;
        for user_id in user_ids {
            removed += stmt.execute([cohort_id, *user_id]).map_err(from_rusqlite)?;
        }
        Ok(removed)
    }

    pub fn remove_all_members(conn: &Connection, cohort_id: i64) -> Result<usize> {
        conn.execute("DELETE FROM cohort_members WHERE cohortid = ?", [cohort_id])
            .map_err(from_rusqlite)
    }

    /// Record which component manages a cohort; empty releases it
    pub fn set_component(
        conn: &Connection,
        cohort_id: i64,
        component: &str,
        now: i64,
    ) -> Result<()> {
        conn.execute(
            "UPDATE cohort SET component = ?1, timemodified = ?2 WHERE id = ?3",
            rusqlite::params![component, now, cohort_id],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }
}
