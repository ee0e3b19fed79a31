//! Persistence of rules and their conditions
//!
//! Every function takes a `&Connection`; pass a `Transaction` (which derefs
//! to one) to group several writes atomically.

use crate::errors::{from_rusqlite, rule_not_found, Result};
use dyncohort_core::errors::{ExError, ExErrorKind};
use dyncohort_core::model::{Combinator, ConditionConfig, ConditionRecord, Rule, RuleDraft};
use rusqlite::{Connection, OptionalExtension, Row};
use std::collections::BTreeSet;

const RULE_COLUMNS: &str = "id, name, description, cohortid, operator, enabled, broken, \
     bulkprocessing, realtime, timecreated, timemodified";

/// Ids touched by a wholesale condition replacement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionChanges {
    pub created: Vec<i64>,
    pub updated: Vec<i64>,
    pub deleted: Vec<i64>,
}

/// SQLite repository for rules and conditions
pub struct RuleRepo;

impl RuleRepo {
    /// Insert a new rule row, disabled and not broken
    pub fn insert_rule(conn: &Connection, draft: &RuleDraft, now: i64) -> Result<i64> {
        conn.execute(
            "INSERT INTO dc_rules (name, description, cohortid, operator, enabled, broken,
                                   bulkprocessing, realtime, timecreated, timemodified)
             VALUES (?1, ?2, ?3, ?4, 0, 0, ?5, ?6, ?7, ?7)",
            rusqlite::params![
                draft.name.trim(),
                draft.description,
                draft.cohort_id,
                draft.combinator.as_str(),
                draft.bulk_processing,
                draft.realtime,
                now,
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(conn.last_insert_rowid())
    }

    /// Overwrite a rule's settings, leaving it disabled and not broken
    pub fn update_rule(conn: &Connection, rule_id: i64, draft: &RuleDraft, now: i64) -> Result<()> {
        let changed = conn
            .execute(
                "UPDATE dc_rules SET name = ?1, description = ?2, cohortid = ?3, operator = ?4,
                        enabled = 0, broken = 0, bulkprocessing = ?5, realtime = ?6,
                        timemodified = ?7
                 WHERE id = ?8",
                rusqlite::params![
                    draft.name.trim(),
                    draft.description,
                    draft.cohort_id,
                    draft.combinator.as_str(),
                    draft.bulk_processing,
                    draft.realtime,
                    now,
                    rule_id,
                ],
            )
            .map_err(from_rusqlite)?;
        if changed == 0 {
            return Err(rule_not_found(rule_id));
        }
        Ok(())
    }

    /// Load a rule with its conditions in sort order
    pub fn get_rule(conn: &Connection, rule_id: i64) -> Result<Option<Rule>> {
        let rule = conn
            .query_row(
                &format!("SELECT {} FROM dc_rules WHERE id = ?", RULE_COLUMNS),
                [rule_id],
                rule_from_row,
            )
            .optional()
            .map_err(from_rusqlite)?;

        match rule {
            Some(mut rule) => {
                rule.conditions = Self::load_conditions(conn, rule.id)?;
                Ok(Some(rule))
            }
            None => Ok(None),
        }
    }

    /// Like [`RuleRepo::get_rule`] but a missing rule is `NotFound`
    pub fn require_rule(conn: &Connection, rule_id: i64) -> Result<Rule> {
        Self::get_rule(conn, rule_id)?.ok_or_else(|| rule_not_found(rule_id))
    }

    /// Every rule ordered by id, conditions included
    pub fn list_rules(conn: &Connection) -> Result<Vec<Rule>> {
        Self::query_rules(conn, "", rusqlite::params![])
    }

    /// Rules populating a given cohort
    pub fn list_rules_for_cohort(conn: &Connection, cohort_id: i64) -> Result<Vec<Rule>> {
        Self::query_rules(conn, "WHERE cohortid = ?", [cohort_id])
    }

    fn query_rules<P: rusqlite::Params>(
        conn: &Connection,
        filter: &str,
        params: P,
    ) -> Result<Vec<Rule>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM dc_rules {} ORDER BY id",
                RULE_COLUMNS, filter
            ))
            .map_err(from_rusqlite)?;
        let mut rules = stmt
            .query_map(params, rule_from_row)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        drop(stmt);

        for rule in &mut rules {
            rule.conditions = Self::load_conditions(conn, rule.id)?;
        }
        Ok(rules)
    }

    /// Subset of `rule_ids` that exist
    pub fn existing_ids(conn: &Connection, rule_ids: &[i64]) -> Result<BTreeSet<i64>> {
        let mut stmt = conn
            .prepare("SELECT 1 FROM dc_rules WHERE id = ?")
            .map_err(from_rusqlite)?;
        let mut found = BTreeSet::new();
        for id in rule_ids {
            if stmt.exists([id]).map_err(from_rusqlite)? {
                found.insert(*id);
            }
        }
        Ok(found)
    }

    pub fn set_enabled(conn: &Connection, rule_id: i64, enabled: bool, now: i64) -> Result<()> {
        let changed = conn
            .execute(
                "UPDATE dc_rules SET enabled = ?1, timemodified = ?2 WHERE id = ?3",
                rusqlite::params![enabled, now, rule_id],
            )
            .map_err(from_rusqlite)?;
        if changed == 0 {
            return Err(rule_not_found(rule_id));
        }
        Ok(())
    }

    /// Flag a rule broken; broken rules are always disabled too
    pub fn mark_broken(conn: &Connection, rule_id: i64, now: i64) -> Result<()> {
        let changed = conn
            .execute(
                "UPDATE dc_rules SET broken = 1, enabled = 0, timemodified = ?1 WHERE id = ?2",
                rusqlite::params![now, rule_id],
            )
            .map_err(from_rusqlite)?;
        if changed == 0 {
            return Err(rule_not_found(rule_id));
        }
        Ok(())
    }

    /// Delete a rule; its conditions go with it through the cascade
    pub fn delete_rule(conn: &Connection, rule_id: i64) -> Result<()> {
        let changed = conn
            .execute("DELETE FROM dc_rules WHERE id = ?", [rule_id])
            .map_err(from_rusqlite)?;
        if changed == 0 {
            return Err(rule_not_found(rule_id));
        }
        Ok(())
    }

    pub fn load_conditions(conn: &Connection, rule_id: i64) -> Result<Vec<ConditionRecord>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, ruleid, kind, sortorder, configdata FROM dc_conditions
                 WHERE ruleid = ? ORDER BY sortorder, id",
            )
            .map_err(from_rusqlite)?;
        let rows = stmt
            .query_map([rule_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        rows.into_iter()
            .map(|(id, rule_id, kind, sort_order, raw)| {
                let config = ConditionConfig::from_json(&raw).map_err(|e| {
                    ExError::from(e)
                        .with_op("load_conditions")
                        .with_condition_id(id)
                })?;
                Ok(ConditionRecord {
                    id: Some(id),
                    rule_id,
                    kind,
                    sort_order,
                    config,
                })
            })
            .collect()
    }

    /// Replace a rule's conditions with `conditions`, in the given order
    ///
    /// Records carrying the id of one of the rule's conditions update it,
    /// records without an id are inserted, and existing conditions not
    /// mentioned are deleted.
    pub fn replace_conditions(
        conn: &Connection,
        rule_id: i64,
        conditions: &[ConditionRecord],
        now: i64,
    ) -> Result<ConditionChanges> {
        let existing: BTreeSet<i64> = Self::load_conditions(conn, rule_id)?
            .into_iter()
            .filter_map(|c| c.id)
            .collect();
        let mut changes = ConditionChanges::default();
        let mut kept = BTreeSet::new();

        for (position, condition) in conditions.iter().enumerate() {
            let sort_order = position as i64;
            let config = if condition.config.is_empty() {
                String::new()
            } else {
                condition.config.to_json()
            };
            match condition.id {
                Some(id) if existing.contains(&id) => {
                    conn.execute(
                        "UPDATE dc_conditions SET kind = ?1, configdata = ?2, sortorder = ?3,
                                timemodified = ?4
                         WHERE id = ?5",
                        rusqlite::params![condition.kind, config, sort_order, now, id],
                    )
                    .map_err(from_rusqlite)?;
                    kept.insert(id);
                    changes.updated.push(id);
                }
                Some(id) => {
                    return Err(ExError::new(ExErrorKind::NotFound)
                        .with_op("replace_conditions")
                        .with_rule_id(rule_id)
                        .with_condition_id(id)
                        .with_message(format!("Condition not found: {}", id)));
                }
                None => {
                    conn.execute(
                        "INSERT INTO dc_conditions (ruleid, kind, configdata, sortorder,
                                                    timecreated, timemodified)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                        rusqlite::params![rule_id, condition.kind, config, sort_order, now],
                    )
                    .map_err(from_rusqlite)?;
                    changes.created.push(conn.last_insert_rowid());
                }
            }
        }

        for id in existing.difference(&kept) {
            conn.execute("DELETE FROM dc_conditions WHERE id = ?", [id])
                .map_err(from_rusqlite)?;
            changes.deleted.push(*id);
        }

        Ok(changes)
    }
}

fn rule_from_row(row: &Row<'_>) -> rusqlite::Result<Rule> {
    let operator: String = row.get(4)?;
    Ok(Rule {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        cohort_id: row.get(3)?,
        combinator: if operator == "OR" {
            Combinator::Or
        } else {
            Combinator::And
        },
        enabled: row.get(5)?,
        broken: row.get(6)?,
        bulk_processing: row.get(7)?,
        realtime: row.get(8)?,
        conditions: Vec::new(),
        time_created: row.get(9)?,
        time_modified: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_migrated;

    fn draft() -> RuleDraft {
        let mut draft = RuleDraft::new("Recent logins", 3);
        draft.combinator = Combinator::Or;
        draft
    }

    fn login(operator: i64) -> ConditionRecord {
        ConditionRecord::new(
            "user_last_login",
            ConditionConfig::new().with("operator", operator),
        )
    }

    #[test]
    fn test_insert_and_load_rule() {
        let conn = open_in_memory_migrated().unwrap();
        let id = RuleRepo::insert_rule(&conn, &draft(), 100).unwrap();
        RuleRepo::replace_conditions(&conn, id, &[login(1), login(2)], 100).unwrap();

        let rule = RuleRepo::require_rule(&conn, id).unwrap();
        assert_eq!(rule.name, "Recent logins");
        assert_eq!(rule.combinator, Combinator::Or);
        assert!(!rule.enabled);
        assert!(!rule.broken);
        assert_eq!(rule.conditions.len(), 2);
        assert_eq!(rule.conditions[1].sort_order, 1);
        assert_eq!(rule.conditions[1].config.int("operator"), Some(2));
    }

    #[test]
    fn test_replace_conditions_updates_inserts_and_deletes() {
        let conn = open_in_memory_migrated().unwrap();
        let id = RuleRepo::insert_rule(&conn, &draft(), 100).unwrap();
        let first = RuleRepo::replace_conditions(&conn, id, &[login(1), login(2)], 100).unwrap();
        assert_eq!(first.created.len(), 2);

        let keep = login(3).with_id(first.created[1]);
        let changes = RuleRepo::replace_conditions(&conn, id, &[keep, login(4)], 200).unwrap();
        assert_eq!(changes.updated, vec![first.created[1]]);
        assert_eq!(changes.deleted, vec![first.created[0]]);
        assert_eq!(changes.created.len(), 1);

        let rule = RuleRepo::require_rule(&conn, id).unwrap();
        let operators: Vec<_> = rule
            .conditions
            .iter()
            .map(|c| c.config.int("operator"))
            .collect();
        assert_eq!(operators, vec![Some(3), Some(4)]);
    }

    #[test]
    fn test_foreign_condition_id_is_rejected() {
        let conn = open_in_memory_migrated().unwrap();
        let id = RuleRepo::insert_rule(&conn, &draft(), 100).unwrap();
        let err = RuleRepo::replace_conditions(&conn, id, &[login(1).with_id(999)], 100).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::NotFound);
    }

    #[test]
    fn test_delete_cascades_to_conditions() {
        let conn = open_in_memory_migrated().unwrap();
        let id = RuleRepo::insert_rule(&conn, &draft(), 100).unwrap();
        RuleRepo::replace_conditions(&conn, id, &[login(1)], 100).unwrap();
        RuleRepo::delete_rule(&conn, id).unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM dc_conditions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
        assert!(RuleRepo::get_rule(&conn, id).unwrap().is_none());
    }

    #[test]
    fn test_mark_broken_disables() {
        let conn = open_in_memory_migrated().unwrap();
        let id = RuleRepo::insert_rule(&conn, &draft(), 100).unwrap();
        RuleRepo::set_enabled(&conn, id, true, 110).unwrap();
        RuleRepo::mark_broken(&conn, id, 120).unwrap();
        let rule = RuleRepo::require_rule(&conn, id).unwrap();
        assert!(rule.broken);
        assert!(!rule.enabled);
        assert_eq!(rule.time_modified, 120);
    }

    #[test]
    fn test_existing_ids() {
        let conn = open_in_memory_migrated().unwrap();
        let id = RuleRepo::insert_rule(&conn, &draft(), 100).unwrap();
        let found = RuleRepo::existing_ids(&conn, &[id, id + 10]).unwrap();
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec![id]);
    }
}
