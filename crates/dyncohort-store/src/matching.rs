//! Execution of composed matching-user queries

use crate::errors::{query_error, unbound_parameters, Result};
use dyncohort_core::sql::{MatchingQuery, SqlValue};
use rusqlite::types::Value;
use rusqlite::{Connection, ToSql};
use std::collections::BTreeSet;

fn to_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::Text(s) => Value::Text(s.clone()),
    }
}

/// Run a rule's matching query and collect the user ids it selects
///
/// Any failure (bad SQL, missing table, unbound parameter) comes back as a
/// `QueryExecution` error carrying the rule id. SQLite binds a missing named
/// parameter as NULL, so unbound placeholders are rejected before prepare.
pub fn matching_user_ids(
    conn: &Connection,
    rule_id: i64,
    query: &MatchingQuery,
) -> Result<BTreeSet<i64>> {
    let unbound = query.unbound_placeholders();
    if !unbound.is_empty() {
        return Err(unbound_parameters(rule_id, &unbound));
    }

    let names: Vec<String> = query.params.keys().map(|alias| format!(":{}", alias)).collect();
    let values: Vec<Value> = query.params.values().map(to_value).collect();
    let bound: Vec<(&str, &dyn ToSql)> = names
        .iter()
        .zip(values.iter())
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect();

    let mut stmt = conn
        .prepare(&query.sql)
        .map_err(|e| query_error(rule_id, e))?;
    let ids = stmt
        .query_map(bound.as_slice(), |row| row.get::<_, i64>(0))
        .map_err(|e| query_error(rule_id, e))?
        .collect::<std::result::Result<BTreeSet<i64>, _>>()
        .map_err(|e| query_error(rule_id, e))?;

    tracing::debug!(rule_id, matched = ids.len(), "matching query executed");
    Ok(ids)
}
