use serde::Serialize;
use std::collections::BTreeMap;

/// Bound value for a named placeholder
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Int(i64),
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

/// Named parameters keyed by alias without the leading colon
pub type Params = BTreeMap<String, SqlValue>;

/// Join clause, where clause and named parameters contributed by one
/// condition (or a composed set of them)
///
/// Fragments are immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    join: String,
    #[serde(rename = "where")]
    where_clause: String,
    params: Params,
}

impl Fragment {
    pub fn new(join: impl Into<String>, where_clause: impl Into<String>, params: Params) -> Self {
        Self {
            join: join.into(),
            where_clause: where_clause.into(),
            params,
        }
    }

    /// Fragment that matches nobody
    pub fn never() -> Self {
        Self::new("", super::NEVER_WHERE, Params::new())
    }

    pub fn join(&self) -> &str {
        &self.join
    }

    pub fn where_clause(&self) -> &str {
        &self.where_clause
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn is_never(&self) -> bool {
        self.where_clause.trim() == super::NEVER_WHERE
    }

    pub fn into_parts(self) -> (String, String, Params) {
        (self.join, self.where_clause, self.params)
    }

    /// Placeholder names referenced by the join and where clauses
    pub fn placeholders(&self) -> Vec<String> {
        let mut names = scan_placeholders(&self.join);
        names.extend(scan_placeholders(&self.where_clause));
        names.sort();
        names.dedup();
        names
    }

    /// Placeholders that have no bound parameter
    pub fn unbound_placeholders(&self) -> Vec<String> {
        self.placeholders()
            .into_iter()
            .filter(|name| !self.params.contains_key(name))
            .collect()
    }
}

/// Names of the `:name` placeholders in `sql`, skipping quoted literals
pub(super) fn scan_placeholders(sql: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut in_literal = false;
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '\'' => in_literal = !in_literal,
            ':' if !in_literal => {
                let start = i + 1;
                let mut end = start;
                while let Some(&(j, next)) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        end = j + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                if end > start {
                    names.push(sql[start..end].to_string());
                }
            }
            _ => {}
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_fragment_is_never() {
        let f = Fragment::never();
        assert!(f.is_never());
        assert_eq!(f.join(), "");
        assert!(f.params().is_empty());
    }

    #[test]
    fn test_placeholders_ignore_string_literals() {
        let f = Fragment::new(
            "LEFT JOIN tag_instance t1 ON t1.itemtype = 'user:x'",
            "t1.tagid = :p1 AND u.lastaccess > :p2",
            Params::new(),
        );
        assert_eq!(f.placeholders(), vec!["p1".to_string(), "p2".to_string()]);
    }

    #[test]
    fn test_unbound_placeholders_reported() {
        let mut params = Params::new();
        params.insert("p1".to_string(), SqlValue::Int(1));
        let f = Fragment::new("", "u.id = :p1 OR u.id = :p2", params);
        assert_eq!(f.unbound_placeholders(), vec!["p2".to_string()]);
    }
}
