use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque key/value configuration of one condition instance
///
/// Values arrive from form submissions, so numeric settings may be stored as
/// JSON numbers or as numeric strings. The typed getters accept both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionConfig(Map<String, Value>);

impl ConditionConfig {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// An empty configuration means "not configured yet"
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn int_or(&self, key: &str, default: i64) -> i64 {
        self.int(key).unwrap_or(default)
    }

    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        self.int(key).unwrap_or(0) != 0
    }

    /// Integer list stored either as a JSON array or a comma separated string
    pub fn int_list(&self, key: &str) -> Vec<i64> {
        match self.0.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| match v {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                })
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .filter_map(|part| part.trim().parse().ok())
                .collect(),
            Some(Value::Number(n)) => n.as_i64().into_iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    /// Parse a stored blob; an empty string is an unconfigured condition
    pub fn from_json(raw: &str) -> crate::errors::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }
        Ok(serde_json::from_str(raw)?)
    }
}

/// A condition row owned by a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRecord {
    /// None until the condition has been persisted
    pub id: Option<i64>,

    #[serde(default)]
    pub rule_id: i64,

    /// Registry key of the condition kind, e.g. `user_last_login`
    pub kind: String,

    /// Position within the rule, 0-based
    #[serde(default)]
    pub sort_order: i64,

    pub config: ConditionConfig,
}

impl ConditionRecord {
    pub fn new(kind: impl Into<String>, config: ConditionConfig) -> Self {
        Self {
            id: None,
            rule_id: 0,
            kind: kind.into(),
            sort_order: 0,
            config,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_strings_read_as_ints() {
        let config = ConditionConfig::new()
            .with("courseid", "12")
            .with("operator", 3);
        assert_eq!(config.int("courseid"), Some(12));
        assert_eq!(config.int("operator"), Some(3));
        assert_eq!(config.int("missing"), None);
    }

    #[test]
    fn test_int_list_accepts_array_and_csv() {
        let config = ConditionConfig::new()
            .with("tags", json!([1, "2", 3]))
            .with("cohorts", "4, 5");
        assert_eq!(config.int_list("tags"), vec![1, 2, 3]);
        assert_eq!(config.int_list("cohorts"), vec![4, 5]);
        assert!(config.int_list("none").is_empty());
    }

    #[test]
    fn test_empty_blob_is_unconfigured() {
        let config = ConditionConfig::from_json("").unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_json_blob_parses() {
        let config = ConditionConfig::from_json(r#"{"operator":"1","roleid":5}"#).unwrap();
        assert_eq!(config.int("operator"), Some(1));
        assert_eq!(config.int("roleid"), Some(5));
    }
}
