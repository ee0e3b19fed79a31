use super::fragment::{Params, SqlValue};
use dyncohort_core_types::EvaluationId;

/// Alias and clock state for one evaluation pass
///
/// Created once per rule evaluation and threaded through every condition's
/// `get_sql`. Aliases are `t1, t2, ...` and `p1, p2, ...`, never reused within
/// the lifetime of the context.
#[derive(Debug)]
pub struct CompositionContext {
    evaluation_id: EvaluationId,
    now: i64,
    next_table: u32,
    next_param: u32,
}

impl CompositionContext {
    /// `now` is the unix timestamp relative conditions (IN_LAST, IN_THE_PAST) measure against
    pub fn new(now: i64) -> Self {
        Self {
            evaluation_id: EvaluationId::new(),
            now,
            next_table: 0,
            next_param: 0,
        }
    }

    /// Context stamped with the current wall clock
    pub fn now_utc() -> Self {
        Self::new(chrono::Utc::now().timestamp())
    }

    pub fn evaluation_id(&self) -> &EvaluationId {
        &self.evaluation_id
    }

    pub fn now(&self) -> i64 {
        self.now
    }

    pub fn generate_table_alias(&mut self) -> String {
        self.next_table += 1;
        format!("t{}", self.next_table)
    }

    pub fn generate_param_alias(&mut self) -> String {
        self.next_param += 1;
        format!("p{}", self.next_param)
    }

    /// Bind `value` under a fresh parameter alias and return its placeholder
    /// (`:pN`) ready to splice into SQL
    pub fn bind(&mut self, params: &mut Params, value: impl Into<SqlValue>) -> String {
        let alias = self.generate_param_alias();
        let placeholder = format!(":{}", alias);
        params.insert(alias, value.into());
        placeholder
    }

    /// `column IN (:pA, :pB, ...)`, or a false predicate for an empty list
    pub fn in_list<V>(&mut self, params: &mut Params, column: &str, values: &[V]) -> String
    where
        V: Clone + Into<SqlValue>,
    {
        if values.is_empty() {
            return super::NEVER_WHERE.to_string();
        }
        let placeholders: Vec<String> = values
            .iter()
            .map(|v| self.bind(params, v.clone()))
            .collect();
        format!("{} IN ({})", column, placeholders.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_are_sequential_and_independent() {
        let mut ctx = CompositionContext::new(0);
        assert_eq!(ctx.generate_table_alias(), "t1");
        assert_eq!(ctx.generate_param_alias(), "p1");
        assert_eq!(ctx.generate_param_alias(), "p2");
        assert_eq!(ctx.generate_table_alias(), "t2");
    }

    #[test]
    fn test_bind_returns_placeholder_and_records_value() {
        let mut ctx = CompositionContext::new(0);
        let mut params = Params::new();
        let placeholder = ctx.bind(&mut params, 42_i64);
        assert_eq!(placeholder, ":p1");
        assert_eq!(params.get("p1"), Some(&SqlValue::Int(42)));
    }

    #[test]
    fn test_in_list_empty_is_false() {
        let mut ctx = CompositionContext::new(0);
        let mut params = Params::new();
        let sql = ctx.in_list::<i64>(&mut params, "t1.contextid", &[]);
        assert_eq!(sql, "1=0");
        assert!(params.is_empty());
    }

    #[test]
    fn test_in_list_binds_each_value() {
        let mut ctx = CompositionContext::new(0);
        let mut params = Params::new();
        let sql = ctx.in_list(&mut params, "t1.contextid", &[1_i64, 5, 9]);
        assert_eq!(sql, "t1.contextid IN (:p1, :p2, :p3)");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_separate_contexts_restart_numbering() {
        let mut first = CompositionContext::new(0);
        first.generate_param_alias();
        let mut second = CompositionContext::new(0);
        assert_eq!(second.generate_param_alias(), "p1");
        assert_ne!(first.evaluation_id(), second.evaluation_id());
    }
}
