use super::point_in_time::{
    validate_operator_form, PointInTime, OPERATOR_AFTER, OPERATOR_BEFORE, OPERATOR_IN_LAST,
};
use super::{Condition, RuleScope, ValidationErrors};
use crate::catalog::Catalog;
use crate::model::ConditionConfig;
use crate::sql::{CompositionContext, Fragment, Params};

pub const KIND: &str = "user_created";
pub const NAME: &str = "User created time";

const OPERATORS: &[i64] = &[OPERATOR_BEFORE, OPERATOR_AFTER, OPERATOR_IN_LAST];

/// Users by account creation time, `users.timecreated`
#[derive(Debug)]
pub struct UserCreated {
    config: ConditionConfig,
}

impl UserCreated {
    pub fn new(config: ConditionConfig) -> Self {
        Self { config }
    }

    fn comparison(&self) -> Option<PointInTime> {
        let operator = self.config.int_or("operator", OPERATOR_IN_LAST);
        if !OPERATORS.contains(&operator) {
            return None;
        }
        PointInTime::from_operator(&self.config, operator)
    }
}

pub fn factory(config: ConditionConfig, _scope: &RuleScope) -> Box<dyn Condition> {
    Box::new(UserCreated::new(config))
}

impl Condition for UserCreated {
    fn kind(&self) -> &str {
        KIND
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn config_data(&self) -> &ConditionConfig {
        &self.config
    }

    fn is_broken(&self, _catalog: &dyn Catalog) -> bool {
        if self.config.is_empty() {
            return false;
        }
        !self.comparison().is_some_and(|c| c.is_valid())
    }

    fn build_sql(&self, ctx: &mut CompositionContext, _catalog: &dyn Catalog) -> Fragment {
        let Some(comparison) = self.comparison() else {
            return Fragment::never();
        };
        let mut params = Params::new();
        let clause = comparison.where_clause(ctx, &mut params, "u.timecreated");
        Fragment::new("", clause, params)
    }

    fn events(&self) -> &'static [&'static str] {
        &["user_created"]
    }

    fn config_description(&self, _catalog: &dyn Catalog) -> String {
        match self.comparison() {
            Some(comparison) => format!("Users created {}", comparison.describe()),
            None => "Invalid user created condition".to_string(),
        }
    }

    fn config_form_validate(
        &self,
        data: &ConditionConfig,
        _catalog: &dyn Catalog,
    ) -> ValidationErrors {
        validate_operator_form(data, OPERATORS)
    }
}
