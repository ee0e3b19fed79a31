use super::point_in_time::{
    validate_operator_form, PointInTime, OPERATOR_AFTER, OPERATOR_BEFORE, OPERATOR_EVER,
    OPERATOR_IN_LAST, OPERATOR_NEVER,
};
use super::{Condition, RuleScope, ValidationErrors};
use crate::catalog::Catalog;
use crate::model::ConditionConfig;
use crate::sql::{CompositionContext, Fragment, Params};

pub const KIND: &str = "user_last_login";
pub const NAME: &str = "Users last login";

const OPERATORS: &[i64] = &[
    OPERATOR_EVER,
    OPERATOR_NEVER,
    OPERATOR_BEFORE,
    OPERATOR_AFTER,
    OPERATOR_IN_LAST,
];

/// Users by last access time, `users.lastaccess`
#[derive(Debug)]
pub struct UserLastLogin {
    config: ConditionConfig,
}

impl UserLastLogin {
    pub fn new(config: ConditionConfig) -> Self {
        Self { config }
    }

    fn comparison(&self) -> Option<PointInTime> {
        let operator = self.config.int_or("operator", OPERATOR_EVER);
        PointInTime::from_operator(&self.config, operator)
    }
}

pub fn factory(config: ConditionConfig, _scope: &RuleScope) -> Box<dyn Condition> {
    Box::new(UserLastLogin::new(config))
}

impl Condition for UserLastLogin {
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
        let clause = comparison.where_clause(ctx, &mut params, "u.lastaccess");
        Fragment::new("", clause, params)
    }

    fn events(&self) -> &'static [&'static str] {
        &["user_loggedin"]
    }

    fn config_description(&self, _catalog: &dyn Catalog) -> String {
        match self.comparison() {
            Some(PointInTime::Ever) => "Users who have ever logged in".to_string(),
            Some(PointInTime::Never) => "Users who have never logged in".to_string(),
            Some(other) => format!("Users who last logged in {}", other.describe()),
            None => "Invalid last login condition".to_string(),
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
