use super::{Condition, RuleScope, ValidationErrors};
use crate::catalog::Catalog;
use crate::model::ConditionConfig;
use crate::sql::{CompositionContext, Fragment, Params};

pub const KIND: &str = "auth_method";
pub const NAME: &str = "Authentication method";

pub const OPERATOR_IS: i64 = 0;
pub const OPERATOR_IS_NOT: i64 = 1;

/// Users authenticating through a given plugin
#[derive(Debug)]
pub struct AuthMethod {
    config: ConditionConfig,
}

impl AuthMethod {
    pub fn new(config: ConditionConfig) -> Self {
        Self { config }
    }

    fn method(&self) -> String {
        self.config.text("authmethod").unwrap_or_default()
    }

    fn operator(&self) -> i64 {
        self.config.int_or("operator", OPERATOR_IS)
    }
}

pub fn factory(config: ConditionConfig, _scope: &RuleScope) -> Box<dyn Condition> {
    Box::new(AuthMethod::new(config))
}

impl Condition for AuthMethod {
    fn kind(&self) -> &str {
        KIND
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn config_data(&self) -> &ConditionConfig {
        &self.config
    }

    fn is_broken(&self, catalog: &dyn Catalog) -> bool {
        if self.config.is_empty() {
            return false;
        }
        let method = self.method();
        !matches!(self.operator(), OPERATOR_IS | OPERATOR_IS_NOT)
            || !catalog.enabled_auth_methods().contains(&method)
    }

    fn build_sql(&self, ctx: &mut CompositionContext, _catalog: &dyn Catalog) -> Fragment {
        let mut params = Params::new();
        let p = ctx.bind(&mut params, self.method());
        let comparison = if self.operator() == OPERATOR_IS_NOT { "<>" } else { "=" };
        Fragment::new("", format!("u.auth {} {}", comparison, p), params)
    }

    fn events(&self) -> &'static [&'static str] {
        &["user_created", "user_updated"]
    }

    fn config_description(&self, _catalog: &dyn Catalog) -> String {
        let verb = if self.operator() == OPERATOR_IS_NOT {
            "do not authenticate"
        } else {
            "authenticate"
        };
        format!("Users who {} with '{}'", verb, self.method())
    }

    fn broken_description(&self, _catalog: &dyn Catalog) -> String {
        format!("Authentication method '{}' is not enabled", self.method())
    }

    fn config_form_validate(
        &self,
        data: &ConditionConfig,
        catalog: &dyn Catalog,
    ) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        let method = data.text("authmethod").unwrap_or_default();
        if method.is_empty() {
            errors.insert("authmethod".to_string(), "Required".to_string());
        } else if !catalog.enabled_auth_methods().contains(&method) {
            errors.insert(
                "authmethod".to_string(),
                "Authentication method is not enabled".to_string(),
            );
        }
        if !matches!(data.int_or("operator", OPERATOR_IS), OPERATOR_IS | OPERATOR_IS_NOT) {
            errors.insert("operator".to_string(), "Invalid operator".to_string());
        }
        errors
    }
}
