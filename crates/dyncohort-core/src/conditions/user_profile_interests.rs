use super::fields::FieldOperator;
use super::{Condition, RuleScope, ValidationErrors};
use crate::catalog::Catalog;
use crate::model::ConditionConfig;
use crate::sql::{CompositionContext, Fragment, Params};

pub const KIND: &str = "user_profile_interests";
pub const NAME: &str = "User interests";

/// Users tagged (or not tagged) with any of the selected interests
#[derive(Debug)]
pub struct UserProfileInterests {
    config: ConditionConfig,
}

impl UserProfileInterests {
    pub fn new(config: ConditionConfig) -> Self {
        Self { config }
    }

    fn tags(&self) -> Vec<i64> {
        self.config.int_list("tags")
    }

    fn operator(&self) -> Option<FieldOperator> {
        match FieldOperator::from_code(self.config.int_or("tags_operator", 0))? {
            op @ (FieldOperator::Contains | FieldOperator::DoesNotContain) => Some(op),
            _ => None,
        }
    }
}

pub fn factory(config: ConditionConfig, _scope: &RuleScope) -> Box<dyn Condition> {
    Box::new(UserProfileInterests::new(config))
}

impl Condition for UserProfileInterests {
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
        self.tags().is_empty() || self.operator().is_none()
    }

    fn build_sql(&self, ctx: &mut CompositionContext, _catalog: &dyn Catalog) -> Fragment {
        let mut params = Params::new();
        let ti = ctx.generate_table_alias();
        let inner = ctx.generate_table_alias();
        let tag_filter = ctx.in_list(&mut params, &format!("{}.tagid", ti), &self.tags());
        let join = format!(
            "LEFT JOIN (SELECT DISTINCT {ti}.itemid FROM tag_instance {ti} WHERE {ti}.component = 'core' AND {ti}.itemtype = 'user' AND {filter}) {inner} ON u.id = {inner}.itemid",
            ti = ti,
            filter = tag_filter,
            inner = inner
        );
        let clause = match self.operator() {
            Some(FieldOperator::Contains) => format!("{}.itemid IS NOT NULL", inner),
            _ => format!("{}.itemid IS NULL", inner),
        };
        Fragment::new(join, clause, params)
    }

    fn events(&self) -> &'static [&'static str] {
        &["user_created", "user_updated"]
    }

    fn config_description(&self, catalog: &dyn Catalog) -> String {
        let names: Vec<String> = self
            .tags()
            .into_iter()
            .map(|id| {
                catalog
                    .tag(id)
                    .map(|t| t.name)
                    .unwrap_or_else(|| format!("#{}", id))
            })
            .collect();
        let operator = self
            .operator()
            .map(FieldOperator::label)
            .unwrap_or("contains");
        format!("User interests {} any of: {}", operator, names.join(", "))
    }

    fn broken_description(&self, _catalog: &dyn Catalog) -> String {
        if self.tags().is_empty() {
            "No interests selected".to_string()
        } else {
            "Invalid interests operator".to_string()
        }
    }

    fn config_form_validate(
        &self,
        data: &ConditionConfig,
        _catalog: &dyn Catalog,
    ) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if data.int_list("tags").is_empty() {
            errors.insert("tags".to_string(), "Required".to_string());
        }
        if !matches!(data.int_or("tags_operator", 0), 0 | 1) {
            errors.insert("tags_operator".to_string(), "Invalid operator".to_string());
        }
        errors
    }
}
