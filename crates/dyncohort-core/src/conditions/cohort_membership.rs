use super::{Condition, RuleScope, ValidationErrors};
use crate::catalog::Catalog;
use crate::model::ConditionConfig;
use crate::sql::{CompositionContext, Fragment, Params};

pub const KIND: &str = "cohort_membership";
pub const NAME: &str = "Cohort membership";

pub const OPERATOR_IS_MEMBER_OF: i64 = 0;
pub const OPERATOR_IS_NOT_MEMBER_OF: i64 = 1;

/// Users in (or outside) any of a list of cohorts
///
/// A rule may not reference its own cohort: membership would feed back into
/// the next evaluation.
#[derive(Debug)]
pub struct CohortMembership {
    config: ConditionConfig,
    rule_cohort_id: i64,
}

impl CohortMembership {
    pub fn new(config: ConditionConfig, rule_cohort_id: i64) -> Self {
        Self {
            config,
            rule_cohort_id,
        }
    }

    fn cohort_ids(&self) -> Vec<i64> {
        self.config.int_list("cohorts")
    }

    fn operator(&self) -> i64 {
        self.config.int_or("operator", OPERATOR_IS_MEMBER_OF)
    }

    fn check(
        data: &ConditionConfig,
        rule_cohort_id: i64,
        catalog: &dyn Catalog,
    ) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        let ids = data.int_list("cohorts");
        if ids.is_empty() {
            errors.insert("cohorts".to_string(), "Required".to_string());
        } else if rule_cohort_id > 0 && ids.contains(&rule_cohort_id) {
            errors.insert(
                "cohorts".to_string(),
                "The rule's own cohort cannot be used".to_string(),
            );
        } else if let Some(missing) = ids.iter().find(|id| catalog.cohort(**id).is_none()) {
            errors.insert("cohorts".to_string(), format!("Cohort #{} does not exist", missing));
        }
        if !matches!(
            data.int_or("operator", OPERATOR_IS_MEMBER_OF),
            OPERATOR_IS_MEMBER_OF | OPERATOR_IS_NOT_MEMBER_OF
        ) {
            errors.insert("operator".to_string(), "Invalid operator".to_string());
        }
        errors
    }
}

pub fn factory(config: ConditionConfig, scope: &RuleScope) -> Box<dyn Condition> {
    Box::new(CohortMembership::new(config, scope.cohort_id))
}

impl Condition for CohortMembership {
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
        !Self::check(&self.config, self.rule_cohort_id, catalog).is_empty()
    }

    fn build_sql(&self, ctx: &mut CompositionContext, _catalog: &dyn Catalog) -> Fragment {
        let mut params = Params::new();
        let cm = ctx.generate_table_alias();
        let list = ctx.in_list(&mut params, &format!("{}.cohortid", cm), &self.cohort_ids());
        let not = if self.operator() == OPERATOR_IS_NOT_MEMBER_OF {
            "NOT "
        } else {
            ""
        };
        let clause = format!(
            "{not}EXISTS (SELECT 1 FROM cohort_members {cm} WHERE {cm}.userid = u.id AND {list})",
            not = not,
            cm = cm,
            list = list
        );
        Fragment::new("", clause, params)
    }

    fn events(&self) -> &'static [&'static str] {
        &["cohort_member_added", "cohort_member_removed"]
    }

    fn config_description(&self, catalog: &dyn Catalog) -> String {
        let names: Vec<String> = self
            .cohort_ids()
            .into_iter()
            .map(|id| {
                catalog
                    .cohort(id)
                    .map(|c| c.name)
                    .unwrap_or_else(|| format!("#{}", id))
            })
            .collect();
        let relation = if self.operator() == OPERATOR_IS_NOT_MEMBER_OF {
            "are not members of"
        } else {
            "are members of"
        };
        format!("Users who {} any of: {}", relation, names.join(", "))
    }

    fn broken_description(&self, catalog: &dyn Catalog) -> String {
        Self::check(&self.config, self.rule_cohort_id, catalog)
            .into_values()
            .next()
            .unwrap_or_else(|| "Invalid cohort selection".to_string())
    }

    fn config_form_validate(
        &self,
        data: &ConditionConfig,
        catalog: &dyn Catalog,
    ) -> ValidationErrors {
        Self::check(data, self.rule_cohort_id, catalog)
    }
}
