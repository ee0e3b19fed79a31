use super::{Condition, RuleScope, ValidationErrors};
use crate::catalog::{Catalog, ContextInfo, CONTEXT_COURSE, CONTEXT_COURSECAT, CONTEXT_SYSTEM};
use crate::model::ConditionConfig;
use crate::sql::{CompositionContext, Fragment, Params};

pub const KIND: &str = "user_role";
pub const NAME: &str = "User role";

pub const OPERATOR_HAVE_ROLE: i64 = 0;
pub const OPERATOR_DO_NOT_HAVE_ROLE: i64 = 1;

/// Users holding (or not holding) a role at system, category or course level
///
/// A role counts when assigned in the target context or any of its parents.
/// With `includechildren` set, assignments in descendant contexts count too.
#[derive(Debug)]
pub struct UserRole {
    config: ConditionConfig,
}

impl UserRole {
    pub fn new(config: ConditionConfig) -> Self {
        Self { config }
    }

    fn operator(&self) -> i64 {
        self.config.int_or("operator", OPERATOR_HAVE_ROLE)
    }

    fn role_id(&self) -> i64 {
        self.config.int_or("roleid", 0)
    }

    fn context_level(&self) -> i64 {
        self.config.int_or("contextlevel", CONTEXT_SYSTEM)
    }

    fn target_context(&self, catalog: &dyn Catalog) -> Option<ContextInfo> {
        match self.context_level() {
            CONTEXT_SYSTEM => catalog.system_context(),
            CONTEXT_COURSECAT => {
                catalog.context(CONTEXT_COURSECAT, self.config.int_or("categoryid", 0))
            }
            CONTEXT_COURSE => catalog.context(CONTEXT_COURSE, self.config.int_or("courseid", 0)),
            _ => None,
        }
    }

    fn includes_children(&self) -> bool {
        self.config.flag("includechildren") && self.context_level() != CONTEXT_SYSTEM
    }

    /// Descendant context ids to count, `None` when they could not be read
    fn child_contexts(&self, context: &ContextInfo, catalog: &dyn Catalog) -> Option<Vec<i64>> {
        if self.includes_children() {
            catalog.child_context_ids(context)
        } else {
            Some(Vec::new())
        }
    }

    fn level_name(&self) -> &'static str {
        match self.context_level() {
            CONTEXT_COURSECAT => "category",
            CONTEXT_COURSE => "course",
            _ => "system",
        }
    }
}

pub fn factory(config: ConditionConfig, _scope: &RuleScope) -> Box<dyn Condition> {
    Box::new(UserRole::new(config))
}

impl Condition for UserRole {
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
        if ![OPERATOR_HAVE_ROLE, OPERATOR_DO_NOT_HAVE_ROLE].contains(&self.operator()) {
            return true;
        }
        if catalog.role(self.role_id()).is_none() {
            return true;
        }
        let level_ok = match self.context_level() {
            CONTEXT_SYSTEM => true,
            CONTEXT_COURSECAT => catalog
                .category(self.config.int_or("categoryid", 0))
                .is_some(),
            CONTEXT_COURSE => catalog.course(self.config.int_or("courseid", 0)).is_some(),
            _ => false,
        };
        if !level_ok {
            return true;
        }
        match self.target_context(catalog) {
            Some(context) => self.child_contexts(&context, catalog).is_none(),
            None => true,
        }
    }

    fn build_sql(&self, ctx: &mut CompositionContext, catalog: &dyn Catalog) -> Fragment {
        let Some(context) = self.target_context(catalog) else {
            return Fragment::never();
        };
        let Some(children) = self.child_contexts(&context, catalog) else {
            return Fragment::never();
        };
        let mut params = Params::new();
        let ra = ctx.generate_table_alias();
        let role = ctx.bind(&mut params, self.role_id());
        let mut inner = format!("{}.roleid = {}", ra, role);

        let column = format!("{}.contextid", ra);
        if self.context_level() == CONTEXT_SYSTEM {
            let system = ctx.bind(&mut params, context.id);
            inner.push_str(&format!(" AND {} = {}", column, system));
        } else {
            let parents = ctx.in_list(&mut params, &column, &context.parent_context_ids(true));
            if children.is_empty() {
                inner.push_str(&format!(" AND {}", parents));
            } else {
                let children = ctx.in_list(&mut params, &column, &children);
                inner.push_str(&format!(" AND ({} OR {})", parents, children));
            }
        }

        let outer = ctx.generate_table_alias();
        let join = format!(
            "LEFT JOIN (SELECT DISTINCT {ra}.userid FROM role_assignments {ra} WHERE {inner}) {outer} ON u.id = {outer}.userid",
            ra = ra,
            inner = inner,
            outer = outer
        );
        let clause = if self.operator() == OPERATOR_HAVE_ROLE {
            format!("{}.userid IS NOT NULL", outer)
        } else {
            format!("{}.userid IS NULL", outer)
        };
        Fragment::new(join, clause, params)
    }

    fn events(&self) -> &'static [&'static str] {
        &["role_assigned", "role_unassigned"]
    }

    fn config_description(&self, catalog: &dyn Catalog) -> String {
        let role = catalog
            .role(self.role_id())
            .map(|r| r.name)
            .unwrap_or_else(|| format!("#{}", self.role_id()));
        let verb = if self.operator() == OPERATOR_HAVE_ROLE {
            "have"
        } else {
            "do not have"
        };
        let target = match self.context_level() {
            CONTEXT_COURSECAT => {
                let id = self.config.int_or("categoryid", 0);
                let name = catalog
                    .category(id)
                    .map(|c| c.name)
                    .unwrap_or_else(|| format!("#{}", id));
                format!("category '{}'", name)
            }
            CONTEXT_COURSE => {
                let id = self.config.int_or("courseid", 0);
                let name = catalog
                    .course(id)
                    .map(|c| c.fullname)
                    .unwrap_or_else(|| format!("#{}", id));
                format!("course '{}'", name)
            }
            _ => "system".to_string(),
        };
        let children = if self.includes_children() {
            " (including children)"
        } else {
            ""
        };
        format!("Users who {} role '{}' in {}{}", verb, role, target, children)
    }

    fn broken_description(&self, catalog: &dyn Catalog) -> String {
        if catalog.role(self.role_id()).is_none() {
            return format!("Role #{} does not exist", self.role_id());
        }
        let resolved = self
            .target_context(catalog)
            .map(|context| self.child_contexts(&context, catalog).is_some());
        if resolved == Some(false) {
            return format!(
                "Contexts below the selected {} could not be resolved",
                self.level_name()
            );
        }
        format!("Selected {} does not exist", self.level_name())
    }

    fn config_form_validate(
        &self,
        data: &ConditionConfig,
        catalog: &dyn Catalog,
    ) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if catalog.role(data.int_or("roleid", 0)).is_none() {
            errors.insert("roleid".to_string(), "Required".to_string());
        }
        if ![OPERATOR_HAVE_ROLE, OPERATOR_DO_NOT_HAVE_ROLE]
            .contains(&data.int_or("operator", OPERATOR_HAVE_ROLE))
        {
            errors.insert("operator".to_string(), "Invalid operator".to_string());
        }
        match data.int_or("contextlevel", CONTEXT_SYSTEM) {
            CONTEXT_SYSTEM => {}
            CONTEXT_COURSECAT => {
                if catalog.category(data.int_or("categoryid", 0)).is_none() {
                    errors.insert("categoryid".to_string(), "Required".to_string());
                }
            }
            CONTEXT_COURSE => {
                if catalog.course(data.int_or("courseid", 0)).is_none() {
                    errors.insert("courseid".to_string(), "Required".to_string());
                }
            }
            _ => {
                errors.insert("contextlevel".to_string(), "Invalid context".to_string());
            }
        }
        errors
    }
}
