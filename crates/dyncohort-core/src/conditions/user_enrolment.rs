use super::{Condition, RuleScope, ValidationErrors};
use crate::catalog::{Catalog, CONTEXT_COURSE};
use crate::model::ConditionConfig;
use crate::sql::{CompositionContext, Fragment, Params};

pub const KIND: &str = "user_enrolment";
pub const NAME: &str = "User enrolment";

pub const OPERATOR_NOT_ENROLLED: i64 = 0;
pub const OPERATOR_ENROLLED: i64 = 1;

/// Users with (or without) an active enrolment in a course
///
/// Optional filters narrow the enrolment to one enrolment method and to
/// users holding a role in the course context. An empty method and role 0
/// mean "any".
#[derive(Debug)]
pub struct UserEnrolment {
    config: ConditionConfig,
}

impl UserEnrolment {
    pub fn new(config: ConditionConfig) -> Self {
        Self { config }
    }

    fn operator(&self) -> i64 {
        self.config.int_or("operator", OPERATOR_ENROLLED)
    }

    fn course_id(&self) -> i64 {
        self.config.int_or("courseid", 0)
    }

    fn enrol_method(&self) -> String {
        self.config.text("enrolmethod").unwrap_or_default()
    }

    fn role_id(&self) -> i64 {
        self.config.int_or("roleid", 0)
    }
}

pub fn factory(config: ConditionConfig, _scope: &RuleScope) -> Box<dyn Condition> {
    Box::new(UserEnrolment::new(config))
}

impl Condition for UserEnrolment {
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
        if ![OPERATOR_NOT_ENROLLED, OPERATOR_ENROLLED].contains(&self.operator()) {
            return true;
        }
        if catalog.course(self.course_id()).is_none() {
            return true;
        }
        let method = self.enrol_method();
        if !method.is_empty() && !catalog.enabled_enrol_methods().contains(&method) {
            return true;
        }
        if self.role_id() != 0 {
            return catalog.role(self.role_id()).is_none()
                || catalog.context(CONTEXT_COURSE, self.course_id()).is_none();
        }
        false
    }

    fn build_sql(&self, ctx: &mut CompositionContext, catalog: &dyn Catalog) -> Fragment {
        let mut params = Params::new();
        let ue = ctx.generate_table_alias();
        let e = ctx.generate_table_alias();
        let course = ctx.bind(&mut params, self.course_id());

        let mut method_where = String::new();
        let method = self.enrol_method();
        if !method.is_empty() {
            let p = ctx.bind(&mut params, method);
            method_where = format!(" AND {}.enrol = {}", e, p);
        }

        let mut role_join = String::new();
        let mut role_where = String::new();
        if self.role_id() != 0 {
            let Some(context) = catalog.context(CONTEXT_COURSE, self.course_id()) else {
                return Fragment::never();
            };
            let outer = ctx.generate_table_alias();
            let ra = ctx.generate_table_alias();
            let role = ctx.bind(&mut params, self.role_id());
            let context_id = ctx.bind(&mut params, context.id);
            role_join = format!(
                " LEFT JOIN (SELECT {ra}.userid FROM role_assignments {ra} WHERE {ra}.roleid = {role} AND {ra}.contextid = {ctx}) {o} ON {ue}.userid = {o}.userid",
                ra = ra,
                role = role,
                ctx = context_id,
                o = outer,
                ue = ue
            );
            role_where = format!(" AND {}.userid IS NOT NULL", outer);
        }

        let exists = if self.operator() == OPERATOR_ENROLLED {
            "EXISTS"
        } else {
            "NOT EXISTS"
        };
        let clause = format!(
            "{exists} (SELECT 1 FROM user_enrolments {ue} JOIN enrol {e} ON ({e}.id = {ue}.enrolid AND {e}.status = 0){role_join} WHERE {ue}.userid = u.id AND {e}.courseid = {course} AND {ue}.status = 0{method_where}{role_where})",
            exists = exists,
            ue = ue,
            e = e,
            role_join = role_join,
            course = course,
            method_where = method_where,
            role_where = role_where
        );
        Fragment::new("", clause, params)
    }

    fn events(&self) -> &'static [&'static str] {
        &[
            "role_assigned",
            "role_unassigned",
            "user_enrolment_created",
            "user_enrolment_updated",
            "user_enrolment_deleted",
        ]
    }

    fn config_description(&self, catalog: &dyn Catalog) -> String {
        let course = catalog
            .course(self.course_id())
            .map(|c| c.fullname)
            .unwrap_or_else(|| format!("#{}", self.course_id()));
        let verb = if self.operator() == OPERATOR_ENROLLED {
            "are"
        } else {
            "are not"
        };
        let method = match self.enrol_method() {
            m if m.is_empty() => "any".to_string(),
            m => m,
        };
        let role = match self.role_id() {
            0 => "any".to_string(),
            id => catalog
                .role(id)
                .map(|r| r.name)
                .unwrap_or_else(|| format!("#{}", id)),
        };
        format!(
            "Users who {} enrolled into course '{}' (enrolment method: {}, role: {})",
            verb, course, method, role
        )
    }

    fn broken_description(&self, catalog: &dyn Catalog) -> String {
        if catalog.course(self.course_id()).is_none() {
            return format!("Course #{} does not exist", self.course_id());
        }
        let method = self.enrol_method();
        if !method.is_empty() && !catalog.enabled_enrol_methods().contains(&method) {
            return format!("Enrolment method '{}' is not available", method);
        }
        format!("Role #{} does not exist", self.role_id())
    }

    fn config_form_validate(
        &self,
        data: &ConditionConfig,
        catalog: &dyn Catalog,
    ) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if catalog.course(data.int_or("courseid", 0)).is_none() {
            errors.insert("courseid".to_string(), "Required".to_string());
        }
        if ![OPERATOR_NOT_ENROLLED, OPERATOR_ENROLLED]
            .contains(&data.int_or("operator", OPERATOR_ENROLLED))
        {
            errors.insert("operator".to_string(), "Invalid operator".to_string());
        }
        let method = data.text("enrolmethod").unwrap_or_default();
        if !method.is_empty() && !catalog.enabled_enrol_methods().contains(&method) {
            errors.insert(
                "enrolmethod".to_string(),
                "Unknown enrolment method".to_string(),
            );
        }
        let role_id = data.int_or("roleid", 0);
        if role_id != 0 && catalog.role(role_id).is_none() {
            errors.insert("roleid".to_string(), "Unknown role".to_string());
        }
        errors
    }
}
