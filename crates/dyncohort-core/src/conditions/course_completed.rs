use super::point_in_time::PointInTime;
use super::{format_timestamp, Condition, RuleScope, ValidationErrors};
use crate::catalog::Catalog;
use crate::model::ConditionConfig;
use crate::sql::{CompositionContext, Fragment, Params};

pub const KIND: &str = "course_completed";
pub const NAME: &str = "Course completed";

pub const OPERATOR_ANY: i64 = 1;
pub const OPERATOR_BEFORE: i64 = 2;
pub const OPERATOR_AFTER: i64 = 3;

/// Users who completed a course, optionally before or after a date
#[derive(Debug)]
pub struct CourseCompleted {
    config: ConditionConfig,
}

impl CourseCompleted {
    pub fn new(config: ConditionConfig) -> Self {
        Self { config }
    }

    fn course_id(&self) -> i64 {
        self.config.int_or("courseid", 0)
    }

    fn comparison(&self) -> Option<PointInTime> {
        match self.config.int_or("operator", OPERATOR_ANY) {
            OPERATOR_ANY => Some(PointInTime::Ever),
            OPERATOR_BEFORE => Some(PointInTime::before_from(&self.config, "timecompleted")),
            OPERATOR_AFTER => Some(PointInTime::after_from(&self.config, "timecompleted")),
            _ => None,
        }
    }
}

pub fn factory(config: ConditionConfig, _scope: &RuleScope) -> Box<dyn Condition> {
    Box::new(CourseCompleted::new(config))
}

impl Condition for CourseCompleted {
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
        let course_ok = catalog
            .course(self.course_id())
            .is_some_and(|course| course.completion_enabled);
        !course_ok || !self.comparison().is_some_and(|c| c.is_valid())
    }

    fn build_sql(&self, ctx: &mut CompositionContext, _catalog: &dyn Catalog) -> Fragment {
        let Some(comparison) = self.comparison() else {
            return Fragment::never();
        };
        let mut params = Params::new();
        let completions = ctx.generate_table_alias();
        let course = ctx.bind(&mut params, self.course_id());
        let join = format!(
            "LEFT JOIN course_completions {t} ON ({t}.userid = u.id AND {t}.course = {course})",
            t = completions,
            course = course
        );
        let column = format!("{}.timecompleted", completions);
        let clause = comparison.where_clause(ctx, &mut params, &column);
        Fragment::new(join, clause, params)
    }

    fn config_description(&self, catalog: &dyn Catalog) -> String {
        let course = catalog
            .course(self.course_id())
            .map(|c| c.fullname)
            .unwrap_or_else(|| format!("#{}", self.course_id()));
        let time = self.config.int_or("timecompleted", 0);
        match self.config.int_or("operator", OPERATOR_ANY) {
            OPERATOR_BEFORE => format!(
                "Users who completed course '{}' before {}",
                course,
                format_timestamp(time)
            ),
            OPERATOR_AFTER => format!(
                "Users who completed course '{}' after {}",
                course,
                format_timestamp(time)
            ),
            _ => format!("Users who completed course '{}'", course),
        }
    }

    fn broken_description(&self, catalog: &dyn Catalog) -> String {
        match catalog.course(self.course_id()) {
            None => format!("Course #{} does not exist", self.course_id()),
            Some(course) if !course.completion_enabled => {
                format!("Completion is disabled for course '{}'", course.fullname)
            }
            Some(_) => "Completion date is not configured".to_string(),
        }
    }

    fn config_form_validate(
        &self,
        data: &ConditionConfig,
        catalog: &dyn Catalog,
    ) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        match catalog.course(data.int_or("courseid", 0)) {
            None => {
                errors.insert("courseid".to_string(), "Required".to_string());
            }
            Some(course) if !course.completion_enabled => {
                errors.insert(
                    "courseid".to_string(),
                    "Completion is not enabled for this course".to_string(),
                );
            }
            Some(_) => {}
        }
        let operator = data.int_or("operator", OPERATOR_ANY);
        if ![OPERATOR_ANY, OPERATOR_BEFORE, OPERATOR_AFTER].contains(&operator) {
            errors.insert("operator".to_string(), "Invalid operator".to_string());
        } else if operator != OPERATOR_ANY && data.int_or("timecompleted", 0) <= 0 {
            errors.insert("timecompleted".to_string(), "Required".to_string());
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CourseInfo, MemoryCatalog};

    fn catalog(completion_enabled: bool) -> MemoryCatalog {
        MemoryCatalog::new().with_course(CourseInfo {
            id: 2,
            fullname: "Safety".to_string(),
            category: 1,
            completion_enabled,
        })
    }

    #[test]
    fn test_disabled_completion_is_broken() {
        let condition = CourseCompleted::new(ConditionConfig::new().with("courseid", 2));
        assert!(condition.is_broken(&catalog(false)));
        assert!(!condition.is_broken(&catalog(true)));
    }

    #[test]
    fn test_missing_course_is_broken() {
        let condition = CourseCompleted::new(ConditionConfig::new().with("courseid", 99));
        assert!(condition.is_broken(&catalog(true)));
        assert_eq!(
            condition.broken_description(&catalog(true)),
            "Course #99 does not exist"
        );
    }

    #[test]
    fn test_any_operator_sql() {
        let condition = CourseCompleted::new(ConditionConfig::new().with("courseid", 2));
        let mut ctx = CompositionContext::new(0);
        let fragment = condition.get_sql(&mut ctx, &catalog(true));
        assert_eq!(
            fragment.join(),
            "LEFT JOIN course_completions t1 ON (t1.userid = u.id AND t1.course = :p1)"
        );
        assert_eq!(fragment.where_clause(), "t1.timecompleted > 0");
        assert!(fragment.unbound_placeholders().is_empty());
    }

    #[test]
    fn test_before_without_date_is_broken() {
        let condition = CourseCompleted::new(
            ConditionConfig::new()
                .with("courseid", 2)
                .with("operator", OPERATOR_BEFORE),
        );
        assert!(condition.is_broken(&catalog(true)));
    }

    #[test]
    fn test_batch_only() {
        let condition = CourseCompleted::new(ConditionConfig::new());
        assert!(condition.events().is_empty());
    }
}
