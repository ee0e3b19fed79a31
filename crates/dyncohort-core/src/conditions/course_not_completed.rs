use super::{Condition, RuleScope, ValidationErrors};
use crate::catalog::Catalog;
use crate::model::ConditionConfig;
use crate::sql::{CompositionContext, Fragment, Params};

pub const KIND: &str = "course_not_completed";
pub const NAME: &str = "Course not completed";

/// Users with no completion record, or an unset completion time, for a course
#[derive(Debug)]
pub struct CourseNotCompleted {
    config: ConditionConfig,
}

impl CourseNotCompleted {
    pub fn new(config: ConditionConfig) -> Self {
        Self { config }
    }

    fn course_id(&self) -> i64 {
        self.config.int_or("courseid", 0)
    }
}

pub fn factory(config: ConditionConfig, _scope: &RuleScope) -> Box<dyn Condition> {
    Box::new(CourseNotCompleted::new(config))
}

impl Condition for CourseNotCompleted {
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
        !catalog
            .course(self.course_id())
            .is_some_and(|course| course.completion_enabled)
    }

    fn build_sql(&self, ctx: &mut CompositionContext, _catalog: &dyn Catalog) -> Fragment {
        let mut params = Params::new();
        let t = ctx.generate_table_alias();
        let course = ctx.bind(&mut params, self.course_id());
        let join = format!(
            "LEFT JOIN course_completions {t} ON ({t}.userid = u.id AND {t}.course = {course})",
            t = t,
            course = course
        );
        let clause = format!(
            "{t}.id IS NULL OR {t}.timecompleted IS NULL OR {t}.timecompleted = 0",
            t = t
        );
        Fragment::new(join, clause, params)
    }

    fn config_description(&self, catalog: &dyn Catalog) -> String {
        let course = catalog
            .course(self.course_id())
            .map(|c| c.fullname)
            .unwrap_or_else(|| format!("#{}", self.course_id()));
        format!("Users who have not completed course '{}'", course)
    }

    fn broken_description(&self, catalog: &dyn Catalog) -> String {
        match catalog.course(self.course_id()) {
            None => format!("Course #{} does not exist", self.course_id()),
            Some(course) => format!("Completion is disabled for course '{}'", course.fullname),
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
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CourseInfo, MemoryCatalog};

    #[test]
    fn test_sql_treats_missing_row_as_not_completed() {
        let catalog = MemoryCatalog::new().with_course(CourseInfo {
            id: 4,
            fullname: "Induction".to_string(),
            category: 1,
            completion_enabled: true,
        });
        let condition = CourseNotCompleted::new(ConditionConfig::new().with("courseid", 4));
        let mut ctx = CompositionContext::new(0);
        let fragment = condition.get_sql(&mut ctx, &catalog);
        assert!(fragment.join().starts_with("LEFT JOIN course_completions t1"));
        assert!(fragment.where_clause().contains("t1.id IS NULL"));
        assert_eq!(
            condition.config_description(&catalog),
            "Users who have not completed course 'Induction'"
        );
    }
}
