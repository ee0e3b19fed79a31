use dyncohort_core::catalog::{
    CategoryInfo, CohortInfo, ContextInfo, CourseInfo, MemoryCatalog, ProfileFieldInfo,
    ProfileFieldType, RoleInfo, TagInfo, CONTEXT_COURSE, CONTEXT_COURSECAT,
};
use dyncohort_core::{Combinator, ConditionConfig, ConditionRecord, Rule};

/// Catalog with one category (id 1, context 3), one course (id 2, context 15),
/// a student role, two cohorts, two tags and a few custom profile fields
#[allow(dead_code)]
pub fn fixture_catalog() -> MemoryCatalog {
    MemoryCatalog::new()
        .with_category(CategoryInfo {
            id: 1,
            name: "Science".to_string(),
        })
        .with_course(CourseInfo {
            id: 2,
            fullname: "Chemistry 101".to_string(),
            category: 1,
            completion_enabled: true,
        })
        .with_context(ContextInfo {
            id: 3,
            level: CONTEXT_COURSECAT,
            instance_id: 1,
            path: "/1/3".to_string(),
        })
        .with_context(ContextInfo {
            id: 15,
            level: CONTEXT_COURSE,
            instance_id: 2,
            path: "/1/3/15".to_string(),
        })
        .with_role(RoleInfo {
            id: 5,
            shortname: "student".to_string(),
            name: "Student".to_string(),
        })
        .with_enrol_method("manual")
        .with_auth_method("manual")
        .with_cohort(CohortInfo {
            id: 20,
            name: "Chemists".to_string(),
            component: "tool_dynamic_cohorts".to_string(),
        })
        .with_cohort(CohortInfo {
            id: 21,
            name: "Staff".to_string(),
            component: String::new(),
        })
        .with_tag(TagInfo {
            id: 30,
            name: "chess".to_string(),
        })
        .with_tag(TagInfo {
            id: 31,
            name: "hiking".to_string(),
        })
        .with_profile_field(ProfileFieldInfo {
            id: 40,
            shortname: "pets".to_string(),
            name: "Pets".to_string(),
            datatype: ProfileFieldType::Multiselect,
            options: vec!["Cats".into(), "Dogs".into(), "Horses".into()],
        })
        .with_profile_field(ProfileFieldInfo {
            id: 41,
            shortname: "agreed".to_string(),
            name: "Agreed to terms".to_string(),
            datatype: ProfileFieldType::Checkbox,
            options: Vec::new(),
        })
}

/// One configured condition of every built-in kind, valid against
/// [`fixture_catalog`]
#[allow(dead_code)]
pub fn configured_conditions() -> Vec<ConditionRecord> {
    vec![
        ConditionRecord::new("course_completed", ConditionConfig::new().with("courseid", 2)),
        ConditionRecord::new(
            "course_not_completed",
            ConditionConfig::new().with("courseid", 2),
        ),
        ConditionRecord::new(
            "user_enrolment",
            ConditionConfig::new()
                .with("courseid", 2)
                .with("enrolmethod", "manual")
                .with("roleid", 5),
        ),
        ConditionRecord::new(
            "user_role",
            ConditionConfig::new()
                .with("roleid", 5)
                .with("contextlevel", CONTEXT_COURSECAT)
                .with("categoryid", 1)
                .with("includechildren", 1),
        ),
        ConditionRecord::new(
            "user_last_login",
            ConditionConfig::new()
                .with("operator", 5)
                .with("period_value", 2)
                .with("period_type", "weeks"),
        ),
        ConditionRecord::new(
            "user_created",
            ConditionConfig::new().with("operator", 4).with("time", 1_600_000_000),
        ),
        ConditionRecord::new(
            "user_profile_interests",
            ConditionConfig::new().with("tags", "30,31"),
        ),
        ConditionRecord::new(
            "user_profile",
            ConditionConfig::new()
                .with("profilefield", "email")
                .with("email_operator", 4)
                .with("email_value", "@example.com"),
        ),
        ConditionRecord::new(
            "user_custom_profile",
            ConditionConfig::new()
                .with("profilefield", "pets")
                .with("pets_value", "Dogs"),
        ),
        ConditionRecord::new("auth_method", ConditionConfig::new().with("authmethod", "manual")),
        ConditionRecord::new("cohort_membership", ConditionConfig::new().with("cohorts", "21")),
    ]
}

#[allow(dead_code)]
pub fn rule(combinator: Combinator, conditions: Vec<ConditionRecord>) -> Rule {
    Rule {
        id: 1,
        name: "Fixture rule".to_string(),
        description: String::new(),
        cohort_id: 20,
        combinator,
        enabled: true,
        broken: false,
        bulk_processing: false,
        realtime: true,
        conditions,
        time_created: 0,
        time_modified: 0,
    }
}
