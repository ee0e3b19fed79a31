//! Read-only view of the host platform that conditions consult
//!
//! Conditions use the catalog to decide whether their configuration still
//! points at something real and to resolve context ids while building SQL.
//! Lookups return `Option`/`Vec`; a failed lookup in a backing store is
//! reported by the implementation and treated here as "missing".

use std::collections::BTreeMap;

/// Context level of the whole site
pub const CONTEXT_SYSTEM: i64 = 10;
/// Context level of a course category
pub const CONTEXT_COURSECAT: i64 = 40;
/// Context level of a course
pub const CONTEXT_COURSE: i64 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseInfo {
    pub id: i64,
    pub fullname: String,
    pub category: i64,
    pub completion_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryInfo {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInfo {
    pub id: i64,
    pub shortname: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextInfo {
    pub id: i64,
    pub level: i64,
    pub instance_id: i64,
    /// Slash separated ancestry ending with this context, e.g. `/1/3/15`
    pub path: String,
}

impl ContextInfo {
    /// Ids of the ancestors recorded in `path`, root first
    pub fn parent_context_ids(&self, include_self: bool) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .path
            .split('/')
            .filter_map(|segment| segment.parse::<i64>().ok())
            .collect();
        ids.retain(|id| *id != self.id);
        if include_self {
            ids.push(self.id);
        }
        ids
    }

    /// True when `other` sits strictly below this context
    pub fn is_ancestor_of(&self, other: &ContextInfo) -> bool {
        other.path.starts_with(&format!("{}/", self.path))
    }
}

/// Custom profile field datatypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileFieldType {
    Text,
    Textarea,
    Menu,
    Checkbox,
    Date,
    Multiselect,
    /// Multi-valued field stored with a `", "` separator
    Autocomplete,
}

impl ProfileFieldType {
    pub fn parse(datatype: &str) -> Option<Self> {
        match datatype {
            "text" => Some(Self::Text),
            "textarea" => Some(Self::Textarea),
            "menu" | "select" => Some(Self::Menu),
            "checkbox" => Some(Self::Checkbox),
            "date" | "datetime" => Some(Self::Date),
            "multiselect" => Some(Self::Multiselect),
            "autocomplete" => Some(Self::Autocomplete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Menu => "menu",
            Self::Checkbox => "checkbox",
            Self::Date => "datetime",
            Self::Multiselect => "multiselect",
            Self::Autocomplete => "autocomplete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFieldInfo {
    pub id: i64,
    pub shortname: String,
    pub name: String,
    pub datatype: ProfileFieldType,
    /// Menu and multiselect choices, one per line in the host storage
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortInfo {
    pub id: i64,
    pub name: String,
    pub component: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInfo {
    pub id: i64,
    pub name: String,
}

pub trait Catalog {
    fn course(&self, id: i64) -> Option<CourseInfo>;
    fn category(&self, id: i64) -> Option<CategoryInfo>;
    fn role(&self, id: i64) -> Option<RoleInfo>;
    fn roles(&self) -> Vec<RoleInfo>;

    /// Enrolment plugin names currently enabled site-wide
    fn enabled_enrol_methods(&self) -> Vec<String>;
    /// Authentication plugin names currently enabled site-wide
    fn enabled_auth_methods(&self) -> Vec<String>;

    fn context(&self, level: i64, instance_id: i64) -> Option<ContextInfo>;
    /// Ids of every context below `context`, or `None` when the lookup
    /// itself failed
    fn child_context_ids(&self, context: &ContextInfo) -> Option<Vec<i64>>;

    fn profile_field(&self, shortname: &str) -> Option<ProfileFieldInfo>;
    fn tag(&self, id: i64) -> Option<TagInfo>;
    fn cohort(&self, id: i64) -> Option<CohortInfo>;

    fn system_context(&self) -> Option<ContextInfo> {
        self.context(CONTEXT_SYSTEM, 0)
    }
}

/// Catalog held entirely in memory
///
/// Used by unit tests and by callers that snapshot the platform up front.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    courses: BTreeMap<i64, CourseInfo>,
    categories: BTreeMap<i64, CategoryInfo>,
    roles: BTreeMap<i64, RoleInfo>,
    enrol_methods: Vec<String>,
    auth_methods: Vec<String>,
    contexts: Vec<ContextInfo>,
    profile_fields: BTreeMap<String, ProfileFieldInfo>,
    tags: BTreeMap<i64, TagInfo>,
    cohorts: BTreeMap<i64, CohortInfo>,
}

impl MemoryCatalog {
    /// Empty catalog with the system context (id 1) present
    pub fn new() -> Self {
        Self {
            contexts: vec![ContextInfo {
                id: 1,
                level: CONTEXT_SYSTEM,
                instance_id: 0,
                path: "/1".to_string(),
            }],
            ..Default::default()
        }
    }

    pub fn with_course(mut self, course: CourseInfo) -> Self {
        self.courses.insert(course.id, course);
        self
    }

    pub fn with_category(mut self, category: CategoryInfo) -> Self {
        self.categories.insert(category.id, category);
        self
    }

    pub fn with_role(mut self, role: RoleInfo) -> Self {
        self.roles.insert(role.id, role);
        self
    }

    pub fn with_enrol_method(mut self, name: &str) -> Self {
        self.enrol_methods.push(name.to_string());
        self
    }

    pub fn with_auth_method(mut self, name: &str) -> Self {
        self.auth_methods.push(name.to_string());
        self
    }

    pub fn with_context(mut self, context: ContextInfo) -> Self {
        self.contexts.retain(|c| c.id != context.id);
        self.contexts.push(context);
        self
    }

    pub fn with_profile_field(mut self, field: ProfileFieldInfo) -> Self {
        self.profile_fields.insert(field.shortname.clone(), field);
        self
    }

    pub fn with_tag(mut self, tag: TagInfo) -> Self {
        self.tags.insert(tag.id, tag);
        self
    }

    pub fn with_cohort(mut self, cohort: CohortInfo) -> Self {
        self.cohorts.insert(cohort.id, cohort);
        self
    }
}

impl Catalog for MemoryCatalog {
    fn course(&self, id: i64) -> Option<CourseInfo> {
        self.courses.get(&id).cloned()
    }

    fn category(&self, id: i64) -> Option<CategoryInfo> {
        self.categories.get(&id).cloned()
    }

    fn role(&self, id: i64) -> Option<RoleInfo> {
        self.roles.get(&id).cloned()
    }

    fn roles(&self) -> Vec<RoleInfo> {
        self.roles.values().cloned().collect()
    }

    fn enabled_enrol_methods(&self) -> Vec<String> {
        self.enrol_methods.clone()
    }

    fn enabled_auth_methods(&self) -> Vec<String> {
        self.auth_methods.clone()
    }

    fn context(&self, level: i64, instance_id: i64) -> Option<ContextInfo> {
        self.contexts
            .iter()
            .find(|c| c.level == level && c.instance_id == instance_id)
            .cloned()
    }

    fn child_context_ids(&self, context: &ContextInfo) -> Option<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .contexts
            .iter()
            .filter(|c| context.is_ancestor_of(c))
            .map(|c| c.id)
            .collect();
        ids.sort_unstable();
        Some(ids)
    }

    fn profile_field(&self, shortname: &str) -> Option<ProfileFieldInfo> {
        self.profile_fields.get(shortname).cloned()
    }

    fn tag(&self, id: i64) -> Option<TagInfo> {
        self.tags.get(&id).cloned()
    }

    fn cohort(&self, id: i64) -> Option<CohortInfo> {
        self.cohorts.get(&id).cloned()
    }
}
