//! Condition kinds and their registry
//!
//! A condition turns its stored configuration into a [`Fragment`] that selects
//! matching users through the outer alias `u`. Kinds are trait objects created
//! from a [`ConditionRegistry`] keyed by the kind identifier stored with each
//! condition row.

use std::collections::BTreeMap;
use std::fmt;

use crate::catalog::Catalog;
use crate::errors::{DynCohortError, Result};
use crate::model::{ConditionConfig, ConditionRecord};
use crate::sql::{CompositionContext, Fragment};

pub mod auth_method;
pub mod cohort_membership;
pub mod course_completed;
pub mod course_not_completed;
pub mod fields;
pub mod missing;
pub mod point_in_time;
pub mod user_created;
pub mod user_custom_profile;
pub mod user_enrolment;
pub mod user_last_login;
pub mod user_profile;
pub mod user_profile_interests;
pub mod user_role;

pub use missing::MissingCondition;

/// Field name to error message, empty when the submission is valid
pub type ValidationErrors = BTreeMap<String, String>;

/// Facts about the owning rule that some kinds need when instantiated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleScope {
    pub rule_id: i64,
    pub cohort_id: i64,
}

pub trait Condition: fmt::Debug {
    /// Registry key, e.g. `user_last_login`
    fn kind(&self) -> &str;

    /// Human-readable kind name
    fn name(&self) -> &'static str;

    fn config_data(&self) -> &ConditionConfig;

    /// Whether the configuration points at something missing or invalid.
    /// An empty configuration is never broken.
    fn is_broken(&self, catalog: &dyn Catalog) -> bool;

    /// Fragment for a configured, healthy condition
    fn build_sql(&self, ctx: &mut CompositionContext, catalog: &dyn Catalog) -> Fragment;

    /// Fragment used in composition; matches nobody when unconfigured or broken
    fn get_sql(&self, ctx: &mut CompositionContext, catalog: &dyn Catalog) -> Fragment {
        if self.config_data().is_empty() || self.is_broken(catalog) {
            return Fragment::never();
        }
        self.build_sql(ctx, catalog)
    }

    /// Trigger events for real-time re-evaluation; empty means batch only
    fn events(&self) -> &'static [&'static str] {
        &[]
    }

    fn config_description(&self, catalog: &dyn Catalog) -> String;

    fn broken_description(&self, _catalog: &dyn Catalog) -> String {
        "Condition is broken. Please check its configuration.".to_string()
    }

    /// Validate a submitted configuration for this kind
    fn config_form_validate(&self, data: &ConditionConfig, catalog: &dyn Catalog)
        -> ValidationErrors;
}

pub type ConditionFactory = fn(ConditionConfig, &RuleScope) -> Box<dyn Condition>;

struct Registration {
    name: &'static str,
    factory: ConditionFactory,
}

/// Kind identifier to constructor map, populated at startup
pub struct ConditionRegistry {
    kinds: BTreeMap<&'static str, Registration>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
    }

    /// Registry holding every built-in kind
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            course_completed::KIND,
            course_completed::NAME,
            course_completed::factory,
        );
        registry.register(
            course_not_completed::KIND,
            course_not_completed::NAME,
            course_not_completed::factory,
        );
        registry.register(user_enrolment::KIND, user_enrolment::NAME, user_enrolment::factory);
        registry.register(user_role::KIND, user_role::NAME, user_role::factory);
        registry.register(user_last_login::KIND, user_last_login::NAME, user_last_login::factory);
        registry.register(user_created::KIND, user_created::NAME, user_created::factory);
        registry.register(
            user_profile_interests::KIND,
            user_profile_interests::NAME,
            user_profile_interests::factory,
        );
        registry.register(user_profile::KIND, user_profile::NAME, user_profile::factory);
        registry.register(
            user_custom_profile::KIND,
            user_custom_profile::NAME,
            user_custom_profile::factory,
        );
        registry.register(auth_method::KIND, auth_method::NAME, auth_method::factory);
        registry.register(
            cohort_membership::KIND,
            cohort_membership::NAME,
            cohort_membership::factory,
        );
        registry
    }

    /// Add or replace a kind
    pub fn register(&mut self, kind: &'static str, name: &'static str, factory: ConditionFactory) {
        self.kinds.insert(kind, Registration { name, factory });
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// (kind, name) pairs sorted by kind
    pub fn kinds(&self) -> Vec<(&'static str, &'static str)> {
        self.kinds
            .iter()
            .map(|(kind, registration)| (*kind, registration.name))
            .collect()
    }

    /// # Errors
    ///
    /// Returns `UnknownConditionKind` if `kind` is not registered
    pub fn create(
        &self,
        kind: &str,
        config: ConditionConfig,
        scope: &RuleScope,
    ) -> Result<Box<dyn Condition>> {
        let registration =
            self.kinds
                .get(kind)
                .ok_or_else(|| DynCohortError::UnknownConditionKind {
                    kind: kind.to_string(),
                })?;
        Ok((registration.factory)(config, scope))
    }

    /// Build the condition for a stored row
    ///
    /// Rows naming an unregistered kind load as an always-broken placeholder
    /// so that the owning rule is flagged rather than silently widened.
    pub fn instantiate(&self, record: &ConditionRecord, scope: &RuleScope) -> Box<dyn Condition> {
        match self.create(&record.kind, record.config.clone(), scope) {
            Ok(condition) => condition,
            Err(_) => {
                tracing::warn!(
                    kind = %record.kind,
                    condition_id = ?record.id,
                    "unknown condition kind, loading as broken"
                );
                Box::new(MissingCondition::new(&record.kind, record.config.clone()))
            }
        }
    }
}

impl Default for ConditionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Render a unix timestamp for condition descriptions
pub(crate) fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;

    #[test]
    fn test_defaults_register_every_kind() {
        let registry = ConditionRegistry::with_defaults();
        let kinds: Vec<&str> = registry.kinds().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![
                "auth_method",
                "cohort_membership",
                "course_completed",
                "course_not_completed",
                "user_created",
                "user_custom_profile",
                "user_enrolment",
                "user_last_login",
                "user_profile",
                "user_profile_interests",
                "user_role",
            ]
        );
    }

    #[test]
    fn test_create_unknown_kind_errors() {
        let registry = ConditionRegistry::with_defaults();
        let err = registry
            .create("no_such_kind", ConditionConfig::new(), &RuleScope::default())
            .unwrap_err();
        assert_eq!(
            err,
            DynCohortError::UnknownConditionKind {
                kind: "no_such_kind".to_string()
            }
        );
    }

    #[test]
    fn test_instantiate_unknown_kind_is_broken_placeholder() {
        let registry = ConditionRegistry::with_defaults();
        let record = ConditionRecord::new("removed_plugin", ConditionConfig::new());
        let condition = registry.instantiate(&record, &RuleScope::default());
        let catalog = MemoryCatalog::new();
        assert_eq!(condition.kind(), "removed_plugin");
        assert!(condition.is_broken(&catalog));
        let mut ctx = CompositionContext::new(0);
        assert!(condition.get_sql(&mut ctx, &catalog).is_never());
    }

    #[test]
    fn test_unconfigured_condition_not_broken_but_matches_nobody() {
        let registry = ConditionRegistry::with_defaults();
        let catalog = MemoryCatalog::new();
        for (kind, _) in registry.kinds() {
            let condition = registry
                .create(kind, ConditionConfig::new(), &RuleScope::default())
                .unwrap();
            assert!(!condition.is_broken(&catalog), "{} broken when empty", kind);
            let mut ctx = CompositionContext::new(0);
            assert!(condition.get_sql(&mut ctx, &catalog).is_never(), "{}", kind);
        }
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00 UTC");
    }
}
