use super::{Condition, ValidationErrors};
use crate::catalog::Catalog;
use crate::model::ConditionConfig;
use crate::sql::{CompositionContext, Fragment};

/// Stand-in for a stored condition whose kind is no longer registered
///
/// Always broken, so the owning rule cannot be enabled until the condition
/// is removed.
#[derive(Debug)]
pub struct MissingCondition {
    kind: String,
    config: ConditionConfig,
}

impl MissingCondition {
    pub fn new(kind: &str, config: ConditionConfig) -> Self {
        Self {
            kind: kind.to_string(),
            config,
        }
    }
}

impl Condition for MissingCondition {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn name(&self) -> &'static str {
        "Missing condition"
    }

    fn config_data(&self) -> &ConditionConfig {
        &self.config
    }

    fn is_broken(&self, _catalog: &dyn Catalog) -> bool {
        true
    }

    fn build_sql(&self, _ctx: &mut CompositionContext, _catalog: &dyn Catalog) -> Fragment {
        Fragment::never()
    }

    fn config_description(&self, _catalog: &dyn Catalog) -> String {
        format!("Condition of unknown kind '{}'", self.kind)
    }

    fn broken_description(&self, _catalog: &dyn Catalog) -> String {
        format!("Condition kind '{}' is not available", self.kind)
    }

    fn config_form_validate(
        &self,
        _data: &ConditionConfig,
        _catalog: &dyn Catalog,
    ) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.insert("kind".to_string(), format!("Unknown kind '{}'", self.kind));
        errors
    }
}
