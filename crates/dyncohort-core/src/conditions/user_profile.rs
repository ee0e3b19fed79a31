use super::fields::{self, ComparisonStrategy, FieldSelection};
use super::{Condition, RuleScope, ValidationErrors};
use crate::catalog::Catalog;
use crate::model::ConditionConfig;
use crate::sql::{CompositionContext, Fragment, Params};

pub const KIND: &str = "user_profile";
pub const NAME: &str = "User standard profile field";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StandardFieldType {
    Text,
    Menu,
}

/// Columns of `users` that can be filtered on
const STANDARD_FIELDS: &[(&str, &str, StandardFieldType)] = &[
    ("username", "Username", StandardFieldType::Text),
    ("firstname", "First name", StandardFieldType::Text),
    ("lastname", "Last name", StandardFieldType::Text),
    ("email", "Email address", StandardFieldType::Text),
    ("idnumber", "ID number", StandardFieldType::Text),
    ("institution", "Institution", StandardFieldType::Text),
    ("department", "Department", StandardFieldType::Text),
    ("phone1", "Phone", StandardFieldType::Text),
    ("phone2", "Mobile phone", StandardFieldType::Text),
    ("address", "Address", StandardFieldType::Text),
    ("city", "City/town", StandardFieldType::Text),
    ("country", "Country", StandardFieldType::Menu),
    ("lang", "Preferred language", StandardFieldType::Menu),
];

fn lookup(field: &str) -> Option<(&'static str, StandardFieldType)> {
    STANDARD_FIELDS
        .iter()
        .find(|(name, _, _)| *name == field)
        .map(|(_, label, kind)| (*label, *kind))
}

fn strategy(kind: StandardFieldType) -> &'static dyn ComparisonStrategy {
    match kind {
        StandardFieldType::Text => fields::text(),
        StandardFieldType::Menu => fields::menu(),
    }
}

/// Users whose standard profile field compares to a value
#[derive(Debug)]
pub struct UserProfile {
    config: ConditionConfig,
}

impl UserProfile {
    pub fn new(config: ConditionConfig) -> Self {
        Self { config }
    }

    fn selection(&self) -> Option<(FieldSelection, &'static str, StandardFieldType)> {
        let selection = FieldSelection::from_config(&self.config)?;
        let (label, kind) = lookup(&selection.field)?;
        Some((selection, label, kind))
    }
}

pub fn factory(config: ConditionConfig, _scope: &RuleScope) -> Box<dyn Condition> {
    Box::new(UserProfile::new(config))
}

impl Condition for UserProfile {
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
        match self.selection() {
            Some((selection, _, kind)) => selection.usable_with(strategy(kind)).is_none(),
            None => true,
        }
    }

    fn build_sql(&self, ctx: &mut CompositionContext, _catalog: &dyn Catalog) -> Fragment {
        let Some((selection, _, kind)) = self.selection() else {
            return Fragment::never();
        };
        let strategy = strategy(kind);
        let Some((op, value)) = selection.usable_with(strategy) else {
            return Fragment::never();
        };
        let mut params = Params::new();
        let column = format!("u.{}", selection.field);
        match strategy.compare(ctx, &mut params, &column, op, &value) {
            Some(clause) => Fragment::new("", clause, params),
            None => Fragment::never(),
        }
    }

    fn events(&self) -> &'static [&'static str] {
        &["user_created", "user_updated"]
    }

    fn config_description(&self, _catalog: &dyn Catalog) -> String {
        match self.selection() {
            Some((selection, label, _)) => selection.describe(label),
            None => "Unknown profile field".to_string(),
        }
    }

    fn broken_description(&self, _catalog: &dyn Catalog) -> String {
        match FieldSelection::from_config(&self.config) {
            Some(selection) if lookup(&selection.field).is_none() => {
                format!("Profile field '{}' is not available", selection.field)
            }
            _ => "Invalid operator or value".to_string(),
        }
    }

    fn config_form_validate(
        &self,
        data: &ConditionConfig,
        _catalog: &dyn Catalog,
    ) -> ValidationErrors {
        let kind = FieldSelection::from_config(data)
            .and_then(|selection| lookup(&selection.field))
            .map(|(_, kind)| strategy(kind));
        fields::validate_selection(data, kind)
    }
}
