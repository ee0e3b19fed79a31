use super::fields::{self, FieldSelection};
use super::{Condition, RuleScope, ValidationErrors};
use crate::catalog::{Catalog, ProfileFieldInfo, ProfileFieldType};
use crate::model::ConditionConfig;
use crate::sql::{CompositionContext, Fragment, Params};

pub const KIND: &str = "user_custom_profile";
pub const NAME: &str = "User custom profile field";

/// Users whose custom profile field data compares to a value
///
/// Data lives in `user_info_data`, one row per user and field. Users with
/// no row only match when `include_missing_data` is set.
#[derive(Debug)]
pub struct UserCustomProfile {
    config: ConditionConfig,
}

impl UserCustomProfile {
    pub fn new(config: ConditionConfig) -> Self {
        Self { config }
    }

    fn resolve(&self, catalog: &dyn Catalog) -> Option<(FieldSelection, ProfileFieldInfo)> {
        let selection = FieldSelection::from_config(&self.config)?;
        let field = catalog.profile_field(&selection.field)?;
        Some((selection, field))
    }

    fn value_allowed(field: &ProfileFieldInfo, value: &str) -> bool {
        match field.datatype {
            ProfileFieldType::Menu if !field.options.is_empty() => {
                field
                    .options
                    .iter()
                    .any(|option| option.eq_ignore_ascii_case(value))
            }
            _ => true,
        }
    }
}

pub fn factory(config: ConditionConfig, _scope: &RuleScope) -> Box<dyn Condition> {
    Box::new(UserCustomProfile::new(config))
}

impl Condition for UserCustomProfile {
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
        let Some((selection, field)) = self.resolve(catalog) else {
            return true;
        };
        match selection.usable_with(fields::strategy_for(field.datatype)) {
            Some((op, value)) => op.takes_value() && !Self::value_allowed(&field, &value),
            None => true,
        }
    }

    fn build_sql(&self, ctx: &mut CompositionContext, catalog: &dyn Catalog) -> Fragment {
        let Some((selection, field)) = self.resolve(catalog) else {
            return Fragment::never();
        };
        let strategy = fields::strategy_for(field.datatype);
        let Some((op, value)) = selection.usable_with(strategy) else {
            return Fragment::never();
        };

        let mut params = Params::new();
        let d = ctx.generate_table_alias();
        let field_id = ctx.bind(&mut params, field.id);
        let join = format!(
            "LEFT JOIN user_info_data {d} ON ({d}.userid = u.id AND {d}.fieldid = {f})",
            d = d,
            f = field_id
        );
        let column = match field.datatype {
            ProfileFieldType::Date => format!("CAST({}.data AS INTEGER)", d),
            _ => format!("{}.data", d),
        };
        let Some(clause) = strategy.compare(ctx, &mut params, &column, op, &value) else {
            return Fragment::never();
        };
        let clause = if self.config.flag("include_missing_data") {
            format!("({}) OR {}.id IS NULL", clause, d)
        } else {
            clause
        };
        Fragment::new(join, clause, params)
    }

    fn events(&self) -> &'static [&'static str] {
        &["user_created", "user_updated"]
    }

    fn config_description(&self, catalog: &dyn Catalog) -> String {
        let Some(selection) = FieldSelection::from_config(&self.config) else {
            return "Unknown profile field".to_string();
        };
        let label = catalog
            .profile_field(&selection.field)
            .map(|f| f.name)
            .unwrap_or_else(|| selection.field.clone());
        let mut description = selection.describe(&label);
        if self.config.flag("include_missing_data") {
            description.push_str(" (including users with missing data)");
        }
        description
    }

    fn broken_description(&self, catalog: &dyn Catalog) -> String {
        match FieldSelection::from_config(&self.config) {
            Some(selection) if catalog.profile_field(&selection.field).is_none() => {
                format!("Custom profile field '{}' does not exist", selection.field)
            }
            _ => "Invalid operator or value".to_string(),
        }
    }

    fn config_form_validate(
        &self,
        data: &ConditionConfig,
        catalog: &dyn Catalog,
    ) -> ValidationErrors {
        let field = FieldSelection::from_config(data)
            .and_then(|selection| catalog.profile_field(&selection.field));
        let strategy = field.as_ref().map(|f| fields::strategy_for(f.datatype));
        let mut errors = fields::validate_selection(data, strategy);
        if let (Some(field), Some(selection)) = (field, FieldSelection::from_config(data)) {
            let value = selection.value.unwrap_or_default();
            let takes_value = selection.operator.is_some_and(|op| op.takes_value());
            if takes_value && !Self::value_allowed(&field, &value) {
                errors.insert("fieldgroup".to_string(), "Invalid field value".to_string());
            }
        }
        errors
    }
}
