//! Stateless field comparison strategies
//!
//! Profile-based conditions pick a strategy by field datatype and ask it for
//! a where clause over a column expression. A strategy returns `None` for an
//! operator it does not support or a value it cannot bind; callers treat that
//! as a broken configuration.

use super::ValidationErrors;
use crate::catalog::ProfileFieldType;
use crate::model::ConditionConfig;
use crate::sql::{CompositionContext, Params};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOperator {
    Contains,
    DoesNotContain,
    IsEqualTo,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEqualTo,
    IsNotEmpty,
    DateIsAfter,
    DateIsBefore,
    DateInThePast,
    DateInTheFuture,
}

impl FieldOperator {
    pub fn code(self) -> i64 {
        match self {
            FieldOperator::Contains => 0,
            FieldOperator::DoesNotContain => 1,
            FieldOperator::IsEqualTo => 2,
            FieldOperator::StartsWith => 3,
            FieldOperator::EndsWith => 4,
            FieldOperator::IsEmpty => 5,
            FieldOperator::IsNotEqualTo => 6,
            FieldOperator::IsNotEmpty => 7,
            FieldOperator::DateIsAfter => 8,
            FieldOperator::DateIsBefore => 9,
            FieldOperator::DateInThePast => 10,
            FieldOperator::DateInTheFuture => 11,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => FieldOperator::Contains,
            1 => FieldOperator::DoesNotContain,
            2 => FieldOperator::IsEqualTo,
            3 => FieldOperator::StartsWith,
            4 => FieldOperator::EndsWith,
            5 => FieldOperator::IsEmpty,
            6 => FieldOperator::IsNotEqualTo,
            7 => FieldOperator::IsNotEmpty,
            8 => FieldOperator::DateIsAfter,
            9 => FieldOperator::DateIsBefore,
            10 => FieldOperator::DateInThePast,
            11 => FieldOperator::DateInTheFuture,
            _ => return None,
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            FieldOperator::Contains => "contains",
            FieldOperator::DoesNotContain => "doesn't contain",
            FieldOperator::IsEqualTo => "is equal to",
            FieldOperator::StartsWith => "starts with",
            FieldOperator::EndsWith => "ends with",
            FieldOperator::IsEmpty => "is empty",
            FieldOperator::IsNotEqualTo => "isn't equal to",
            FieldOperator::IsNotEmpty => "is not empty",
            FieldOperator::DateIsAfter => "is after",
            FieldOperator::DateIsBefore => "is before",
            FieldOperator::DateInThePast => "is in the past",
            FieldOperator::DateInTheFuture => "is in the future",
        }
    }

    /// Whether the operator compares against a user supplied value
    pub fn takes_value(self) -> bool {
        !matches!(
            self,
            FieldOperator::IsEmpty
                | FieldOperator::IsNotEmpty
                | FieldOperator::DateInThePast
                | FieldOperator::DateInTheFuture
        )
    }
}

pub trait ComparisonStrategy: Sync {
    fn operators(&self) -> &'static [FieldOperator];

    fn supports(&self, op: FieldOperator) -> bool {
        self.operators().contains(&op)
    }

    fn compare(
        &self,
        ctx: &mut CompositionContext,
        params: &mut Params,
        column: &str,
        op: FieldOperator,
        value: &str,
    ) -> Option<String>;
}

/// Escape LIKE wildcards; pair with `ESCAPE '\'`
pub fn like_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn like(column: &str, placeholder: &str, negate: bool) -> String {
    let not = if negate { "NOT " } else { "" };
    format!("{} {}LIKE {} ESCAPE '\\'", column, not, placeholder)
}

/// Free text fields, case-insensitive
pub struct TextComparison;

impl ComparisonStrategy for TextComparison {
    fn operators(&self) -> &'static [FieldOperator] {
        &[
            FieldOperator::Contains,
            FieldOperator::DoesNotContain,
            FieldOperator::IsEqualTo,
            FieldOperator::IsNotEqualTo,
            FieldOperator::StartsWith,
            FieldOperator::EndsWith,
            FieldOperator::IsEmpty,
            FieldOperator::IsNotEmpty,
        ]
    }

    fn compare(
        &self,
        ctx: &mut CompositionContext,
        params: &mut Params,
        column: &str,
        op: FieldOperator,
        value: &str,
    ) -> Option<String> {
        let escaped = like_escape(value);
        let sql = match op {
            FieldOperator::Contains => {
                let p = ctx.bind(params, format!("%{}%", escaped));
                like(column, &p, false)
            }
            FieldOperator::DoesNotContain => {
                let p = ctx.bind(params, format!("%{}%", escaped));
                like(column, &p, true)
            }
            FieldOperator::IsEqualTo => {
                let p = ctx.bind(params, value);
                format!("LOWER({}) = LOWER({})", column, p)
            }
            FieldOperator::IsNotEqualTo => {
                let p = ctx.bind(params, value);
                format!("LOWER({}) <> LOWER({})", column, p)
            }
            FieldOperator::StartsWith => {
                let p = ctx.bind(params, format!("{}%", escaped));
                like(column, &p, false)
            }
            FieldOperator::EndsWith => {
                let p = ctx.bind(params, format!("%{}", escaped));
                like(column, &p, false)
            }
            FieldOperator::IsEmpty => {
                let p = ctx.bind(params, "");
                format!("{} = {}", column, p)
            }
            FieldOperator::IsNotEmpty => {
                let p = ctx.bind(params, "");
                format!("{} <> {}", column, p)
            }
            _ => return None,
        };
        Some(sql)
    }
}

/// Single choice fields compared by whole stored value, case-insensitive
pub struct MenuComparison;

impl ComparisonStrategy for MenuComparison {
    fn operators(&self) -> &'static [FieldOperator] {
        &[FieldOperator::IsEqualTo, FieldOperator::IsNotEqualTo]
    }

    fn compare(
        &self,
        ctx: &mut CompositionContext,
        params: &mut Params,
        column: &str,
        op: FieldOperator,
        value: &str,
    ) -> Option<String> {
        let comparison = match op {
            FieldOperator::IsEqualTo => "=",
            FieldOperator::IsNotEqualTo => "<>",
            _ => return None,
        };
        let p = ctx.bind(params, value);
        Some(format!(
            "LOWER(CAST({} AS TEXT)) {} LOWER({})",
            column, comparison, p
        ))
    }
}

/// Checkbox fields only ever test for the ticked or unticked value
pub struct CheckboxComparison;

impl ComparisonStrategy for CheckboxComparison {
    fn operators(&self) -> &'static [FieldOperator] {
        &[FieldOperator::IsEqualTo]
    }

    fn compare(
        &self,
        ctx: &mut CompositionContext,
        params: &mut Params,
        column: &str,
        op: FieldOperator,
        value: &str,
    ) -> Option<String> {
        if op != FieldOperator::IsEqualTo || !matches!(value, "0" | "1") {
            return None;
        }
        MenuComparison.compare(ctx, params, column, op, value)
    }
}

/// Unix timestamp fields, where 0 means "not set"
pub struct DateComparison;

impl ComparisonStrategy for DateComparison {
    fn operators(&self) -> &'static [FieldOperator] {
        &[
            FieldOperator::DateIsAfter,
            FieldOperator::DateIsBefore,
            FieldOperator::IsEmpty,
            FieldOperator::IsNotEmpty,
            FieldOperator::DateInThePast,
            FieldOperator::DateInTheFuture,
        ]
    }

    fn compare(
        &self,
        ctx: &mut CompositionContext,
        params: &mut Params,
        column: &str,
        op: FieldOperator,
        value: &str,
    ) -> Option<String> {
        let sql = match op {
            FieldOperator::IsEmpty => {
                let p = ctx.bind(params, 0_i64);
                format!("({c} = {p} OR {c} IS NULL)", c = column, p = p)
            }
            FieldOperator::IsNotEmpty => {
                let p = ctx.bind(params, 0_i64);
                format!("{} <> {}", column, p)
            }
            FieldOperator::DateIsBefore => {
                let ts: i64 = value.trim().parse().ok()?;
                let p = ctx.bind(params, ts);
                format!("{} <= {}", column, p)
            }
            FieldOperator::DateIsAfter => {
                let ts: i64 = value.trim().parse().ok()?;
                let p = ctx.bind(params, ts);
                format!("{} >= {}", column, p)
            }
            FieldOperator::DateInThePast => {
                let now = ctx.now();
                let p = ctx.bind(params, now);
                format!("{c} <> 0 AND {c} <= {p}", c = column, p = p)
            }
            FieldOperator::DateInTheFuture => {
                let now = ctx.now();
                let p = ctx.bind(params, now);
                format!("{} >= {}", column, p)
            }
            _ => return None,
        };
        Some(sql)
    }
}

/// Comma separated multi-valued fields
///
/// A value matches when it is the whole field, the first item, a middle item
/// or the last item. Host field types write either `","` or `", "` between
/// items, so the stored column and the value are both reduced to bare commas
/// before comparing.
pub struct MultiselectComparison;

impl MultiselectComparison {
    fn normalised_column(column: &str) -> String {
        format!("REPLACE({}, ', ', ',')", column)
    }

    fn normalised_value(value: &str) -> String {
        value.trim().replace(", ", ",")
    }
}

impl ComparisonStrategy for MultiselectComparison {
    fn operators(&self) -> &'static [FieldOperator] {
        &[FieldOperator::IsEqualTo, FieldOperator::IsNotEqualTo]
    }

    fn compare(
        &self,
        ctx: &mut CompositionContext,
        params: &mut Params,
        column: &str,
        op: FieldOperator,
        value: &str,
    ) -> Option<String> {
        let negate = match op {
            FieldOperator::IsEqualTo => false,
            FieldOperator::IsNotEqualTo => true,
            _ => return None,
        };
        let column = Self::normalised_column(column);
        let value = Self::normalised_value(value);
        let escaped = like_escape(&value);

        let exact = ctx.bind(params, value.as_str());
        let start = ctx.bind(params, format!("{},%", escaped));
        let middle = ctx.bind(params, format!("%,{},%", escaped));
        let end = ctx.bind(params, format!("%,{}", escaped));

        let (equality, joiner) = if negate {
            (format!("LOWER({}) <> LOWER({})", column, exact), " AND ")
        } else {
            (format!("LOWER({}) = LOWER({})", column, exact), " OR ")
        };
        let parts = [
            equality,
            like(&column, &start, negate),
            like(&column, &middle, negate),
            like(&column, &end, negate),
        ];
        Some(format!("({})", parts.join(joiner)))
    }
}

/// Field, operator and value picked on a profile field form
///
/// Stored as `profilefield = <name>` plus `<name>_operator` and
/// `<name>_value`. A missing operator means IS_EQUAL_TO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelection {
    pub field: String,
    pub operator: Option<FieldOperator>,
    pub value: Option<String>,
}

impl FieldSelection {
    pub fn from_config(config: &ConditionConfig) -> Option<Self> {
        let field = config.text("profilefield")?;
        if field.is_empty() {
            return None;
        }
        let operator = match config.int(&format!("{}_operator", field)) {
            Some(code) => FieldOperator::from_code(code),
            None => Some(FieldOperator::IsEqualTo),
        };
        let value = config.text(&format!("{}_value", field));
        Some(Self {
            field,
            operator,
            value,
        })
    }

    /// Operator the strategy supports, with the value it needs present
    pub fn usable_with(
        &self,
        strategy: &dyn ComparisonStrategy,
    ) -> Option<(FieldOperator, String)> {
        let op = self.operator.filter(|op| strategy.supports(*op))?;
        let value = self.value.clone().unwrap_or_default();
        if op.takes_value() && self.value.is_none() {
            return None;
        }
        let mut probe = CompositionContext::new(0);
        strategy.compare(&mut probe, &mut Params::new(), "probe", op, &value)?;
        Some((op, value))
    }

    pub fn describe(&self, field_label: &str) -> String {
        match self.operator {
            Some(op) if op.takes_value() => format!(
                "{} {} '{}'",
                field_label,
                op.label(),
                self.value.as_deref().unwrap_or_default()
            ),
            Some(op) => format!("{} {}", field_label, op.label()),
            None => format!("{} (invalid operator)", field_label),
        }
    }
}

/// Form checks shared by the profile field kinds
pub fn validate_selection(
    data: &ConditionConfig,
    strategy: Option<&dyn ComparisonStrategy>,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    let (Some(selection), Some(strategy)) = (FieldSelection::from_config(data), strategy) else {
        errors.insert("fieldgroup".to_string(), "Please select a field".to_string());
        return errors;
    };
    match selection.operator {
        Some(op) if strategy.supports(op) => {
            let value = selection.value.as_deref().unwrap_or_default();
            if op.takes_value() && value.trim().is_empty() {
                errors.insert("fieldgroup".to_string(), "Invalid field value".to_string());
            } else if selection.usable_with(strategy).is_none() {
                errors.insert("fieldgroup".to_string(), "Invalid field value".to_string());
            }
        }
        _ => {
            errors.insert("fieldgroup".to_string(), "Invalid operator".to_string());
        }
    }
    errors
}

static TEXT: TextComparison = TextComparison;
static MENU: MenuComparison = MenuComparison;
static CHECKBOX: CheckboxComparison = CheckboxComparison;
static DATE: DateComparison = DateComparison;
static MULTISELECT: MultiselectComparison = MultiselectComparison;

/// Strategy for a custom profile field datatype
pub fn strategy_for(datatype: ProfileFieldType) -> &'static dyn ComparisonStrategy {
    match datatype {
        ProfileFieldType::Text | ProfileFieldType::Textarea => &TEXT,
        ProfileFieldType::Menu => &MENU,
        ProfileFieldType::Checkbox => &CHECKBOX,
        ProfileFieldType::Date => &DATE,
        ProfileFieldType::Multiselect | ProfileFieldType::Autocomplete => &MULTISELECT,
    }
}

pub fn text() -> &'static dyn ComparisonStrategy {
    &TEXT
}

pub fn menu() -> &'static dyn ComparisonStrategy {
    &MENU
}
