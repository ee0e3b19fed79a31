//! Point-in-time comparisons over unix timestamp columns
//!
//! The column holds 0 when the event never happened; every operator except
//! NEVER requires a positive value.

use super::{format_timestamp, ValidationErrors};
use crate::model::ConditionConfig;
use crate::sql::{CompositionContext, Params};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodUnit {
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl PeriodUnit {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hour" | "hours" => Some(PeriodUnit::Hours),
            "day" | "days" => Some(PeriodUnit::Days),
            "week" | "weeks" => Some(PeriodUnit::Weeks),
            "month" | "months" => Some(PeriodUnit::Months),
            "year" | "years" => Some(PeriodUnit::Years),
            _ => None,
        }
    }

    /// Length of one unit; months are 30 days and years 365 days
    pub fn seconds(self) -> i64 {
        match self {
            PeriodUnit::Hours => 3_600,
            PeriodUnit::Days => 86_400,
            PeriodUnit::Weeks => 604_800,
            PeriodUnit::Months => 2_592_000,
            PeriodUnit::Years => 31_536_000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PeriodUnit::Hours => "hours",
            PeriodUnit::Days => "days",
            PeriodUnit::Weeks => "weeks",
            PeriodUnit::Months => "months",
            PeriodUnit::Years => "years",
        }
    }
}

pub const OPERATOR_EVER: i64 = 1;
pub const OPERATOR_NEVER: i64 = 2;
pub const OPERATOR_BEFORE: i64 = 3;
pub const OPERATOR_AFTER: i64 = 4;
pub const OPERATOR_IN_LAST: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointInTime {
    /// The event happened at some point (ANY / EVER)
    Ever,
    Never,
    Before(i64),
    After(i64),
    InLast { value: i64, unit: PeriodUnit },
}

impl PointInTime {
    /// `time` for BEFORE/AFTER, `period_value` + `period_type` for IN_LAST
    pub fn before_from(config: &ConditionConfig, time_key: &str) -> Self {
        PointInTime::Before(config.int_or(time_key, 0))
    }

    pub fn after_from(config: &ConditionConfig, time_key: &str) -> Self {
        PointInTime::After(config.int_or(time_key, 0))
    }

    /// None when the period unit is missing or unknown
    pub fn in_last_from(config: &ConditionConfig) -> Option<Self> {
        let unit = PeriodUnit::parse(&config.text("period_type")?)?;
        Some(PointInTime::InLast {
            value: config.int_or("period_value", 0),
            unit,
        })
    }

    /// Map the shared login/creation operator codes onto a comparison
    ///
    /// 1 EVER, 2 NEVER, 3 BEFORE, 4 AFTER, 5 IN_LAST. Unknown codes and
    /// unparseable periods yield None.
    pub fn from_operator(config: &ConditionConfig, operator: i64) -> Option<Self> {
        match operator {
            OPERATOR_EVER => Some(PointInTime::Ever),
            OPERATOR_NEVER => Some(PointInTime::Never),
            OPERATOR_BEFORE => Some(Self::before_from(config, "time")),
            OPERATOR_AFTER => Some(Self::after_from(config, "time")),
            OPERATOR_IN_LAST => Self::in_last_from(config),
            _ => None,
        }
    }

    /// A threshold of 0 or an empty period can never be meaningful
    pub fn is_valid(&self) -> bool {
        match self {
            PointInTime::Ever | PointInTime::Never => true,
            PointInTime::Before(ts) | PointInTime::After(ts) => *ts > 0,
            PointInTime::InLast { value, .. } => *value > 0,
        }
    }

    pub fn where_clause(
        &self,
        ctx: &mut CompositionContext,
        params: &mut Params,
        column: &str,
    ) -> String {
        match self {
            PointInTime::Ever => format!("{} > 0", column),
            PointInTime::Never => format!("{} = 0", column),
            PointInTime::Before(ts) => {
                let p = ctx.bind(params, *ts);
                format!("{c} > 0 AND {c} < {p}", c = column, p = p)
            }
            PointInTime::After(ts) => {
                let p = ctx.bind(params, *ts);
                format!("{c} > 0 AND {c} > {p}", c = column, p = p)
            }
            PointInTime::InLast { value, unit } => {
                let since = ctx.now() - value.saturating_mul(unit.seconds());
                let p = ctx.bind(params, since);
                format!("{c} > 0 AND {c} >= {p}", c = column, p = p)
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            PointInTime::Ever => "ever".to_string(),
            PointInTime::Never => "never".to_string(),
            PointInTime::Before(ts) => format!("before {}", format_timestamp(*ts)),
            PointInTime::After(ts) => format!("after {}", format_timestamp(*ts)),
            PointInTime::InLast { value, unit } => {
                format!("in the last {} {}", value, unit.as_str())
            }
        }
    }
}

/// Form checks shared by the login and creation time kinds
pub fn validate_operator_form(data: &ConditionConfig, allowed: &[i64]) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    let operator = data.int("operator").unwrap_or(0);
    if !allowed.contains(&operator) {
        errors.insert("operator".to_string(), "Invalid operator".to_string());
        return errors;
    }
    match operator {
        OPERATOR_BEFORE | OPERATOR_AFTER if data.int_or("time", 0) <= 0 => {
            errors.insert("time".to_string(), "Required".to_string());
        }
        OPERATOR_IN_LAST => {
            if data.int_or("period_value", 0) <= 0 {
                errors.insert("period".to_string(), "Required".to_string());
            } else if PointInTime::in_last_from(data).is_none() {
                errors.insert("period".to_string(), "Invalid period".to_string());
            }
        }
        _ => {}
    }
    errors
}
