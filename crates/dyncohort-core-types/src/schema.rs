//! Canonical schema constants for structured logging and domain events
//!
//! These keep field names identical between the logging macros, the test
//! capture layer and the persisted event log.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_EVALUATION_ID: &str = "evaluation_id";

// Entity identifiers
pub const FIELD_RULE_ID: &str = "rule_id";
pub const FIELD_CONDITION_ID: &str = "condition_id";
pub const FIELD_COHORT_ID: &str = "cohort_id";
pub const FIELD_USER_ID: &str = "user_id";

// Collection sizes
pub const FIELD_MATCHED: &str = "matched";
pub const FIELD_ADDED: &str = "added";
pub const FIELD_REMOVED: &str = "removed";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical lifecycle event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

// Domain event names written to the event log
pub const DOMAIN_RULE_CREATED: &str = "rule_created";
pub const DOMAIN_RULE_UPDATED: &str = "rule_updated";
pub const DOMAIN_RULE_DELETED: &str = "rule_deleted";
pub const DOMAIN_CONDITION_CREATED: &str = "condition_created";
pub const DOMAIN_CONDITION_UPDATED: &str = "condition_updated";
pub const DOMAIN_CONDITION_DELETED: &str = "condition_deleted";
pub const DOMAIN_MATCHING_FAILED: &str = "matching_failed";
pub const DOMAIN_COHORT_MEMBER_ADDED: &str = "cohort_member_added";
pub const DOMAIN_COHORT_MEMBER_REMOVED: &str = "cohort_member_removed";
