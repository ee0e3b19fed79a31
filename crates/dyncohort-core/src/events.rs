//! Domain events raised by rule lifecycle changes and membership updates

use std::sync::{Arc, Mutex};

use dyncohort_core_types::schema::{
    DOMAIN_COHORT_MEMBER_ADDED, DOMAIN_COHORT_MEMBER_REMOVED, DOMAIN_CONDITION_CREATED,
    DOMAIN_CONDITION_DELETED, DOMAIN_CONDITION_UPDATED, DOMAIN_MATCHING_FAILED,
    DOMAIN_RULE_CREATED, DOMAIN_RULE_DELETED, DOMAIN_RULE_UPDATED,
};
use serde::Serialize;

use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    RuleCreated { rule_id: i64 },
    RuleUpdated { rule_id: i64 },
    RuleDeleted { rule_id: i64 },
    ConditionCreated { rule_id: i64, condition_id: i64 },
    ConditionUpdated { rule_id: i64, condition_id: i64 },
    ConditionDeleted { rule_id: i64, condition_id: i64 },
    MatchingFailed { rule_id: i64, message: String },
    CohortMemberAdded { cohort_id: i64, user_id: i64 },
    CohortMemberRemoved { cohort_id: i64, user_id: i64 },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::RuleCreated { .. } => DOMAIN_RULE_CREATED,
            DomainEvent::RuleUpdated { .. } => DOMAIN_RULE_UPDATED,
            DomainEvent::RuleDeleted { .. } => DOMAIN_RULE_DELETED,
            DomainEvent::ConditionCreated { .. } => DOMAIN_CONDITION_CREATED,
            DomainEvent::ConditionUpdated { .. } => DOMAIN_CONDITION_UPDATED,
            DomainEvent::ConditionDeleted { .. } => DOMAIN_CONDITION_DELETED,
            DomainEvent::MatchingFailed { .. } => DOMAIN_MATCHING_FAILED,
            DomainEvent::CohortMemberAdded { .. } => DOMAIN_COHORT_MEMBER_ADDED,
            DomainEvent::CohortMemberRemoved { .. } => DOMAIN_COHORT_MEMBER_REMOVED,
        }
    }

    /// Rule the event concerns, if any
    pub fn rule_id(&self) -> Option<i64> {
        match self {
            DomainEvent::RuleCreated { rule_id }
            | DomainEvent::RuleUpdated { rule_id }
            | DomainEvent::RuleDeleted { rule_id }
            | DomainEvent::ConditionCreated { rule_id, .. }
            | DomainEvent::ConditionUpdated { rule_id, .. }
            | DomainEvent::ConditionDeleted { rule_id, .. }
            | DomainEvent::MatchingFailed { rule_id, .. } => Some(*rule_id),
            DomainEvent::CohortMemberAdded { .. } | DomainEvent::CohortMemberRemoved { .. } => None,
        }
    }

    /// Event payload as a JSON object string
    pub fn payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Emit the event as an `info` trace
    pub fn trace(&self) {
        match self {
            DomainEvent::MatchingFailed { rule_id, message } => tracing::warn!(
                domain_event = self.name(),
                rule_id = *rule_id,
                error = %message,
                "domain event"
            ),
            DomainEvent::CohortMemberAdded { cohort_id, user_id }
            | DomainEvent::CohortMemberRemoved { cohort_id, user_id } => tracing::info!(
                domain_event = self.name(),
                cohort_id = *cohort_id,
                user_id = *user_id,
                "domain event"
            ),
            _ => tracing::info!(
                domain_event = self.name(),
                rule_id = ?self.rule_id(),
                "domain event"
            ),
        }
    }
}

/// Receiver of domain events
pub trait EventSink {
    /// # Errors
    ///
    /// Returns an error if the sink failed to record the event
    fn emit(&self, event: &DomainEvent) -> Result<()>;
}

/// Sink that keeps every event in memory
///
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingEventSink {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(DomainEvent::name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.name() == name).count()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &DomainEvent) -> Result<()> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| crate::errors::DynCohortError::Internal {
                message: "event buffer poisoned".to_string(),
            })?;
        events.push(event.clone());
        Ok(())
    }
}
