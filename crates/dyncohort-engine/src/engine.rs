//! Shared state threaded through every command

use dyncohort_core::{ConditionRegistry, DomainEvent, EventSink};
use dyncohort_store::SqliteEventLog;
use rusqlite::Connection;

use crate::cache::MatchingCache;
use crate::clock::{Clock, SystemClock};
use crate::settings::Settings;

/// Connection, condition registry, settings and event subscribers
///
/// Every domain event is traced, appended to the event log table and then
/// handed to each subscriber in registration order.
pub struct Engine {
    conn: Connection,
    registry: ConditionRegistry,
    settings: Settings,
    clock: Box<dyn Clock>,
    cache: MatchingCache,
    subscribers: Vec<Box<dyn EventSink>>,
}

impl Engine {
    /// Engine over a migrated connection with the built-in condition kinds
    pub fn new(conn: Connection, settings: Settings) -> Self {
        let cache = MatchingCache::new(settings.matching_cache_ttl_secs);
        Self {
            conn,
            registry: ConditionRegistry::with_defaults(),
            settings,
            clock: Box::new(SystemClock),
            cache,
            subscribers: Vec::new(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_registry(mut self, registry: ConditionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn subscribe(&mut self, sink: impl EventSink + 'static) {
        self.subscribers.push(Box::new(sink));
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn registry(&self) -> &ConditionRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn cache(&self) -> &MatchingCache {
        &self.cache
    }

    pub(crate) fn cache_mut(&mut self) -> &mut MatchingCache {
        &mut self.cache
    }

    /// Publish a domain event; delivery failures are logged, never returned
    pub(crate) fn emit(&self, event: DomainEvent) {
        event.trace();
        if let Err(err) = SqliteEventLog::new(&self.conn).append(&event) {
            tracing::warn!(
                domain_event = event.name(),
                error = %err,
                "failed to persist domain event"
            );
        }
        for subscriber in &self.subscribers {
            if let Err(err) = subscriber.emit(&event) {
                tracing::warn!(
                    domain_event = event.name(),
                    error = %err,
                    "event subscriber failed"
                );
            }
        }
    }
}
