//! In-memory capture of log events for test assertions
//!
//! Engine tests share one global subscriber, so every lookup here filters by
//! operation, rule id or domain event name rather than relying on order
//! across tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use dyncohort_core_types::schema::{FIELD_EVENT, FIELD_OP, FIELD_RULE_ID};
use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Field carrying the name of a traced domain event
const FIELD_DOMAIN_EVENT: &str = "domain_event";

/// One log record, every field rendered as a string
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    pub fields: HashMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn op(&self) -> Option<&str> {
        self.field(FIELD_OP)
    }

    /// Lifecycle marker (`start`, `end`, `end_error`) of a boundary record
    pub fn lifecycle(&self) -> Option<&str> {
        self.field(FIELD_EVENT)
    }

    pub fn rule_id(&self) -> Option<i64> {
        self.field(FIELD_RULE_ID).and_then(|v| v.parse().ok())
    }
}

#[derive(Default)]
struct FieldRenderer(HashMap<String, String>);

impl FieldRenderer {
    fn put(&mut self, field: &Field, value: String) {
        self.0.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldRenderer {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.to_string());
    }
}

struct CaptureLayer {
    buffer: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut renderer = FieldRenderer::default();
        event.record(&mut renderer);
        let captured = CapturedEvent {
            level: *event.metadata().level(),
            fields: renderer.0,
        };
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push(captured);
        }
    }
}

/// Read handle over everything captured since installation
#[derive(Clone)]
pub struct TestCapture {
    buffer: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl TestCapture {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.buffer.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Boundary records of one operation, in emission order
    pub fn events_for_op(&self, op: &str) -> Vec<CapturedEvent> {
        self.matching(|e| e.op() == Some(op))
    }

    /// Boundary records of one operation on one rule
    pub fn events_for_rule(&self, op: &str, rule_id: i64) -> Vec<CapturedEvent> {
        self.matching(|e| e.op() == Some(op) && e.rule_id() == Some(rule_id))
    }

    /// Traced domain events with the given name
    pub fn domain_events(&self, name: &str) -> Vec<CapturedEvent> {
        self.matching(|e| e.field(FIELD_DOMAIN_EVENT) == Some(name))
    }

    /// # Panics
    ///
    /// Panics if `op` never logged the `lifecycle` marker
    pub fn assert_event_exists(&self, op: &str, lifecycle: &str) {
        let seen = self.events_for_op(op);
        assert!(
            seen.iter().any(|e| e.lifecycle() == Some(lifecycle)),
            "no {} record for op {} ({} records for that op)",
            lifecycle,
            op,
            seen.len()
        );
    }

    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CapturedEvent) -> bool,
    {
        self.matching(predicate).len()
    }

    fn matching<F>(&self, predicate: F) -> Vec<CapturedEvent>
    where
        F: Fn(&CapturedEvent) -> bool,
    {
        self.events().into_iter().filter(|e| predicate(e)).collect()
    }
}

static GLOBAL_CAPTURE: OnceLock<TestCapture> = OnceLock::new();

/// Install the capture layer as the global subscriber
///
/// The first call installs it; later calls return a handle to the same
/// buffer.
///
/// ```
/// use dyncohort_core::logging_facility::test_capture::init_test_capture;
/// use dyncohort_core::log_op_start;
///
/// let capture = init_test_capture();
/// log_op_start!("doc_example_op", rule_id = 12);
/// capture.assert_event_exists("doc_example_op", "start");
/// assert_eq!(capture.events_for_rule("doc_example_op", 12).len(), 1);
/// ```
pub fn init_test_capture() -> TestCapture {
    GLOBAL_CAPTURE
        .get_or_init(|| {
            let buffer = Arc::new(Mutex::new(Vec::new()));
            let layer = CaptureLayer {
                buffer: buffer.clone(),
            };
            tracing_subscriber::registry().with(layer).init();
            TestCapture { buffer }
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> CapturedEvent {
        CapturedEvent {
            level: Level::INFO,
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_accessors_read_canonical_fields() {
        let event = record(&[("op", "evaluate_rule"), ("event", "end"), ("rule_id", "5")]);
        assert_eq!(event.op(), Some("evaluate_rule"));
        assert_eq!(event.lifecycle(), Some("end"));
        assert_eq!(event.rule_id(), Some(5));
        assert_eq!(event.field("missing"), None);
    }

    #[test]
    fn test_non_numeric_rule_id_is_ignored() {
        let event = record(&[("rule_id", "Some(3)")]);
        assert_eq!(event.rule_id(), None);
    }
}
