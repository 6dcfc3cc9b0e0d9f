//! In-memory event capture for logging assertions in tests
//!
//! Events are indexed by the shared log vocabulary: operation, event name,
//! database tag and table. Every other field is kept as rendered text.

use sqlmapper_core_types::schema::{
    EVENT_RETRY, FIELD_COMPONENT, FIELD_DB_TAG, FIELD_EVENT, FIELD_OP, FIELD_TABLE,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// One captured event
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    pub component: Option<String>,
    pub op: Option<String>,
    pub event: Option<String>,
    pub db_tag: Option<String>,
    pub table: Option<String>,
    /// Every field, including the indexed ones and `message`
    pub fields: HashMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    fn is(&self, op: &str, event: &str) -> bool {
        self.op.as_deref() == Some(op) && self.event.as_deref() == Some(event)
    }
}

/// Renders every field as text; `%` and `?` values arrive through
/// `record_debug`, so a Display value is stored without quotes
#[derive(Default)]
struct FieldVisitor {
    fields: HashMap<String, String>,
}

impl FieldVisitor {
    fn put(&mut self, field: &Field, value: String) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
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

/// Layer that appends every event to a shared buffer
pub struct TestCaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl TestCaptureLayer {
    pub fn new() -> (Self, TestCapture) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let layer = Self {
            events: events.clone(),
        };
        (layer, TestCapture { events })
    }
}

impl<S> Layer<S> for TestCaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let fields = visitor.fields;
        let get = |key: &str| fields.get(key).cloned();

        let captured = CapturedEvent {
            level: *event.metadata().level(),
            component: get(FIELD_COMPONENT),
            op: get(FIELD_OP),
            event: get(FIELD_EVENT),
            db_tag: get(FIELD_DB_TAG),
            table: get(FIELD_TABLE),
            fields: fields.clone(),
        };

        if let Ok(mut events) = self.events.lock() {
            events.push(captured);
        }
    }
}

/// Handle for reading captured events
#[derive(Clone)]
pub struct TestCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl TestCapture {
    /// All captured events, oldest first
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn events_for_op(&self, op: &str) -> Vec<CapturedEvent> {
        self.filtered(|e| e.op.as_deref() == Some(op))
    }

    /// Events that name `table`, from any mapper or the migrator
    pub fn events_for_table(&self, table: &str) -> Vec<CapturedEvent> {
        self.filtered(|e| e.table.as_deref() == Some(table))
    }

    /// Lock-contention retries logged for the context of `db_tag`
    pub fn retries(&self, db_tag: &str) -> usize {
        self.filtered(|e| {
            e.event.as_deref() == Some(EVENT_RETRY) && e.db_tag.as_deref() == Some(db_tag)
        })
        .len()
    }

    /// # Panics
    ///
    /// Panics if no event has this operation and event name
    pub fn assert_event_exists(&self, op: &str, event: &str) {
        let events = self.events();
        assert!(
            events.iter().any(|e| e.is(op, event)),
            "no event op={} event={} among {} captured events",
            op,
            event,
            events.len()
        );
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    fn filtered(&self, keep: impl Fn(&CapturedEvent) -> bool) -> Vec<CapturedEvent> {
        self.events().into_iter().filter(|e| keep(e)).collect()
    }
}

static GLOBAL_CAPTURE: OnceLock<TestCapture> = OnceLock::new();

/// Install the capture layer as the global subscriber (once) and return a handle
///
/// All tests of one binary share the buffer, so assertions should filter on
/// a unique op name, table or database tag.
///
/// # Example
///
/// ```
/// use sqlmapper_core::logging_facility::test_capture::init_test_capture;
/// use sqlmapper_core::log_op_start;
///
/// let capture = init_test_capture();
/// log_op_start!("doc_capture_op", table = "doc_table");
/// capture.assert_event_exists("doc_capture_op", "start");
/// assert_eq!(capture.events_for_table("doc_table").len(), 1);
/// ```
pub fn init_test_capture() -> TestCapture {
    GLOBAL_CAPTURE
        .get_or_init(|| {
            let (layer, capture) = TestCaptureLayer::new();
            tracing_subscriber::registry().with(layer).try_init().ok();
            capture
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(op: &str, event: &str, db_tag: Option<&str>) -> CapturedEvent {
        CapturedEvent {
            level: Level::WARN,
            component: None,
            op: Some(op.to_string()),
            event: Some(event.to_string()),
            db_tag: db_tag.map(str::to_string),
            table: None,
            fields: HashMap::new(),
        }
    }

    #[test]
    fn test_retries_are_counted_per_tag() {
        let (_layer, capture) = TestCaptureLayer::new();
        {
            let mut events = capture.events.lock().unwrap();
            events.push(event("update", EVENT_RETRY, Some("default")));
            events.push(event("update", EVENT_RETRY, Some("audit")));
            events.push(event("update", "end", Some("default")));
        }

        assert_eq!(capture.retries("default"), 1);
        assert_eq!(capture.retries("audit"), 1);
        assert_eq!(capture.retries("cache"), 0);

        capture.clear();
        assert!(capture.events().is_empty());
    }

    #[test]
    fn test_field_lookup() {
        let mut captured = event("save", "end", None);
        captured
            .fields
            .insert("duration_ms".to_string(), "3".to_string());

        assert_eq!(captured.field("duration_ms"), Some("3"));
        assert_eq!(captured.field("rows"), None);
        assert!(captured.is("save", "end"));
    }
}
