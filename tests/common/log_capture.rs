//! In-memory sink for what the engine and workflow code log during a test.
//!
//! Workflow events (target `duroflow::workflow`) are the interesting ones for
//! replay-awareness, so the sink pulls out their message and the `instance`
//! field up front instead of leaving callers to dig through raw fields.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use duroflow::runtime::limits::WORKFLOW_LOG_TARGET;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    pub target: String,
    pub message: String,
    /// `instance` field, present on workflow events and most engine events.
    pub instance: Option<String>,
    pub fields: BTreeMap<String, String>,
}

impl LogRecord {
    pub fn is_workflow(&self) -> bool {
        self.target == WORKFLOW_LOG_TARGET
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Records collected on the current thread while the guard from
/// [`LogCapture::install`] is alive.
#[derive(Clone, Default)]
pub struct LogCapture {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl LogCapture {
    pub fn install() -> (Self, DefaultGuard) {
        let capture = LogCapture::default();
        let subscriber = tracing_subscriber::registry().with(Recorder {
            records: capture.records.clone(),
        });
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Messages emitted through the workflow logging macros, in order.
    pub fn workflow_messages(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(LogRecord::is_workflow)
            .map(|r| r.message)
            .collect()
    }

    pub fn first_workflow_record(&self) -> Option<LogRecord> {
        self.records().into_iter().find(LogRecord::is_workflow)
    }

    pub fn at_level(&self, level: Level) -> Vec<LogRecord> {
        self.records().into_iter().filter(|r| r.level == level).collect()
    }
}

struct Recorder {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl<S: Subscriber> Layer<S> for Recorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut record = LogRecord {
            level: *meta.level(),
            target: meta.target().to_string(),
            message: String::new(),
            instance: None,
            fields: BTreeMap::new(),
        };
        event.record(&mut record);
        self.records.lock().unwrap().push(record);
    }
}

impl Visit for LogRecord {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.store(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        self.store(field, format!("{value:?}"));
    }
}

impl LogRecord {
    fn store(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            "instance" => self.instance = Some(value),
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}
