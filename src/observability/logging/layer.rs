//! Bridge from `tracing` events into the [`LogSink`].

use std::fmt;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::config::LogLevel;
use crate::observability::logging::entry::Attribute;
use crate::observability::logging::LogSink;

const TARGET_KEY: &str = "target";

/// A `tracing_subscriber` layer that writes every event through a [`LogSink`].
///
/// The event's `message` becomes `msg` and an `error` field becomes the entry
/// error; all other fields become attributes. `tracing` has no fatal level, so
/// this layer never runs the exit hook.
#[derive(Clone)]
pub struct SinkLayer {
    sink: Arc<LogSink>,
}

impl SinkLayer {
    pub fn new(sink: Arc<LogSink>) -> Self {
        Self { sink }
    }
}

impl<S: Subscriber> Layer<S> for SinkLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = map_level(metadata.level());
        if !self.sink.enabled(level) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        visitor
            .attributes
            .push(Attribute::new(TARGET_KEY, metadata.target()));

        self.sink
            .emit(level, None, visitor.error, &visitor.message, &visitor.attributes);
    }
}

fn map_level(level: &Level) -> LogLevel {
    match *level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warn,
        Level::INFO => LogLevel::Info,
        _ => LogLevel::Debug,
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    error: Option<String>,
    attributes: Vec<Attribute>,
}

impl EventVisitor {
    fn push(&mut self, field: &Field, value: serde_json::Value) {
        self.attributes.push(Attribute::new(field.name(), value));
    }
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "error" => self.error = Some(value.to_string()),
            _ => self.push(field, value.into()),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, value.into());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        if field.name() == "error" {
            self.error = Some(value.to_string());
        } else {
            self.push(field, value.to_string().into());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{:?}", value);
        match field.name() {
            "message" => self.message = rendered,
            "error" => self.error = Some(rendered),
            _ => self.push(field, rendered.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::logging::tests::SharedBuffer;
    use crate::observability::logging::LogOutput;
    use tracing_subscriber::layer::SubscriberExt;

    fn capture(level: LogLevel, f: impl FnOnce()) -> Vec<serde_json::Value> {
        let sink = Arc::new(LogSink::new());
        let buf = SharedBuffer::default();
        sink.initialize(LogOutput::writer(buf.clone()), level, Vec::new());

        let subscriber = tracing_subscriber::registry().with(SinkLayer::new(sink));
        tracing::subscriber::with_default(subscriber, f);
        buf.lines()
    }

    #[test]
    fn test_event_fields_become_attributes() {
        let lines = capture(LogLevel::Debug, || {
            tracing::info!(endpoint = "x:1", retries = 3u64, "Connected");
        });

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["msg"], "Connected");
        assert_eq!(lines[0]["level"], "info");
        assert_eq!(lines[0]["endpoint"], "x:1");
        assert_eq!(lines[0]["retries"], 3);
        assert!(lines[0]["target"].as_str().is_some());
    }

    #[test]
    fn test_error_field_is_entry_error() {
        let lines = capture(LogLevel::Debug, || {
            let e = std::io::Error::new(std::io::ErrorKind::Other, "refused");
            tracing::warn!(error = %e, "Export failed");
        });

        assert_eq!(lines[0]["level"], "warn");
        assert_eq!(lines[0]["error"], "refused");
    }

    #[test]
    fn test_sink_threshold_applies() {
        let lines = capture(LogLevel::Warn, || {
            tracing::debug!("dropped");
            tracing::trace!("dropped");
            tracing::error!("kept");
        });

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "error");
    }
}
