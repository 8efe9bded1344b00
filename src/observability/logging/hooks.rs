//! Enrichment hooks run on every log entry before it is written.

use opentelemetry::trace::TraceContextExt;

use crate::observability::attributes::ResourceAttributes;
use crate::observability::logging::entry::LogEntry;

pub const TRACE_ID_KEY: &str = "trace_id";
pub const SPAN_ID_KEY: &str = "span_id";
pub const DD_TRACE_ID_KEY: &str = "dd.trace_id";
pub const DD_SPAN_ID_KEY: &str = "dd.span_id";

/// Receives every entry that passes the level threshold.
pub trait LogHook: Send + Sync {
    fn fire(&self, entry: &mut LogEntry<'_>);
}

/// Adds the build-identity resource attributes.
#[derive(Debug, Clone)]
pub struct StdFieldsHook {
    attributes: ResourceAttributes,
}

impl StdFieldsHook {
    pub fn new(attributes: ResourceAttributes) -> Self {
        Self { attributes }
    }
}

impl LogHook for StdFieldsHook {
    fn fire(&self, entry: &mut LogEntry<'_>) {
        for (key, value) in self.attributes.iter() {
            entry.insert(key, value);
        }
    }
}

/// Adds trace and span ids when the entry carries a recording span.
///
/// Entries without a context, or whose span is not recording, are left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceHook;

impl LogHook for TraceHook {
    fn fire(&self, entry: &mut LogEntry<'_>) {
        let Some(cx) = entry.context() else {
            return;
        };
        let span = cx.span();
        if !span.is_recording() {
            return;
        }

        let span_context = span.span_context();
        let trace_id = span_context.trace_id().to_string();
        let span_id = span_context.span_id().to_string();

        entry.insert(DD_TRACE_ID_KEY, trace_id.clone());
        entry.insert(DD_SPAN_ID_KEY, span_id.clone());
        entry.insert(TRACE_ID_KEY, trace_id);
        entry.insert(SPAN_ID_KEY, span_id);
    }
}
