//! Structured JSON logging.
//!
//! # Responsibilities
//! - Own the process log output, severity threshold and enrichment hooks
//! - Write one JSON object per entry (`time`, `level`, `msg`, `error`, fields)
//! - Terminate the process after a `fatal` entry through an injectable hook
//!
//! # Design Decisions
//! - Before `initialize` entries go to stderr at `info` with no hooks
//! - The sink is an explicit handle; `SinkLayer` bridges `tracing` events into it
//! - `reset` flushes the output and returns to the uninitialized state

pub mod entry;
pub mod hooks;
pub mod layer;

use std::error::Error;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use opentelemetry::Context;

use crate::config::LogLevel;
use crate::lifecycle::state::{Lifecycle, Teardown};
use crate::observability::error::{ObservabilityError, ObservabilityResult, Subsystem};

pub use entry::{Attribute, LogEntry, LogOutput};
pub use hooks::{LogHook, StdFieldsHook, TraceHook};
pub use layer::SinkLayer;

/// Called with the exit code after a `fatal` entry has been written.
pub type ExitHook = Box<dyn Fn(i32) + Send + Sync>;

/// Threshold used before the sink is initialized.
const FALLBACK_LEVEL: LogLevel = LogLevel::Info;

struct SinkState {
    output: Mutex<LogOutput>,
    min_level: LogLevel,
    hooks: Vec<Arc<dyn LogHook>>,
}

impl SinkState {
    fn write(&self, entry: &LogEntry<'_>) {
        let mut output = self
            .output
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Err(e) = entry.write_to(&mut *output) {
            eprintln!("failed to write log entry: {}", e);
        }
    }
}

impl Teardown for SinkState {
    fn teardown(&self) -> ObservabilityResult<()> {
        self.output
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .flush()
            .map_err(|e| ObservabilityError::exporter(Subsystem::Logging, e))
    }
}

fn exit_process(code: i32) {
    std::process::exit(code)
}

/// The process log sink.
pub struct LogSink {
    lifecycle: Lifecycle<SinkState>,
    exit_hook: ArcSwap<ExitHook>,
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(Subsystem::Logging),
            exit_hook: ArcSwap::from_pointee(Box::new(exit_process) as ExitHook),
        }
    }

    /// Set the output, threshold and hooks. Replaces any previous setup.
    pub fn initialize(&self, output: LogOutput, min_level: LogLevel, hooks: Vec<Arc<dyn LogHook>>) {
        self.lifecycle.install(SinkState {
            output: Mutex::new(output),
            min_level,
            hooks,
        });
    }

    pub fn is_initialized(&self) -> bool {
        self.lifecycle.is_initialized()
    }

    /// Flush the output and return to the uninitialized state. Idempotent.
    pub fn reset(&self) -> ObservabilityResult<()> {
        self.lifecycle.release_now(None)
    }

    /// Fail with the abort error kind unless the sink is initialized.
    pub fn ensure_initialized(&self) -> ObservabilityResult<()> {
        self.lifecycle.current().map(|_| ())
    }

    /// Replace the hook run after `fatal` entries (default: `process::exit`).
    pub fn set_exit_hook(&self, hook: impl Fn(i32) + Send + Sync + 'static) {
        self.exit_hook.store(Arc::new(Box::new(hook)));
    }

    pub fn min_level(&self) -> LogLevel {
        self.lifecycle
            .current()
            .map(|state| state.min_level)
            .unwrap_or(FALLBACK_LEVEL)
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level()
    }

    pub fn debug(&self, msg: &str, attrs: &[Attribute]) {
        self.emit(LogLevel::Debug, None, None, msg, attrs);
    }

    pub fn info(&self, msg: &str, attrs: &[Attribute]) {
        self.emit(LogLevel::Info, None, None, msg, attrs);
    }

    pub fn warn(&self, msg: &str, attrs: &[Attribute]) {
        self.emit(LogLevel::Warn, None, None, msg, attrs);
    }

    pub fn error(&self, err: &dyn Error, msg: &str, attrs: &[Attribute]) {
        self.emit(LogLevel::Error, None, Some(err.to_string()), msg, attrs);
    }

    /// Write the entry, then run the exit hook.
    pub fn fatal(&self, err: &dyn Error, msg: &str, attrs: &[Attribute]) {
        self.emit(LogLevel::Fatal, None, Some(err.to_string()), msg, attrs);
    }

    pub fn debug_with_context(&self, cx: &Context, msg: &str, attrs: &[Attribute]) {
        self.emit(LogLevel::Debug, Some(cx), None, msg, attrs);
    }

    pub fn info_with_context(&self, cx: &Context, msg: &str, attrs: &[Attribute]) {
        self.emit(LogLevel::Info, Some(cx), None, msg, attrs);
    }

    pub fn warn_with_context(&self, cx: &Context, msg: &str, attrs: &[Attribute]) {
        self.emit(LogLevel::Warn, Some(cx), None, msg, attrs);
    }

    pub fn error_with_context(&self, cx: &Context, err: &dyn Error, msg: &str, attrs: &[Attribute]) {
        self.emit(LogLevel::Error, Some(cx), Some(err.to_string()), msg, attrs);
    }

    pub fn fatal_with_context(&self, cx: &Context, err: &dyn Error, msg: &str, attrs: &[Attribute]) {
        self.emit(LogLevel::Fatal, Some(cx), Some(err.to_string()), msg, attrs);
    }

    pub(crate) fn emit(
        &self,
        level: LogLevel,
        cx: Option<&Context>,
        error: Option<String>,
        msg: &str,
        attrs: &[Attribute],
    ) {
        let mut entry = LogEntry::new(level, msg, error, cx);
        for attr in attrs {
            entry.insert(attr.key.clone(), attr.value.clone());
        }

        match self.lifecycle.current() {
            Ok(state) => {
                if level >= state.min_level {
                    for hook in &state.hooks {
                        hook.fire(&mut entry);
                    }
                    state.write(&entry);
                }
            }
            Err(_) => {
                if level >= FALLBACK_LEVEL {
                    let _ = entry.write_to(&mut io::stderr().lock());
                }
            }
        }

        if level == LogLevel::Fatal {
            let exit = self.exit_hook.load_full();
            (**exit)(1);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    /// Writer that keeps everything in a shared buffer.
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub(crate) fn lines(&self) -> Vec<serde_json::Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn sink_with_buffer(level: LogLevel) -> (LogSink, SharedBuffer) {
        let sink = LogSink::new();
        let buf = SharedBuffer::default();
        sink.initialize(LogOutput::writer(buf.clone()), level, Vec::new());
        sink.set_exit_hook(|_| {});
        (sink, buf)
    }

    #[test]
    fn test_levels_and_attributes() {
        let (sink, buf) = sink_with_buffer(LogLevel::Debug);
        let attrs = [Attribute::new("key1", "value1"), Attribute::new("key2", 2)];

        sink.debug("debug message", &attrs);
        sink.info("info message", &attrs);
        sink.warn("warn message", &attrs);

        let lines = buf.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["level"], "debug");
        assert_eq!(lines[1]["msg"], "info message");
        assert_eq!(lines[2]["level"], "warn");
        for line in &lines {
            assert_eq!(line["key1"], "value1");
            assert_eq!(line["key2"], 2);
        }
    }

    #[test]
    fn test_below_threshold_dropped() {
        let (sink, buf) = sink_with_buffer(LogLevel::Warn);

        sink.debug("nope", &[]);
        sink.info("nope", &[]);
        sink.warn("yes", &[]);

        let lines = buf.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["msg"], "yes");
    }

    #[test]
    fn test_error_carries_error_value() {
        let (sink, buf) = sink_with_buffer(LogLevel::Info);
        let err = io::Error::new(io::ErrorKind::Other, "disk on fire");

        sink.error(&err, "write failed", &[]);

        let lines = buf.lines();
        assert_eq!(lines[0]["level"], "error");
        assert_eq!(lines[0]["error"], "disk on fire");
    }

    #[test]
    fn test_fatal_writes_then_exits() {
        let (sink, buf) = sink_with_buffer(LogLevel::Error);
        let code = Arc::new(AtomicI32::new(-1));
        let seen = code.clone();
        sink.set_exit_hook(move |c| seen.store(c, Ordering::SeqCst));

        let err = io::Error::new(io::ErrorKind::Other, "fatal");
        sink.fatal(&err, "giving up", &[]);

        assert_eq!(code.load(Ordering::SeqCst), 1);
        assert_eq!(buf.lines()[0]["level"], "fatal");
    }

    #[test]
    fn test_hooks_fire_in_order() {
        struct Tag(&'static str);
        impl LogHook for Tag {
            fn fire(&self, entry: &mut LogEntry<'_>) {
                entry.insert("tag", self.0);
            }
        }

        let sink = LogSink::new();
        let buf = SharedBuffer::default();
        sink.initialize(
            LogOutput::writer(buf.clone()),
            LogLevel::Info,
            vec![Arc::new(Tag("first")), Arc::new(Tag("second"))],
        );

        sink.info("m", &[Attribute::new("tag", "caller")]);
        assert_eq!(buf.lines()[0]["tag"], "second");
    }

    #[test]
    fn test_reset_is_idempotent() {
        let (sink, _buf) = sink_with_buffer(LogLevel::Info);
        assert!(sink.is_initialized());

        sink.reset().unwrap();
        sink.reset().unwrap();

        assert!(!sink.is_initialized());
        assert_eq!(sink.min_level(), LogLevel::Info);
        assert!(sink.ensure_initialized().unwrap_err().is_abort());
    }

    #[test]
    fn test_reinitialize_switches_output() {
        let (sink, first) = sink_with_buffer(LogLevel::Info);
        let second = SharedBuffer::default();

        sink.info("to first", &[]);
        sink.initialize(LogOutput::writer(second.clone()), LogLevel::Info, Vec::new());
        sink.info("to second", &[]);

        assert_eq!(first.lines().len(), 1);
        assert_eq!(second.lines().len(), 1);
        assert_eq!(second.lines()[0]["msg"], "to second");
    }
}
