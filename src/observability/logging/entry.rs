//! Log entries, attributes and output targets.

use std::io::{self, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use opentelemetry::Context;
use serde_json::{Map, Value};

use crate::config::LogLevel;

pub const TIME_KEY: &str = "time";
pub const LEVEL_KEY: &str = "level";
pub const MESSAGE_KEY: &str = "msg";
pub const ERROR_KEY: &str = "error";

/// A key/value pair attached to a single log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub key: String,
    pub value: Value,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Where log entries are written.
pub enum LogOutput {
    Stdout,
    Stderr,
    Writer(Box<dyn Write + Send>),
}

impl LogOutput {
    pub fn writer(w: impl Write + Send + 'static) -> Self {
        LogOutput::Writer(Box::new(w))
    }
}

impl std::fmt::Debug for LogOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogOutput::Stdout => f.write_str("Stdout"),
            LogOutput::Stderr => f.write_str("Stderr"),
            LogOutput::Writer(_) => f.write_str("Writer"),
        }
    }
}

impl Write for LogOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogOutput::Stdout => io::stdout().lock().write(buf),
            LogOutput::Stderr => io::stderr().lock().write(buf),
            LogOutput::Writer(w) => w.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            LogOutput::Stdout => io::stdout().lock().write_all(buf),
            LogOutput::Stderr => io::stderr().lock().write_all(buf),
            LogOutput::Writer(w) => w.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogOutput::Stdout => io::stdout().flush(),
            LogOutput::Stderr => io::stderr().flush(),
            LogOutput::Writer(w) => w.flush(),
        }
    }
}

/// One log record on its way through the hooks to the output.
#[derive(Debug)]
pub struct LogEntry<'a> {
    time: DateTime<Utc>,
    level: LogLevel,
    message: &'a str,
    error: Option<String>,
    context: Option<&'a Context>,
    fields: Map<String, Value>,
}

impl<'a> LogEntry<'a> {
    pub(crate) fn new(
        level: LogLevel,
        message: &'a str,
        error: Option<String>,
        context: Option<&'a Context>,
    ) -> Self {
        Self {
            time: Utc::now(),
            level,
            message,
            error,
            context,
            fields: Map::new(),
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        self.message
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The tracing context the entry was logged with, if any.
    pub fn context(&self) -> Option<&'a Context> {
        self.context
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Set a field, replacing any previous value under the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// The JSON object written to the output.
    ///
    /// `time`, `level`, `msg` and `error` always win over fields of the same name.
    pub fn to_json(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert(
            TIME_KEY.to_string(),
            Value::String(self.time.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        object.insert(LEVEL_KEY.to_string(), Value::String(self.level.as_str().to_string()));
        object.insert(MESSAGE_KEY.to_string(), Value::String(self.message.to_string()));
        if let Some(error) = &self.error {
            object.insert(ERROR_KEY.to_string(), Value::String(error.clone()));
        }
        Value::Object(object)
    }

    /// Write the entry as a single JSON line.
    pub(crate) fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        let mut line = serde_json::to_vec(&self.to_json())?;
        line.push(b'\n');
        out.write_all(&line)
    }
}
