//! Host Log Forwarding
//!
//! The core logs through `tracing`. Hosts that want those records in their
//! own pipeline (OSLog, Logcat, a desktop log file) implement [`LoggerSink`]
//! and hand it to the runtime's logging setup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive spelling used by `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One forwarded log record.
///
/// Fields are kept sorted so hosts that print them get stable output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Module path of the emitting code, e.g. `core_artwork::store`
    pub target: String,
    pub message: String,
    pub fields: BTreeMap<String, String>,
    /// Name of the innermost span the record was emitted in
    pub span: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: BTreeMap::new(),
            span: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_span(mut self, span: impl Into<String>) -> Self {
        self.span = Some(span.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Logger sink trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::logging::{LogEntry, LogLevel, LoggerSink};
///
/// async fn report_sweep(logger: &dyn LoggerSink, removed: u64) {
///     let entry = LogEntry::new(LogLevel::Info, "host", "Artwork sweep finished")
///         .with_field("removed", removed.to_string());
///     logger.log(entry).await.ok();
/// }
/// ```
#[async_trait::async_trait]
pub trait LoggerSink: Send + Sync {
    async fn log(&self, entry: LogEntry) -> Result<()>;

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Records below this level are dropped before they are built.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_builder() {
        let entry = LogEntry::new(LogLevel::Warn, "core_artwork::derived", "Discarding corrupt entry")
            .with_field("file", "@ALBUM@ab_200_200.jpg")
            .with_span("read");

        assert_eq!(entry.level, LogLevel::Warn);
        assert_eq!(entry.target, "core_artwork::derived");
        assert_eq!(entry.field("file"), Some("@ALBUM@ab_200_200.jpg"));
        assert_eq!(entry.field("missing"), None);
        assert_eq!(entry.span.as_deref(), Some("read"));
    }

    #[test]
    fn test_level_ordering_and_spelling() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert_eq!(LogLevel::Info.as_str(), "info");
        assert_eq!(LogLevel::Error.to_string(), "error");
    }

    #[test]
    fn test_fields_are_sorted() {
        let entry = LogEntry::new(LogLevel::Info, "t", "m")
            .with_field("width", "200")
            .with_field("height", "100");
        let keys: Vec<_> = entry.fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["height", "width"]);
    }
}
