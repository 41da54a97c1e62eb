//! # Logging & Tracing Infrastructure
//!
//! Installs the global `tracing` subscriber for the artwork core:
//! - pretty, JSON or compact output on stdout
//! - an `EnvFilter` scoped to the workspace crates
//! - optional mirroring of every surviving event to a host [`LoggerSink`]
//!
//! Artwork paths contain user directories, so code logs them through
//! [`strip_path`] and only the entry name reaches the output.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::logging::LogLevel;
//!
//! let config = LoggingConfig::default()
//!     .with_format(LogFormat::Compact)
//!     .with_level(LogLevel::Debug)
//!     .with_logger_sink(host_sink);
//!
//! init_logging(config)?;
//! tracing::info!("Artwork core started");
//! ```

use crate::error::{Error, Result};
use bridge_traits::logging::{LogEntry, LogLevel, LoggerSink};

use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, Layered, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{filter::EnvFilter, Layer, Registry};

/// Crates whose events pass the default filter at the configured level.
const WORKSPACE_CRATES: [&str; 5] = [
    "core_runtime",
    "core_artwork",
    "core_service",
    "bridge_desktop",
    "bridge_traits",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human-readable output
    Pretty,
    /// One JSON object per event
    Json,
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Full `EnvFilter` directive; replaces the workspace default
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Report span enter/exit (pretty) or the span list (JSON)
    pub enable_spans: bool,
    pub display_target: bool,
    pub display_thread_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            enable_spans: true,
            display_target: true,
            display_thread_info: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    pub fn with_thread_info(mut self, display: bool) -> Self {
        self.display_thread_info = display;
        self
    }
}

type FilteredRegistry = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// Install the global subscriber.
///
/// Call once at startup; a second call fails with [`Error::Logging`].
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let output = output_layer(&config);

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .with(SinkForwarder::new(config.logger_sink.clone()))
        .try_init()
        .map_err(|e| Error::Logging(format!("subscriber already installed: {}", e)))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = match &config.filter {
        Some(custom) => custom.clone(),
        None => {
            let level = config.level.as_str();
            let scoped: Vec<String> = WORKSPACE_CRATES
                .iter()
                .map(|krate| format!("{}={}", krate, level))
                .collect();
            format!("warn,{}", scoped.join(","))
        }
    };

    EnvFilter::try_new(directives).map_err(|e| Error::Logging(format!("invalid filter: {}", e)))
}

fn output_layer(config: &LoggingConfig) -> BoxedLayer {
    let base = tracing_subscriber::fmt::layer()
        .with_target(config.display_target)
        .with_thread_ids(config.display_thread_info)
        .with_thread_names(config.display_thread_info)
        .with_writer(io::stdout);

    match config.format {
        LogFormat::Pretty => {
            let spans = if config.enable_spans {
                FmtSpan::ACTIVE
            } else {
                FmtSpan::NONE
            };
            Box::new(base.pretty().with_span_events(spans))
        }
        LogFormat::Json => Box::new(
            base.json()
                .flatten_event(true)
                .with_current_span(config.enable_spans)
                .with_span_list(config.enable_spans),
        ),
        LogFormat::Compact => Box::new(base.compact()),
    }
}

/// Layer that turns events into [`LogEntry`] values for the host sink.
struct SinkForwarder {
    sink: Option<Arc<dyn LoggerSink>>,
}

impl SinkForwarder {
    fn new(sink: Option<Arc<dyn LoggerSink>>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for SinkForwarder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        let metadata = event.metadata();
        let level = log_level(*metadata.level());
        if level < sink.min_level() {
            return;
        }

        let mut collector = EntryCollector::default();
        event.record(&mut collector);

        let message = collector
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);
        entry.fields = collector.fields;
        if let Some(span) = ctx.lookup_current() {
            entry.span = Some(span.name().to_string());
        }

        let sink = Arc::clone(sink);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = sink.log(entry).await {
                        eprintln!("LoggerSink error: {}", err);
                    }
                });
            }
            // Outside a runtime the sink is driven inline.
            Err(_) => {
                if let Err(err) = futures::executor::block_on(sink.log(entry)) {
                    eprintln!("LoggerSink error: {}", err);
                }
            }
        }
    }
}

#[derive(Default)]
struct EntryCollector {
    message: Option<String>,
    fields: std::collections::BTreeMap<String, String>,
}

impl Visit for EntryCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record(field, format!("{:?}", value));
    }
}

impl EntryCollector {
    fn record(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

fn log_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

/// Reduce a path to its file name for logging.
///
/// ```
/// use core_runtime::logging::strip_path;
/// use std::path::Path;
///
/// let path = Path::new("/home/user/.cache/artwork/@ALBUM@0123_200_200.jpg");
/// assert_eq!(strip_path(path), "@ALBUM@0123_200_200.jpg");
/// ```
pub fn strip_path(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl LoggerSink for RecordingSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Debug
        }
    }

    #[test]
    fn test_strip_path() {
        assert_eq!(
            strip_path(Path::new("/home/user/.cache/artwork/@ARTIST@ab_50_50.jpg")),
            "@ARTIST@ab_50_50.jpg"
        );
        assert_eq!(strip_path(Path::new("cover.png")), "cover.png");
        assert_eq!(strip_path(Path::new("/")), "");
    }

    #[test]
    fn test_default_filter_scopes_workspace_crates() {
        let config = LoggingConfig::default().with_level(LogLevel::Debug);
        let rendered = build_filter(&config).unwrap().to_string();
        for krate in WORKSPACE_CRATES {
            assert!(rendered.contains(&format!("{}=debug", krate)), "{}", rendered);
        }
    }

    #[test]
    fn test_custom_filter_replaces_default() {
        let config = LoggingConfig::default().with_filter("core_artwork=trace");
        let rendered = build_filter(&config).unwrap().to_string();
        assert!(rendered.contains("core_artwork=trace"));
        assert!(!rendered.contains("bridge_desktop"));
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = LoggingConfig::default().with_filter("core_artwork=[");
        assert!(matches!(build_filter(&config), Err(Error::Logging(_))));
    }

    #[test]
    fn test_forwarder_collects_fields_and_span() {
        let sink = Arc::new(RecordingSink::default());
        let forwarder = SinkForwarder::new(Some(sink.clone() as Arc<dyn LoggerSink>));
        let subscriber = tracing_subscriber::registry().with(forwarder);
        let _guard = tracing::subscriber::set_default(subscriber);

        let span = tracing::info_span!("sweep");
        let _entered = span.enter();
        tracing::warn!(target: "core_artwork::sweeper", file = "old.jpg", removed = 3u64, "Failed to remove expired entry");
        tracing::trace!("below the sink threshold");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.level, LogLevel::Warn);
        assert_eq!(entry.target, "core_artwork::sweeper");
        assert_eq!(entry.message, "Failed to remove expired entry");
        assert_eq!(entry.field("file"), Some("old.jpg"));
        assert_eq!(entry.field("removed"), Some("3"));
        assert_eq!(entry.span.as_deref(), Some("sweep"));
    }
}
