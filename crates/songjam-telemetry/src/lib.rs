mod logging;
mod metrics;

pub use logging::{LogQuery, LogRecord, SqliteLogLayer, SqliteLogSink};
pub use metrics::{HistogramSummary, MetricsRecorder, MetricsSnapshot};

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "songjam_upstream" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// Whether to persist warn+ logs to SQLite.
    pub log_to_sqlite: bool,
    pub log_db_path: PathBuf,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            log_to_sqlite: true,
            log_db_path: std::env::temp_dir().join("songjam-logs.db"),
        }
    }
}

impl TelemetryConfig {
    /// Build from loose settings values; an unknown level falls back to INFO.
    pub fn from_parts(log_level: &str, log_to_sqlite: bool, log_db_path: impl Into<PathBuf>) -> Self {
        Self {
            log_level: Level::from_str(log_level.trim()).unwrap_or(Level::INFO),
            module_levels: Vec::new(),
            log_to_sqlite,
            log_db_path: log_db_path.into(),
        }
    }

    fn filter_directive(&self) -> String {
        let mut filter = self.log_level.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
        }
        filter
    }
}

/// Handles to the live telemetry sinks.
pub struct TelemetryGuard {
    log_sink: Option<Arc<SqliteLogSink>>,
    metrics: Arc<MetricsRecorder>,
}

impl TelemetryGuard {
    /// Shared recorder; the HTTP layer and upstream clients write into it.
    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        self.metrics.clone()
    }

    /// Log sink for querying persisted logs, when SQLite logging is on.
    pub fn logs(&self) -> Option<Arc<SqliteLogSink>> {
        self.log_sink.clone()
    }
}

/// Initialize the telemetry subsystem. Call once at startup.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_span_list(true)
        .with_filter(env_filter);

    let (sqlite_layer, sqlite_sink) = if config.log_to_sqlite {
        match SqliteLogSink::new(&config.log_db_path) {
            Ok(sink) => {
                let sink = Arc::new(sink);
                (Some(SqliteLogLayer::new(sink.clone())), Some(sink))
            }
            Err(e) => {
                eprintln!("songjam-telemetry: failed to open log DB: {e}");
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    // try_init so tests and embedded callers can init more than once
    let _ = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(sqlite_layer)
        .try_init();

    TelemetryGuard {
        log_sink: sqlite_sink,
        metrics: Arc::new(MetricsRecorder::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_parses_level() {
        let cfg = TelemetryConfig::from_parts("debug", false, "/tmp/x.db");
        assert_eq!(cfg.log_level, Level::DEBUG);
        let cfg = TelemetryConfig::from_parts("loud", false, "/tmp/x.db");
        assert_eq!(cfg.log_level, Level::INFO);
    }

    #[test]
    fn filter_directive_includes_modules() {
        let mut cfg = TelemetryConfig::default();
        cfg.module_levels.push(("songjam_upstream".into(), Level::DEBUG));
        assert_eq!(cfg.filter_directive(), "info,songjam_upstream=debug");
    }

    #[test]
    fn init_without_sqlite_has_no_log_sink() {
        let guard = init_telemetry(TelemetryConfig {
            log_to_sqlite: false,
            ..Default::default()
        });
        assert!(guard.logs().is_none());
        guard.metrics().counter_inc("boot", &[], 1);
        assert_eq!(guard.metrics().counter_get("boot", &[]), 1);
    }
}
