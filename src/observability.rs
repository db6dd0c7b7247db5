//! Logging for the batch report run.
//!
//! Events go to stderr so stdout only carries the run summary. Each run logs
//! its effective settings at start and the report diagnostics at the end.

use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::env_vars::{env_parsed, env_value, parse_flag};
use crate::ingest::{IngestConfig, IngestReport};
use crate::report::{ReportConfig, ReportDiagnostics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    /// One line per event.
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `info` or `info,store_uptime::ingest=debug`.
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            include_target: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("invalid log filter '{directives}': {reason}")]
    InvalidFilter { directives: String, reason: String },
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub fn logging_config_from_env() -> LoggingConfig {
    let defaults = LoggingConfig::default();
    LoggingConfig {
        level: env_value("UPTIME_LOG_LEVEL").unwrap_or(defaults.level),
        format: env_parsed("UPTIME_LOG_FORMAT", parse_log_format).unwrap_or(defaults.format),
        include_target: env_parsed("UPTIME_LOG_TARGET", parse_flag)
            .unwrap_or(defaults.include_target),
    }
}

/// Installs the global subscriber. A filter that does not parse is an error
/// rather than a silent fallback, so a mistyped level fails the run up front.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let filter =
        EnvFilter::try_new(&config.level).map_err(|err| LoggingInitError::InvalidFilter {
            directives: config.level.clone(),
            reason: err.to_string(),
        })?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(config.include_target)
        .with_ansi(config.format == LogFormat::Pretty);

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
        LogFormat::Compact => tracing::subscriber::set_global_default(builder.compact().finish())?,
    }

    Ok(())
}

pub fn log_app_start(logging: &LoggingConfig, report: &ReportConfig, ingest: &IngestConfig) {
    info!(
        component = "uptime_report",
        event = "app.start",
        log_level = %logging.level,
        log_format = ?logging.format,
        default_timezone = %report.default_timezone,
        day_shift = ?report.day_shift,
        scope = ?report.scope,
        missing_schedule = ?report.missing_schedule,
        estimate_source = ?report.estimate_source,
        insufficient_data = ?report.insufficient_data,
        reference_time = ?report.reference_time,
        row_policy = ?ingest.row_policy
    );
}

pub fn log_inputs_loaded(status: &IngestReport, hours: &IngestReport, timezones: &IngestReport) {
    let rows_skipped = status.rows_skipped + hours.rows_skipped + timezones.rows_skipped;
    info!(
        component = "uptime_report",
        event = "inputs.loaded",
        status_rows = status.rows_loaded,
        hour_rows = hours.rows_loaded,
        timezone_rows = timezones.rows_loaded,
        rows_skipped
    );
}

/// Logs the finished report; a run that degraded somewhere also gets a warning.
pub fn log_report_written(path: &Path, diagnostics: &ReportDiagnostics) {
    info!(
        component = "uptime_report",
        event = "report.written",
        path = %path.display(),
        rows = diagnostics.stores_reported,
        rows_insufficient = diagnostics.rows_insufficient,
        stores_seen = diagnostics.stores_seen,
        reference_time = ?diagnostics.reference_time
    );

    if let Some(first_error) = diagnostics.first_error.as_deref() {
        warn!(
            component = "uptime_report",
            event = "report.degraded",
            timezone_fallbacks = diagnostics.timezone_fallbacks.len(),
            skipped_windows = diagnostics.skipped_windows,
            first_error
        );
    }
}

fn parse_log_format(raw: &str) -> Option<LogFormat> {
    match raw.to_ascii_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" => Some(LogFormat::Pretty),
        "compact" => Some(LogFormat::Compact),
        _ => None,
    }
}
