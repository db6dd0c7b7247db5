use std::env;
use std::path::{Path, PathBuf};

use store_uptime::{
    compute_report, ingest_config_from_env, init_logging, log_app_start, log_inputs_loaded,
    log_report_written, logging_config_from_env, parse_report_format, read_business_hours_csv,
    read_status_csv, read_timezones_csv, report_config_from_env, write_report_file, IngestConfig,
    IngestError, LoadedTable, ReportFormat,
};
use tracing::warn;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    let ingest_cfg = ingest_config_from_env();
    let report_cfg = report_config_from_env();
    log_app_start(&logging_cfg, &report_cfg, &ingest_cfg);

    let data_dir = PathBuf::from(env_or("UPTIME_DATA_DIR", "data"));
    let status_path = data_dir.join(env_or("UPTIME_STATUS_CSV", "store_status.csv"));
    let hours_path = data_dir.join(env_or("UPTIME_HOURS_CSV", "menu_hours.csv"));
    let timezones_path = data_dir.join(env_or("UPTIME_TIMEZONES_CSV", "timezones.csv"));
    let report_path = PathBuf::from(env_or("UPTIME_REPORT_PATH", "reports/report.csv"));
    let format = env::var("UPTIME_REPORT_FORMAT")
        .ok()
        .and_then(|raw| parse_report_format(&raw))
        .unwrap_or(ReportFormat::Csv);

    let status = read_status_csv(&status_path, &ingest_cfg)?;
    let hours = optional_table(&hours_path, &ingest_cfg, read_business_hours_csv)?;
    let timezones = optional_table(&timezones_path, &ingest_cfg, read_timezones_csv)?;
    log_inputs_loaded(&status.report, &hours.report, &timezones.report);

    let output = compute_report(&timezones.rows, &hours.rows, &status.rows, &report_cfg)?;
    write_report_file(&report_path, &output.rows, format)?;

    log_report_written(&report_path, &output.diagnostics);

    println!(
        "Wrote {} rows ({} with insufficient data) for {} stores to {} (reference_time={}, skipped_rows={}, timezone_fallbacks={})",
        output.rows.len(),
        output.diagnostics.rows_insufficient,
        output.diagnostics.stores_seen,
        report_path.display(),
        output
            .diagnostics
            .reference_time
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "none".to_string()),
        status.report.rows_skipped + hours.report.rows_skipped + timezones.report.rows_skipped,
        output.diagnostics.timezone_fallbacks.len()
    );

    Ok(())
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Missing timezone or hours tables fall back to defaults downstream.
fn optional_table<T>(
    path: &Path,
    cfg: &IngestConfig,
    read: fn(&Path, &IngestConfig) -> Result<LoadedTable<T>, IngestError>,
) -> Result<LoadedTable<T>, IngestError> {
    if !path.exists() {
        warn!(
            component = "uptime_report",
            event = "inputs.table.missing",
            path = %path.display()
        );
        return Ok(LoadedTable {
            rows: Vec::new(),
            report: Default::default(),
        });
    }
    read(path, cfg)
}
