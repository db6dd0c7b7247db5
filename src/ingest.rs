//! CSV loading of the three input tables and report file output.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::env_vars::env_parsed;
use crate::report::{ReportRow, REPORT_HEADERS};
use crate::schedule::{BusinessHourWindow, StoreTimezone};
use crate::status::{parse_status, StatusObservation};

const STORE_ID_COLUMNS: &[&str] = &["store_id"];
const TIMEZONE_COLUMNS: &[&str] = &["timezone_str", "timezone"];
const DAY_COLUMNS: &[&str] = &["day_of_week", "day", "dayofweek"];
const START_COLUMNS: &[&str] = &["start_time_local"];
const END_COLUMNS: &[&str] = &["end_time_local"];
const STATUS_COLUMNS: &[&str] = &["status"];
const TIMESTAMP_COLUMNS: &[&str] = &["timestamp_utc"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowPolicy {
    Strict,
    ReportAndSkip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Csv,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub row_policy: RowPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            row_policy: RowPolicy::Strict,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub rows_read: u64,
    pub rows_loaded: u64,
    pub rows_skipped: u64,
    pub first_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedTable<T> {
    pub rows: Vec<T>,
    pub report: IngestReport,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{table} table is missing column {column}")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },
    #[error("{table} line {line}: failed to parse field {field} value '{value}'")]
    ParseField {
        table: &'static str,
        line: u64,
        field: &'static str,
        value: String,
    },
    #[error("invalid output path: {0}")]
    InvalidPath(String),
}

pub fn ingest_config_from_env() -> IngestConfig {
    let defaults = IngestConfig::default();
    IngestConfig {
        row_policy: env_parsed("UPTIME_ROW_POLICY", parse_row_policy)
            .unwrap_or(defaults.row_policy),
    }
}

pub fn parse_report_format(raw: &str) -> Option<ReportFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "csv" => Some(ReportFormat::Csv),
        "json" => Some(ReportFormat::Json),
        _ => None,
    }
}

pub fn read_timezones<R: Read>(
    reader: R,
    cfg: &IngestConfig,
) -> Result<LoadedTable<StoreTimezone>, IngestError> {
    read_table(
        reader,
        cfg,
        "timezones",
        &[STORE_ID_COLUMNS, TIMEZONE_COLUMNS],
        |record, columns, line| {
            Ok(StoreTimezone {
                store_id: required(record, columns[0], line, "timezones", "store_id")?,
                timezone_name: required(record, columns[1], line, "timezones", "timezone_str")?,
            })
        },
    )
}

pub fn read_business_hours<R: Read>(
    reader: R,
    cfg: &IngestConfig,
) -> Result<LoadedTable<BusinessHourWindow>, IngestError> {
    const TABLE: &str = "business_hours";
    read_table(
        reader,
        cfg,
        TABLE,
        &[STORE_ID_COLUMNS, DAY_COLUMNS, START_COLUMNS, END_COLUMNS],
        |record, columns, line| {
            let day_raw = field(record, columns[1]);
            let day_of_week = day_raw
                .parse::<u8>()
                .ok()
                .filter(|day| *day <= 6)
                .ok_or_else(|| parse_error(TABLE, line, "day_of_week", day_raw))?;
            let start_raw = field(record, columns[2]);
            let end_raw = field(record, columns[3]);

            Ok(BusinessHourWindow {
                store_id: required(record, columns[0], line, TABLE, "store_id")?,
                day_of_week,
                start_time_local: parse_time_of_day(start_raw)
                    .ok_or_else(|| parse_error(TABLE, line, "start_time_local", start_raw))?,
                end_time_local: parse_time_of_day(end_raw)
                    .ok_or_else(|| parse_error(TABLE, line, "end_time_local", end_raw))?,
            })
        },
    )
}

pub fn read_status<R: Read>(
    reader: R,
    cfg: &IngestConfig,
) -> Result<LoadedTable<StatusObservation>, IngestError> {
    const TABLE: &str = "status";
    read_table(
        reader,
        cfg,
        TABLE,
        &[STORE_ID_COLUMNS, STATUS_COLUMNS, TIMESTAMP_COLUMNS],
        |record, columns, line| {
            let status_raw = field(record, columns[1]);
            let ts_raw = field(record, columns[2]);

            Ok(StatusObservation {
                store_id: required(record, columns[0], line, TABLE, "store_id")?,
                status: parse_status(status_raw)
                    .map_err(|_| parse_error(TABLE, line, "status", status_raw))?,
                timestamp_utc: parse_timestamp_utc(ts_raw)
                    .ok_or_else(|| parse_error(TABLE, line, "timestamp_utc", ts_raw))?,
            })
        },
    )
}

pub fn read_timezones_csv(
    path: &Path,
    cfg: &IngestConfig,
) -> Result<LoadedTable<StoreTimezone>, IngestError> {
    read_timezones(fs::File::open(path)?, cfg)
}

pub fn read_business_hours_csv(
    path: &Path,
    cfg: &IngestConfig,
) -> Result<LoadedTable<BusinessHourWindow>, IngestError> {
    read_business_hours(fs::File::open(path)?, cfg)
}

pub fn read_status_csv(
    path: &Path,
    cfg: &IngestConfig,
) -> Result<LoadedTable<StatusObservation>, IngestError> {
    read_status(fs::File::open(path)?, cfg)
}

/// Accepts `YYYY-MM-DD HH:MM:SS[.f] UTC`, RFC 3339, and naive timestamps read as UTC.
pub fn parse_timestamp_utc(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = trimmed.strip_suffix("UTC").unwrap_or(trimmed).trim_end();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(naive, format).ok())
        .map(|dt| dt.and_utc())
}

pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .ok()
}

pub fn write_report_csv<W: Write>(writer: W, rows: &[ReportRow]) -> Result<(), IngestError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(REPORT_HEADERS)?;
    for row in rows {
        out.write_record(row.to_cell_text_values())?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_report_json<W: Write>(writer: W, rows: &[ReportRow]) -> Result<(), IngestError> {
    serde_json::to_writer_pretty(writer, rows)?;
    Ok(())
}

/// Writes the report to `path` through a sibling temp file and a rename.
pub fn write_report_file(
    path: &Path,
    rows: &[ReportRow],
    format: ReportFormat,
) -> Result<(), IngestError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| IngestError::InvalidPath(path.display().to_string()))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    {
        let mut file = fs::File::create(&tmp_path)?;
        match format {
            ReportFormat::Csv => write_report_csv(&mut file, rows)?,
            ReportFormat::Json => write_report_json(&mut file, rows)?,
        }
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path)?;
    info!(
        component = "ingest",
        event = "ingest.report.written",
        path = %path.display(),
        format = ?format,
        rows = rows.len()
    );
    Ok(())
}

fn read_table<R, T, F>(
    reader: R,
    cfg: &IngestConfig,
    table: &'static str,
    column_names: &[&'static [&'static str]],
    parse: F,
) -> Result<LoadedTable<T>, IngestError>
where
    R: Read,
    F: Fn(&StringRecord, &[usize], u64) -> Result<T, IngestError>,
{
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    let columns = column_names
        .iter()
        .map(|names| column_index(&headers, table, names))
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::new();
    let mut report = IngestReport::default();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|pos| pos.line())
            .unwrap_or(idx as u64 + 2);
        report.rows_read += 1;

        match parse(&record, &columns, line) {
            Ok(row) => rows.push(row),
            Err(err) => match cfg.row_policy {
                RowPolicy::Strict => return Err(err),
                RowPolicy::ReportAndSkip => {
                    warn!(
                        component = "ingest",
                        event = "ingest.row.skipped",
                        table,
                        line,
                        error = %err
                    );
                    report.rows_skipped += 1;
                    if report.first_error.is_none() {
                        report.first_error = Some(err.to_string());
                    }
                }
            },
        }
    }
    report.rows_loaded = rows.len() as u64;

    info!(
        component = "ingest",
        event = "ingest.table.loaded",
        table,
        rows_read = report.rows_read,
        rows_loaded = report.rows_loaded,
        rows_skipped = report.rows_skipped
    );

    Ok(LoadedTable { rows, report })
}

fn column_index(
    headers: &StringRecord,
    table: &'static str,
    names: &[&'static str],
) -> Result<usize, IngestError> {
    headers
        .iter()
        .position(|header| {
            names
                .iter()
                .any(|name| header.trim().eq_ignore_ascii_case(name))
        })
        .ok_or(IngestError::MissingColumn {
            table,
            column: names[0],
        })
}

fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or_default()
}

fn required(
    record: &StringRecord,
    idx: usize,
    line: u64,
    table: &'static str,
    name: &'static str,
) -> Result<String, IngestError> {
    let raw = field(record, idx);
    if raw.is_empty() {
        return Err(parse_error(table, line, name, raw));
    }
    Ok(raw.to_string())
}

fn parse_error(table: &'static str, line: u64, field: &'static str, value: &str) -> IngestError {
    IngestError::ParseField {
        table,
        line,
        field,
        value: value.to_string(),
    }
}

fn parse_row_policy(raw: &str) -> Option<RowPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "strict" => Some(RowPolicy::Strict),
        "skip" | "report_and_skip" => Some(RowPolicy::ReportAndSkip),
        _ => None,
    }
}
