//! Store uptime core crate.
//!
//! Current implemented scope:
//! - timezone-aware business-hour windows resolved to UTC
//! - quarter-hour bucketing and linear gap filling of status polls
//! - trailing hour/day/week uptime and downtime report
//! - CSV ingest and report output

mod aggregate;
mod buckets;
mod business_hours;
mod env_vars;
mod ingest;
mod interpolate;
mod observability;
mod report;
mod schedule;
mod status;

pub use aggregate::{
    aggregate_store, bucket_window_coverage, bucket_window_set, ratio_window_coverage,
    ratio_window_set, StoreAggregates, TrailingWindow, WindowCoverage, WindowSet,
};
pub use buckets::{
    bucketize, Bucket, BucketGrid, BUCKETS_PER_DAY, BUCKETS_PER_HOUR, BUCKETS_PER_WEEK,
    BUCKET_MINUTES, BUCKET_SECONDS,
};
pub use business_hours::{filter_business_hours, BusinessHours, MissingSchedulePolicy};
pub use ingest::{
    ingest_config_from_env, parse_report_format, parse_time_of_day, parse_timestamp_utc,
    read_business_hours, read_business_hours_csv, read_status, read_status_csv,
    read_timezones, read_timezones_csv, write_report_csv, write_report_file, write_report_json,
    IngestConfig, IngestError, IngestReport, LoadedTable, ReportFormat, RowPolicy,
};
pub use interpolate::{interpolate_buckets, interpolate_linear, BucketEstimate};
pub use observability::{
    init_logging, log_app_start, log_inputs_loaded, log_report_written, logging_config_from_env,
    LogFormat, LoggingConfig, LoggingInitError,
};
pub use report::{
    build_report_row, compute_report, report_config_from_env, EstimateSource, Figure,
    InsufficientDataPolicy, ReportConfig, ReportDiagnostics, ReportError, ReportOutput,
    ReportRow, ReportScope, StoreReport, REPORT_HEADERS,
};
pub use schedule::{
    localize_window, parse_timezone, resolve_window, weekday_index, BusinessHourWindow,
    DayShiftPolicy, ResolvedWindow, ScheduleError, StoreTimezone, UtcSegment, DEFAULT_TIMEZONE,
    SECONDS_PER_DAY,
};
pub use status::{
    current_status, latest_timestamp, parse_status, StatusObservation, StatusParseError,
    StoreStatus,
};
