//! Per-store uptime report assembly.
//!
//! Each store is computed independently from its own slice of the inputs and
//! the results are merged in store-id order. The reference instant ("now") is
//! passed explicitly to every windowing step.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{info, warn};

use crate::aggregate::{aggregate_store, StoreAggregates, TrailingWindow, WindowCoverage};
use crate::business_hours::{filter_business_hours, BusinessHours, MissingSchedulePolicy};
use crate::env_vars::{env_parsed, env_value};
use crate::schedule::{
    parse_timezone, resolve_window, BusinessHourWindow, DayShiftPolicy, StoreTimezone,
    DEFAULT_TIMEZONE,
};
use crate::status::{current_status, latest_timestamp, StatusObservation, StoreStatus};

pub const REPORT_HEADERS: [&str; 7] = [
    "store_id",
    "uptime_last_hour",
    "uptime_last_day",
    "uptime_last_week",
    "downtime_last_hour",
    "downtime_last_day",
    "downtime_last_week",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportScope {
    /// Only stores whose most recent observation is active.
    ActiveOnly,
    /// Every store known from any input table.
    AllStores,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EstimateSource {
    Buckets,
    Ratios,
    BucketsWithRatioFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InsufficientDataPolicy {
    Keep,
    ZeroFill,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub default_timezone: String,
    pub day_shift: DayShiftPolicy,
    pub scope: ReportScope,
    pub missing_schedule: MissingSchedulePolicy,
    pub estimate_source: EstimateSource,
    pub insufficient_data: InsufficientDataPolicy,
    pub reference_time: Option<DateTime<Utc>>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            default_timezone: DEFAULT_TIMEZONE.to_string(),
            day_shift: DayShiftPolicy::Shift,
            scope: ReportScope::ActiveOnly,
            missing_schedule: MissingSchedulePolicy::Closed,
            estimate_source: EstimateSource::Buckets,
            insufficient_data: InsufficientDataPolicy::Keep,
            reference_time: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid report config: {0}")]
    InvalidConfig(String),
}

/// One report figure; `InsufficientData` serializes as null.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Figure {
    Value(f64),
    InsufficientData,
}

impl Figure {
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::InsufficientData => None,
        }
    }

    pub fn to_cell_text(self) -> String {
        match self {
            Self::Value(v) => format!("{v:.2}"),
            Self::InsufficientData => String::new(),
        }
    }
}

impl Serialize for Figure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => serializer.serialize_f64(*v),
            Self::InsufficientData => serializer.serialize_none(),
        }
    }
}

/// Last hour in minutes, last day and week in hours.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub store_id: String,
    pub uptime_last_hour: Figure,
    pub uptime_last_day: Figure,
    pub uptime_last_week: Figure,
    pub downtime_last_hour: Figure,
    pub downtime_last_day: Figure,
    pub downtime_last_week: Figure,
}

impl ReportRow {
    pub fn figures(&self) -> [Figure; 6] {
        [
            self.uptime_last_hour,
            self.uptime_last_day,
            self.uptime_last_week,
            self.downtime_last_hour,
            self.downtime_last_day,
            self.downtime_last_week,
        ]
    }

    pub fn has_insufficient_data(&self) -> bool {
        self.figures()
            .iter()
            .any(|figure| *figure == Figure::InsufficientData)
    }

    pub fn to_cell_text_values(&self) -> Vec<String> {
        vec![
            self.store_id.clone(),
            self.uptime_last_hour.to_cell_text(),
            self.uptime_last_day.to_cell_text(),
            self.uptime_last_week.to_cell_text(),
            self.downtime_last_hour.to_cell_text(),
            self.downtime_last_day.to_cell_text(),
            self.downtime_last_week.to_cell_text(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreReport {
    pub store_id: String,
    pub timezone: String,
    pub timezone_fallback: bool,
    pub current_status: Option<StoreStatus>,
    pub observations: usize,
    pub eligible_observations: usize,
    pub skipped_windows: usize,
    pub aggregates: StoreAggregates,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportDiagnostics {
    pub reference_time: Option<DateTime<Utc>>,
    pub stores_seen: u64,
    pub stores_reported: u64,
    /// Reported rows with at least one `InsufficientData` figure.
    pub rows_insufficient: u64,
    pub observations_total: u64,
    pub observations_eligible: u64,
    pub timezone_fallbacks: Vec<String>,
    pub skipped_windows: u64,
    pub first_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportOutput {
    pub rows: Vec<ReportRow>,
    pub stores: Vec<StoreReport>,
    pub diagnostics: ReportDiagnostics,
}

#[derive(Default)]
struct StoreInputs<'a> {
    timezone: Option<&'a str>,
    windows: Vec<&'a BusinessHourWindow>,
    observations: Vec<StatusObservation>,
}

struct StoreOutcome {
    report: StoreReport,
    first_error: Option<String>,
}

pub fn report_config_from_env() -> ReportConfig {
    let mut config = ReportConfig::default();

    if let Some(name) = env_value("UPTIME_DEFAULT_TIMEZONE") {
        config.default_timezone = name;
    }
    if let Some(parsed) = env_parsed("UPTIME_DAY_SHIFT", parse_day_shift) {
        config.day_shift = parsed;
    }
    if let Some(parsed) = env_parsed("UPTIME_REPORT_SCOPE", parse_scope) {
        config.scope = parsed;
    }
    if let Some(parsed) = env_parsed("UPTIME_MISSING_SCHEDULE", parse_missing_schedule) {
        config.missing_schedule = parsed;
    }
    if let Some(parsed) = env_parsed("UPTIME_ESTIMATE_SOURCE", parse_estimate_source) {
        config.estimate_source = parsed;
    }
    if let Some(parsed) = env_parsed("UPTIME_INSUFFICIENT_DATA", parse_insufficient_data) {
        config.insufficient_data = parsed;
    }
    if let Some(parsed) = env_parsed("UPTIME_REFERENCE_TIME", |raw| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }) {
        config.reference_time = Some(parsed);
    }

    config
}

pub fn compute_report(
    timezones: &[StoreTimezone],
    business_hours: &[BusinessHourWindow],
    status: &[StatusObservation],
    cfg: &ReportConfig,
) -> Result<ReportOutput, ReportError> {
    let default_tz = validate_config(cfg)?;
    let now = cfg.reference_time.or_else(|| latest_timestamp(status));

    info!(
        component = "report",
        event = "report.compute.start",
        timezone_rows = timezones.len(),
        business_hour_rows = business_hours.len(),
        status_rows = status.len(),
        reference_time = ?now,
        scope = ?cfg.scope,
        estimate_source = ?cfg.estimate_source
    );

    let inputs = group_by_store(timezones, business_hours, status, cfg.scope);
    let mut diagnostics = ReportDiagnostics {
        reference_time: now,
        stores_seen: inputs.len() as u64,
        stores_reported: 0,
        rows_insufficient: 0,
        observations_total: status.len() as u64,
        observations_eligible: 0,
        timezone_fallbacks: Vec::new(),
        skipped_windows: 0,
        first_error: None,
    };

    let mut stores = Vec::with_capacity(inputs.len());
    for (store_id, store_inputs) in &inputs {
        let outcome = compute_store(store_id, store_inputs, now, default_tz, cfg);
        if diagnostics.first_error.is_none() {
            diagnostics.first_error = outcome.first_error;
        }
        stores.push(outcome.report);
    }

    for store in &stores {
        diagnostics.observations_eligible += store.eligible_observations as u64;
        diagnostics.skipped_windows += store.skipped_windows as u64;
        if store.timezone_fallback {
            diagnostics.timezone_fallbacks.push(store.store_id.clone());
        }
    }

    let rows: Vec<ReportRow> = stores
        .iter()
        .filter(|store| match cfg.scope {
            ReportScope::ActiveOnly => store.current_status == Some(StoreStatus::Active),
            ReportScope::AllStores => true,
        })
        .map(|store| build_report_row(store, cfg))
        .collect();
    diagnostics.stores_reported = rows.len() as u64;
    diagnostics.rows_insufficient = rows
        .iter()
        .filter(|row| row.has_insufficient_data())
        .count() as u64;

    info!(
        component = "report",
        event = "report.compute.finish",
        stores_seen = diagnostics.stores_seen,
        stores_reported = diagnostics.stores_reported,
        rows_insufficient = diagnostics.rows_insufficient,
        observations_eligible = diagnostics.observations_eligible,
        timezone_fallbacks = diagnostics.timezone_fallbacks.len(),
        skipped_windows = diagnostics.skipped_windows
    );

    Ok(ReportOutput {
        rows,
        stores,
        diagnostics,
    })
}

pub fn build_report_row(store: &StoreReport, cfg: &ReportConfig) -> ReportRow {
    let coverage = |window: TrailingWindow| -> WindowCoverage {
        let buckets = store.aggregates.buckets.get(window);
        let ratios = store.aggregates.ratios.get(window);
        match cfg.estimate_source {
            EstimateSource::Buckets => buckets,
            EstimateSource::Ratios => ratios,
            EstimateSource::BucketsWithRatioFallback if buckets.is_insufficient() => ratios,
            EstimateSource::BucketsWithRatioFallback => buckets,
        }
    };
    let figure = |minutes: Option<f64>, divisor: f64| match (minutes, cfg.insufficient_data) {
        (Some(minutes), _) => Figure::Value(minutes / divisor),
        (None, InsufficientDataPolicy::ZeroFill) => Figure::Value(0.0),
        (None, InsufficientDataPolicy::Keep) => Figure::InsufficientData,
    };

    let hour = coverage(TrailingWindow::Hour);
    let day = coverage(TrailingWindow::Day);
    let week = coverage(TrailingWindow::Week);

    ReportRow {
        store_id: store.store_id.clone(),
        uptime_last_hour: figure(hour.uptime_minutes(), 1.0),
        uptime_last_day: figure(day.uptime_minutes(), 60.0),
        uptime_last_week: figure(week.uptime_minutes(), 60.0),
        downtime_last_hour: figure(hour.downtime_minutes(), 1.0),
        downtime_last_day: figure(day.downtime_minutes(), 60.0),
        downtime_last_week: figure(week.downtime_minutes(), 60.0),
    }
}

fn validate_config(cfg: &ReportConfig) -> Result<Tz, ReportError> {
    parse_timezone(&cfg.default_timezone).map_err(|err| {
        ReportError::InvalidConfig(format!("default_timezone must be an IANA name: {err}"))
    })
}

fn group_by_store<'a>(
    timezones: &'a [StoreTimezone],
    business_hours: &'a [BusinessHourWindow],
    status: &'a [StatusObservation],
    scope: ReportScope,
) -> BTreeMap<&'a str, StoreInputs<'a>> {
    let mut stores: BTreeMap<&'a str, StoreInputs<'a>> = BTreeMap::new();

    for obs in status {
        stores
            .entry(obs.store_id.as_str())
            .or_default()
            .observations
            .push(obs.clone());
    }
    for row in timezones {
        let entry = stores.entry(row.store_id.as_str()).or_default();
        if entry.timezone.is_none() {
            entry.timezone = Some(row.timezone_name.as_str());
        }
    }
    for window in business_hours {
        stores
            .entry(window.store_id.as_str())
            .or_default()
            .windows
            .push(window);
    }

    // A store without observations can never be currently active.
    if scope == ReportScope::ActiveOnly {
        stores.retain(|_, inputs| !inputs.observations.is_empty());
    }

    stores
}

fn compute_store(
    store_id: &str,
    inputs: &StoreInputs<'_>,
    now: Option<DateTime<Utc>>,
    default_tz: Tz,
    cfg: &ReportConfig,
) -> StoreOutcome {
    let mut first_error = None;
    let (tz, timezone_fallback) = match inputs.timezone.map(parse_timezone) {
        Some(Ok(tz)) => (tz, false),
        Some(Err(err)) => {
            warn!(
                component = "report",
                event = "schedule.timezone.fallback",
                store_id,
                error = %err,
                fallback = %default_tz.name()
            );
            first_error = Some(format!("store {store_id}: {err}"));
            (default_tz, true)
        }
        None => (default_tz, false),
    };

    let mut skipped_windows = 0;
    let mut eligible_observations = 0;
    let aggregates = match now {
        Some(now) => {
            let mut resolved = Vec::with_capacity(inputs.windows.len());
            for window in &inputs.windows {
                match resolve_window(window, tz, now, cfg.day_shift) {
                    Ok(window) => resolved.push(window),
                    Err(err) => {
                        warn!(
                            component = "report",
                            event = "schedule.window.skipped",
                            store_id,
                            day_of_week = window.day_of_week,
                            error = %err
                        );
                        skipped_windows += 1;
                        if first_error.is_none() {
                            first_error = Some(format!("store {store_id}: {err}"));
                        }
                    }
                }
            }

            let hours = if inputs.windows.is_empty() {
                match cfg.missing_schedule {
                    MissingSchedulePolicy::Closed => BusinessHours::default(),
                    MissingSchedulePolicy::AlwaysOpen => BusinessHours::always_open(),
                }
            } else {
                BusinessHours::from_windows(&resolved)
            };

            let eligible = filter_business_hours(&inputs.observations, &hours);
            eligible_observations = eligible.len();
            aggregate_store(&eligible, now)
        }
        None => StoreAggregates::insufficient(),
    };

    StoreOutcome {
        report: StoreReport {
            store_id: store_id.to_string(),
            timezone: tz.name().to_string(),
            timezone_fallback,
            current_status: current_status(&inputs.observations),
            observations: inputs.observations.len(),
            eligible_observations,
            skipped_windows,
            aggregates,
        },
        first_error,
    }
}

fn parse_day_shift(raw: &str) -> Option<DayShiftPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "shift" => Some(DayShiftPolicy::Shift),
        "preserve" => Some(DayShiftPolicy::Preserve),
        _ => None,
    }
}

fn parse_scope(raw: &str) -> Option<ReportScope> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "active" | "active_only" => Some(ReportScope::ActiveOnly),
        "all" | "all_stores" => Some(ReportScope::AllStores),
        _ => None,
    }
}

fn parse_missing_schedule(raw: &str) -> Option<MissingSchedulePolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "closed" => Some(MissingSchedulePolicy::Closed),
        "always_open" | "open" => Some(MissingSchedulePolicy::AlwaysOpen),
        _ => None,
    }
}

fn parse_estimate_source(raw: &str) -> Option<EstimateSource> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "buckets" => Some(EstimateSource::Buckets),
        "ratios" => Some(EstimateSource::Ratios),
        "buckets_with_ratio_fallback" | "fallback" => {
            Some(EstimateSource::BucketsWithRatioFallback)
        }
        _ => None,
    }
}

fn parse_insufficient_data(raw: &str) -> Option<InsufficientDataPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "keep" => Some(InsufficientDataPolicy::Keep),
        "zero" | "zero_fill" => Some(InsufficientDataPolicy::ZeroFill),
        _ => None,
    }
}
