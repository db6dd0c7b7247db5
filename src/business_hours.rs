//! Business-hours eligibility filter over status observations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schedule::{ResolvedWindow, UtcSegment};
use crate::status::StatusObservation;

/// Treatment of stores that have no business-hour rows at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingSchedulePolicy {
    /// No window means never within business hours.
    Closed,
    /// No window means open around the clock.
    AlwaysOpen,
}

/// Flattened UTC segments of one store's resolved windows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusinessHours {
    segments: Vec<UtcSegment>,
}

impl BusinessHours {
    pub fn from_windows(windows: &[ResolvedWindow]) -> Self {
        Self {
            segments: windows
                .iter()
                .flat_map(|window| window.segments.iter().copied())
                .collect(),
        }
    }

    pub fn always_open() -> Self {
        Self {
            segments: (0..7).map(UtcSegment::full_day).collect(),
        }
    }

    pub fn segments(&self) -> &[UtcSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.segments.iter().any(|segment| segment.contains(ts))
    }
}

/// Keeps observations that fall inside at least one business-hour segment.
pub fn filter_business_hours(
    observations: &[StatusObservation],
    hours: &BusinessHours,
) -> Vec<StatusObservation> {
    if hours.is_empty() {
        return Vec::new();
    }

    let eligible: Vec<StatusObservation> = observations
        .iter()
        .filter(|obs| hours.contains(obs.timestamp_utc))
        .cloned()
        .collect();

    debug!(
        component = "business_hours",
        event = "business_hours.filter.finish",
        input = observations.len(),
        eligible = eligible.len(),
        segments = hours.segments().len()
    );

    eligible
}
