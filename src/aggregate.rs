//! Trailing hour/day/week uptime and downtime estimates.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use crate::buckets::{bucketize, BUCKETS_PER_DAY, BUCKETS_PER_HOUR, BUCKETS_PER_WEEK};
use crate::interpolate::{interpolate_buckets, BucketEstimate};
use crate::status::StatusObservation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrailingWindow {
    Hour,
    Day,
    Week,
}

impl TrailingWindow {
    pub const ALL: [TrailingWindow; 3] = [Self::Hour, Self::Day, Self::Week];

    pub fn minutes(self) -> f64 {
        match self {
            Self::Hour => 60.0,
            Self::Day => 1_440.0,
            Self::Week => 10_080.0,
        }
    }

    pub fn bucket_count(self) -> usize {
        match self {
            Self::Hour => BUCKETS_PER_HOUR,
            Self::Day => BUCKETS_PER_DAY,
            Self::Week => BUCKETS_PER_WEEK,
        }
    }

    pub fn duration(self) -> ChronoDuration {
        match self {
            Self::Hour => ChronoDuration::hours(1),
            Self::Day => ChronoDuration::days(1),
            Self::Week => ChronoDuration::weeks(1),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "last_hour",
            Self::Day => "last_day",
            Self::Week => "last_week",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowCoverage {
    Estimated {
        uptime_minutes: f64,
        downtime_minutes: f64,
    },
    InsufficientData,
}

impl WindowCoverage {
    pub fn uptime_minutes(self) -> Option<f64> {
        match self {
            Self::Estimated { uptime_minutes, .. } => Some(uptime_minutes),
            Self::InsufficientData => None,
        }
    }

    pub fn downtime_minutes(self) -> Option<f64> {
        match self {
            Self::Estimated {
                downtime_minutes, ..
            } => Some(downtime_minutes),
            Self::InsufficientData => None,
        }
    }

    pub fn is_insufficient(self) -> bool {
        matches!(self, Self::InsufficientData)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSet {
    pub last_hour: WindowCoverage,
    pub last_day: WindowCoverage,
    pub last_week: WindowCoverage,
}

impl WindowSet {
    pub fn insufficient() -> Self {
        Self {
            last_hour: WindowCoverage::InsufficientData,
            last_day: WindowCoverage::InsufficientData,
            last_week: WindowCoverage::InsufficientData,
        }
    }

    pub fn get(&self, window: TrailingWindow) -> WindowCoverage {
        match window {
            TrailingWindow::Hour => self.last_hour,
            TrailingWindow::Day => self.last_day,
            TrailingWindow::Week => self.last_week,
        }
    }

    fn from_fn(mut f: impl FnMut(TrailingWindow) -> WindowCoverage) -> Self {
        Self {
            last_hour: f(TrailingWindow::Hour),
            last_day: f(TrailingWindow::Day),
            last_week: f(TrailingWindow::Week),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreAggregates {
    pub buckets: WindowSet,
    pub ratios: WindowSet,
    pub observed_buckets: usize,
}

impl StoreAggregates {
    pub fn insufficient() -> Self {
        Self {
            buckets: WindowSet::insufficient(),
            ratios: WindowSet::insufficient(),
            observed_buckets: 0,
        }
    }
}

/// Sums the tail `window.bucket_count()` estimates, each bucket splitting its
/// fifteen minutes by its interpolated active share.
pub fn bucket_window_coverage(
    estimates: &[BucketEstimate],
    window: TrailingWindow,
) -> WindowCoverage {
    let tail = &estimates[estimates.len().saturating_sub(window.bucket_count())..];
    let mut covered = false;
    let mut uptime_minutes = 0.0;
    let mut downtime_minutes = 0.0;

    for estimate in tail {
        if let (Some(up), Some(down)) = (estimate.uptime_minutes(), estimate.downtime_minutes()) {
            covered = true;
            uptime_minutes += up;
            downtime_minutes += down;
        }
    }

    if covered {
        WindowCoverage::Estimated {
            uptime_minutes,
            downtime_minutes,
        }
    } else {
        WindowCoverage::InsufficientData
    }
}

pub fn bucket_window_set(estimates: &[BucketEstimate]) -> WindowSet {
    WindowSet::from_fn(|window| bucket_window_coverage(estimates, window))
}

/// Active share of raw observations in `[now - window, now]` scaled to the
/// window length.
pub fn ratio_window_coverage(
    observations: &[StatusObservation],
    now: DateTime<Utc>,
    window: TrailingWindow,
) -> WindowCoverage {
    let from = now - window.duration();
    let (active, total) = observations
        .iter()
        .filter(|obs| obs.timestamp_utc >= from && obs.timestamp_utc <= now)
        .fold((0u64, 0u64), |(active, total), obs| {
            (active + u64::from(obs.status.is_active()), total + 1)
        });

    if total == 0 {
        return WindowCoverage::InsufficientData;
    }

    let uptime_minutes = active as f64 * window.minutes() / total as f64;
    WindowCoverage::Estimated {
        uptime_minutes,
        downtime_minutes: window.minutes() - uptime_minutes,
    }
}

pub fn ratio_window_set(observations: &[StatusObservation], now: DateTime<Utc>) -> WindowSet {
    WindowSet::from_fn(|window| ratio_window_coverage(observations, now, window))
}

/// Bucket-sum and ratio estimates for one store's business-hour observations.
pub fn aggregate_store(eligible: &[StatusObservation], now: DateTime<Utc>) -> StoreAggregates {
    let grid = bucketize(eligible, now, BUCKETS_PER_WEEK);
    let estimates = interpolate_buckets(grid.buckets());

    StoreAggregates {
        buckets: bucket_window_set(&estimates),
        ratios: ratio_window_set(eligible, now),
        observed_buckets: grid.buckets().iter().filter(|b| b.is_observed()).count(),
    }
}
