//! Linear gap filling across the ordered bucket sequence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::buckets::{Bucket, BUCKET_MINUTES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketEstimate {
    pub start: DateTime<Utc>,
    pub active: f64,
    pub inactive: f64,
    pub observed: bool,
}

impl BucketEstimate {
    pub fn total(&self) -> f64 {
        self.active + self.inactive
    }

    pub fn uptime_minutes(&self) -> Option<f64> {
        let total = self.total();
        (total > 0.0).then(|| BUCKET_MINUTES * self.active / total)
    }

    pub fn downtime_minutes(&self) -> Option<f64> {
        let total = self.total();
        (total > 0.0).then(|| BUCKET_MINUTES * self.inactive / total)
    }
}

/// Fills `None` entries by linear blend of the nearest known neighbours.
///
/// Leading and trailing gaps take the outermost known value. A series with no
/// known value comes back as zeros. Already dense input is returned unchanged.
pub fn interpolate_linear(values: &[Option<f64>]) -> Vec<f64> {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(idx, value)| value.map(|v| (idx, v)))
        .collect();

    let (Some(&(first_idx, first_value)), Some(&(last_idx, last_value))) =
        (known.first(), known.last())
    else {
        return vec![0.0; values.len()];
    };

    let mut out = vec![0.0; values.len()];
    out[..first_idx].fill(first_value);
    out[last_idx..].fill(last_value);

    for pair in known.windows(2) {
        let (left_idx, left) = pair[0];
        let (right_idx, right) = pair[1];
        let span = (right_idx - left_idx) as f64;
        out[left_idx] = left;
        for (offset, slot) in out[left_idx + 1..right_idx].iter_mut().enumerate() {
            let t = (offset + 1) as f64 / span;
            *slot = left + (right - left) * t;
        }
    }

    out
}

/// Interpolates active and inactive counts independently. A bucket with no
/// observation at all is missing in both series; an observed bucket is known in
/// both, so its zero count in one series is kept rather than blended over.
pub fn interpolate_buckets(buckets: &[Bucket]) -> Vec<BucketEstimate> {
    let active = interpolate_linear(&count_series(buckets, |b| b.active_count));
    let inactive = interpolate_linear(&count_series(buckets, |b| b.inactive_count));

    buckets
        .iter()
        .zip(active.into_iter().zip(inactive))
        .map(|(bucket, (active, inactive))| BucketEstimate {
            start: bucket.start,
            active,
            inactive,
            observed: bucket.is_observed(),
        })
        .collect()
}

fn count_series(buckets: &[Bucket], count: fn(&Bucket) -> u32) -> Vec<Option<f64>> {
    buckets
        .iter()
        .map(|bucket| bucket.is_observed().then(|| count(bucket) as f64))
        .collect()
}
