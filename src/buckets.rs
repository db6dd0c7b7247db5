//! Fifteen-minute bucket grid over the trailing observation horizon.

use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::status::{StatusObservation, StoreStatus};

pub const BUCKET_SECONDS: i64 = 15 * 60;
pub const BUCKET_MINUTES: f64 = 15.0;
pub const BUCKETS_PER_HOUR: usize = 4;
pub const BUCKETS_PER_DAY: usize = 96;
pub const BUCKETS_PER_WEEK: usize = 672;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub start: DateTime<Utc>,
    pub active_count: u32,
    pub inactive_count: u32,
}

impl Bucket {
    fn empty(start: DateTime<Utc>) -> Self {
        Self {
            start,
            active_count: 0,
            inactive_count: 0,
        }
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start + ChronoDuration::seconds(BUCKET_SECONDS)
    }

    pub fn observation_count(&self) -> u32 {
        self.active_count + self.inactive_count
    }

    pub fn is_observed(&self) -> bool {
        self.observation_count() > 0
    }

    /// Index of this bucket among the 96 quarter-hour slots of its UTC day.
    pub fn utc_slot_of_day(&self) -> usize {
        (self.start.num_seconds_from_midnight() as i64 / BUCKET_SECONDS) as usize
    }

    /// Quarter-hour slot of the bucket start in the store's local day.
    pub fn local_slot_of_day(&self, tz: Tz) -> usize {
        let local = self.start.with_timezone(&tz);
        (local.num_seconds_from_midnight() as i64 / BUCKET_SECONDS) as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketGrid {
    buckets: Vec<Bucket>,
}

impl BucketGrid {
    /// Grid of `bucket_count` buckets whose last bucket contains `now`.
    pub fn trailing(now: DateTime<Utc>, bucket_count: usize) -> Self {
        if bucket_count == 0 {
            return Self {
                buckets: Vec::new(),
            };
        }

        let step = ChronoDuration::seconds(BUCKET_SECONDS);
        let last_start = now.duration_trunc(step).unwrap_or(now);
        let first_start = last_start - step * (bucket_count as i32 - 1);
        let buckets = (0..bucket_count)
            .map(|idx| Bucket::empty(first_start + step * idx as i32))
            .collect();

        Self { buckets }
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.buckets.first().map(|bucket| bucket.start)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.buckets.last().map(Bucket::end)
    }

    /// Bucket containing `ts`; a timestamp on a boundary belongs to the bucket
    /// starting there.
    pub fn index_of(&self, ts: DateTime<Utc>) -> Option<usize> {
        let start = self.start()?;
        if ts < start {
            return None;
        }
        let idx = ((ts - start).num_seconds() / BUCKET_SECONDS) as usize;
        (idx < self.buckets.len()).then_some(idx)
    }

    /// Counts `obs` into its bucket. Returns false when it falls outside the grid.
    pub fn record(&mut self, obs: &StatusObservation) -> bool {
        let Some(idx) = self.index_of(obs.timestamp_utc) else {
            return false;
        };
        let bucket = &mut self.buckets[idx];
        match obs.status {
            StoreStatus::Active => bucket.active_count += 1,
            StoreStatus::Inactive => bucket.inactive_count += 1,
        }
        true
    }
}

pub fn bucketize(
    observations: &[StatusObservation],
    now: DateTime<Utc>,
    bucket_count: usize,
) -> BucketGrid {
    let mut grid = BucketGrid::trailing(now, bucket_count);
    for obs in observations {
        grid.record(obs);
    }
    grid
}
