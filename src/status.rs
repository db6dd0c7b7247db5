//! Point-in-time store status observations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    Active,
    Inactive,
}

impl StoreStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusObservation {
    pub store_id: String,
    pub timestamp_utc: DateTime<Utc>,
    pub status: StoreStatus,
}

impl StatusObservation {
    pub fn new(
        store_id: impl Into<String>,
        timestamp_utc: DateTime<Utc>,
        status: StoreStatus,
    ) -> Self {
        Self {
            store_id: store_id.into(),
            timestamp_utc,
            status,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown store status: {0}")]
pub struct StatusParseError(pub String);

pub fn parse_status(input: &str) -> Result<StoreStatus, StatusParseError> {
    match input.trim().to_ascii_lowercase().as_str() {
        "active" => Ok(StoreStatus::Active),
        "inactive" => Ok(StoreStatus::Inactive),
        _ => Err(StatusParseError(input.to_string())),
    }
}

/// Latest instant across all observations; the reference "now" of a report run.
pub fn latest_timestamp(observations: &[StatusObservation]) -> Option<DateTime<Utc>> {
    observations.iter().map(|obs| obs.timestamp_utc).max()
}

/// Status of the most recent observation. Equal timestamps resolve to the later row.
pub fn current_status<'a, I>(observations: I) -> Option<StoreStatus>
where
    I: IntoIterator<Item = &'a StatusObservation>,
{
    let mut latest: Option<&StatusObservation> = None;
    for obs in observations {
        match latest {
            Some(current) if current.timestamp_utc > obs.timestamp_utc => {}
            _ => latest = Some(obs),
        }
    }
    latest.map(|obs| obs.status)
}
