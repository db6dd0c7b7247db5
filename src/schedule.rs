//! Weekly local business-hour windows resolved to UTC.
//!
//! Rules implemented:
//! - `day_of_week` is 0 = Monday through 6 = Sunday
//! - each window is anchored on the local date, in the week of the reference
//!   instant, whose weekday matches the window; the offset in effect on that
//!   date is the one used for conversion
//! - `end < start` spans local midnight; `end == start` is an empty window
//! - local times inside a DST gap move forward one hour, ambiguous local times
//!   take the earliest instant
//! - resolved windows are split into per-weekday UTC segments at UTC midnight

use chrono::{
    DateTime, Datelike, Duration as ChronoDuration, LocalResult, NaiveDate, NaiveDateTime,
    NaiveTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TIMEZONE: &str = "America/Chicago";
pub const SECONDS_PER_DAY: u32 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreTimezone {
    pub store_id: String,
    pub timezone_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHourWindow {
    pub store_id: String,
    pub day_of_week: u8,
    pub start_time_local: NaiveTime,
    pub end_time_local: NaiveTime,
}

/// How the weekday of a resolved window is chosen when conversion to UTC
/// crosses midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayShiftPolicy {
    /// Segments carry the real UTC weekday of the converted instants.
    Shift,
    /// Segments carry the local weekday with UTC times of day attached.
    Preserve,
}

/// Half-open `[start_second, end_second)` range of one UTC weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcSegment {
    pub day_of_week: u8,
    pub start_second: u32,
    pub end_second: u32,
}

impl UtcSegment {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        let second = ts.num_seconds_from_midnight();
        weekday_index(ts) == self.day_of_week
            && self.start_second <= second
            && second < self.end_second
    }

    pub fn full_day(day_of_week: u8) -> Self {
        Self {
            day_of_week,
            start_second: 0,
            end_second: SECONDS_PER_DAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedWindow {
    pub store_id: String,
    pub local_day_of_week: u8,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    /// UTC weekday of `start_utc` minus the local weekday: -1, 0 or +1.
    pub day_shift: i8,
    pub segments: Vec<UtcSegment>,
}

impl ResolvedWindow {
    pub fn start_time_utc(&self) -> NaiveTime {
        self.start_utc.time()
    }

    pub fn end_time_utc(&self) -> NaiveTime {
        self.end_utc.time()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
    #[error("invalid day_of_week {0}; expected 0..=6")]
    InvalidDayOfWeek(u8),
    #[error("local time {local} cannot be resolved in {timezone}")]
    UnresolvableLocalTime {
        local: NaiveDateTime,
        timezone: String,
    },
    #[error("anchor date out of range for reference {0}")]
    DateOutOfRange(DateTime<Utc>),
}

pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ScheduleError::UnknownTimezone(name.to_string()))
}

pub fn resolve_window(
    window: &BusinessHourWindow,
    tz: Tz,
    reference: DateTime<Utc>,
    policy: DayShiftPolicy,
) -> Result<ResolvedWindow, ScheduleError> {
    if window.day_of_week > 6 {
        return Err(ScheduleError::InvalidDayOfWeek(window.day_of_week));
    }

    let local_today = reference.with_timezone(&tz).date_naive();
    let anchor = anchor_date(local_today, window.day_of_week)
        .ok_or(ScheduleError::DateOutOfRange(reference))?;
    let end_date = if window.end_time_local < window.start_time_local {
        anchor
            .succ_opt()
            .ok_or(ScheduleError::DateOutOfRange(reference))?
    } else {
        anchor
    };

    let start_utc = localize(tz, anchor.and_time(window.start_time_local))?;
    // A window whose end falls into a DST gap can land before its start.
    let end_utc = localize(tz, end_date.and_time(window.end_time_local))?.max(start_utc);

    let day_shift = start_utc
        .date_naive()
        .signed_duration_since(anchor)
        .num_days() as i8;
    let rebase = match policy {
        DayShiftPolicy::Shift => 0,
        DayShiftPolicy::Preserve => -day_shift,
    };

    Ok(ResolvedWindow {
        store_id: window.store_id.clone(),
        local_day_of_week: window.day_of_week,
        start_utc,
        end_utc,
        day_shift,
        segments: split_segments(start_utc, end_utc, rebase),
    })
}

/// Converts a resolved window back into the store's local weekly window.
pub fn localize_window(resolved: &ResolvedWindow, tz: Tz) -> BusinessHourWindow {
    let start_local = resolved.start_utc.with_timezone(&tz);
    let end_local = resolved.end_utc.with_timezone(&tz);
    BusinessHourWindow {
        store_id: resolved.store_id.clone(),
        day_of_week: start_local.weekday().num_days_from_monday() as u8,
        start_time_local: start_local.time(),
        end_time_local: end_local.time(),
    }
}

pub fn weekday_index(ts: DateTime<Utc>) -> u8 {
    ts.weekday().num_days_from_monday() as u8
}

fn anchor_date(local_today: NaiveDate, day_of_week: u8) -> Option<NaiveDate> {
    let today = local_today.weekday().num_days_from_monday() as i64;
    local_today.checked_add_signed(ChronoDuration::days(day_of_week as i64 - today))
}

fn localize(tz: Tz, local: NaiveDateTime) -> Result<DateTime<Utc>, ScheduleError> {
    let resolved = match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => local
            .checked_add_signed(ChronoDuration::hours(1))
            .and_then(|shifted| tz.from_local_datetime(&shifted).earliest()),
    };

    resolved
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ScheduleError::UnresolvableLocalTime {
            local,
            timezone: tz.name().to_string(),
        })
}

fn split_segments(start: DateTime<Utc>, end: DateTime<Utc>, rebase: i8) -> Vec<UtcSegment> {
    let mut segments = Vec::new();
    let mut cursor = start;

    while cursor < end {
        let Some(next_midnight) = cursor
            .date_naive()
            .succ_opt()
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc())
        else {
            break;
        };
        let segment_end = end.min(next_midnight);
        let end_second = if segment_end == next_midnight {
            SECONDS_PER_DAY
        } else {
            segment_end.num_seconds_from_midnight()
        };

        segments.push(UtcSegment {
            day_of_week: (weekday_index(cursor) as i8 + rebase).rem_euclid(7) as u8,
            start_second: cursor.num_seconds_from_midnight(),
            end_second,
        });
        cursor = segment_end;
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2023-01-04 is a Wednesday; its week starts Monday 2023-01-02.
    fn winter_reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 4, 12, 0, 0)
            .single()
            .expect("valid reference")
    }

    fn hms(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
    }

    fn window(day_of_week: u8, start: NaiveTime, end: NaiveTime) -> BusinessHourWindow {
        BusinessHourWindow {
            store_id: "s1".to_string(),
            day_of_week,
            start_time_local: start,
            end_time_local: end,
        }
    }

    fn tz(name: &str) -> Tz {
        parse_timezone(name).expect("known timezone")
    }

    #[test]
    fn chicago_winter_window_resolves_without_day_shift() {
        let resolved = resolve_window(
            &window(0, hms(9, 0), hms(17, 0)),
            tz("America/Chicago"),
            winter_reference(),
            DayShiftPolicy::Shift,
        )
        .unwrap();

        assert_eq!(resolved.start_time_utc(), hms(15, 0));
        assert_eq!(resolved.end_time_utc(), hms(23, 0));
        assert_eq!(resolved.day_shift, 0);
        assert_eq!(
            resolved.segments,
            vec![UtcSegment {
                day_of_week: 0,
                start_second: 15 * 3600,
                end_second: 23 * 3600,
            }]
        );
    }

    #[test]
    fn summer_reference_uses_daylight_offset() {
        let july = Utc.with_ymd_and_hms(2023, 7, 5, 12, 0, 0).single().unwrap();
        let resolved = resolve_window(
            &window(0, hms(9, 0), hms(17, 0)),
            tz("America/Chicago"),
            july,
            DayShiftPolicy::Shift,
        )
        .unwrap();

        assert_eq!(resolved.start_time_utc(), hms(14, 0));
        assert_eq!(resolved.end_time_utc(), hms(22, 0));
    }

    #[test]
    fn window_shifted_to_previous_utc_day() {
        let source = window(0, hms(8, 0), hms(17, 0));
        let shifted = resolve_window(
            &source,
            tz("Asia/Tokyo"),
            winter_reference(),
            DayShiftPolicy::Shift,
        )
        .unwrap();

        assert_eq!(shifted.day_shift, -1);
        assert_eq!(
            shifted.segments,
            vec![
                UtcSegment {
                    day_of_week: 6,
                    start_second: 23 * 3600,
                    end_second: SECONDS_PER_DAY,
                },
                UtcSegment {
                    day_of_week: 0,
                    start_second: 0,
                    end_second: 8 * 3600,
                },
            ]
        );

        let preserved = resolve_window(
            &source,
            tz("Asia/Tokyo"),
            winter_reference(),
            DayShiftPolicy::Preserve,
        )
        .unwrap();
        assert_eq!(preserved.segments[0].day_of_week, 0);
        assert_eq!(preserved.segments[1].day_of_week, 1);
        assert_eq!(preserved.start_utc, shifted.start_utc);

        assert_eq!(localize_window(&shifted, tz("Asia/Tokyo")), source);
    }

    #[test]
    fn window_shifted_to_next_utc_day() {
        let source = window(0, hms(20, 0), hms(23, 0));
        let resolved = resolve_window(
            &source,
            tz("America/Los_Angeles"),
            winter_reference(),
            DayShiftPolicy::Shift,
        )
        .unwrap();

        assert_eq!(resolved.day_shift, 1);
        assert_eq!(
            resolved.segments,
            vec![UtcSegment {
                day_of_week: 1,
                start_second: 4 * 3600,
                end_second: 7 * 3600,
            }]
        );
        assert_eq!(localize_window(&resolved, tz("America/Los_Angeles")), source);
    }

    #[test]
    fn overnight_local_window_ends_next_day() {
        let source = window(4, hms(22, 0), hms(2, 0));
        let resolved = resolve_window(
            &source,
            tz("America/Chicago"),
            winter_reference(),
            DayShiftPolicy::Shift,
        )
        .unwrap();

        assert_eq!(resolved.day_shift, 1);
        assert_eq!(
            resolved.segments,
            vec![UtcSegment {
                day_of_week: 5,
                start_second: 4 * 3600,
                end_second: 8 * 3600,
            }]
        );
        assert_eq!(localize_window(&resolved, tz("America/Chicago")), source);
    }

    #[test]
    fn equal_start_and_end_is_empty() {
        let resolved = resolve_window(
            &window(2, hms(9, 0), hms(9, 0)),
            tz("UTC"),
            winter_reference(),
            DayShiftPolicy::Shift,
        )
        .unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn local_time_in_dst_gap_moves_forward() {
        // 2023-03-12 02:30 does not exist in Chicago.
        let reference = Utc.with_ymd_and_hms(2023, 3, 12, 18, 0, 0).single().unwrap();
        let resolved = resolve_window(
            &window(6, hms(2, 30), hms(4, 0)),
            tz("America/Chicago"),
            reference,
            DayShiftPolicy::Shift,
        )
        .unwrap();

        assert_eq!(resolved.start_time_utc(), hms(8, 30));
        assert_eq!(resolved.end_time_utc(), hms(9, 0));
    }

    #[test]
    fn ambiguous_local_time_takes_earlier_instant() {
        // 2023-11-05 01:30 happens twice in Chicago: once in CDT, once in CST.
        let reference = Utc.with_ymd_and_hms(2023, 11, 3, 12, 0, 0).single().unwrap();
        let resolved = resolve_window(
            &window(6, hms(1, 30), hms(3, 0)),
            tz("America/Chicago"),
            reference,
            DayShiftPolicy::Shift,
        )
        .unwrap();

        assert_eq!(
            resolved.start_utc,
            Utc.with_ymd_and_hms(2023, 11, 5, 6, 30, 0).single().unwrap()
        );
        assert_eq!(resolved.start_time_utc(), hms(6, 30));
        assert_eq!(resolved.end_time_utc(), hms(9, 0));
        assert_eq!(resolved.day_shift, 0);
        assert_eq!(resolved.segments.len(), 1);
    }

    #[test]
    fn rejects_unknown_timezone_and_bad_weekday() {
        assert_eq!(
            parse_timezone("Mars/Olympus_Mons"),
            Err(ScheduleError::UnknownTimezone("Mars/Olympus_Mons".to_string()))
        );

        let err = resolve_window(
            &window(7, hms(9, 0), hms(17, 0)),
            tz("UTC"),
            winter_reference(),
            DayShiftPolicy::Shift,
        )
        .unwrap_err();
        assert_eq!(err, ScheduleError::InvalidDayOfWeek(7));
    }

    #[test]
    fn segment_contains_is_half_open() {
        let segment = UtcSegment {
            day_of_week: 0,
            start_second: 15 * 3600,
            end_second: 23 * 3600,
        };
        let monday = |h: u32, m: u32| Utc.with_ymd_and_hms(2023, 1, 2, h, m, 0).single().unwrap();

        assert!(segment.contains(monday(15, 0)));
        assert!(segment.contains(monday(22, 59)));
        assert!(!segment.contains(monday(23, 0)));
        assert!(!segment.contains(monday(14, 59)));
        assert!(UtcSegment::full_day(0).contains(monday(0, 0)));
    }
}
