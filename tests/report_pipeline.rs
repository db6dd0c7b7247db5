use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, TimeZone, Utc};
use store_uptime::{
    bucketize, compute_report, interpolate_buckets, localize_window, parse_timezone,
    resolve_window, BucketGrid, BusinessHourWindow, DayShiftPolicy, EstimateSource, Figure,
    MissingSchedulePolicy, ReportConfig, ReportRow, ReportScope, StatusObservation, StoreStatus,
    StoreTimezone, BUCKETS_PER_DAY,
};

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0)
        .single()
        .expect("valid utc timestamp")
}

fn hms(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
}

fn tz_row(store_id: &str, name: &str) -> StoreTimezone {
    StoreTimezone {
        store_id: store_id.to_string(),
        timezone_name: name.to_string(),
    }
}

fn window(store_id: &str, day_of_week: u8, start: NaiveTime, end: NaiveTime) -> BusinessHourWindow {
    BusinessHourWindow {
        store_id: store_id.to_string(),
        day_of_week,
        start_time_local: start,
        end_time_local: end,
    }
}

fn obs(store_id: &str, ts: DateTime<Utc>, status: StoreStatus) -> StatusObservation {
    StatusObservation::new(store_id, ts, status)
}

fn assert_totals(row: &ReportRow) {
    let pairs = [
        (row.uptime_last_hour, row.downtime_last_hour, 60.0),
        (row.uptime_last_day, row.downtime_last_day, 24.0),
        (row.uptime_last_week, row.downtime_last_week, 168.0),
    ];
    for (up, down, expected) in pairs {
        let total = up.value().expect("uptime value") + down.value().expect("downtime value");
        assert!(
            (total - expected).abs() < 1e-6,
            "expected {expected}, got {total}"
        );
    }
}

#[test]
fn only_observations_inside_local_business_hours_are_eligible() {
    // Monday 10:00 CST is inside the window; Tuesday has no window.
    let timezones = vec![tz_row("s1", "America/Chicago")];
    let hours = vec![window("s1", 0, hms(9, 0), hms(17, 0))];
    let status = vec![
        obs("s1", utc(2023, 1, 2, 16, 0), StoreStatus::Active),
        obs("s1", utc(2023, 1, 3, 16, 0), StoreStatus::Active),
    ];

    let out = compute_report(&timezones, &hours, &status, &ReportConfig::default())
        .expect("report computes");

    assert_eq!(out.stores.len(), 1);
    assert_eq!(out.stores[0].observations, 2);
    assert_eq!(out.stores[0].eligible_observations, 1);
    assert_eq!(out.diagnostics.observations_eligible, 1);
    assert_eq!(out.diagnostics.reference_time, Some(utc(2023, 1, 3, 16, 0)));
    assert_eq!(out.rows.len(), 1);
    assert_eq!(out.rows[0].store_id, "s1");
}

#[test]
fn observations_in_one_quarter_hour_are_counted_without_interpolation() {
    let t0 = utc(2023, 1, 2, 9, 0);
    let status = vec![
        obs("s2", t0, StoreStatus::Active),
        obs("s2", t0 + ChronoDuration::minutes(5), StoreStatus::Inactive),
        obs("s2", t0 + ChronoDuration::minutes(10), StoreStatus::Active),
    ];

    let grid = bucketize(&status, t0 + ChronoDuration::minutes(10), BUCKETS_PER_DAY);
    let last = grid.buckets().last().expect("non-empty grid");
    assert_eq!(last.start, t0);
    assert_eq!(last.active_count, 2);
    assert_eq!(last.inactive_count, 1);

    let estimates = interpolate_buckets(grid.buckets());
    let tail = estimates.last().expect("estimate for last bucket");
    assert_eq!(tail.active, 2.0);
    assert_eq!(tail.inactive, 1.0);
    assert!(tail.observed);
    assert_eq!(tail.uptime_minutes(), Some(10.0));
}

#[test]
fn empty_buckets_between_counts_are_linearly_blended() {
    let now = utc(2023, 1, 2, 10, 0);
    let mut grid = BucketGrid::trailing(now, 4);
    let first = grid.start().expect("grid start");
    for _ in 0..5 {
        grid.record(&obs("s3", first, StoreStatus::Active));
    }
    for _ in 0..15 {
        grid.record(&obs("s3", now, StoreStatus::Active));
    }

    let estimates = interpolate_buckets(grid.buckets());
    let active: Vec<f64> = estimates.iter().map(|e| e.active).collect();
    let expected = [5.0, 5.0 + 10.0 / 3.0, 5.0 + 20.0 / 3.0, 15.0];
    for (got, want) in active.iter().zip(expected) {
        assert!((got - want).abs() < 1e-9, "expected {want}, got {got}");
    }
    assert!(estimates.iter().all(|e| e.inactive == 0.0));
    assert_eq!(format!("{:.2}", active[1]), "8.33");
    assert_eq!(format!("{:.2}", active[2]), "11.67");
}

#[test]
fn store_without_observations_is_omitted_or_reported_as_insufficient_data() {
    let timezones = vec![tz_row("quiet", "America/Denver")];
    let hours = vec![window("quiet", 2, hms(8, 0), hms(20, 0))];
    let status = vec![obs("busy", utc(2023, 1, 4, 15, 0), StoreStatus::Active)];

    let active_only = compute_report(&timezones, &hours, &status, &ReportConfig::default())
        .expect("report computes");
    assert_eq!(
        active_only
            .rows
            .iter()
            .map(|row| row.store_id.as_str())
            .collect::<Vec<_>>(),
        vec!["busy"]
    );

    let cfg = ReportConfig {
        scope: ReportScope::AllStores,
        ..ReportConfig::default()
    };
    let all = compute_report(&timezones, &hours, &status, &cfg).expect("report computes");
    assert_eq!(all.rows.len(), 2);
    let quiet = &all.rows[1];
    assert_eq!(quiet.store_id, "quiet");
    for figure in [
        quiet.uptime_last_hour,
        quiet.uptime_last_day,
        quiet.uptime_last_week,
        quiet.downtime_last_hour,
        quiet.downtime_last_day,
        quiet.downtime_last_week,
    ] {
        assert_eq!(figure, Figure::InsufficientData);
    }
}

#[test]
fn no_status_rows_at_all_yields_empty_report() {
    let timezones = vec![tz_row("a", "America/Chicago")];
    let out =
        compute_report(&timezones, &[], &[], &ReportConfig::default()).expect("report computes");

    assert!(out.rows.is_empty());
    assert_eq!(out.diagnostics.reference_time, None);
}

#[test]
fn inactive_latest_status_is_omitted_in_active_only_scope() {
    let ts = utc(2023, 1, 4, 15, 0);
    let status = vec![
        obs("flip", ts - ChronoDuration::hours(1), StoreStatus::Active),
        obs("flip", ts, StoreStatus::Inactive),
        obs("tie", ts, StoreStatus::Active),
        obs("tie", ts, StoreStatus::Inactive),
        obs("up", ts, StoreStatus::Active),
    ];

    let out = compute_report(&[], &[], &status, &ReportConfig::default()).expect("report computes");
    let ids: Vec<&str> = out.rows.iter().map(|row| row.store_id.as_str()).collect();
    assert_eq!(ids, vec!["up"]);
    assert_eq!(out.diagnostics.stores_seen, 3);
}

#[test]
fn uptime_and_downtime_cover_each_window_exactly() {
    let now = utc(2023, 1, 8, 12, 0);
    let status: Vec<StatusObservation> = (0..84)
        .map(|k| {
            let status = if k % 3 == 1 {
                StoreStatus::Inactive
            } else {
                StoreStatus::Active
            };
            obs("steady", now - ChronoDuration::hours(2 * k), status)
        })
        .collect();

    for estimate_source in [EstimateSource::Buckets, EstimateSource::Ratios] {
        let cfg = ReportConfig {
            missing_schedule: MissingSchedulePolicy::AlwaysOpen,
            estimate_source,
            ..ReportConfig::default()
        };
        let out = compute_report(&[], &[], &status, &cfg).expect("report computes");
        assert_eq!(out.rows.len(), 1);
        assert_totals(&out.rows[0]);
    }
}

#[test]
fn stores_are_computed_independently() {
    let reference = utc(2023, 1, 6, 18, 0);
    let cfg = ReportConfig {
        missing_schedule: MissingSchedulePolicy::AlwaysOpen,
        reference_time: Some(reference),
        ..ReportConfig::default()
    };
    let alpha: Vec<StatusObservation> = (0..12)
        .map(|k| obs("alpha", reference - ChronoDuration::hours(k), StoreStatus::Active))
        .collect();
    let mut both = alpha.clone();
    both.extend(
        (0..12).map(|k| obs("beta", reference - ChronoDuration::hours(k), StoreStatus::Inactive)),
    );
    both.push(obs("beta", reference, StoreStatus::Active));

    let alone = compute_report(&[], &[], &alpha, &cfg).expect("report computes");
    let together = compute_report(&[], &[], &both, &cfg).expect("report computes");

    assert_eq!(together.rows.len(), 2);
    assert_eq!(together.rows[0], alone.rows[0]);
    assert_ne!(together.rows[0], together.rows[1]);
}

#[test]
fn day_shift_policy_decides_which_utc_weekday_a_window_lands_on() {
    // Tokyo Monday 08:00-10:00 is Sunday 23:00 to Monday 01:00 UTC.
    let timezones = vec![tz_row("tokyo", "Asia/Tokyo")];
    let hours = vec![window("tokyo", 0, hms(8, 0), hms(10, 0))];
    let status = vec![
        // Monday 08:30 JST.
        obs("tokyo", utc(2023, 1, 8, 23, 30), StoreStatus::Inactive),
        // Tuesday 08:30 JST.
        obs("tokyo", utc(2023, 1, 9, 23, 30), StoreStatus::Active),
    ];
    let reference = utc(2023, 1, 10, 2, 0);

    let run = |day_shift| {
        let cfg = ReportConfig {
            day_shift,
            reference_time: Some(reference),
            ..ReportConfig::default()
        };
        compute_report(&timezones, &hours, &status, &cfg).expect("report computes")
    };

    let shifted = run(DayShiftPolicy::Shift);
    assert_eq!(shifted.stores[0].eligible_observations, 1);
    assert_eq!(shifted.rows[0].uptime_last_week, Figure::Value(0.0));
    assert_eq!(shifted.rows[0].downtime_last_week, Figure::Value(168.0));

    let preserved = run(DayShiftPolicy::Preserve);
    assert_eq!(preserved.stores[0].eligible_observations, 1);
    assert_eq!(preserved.rows[0].uptime_last_week, Figure::Value(168.0));
    assert_eq!(preserved.rows[0].downtime_last_week, Figure::Value(0.0));
}

#[test]
fn resolved_windows_round_trip_to_local_hours() {
    let reference = utc(2023, 1, 4, 12, 0);
    let cases = [
        ("America/Los_Angeles", 6, hms(20, 0), hms(23, 0), 1),
        ("Asia/Tokyo", 0, hms(8, 0), hms(10, 0), -1),
        ("America/Chicago", 2, hms(9, 0), hms(17, 0), 0),
    ];

    for (name, day, start, end, expected_shift) in cases {
        let tz = parse_timezone(name).expect("known timezone");
        let local = window("rt", day, start, end);
        for policy in [DayShiftPolicy::Shift, DayShiftPolicy::Preserve] {
            let resolved = resolve_window(&local, tz, reference, policy).expect("window resolves");
            assert_eq!(resolved.day_shift, expected_shift, "{name}");
            assert_eq!(localize_window(&resolved, tz), local, "{name} {policy:?}");
        }
    }
}
