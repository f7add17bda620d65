//! Property-based tests for overlap, day filtering and availability purity.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use proptest::prelude::*;
use slot_engine::availability::{is_unavailable, unavailable_reason, StylistSchedule};
use slot_engine::interval::TimeWindow;
use slot_engine::recurrence::{occurs_at, Recurrence};
use slot_engine::schedule::{OneOffAbsence, RecurringAbsence, RecurringSeries, WeekdaySet};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// A window within a four-week range, at 15-minute resolution.
fn arb_window() -> impl Strategy<Value = TimeWindow> {
    (0i64..(28 * 96), 1i64..=32).prop_map(|(offset, len)| {
        let start = base() + Duration::minutes(offset * 15);
        TimeWindow {
            start,
            end: start + Duration::minutes(len * 15),
        }
    })
}

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..56).prop_map(|d| base().date() + Duration::days(d))
}

fn arb_day_set() -> impl Strategy<Value = WeekdaySet> {
    (1u8..128).prop_map(|bits| {
        [
            Weekday::Sun,
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
        ]
        .into_iter()
        .enumerate()
        .filter(|(i, _)| bits & (1 << i) != 0)
        .map(|(_, d)| d)
        .collect()
    })
}

fn arb_series() -> impl Strategy<Value = RecurringSeries> {
    (arb_day_set(), 0u32..23, 1u32..=4).prop_map(|(days, start, len)| {
        let end = (start + len).min(23);
        RecurringSeries {
            id: "s".to_string(),
            title: "Series".to_string(),
            start_time: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end, 59, 0).unwrap(),
            recurrence: Recurrence::weekly(days),
            starts_on: base().date(),
            ends_on: None,
        }
    })
}

fn arb_schedule() -> impl Strategy<Value = StylistSchedule> {
    (
        prop::collection::vec(arb_window(), 0..5),
        prop::collection::vec(arb_series(), 0..3),
    )
        .prop_map(|(windows, series)| StylistSchedule {
            work_rule: None,
            absences: windows
                .into_iter()
                .map(|w| OneOffAbsence::new(w.start, w.end, None).unwrap())
                .collect(),
            recurring: series
                .into_iter()
                .map(|s| RecurringAbsence::new(s, vec![]))
                .collect(),
        })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn overlap_matches_half_open_definition(a in arb_window(), b in arb_window()) {
        prop_assert_eq!(a.overlaps(&b), a.start < b.end && a.end > b.start);
        prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
    }

    #[test]
    fn adjacent_windows_never_overlap(a in arb_window(), len in 1i64..=32) {
        let next = TimeWindow { start: a.end, end: a.end + Duration::minutes(len * 15) };
        prop_assert!(!a.overlaps(&next));
    }

    #[test]
    fn series_never_occurs_off_its_days(series in arb_series(), date in arb_date(), hour in 0u32..24) {
        if !series.recurrence.days.contains(date.weekday()) {
            prop_assert!(occurs_at(&series, &[], date, hour).is_none());
        }
    }

    #[test]
    fn availability_is_pure(schedule in arb_schedule(), date in arb_date(), hour in 0u32..24) {
        let first = is_unavailable(&schedule, date, hour);
        let second = is_unavailable(&schedule, date, hour);
        prop_assert_eq!(first, second);
        prop_assert_eq!(
            unavailable_reason(&schedule, date, hour),
            unavailable_reason(&schedule, date, hour)
        );
    }

    #[test]
    fn reason_exists_exactly_when_unavailable(
        schedule in arb_schedule(),
        date in arb_date(),
        hour in 0u32..24,
    ) {
        prop_assert_eq!(
            is_unavailable(&schedule, date, hour),
            unavailable_reason(&schedule, date, hour).is_some()
        );
    }
}
