//! Tests for recurring-absence evaluation.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use slot_engine::recurrence::{occurs_at, Recurrence};
use slot_engine::schedule::{OccurrenceException, RecurringSeries};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(s: &str) -> NaiveDateTime {
    s.parse().unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// "Team meeting", Mondays 10:00-12:00 from 2024-01-01, unbounded.
fn monday_meeting() -> RecurringSeries {
    RecurringSeries {
        id: "series-1".to_string(),
        title: "Team meeting".to_string(),
        start_time: time(10, 0),
        end_time: time(12, 0),
        recurrence: Recurrence::parse("FREQ=WEEKLY;BYDAY=MO"),
        starts_on: date(2024, 1, 1),
        ends_on: None,
    }
}

// ── Day filter ──────────────────────────────────────────────────────────────

#[test]
fn occurs_inside_nominal_window() {
    let series = monday_meeting();
    let monday = date(2024, 1, 8);

    assert!(occurs_at(&series, &[], monday, 10).is_some());
    assert!(occurs_at(&series, &[], monday, 11).is_some());
    assert!(occurs_at(&series, &[], monday, 9).is_none());
    assert!(occurs_at(&series, &[], monday, 12).is_none(), "end is exclusive");
}

#[test]
fn monday_series_never_occurs_on_tuesday() {
    let series = monday_meeting();
    for week in 0..8 {
        let tuesday = date(2024, 1, 9) + chrono::Duration::weeks(week);
        for hour in 0..24 {
            assert!(
                occurs_at(&series, &[], tuesday, hour).is_none(),
                "{} {}:00 should be free",
                tuesday,
                hour
            );
        }
    }
}

#[test]
fn lowercase_and_long_day_names_are_normalized() {
    let mut series = monday_meeting();
    series.recurrence = Recurrence::parse("freq=weekly;byday=mo");
    assert!(occurs_at(&series, &[], date(2024, 1, 8), 10).is_some());
}

// ── Validity window ─────────────────────────────────────────────────────────

#[test]
fn does_not_occur_before_series_start() {
    let mut series = monday_meeting();
    series.starts_on = date(2024, 1, 10);
    assert!(occurs_at(&series, &[], date(2024, 1, 8), 10).is_none());
    assert!(occurs_at(&series, &[], date(2024, 1, 15), 10).is_some());
}

#[test]
fn end_date_is_inclusive() {
    let mut series = monday_meeting();
    series.ends_on = Some(date(2024, 1, 15));
    assert!(occurs_at(&series, &[], date(2024, 1, 15), 10).is_some());
    assert!(occurs_at(&series, &[], date(2024, 1, 22), 10).is_none());
}

// ── Exceptions ──────────────────────────────────────────────────────────────

#[test]
fn cancelled_occurrence_does_not_occur() {
    let series = monday_meeting();
    let exceptions = vec![OccurrenceException::cancelled(
        "series-1",
        at("2024-01-08T10:00:00"),
    )];

    assert!(occurs_at(&series, &exceptions, date(2024, 1, 8), 10).is_none());
    assert!(occurs_at(&series, &exceptions, date(2024, 1, 8), 11).is_none());
    // Other Mondays are untouched.
    assert!(occurs_at(&series, &exceptions, date(2024, 1, 15), 10).is_some());
}

#[test]
fn moved_occurrence_uses_new_window() {
    let series = monday_meeting();
    let exceptions = vec![OccurrenceException::moved(
        "series-1",
        at("2024-01-08T10:00:00"),
        at("2024-01-08T14:00:00"),
        at("2024-01-08T15:00:00"),
    )];
    let monday = date(2024, 1, 8);

    assert!(occurs_at(&series, &exceptions, monday, 10).is_none());
    let occurrence = occurs_at(&series, &exceptions, monday, 14).expect("moved to 14:00");
    assert!(occurrence.moved);
    assert_eq!(occurrence.moved_to(), Some(time(14, 0)));
    assert!(occurs_at(&series, &exceptions, monday, 15).is_none());
}

#[test]
fn exception_key_matches_to_the_minute() {
    let series = monday_meeting();
    let exceptions = vec![OccurrenceException::cancelled(
        "series-1",
        at("2024-01-08T10:00:42"),
    )];
    assert!(occurs_at(&series, &exceptions, date(2024, 1, 8), 10).is_none());
}

#[test]
fn exception_for_other_series_is_ignored() {
    let series = monday_meeting();
    let exceptions = vec![OccurrenceException::cancelled(
        "series-2",
        at("2024-01-08T10:00:00"),
    )];
    assert!(occurs_at(&series, &exceptions, date(2024, 1, 8), 10).is_some());
}

#[test]
fn storage_row_with_both_columns_null_cancels() {
    let e = OccurrenceException::from_columns("series-1", at("2024-01-08T10:00:00"), None, None)
        .unwrap();
    assert_eq!(e.outcome, slot_engine::ExceptionOutcome::Cancelled);
}

#[test]
fn storage_row_with_one_column_is_dropped() {
    let e = OccurrenceException::from_columns(
        "series-1",
        at("2024-01-08T10:00:00"),
        Some(at("2024-01-08T14:00:00")),
        None,
    );
    assert!(e.is_none());
}

// ── Unsupported rules ───────────────────────────────────────────────────────

#[test]
fn unrecognized_frequency_never_occurs() {
    let mut series = monday_meeting();
    for rule in ["BYDAY=MO", "FREQ=DAILY", "FREQ=MONTHLY;BYMONTHDAY=8", "garbage", ""] {
        series.recurrence = Recurrence::parse(rule);
        for hour in 0..24 {
            assert!(
                occurs_at(&series, &[], date(2024, 1, 8), hour).is_none(),
                "rule {:?} must never occur",
                rule
            );
        }
    }
}

#[test]
fn fortnightly_series_skips_alternate_weeks() {
    let mut series = monday_meeting();
    series.starts_on = date(2024, 1, 8);
    series.recurrence = Recurrence::parse("FREQ=WEEKLY;INTERVAL=2;BYDAY=MO");

    assert!(occurs_at(&series, &[], date(2024, 1, 8), 10).is_some());
    assert!(occurs_at(&series, &[], date(2024, 1, 15), 10).is_none());
    assert!(occurs_at(&series, &[], date(2024, 1, 22), 10).is_some());
}

#[test]
fn series_deserializes_from_rrule_text() {
    let json = r#"{
        "id": "lunch",
        "title": "Lunch",
        "start_time": "12:00:00",
        "end_time": "13:00:00",
        "recurrence": "FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR",
        "starts_on": "2024-01-01"
    }"#;
    let series: RecurringSeries = serde_json::from_str(json).unwrap();
    assert!(series.ends_on.is_none());
    assert!(occurs_at(&series, &[], date(2024, 1, 12), 12).is_some());
    assert!(occurs_at(&series, &[], date(2024, 1, 13), 12).is_none());

    let back = serde_json::to_value(&series).unwrap();
    assert_eq!(back["recurrence"], "FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR");
}

#[test]
fn overnight_series_is_rejected_on_load() {
    let json = r#"{
        "id": "late",
        "title": "Late shift",
        "start_time": "22:00:00",
        "end_time": "02:00:00",
        "recurrence": "FREQ=WEEKLY;BYDAY=FR",
        "starts_on": "2024-01-01"
    }"#;
    let err = serde_json::from_str::<RecurringSeries>(json).unwrap_err();
    assert!(err.to_string().contains("22:00"));
}

#[test]
fn recurring_absence_with_empty_series_window_is_rejected() {
    let json = r#"{
        "series": {
            "id": "nothing",
            "title": "Zero length",
            "start_time": "12:00:00",
            "end_time": "12:00:00",
            "recurrence": "FREQ=WEEKLY;BYDAY=MO",
            "starts_on": "2024-01-01"
        },
        "exceptions": []
    }"#;
    assert!(serde_json::from_str::<slot_engine::schedule::RecurringAbsence>(json).is_err());
}
