//! Tests for the datastore boundary and committing reschedules.

use chrono::{NaiveDateTime, NaiveTime, Weekday};
use slot_engine::availability::{is_unavailable, StylistSchedule};
use slot_engine::booking::{Booking, BookingStatus};
use slot_engine::error::{ErrorKind, SchedulingError, StoreError};
use slot_engine::reschedule::{reschedule, BookingUpdate, RescheduleRequest, Rescheduler};
use slot_engine::schedule::{OneOffAbsence, RecurringAbsence, WeeklyWorkRule};
use slot_engine::store::{
    commit_reschedule, load_schedule, reschedule_booking, BookingStore, InMemoryStore,
    ScheduleSource, StoreResult,
};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn at(s: &str) -> NaiveDateTime {
    s.parse().unwrap()
}

fn booking(id: &str, start: &str, end: &str) -> Booking {
    Booking {
        id: id.to_string(),
        stylist_id: "stylist-1".to_string(),
        customer_id: "customer-1".to_string(),
        start: at(start),
        end: at(end),
        status: BookingStatus::Confirmed,
        is_trial_session: false,
        trial_booking: None,
        main_booking: None,
        audit: None,
    }
}

fn linked_request(start: &str, end: &str) -> RescheduleRequest {
    RescheduleRequest {
        actor_id: "stylist-1".to_string(),
        new_start: at(start),
        new_end: at(end),
        move_linked: true,
        reason: Some("Salon refurbishment".to_string()),
        now: at("2024-01-01T08:00:00"),
    }
}

/// A store with a seven-day 08:00-20:00 schedule and a linked trial/main pair.
fn store_with_pair() -> InMemoryStore {
    let days = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];
    let mut store = InMemoryStore::new();
    store.insert_schedule(
        "stylist-1",
        StylistSchedule {
            work_rule: Some(
                WeeklyWorkRule::new(
                    days.into_iter().collect(),
                    NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                    NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
                )
                .unwrap(),
            ),
            absences: vec![],
            recurring: vec![],
        },
    );

    let mut trial = booking("trial", "2024-01-08T10:00:00", "2024-01-08T11:00:00");
    trial.is_trial_session = true;
    let mut main = booking("main", "2024-01-10T10:00:00", "2024-01-10T12:00:00");
    trial.main_booking = Some(main.as_linked());
    main.trial_booking = Some(trial.as_linked());
    store.insert_booking(trial);
    store.insert_booking(main);
    store
}

/// Delegates to an [`InMemoryStore`] but refuses every absence write.
struct NoAbsenceWrites(InMemoryStore);

impl ScheduleSource for NoAbsenceWrites {
    fn fetch_weekly_rule(&self, stylist_id: &str) -> StoreResult<Option<WeeklyWorkRule>> {
        self.0.fetch_weekly_rule(stylist_id)
    }

    fn fetch_one_off_absences(&self, stylist_id: &str) -> StoreResult<Vec<OneOffAbsence>> {
        self.0.fetch_one_off_absences(stylist_id)
    }

    fn fetch_recurring_series_with_exceptions(
        &self,
        stylist_id: &str,
    ) -> StoreResult<Vec<RecurringAbsence>> {
        self.0.fetch_recurring_series_with_exceptions(stylist_id)
    }

    fn fetch_booking(&self, booking_id: &str) -> StoreResult<Booking> {
        self.0.fetch_booking(booking_id)
    }
}

impl BookingStore for NoAbsenceWrites {
    fn update_booking_window(&mut self, update: &BookingUpdate) -> StoreResult<()> {
        self.0.update_booking_window(update)
    }

    fn insert_absence(&mut self, _stylist_id: &str, _absence: OneOffAbsence) -> StoreResult<()> {
        Err(StoreError::Backend("absences table is read-only".to_string()))
    }
}

// ── Reads ───────────────────────────────────────────────────────────────────

#[test]
fn load_schedule_assembles_all_parts() {
    let store = store_with_pair();
    let schedule = load_schedule(&store, "stylist-1").unwrap();
    assert!(schedule.work_rule.is_some());
    assert!(schedule.absences.is_empty());
}

#[test]
fn unknown_stylist_has_empty_schedule() {
    let store = store_with_pair();
    let schedule = load_schedule(&store, "nobody").unwrap();
    assert_eq!(schedule, StylistSchedule::default());
}

#[test]
fn missing_booking_is_a_storage_error() {
    let store = store_with_pair();
    assert_eq!(
        store.fetch_booking("nope").unwrap_err(),
        StoreError::BookingNotFound("nope".to_string())
    );
}

// ── Commit ──────────────────────────────────────────────────────────────────

#[test]
fn linked_commit_moves_both_and_keeps_links_in_step() {
    let mut store = store_with_pair();
    let main = store.fetch_booking("main").unwrap();
    let plan = reschedule(&main, &linked_request("2024-01-15T14:00:00", "2024-01-15T16:00:00"))
        .unwrap();

    commit_reschedule(&mut store, &plan).unwrap();

    let main = store.fetch_booking("main").unwrap();
    let trial = store.fetch_booking("trial").unwrap();
    assert_eq!(main.start, at("2024-01-15T14:00:00"));
    assert_eq!(trial.start, at("2024-01-13T14:00:00"));
    assert_eq!(trial.end, at("2024-01-13T15:00:00"));
    assert_eq!(main.trial_booking.as_ref().unwrap().start, trial.start);
    assert_eq!(trial.main_booking.as_ref().unwrap().start, main.start);
    assert_eq!(
        trial.audit.as_ref().unwrap().reschedule_reason.as_deref(),
        Some("Salon refurbishment")
    );
}

#[test]
fn failed_first_write_commits_nothing() {
    let mut store = store_with_pair();
    store.fail_writes_to("main");
    let main = store.fetch_booking("main").unwrap();
    let plan = reschedule(&main, &linked_request("2024-01-15T14:00:00", "2024-01-15T16:00:00"))
        .unwrap();

    let err = commit_reschedule(&mut store, &plan).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(store.fetch_booking("main").unwrap().start, at("2024-01-10T10:00:00"));
    assert_eq!(store.fetch_booking("trial").unwrap().start, at("2024-01-08T10:00:00"));
}

#[test]
fn failed_companion_write_is_a_consistency_gap() {
    let mut store = store_with_pair();
    store.fail_writes_to("trial");
    let main = store.fetch_booking("main").unwrap();
    let plan = reschedule(&main, &linked_request("2024-01-15T14:00:00", "2024-01-15T16:00:00"))
        .unwrap();

    let err = commit_reschedule(&mut store, &plan).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConsistencyGap);
    match err {
        SchedulingError::ConsistencyGap {
            committed_id,
            failed_id,
            ..
        } => {
            assert_eq!(committed_id, "main");
            assert_eq!(failed_id, "trial");
        }
        other => panic!("expected a consistency gap, got {:?}", other),
    }
    // The main booking did move; the trial did not.
    assert_eq!(store.fetch_booking("main").unwrap().start, at("2024-01-15T14:00:00"));
    assert_eq!(store.fetch_booking("trial").unwrap().start, at("2024-01-08T10:00:00"));
}

// ── End to end ──────────────────────────────────────────────────────────────

#[test]
fn reschedule_booking_can_block_the_vacated_slot() {
    let mut store = store_with_pair();
    let plan = reschedule_booking(
        &mut store,
        &Rescheduler::default(),
        "main",
        &linked_request("2024-01-15T14:00:00", "2024-01-15T16:00:00"),
        Some("Held after reschedule"),
    )
    .unwrap();
    assert!(plan.companion.is_some());

    let schedule = load_schedule(&store, "stylist-1").unwrap();
    assert_eq!(schedule.absences.len(), 2);
    let wednesday = at("2024-01-10T10:00:00").date();
    assert!(is_unavailable(&schedule, wednesday, 10));
    assert!(is_unavailable(&schedule, wednesday, 11));
    assert!(!is_unavailable(&schedule, wednesday, 12));
}

#[test]
fn failed_vacated_block_still_reports_the_committed_move() {
    let mut store = NoAbsenceWrites(store_with_pair());
    let err = reschedule_booking(
        &mut store,
        &Rescheduler::default(),
        "main",
        &linked_request("2024-01-15T14:00:00", "2024-01-15T16:00:00"),
        Some("Held after reschedule"),
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConsistencyGap);
    match err {
        SchedulingError::VacatedNotBlocked {
            plan,
            blocked,
            source,
        } => {
            assert_eq!(plan.primary.booking_id, "main");
            assert_eq!(plan.primary.new.start, at("2024-01-15T14:00:00"));
            assert!(plan.companion.is_some());
            assert_eq!(blocked, 0);
            assert!(matches!(source, StoreError::Backend(_)));
        }
        other => panic!("expected a vacated-slot failure, got {:?}", other),
    }
    // Both bookings moved even though the old slots stay open.
    assert_eq!(store.0.fetch_booking("main").unwrap().start, at("2024-01-15T14:00:00"));
    assert_eq!(store.0.fetch_booking("trial").unwrap().start, at("2024-01-13T14:00:00"));
    assert!(load_schedule(&store, "stylist-1").unwrap().absences.is_empty());
}

#[test]
fn reschedule_booking_without_blocking_leaves_schedule_alone() {
    let mut store = store_with_pair();
    reschedule_booking(
        &mut store,
        &Rescheduler::default(),
        "main",
        &linked_request("2024-01-15T14:00:00", "2024-01-15T16:00:00"),
        None,
    )
    .unwrap();
    assert!(load_schedule(&store, "stylist-1").unwrap().absences.is_empty());
}

#[test]
fn store_round_trips_through_json() {
    let store = store_with_pair();
    let json = serde_json::to_string(&store).unwrap();
    let back = InMemoryStore::from_json_str(&json).unwrap();
    assert_eq!(back, store);
}
