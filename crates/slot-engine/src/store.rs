//! Datastore boundary.
//!
//! The engine reads schedule data and bookings through [`ScheduleSource`] and
//! writes reschedules through [`BookingStore`]. [`InMemoryStore`] implements
//! both and backs the CLI and the tests.
//!
//! A linked trial/main move is two writes. If the first fails nothing was
//! committed and the caller sees a plain storage error. If the second fails
//! the pair is now inconsistent, which surfaces as
//! [`SchedulingError::ConsistencyGap`] so the caller can retry the companion
//! update. A store with real transactions should override
//! [`BookingStore::update_booking_windows`] to write both rows atomically.
//!
//! Blocking the vacated slot happens after the move commits. A failure there
//! is [`SchedulingError::VacatedNotBlocked`], which carries the committed plan.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::availability::StylistSchedule;
use crate::booking::Booking;
use crate::error::{Result, SchedulingError, StoreError};
use crate::reschedule::{BookingUpdate, ReschedulePlan, RescheduleRequest, Rescheduler};
use crate::schedule::{OneOffAbsence, RecurringAbsence, WeeklyWorkRule};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Read access to a stylist's schedule data and to bookings.
pub trait ScheduleSource {
    fn fetch_weekly_rule(&self, stylist_id: &str) -> StoreResult<Option<WeeklyWorkRule>>;

    fn fetch_one_off_absences(&self, stylist_id: &str) -> StoreResult<Vec<OneOffAbsence>>;

    fn fetch_recurring_series_with_exceptions(
        &self,
        stylist_id: &str,
    ) -> StoreResult<Vec<RecurringAbsence>>;

    /// A booking, including summaries of its linked trial or main booking.
    fn fetch_booking(&self, booking_id: &str) -> StoreResult<Booking>;
}

/// Write access for committing reschedules.
pub trait BookingStore {
    fn update_booking_window(&mut self, update: &BookingUpdate) -> StoreResult<()>;

    fn insert_absence(&mut self, stylist_id: &str, absence: OneOffAbsence) -> StoreResult<()>;

    /// Write several updates in order.
    ///
    /// Returns how many were written before the first failure, with that
    /// failure. The default is sequential and non-atomic.
    fn update_booking_windows(
        &mut self,
        updates: &[&BookingUpdate],
    ) -> std::result::Result<(), (usize, StoreError)> {
        for (written, update) in updates.iter().enumerate() {
            self.update_booking_window(update)
                .map_err(|e| (written, e))?;
        }
        Ok(())
    }
}

/// Fetch everything availability needs for one stylist.
pub fn load_schedule<S: ScheduleSource + ?Sized>(
    source: &S,
    stylist_id: &str,
) -> Result<StylistSchedule> {
    Ok(StylistSchedule {
        work_rule: source.fetch_weekly_rule(stylist_id)?,
        absences: source.fetch_one_off_absences(stylist_id)?,
        recurring: source.fetch_recurring_series_with_exceptions(stylist_id)?,
    })
}

/// Write a validated plan.
pub fn commit_reschedule<S: BookingStore + ?Sized>(
    store: &mut S,
    plan: &ReschedulePlan,
) -> Result<()> {
    let updates: Vec<&BookingUpdate> = plan.updates().collect();

    if let Err((written, source)) = store.update_booking_windows(&updates) {
        if written == 0 {
            return Err(SchedulingError::Storage(source));
        }
        let committed_id = updates[written - 1].booking_id.clone();
        let failed_id = updates[written].booking_id.clone();
        tracing::error!(
            %committed_id,
            %failed_id,
            error = %source,
            "linked reschedule only partially committed"
        );
        return Err(SchedulingError::ConsistencyGap {
            committed_id,
            failed_id,
            source,
        });
    }

    for update in &updates {
        tracing::info!(
            booking_id = %update.booking_id,
            from = %update.previous.start,
            to = %update.new.start,
            "booking rescheduled"
        );
    }
    Ok(())
}

/// Fetch, validate against the current schedule, and commit a reschedule.
///
/// When `block_vacated` is `Some(reason)`, the vacated windows are recorded as
/// one-off absences after the move commits. If that fails the move stays
/// committed and the error is [`SchedulingError::VacatedNotBlocked`], which
/// carries the plan.
pub fn reschedule_booking<S>(
    store: &mut S,
    rescheduler: &Rescheduler,
    booking_id: &str,
    request: &RescheduleRequest,
    block_vacated: Option<&str>,
) -> Result<ReschedulePlan>
where
    S: ScheduleSource + BookingStore + ?Sized,
{
    let booking = store.fetch_booking(booking_id)?;
    let schedule = load_schedule(store, &booking.stylist_id)?;
    let plan = rescheduler.plan_within(&booking, request, &schedule)?;

    commit_reschedule(store, &plan)?;

    if let Some(reason) = block_vacated {
        for (blocked, absence) in plan.vacated_absences(Some(reason)).into_iter().enumerate() {
            if let Err(source) = store.insert_absence(&booking.stylist_id, absence) {
                tracing::error!(
                    booking_id = %plan.primary.booking_id,
                    blocked,
                    error = %source,
                    "booking moved but vacated slot left open"
                );
                return Err(SchedulingError::VacatedNotBlocked {
                    plan: Box::new(plan),
                    blocked,
                    source,
                });
            }
        }
    }
    Ok(plan)
}

/// A self-contained store holding schedules and bookings in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InMemoryStore {
    /// Schedules keyed by stylist id.
    #[serde(default)]
    pub schedules: BTreeMap<String, StylistSchedule>,
    /// Bookings keyed by booking id.
    #[serde(default)]
    pub bookings: BTreeMap<String, Booking>,
    #[serde(skip)]
    failing_writes: BTreeSet<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn insert_schedule(&mut self, stylist_id: impl Into<String>, schedule: StylistSchedule) {
        self.schedules.insert(stylist_id.into(), schedule);
    }

    pub fn insert_booking(&mut self, booking: Booking) {
        self.bookings.insert(booking.id.clone(), booking);
    }

    /// Make every later write to `booking_id` fail.
    pub fn fail_writes_to(&mut self, booking_id: impl Into<String>) {
        self.failing_writes.insert(booking_id.into());
    }

    fn schedule(&self, stylist_id: &str) -> Option<&StylistSchedule> {
        self.schedules.get(stylist_id)
    }
}

impl ScheduleSource for InMemoryStore {
    fn fetch_weekly_rule(&self, stylist_id: &str) -> StoreResult<Option<WeeklyWorkRule>> {
        Ok(self.schedule(stylist_id).and_then(|s| s.work_rule.clone()))
    }

    fn fetch_one_off_absences(&self, stylist_id: &str) -> StoreResult<Vec<OneOffAbsence>> {
        Ok(self
            .schedule(stylist_id)
            .map(|s| s.absences.clone())
            .unwrap_or_default())
    }

    fn fetch_recurring_series_with_exceptions(
        &self,
        stylist_id: &str,
    ) -> StoreResult<Vec<RecurringAbsence>> {
        Ok(self
            .schedule(stylist_id)
            .map(|s| s.recurring.clone())
            .unwrap_or_default())
    }

    fn fetch_booking(&self, booking_id: &str) -> StoreResult<Booking> {
        self.bookings
            .get(booking_id)
            .cloned()
            .ok_or_else(|| StoreError::BookingNotFound(booking_id.to_string()))
    }
}

impl BookingStore for InMemoryStore {
    fn update_booking_window(&mut self, update: &BookingUpdate) -> StoreResult<()> {
        if self.failing_writes.contains(&update.booking_id) {
            return Err(StoreError::WriteRejected {
                id: update.booking_id.clone(),
                message: "write failure injected".to_string(),
            });
        }

        let booking = self
            .bookings
            .get_mut(&update.booking_id)
            .ok_or_else(|| StoreError::BookingNotFound(update.booking_id.clone()))?;
        booking.start = update.new.start;
        booking.end = update.new.end;
        booking.audit = Some(update.audit.clone());

        // Keep the companion's summary of this booking in step.
        for other in self.bookings.values_mut() {
            for linked in [&mut other.trial_booking, &mut other.main_booking]
                .into_iter()
                .flatten()
            {
                if linked.id == update.booking_id {
                    linked.start = update.new.start;
                    linked.end = update.new.end;
                }
            }
        }
        Ok(())
    }

    fn insert_absence(&mut self, stylist_id: &str, absence: OneOffAbsence) -> StoreResult<()> {
        self.schedules
            .entry(stylist_id.to_string())
            .or_default()
            .absences
            .push(absence);
        Ok(())
    }
}
