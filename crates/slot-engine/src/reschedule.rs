//! Booking time mutation: validate a move and plan the resulting updates.
//!
//! Planning is pure. A [`ReschedulePlan`] holds the update for the moved
//! booking, the update for its companion when a trial/main pair moves
//! together, and the notices downstream dispatch needs. Writing the plan is
//! [`crate::store::commit_reschedule`]'s job.
//!
//! Checks run in this order, and the first failure wins:
//!
//! 1. the new window is non-empty and starts strictly after `now`;
//! 2. the booking is pending or confirmed;
//! 3. the actor is the booking's stylist;
//! 4. trial/main ordering and the minimum gap hold for the new window(s).

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::availability::StylistSchedule;
use crate::booking::{Booking, LinkedBooking, RescheduleAudit};
use crate::error::{Conflict, InvalidInput, Result, SchedulingError};
use crate::interval::TimeWindow;
use crate::policy::BookingPolicy;
use crate::schedule::OneOffAbsence;
use crate::slots::{can_select, BeforeDate, SlotConstraint};

/// A request to move a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleRequest {
    /// The user asking for the move; must be the booking's stylist.
    pub actor_id: String,
    pub new_start: NaiveDateTime,
    pub new_end: NaiveDateTime,
    /// Move a main booking's trial session along with it, keeping their offset.
    #[serde(default)]
    pub move_linked: bool,
    #[serde(default)]
    pub reason: Option<String>,
    /// Reference time for the "must be in the future" checks.
    pub now: NaiveDateTime,
}

/// A planned change to one booking's time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingUpdate {
    pub booking_id: String,
    pub is_trial_session: bool,
    pub previous: TimeWindow,
    pub new: TimeWindow,
    pub audit: RescheduleAudit,
}

/// Data for the "your appointment moved" message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleNotice {
    pub booking_id: String,
    pub stylist_id: String,
    pub customer_id: String,
    pub is_trial_session: bool,
    pub old: TimeWindow,
    pub new: TimeWindow,
    pub reason: Option<String>,
}

/// Validated result of a reschedule request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReschedulePlan {
    /// The booking the request named.
    pub primary: BookingUpdate,
    /// The linked trial session, when it moves too.
    pub companion: Option<BookingUpdate>,
    pub notices: Vec<RescheduleNotice>,
}

impl ReschedulePlan {
    pub fn updates(&self) -> impl Iterator<Item = &BookingUpdate> {
        std::iter::once(&self.primary).chain(self.companion.iter())
    }

    /// Apply the plan to an in-memory booking.
    ///
    /// Updates the booking's own window and audit when it is part of the plan,
    /// and refreshes its linked summaries either way.
    pub fn apply_to(&self, booking: &mut Booking) {
        for update in self.updates() {
            if booking.id == update.booking_id {
                booking.start = update.new.start;
                booking.end = update.new.end;
                booking.audit = Some(update.audit.clone());
            }
            for linked in [&mut booking.trial_booking, &mut booking.main_booking]
                .into_iter()
                .flatten()
            {
                if linked.id == update.booking_id {
                    linked.start = update.new.start;
                    linked.end = update.new.end;
                }
            }
        }
    }

    /// The windows this plan vacates, as absences.
    ///
    /// For callers that want the old time to stay blocked instead of silently
    /// reopening.
    pub fn vacated_absences(&self, reason: Option<&str>) -> Vec<OneOffAbsence> {
        self.updates()
            .map(|u| OneOffAbsence {
                start: u.previous.start,
                end: u.previous.end,
                reason: reason.map(str::to_string),
            })
            .collect()
    }
}

/// Plans booking moves under a [`BookingPolicy`].
#[derive(Debug, Clone, Default)]
pub struct Rescheduler {
    policy: BookingPolicy,
}

impl Rescheduler {
    pub fn new(policy: BookingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    /// Validate `request` against `booking` and plan the updates.
    pub fn plan(&self, booking: &Booking, request: &RescheduleRequest) -> Result<ReschedulePlan> {
        self.check_and_plan(booking, request).inspect_err(|e| {
            tracing::debug!(
                booking_id = %booking.id,
                kind = ?e.kind(),
                error = %e,
                "reschedule rejected"
            );
        })
    }

    /// Like [`Rescheduler::plan`], and additionally require each new window
    /// to be selectable in the stylist's schedule.
    ///
    /// A trial session's window must also fall on a day strictly before its
    /// main booking's day.
    pub fn plan_within(
        &self,
        booking: &Booking,
        request: &RescheduleRequest,
        schedule: &StylistSchedule,
    ) -> Result<ReschedulePlan> {
        let plan = self.plan(booking, request)?;

        let main_day = if booking.is_trial_session {
            booking.active_main().map(|m| m.start.date())
        } else {
            Some(plan.primary.new.start.date())
        };

        for update in plan.updates() {
            let before_main = main_day.filter(|_| update.is_trial_session).map(BeforeDate);
            let constraint = before_main.as_ref().map(|c| c as &dyn SlotConstraint);
            let hours = update.new.grid_hours();
            let start = update.new.start;
            if !can_select(schedule, start.date(), start.hour(), hours, constraint) {
                let err = SchedulingError::from(Conflict::SlotUnavailable { start, hours });
                tracing::debug!(
                    booking_id = %update.booking_id,
                    error = %err,
                    "reschedule rejected"
                );
                return Err(err);
            }
        }
        Ok(plan)
    }

    fn check_and_plan(
        &self,
        booking: &Booking,
        request: &RescheduleRequest,
    ) -> Result<ReschedulePlan> {
        let new = TimeWindow::new(request.new_start, request.new_end)?;
        if new.start <= request.now {
            return Err(InvalidInput::StartNotInFuture {
                start: new.start,
                now: request.now,
            }
            .into());
        }

        if !booking.status.is_active() {
            return Err(Conflict::TerminalStatus(booking.status).into());
        }

        if request.actor_id != booking.stylist_id {
            return Err(SchedulingError::AuthorizationDenied {
                actor_id: request.actor_id.clone(),
                booking_id: booking.id.clone(),
            });
        }

        let mut companion = None;
        if let Some(main) = booking.active_main() {
            self.check_trial_before_main(new, main.start)?;
        } else if let Some(trial) = booking.active_trial() {
            if request.move_linked {
                companion = Some(self.plan_linked_trial(booking, trial, new, request)?);
            } else {
                if new.start <= trial.start {
                    return Err(Conflict::RequiresLinkedMove {
                        trial_start: trial.start,
                    }
                    .into());
                }
                self.check_gap(trial.end, new.start)?;
            }
        }

        let primary = BookingUpdate {
            booking_id: booking.id.clone(),
            is_trial_session: booking.is_trial_session,
            previous: booking.window(),
            new,
            audit: audit(booking.start, request),
        };

        let notices = std::iter::once(&primary)
            .chain(companion.iter())
            .map(|u| RescheduleNotice {
                booking_id: u.booking_id.clone(),
                stylist_id: booking.stylist_id.clone(),
                customer_id: booking.customer_id.clone(),
                is_trial_session: u.is_trial_session,
                old: u.previous,
                new: u.new,
                reason: request.reason.clone(),
            })
            .collect();

        Ok(ReschedulePlan {
            primary,
            companion,
            notices,
        })
    }

    fn check_trial_before_main(&self, trial: TimeWindow, main_start: NaiveDateTime) -> Result<()> {
        if trial.start >= main_start {
            return Err(Conflict::TrialAfterMain { main_start }.into());
        }
        self.check_gap(trial.end, main_start)
    }

    fn check_gap(&self, trial_end: NaiveDateTime, main_start: NaiveDateTime) -> Result<()> {
        if main_start - trial_end < self.policy.min_trial_gap() {
            return Err(Conflict::TrialGapTooShort {
                required_hours: self.policy.min_trial_gap_hours,
                trial_end,
                main_start,
            }
            .into());
        }
        Ok(())
    }

    /// Move the trial by the same offset as its main booking.
    fn plan_linked_trial(
        &self,
        main: &Booking,
        trial: &LinkedBooking,
        new_main: TimeWindow,
        request: &RescheduleRequest,
    ) -> Result<BookingUpdate> {
        if !trial.status.is_active() {
            return Err(Conflict::LinkedBookingLocked {
                booking_id: trial.id.clone(),
                status: trial.status,
            }
            .into());
        }

        let offset = main.start - trial.start;
        let trial_duration = trial.end - trial.start;
        let new_start = new_main.start - offset;
        let new_trial = TimeWindow {
            start: new_start,
            end: new_start + trial_duration,
        };

        if new_trial.start <= request.now {
            return Err(InvalidInput::LinkedStartNotInFuture {
                start: new_trial.start,
                now: request.now,
            }
            .into());
        }
        self.check_gap(new_trial.end, new_main.start)?;

        Ok(BookingUpdate {
            booking_id: trial.id.clone(),
            is_trial_session: true,
            previous: trial.window(),
            new: new_trial,
            audit: audit(trial.start, request),
        })
    }
}

fn audit(previous_start: NaiveDateTime, request: &RescheduleRequest) -> RescheduleAudit {
    RescheduleAudit {
        rescheduled_from: previous_start,
        rescheduled_at: request.now,
        reschedule_reason: request.reason.clone(),
    }
}

/// Plan a reschedule under the default policy.
pub fn reschedule(booking: &Booking, request: &RescheduleRequest) -> Result<ReschedulePlan> {
    Rescheduler::default().plan(booking, request)
}
