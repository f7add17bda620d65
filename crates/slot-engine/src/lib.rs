//! # slot-engine
//!
//! Availability and time-slot resolution for a stylist booking marketplace.
//!
//! Given a stylist's weekly work hours, one-off absences and recurring absences
//! (with per-occurrence cancellations or moves), the engine answers which
//! one-hour slots are bookable, validates multi-hour selections, and plans
//! booking reschedules, including linked trial/main pairs whose relative
//! offset must survive the move.
//!
//! Everything here is synchronous and pure over values the caller has already
//! fetched. The only write path is [`store::commit_reschedule`], which runs
//! against a caller-supplied [`store::BookingStore`].
//!
//! ## Modules
//!
//! - [`schedule`]: Weekday tokens, work rules, absences, recurring series
//! - [`interval`]: Half-open time windows and the overlap test
//! - [`recurrence`]: Does a recurring absence occur at a given date and hour?
//! - [`availability`]: Per-hour workable/unavailable predicates and reasons
//! - [`slots`]: Consecutive-hour slot selection with extra constraints
//! - [`booking`]: Bookings, statuses and trial/main links
//! - [`reschedule`]: Validated booking moves, including linked pairs
//! - [`store`]: Datastore boundary traits and an in-memory implementation
//! - [`policy`]: Tunable booking rules
//! - [`error`]: Error types

pub mod availability;
pub mod booking;
pub mod error;
pub mod interval;
pub mod policy;
pub mod recurrence;
pub mod reschedule;
pub mod schedule;
pub mod slots;
pub mod store;

pub use availability::{
    is_bookable, is_unavailable, is_workable, slot_status, unavailable_reason, week_grid,
    SlotStatus, StylistSchedule, UnavailableReason,
};
pub use booking::{Booking, BookingStatus, LinkedBooking};
pub use error::{ErrorKind, SchedulingError};
pub use interval::TimeWindow;
pub use policy::BookingPolicy;
pub use recurrence::{occurs_at, Occurrence, Recurrence};
pub use reschedule::{reschedule, ReschedulePlan, RescheduleRequest, Rescheduler};
pub use schedule::{
    ExceptionOutcome, OccurrenceException, OneOffAbsence, RecurringAbsence, RecurringSeries,
    WeekdaySet, WeeklyWorkRule,
};
pub use slots::{can_select, required_hours, select_slot, SelectedSlot, SlotConstraint};
pub use store::{commit_reschedule, load_schedule, BookingStore, InMemoryStore, ScheduleSource};
