//! Error types for slot-engine operations.
//!
//! Availability and recurrence evaluation never fail; every error here comes
//! from constructing model values, validating a reschedule, or writing one.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::booking::BookingStatus;
use crate::reschedule::ReschedulePlan;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulingError {
    /// Malformed time range or a start that must lie in the future but does not.
    #[error("Invalid input: {0}")]
    InputInvalid(InvalidInput),

    /// The acting user is not the booking's stylist.
    #[error("Authorization denied: {actor_id} is not the stylist for booking {booking_id}")]
    AuthorizationDenied { actor_id: String, booking_id: String },

    /// Booking status or trial/main ordering forbids the operation.
    #[error("Conflict: {0}")]
    StateConflict(Conflict),

    /// A linked move committed the first booking but not its companion.
    #[error(
        "Consistency gap: booking {committed_id} was moved but linked booking {failed_id} \
         was not ({source})"
    )]
    ConsistencyGap {
        committed_id: String,
        failed_id: String,
        source: StoreError,
    },

    /// The move committed, but recording its vacated windows as absences
    /// failed after `blocked` of them were written. The vacated time is open.
    #[error(
        "Consistency gap: booking {} was moved but its vacated slot could not be \
         blocked ({source})",
        plan.primary.booking_id
    )]
    VacatedNotBlocked {
        plan: Box<ReschedulePlan>,
        blocked: usize,
        source: StoreError,
    },

    /// The datastore rejected a read or a write before anything was committed.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// The error taxonomy callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputInvalid,
    AuthorizationDenied,
    StateConflict,
    ConsistencyGap,
    Storage,
}

impl SchedulingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulingError::InputInvalid(_) => ErrorKind::InputInvalid,
            SchedulingError::AuthorizationDenied { .. } => ErrorKind::AuthorizationDenied,
            SchedulingError::StateConflict(_) => ErrorKind::StateConflict,
            SchedulingError::ConsistencyGap { .. }
            | SchedulingError::VacatedNotBlocked { .. } => ErrorKind::ConsistencyGap,
            SchedulingError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<InvalidInput> for SchedulingError {
    fn from(detail: InvalidInput) -> Self {
        SchedulingError::InputInvalid(detail)
    }
}

impl From<Conflict> for SchedulingError {
    fn from(detail: Conflict) -> Self {
        SchedulingError::StateConflict(detail)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidInput {
    #[error("start {start} must be before end {end}")]
    EmptyRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("start time {start} is not in the future (now {now})")]
    StartNotInFuture {
        start: NaiveDateTime,
        now: NaiveDateTime,
    },

    #[error("linked booking would start at {start}, which is not in the future (now {now})")]
    LinkedStartNotInFuture {
        start: NaiveDateTime,
        now: NaiveDateTime,
    },

    #[error("start time of day {start} must be before end time of day {end}")]
    EmptyTimeOfDay { start: String, end: String },

    #[error("unknown day of week: {0}")]
    UnknownWeekday(String),

    #[error("minimum trial gap of {0}h is out of range")]
    TrialGapOutOfRange(i64),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Conflict {
    #[error("booking is {0} and can no longer be rescheduled")]
    TerminalStatus(BookingStatus),

    #[error("linked booking {booking_id} is {status} and can not be moved")]
    LinkedBookingLocked {
        booking_id: String,
        status: BookingStatus,
    },

    #[error("cannot change status from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("trial session must start before the main booking at {main_start}")]
    TrialAfterMain { main_start: NaiveDateTime },

    #[error(
        "trial session ending at {trial_end} must end at least {required_hours}h before \
         the main booking at {main_start}"
    )]
    TrialGapTooShort {
        required_hours: i64,
        trial_end: NaiveDateTime,
        main_start: NaiveDateTime,
    },

    #[error(
        "new start must be after the trial session at {trial_start}; \
         move the trial session together with this booking instead"
    )]
    RequiresLinkedMove { trial_start: NaiveDateTime },

    #[error("the slot starting at {start} is not available for {hours}h")]
    SlotUnavailable { start: NaiveDateTime, hours: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("booking not found: {0}")]
    BookingNotFound(String),

    #[error("write rejected for {id}: {message}")]
    WriteRejected { id: String, message: String },

    #[error("backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, SchedulingError>;
