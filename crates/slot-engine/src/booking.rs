//! Bookings and their trial/main links.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Conflict, Result, SchedulingError};
use crate::interval::TimeWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Pending and confirmed bookings can still move.
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Summary of the other half of a trial/main pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LinkedBookingRow")]
pub struct LinkedBooking {
    pub id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: BookingStatus,
    #[serde(default)]
    pub is_trial_session: bool,
}

#[derive(Deserialize)]
struct LinkedBookingRow {
    id: String,
    start: NaiveDateTime,
    end: NaiveDateTime,
    status: BookingStatus,
    #[serde(default)]
    is_trial_session: bool,
}

impl TryFrom<LinkedBookingRow> for LinkedBooking {
    type Error = SchedulingError;

    fn try_from(row: LinkedBookingRow) -> Result<Self> {
        let window = TimeWindow::new(row.start, row.end)?;
        Ok(Self {
            id: row.id,
            start: window.start,
            end: window.end,
            status: row.status,
            is_trial_session: row.is_trial_session,
        })
    }
}

impl LinkedBooking {
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start,
            end: self.end,
        }
    }
}

/// Audit trail stamped on a booking when it is moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleAudit {
    /// Start time before the move.
    pub rescheduled_from: NaiveDateTime,
    pub rescheduled_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reschedule_reason: Option<String>,
}

/// A booking row. Loading rejects a window with `start >= end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BookingRow")]
pub struct Booking {
    pub id: String,
    pub stylist_id: String,
    pub customer_id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: BookingStatus,
    #[serde(default)]
    pub is_trial_session: bool,
    /// Set on a main booking that has a trial session.
    #[serde(default)]
    pub trial_booking: Option<LinkedBooking>,
    /// Set on a trial session that belongs to a main booking.
    #[serde(default)]
    pub main_booking: Option<LinkedBooking>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<RescheduleAudit>,
}

#[derive(Deserialize)]
struct BookingRow {
    id: String,
    stylist_id: String,
    customer_id: String,
    start: NaiveDateTime,
    end: NaiveDateTime,
    status: BookingStatus,
    #[serde(default)]
    is_trial_session: bool,
    #[serde(default)]
    trial_booking: Option<LinkedBooking>,
    #[serde(default)]
    main_booking: Option<LinkedBooking>,
    #[serde(default)]
    audit: Option<RescheduleAudit>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = SchedulingError;

    fn try_from(row: BookingRow) -> Result<Self> {
        let window = TimeWindow::new(row.start, row.end)?;
        Ok(Self {
            id: row.id,
            stylist_id: row.stylist_id,
            customer_id: row.customer_id,
            start: window.start,
            end: window.end,
            status: row.status,
            is_trial_session: row.is_trial_session,
            trial_booking: row.trial_booking,
            main_booking: row.main_booking,
            audit: row.audit,
        })
    }
}

impl Booking {
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start,
            end: self.end,
        }
    }

    /// Summary of this booking as seen from its companion.
    pub fn as_linked(&self) -> LinkedBooking {
        LinkedBooking {
            id: self.id.clone(),
            start: self.start,
            end: self.end,
            status: self.status,
            is_trial_session: self.is_trial_session,
        }
    }

    /// Linked trial session that still constrains this booking.
    pub fn active_trial(&self) -> Option<&LinkedBooking> {
        if self.is_trial_session {
            return None;
        }
        self.trial_booking
            .as_ref()
            .filter(|t| t.status != BookingStatus::Cancelled)
    }

    /// Linked main booking that still constrains this trial session.
    pub fn active_main(&self) -> Option<&LinkedBooking> {
        if !self.is_trial_session {
            return None;
        }
        self.main_booking
            .as_ref()
            .filter(|m| m.status != BookingStatus::Cancelled)
    }

    /// Move to `next` status, rejecting transitions the lifecycle forbids.
    pub fn transition(&mut self, next: BookingStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Conflict::InvalidTransition {
                from: self.status,
                to: next,
            }
            .into());
        }
        self.status = next;
        Ok(())
    }

    pub fn confirm(&mut self) -> Result<()> {
        self.transition(BookingStatus::Confirmed)
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.transition(BookingStatus::Cancelled)
    }

    pub fn complete(&mut self) -> Result<()> {
        self.transition(BookingStatus::Completed)
    }
}
