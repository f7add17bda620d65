//! Slot selection: pick a start hour with enough consecutive bookable hours.
//!
//! A candidate start `(date, hour)` needing `n` hours is selectable only if
//! every hour `hour..hour+n` passes the extra constraint (if any), is workable
//! and is not unavailable. Each hour is checked against its own date, so a
//! selection that runs past midnight is judged by the next day's rules.
//! Failure is never an error: callers simply must not proceed to booking.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::availability::{is_unavailable, is_workable, StylistSchedule};
use crate::interval::TimeWindow;

/// Hours a service of `duration_minutes` occupies on the grid (rounded up, at least 1).
pub fn required_hours(duration_minutes: u32) -> u32 {
    duration_minutes.div_ceil(60).max(1)
}

/// An extra hard constraint on each hour of a selection.
pub trait SlotConstraint {
    fn permits(&self, date: NaiveDate, hour: u32) -> bool;
}

impl<F> SlotConstraint for F
where
    F: Fn(NaiveDate, u32) -> bool,
{
    fn permits(&self, date: NaiveDate, hour: u32) -> bool {
        self(date, hour)
    }
}

/// Every hour must fall on a date strictly before the given one.
///
/// Used for trial sessions, which must happen before the main booking's day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeforeDate(pub NaiveDate);

impl SlotConstraint for BeforeDate {
    fn permits(&self, date: NaiveDate, _hour: u32) -> bool {
        date < self.0
    }
}

/// Every hour must start at or after the given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotBefore(pub NaiveDateTime);

impl SlotConstraint for NotBefore {
    fn permits(&self, date: NaiveDate, hour: u32) -> bool {
        TimeWindow::hour_slot(date, hour).is_some_and(|slot| slot.start >= self.0)
    }
}

/// A validated selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl SelectedSlot {
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start,
            end: self.end,
        }
    }
}

/// Whether `required_hours` consecutive hours starting at `(date, hour)` are
/// all selectable.
pub fn can_select(
    schedule: &StylistSchedule,
    date: NaiveDate,
    hour: u32,
    required_hours: u32,
    constraint: Option<&dyn SlotConstraint>,
) -> bool {
    let Some(rule) = schedule.work_rule.as_ref() else {
        return false;
    };
    let Some(first) = TimeWindow::hour_slot(date, hour) else {
        return false;
    };

    (0..required_hours.max(1)).all(|i| {
        let Some(at) = first.start.checked_add_signed(Duration::hours(i64::from(i))) else {
            return false;
        };
        let (d, h) = (at.date(), at.hour());
        constraint.is_none_or(|c| c.permits(d, h))
            && is_workable(rule, d, h)
            && !is_unavailable(schedule, d, h)
    })
}

/// Select the slot starting at `(date, hour)`, or `None` if it is not selectable.
pub fn select_slot(
    schedule: &StylistSchedule,
    date: NaiveDate,
    hour: u32,
    required_hours: u32,
    constraint: Option<&dyn SlotConstraint>,
) -> Option<SelectedSlot> {
    if !can_select(schedule, date, hour, required_hours, constraint) {
        return None;
    }
    let start = TimeWindow::hour_slot(date, hour)?.start;
    Some(SelectedSlot {
        start,
        end: start.checked_add_signed(Duration::hours(i64::from(required_hours.max(1))))?,
    })
}

/// Find the first selectable start hour in `[from, until)`.
///
/// `from` is rounded up to the next whole hour.
pub fn find_first_selectable(
    schedule: &StylistSchedule,
    from: NaiveDateTime,
    until: NaiveDateTime,
    required_hours: u32,
    constraint: Option<&dyn SlotConstraint>,
) -> Option<SelectedSlot> {
    let mut cursor = from.date().and_hms_opt(from.hour(), 0, 0)?;
    if cursor < from {
        cursor = cursor.checked_add_signed(Duration::hours(1))?;
    }

    while cursor < until {
        if let Some(slot) = select_slot(
            schedule,
            cursor.date(),
            cursor.hour(),
            required_hours,
            constraint,
        ) {
            return Some(slot);
        }
        cursor = cursor.checked_add_signed(Duration::hours(1))?;
    }
    None
}

/// All selectable start hours on `date`, in order.
pub fn selectable_starts(
    schedule: &StylistSchedule,
    date: NaiveDate,
    required_hours: u32,
    constraint: Option<&dyn SlotConstraint>,
) -> Vec<u32> {
    (0..24)
        .filter(|&hour| can_select(schedule, date, hour, required_hours, constraint))
        .collect()
}
