//! Per-hour availability for a single stylist.
//!
//! Combines the weekly work rule, one-off absences and recurring absences into
//! two predicates over grid slots `(date, hour)`:
//!
//! - [`is_workable`]: the slot lies inside the stylist's work hours;
//! - [`is_unavailable`]: an absence (one-off or recurring) overlaps the slot.
//!
//! A slot is bookable only when it is workable and not unavailable. All
//! functions are pure; callers may memoize a [`week_grid`] per render pass but
//! nothing here depends on it.

use chrono::{Days, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::interval::TimeWindow;
use crate::policy::BookingPolicy;
use crate::recurrence::occurs_at;
use crate::schedule::{OneOffAbsence, RecurringAbsence, WeeklyWorkRule};

/// Everything needed to answer availability questions for one stylist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StylistSchedule {
    /// Weekly work hours. A stylist without a rule has no workable slots.
    #[serde(default)]
    pub work_rule: Option<WeeklyWorkRule>,
    #[serde(default)]
    pub absences: Vec<OneOffAbsence>,
    #[serde(default)]
    pub recurring: Vec<RecurringAbsence>,
}

/// Why a slot is unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnavailableReason {
    /// A one-off absence with a free-text reason.
    Absence { reason: String },
    /// A recurring absence, possibly moved by an exception.
    Recurring {
        title: String,
        moved_to: Option<NaiveTime>,
    },
    /// Unavailable, with nothing more specific to say.
    Unspecified,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::Absence { reason } => write!(f, "{}", reason),
            UnavailableReason::Recurring {
                title,
                moved_to: Some(at),
            } => write!(f, "{} (moved to {})", title, at.format("%H:%M")),
            UnavailableReason::Recurring { title, .. } => write!(f, "{}", title),
            UnavailableReason::Unspecified => write!(f, "Unavailable"),
        }
    }
}

/// Bookability of a single grid slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlotStatus {
    OutsideHours,
    Unavailable { reason: UnavailableReason },
    Available,
}

impl SlotStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, SlotStatus::Available)
    }
}

/// Normalize `(date, hour)` so hours past 23 land on the following days.
fn grid_position(date: NaiveDate, hour: u32) -> Option<(NaiveDate, u32, TimeWindow)> {
    let slot = TimeWindow::hour_slot(date, hour)?;
    Some((slot.start.date(), slot.start.hour(), slot))
}

/// Whether the slot lies inside the weekly work hours.
pub fn is_workable(rule: &WeeklyWorkRule, date: NaiveDate, hour: u32) -> bool {
    rule.covers(date, hour)
}

fn overlapping_absences<'a>(
    schedule: &'a StylistSchedule,
    slot: &'a TimeWindow,
) -> impl Iterator<Item = &'a OneOffAbsence> + 'a {
    schedule
        .absences
        .iter()
        .filter(move |a| a.window().overlaps(slot))
}

/// Whether any absence overlaps the slot `[date+hour, date+hour+1)`.
///
/// A slot beyond the representable calendar has no absences.
pub fn is_unavailable(schedule: &StylistSchedule, date: NaiveDate, hour: u32) -> bool {
    let Some((date, hour, slot)) = grid_position(date, hour) else {
        return false;
    };

    if overlapping_absences(schedule, &slot).next().is_some() {
        return true;
    }

    schedule
        .recurring
        .iter()
        .any(|r| occurs_at(&r.series, r.exceptions(), date, hour).is_some())
}

/// Explain why a slot is unavailable, or `None` if it is not.
///
/// Precedence: the first overlapping one-off absence that carries a reason,
/// then the first overlapping recurring series (in schedule order), then a
/// generic label.
pub fn unavailable_reason(
    schedule: &StylistSchedule,
    date: NaiveDate,
    hour: u32,
) -> Option<UnavailableReason> {
    let (date, hour, slot) = grid_position(date, hour)?;

    let mut any_absence = false;
    for absence in overlapping_absences(schedule, &slot) {
        any_absence = true;
        if let Some(reason) = absence.reason.as_deref().filter(|r| !r.trim().is_empty()) {
            return Some(UnavailableReason::Absence {
                reason: reason.to_string(),
            });
        }
    }

    let recurring = schedule.recurring.iter().find_map(|r| {
        occurs_at(&r.series, r.exceptions(), date, hour).map(|occurrence| {
            UnavailableReason::Recurring {
                title: r.series.title.clone(),
                moved_to: occurrence.moved_to(),
            }
        })
    });

    match recurring {
        Some(reason) => Some(reason),
        None if any_absence => Some(UnavailableReason::Unspecified),
        None => None,
    }
}

/// Workable and not unavailable.
pub fn is_bookable(schedule: &StylistSchedule, date: NaiveDate, hour: u32) -> bool {
    schedule
        .work_rule
        .as_ref()
        .is_some_and(|rule| is_workable(rule, date, hour))
        && !is_unavailable(schedule, date, hour)
}

/// Full status of one slot, including the unavailability reason.
pub fn slot_status(schedule: &StylistSchedule, date: NaiveDate, hour: u32) -> SlotStatus {
    let workable = schedule
        .work_rule
        .as_ref()
        .is_some_and(|rule| is_workable(rule, date, hour));
    if !workable {
        return SlotStatus::OutsideHours;
    }
    match unavailable_reason(schedule, date, hour) {
        Some(reason) => SlotStatus::Unavailable { reason },
        None => SlotStatus::Available,
    }
}

/// One cell of the availability grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSlot {
    pub hour: u32,
    #[serde(flatten)]
    pub status: SlotStatus,
}

/// One column (day) of the availability grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDay {
    pub date: NaiveDate,
    pub slots: Vec<GridSlot>,
}

/// Slot statuses for a run of consecutive days over the display hour range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityGrid {
    /// First displayed hour.
    pub start_hour: u32,
    /// Displayed hours stop before this one.
    pub end_hour: u32,
    pub days: Vec<GridDay>,
}

impl AvailabilityGrid {
    /// Status of a cell, if it is inside the grid.
    pub fn status(&self, date: NaiveDate, hour: u32) -> Option<&SlotStatus> {
        self.days
            .iter()
            .find(|d| d.date == date)?
            .slots
            .iter()
            .find(|s| s.hour == hour)
            .map(|s| &s.status)
    }

    pub fn available_count(&self) -> usize {
        self.days
            .iter()
            .flat_map(|d| d.slots.iter())
            .filter(|s| s.status.is_available())
            .count()
    }
}

/// The hour range worth displaying: the work rule's hours, or the policy's
/// fallback when the stylist has no rule.
pub fn display_hours(schedule: &StylistSchedule, policy: &BookingPolicy) -> (u32, u32) {
    match &schedule.work_rule {
        Some(rule) => (rule.start_hour(), rule.end_hour()),
        None => (
            policy.display_start_hour.min(24),
            policy.display_end_hour.min(24),
        ),
    }
}

/// Build the availability grid for `days` consecutive days from `first_day`.
///
/// Typically called with a Monday and `7` for a week view.
pub fn week_grid(
    schedule: &StylistSchedule,
    first_day: NaiveDate,
    days: u32,
    policy: &BookingPolicy,
) -> AvailabilityGrid {
    let (start_hour, end_hour) = display_hours(schedule, policy);

    let days = (0..days)
        .map_while(|offset| first_day.checked_add_days(Days::new(u64::from(offset))))
        .map(|date| {
            let slots = (start_hour..end_hour)
                .map(|hour| GridSlot {
                    hour,
                    status: slot_status(schedule, date, hour),
                })
                .collect();
            GridDay { date, slots }
        })
        .collect();

    AvailabilityGrid {
        start_hour,
        end_hour,
        days,
    }
}
