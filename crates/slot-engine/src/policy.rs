//! Tunable booking rules.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::{InvalidInput, Result, SchedulingError};

/// Booking rules applied by the reschedule planner and the week grid.
///
/// Every field has a default, so a partial JSON document (or `{}`) is valid.
/// A negative or unrepresentable trial gap is rejected on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PolicyRow")]
pub struct BookingPolicy {
    /// Minimum hours between the end of a trial session and its main booking.
    pub min_trial_gap_hours: i64,
    /// First grid hour shown when a stylist has no work rule.
    pub display_start_hour: u32,
    /// Grid hour (exclusive) at which the display stops when there is no work rule.
    pub display_end_hour: u32,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            min_trial_gap_hours: 24,
            display_start_hour: 0,
            display_end_hour: 24,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct PolicyRow {
    min_trial_gap_hours: i64,
    display_start_hour: u32,
    display_end_hour: u32,
}

impl Default for PolicyRow {
    fn default() -> Self {
        let policy = BookingPolicy::default();
        Self {
            min_trial_gap_hours: policy.min_trial_gap_hours,
            display_start_hour: policy.display_start_hour,
            display_end_hour: policy.display_end_hour,
        }
    }
}

impl TryFrom<PolicyRow> for BookingPolicy {
    type Error = SchedulingError;

    fn try_from(row: PolicyRow) -> Result<Self> {
        let hours = row.min_trial_gap_hours;
        if hours < 0 || TimeDelta::try_hours(hours).is_none() {
            return Err(InvalidInput::TrialGapOutOfRange(hours).into());
        }
        Ok(Self {
            min_trial_gap_hours: hours,
            display_start_hour: row.display_start_hour,
            display_end_hour: row.display_end_hour,
        })
    }
}

impl BookingPolicy {
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// The trial gap as a duration, clamped to `[0, TimeDelta::MAX]` for
    /// policies built in code.
    pub fn min_trial_gap(&self) -> TimeDelta {
        TimeDelta::try_hours(self.min_trial_gap_hours.max(0)).unwrap_or(TimeDelta::MAX)
    }
}
