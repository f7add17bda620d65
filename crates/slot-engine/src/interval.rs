//! Half-open wall-clock time windows.
//!
//! Every overlap test in the engine goes through [`TimeWindow::overlaps`]:
//! two windows overlap when `a.start < b.end && a.end > b.start`. Adjacent
//! windows (one ends exactly when the other starts) do NOT overlap.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{InvalidInput, Result};

/// A `[start, end)` window in local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    /// Build a window, rejecting `start >= end`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start >= end {
            return Err(InvalidInput::EmptyRange { start, end }.into());
        }
        Ok(Self { start, end })
    }

    /// The one-hour grid slot `[date+hour, date+hour+1)`.
    ///
    /// Hours past 23 roll into the following days. `None` when the slot lies
    /// beyond the representable calendar.
    pub fn hour_slot(date: NaiveDate, hour: u32) -> Option<Self> {
        let start = date
            .and_time(NaiveTime::MIN)
            .checked_add_signed(Duration::hours(i64::from(hour)))?;
        Some(Self {
            start,
            end: start.checked_add_signed(Duration::hours(1))?,
        })
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn contains(&self, other: &TimeWindow) -> bool {
        self.start <= other.start && self.end >= other.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Shift both ends by the same amount.
    pub fn shifted(&self, by: Duration) -> Self {
        Self {
            start: self.start + by,
            end: self.end + by,
        }
    }

    /// Whole hours covered on the hourly grid, counting a partial hour as one.
    pub fn grid_hours(&self) -> u32 {
        let minutes = self.duration().num_minutes().max(0) as u32;
        let offset = self.start.minute();
        (offset + minutes).div_ceil(60).max(1)
    }
}

/// Truncate an instant to whole minutes.
pub(crate) fn to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(dt)
}
