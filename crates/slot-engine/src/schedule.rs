//! Schedule data: weekday tokens, weekly work hours, one-off absences and
//! recurring absence series with their per-occurrence exceptions.

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{InvalidInput, Result, SchedulingError};
use crate::interval::{to_minute, TimeWindow};
use crate::recurrence::Recurrence;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

/// The 2-letter token for a weekday (`SU`, `MO`, ... `SA`).
pub fn weekday_token(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "SU",
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
    }
}

/// Parse a weekday token, case-insensitively.
///
/// Only the first two letters matter, so `"mo"`, `"MO"` and `"Monday"` all
/// map to [`Weekday::Mon`].
pub fn parse_weekday_token(token: &str) -> Option<Weekday> {
    let normalized: String = token.trim().chars().take(2).collect::<String>().to_uppercase();
    WEEKDAYS
        .iter()
        .copied()
        .find(|d| weekday_token(*d) == normalized)
}

/// A subset of the seven weekdays.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const EMPTY: WeekdaySet = WeekdaySet(0);

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_sunday();
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_sunday()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Members in Sunday-first order.
    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        WEEKDAYS.iter().copied().filter(|d| self.contains(*d))
    }

    /// Parse a list of tokens, rejecting any unknown one.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self> {
        let mut set = WeekdaySet::EMPTY;
        for token in tokens {
            let day = parse_weekday_token(token.as_ref())
                .ok_or_else(|| InvalidInput::UnknownWeekday(token.as_ref().to_string()))?;
            set.insert(day);
        }
        Ok(set)
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = WeekdaySet::EMPTY;
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl TryFrom<Vec<String>> for WeekdaySet {
    type Error = SchedulingError;

    fn try_from(tokens: Vec<String>) -> Result<Self> {
        WeekdaySet::from_tokens(&tokens)
    }
}

impl From<WeekdaySet> for Vec<String> {
    fn from(set: WeekdaySet) -> Self {
        set.iter().map(|d| weekday_token(d).to_string()).collect()
    }
}

impl fmt::Debug for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.iter().map(weekday_token))
            .finish()
    }
}

/// A stylist's weekly work hours: the same time-of-day range on every day in
/// `days`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WorkRuleRow")]
pub struct WeeklyWorkRule {
    pub days: WeekdaySet,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Deserialize)]
struct WorkRuleRow {
    days: WeekdaySet,
    start: NaiveTime,
    end: NaiveTime,
}

impl TryFrom<WorkRuleRow> for WeeklyWorkRule {
    type Error = SchedulingError;

    fn try_from(row: WorkRuleRow) -> Result<Self> {
        WeeklyWorkRule::new(row.days, row.start, row.end)
    }
}

/// Same-day time-of-day ranges only; overnight ranges are rejected.
fn check_time_of_day(start: NaiveTime, end: NaiveTime) -> Result<()> {
    if start >= end {
        return Err(InvalidInput::EmptyTimeOfDay {
            start: start.format("%H:%M").to_string(),
            end: end.format("%H:%M").to_string(),
        }
        .into());
    }
    Ok(())
}

impl WeeklyWorkRule {
    pub fn new(days: WeekdaySet, start: NaiveTime, end: NaiveTime) -> Result<Self> {
        check_time_of_day(start, end)?;
        Ok(Self { days, start, end })
    }

    /// First grid hour of the work day.
    pub fn start_hour(&self) -> u32 {
        self.start.hour()
    }

    /// Grid hour at which work stops (exclusive).
    pub fn end_hour(&self) -> u32 {
        self.end.hour()
    }

    /// Whether the grid slot `(date, hour)` lies inside work hours.
    ///
    /// Hour-granular: the slot's hour must be in `[start_hour, end_hour)`.
    pub fn covers(&self, date: NaiveDate, hour: u32) -> bool {
        let Some(slot) = TimeWindow::hour_slot(date, hour) else {
            return false;
        };
        let h = slot.start.hour();
        self.days.contains(slot.start.weekday()) && h >= self.start_hour() && h < self.end_hour()
    }
}

/// A single absence interval, e.g. a holiday or a blocked-out afternoon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AbsenceRow")]
pub struct OneOffAbsence {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Deserialize)]
struct AbsenceRow {
    start: NaiveDateTime,
    end: NaiveDateTime,
    #[serde(default)]
    reason: Option<String>,
}

impl TryFrom<AbsenceRow> for OneOffAbsence {
    type Error = SchedulingError;

    fn try_from(row: AbsenceRow) -> Result<Self> {
        OneOffAbsence::new(row.start, row.end, row.reason)
    }
}

impl OneOffAbsence {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, reason: Option<String>) -> Result<Self> {
        let window = TimeWindow::new(start, end)?;
        Ok(Self {
            start: window.start,
            end: window.end,
            reason,
        })
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start,
            end: self.end,
        }
    }
}

/// A recurring absence definition, e.g. "Lunch, weekdays 12:00-13:00".
///
/// Loading rejects `start_time >= end_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SeriesRow")]
pub struct RecurringSeries {
    pub id: String,
    pub title: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub recurrence: Recurrence,
    /// First date the series may occur on.
    pub starts_on: NaiveDate,
    /// Last date the series may occur on; `None` is unbounded.
    #[serde(default)]
    pub ends_on: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct SeriesRow {
    id: String,
    title: String,
    start_time: NaiveTime,
    end_time: NaiveTime,
    recurrence: Recurrence,
    starts_on: NaiveDate,
    #[serde(default)]
    ends_on: Option<NaiveDate>,
}

impl TryFrom<SeriesRow> for RecurringSeries {
    type Error = SchedulingError;

    fn try_from(row: SeriesRow) -> Result<Self> {
        check_time_of_day(row.start_time, row.end_time)?;
        Ok(Self {
            id: row.id,
            title: row.title,
            start_time: row.start_time,
            end_time: row.end_time,
            recurrence: row.recurrence,
            starts_on: row.starts_on,
            ends_on: row.ends_on,
        })
    }
}

impl RecurringSeries {
    /// Whether `date` falls inside the series validity window (both ends inclusive).
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        date >= self.starts_on && self.ends_on.is_none_or(|end| date <= end)
    }

    /// The nominal occurrence window on `date`, ignoring exceptions.
    pub fn nominal_window(&self, date: NaiveDate) -> TimeWindow {
        TimeWindow {
            start: date.and_time(self.start_time),
            end: date.and_time(self.end_time),
        }
    }
}

/// What an exception does to the one occurrence it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExceptionOutcome {
    /// The occurrence does not happen; the time is available.
    Cancelled,
    /// The occurrence happens in a different window instead.
    Moved {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// A per-occurrence override of a recurring series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceException {
    pub series_id: String,
    /// Nominal start of the occurrence being overridden.
    pub original_start: NaiveDateTime,
    pub outcome: ExceptionOutcome,
}

impl OccurrenceException {
    pub fn cancelled(series_id: impl Into<String>, original_start: NaiveDateTime) -> Self {
        Self {
            series_id: series_id.into(),
            original_start,
            outcome: ExceptionOutcome::Cancelled,
        }
    }

    pub fn moved(
        series_id: impl Into<String>,
        original_start: NaiveDateTime,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Self {
        Self {
            series_id: series_id.into(),
            original_start,
            outcome: ExceptionOutcome::Moved { start, end },
        }
    }

    /// Map a storage row with nullable `new_start` / `new_end` columns.
    ///
    /// Both null cancels the occurrence, both set (and ordered) moves it.
    /// Any other shape is dropped and the occurrence stays nominal.
    pub fn from_columns(
        series_id: impl Into<String>,
        original_start: NaiveDateTime,
        new_start: Option<NaiveDateTime>,
        new_end: Option<NaiveDateTime>,
    ) -> Option<Self> {
        let series_id = series_id.into();
        match (new_start, new_end) {
            (None, None) => Some(Self::cancelled(series_id, original_start)),
            (Some(start), Some(end)) if start < end => {
                Some(Self::moved(series_id, original_start, start, end))
            }
            (start, end) => {
                tracing::warn!(
                    series_id = %series_id,
                    %original_start,
                    ?start,
                    ?end,
                    "ignoring malformed recurring-absence exception"
                );
                None
            }
        }
    }
}

/// A recurring series together with its exceptions, as fetched for a stylist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecurringAbsenceRow")]
pub struct RecurringAbsence {
    pub series: RecurringSeries,
    exceptions: Vec<OccurrenceException>,
}

#[derive(Deserialize)]
struct RecurringAbsenceRow {
    series: RecurringSeries,
    #[serde(default)]
    exceptions: Vec<OccurrenceException>,
}

impl From<RecurringAbsenceRow> for RecurringAbsence {
    fn from(row: RecurringAbsenceRow) -> Self {
        RecurringAbsence::new(row.series, row.exceptions)
    }
}

impl RecurringAbsence {
    /// Attach exceptions to a series.
    ///
    /// Exceptions for other series are discarded. At most one exception is
    /// kept per occurrence; a later one for the same original start wins.
    pub fn new(series: RecurringSeries, exceptions: Vec<OccurrenceException>) -> Self {
        let mut kept: Vec<OccurrenceException> = Vec::with_capacity(exceptions.len());
        for exception in exceptions {
            if exception.series_id != series.id {
                tracing::warn!(
                    series_id = %series.id,
                    exception_series_id = %exception.series_id,
                    "dropping exception attached to the wrong series"
                );
                continue;
            }
            let key = to_minute(exception.original_start);
            if let Some(existing) = kept
                .iter_mut()
                .find(|e| to_minute(e.original_start) == key)
            {
                tracing::warn!(
                    series_id = %series.id,
                    original_start = %key,
                    "duplicate exception for one occurrence, keeping the latest"
                );
                *existing = exception;
            } else {
                kept.push(exception);
            }
        }
        Self {
            series,
            exceptions: kept,
        }
    }

    pub fn exceptions(&self) -> &[OccurrenceException] {
        &self.exceptions
    }
}
