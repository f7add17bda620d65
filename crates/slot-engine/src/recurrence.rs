//! Recurring-absence evaluation: does a series occur at a given date and hour?
//!
//! Series recurrence is stored as RFC 5545 RRULE text. It is parsed once into a
//! structured [`Recurrence`] (via the `rrule` crate) when the series is loaded,
//! never per query. Only `FREQ=WEEKLY` with a day filter is supported; anything
//! else degrades to a rule that never occurs, so evaluation is total over every
//! stored shape.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rrule::{Frequency as RRuleFrequency, NWeekday, RRule, Unvalidated};
use serde::{Deserialize, Serialize};

use crate::interval::{to_minute, TimeWindow};
use crate::schedule::{
    weekday_token, ExceptionOutcome, OccurrenceException, RecurringSeries, WeekdaySet,
};

/// Recurrence frequency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frequency {
    Weekly,
    /// Anything we do not evaluate. Holds the original text for round-tripping.
    Unsupported(String),
}

/// A structured weekly recurrence descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Recurrence {
    pub frequency: Frequency,
    /// Every `interval`-th week. Always at least 1.
    pub interval: u32,
    /// Days the series occurs on. Empty means "the weekday of the series start".
    pub days: WeekdaySet,
}

impl Recurrence {
    pub fn weekly(days: WeekdaySet) -> Self {
        Self {
            frequency: Frequency::Weekly,
            interval: 1,
            days,
        }
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Parse RRULE text such as `FREQ=WEEKLY;BYDAY=MO,WE`.
    ///
    /// Never fails: unparseable or non-weekly rules become
    /// [`Frequency::Unsupported`].
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let body = trimmed
            .strip_prefix("RRULE:")
            .or_else(|| trimmed.strip_prefix("rrule:"))
            .unwrap_or(trimmed)
            .to_uppercase();

        let unsupported = || Self {
            frequency: Frequency::Unsupported(trimmed.to_string()),
            interval: 1,
            days: WeekdaySet::EMPTY,
        };

        let rule: RRule<Unvalidated> = match body.parse() {
            Ok(rule) => rule,
            Err(e) => {
                tracing::warn!(
                    rule = %trimmed,
                    error = %e,
                    "unparseable recurrence, treating as never occurring"
                );
                return unsupported();
            }
        };

        if !matches!(rule.get_freq(), RRuleFrequency::Weekly) {
            tracing::warn!(
                rule = %trimmed,
                "only weekly recurrences are evaluated, treating as never occurring"
            );
            return unsupported();
        }

        let days = rule
            .get_by_weekday()
            .iter()
            .map(|nth| match nth {
                NWeekday::Every(day) | NWeekday::Nth(_, day) => *day,
            })
            .collect();

        Self {
            frequency: Frequency::Weekly,
            interval: u32::from(rule.get_interval()).max(1),
            days,
        }
    }

    /// Whether the rule generates an occurrence on `date` for a series that
    /// started on `series_start`.
    pub fn matches(&self, series_start: NaiveDate, date: NaiveDate) -> bool {
        if self.frequency != Frequency::Weekly || date < series_start {
            return false;
        }
        let on_day = if self.days.is_empty() {
            date.weekday() == series_start.weekday()
        } else {
            self.days.contains(date.weekday())
        };
        if !on_day {
            return false;
        }
        if self.interval <= 1 {
            return true;
        }
        let weeks = (week_start(date) - week_start(series_start)).num_weeks();
        weeks % i64::from(self.interval) == 0
    }
}

/// Monday of the week containing `date`.
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

impl FromStr for Recurrence {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Recurrence::parse(s))
    }
}

impl From<String> for Recurrence {
    fn from(text: String) -> Self {
        Recurrence::parse(&text)
    }
}

impl From<Recurrence> for String {
    fn from(recurrence: Recurrence) -> Self {
        recurrence.to_string()
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.frequency {
            Frequency::Unsupported(raw) => write!(f, "{}", raw),
            Frequency::Weekly => {
                write!(f, "FREQ=WEEKLY")?;
                if self.interval > 1 {
                    write!(f, ";INTERVAL={}", self.interval)?;
                }
                if !self.days.is_empty() {
                    let days: Vec<&str> = self.days.iter().map(weekday_token).collect();
                    write!(f, ";BYDAY={}", days.join(","))?;
                }
                Ok(())
            }
        }
    }
}

/// An occurrence found at the queried slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    /// The effective window (nominal, or the exception's replacement).
    pub window: TimeWindow,
    /// `true` when an exception moved the occurrence away from its nominal time.
    pub moved: bool,
}

impl Occurrence {
    /// New start time of day, when the occurrence was moved.
    pub fn moved_to(&self) -> Option<NaiveTime> {
        self.moved.then(|| self.window.start.time())
    }
}

/// Check whether `series` occurs during the grid slot `(date, hour)`.
///
/// 1. `date` must lie in the series validity window.
/// 2. The recurrence must generate an occurrence on `date`.
/// 3. An exception keyed on the nominal start (to the minute) cancels the
///    occurrence or replaces its window.
/// 4. The occurrence counts only if its effective window overlaps
///    `[date+hour, date+hour+1)`.
///
/// Returns `None` when the series does not occur at the slot.
pub fn occurs_at(
    series: &RecurringSeries,
    exceptions: &[OccurrenceException],
    date: NaiveDate,
    hour: u32,
) -> Option<Occurrence> {
    if !series.is_valid_on(date) || !series.recurrence.matches(series.starts_on, date) {
        return None;
    }

    let nominal = series.nominal_window(date);
    let occurrence = match find_exception(series, exceptions, nominal.start) {
        Some(ExceptionOutcome::Cancelled) => return None,
        Some(ExceptionOutcome::Moved { start, end }) => Occurrence {
            window: TimeWindow { start, end },
            moved: true,
        },
        None => Occurrence {
            window: nominal,
            moved: false,
        },
    };

    let slot = TimeWindow::hour_slot(date, hour)?;
    slot.overlaps(&occurrence.window).then_some(occurrence)
}

fn find_exception(
    series: &RecurringSeries,
    exceptions: &[OccurrenceException],
    nominal_start: NaiveDateTime,
) -> Option<ExceptionOutcome> {
    let key = to_minute(nominal_start);
    exceptions
        .iter()
        .find(|e| e.series_id == series.id && to_minute(e.original_start) == key)
        .map(|e| e.outcome)
}
