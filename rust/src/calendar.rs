//! Working-day calendar: maps working-day offsets onto calendar dates.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::CalendarConfig;
use crate::critical_path::CriticalPathResult;

/// Offsets beyond this many working days are rejected instead of walked.
const MAX_OFFSET_DAYS: f64 = 1_000_000.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Errors raised by calendar arithmetic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalendarError {
    #[error("Calendar requires at least one working weekday")]
    NoWorkingDays,
    #[error("Invalid working-day offset {0} (must be finite, non-negative and at most 1000000)")]
    InvalidOffset(f64),
    #[error("End date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
    #[error("Date arithmetic overflowed the supported range")]
    DateOutOfRange,
}

/// Common working-week presets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkWeek {
    MondayToFriday,
    SundayToThursday,
}

impl WorkWeek {
    pub fn working_days(self) -> [Weekday; 5] {
        match self {
            WorkWeek::MondayToFriday => [
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            WorkWeek::SundayToThursday => [
                Weekday::Sun,
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
            ],
        }
    }
}

/// Convert an ISO weekday number (1 = Monday .. 7 = Sunday).
pub fn weekday_from_iso(number: u32) -> Option<Weekday> {
    match number {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

/// A working-week definition plus a holiday set.
///
/// A date is a working day iff its weekday is in the working set and it is
/// not a holiday.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkCalendar {
    /// Indexed by `Weekday::num_days_from_monday()`.
    working_days: [bool; 7],
    holidays: FxHashSet<NaiveDate>,
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self::from_work_week(WorkWeek::MondayToFriday)
    }
}

impl WorkCalendar {
    /// Build a calendar from working weekdays and holidays.
    pub fn new<I, J>(working_days: I, holidays: J) -> Result<Self, CalendarError>
    where
        I: IntoIterator<Item = Weekday>,
        J: IntoIterator<Item = NaiveDate>,
    {
        let mut calendar = Self {
            working_days: [false; 7],
            holidays: holidays.into_iter().collect(),
        };
        calendar.set_working_days(working_days)?;
        Ok(calendar)
    }

    pub fn from_work_week(week: WorkWeek) -> Self {
        let mut working_days = [false; 7];
        for day in week.working_days() {
            working_days[day.num_days_from_monday() as usize] = true;
        }
        Self {
            working_days,
            holidays: FxHashSet::default(),
        }
    }

    pub fn from_config(config: &CalendarConfig) -> Result<Self, CalendarError> {
        Self::new(
            config.working_days.iter().copied(),
            config.holidays.iter().copied(),
        )
    }

    /// Replace the working weekday set. An empty set is rejected.
    pub fn set_working_days<I>(&mut self, days: I) -> Result<(), CalendarError>
    where
        I: IntoIterator<Item = Weekday>,
    {
        let mut working_days = [false; 7];
        for day in days {
            working_days[day.num_days_from_monday() as usize] = true;
        }
        if !working_days.iter().any(|&w| w) {
            return Err(CalendarError::NoWorkingDays);
        }
        self.working_days = working_days;
        Ok(())
    }

    pub fn add_holiday(&mut self, date: NaiveDate) {
        self.holidays.insert(date);
    }

    pub fn add_holidays(&mut self, dates: &[NaiveDate]) {
        self.holidays.extend(dates.iter().copied());
    }

    /// Working weekdays, Monday first.
    pub fn working_days(&self) -> Vec<Weekday> {
        (0..7u32)
            .filter(|&i| self.working_days[i as usize])
            .filter_map(|i| weekday_from_iso(i + 1))
            .collect()
    }

    /// Holidays in ascending order.
    pub fn holidays(&self) -> Vec<NaiveDate> {
        let mut holidays: Vec<NaiveDate> = self.holidays.iter().copied().collect();
        holidays.sort();
        holidays
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        self.working_days[date.weekday().num_days_from_monday() as usize]
            && !self.holidays.contains(&date)
    }

    /// First working day on or after `date`.
    pub fn next_working_day(&self, date: NaiveDate) -> Result<NaiveDate, CalendarError> {
        let mut current = date;
        while !self.is_working_day(current) {
            current = current.succ_opt().ok_or(CalendarError::DateOutOfRange)?;
        }
        Ok(current)
    }

    /// Advance `start` by `days` working days.
    ///
    /// Whole days are stepped one date at a time, counting only working
    /// days. The fractional remainder is then added as a literal sub-day
    /// offset on top of the last stepped date.
    pub fn add_working_time(
        &self,
        start: NaiveDateTime,
        days: f64,
    ) -> Result<NaiveDateTime, CalendarError> {
        if !days.is_finite() || days < 0.0 || days > MAX_OFFSET_DAYS {
            return Err(CalendarError::InvalidOffset(days));
        }

        let whole = days.trunc();
        let fraction = days - whole;
        let mut remaining = whole as u64;
        let mut current = start.date();
        while remaining > 0 {
            current = current.succ_opt().ok_or(CalendarError::DateOutOfRange)?;
            if self.is_working_day(current) {
                remaining -= 1;
            }
        }

        let stepped = current.and_time(start.time());
        if fraction <= 0.0 {
            return Ok(stepped);
        }
        let offset = Duration::milliseconds((fraction * MILLIS_PER_DAY).round() as i64);
        stepped
            .checked_add_signed(offset)
            .ok_or(CalendarError::DateOutOfRange)
    }

    /// Date projection of [`WorkCalendar::add_working_time`] from midnight.
    ///
    /// A fractional remainder below one day never moves the date.
    pub fn add_working_days(&self, start: NaiveDate, days: f64) -> Result<NaiveDate, CalendarError> {
        let midnight = start
            .and_hms_opt(0, 0, 0)
            .ok_or(CalendarError::DateOutOfRange)?;
        Ok(self.add_working_time(midnight, days)?.date())
    }

    /// Number of working days in `[start, end]`, both ends inclusive.
    pub fn count_working_days(&self, start: NaiveDate, end: NaiveDate) -> Result<i64, CalendarError> {
        if end < start {
            return Err(CalendarError::EndBeforeStart { start, end });
        }
        Ok(start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| self.is_working_day(*d))
            .count() as i64)
    }

    /// Last working date of a span of `duration` working days starting at `start`.
    pub fn span_end(&self, start: NaiveDate, duration: f64) -> Result<NaiveDate, CalendarError> {
        self.add_working_days(start, (duration - 1.0).max(0.0))
    }
}

/// Anchor every task of a CPM result to calendar dates.
///
/// The start date is the project start advanced by the task's early start;
/// the end date is the last working day covered by its duration.
pub fn calculate_task_dates(
    result: &CriticalPathResult,
    project_start: NaiveDate,
    calendar: &WorkCalendar,
) -> Result<BTreeMap<String, (NaiveDate, NaiveDate)>, CalendarError> {
    let mut dates = BTreeMap::new();
    for (task_id, data) in &result.tasks {
        let start = calendar.add_working_days(project_start, data.early_start)?;
        let end = calendar.span_end(start, data.duration)?;
        dates.insert(task_id.clone(), (start, end));
    }
    Ok(dates)
}
