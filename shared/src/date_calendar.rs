//! Calendar date arithmetic for the budget views.
//!
//! This module holds the date logic behind the daily, weekly and monthly
//! screens: ISO date conversion, month stepping, the Monday-first month grid
//! and the "no day after today" navigation bound. Everything here is pure;
//! the current day is always passed in by the caller so the functions stay
//! deterministic.
//!
//! Months are 0-based (0 = January) on every public API of this module.
//! Weekday indices are 0 = Sunday unless a function says Monday-first.

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Number of cells in a month grid (6 rows of 7 days).
pub const CALENDAR_GRID_CELLS: usize = 42;

/// Years a four-digit `YYYY-MM-DD` string can carry
pub const MIN_YEAR: i32 = 0;
pub const MAX_YEAR: i32 = 9999;

const MONTH_NAMES_FR: [&str; 12] = [
    "janvier", "février", "mars", "avril", "mai", "juin",
    "juillet", "août", "septembre", "octobre", "novembre", "décembre",
];

// Indexed Sunday first, like `CalendarDate::weekday_index`.
const WEEKDAY_NAMES_FR: [&str; 7] = [
    "dimanche", "lundi", "mardi", "mercredi", "jeudi", "vendredi", "samedi",
];

/// Errors raised while building or parsing calendar dates
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("Invalid ISO date (expected YYYY-MM-DD): {0:?}")]
    InvalidFormat(String),
    #[error("Invalid calendar date: year {year}, month index {month}, day {day}")]
    InvalidDate { year: i32, month: u32, day: u32 },
    #[error("Date arithmetic out of range from {0}")]
    OutOfRange(String),
    #[error("Date {0} is after today")]
    AfterToday(String),
}

/// A calendar day without time of day.
///
/// Always a valid Gregorian date between years `MIN_YEAR` and `MAX_YEAR`,
/// so its `YYYY-MM-DD` form (also its serialized form) parses back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    /// Build a date from a year, a 0-based month and a day of month.
    ///
    /// Out-of-range parts are rejected, never rolled over.
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self, DateError> {
        month
            .checked_add(1)
            .and_then(|month1| NaiveDate::from_ymd_opt(year, month1, day))
            .and_then(in_iso_range)
            .ok_or(DateError::InvalidDate { year, month, day })
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// 0-based month (0 = January)
    pub fn month(&self) -> u32 {
        self.0.month0()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Day of week, 0 = Sunday .. 6 = Saturday
    pub fn weekday_index(&self) -> u32 {
        self.0.weekday().num_days_from_sunday()
    }

    pub fn naive(&self) -> NaiveDate {
        self.0
    }

    /// First day of this date's month
    pub fn first_of_month(&self) -> Self {
        // Day 1 exists in every month.
        Self(self.0.with_day(1).unwrap_or(self.0))
    }
}

impl TryFrom<NaiveDate> for CalendarDate {
    type Error = DateError;

    fn try_from(date: NaiveDate) -> Result<Self, Self::Error> {
        in_iso_range(date).ok_or_else(|| DateError::OutOfRange(date.to_string()))
    }
}

fn in_iso_range(date: NaiveDate) -> Option<CalendarDate> {
    (MIN_YEAR..=MAX_YEAR)
        .contains(&date.year())
        .then_some(CalendarDate(date))
}

impl From<CalendarDate> for NaiveDate {
    fn from(date: CalendarDate) -> Self {
        date.0
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year(), self.month() + 1, self.day())
    }
}

impl FromStr for CalendarDate {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        from_iso_date(s)
    }
}

impl TryFrom<String> for CalendarDate {
    type Error = DateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        from_iso_date(&value)
    }
}

impl From<CalendarDate> for String {
    fn from(date: CalendarDate) -> Self {
        to_iso_date(&date)
    }
}

/// Anything that falls on a calendar day.
///
/// Date-times are truncated to their date part, which is how the day
/// comparisons below ignore time of day.
pub trait CalendarDay {
    fn calendar_day(&self) -> NaiveDate;
}

impl CalendarDay for CalendarDate {
    fn calendar_day(&self) -> NaiveDate {
        self.0
    }
}

impl CalendarDay for NaiveDate {
    fn calendar_day(&self) -> NaiveDate {
        *self
    }
}

impl CalendarDay for NaiveDateTime {
    fn calendar_day(&self) -> NaiveDate {
        self.date()
    }
}

impl<Tz: TimeZone> CalendarDay for DateTime<Tz> {
    fn calendar_day(&self) -> NaiveDate {
        self.date_naive()
    }
}

/// A single cell of the month grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CalendarCell {
    /// Padding before the 1st or after the last day of the month
    Empty,
    /// An actual day of the displayed month
    Day { date: CalendarDate },
}

impl CalendarCell {
    pub fn is_empty(&self) -> bool {
        matches!(self, CalendarCell::Empty)
    }

    pub fn date(&self) -> Option<CalendarDate> {
        match self {
            CalendarCell::Empty => None,
            CalendarCell::Day { date } => Some(*date),
        }
    }
}

/// Today's date on the local clock
pub fn today_local() -> CalendarDate {
    CalendarDate(Local::now().date_naive())
}

/// Check if a year is a leap year
pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Number of days in a month (0-based month index), `None` past December
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    match month {
        1 => {
            if is_leap_year(year) {
                Some(29)
            } else {
                Some(28)
            }
        }
        3 | 5 | 8 | 10 => Some(30),
        0..=11 => Some(31),
        _ => None,
    }
}

/// Move `months` months away from the month of `date`, landing on the 1st.
///
/// The day of month is dropped before stepping, so Jan 31 + 1 gives Feb 1.
/// A target outside years `MIN_YEAR..=MAX_YEAR` leaves the first of the
/// input month.
pub fn add_months(date: &CalendarDate, months: i32) -> CalendarDate {
    let first = date.first_of_month();
    let total = i64::from(date.year()) * 12 + i64::from(date.month()) + i64::from(months);
    let year = total.div_euclid(12);
    let month0 = total.rem_euclid(12) as u32;

    i32::try_from(year)
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, month0 + 1, 1))
        .and_then(in_iso_range)
        .unwrap_or_else(|| {
            debug!("add_months out of range: {} + {} months", date, months);
            first
        })
}

/// French month and year, e.g. "juin 2025"
pub fn format_month_year(date: &CalendarDate) -> String {
    format!("{} {}", MONTH_NAMES_FR[date.month() as usize], date.year())
}

/// French weekday and full date, e.g. "vendredi 13 juin 2025"
pub fn format_full_date(date: &CalendarDate) -> String {
    format!(
        "{} {} {} {}",
        WEEKDAY_NAMES_FR[date.weekday_index() as usize],
        date.day(),
        MONTH_NAMES_FR[date.month() as usize],
        date.year()
    )
}

/// Convert a Sunday-first weekday index to a Monday-first one.
pub fn monday_index(weekday_index: u32) -> u32 {
    (weekday_index + 6) % 7
}

/// Same calendar day, time of day ignored
pub fn same_date<A: CalendarDay, B: CalendarDay>(a: &A, b: &B) -> bool {
    a.calendar_day() == b.calendar_day()
}

/// The calendar day of `a` comes strictly after that of `b`
pub fn is_after_day<A: CalendarDay, B: CalendarDay>(a: &A, b: &B) -> bool {
    a.calendar_day() > b.calendar_day()
}

pub fn to_iso_date(date: &CalendarDate) -> String {
    date.to_string()
}

/// Parse a strict `YYYY-MM-DD` string.
pub fn from_iso_date(s: &str) -> Result<CalendarDate, DateError> {
    let invalid = || DateError::InvalidFormat(s.to_string());

    let bytes = s.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !well_formed {
        debug!("Rejecting malformed ISO date {:?}", s);
        return Err(invalid());
    }

    let year: i32 = s[0..4].parse().map_err(|_| invalid())?;
    let month: u32 = s[5..7].parse().map_err(|_| invalid())?;
    let day: u32 = s[8..10].parse().map_err(|_| invalid())?;
    if month == 0 {
        return Err(invalid());
    }

    CalendarDate::new(year, month - 1, day).map_err(|_| invalid())
}

/// Shift an ISO date by `delta` days, across month and year boundaries.
pub fn add_days_iso(iso: &str, delta: i64) -> Result<String, DateError> {
    let date = from_iso_date(iso)?;
    let shifted = if delta >= 0 {
        date.0.checked_add_days(Days::new(delta.unsigned_abs()))
    } else {
        date.0.checked_sub_days(Days::new(delta.unsigned_abs()))
    };

    shifted
        .and_then(in_iso_range)
        .map(|d| to_iso_date(&d))
        .ok_or_else(|| DateError::OutOfRange(iso.to_string()))
}

/// The ISO date falls strictly after `today`.
pub fn is_future_iso(iso: &str, today: &CalendarDate) -> Result<bool, DateError> {
    let date = from_iso_date(iso)?;
    Ok(is_after_day(&date, today))
}

/// The day after `iso`, or `None` when that day would be in the future.
pub fn next_day(iso: &str, today: &CalendarDate) -> Result<Option<String>, DateError> {
    let next = add_days_iso(iso, 1)?;
    if is_future_iso(&next, today)? {
        debug!("Forward navigation from {} blocked, today is {}", iso, today);
        return Ok(None);
    }
    Ok(Some(next))
}

/// The day before `iso`. Backward navigation has no lower bound.
pub fn previous_day(iso: &str) -> Result<String, DateError> {
    add_days_iso(iso, -1)
}

pub fn can_navigate_forward(iso: &str, today: &CalendarDate) -> Result<bool, DateError> {
    Ok(next_day(iso, today)?.is_some())
}

/// Monday of the week containing `date`
pub fn start_of_week(date: &CalendarDate) -> CalendarDate {
    let offset = u64::from(monday_index(date.weekday_index()));
    // Only the first days of year 0 can fall outside the range here.
    date.0
        .checked_sub_days(Days::new(offset))
        .and_then(in_iso_range)
        .unwrap_or(*date)
}

/// The seven days of the week containing `date`, Monday first.
///
/// The last week of year 9999 stops at December 31.
pub fn week_dates(date: &CalendarDate) -> Vec<CalendarDate> {
    let monday = start_of_week(date);
    monday
        .0
        .iter_days()
        .take(7)
        .map_while(in_iso_range)
        .collect()
}

/// Build the Monday-first month grid for the month of `month_date`.
///
/// Always returns exactly `CALENDAR_GRID_CELLS` cells: empty padding, the
/// days of the month in order, then empty padding up to the end.
pub fn build_calendar_cells(month_date: &CalendarDate) -> Vec<CalendarCell> {
    let first = month_date.first_of_month();
    let leading = monday_index(first.weekday_index()) as usize;
    // month() is always 0..=11
    let day_count = days_in_month(first.year(), first.month()).unwrap_or(0) as usize;

    let mut cells = Vec::with_capacity(CALENDAR_GRID_CELLS);
    cells.extend(std::iter::repeat(CalendarCell::Empty).take(leading));
    cells.extend(
        first
            .0
            .iter_days()
            .take(day_count)
            .map(|date| CalendarCell::Day { date: CalendarDate(date) }),
    );
    cells.resize(CALENDAR_GRID_CELLS, CalendarCell::Empty);

    debug!(
        "Built calendar grid for {}: {} leading, {} days",
        format_month_year(&first),
        leading,
        day_count
    );
    cells
}
