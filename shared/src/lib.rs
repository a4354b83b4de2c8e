use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod date_calendar;
pub mod number_format;
pub mod operation;

pub use date_calendar::{
    add_days_iso, add_months, build_calendar_cells, can_navigate_forward, days_in_month,
    format_full_date, format_month_year, from_iso_date, is_after_day, is_future_iso,
    monday_index, next_day, previous_day, same_date, start_of_week, to_iso_date, today_local,
    week_dates, CalendarCell, CalendarDate, CalendarDay, DateError, CALENDAR_GRID_CELLS, MAX_YEAR,
    MIN_YEAR,
};
pub use number_format::{
    format_comma_number, format_input_number_display, format_number_text_fr, to_number_loose,
};
pub use operation::{format_operation_display, tokenize, Operator, Token};

/// Everything stored for one user: entry key (usually an ISO date) to an
/// opaque JSON document owned by the client
pub type BudgetData = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// The signed-in user, returned by login and `/api/me`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub username: String,
}

/// One stored entry, as returned by `GET /api/data/:key`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    pub key: String,
    pub value: serde_json::Value,
}

/// Month view: French label and the 42-cell Monday-first grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarMonthResponse {
    /// First day of the displayed month
    pub month: CalendarDate,
    /// e.g. "juin 2025"
    pub label: String,
    pub cells: Vec<CalendarCell>,
    /// First day of the previous month
    pub previous_month: CalendarDate,
    /// First day of the next month
    pub next_month: CalendarDate,
}

/// Day view navigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayNavigationResponse {
    pub date: CalendarDate,
    /// e.g. "vendredi 13 juin 2025"
    pub label: String,
    pub previous: CalendarDate,
    /// `None` when the next day is after today
    pub next: Option<CalendarDate>,
    pub is_today: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekDay {
    pub date: CalendarDate,
    pub label: String,
    /// Days after today are shown but cannot be edited
    pub is_future: bool,
}

/// Week view: Monday to Sunday around the requested date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekResponse {
    pub start: CalendarDate,
    pub days: Vec<WeekDay>,
}

/// Log line sent by the browser client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: String,
    pub message: String,
    pub component: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogResponse {
    pub success: bool,
}
