//! Domain services for the budget server.
//!
//! `BudgetService` guards the per-user key-value store and `CalendarService`
//! turns the shared date utilities into the month, week and day views the
//! single-page app renders.

use anyhow::Result;
use async_trait::async_trait;
use shared::{
    add_months, build_calendar_cells, format_full_date, format_month_year, from_iso_date,
    is_after_day, next_day, previous_day, same_date, start_of_week, to_iso_date, today_local,
    week_dates, BudgetData, CalendarDate, CalendarMonthResponse, DateError, DayNavigationResponse,
    WeekDay, WeekResponse,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Persistence boundary for budget data.
///
/// The store treats values as opaque JSON; only the keys carry meaning.
#[async_trait]
pub trait BudgetStore: Send + Sync {
    /// Every entry of a user (empty mapping when nothing is stored)
    async fn load(&self, username: &str) -> Result<BudgetData>;

    /// Replace every entry of a user
    async fn save(&self, username: &str, data: &BudgetData) -> Result<()>;

    async fn get_entry(&self, username: &str, key: &str) -> Result<Option<serde_json::Value>>;

    async fn put_entry(&self, username: &str, key: &str, value: &serde_json::Value) -> Result<()>;

    /// Returns true if the entry existed
    async fn delete_entry(&self, username: &str, key: &str) -> Result<bool>;
}

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error(transparent)]
    InvalidKey(#[from] DateError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct BudgetService {
    store: Arc<dyn BudgetStore>,
    calendar: CalendarService,
}

impl BudgetService {
    /// `calendar` decides which day is today for writes
    pub fn new(store: Arc<dyn BudgetStore>, calendar: CalendarService) -> Self {
        Self { store, calendar }
    }

    pub async fn load(&self, username: &str) -> Result<BudgetData, BudgetError> {
        let data = self.store.load(username).await?;
        info!("Loaded {} entries for {}", data.len(), username);
        Ok(data)
    }

    pub async fn save(&self, username: &str, data: &BudgetData) -> Result<(), BudgetError> {
        info!("Saving {} entries for {}", data.len(), username);
        self.store.save(username, data).await?;
        Ok(())
    }

    /// Entry for one day. The key must be an ISO date.
    pub async fn get_day(&self, username: &str, key: &str) -> Result<Option<serde_json::Value>, BudgetError> {
        let key = Self::day_key(key)?;
        Ok(self.store.get_entry(username, &key).await?)
    }

    pub async fn put_day(
        &self,
        username: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), BudgetError> {
        let date = from_iso_date(key)?;
        self.calendar.ensure_not_future(&date)?;
        let key = to_iso_date(&date);
        info!("Putting entry {} for {}", key, username);
        self.store.put_entry(username, &key, value).await?;
        Ok(())
    }

    pub async fn delete_day(&self, username: &str, key: &str) -> Result<bool, BudgetError> {
        let key = Self::day_key(key)?;
        info!("Deleting entry {} for {}", key, username);
        Ok(self.store.delete_entry(username, &key).await?)
    }

    fn day_key(key: &str) -> Result<String, DateError> {
        from_iso_date(key).map(|date| to_iso_date(&date))
    }
}

/// Where "today" comes from
#[derive(Debug, Clone, Copy, PartialEq)]
enum Today {
    LocalClock,
    Fixed(CalendarDate),
}

/// Calendar views over the shared date utilities
#[derive(Debug, Clone)]
pub struct CalendarService {
    today: Today,
}

impl CalendarService {
    /// Calendar service reading today's date from the local clock
    pub fn new() -> Self {
        Self {
            today: Today::LocalClock,
        }
    }

    /// Calendar service pinned to a given day
    pub fn with_today(today: CalendarDate) -> Self {
        Self {
            today: Today::Fixed(today),
        }
    }

    pub fn today(&self) -> CalendarDate {
        match self.today {
            Today::LocalClock => today_local(),
            Today::Fixed(date) => date,
        }
    }

    /// Reject days strictly after today
    pub fn ensure_not_future(&self, date: &CalendarDate) -> Result<(), DateError> {
        let today = self.today();
        if is_after_day(date, &today) {
            debug!("Rejecting {}, today is {}", date, today);
            return Err(DateError::AfterToday(date.to_string()));
        }
        Ok(())
    }

    /// Parse an optional `date` parameter, falling back to today
    fn resolve(&self, date: Option<&str>) -> Result<CalendarDate, DateError> {
        match date {
            Some(iso) => from_iso_date(iso),
            None => Ok(self.today()),
        }
    }

    /// Month grid for the month containing `date`
    pub fn month_view(&self, date: Option<&str>) -> Result<CalendarMonthResponse, DateError> {
        let month = self.resolve(date)?.first_of_month();
        debug!("Building month view for {}", month);

        Ok(CalendarMonthResponse {
            month,
            label: format_month_year(&month),
            cells: build_calendar_cells(&month),
            previous_month: add_months(&month, -1),
            next_month: add_months(&month, 1),
        })
    }

    /// Day view with navigation targets. Days after today are rejected and
    /// today has no next day.
    pub fn day_view(&self, date: Option<&str>) -> Result<DayNavigationResponse, DateError> {
        let today = self.today();
        let date = self.resolve(date)?;
        self.ensure_not_future(&date)?;
        let iso = to_iso_date(&date);

        let previous = from_iso_date(&previous_day(&iso)?)?;
        let next = next_day(&iso, &today)?
            .map(|next| from_iso_date(&next))
            .transpose()?;

        Ok(DayNavigationResponse {
            date,
            label: format_full_date(&date),
            previous,
            next,
            is_today: same_date(&date, &today),
        })
    }

    /// Monday to Sunday around `date`
    pub fn week_view(&self, date: Option<&str>) -> Result<WeekResponse, DateError> {
        let today = self.today();
        let anchor = self.resolve(date)?;
        let days: Vec<WeekDay> = week_dates(&anchor)
            .into_iter()
            .map(|date| WeekDay {
                date,
                label: format_full_date(&date),
                is_future: is_after_day(&date, &today),
            })
            .collect();

        Ok(WeekResponse {
            start: start_of_week(&anchor),
            days,
        })
    }
}

impl Default for CalendarService {
    fn default() -> Self {
        Self::new()
    }
}
