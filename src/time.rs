use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::AppError;

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Source of "today" for derived queries and the recurrence catch-up.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Wall clock in the device's local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock pinned to a settable instant.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn on(date: NaiveDate) -> Self {
        Self::new(date.and_time(chrono::NaiveTime::MIN))
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn set_date(&self, date: NaiveDate) {
        self.set(date.and_time(chrono::NaiveTime::MIN));
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonthKeyError {
    #[error("month key must look like YYYY-MM, got {0:?}")]
    Malformed(String),
    #[error("month {0} is out of range")]
    MonthOutOfRange(u32),
}

impl From<MonthKeyError> for AppError {
    fn from(error: MonthKeyError) -> Self {
        AppError::new("MONTH_KEY/INVALID", error.to_string())
    }
}

/// Year-month grouping key, rendered as zero-padded `YYYY-MM` regardless of locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self, MonthKeyError> {
        if !(1..=12).contains(&month) {
            return Err(MonthKeyError::MonthOutOfRange(month));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = MonthKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (year, month) = trimmed
            .split_once('-')
            .ok_or_else(|| MonthKeyError::Malformed(trimmed.to_string()))?;
        if year.len() != 4 || month.len() != 2 {
            return Err(MonthKeyError::Malformed(trimmed.to_string()));
        }
        let year: i32 = year
            .parse()
            .map_err(|_| MonthKeyError::Malformed(trimmed.to_string()))?;
        let month: u32 = month
            .parse()
            .map_err(|_| MonthKeyError::Malformed(trimmed.to_string()))?;
        MonthKey::new(year, month)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = MonthKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(value: MonthKey) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ms_is_reasonable() {
        let a = now_ms();
        assert!(a > 1_500_000_000_000);
        assert!(a < 4_100_000_000_000);
    }

    #[test]
    fn month_key_is_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(MonthKey::from_date(date).to_string(), "2024-03");
    }

    #[test]
    fn month_key_parses_and_rejects() {
        let key: MonthKey = "2024-11".parse().unwrap();
        assert_eq!((key.year(), key.month()), (2024, 11));
        assert_eq!(
            "2024-13".parse::<MonthKey>(),
            Err(MonthKeyError::MonthOutOfRange(13))
        );
        assert!(matches!(
            "2024/03".parse::<MonthKey>(),
            Err(MonthKeyError::Malformed(_))
        ));
        assert!(matches!(
            "24-3".parse::<MonthKey>(),
            Err(MonthKeyError::Malformed(_))
        ));
    }

    #[test]
    fn fixed_clock_moves_only_when_told() {
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        clock.set_date(NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
    }
}
