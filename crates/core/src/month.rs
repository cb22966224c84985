//! Calendar month value type (`YYYY-MM`).

use std::{fmt, str::FromStr};

use chrono::{Datelike, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{4})-(0[1-9]|1[0-2])$").expect("failed to compile month regex"));

/// A calendar month. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month {
    year: i32,
    month: u32,
}

/// Text was not a `YYYY-MM` month.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid month '{0}', expected YYYY-MM")]
pub struct ParseMonthError(String);

impl Month {
    /// Build a month, returning `None` when `month` is outside 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// January of `year`.
    pub fn january(year: i32) -> Self {
        Self { year, month: 1 }
    }

    /// December of `year`.
    pub fn december(year: i32) -> Self {
        Self { year, month: 12 }
    }

    /// Month containing today's local date.
    pub fn current() -> Self {
        let today = Local::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    /// Calendar year.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Month number, 1-based.
    pub fn number(&self) -> u32 {
        self.month
    }

    /// The following month.
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The preceding month.
    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Shift by a signed number of months.
    pub fn offset(self, months: i32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1) + months;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    /// Inclusive count of months from `self` to `end`; zero when inverted.
    pub fn count_to(self, end: Month) -> usize {
        let start = self.year * 12 + self.month as i32;
        let stop = end.year * 12 + end.month as i32;
        if stop < start {
            0
        } else {
            (stop - start + 1) as usize
        }
    }

    /// Inclusive chronological range.
    pub fn range_to(self, end: Month) -> Vec<Month> {
        let mut months = Vec::with_capacity(self.count_to(end));
        let mut current = self;
        while current <= end {
            months.push(current);
            current = current.next();
        }
        months
    }

    /// Abbreviated English month name.
    pub fn short_name(&self) -> &'static str {
        const NAMES: [&str; 12] = [
            "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
        ];
        NAMES[(self.month - 1) as usize]
    }

    /// Full name with year (`January 2025`).
    pub fn long_label(&self) -> String {
        const NAMES: [&str; 12] = [
            "January",
            "February",
            "March",
            "April",
            "May",
            "June",
            "July",
            "August",
            "September",
            "October",
            "November",
            "December",
        ];
        format!("{} {}", NAMES[(self.month - 1) as usize], self.year)
    }

    /// First month of the quarter containing `self`.
    pub fn quarter_start(self) -> Self {
        Self {
            year: self.year,
            month: ((self.month - 1) / 3) * 3 + 1,
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = ParseMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = MONTH_RE
            .captures(s.trim())
            .ok_or_else(|| ParseMonthError(s.to_string()))?;
        let year = caps[1]
            .parse::<i32>()
            .map_err(|_| ParseMonthError(s.to_string()))?;
        let month = caps[2]
            .parse::<u32>()
            .map_err(|_| ParseMonthError(s.to_string()))?;
        Ok(Self { year, month })
    }
}

impl TryFrom<String> for Month {
    type Error = ParseMonthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Month> for String {
    fn from(value: Month) -> Self {
        value.to_string()
    }
}
