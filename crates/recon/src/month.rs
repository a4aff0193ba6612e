use std::fmt;

use chrono::{Datelike, Local, NaiveDate};
use serde::{Serialize, Serializer};

use crate::error::ReconError;

const LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// A calendar month, stored as its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Month(NaiveDate);

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    /// Month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        // Day 1 of an existing date's month always exists.
        Self(date.with_day(1).unwrap_or(date))
    }

    /// Parse `YYYY-MM`.
    pub fn parse(input: &str) -> Result<Self, ReconError> {
        let trimmed = input.trim();
        let (year, month) = trimmed
            .split_once('-')
            .ok_or_else(|| ReconError::MonthParse(input.into()))?;
        if year.len() != 4 || month.is_empty() || month.len() > 2 {
            return Err(ReconError::MonthParse(input.into()));
        }
        let year: i32 = year.parse().map_err(|_| ReconError::MonthParse(input.into()))?;
        let month: u32 = month.parse().map_err(|_| ReconError::MonthParse(input.into()))?;
        Self::new(year, month).ok_or_else(|| ReconError::MonthParse(input.into()))
    }

    /// `--month` resolution: explicit value, else the last fully closed month.
    pub fn resolve(arg: Option<&str>) -> Result<Self, ReconError> {
        match arg {
            Some(s) if !s.trim().is_empty() => Self::parse(s),
            _ => Ok(Self::of(Local::now().date_naive()).previous()),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn number(&self) -> u32 {
        self.0.month()
    }

    pub fn previous(&self) -> Self {
        if self.number() == 1 {
            Self::new(self.year() - 1, 12).unwrap_or(*self)
        } else {
            Self::new(self.year(), self.number() - 1).unwrap_or(*self)
        }
    }

    pub fn next(&self) -> Self {
        if self.number() == 12 {
            Self::new(self.year() + 1, 1).unwrap_or(*self)
        } else {
            Self::new(self.year(), self.number() + 1).unwrap_or(*self)
        }
    }

    /// Three-letter English month label, e.g. `Mar`.
    pub fn label(&self) -> &'static str {
        LABELS[(self.number() - 1) as usize]
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year() && date.month() == self.number()
    }

    /// `count` months ending at (and including) `anchor`, oldest first.
    pub fn window(anchor: Month, count: u32) -> Result<Vec<Month>, ReconError> {
        if count == 0 {
            return Err(ReconError::ConfigValidation(
                "window_months must be >= 1".into(),
            ));
        }
        let mut months = Vec::with_capacity(count as usize);
        let mut current = anchor;
        for _ in 0..count {
            months.push(current);
            current = current.previous();
        }
        months.reverse();
        Ok(months)
    }

    /// Month number for a three-letter English abbreviation (`JAN`, `mar`).
    pub fn number_from_abbrev(text: &str) -> Option<u32> {
        let upper = text.trim().to_ascii_uppercase();
        LABELS
            .iter()
            .position(|l| l.to_ascii_uppercase() == upper)
            .map(|i| i as u32 + 1)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
