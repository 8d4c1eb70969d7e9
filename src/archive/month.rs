use crate::error::SyncError;
use chrono::{Datelike, Local, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// A `YYYYMM` partition key. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self, SyncError> {
        if !(1..=12).contains(&month) || !(1..=9999).contains(&year) {
            return Err(SyncError::InvalidMonthKey(format!("{year:04}{month:02}")));
        }
        Ok(Self { year, month })
    }

    pub fn current() -> Self {
        Self::containing(Local::now().date_naive())
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

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

    pub fn prev(self) -> Self {
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

    pub fn day(self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }

    pub fn days_in_month(self) -> u32 {
        let next = self.next();
        match (
            NaiveDate::from_ymd_opt(self.year, self.month, 1),
            NaiveDate::from_ymd_opt(next.year, next.month, 1),
        ) {
            (Some(first), Some(following)) => (following - first).num_days() as u32,
            // Only reachable for year 9999 December.
            _ => 31,
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = SyncError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.len() != 6 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SyncError::InvalidMonthKey(trimmed.to_string()));
        }
        let year = trimmed[..4]
            .parse::<i32>()
            .map_err(|_| SyncError::InvalidMonthKey(trimmed.to_string()))?;
        let month = trimmed[4..]
            .parse::<u32>()
            .map_err(|_| SyncError::InvalidMonthKey(trimmed.to_string()))?;
        Self::new(year, month)
    }
}

/// Inclusive, gap-free month sequence. `start > end` yields an empty vec.
pub fn month_range(start: MonthKey, end: MonthKey) -> Vec<MonthKey> {
    let mut out = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        out.push(cursor);
        cursor = cursor.next();
    }
    out
}

/// State key for a single item: `YYYYMM/<item id>`.
pub fn item_key(month: MonthKey, item_id: &str) -> String {
    format!("{month}/{item_id}")
}

pub fn item_filename(month: MonthKey, item_id: &str) -> String {
    format!("{month}_{item_id}.jpg")
}
