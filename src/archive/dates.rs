use crate::archive::month::{MonthKey, item_filename};
use crate::error::SyncError;
use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    pub date: NaiveDate,
    pub month: MonthKey,
    pub item_id: String,
    pub filename: String,
}

/// Map page order (most recent first) onto calendar days: with `n` ids the
/// first id gets day `n` and the last gets day 1.
pub fn assign_dates(month: MonthKey, ids: &[String]) -> Result<Vec<CatalogRecord>, SyncError> {
    let n = ids.len();
    let days_in_month = month.days_in_month();
    let mut rows = Vec::with_capacity(n);
    for (index, item_id) in ids.iter().enumerate() {
        let day = n - index;
        let out_of_range = || SyncError::DayOutOfRange {
            month: month.to_string(),
            count: n,
            day,
            days_in_month,
        };
        if day == 0 || day > days_in_month as usize {
            return Err(out_of_range());
        }
        let date = month.day(day as u32).ok_or_else(out_of_range)?;
        rows.push(CatalogRecord {
            date,
            month,
            item_id: item_id.clone(),
            filename: item_filename(month, item_id),
        });
    }
    Ok(rows)
}

/// Compare the listing length against the calendar. A past month should list
/// one item per day; the current month cannot list more items than days
/// elapsed. Returns a description of the mismatch, if any.
pub fn listing_length_anomaly(month: MonthKey, count: usize, today: NaiveDate) -> Option<String> {
    let current = MonthKey::containing(today);
    if month > current {
        return Some(format!("{count} items listed for future month {month}"));
    }
    if month == current {
        let elapsed = today.day() as usize;
        if count > elapsed {
            return Some(format!(
                "{count} items listed but only {elapsed} day(s) of {month} have elapsed"
            ));
        }
        return None;
    }
    let expected = month.days_in_month() as usize;
    if count != expected {
        return Some(format!(
            "{count} items listed for {month} which has {expected} days; dates may be shifted"
        ));
    }
    None
}
