use crate::archive::catalog::Catalog;
use crate::archive::inventory::DiskInventory;
use crate::archive::month::{MonthKey, item_key};
use crate::archive::state::ScrapeState;
use std::collections::{BTreeMap, BTreeSet};

/// Whether the crawl needs to run after reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSignal {
    NothingToDo,
    WorkRemains,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub present: Vec<(MonthKey, String)>,
    pub missing: Vec<(MonthKey, String)>,
    pub months_completed: BTreeSet<MonthKey>,
    pub months_reopened: BTreeSet<MonthKey>,
}

impl ReconcileOutcome {
    pub fn signal(&self) -> SyncSignal {
        if self.missing.is_empty() {
            SyncSignal::NothingToDo
        } else {
            SyncSignal::WorkRemains
        }
    }

    /// Missing item ids grouped by month.
    pub fn missing_by_month(&self) -> BTreeMap<MonthKey, Vec<&str>> {
        let mut out: BTreeMap<MonthKey, Vec<&str>> = BTreeMap::new();
        for (month, id) in &self.missing {
            out.entry(*month).or_default().push(id.as_str());
        }
        out
    }
}

/// Bring `state` in line with the catalog and the files on disk for the
/// months in `window`. Items on disk become done; items not on disk are
/// cleared from both item sets so the next crawl retries them. A month is
/// complete only when it has catalog rows, none are missing, and it is not
/// `current`. Applying the same inputs twice leaves `state` unchanged.
pub fn reconcile(
    catalog: &Catalog,
    window: &[MonthKey],
    inventory: &DiskInventory,
    state: &mut ScrapeState,
    current: MonthKey,
) -> ReconcileOutcome {
    let window: BTreeSet<MonthKey> = window.iter().copied().collect();
    let mut outcome = ReconcileOutcome::default();
    let mut months_with_rows = BTreeSet::new();
    let mut months_with_missing = BTreeSet::new();

    for record in catalog.in_window(&window) {
        months_with_rows.insert(record.month);
        let key = item_key(record.month, &record.item_id);
        if inventory.is_present(&record.filename) {
            state.mark_present(&key);
            outcome.present.push((record.month, record.item_id.clone()));
        } else {
            state.mark_missing(&key);
            months_with_missing.insert(record.month);
            outcome.missing.push((record.month, record.item_id.clone()));
        }
    }

    for month in &months_with_missing {
        if state.is_month_complete(*month) {
            outcome.months_reopened.insert(*month);
        }
        state.mark_month_incomplete(*month);
    }
    for month in months_with_rows.difference(&months_with_missing) {
        if *month != current && !state.is_month_complete(*month) {
            state.mark_month_complete(*month);
            outcome.months_completed.insert(*month);
        }
    }
    if state.is_month_complete(current) {
        outcome.months_reopened.insert(current);
    }
    state.mark_month_incomplete(current);

    outcome.missing.sort();
    outcome
}
