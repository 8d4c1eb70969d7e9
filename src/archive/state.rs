use crate::archive::month::MonthKey;
use crate::archive::util::write_atomic;
use crate::error::SyncError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Persisted crawl progress. Item keys are `YYYYMM/<item id>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeState {
    pub done_months: BTreeSet<String>,
    pub done_images: BTreeSet<String>,
    pub failed_images: BTreeSet<String>,
}

impl ScrapeState {
    /// Item is on disk: done, and no longer failed.
    pub fn mark_present(&mut self, key: &str) {
        self.failed_images.remove(key);
        self.done_images.insert(key.to_string());
    }

    /// Item must be fetched again: neither done nor failed.
    pub fn mark_missing(&mut self, key: &str) {
        self.done_images.remove(key);
        self.failed_images.remove(key);
    }

    pub fn mark_failed(&mut self, key: &str) {
        self.done_images.remove(key);
        self.failed_images.insert(key.to_string());
    }

    pub fn mark_month_complete(&mut self, month: MonthKey) {
        self.done_months.insert(month.to_string());
    }

    pub fn mark_month_incomplete(&mut self, month: MonthKey) {
        self.done_months.remove(&month.to_string());
    }

    pub fn is_month_complete(&self, month: MonthKey) -> bool {
        self.done_months.contains(&month.to_string())
    }

    pub fn is_done(&self, key: &str) -> bool {
        self.done_images.contains(key)
    }

    /// Discard all progress. Returns how many entries were dropped.
    pub fn reset(&mut self) -> usize {
        let dropped = self.done_months.len() + self.done_images.len() + self.failed_images.len();
        self.done_months.clear();
        self.done_images.clear();
        self.failed_images.clear();
        dropped
    }

    /// Repairs files written by older tools where a key sat in both sets;
    /// presence wins. Returns how many keys were dropped from `failed_images`.
    pub fn normalize(&mut self) -> usize {
        let overlap: Vec<String> = self
            .failed_images
            .intersection(&self.done_images)
            .cloned()
            .collect();
        for key in &overlap {
            self.failed_images.remove(key);
        }
        overlap.len()
    }

    /// Missing file yields empty state. An unreadable or malformed file is
    /// fatal unless `reset` is set, in which case whatever was saved is
    /// discarded.
    pub fn load(path: &Path, reset: bool) -> Result<Self> {
        if reset {
            let mut state = Self::read(path).unwrap_or_default();
            let dropped = state.reset();
            tracing::info!(dropped, path = %path.display(), "saved state discarded");
            return Ok(state);
        }
        let mut state = Self::read(path)?;
        let repaired = state.normalize();
        if repaired > 0 {
            tracing::warn!(repaired, path = %path.display(), "keys were both done and failed; kept as done");
        }
        Ok(state)
    }

    fn read(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let corrupt = |reason: String| SyncError::StateCorrupt {
            path: path.to_path_buf(),
            reason,
        };
        let raw = fs::read_to_string(path).map_err(|err| corrupt(err.to_string()))?;
        serde_json::from_str(&raw).map_err(|err| corrupt(err.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        write_atomic(path, format!("{data}\n").as_bytes())
            .with_context(|| format!("failed to checkpoint {}", path.display()))
    }
}
