pub mod catalog;
pub mod prepare_sync;
pub mod scrape;
pub mod status;
pub mod sync;

use crate::archive::audit;
use crate::archive::config::{SyncConfig, load_config};
use crate::archive::http::Endpoints;
use crate::archive::inventory::DiskInventory;
use crate::archive::month::{MonthKey, month_range};
use crate::archive::paths::{PathOverrides, SyncPaths, resolve_paths};
use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn merge(&mut self, mut other: CommandReport) {
        self.ok &= other.ok;
        self.details.append(&mut other.details);
        self.issues.append(&mut other.issues);
    }
}

/// Resolved paths and effective configuration shared by every command.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub paths: SyncPaths,
    pub config: SyncConfig,
}

impl Workspace {
    pub fn load(overrides: &PathOverrides) -> Result<Self> {
        Ok(Self {
            paths: resolve_paths(overrides)?,
            config: load_config()?,
        })
    }

    pub fn inventory(&self) -> DiskInventory {
        DiskInventory::new(
            &self.paths.wallpaper_dir,
            &self.config.inventory.sorted_subdir,
            self.config.download.min_file_size,
        )
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::from_sync_config(&self.config)
    }
}

/// `--start`/`--end` as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct MonthWindow {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl MonthWindow {
    /// Months from start to end inclusive. Unparseable keys are fatal; a start
    /// after the end is an empty window.
    pub fn resolve(&self, default_start: MonthKey, current: MonthKey) -> Result<Vec<MonthKey>> {
        let start = match &self.start {
            Some(raw) => raw.parse::<MonthKey>()?,
            None => default_start,
        };
        let end = match &self.end {
            Some(raw) => raw.parse::<MonthKey>()?,
            None => current,
        };
        Ok(month_range(start, end))
    }
}

/// One audit line per command run: `ok` or `issues`, with the issue count.
pub fn audit_report(ws: &Workspace, report: &CommandReport) -> Result<()> {
    let status = if report.ok { "ok" } else { "issues" };
    let message = format!(
        "details={} issues={}",
        report.details.len(),
        report.issues.len()
    );
    audit::append_event(&ws.paths, &report.command, status, &message)
}

pub fn window_label(months: &[MonthKey]) -> String {
    match (months.first(), months.last()) {
        (Some(first), Some(last)) => format!("{first}..{last} ({} months)", months.len()),
        _ => "empty".to_string(),
    }
}
