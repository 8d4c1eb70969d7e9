use anyhow::Result;

use crate::archive::catalog::Catalog;
use crate::archive::month::MonthKey;
use crate::archive::reconcile::{ReconcileOutcome, reconcile};
use crate::archive::state::ScrapeState;
use crate::archive::util::RunLock;
use crate::commands::{CommandReport, MonthWindow, Workspace, audit_report, window_label};

#[derive(Debug, Clone, Default)]
pub struct PrepareSyncOptions {
    pub window: MonthWindow,
}

/// Exits with issues (code 1) when at least one catalogued item is missing,
/// so a wrapper knows to run the scraper next.
pub fn run(ws: &Workspace, opts: &PrepareSyncOptions) -> Result<CommandReport> {
    let _lock = RunLock::acquire(&ws.paths.lock_file())?;
    let current = MonthKey::current();
    let months = opts.window.resolve(current.prev(), current)?;
    let catalog = Catalog::load(&ws.paths.catalog_file)?;
    let mut state = ScrapeState::load(&ws.paths.state_file, false)?;

    let mut report = CommandReport::new("prepare-sync");
    let outcome = prepare(ws, &catalog, &months, current, &mut state, &mut report)?;
    for (month, ids) in outcome.missing_by_month() {
        report.issue(format!("{month}: {} missing: {}", ids.len(), ids.join(", ")));
    }
    audit_report(ws, &report)?;
    Ok(report)
}

/// Reconcile `state` for `months` and checkpoint it.
pub fn prepare(
    ws: &Workspace,
    catalog: &Catalog,
    months: &[MonthKey],
    current: MonthKey,
    state: &mut ScrapeState,
    report: &mut CommandReport,
) -> Result<ReconcileOutcome> {
    report.detail(format!("reconcile_window={}", window_label(months)));
    report.detail(format!("wallpaper_dir={}", ws.paths.wallpaper_dir.display()));

    let outcome = reconcile(catalog, months, &ws.inventory(), state, current);
    state.save(&ws.paths.state_file)?;

    for month in &outcome.months_completed {
        report.detail(format!("{month}: all present, marked complete"));
    }
    for month in &outcome.months_reopened {
        report.detail(format!("{month}: reopened"));
    }
    if outcome.missing.is_empty() {
        report.detail(format!(
            "all {} catalog image(s) already present; nothing to download",
            outcome.present.len()
        ));
    } else {
        report.detail(format!(
            "present={} missing={}",
            outcome.present.len(),
            outcome.missing.len()
        ));
    }
    Ok(outcome)
}
