use anyhow::Result;
use chrono::{Local, NaiveDate};

use crate::archive::catalog::Catalog;
use crate::archive::http::{ClientConfig, HttpRemote, Remote};
use crate::archive::month::MonthKey;
use crate::archive::refresh::refresh_catalog;
use crate::archive::util::RunLock;
use crate::commands::{CommandReport, MonthWindow, Workspace, audit_report, window_label};

#[derive(Debug, Clone, Default)]
pub struct CatalogOptions {
    pub window: MonthWindow,
    pub force: bool,
}

pub fn run(ws: &Workspace, opts: &CatalogOptions) -> Result<CommandReport> {
    let _lock = RunLock::acquire(&ws.paths.lock_file())?;
    let remote = HttpRemote::new(ClientConfig::from_sync_config(&ws.config))?;
    let today = Local::now().date_naive();
    let current = MonthKey::containing(today);
    let months = opts.window.resolve(current.prev(), current)?;

    let mut report = CommandReport::new("catalog");
    refresh(ws, &remote, &months, opts.force, today, &mut report)?;
    audit_report(ws, &report)?;
    Ok(report)
}

/// Load the catalog, re-index `months` into it and save it if anything changed.
pub fn refresh(
    ws: &Workspace,
    remote: &dyn Remote,
    months: &[MonthKey],
    force: bool,
    today: NaiveDate,
    report: &mut CommandReport,
) -> Result<Catalog> {
    let mut catalog = Catalog::load(&ws.paths.catalog_file)?;
    report.detail(format!("catalog_file={}", ws.paths.catalog_file.display()));
    report.detail(format!("catalog_window={}", window_label(months)));
    if months.is_empty() {
        report.detail("nothing to do: empty month window");
        return Ok(catalog);
    }

    let summary = refresh_catalog(remote, &ws.endpoints(), &mut catalog, months, force, today);
    for (month, count) in &summary.refreshed {
        report.detail(format!("{month}: {count} entries"));
    }
    for month in &summary.skipped {
        report.detail(format!("{month}: already catalogued, skipped"));
    }
    for month in &summary.untouched {
        report.detail(format!("{month}: no items listed, left untouched"));
    }
    for (month, anomaly) in &summary.anomalies {
        report.detail(format!("{month}: warning: {anomaly}"));
    }
    if summary.has_failures() {
        for month in &summary.unavailable {
            report.issue(format!("{month}: archive index unavailable"));
        }
        for (month, reason) in &summary.rejected {
            report.issue(format!("{month}: listing rejected: {reason}"));
        }
        report.detail("failed months keep their previous rows; rerun to retry");
    }

    if !summary.refreshed.is_empty() {
        catalog.save(&ws.paths.catalog_file)?;
        report.detail(format!(
            "catalog saved: {} entries across {} months (replaced {})",
            catalog.len(),
            catalog.months().len(),
            summary.purged
        ));
    }
    Ok(catalog)
}
