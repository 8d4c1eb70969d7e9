use anyhow::Result;
use chrono::{Local, NaiveDate};

use crate::archive::http::{ClientConfig, HttpRemote, Remote};
use crate::archive::month::MonthKey;
use crate::archive::reconcile::SyncSignal;
use crate::archive::state::ScrapeState;
use crate::archive::util::RunLock;
use crate::commands::{CommandReport, MonthWindow, Workspace, audit_report, catalog, prepare_sync, scrape};

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub window: MonthWindow,
}

pub fn run(ws: &Workspace, opts: &SyncOptions) -> Result<CommandReport> {
    let _lock = RunLock::acquire(&ws.paths.lock_file())?;
    let today = Local::now().date_naive();
    let current = MonthKey::containing(today);
    let months = opts.window.resolve(current.prev(), current)?;
    let remote = HttpRemote::new(ClientConfig::from_sync_config(&ws.config))?;

    let report = execute(ws, &remote, &months, today)?;
    audit_report(ws, &report)?;
    Ok(report)
}

/// Refresh the catalog, reconcile, and crawl only when something is missing.
pub fn execute(
    ws: &Workspace,
    remote: &dyn Remote,
    months: &[MonthKey],
    today: NaiveDate,
) -> Result<CommandReport> {
    let current = MonthKey::containing(today);
    let mut report = CommandReport::new("sync");

    let mut stage = CommandReport::new("catalog");
    let catalog = catalog::refresh(ws, remote, months, false, today, &mut stage)?;
    report.merge(stage);

    let mut state = ScrapeState::load(&ws.paths.state_file, false)?;
    let mut stage = CommandReport::new("prepare-sync");
    let outcome = prepare_sync::prepare(ws, &catalog, months, current, &mut state, &mut stage)?;
    report.merge(stage);

    if outcome.signal() == SyncSignal::NothingToDo {
        report.detail("nothing missing; crawl skipped");
        return Ok(report);
    }

    let mut stage = CommandReport::new("scrape");
    scrape::crawl(ws, remote, months, &mut state, current, &mut stage)?;
    report.merge(stage);
    Ok(report)
}
