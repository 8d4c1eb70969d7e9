use anyhow::Result;

use crate::archive::config::Strategy;
use crate::archive::crawl::Crawler;
use crate::archive::http::{ClientConfig, HttpRemote, Remote};
use crate::archive::month::MonthKey;
use crate::archive::state::ScrapeState;
use crate::archive::util::RunLock;
use crate::commands::{CommandReport, MonthWindow, Workspace, audit_report, window_label};
use crate::error::SyncError;

/// The archive's first published month.
const FIRST_ARCHIVE_MONTH: (i32, u32) = (2009, 6);

#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    pub window: MonthWindow,
    pub delay_secs: Option<f64>,
    pub cdn_first: bool,
    pub direct_only: bool,
    pub reset: bool,
    pub reverse: bool,
}

fn apply_overrides(ws: &Workspace, opts: &ScrapeOptions) -> Result<Workspace, SyncError> {
    let mut ws = ws.clone();
    if let Some(secs) = opts.delay_secs {
        if !secs.is_finite() || secs < 0.0 {
            return Err(SyncError::InvalidConfig(format!(
                "--delay must be a non-negative number of seconds, got {secs}"
            )));
        }
        ws.config.http.delay_ms = (secs * 1_000.0).round() as u64;
    }
    if opts.cdn_first {
        ws.config.download.strategy = Strategy::CdnFirst;
    }
    if opts.direct_only {
        ws.config.download.direct_only = true;
    }
    Ok(ws)
}

pub fn run(ws: &Workspace, opts: &ScrapeOptions) -> Result<CommandReport> {
    let ws = apply_overrides(ws, opts)?;
    let _lock = RunLock::acquire(&ws.paths.lock_file())?;
    let current = MonthKey::current();
    let first = MonthKey::new(FIRST_ARCHIVE_MONTH.0, FIRST_ARCHIVE_MONTH.1)?;
    let mut months = opts.window.resolve(first, current)?;
    if opts.reverse {
        months.reverse();
    }

    let mut state = ScrapeState::load(&ws.paths.state_file, opts.reset)?;
    let remote = HttpRemote::new(ClientConfig::from_sync_config(&ws.config))?;

    let mut report = CommandReport::new("scrape");
    if opts.reset {
        report.detail("saved state ignored (--reset)");
    }
    crawl(&ws, &remote, &months, &mut state, current, &mut report)?;
    audit_report(&ws, &report)?;
    Ok(report)
}

/// Run the crawler over `months` and fold its summary into `report`.
pub fn crawl(
    ws: &Workspace,
    remote: &dyn Remote,
    months: &[MonthKey],
    state: &mut ScrapeState,
    current: MonthKey,
    report: &mut CommandReport,
) -> Result<()> {
    report.detail(format!("crawl_window={}", window_label(months)));
    report.detail(format!("output={}", ws.paths.wallpaper_dir.display()));
    report.detail(format!(
        "strategy={}{}",
        ws.config.download.strategy.as_str(),
        if ws.config.download.direct_only {
            " (direct only)"
        } else {
            ""
        }
    ));
    if months.is_empty() {
        report.detail("nothing to do: empty month window");
        return Ok(());
    }

    let inventory = ws.inventory();
    let endpoints = ws.endpoints();
    let crawler = Crawler {
        remote,
        endpoints: &endpoints,
        download: &ws.config.download,
        inventory: &inventory,
        state_file: &ws.paths.state_file,
        current,
    };
    let summary = crawler.run(months, state)?;

    report.detail(format!(
        "months={} already_complete={} downloaded={} skipped={} failed={}",
        summary.months_planned,
        summary.months_already_complete,
        summary.downloaded,
        summary.skipped,
        summary.failed.len()
    ));
    if !summary.has_failures() {
        return Ok(());
    }
    for key in &summary.failed {
        report.issue(format!("{key}: download failed"));
    }
    for month in &summary.unavailable_months {
        report.issue(format!("{month}: archive index unavailable"));
    }
    for month in &summary.empty_months {
        report.issue(format!("{month}: index listed no items"));
    }
    report.detail(format!(
        "incomplete months stay open in {}; rerun to retry",
        ws.paths.state_file.display()
    ));
    Ok(())
}
