use anyhow::Result;
use chrono::{Local, NaiveDate};

use crate::archive::catalog::Catalog;
use crate::archive::config::resolve_config_path;
use crate::archive::state::ScrapeState;
use crate::commands::{CommandReport, Workspace};

pub fn run(ws: &Workspace) -> Result<CommandReport> {
    Ok(snapshot(ws, Local::now().date_naive()))
}

fn snapshot(ws: &Workspace, today: NaiveDate) -> CommandReport {
    let mut report = CommandReport::new("status");
    let paths = &ws.paths;
    let cfg = &ws.config;

    report.detail(format!("home={}", paths.home.display()));
    report.detail(format!("wallpaper_dir={}", paths.wallpaper_dir.display()));
    report.detail(format!("state_file={}", paths.state_file.display()));
    report.detail(format!("catalog_file={}", paths.catalog_file.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    match resolve_config_path() {
        Some(path) if path.exists() => report.detail(format!("config_file={}", path.display())),
        _ => report.detail("config_file=none (defaults)"),
    }

    report.detail(format!("base_url={}", cfg.remote.base_url));
    report.detail(format!("cdn_base={}", cfg.remote.cdn_base));
    report.detail(format!("market={}", cfg.remote.market));
    report.detail(format!("strategy={}", cfg.download.strategy.as_str()));
    report.detail(format!("direct_only={}", cfg.download.direct_only));
    report.detail(format!("delay_ms={}", cfg.http.delay_ms));
    report.detail(format!("max_attempts={}", cfg.http.max_attempts));
    report.detail(format!("min_file_size={}", cfg.download.min_file_size));

    for key in crate::env_loader::unknown_env_keys() {
        report.detail(format!("warning: unrecognised environment variable {key}"));
    }

    if !paths.wallpaper_dir.exists() {
        report.detail("wallpaper dir does not exist yet");
    }

    match ScrapeState::load(&paths.state_file, false) {
        Ok(state) => report.detail(format!(
            "state: done_months={} done_images={} failed_images={}",
            state.done_months.len(),
            state.done_images.len(),
            state.failed_images.len()
        )),
        Err(err) => report.issue(format!("{err:#}")),
    }

    match Catalog::load(&paths.catalog_file) {
        Ok(catalog) => {
            report.detail(format!(
                "catalog: entries={} months={}",
                catalog.len(),
                catalog.months().len()
            ));
            match catalog.find_by_date(today) {
                Some(record) => {
                    let present = ws.inventory().is_present(&record.filename);
                    report.detail(format!(
                        "today={today} item={} file={} present={present}",
                        record.item_id, record.filename
                    ));
                }
                None => report.detail(format!("today={today} not catalogued")),
            }
        }
        Err(err) => report.issue(format!("{err:#}")),
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::config::SyncConfig;
    use crate::archive::dates::assign_dates;
    use crate::archive::month::MonthKey;
    use crate::archive::paths::SyncPaths;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reports_todays_catalog_entry() {
        let tmp = tempdir().expect("tempdir");
        let ws = Workspace {
            paths: SyncPaths::under(tmp.path()),
            config: SyncConfig::default(),
        };
        let mar: MonthKey = "202503".parse().expect("month");
        let mut catalog = Catalog::default();
        catalog.replace_month(
            mar,
            assign_dates(mar, &["B".to_string(), "A".to_string()]).expect("dates"),
        );
        catalog.save(&ws.paths.catalog_file).expect("save");

        let today = NaiveDate::from_ymd_opt(2025, 3, 2).expect("date");
        let report = snapshot(&ws, today);
        assert!(report.ok);
        assert!(
            report
                .details
                .iter()
                .any(|d| d == "today=2025-03-02 item=B file=202503_B.jpg present=false")
        );
    }

    #[test]
    fn unreadable_state_is_an_issue() {
        let tmp = tempdir().expect("tempdir");
        let ws = Workspace {
            paths: SyncPaths::under(tmp.path()),
            config: SyncConfig::default(),
        };
        fs::write(&ws.paths.state_file, "not json").expect("write");
        let report = snapshot(&ws, NaiveDate::from_ymd_opt(2025, 3, 2).expect("date"));
        assert!(!report.ok);
        assert!(report.issues[0].contains("--reset"));
    }
}
