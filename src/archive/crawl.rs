use crate::archive::config::DownloadConfig;
use crate::archive::fetcher::{Downloader, ItemOutcome};
use crate::archive::http::{Endpoints, Remote};
use crate::archive::indexer::{MonthListing, fetch_listing};
use crate::archive::inventory::DiskInventory;
use crate::archive::month::{MonthKey, item_filename, item_key};
use crate::archive::state::ScrapeState;
use crate::archive::warn::{self, WarnEvent};
use anyhow::Result;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub months_planned: usize,
    pub months_already_complete: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
    pub unavailable_months: Vec<MonthKey>,
    pub empty_months: Vec<MonthKey>,
}

impl CrawlSummary {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty() || !self.unavailable_months.is_empty() || !self.empty_months.is_empty()
    }
}

/// Everything one crawl run needs besides the state it mutates.
pub struct Crawler<'a> {
    pub remote: &'a dyn Remote,
    pub endpoints: &'a Endpoints,
    pub download: &'a DownloadConfig,
    pub inventory: &'a DiskInventory,
    pub state_file: &'a Path,
    pub current: MonthKey,
}

enum ItemStep {
    Skipped,
    Downloaded,
    Failed,
}

impl Crawler<'_> {
    /// Walk `months` in the given order. Complete months are skipped; every
    /// other month is listed, its items fetched, and the state checkpointed.
    pub fn run(&self, months: &[MonthKey], state: &mut ScrapeState) -> Result<CrawlSummary> {
        let mut summary = CrawlSummary {
            months_planned: months.len(),
            ..CrawlSummary::default()
        };
        let total = months.len();

        for (index, month) in months.iter().copied().enumerate() {
            let position = index + 1;
            if state.is_month_complete(month) {
                tracing::info!(%month, "[{position}/{total}] already complete");
                summary.months_already_complete += 1;
                continue;
            }

            match fetch_listing(self.remote, self.endpoints, month) {
                MonthListing::Listed(ids) => {
                    tracing::info!(%month, items = ids.len(), "[{position}/{total}] listed");
                    self.crawl_month(month, &ids, state, &mut summary);
                }
                MonthListing::NotPublished => {
                    if month < self.current {
                        warn::emit(&WarnEvent {
                            code: "MONTH_NOT_PUBLISHED",
                            stage: "crawl",
                            action: "mark-complete",
                            month: &month.to_string(),
                            item: "",
                            reason: "index-404",
                            err: "",
                        });
                        state.mark_month_complete(month);
                    } else {
                        tracing::info!(%month, "[{position}/{total}] not published yet");
                    }
                }
                MonthListing::Empty => {
                    if month < self.current {
                        warn::emit(&WarnEvent {
                            code: "EMPTY_LISTING",
                            stage: "crawl",
                            action: "leave-incomplete",
                            month: &month.to_string(),
                            item: "",
                            reason: "no-item-links",
                            err: "",
                        });
                        summary.empty_months.push(month);
                    } else {
                        tracing::info!(%month, "[{position}/{total}] no items yet");
                    }
                }
                MonthListing::Unavailable(_) => summary.unavailable_months.push(month),
            }

            state.save(self.state_file)?;
        }

        tracing::info!(
            downloaded = summary.downloaded,
            skipped = summary.skipped,
            failed = summary.failed.len(),
            "crawl finished"
        );
        Ok(summary)
    }

    fn crawl_month(
        &self,
        month: MonthKey,
        ids: &[String],
        state: &mut ScrapeState,
        summary: &mut CrawlSummary,
    ) {
        let downloader = Downloader::new(self.remote, self.endpoints, self.download);
        let mut all_present = true;

        for (index, item_id) in ids.iter().enumerate() {
            let tag = format!("[{:>2}/{}] {item_id}", index + 1, ids.len());
            match self.crawl_item(&downloader, month, item_id, state) {
                ItemStep::Skipped => summary.skipped += 1,
                ItemStep::Downloaded => summary.downloaded += 1,
                ItemStep::Failed => {
                    tracing::info!(%month, "{tag} FAILED");
                    summary.failed.push(item_key(month, item_id));
                    all_present = false;
                }
            }
        }

        if all_present && month != self.current {
            state.mark_month_complete(month);
        } else {
            state.mark_month_incomplete(month);
        }
    }

    fn crawl_item(
        &self,
        downloader: &Downloader<'_>,
        month: MonthKey,
        item_id: &str,
        state: &mut ScrapeState,
    ) -> ItemStep {
        let key = item_key(month, item_id);
        let filename = item_filename(month, item_id);

        if self.inventory.is_present(&filename) {
            tracing::debug!(item = %key, "skip (on disk)");
            state.mark_present(&key);
            return ItemStep::Skipped;
        }
        if state.is_done(&key) {
            tracing::debug!(item = %key, "skip (state)");
            return ItemStep::Skipped;
        }

        let dest = self.inventory.download_path(&filename);
        match downloader.fetch_item(month, item_id, &dest) {
            ItemOutcome::Downloaded { bytes, source } => {
                tracing::info!(
                    item = %key,
                    kb = bytes / 1024,
                    source = source.as_str(),
                    "downloaded"
                );
                state.mark_present(&key);
                ItemStep::Downloaded
            }
            ItemOutcome::Failed { errors } => {
                let reasons: Vec<String> = errors.iter().map(ToString::to_string).collect();
                warn::emit(&WarnEvent {
                    code: "DOWNLOAD_FAILED",
                    stage: "download",
                    action: "mark-failed",
                    month: &month.to_string(),
                    item: item_id,
                    reason: "all-sources-failed",
                    err: &reasons.join("; "),
                });
                state.mark_failed(&key);
                ItemStep::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::config::SyncConfig;
    use crate::archive::http::fake::{FakeRemote, jpeg};
    use std::fs;
    use tempfile::tempdir;

    fn mk(raw: &str) -> MonthKey {
        raw.parse().expect("month")
    }

    fn index_html(ids: &[&str]) -> String {
        let links: String = ids
            .iter()
            .map(|id| format!(r#"<a href="/detail/us/{id}">{id}</a>"#))
            .collect();
        format!("<html><body>{links}</body></html>")
    }

    struct Fixture {
        dir: tempfile::TempDir,
        endpoints: Endpoints,
        download: DownloadConfig,
        inventory: DiskInventory,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().expect("tempdir");
            let cfg = SyncConfig::default();
            let mut download = cfg.download.clone();
            download.strategy = crate::archive::config::Strategy::CdnFirst;
            download.direct_only = true;
            download.min_file_size = 1_000;
            let inventory =
                DiskInventory::new(&dir.path().join("walls"), "high", download.min_file_size);
            Self {
                endpoints: Endpoints::from_sync_config(&cfg),
                download,
                inventory,
                dir,
            }
        }

        fn state_file(&self) -> std::path::PathBuf {
            self.dir.path().join("scrape_state.json")
        }

        fn crawler<'a>(&'a self, remote: &'a FakeRemote, state_file: &'a Path, current: &str) -> Crawler<'a> {
            Crawler {
                remote,
                endpoints: &self.endpoints,
                download: &self.download,
                inventory: &self.inventory,
                state_file,
                current: mk(current),
            }
        }
    }

    #[test]
    fn downloads_items_and_completes_past_month() {
        let fx = Fixture::new();
        let jan = mk("202501");
        let remote = FakeRemote::new()
            .with(&fx.endpoints.index_url(jan), index_html(&["B", "A"]))
            .with(&fx.endpoints.direct_url(jan, "A"), jpeg(2_000))
            .with(&fx.endpoints.direct_url(jan, "B"), jpeg(3_000));
        let state_file = fx.state_file();
        let mut state = ScrapeState::default();

        let summary = fx
            .crawler(&remote, &state_file, "202503")
            .run(&[jan], &mut state)
            .expect("crawl");

        assert_eq!(summary.downloaded, 2);
        assert!(!summary.has_failures());
        assert!(state.is_month_complete(jan));
        assert!(state.is_done("202501/A"));
        assert!(fx.inventory.is_present("202501_B.jpg"));
        assert_eq!(ScrapeState::load(&state_file, false).expect("checkpoint"), state);
    }

    #[test]
    fn file_on_disk_short_circuits_the_network() {
        let fx = Fixture::new();
        let jan = mk("202501");
        fs::create_dir_all(fx.dir.path().join("walls/high")).expect("mkdir");
        fs::write(fx.dir.path().join("walls/high/202501_A.jpg"), jpeg(1_500)).expect("write");
        let remote = FakeRemote::new().with(&fx.endpoints.index_url(jan), index_html(&["A"]));
        let state_file = fx.state_file();
        let mut state = ScrapeState::default();
        state.mark_failed("202501/A");

        let summary = fx
            .crawler(&remote, &state_file, "202503")
            .run(&[jan], &mut state)
            .expect("crawl");

        assert_eq!(summary.skipped, 1);
        assert!(!remote.requested(&fx.endpoints.direct_url(jan, "A")));
        assert!(state.is_done("202501/A"));
        assert!(state.failed_images.is_empty());
    }

    #[test]
    fn failed_item_keeps_month_open_and_leaves_no_file() {
        let fx = Fixture::new();
        let jan = mk("202501");
        let remote = FakeRemote::new()
            .with(&fx.endpoints.index_url(jan), index_html(&["B", "A"]))
            .with(&fx.endpoints.direct_url(jan, "A"), jpeg(2_000))
            .with(&fx.endpoints.direct_url(jan, "B"), jpeg(10));
        let state_file = fx.state_file();
        let mut state = ScrapeState::default();

        let summary = fx
            .crawler(&remote, &state_file, "202503")
            .run(&[jan], &mut state)
            .expect("crawl");

        assert_eq!(summary.failed, vec!["202501/B".to_string()]);
        assert!(!state.is_month_complete(jan));
        assert!(state.failed_images.contains("202501/B"));
        assert!(!state.done_images.contains("202501/B"));
        assert!(!fx.dir.path().join("walls/202501_B.jpg").exists());
    }

    #[test]
    fn current_month_stays_open_even_when_complete() {
        let fx = Fixture::new();
        let mar = mk("202503");
        let remote = FakeRemote::new()
            .with(&fx.endpoints.index_url(mar), index_html(&["A"]))
            .with(&fx.endpoints.direct_url(mar, "A"), jpeg(2_000));
        let state_file = fx.state_file();
        let mut state = ScrapeState::default();

        fx.crawler(&remote, &state_file, "202503")
            .run(&[mar], &mut state)
            .expect("crawl");
        assert!(state.is_done("202503/A"));
        assert!(!state.is_month_complete(mar));
    }

    #[test]
    fn listing_outcomes_drive_month_flags() {
        let fx = Fixture::new();
        let (oct, nov, dec) = (mk("202410"), mk("202411"), mk("202412"));
        let remote = FakeRemote::new()
            .with(&fx.endpoints.index_url(nov), "<html><body></body></html>")
            .down(&fx.endpoints.index_url(dec));
        let state_file = fx.state_file();
        let mut state = ScrapeState::default();

        let summary = fx
            .crawler(&remote, &state_file, "202503")
            .run(&[oct, nov, dec], &mut state)
            .expect("crawl");

        assert!(state.is_month_complete(oct));
        assert!(!state.is_month_complete(nov));
        assert!(!state.is_month_complete(dec));
        assert_eq!(summary.empty_months, vec![nov]);
        assert_eq!(summary.unavailable_months, vec![dec]);
        assert!(summary.has_failures());
    }

    #[test]
    fn complete_months_are_not_fetched() {
        let fx = Fixture::new();
        let jan = mk("202501");
        let remote = FakeRemote::new();
        let state_file = fx.state_file();
        let mut state = ScrapeState::default();
        state.mark_month_complete(jan);

        let summary = fx
            .crawler(&remote, &state_file, "202503")
            .run(&[jan], &mut state)
            .expect("crawl");
        assert_eq!(summary.months_already_complete, 1);
        assert!(remote.requests.borrow().is_empty());
    }
}
