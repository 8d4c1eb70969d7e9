use crate::archive::catalog::Catalog;
use crate::archive::dates::{assign_dates, listing_length_anomaly};
use crate::archive::http::{Endpoints, Remote};
use crate::archive::indexer::{MonthListing, fetch_listing};
use crate::archive::month::MonthKey;
use crate::archive::warn::{self, WarnEvent};
use chrono::NaiveDate;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: Vec<(MonthKey, usize)>,
    pub skipped: Vec<MonthKey>,
    pub untouched: Vec<MonthKey>,
    pub unavailable: Vec<MonthKey>,
    pub rejected: Vec<(MonthKey, String)>,
    pub anomalies: Vec<(MonthKey, String)>,
    pub purged: usize,
}

impl RefreshSummary {
    pub fn has_failures(&self) -> bool {
        !self.unavailable.is_empty() || !self.rejected.is_empty()
    }
}

/// Re-index `months` into `catalog`. Past months that already have rows are
/// skipped unless `force`; the current month is always re-fetched. A month
/// whose listing yields no ids keeps whatever rows it had.
pub fn refresh_catalog(
    remote: &dyn Remote,
    endpoints: &Endpoints,
    catalog: &mut Catalog,
    months: &[MonthKey],
    force: bool,
    today: NaiveDate,
) -> RefreshSummary {
    let current = MonthKey::containing(today);
    let mut summary = RefreshSummary::default();

    for month in months.iter().copied() {
        let existing = catalog.month_count(month);
        if existing > 0 && !force && month < current {
            tracing::info!(%month, entries = existing, "already in catalog, skipping");
            summary.skipped.push(month);
            continue;
        }

        let ids = match fetch_listing(remote, endpoints, month) {
            MonthListing::Listed(ids) => ids,
            MonthListing::Unavailable(_) => {
                summary.unavailable.push(month);
                continue;
            }
            MonthListing::Empty | MonthListing::NotPublished => {
                tracing::info!(%month, "no items listed, catalog untouched");
                summary.untouched.push(month);
                continue;
            }
        };

        if let Some(anomaly) = listing_length_anomaly(month, ids.len(), today) {
            warn::emit(&WarnEvent {
                code: "LISTING_LENGTH",
                stage: "catalog",
                action: "keep",
                month: &month.to_string(),
                item: "",
                reason: "count-mismatch",
                err: &anomaly,
            });
            summary.anomalies.push((month, anomaly));
        }

        match assign_dates(month, &ids) {
            Ok(records) => {
                let count = records.len();
                summary.purged += catalog.replace_month(month, records);
                tracing::info!(%month, entries = count, "catalogued");
                summary.refreshed.push((month, count));
            }
            Err(err) => {
                warn::emit(&WarnEvent {
                    code: "DATE_ANOMALY",
                    stage: "catalog",
                    action: "skip-month",
                    month: &month.to_string(),
                    item: "",
                    reason: err.code().as_str(),
                    err: &err.to_string(),
                });
                summary.rejected.push((month, err.to_string()));
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::config::SyncConfig;
    use crate::archive::http::fake::FakeRemote;

    fn mk(raw: &str) -> MonthKey {
        raw.parse().expect("month")
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 2).expect("date")
    }

    fn index_html(ids: &[String]) -> String {
        let links: String = ids
            .iter()
            .map(|id| format!(r#"<a href="/detail/us/{id}">{id}</a>"#))
            .collect();
        format!("<html><body>{links}</body></html>")
    }

    fn listing(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{}", n - i)).collect()
    }

    #[test]
    fn past_months_are_skipped_unless_forced() {
        let endpoints = Endpoints::from_sync_config(&SyncConfig::default());
        let feb = mk("202502");
        let remote = FakeRemote::new().with(&endpoints.index_url(feb), index_html(&listing("F", 28)));
        let mut catalog = Catalog::default();

        let first = refresh_catalog(&remote, &endpoints, &mut catalog, &[feb], false, today());
        assert_eq!(first.refreshed, vec![(feb, 28)]);
        assert!(first.anomalies.is_empty());

        let second = refresh_catalog(&remote, &endpoints, &mut catalog, &[feb], false, today());
        assert_eq!(second.skipped, vec![feb]);

        let forced = refresh_catalog(&remote, &endpoints, &mut catalog, &[feb], true, today());
        assert_eq!(forced.refreshed, vec![(feb, 28)]);
        assert_eq!(forced.purged, 28);
        assert_eq!(catalog.month_count(feb), 28);
    }

    #[test]
    fn current_month_is_always_refetched() {
        let endpoints = Endpoints::from_sync_config(&SyncConfig::default());
        let mar = mk("202503");
        let remote = FakeRemote::new().with(&endpoints.index_url(mar), index_html(&listing("M", 2)));
        let mut catalog = Catalog::default();

        refresh_catalog(&remote, &endpoints, &mut catalog, &[mar], false, today());
        let again = refresh_catalog(&remote, &endpoints, &mut catalog, &[mar], false, today());
        assert_eq!(again.refreshed, vec![(mar, 2)]);
        assert_eq!(catalog.month_count(mar), 2);
    }

    #[test]
    fn empty_listing_keeps_existing_rows() {
        let endpoints = Endpoints::from_sync_config(&SyncConfig::default());
        let mar = mk("202503");
        let good = FakeRemote::new().with(&endpoints.index_url(mar), index_html(&listing("M", 2)));
        let mut catalog = Catalog::default();
        refresh_catalog(&good, &endpoints, &mut catalog, &[mar], false, today());

        let empty = FakeRemote::new().with(&endpoints.index_url(mar), "<html></html>");
        let summary = refresh_catalog(&empty, &endpoints, &mut catalog, &[mar], false, today());
        assert_eq!(summary.untouched, vec![mar]);
        assert_eq!(catalog.month_count(mar), 2);
    }

    #[test]
    fn short_past_listing_is_flagged_but_kept() {
        let endpoints = Endpoints::from_sync_config(&SyncConfig::default());
        let jan = mk("202501");
        let remote = FakeRemote::new().with(&endpoints.index_url(jan), index_html(&listing("J", 30)));
        let mut catalog = Catalog::default();

        let summary = refresh_catalog(&remote, &endpoints, &mut catalog, &[jan], false, today());
        assert_eq!(summary.anomalies.len(), 1);
        assert_eq!(catalog.month_count(jan), 30);
        assert!(!summary.has_failures());
    }

    #[test]
    fn overlong_listing_is_rejected() {
        let endpoints = Endpoints::from_sync_config(&SyncConfig::default());
        let feb = mk("202502");
        let remote = FakeRemote::new().with(&endpoints.index_url(feb), index_html(&listing("F", 29)));
        let mut catalog = Catalog::default();

        let summary = refresh_catalog(&remote, &endpoints, &mut catalog, &[feb], false, today());
        assert_eq!(summary.rejected.len(), 1);
        assert_eq!(catalog.month_count(feb), 0);
        assert!(summary.has_failures());
    }

    #[test]
    fn unavailable_month_is_reported() {
        let endpoints = Endpoints::from_sync_config(&SyncConfig::default());
        let feb = mk("202502");
        let remote = FakeRemote::new().down(&endpoints.index_url(feb));
        let mut catalog = Catalog::default();

        let summary = refresh_catalog(&remote, &endpoints, &mut catalog, &[feb], false, today());
        assert_eq!(summary.unavailable, vec![feb]);
        assert!(summary.has_failures());
    }
}
