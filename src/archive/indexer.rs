use crate::archive::http::{Endpoints, Remote};
use crate::archive::month::MonthKey;
use crate::archive::warn::{self, WarnEvent};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

/// How a month's index request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthListing {
    /// Ids in page order; position 0 is the most recently published item.
    Listed(Vec<String>),
    /// The page answered but contained no item links.
    Empty,
    /// 404: the month has not been published.
    NotPublished,
    /// Retries exhausted; the month could not be read this run.
    Unavailable(String),
}

static ANCHORS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector is valid"));

/// Item ids linked from an index page, deduplicated on first sighting.
pub fn parse_index_page(html: &str, detail_prefix: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for anchor in document.select(&ANCHORS) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !href.starts_with(detail_prefix) {
            continue;
        }
        let id = href
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .trim();
        if id.is_empty() || href.trim_end_matches('/') == detail_prefix.trim_end_matches('/') {
            continue;
        }
        // Ids end up as catalog rows and file names; one row per line.
        if id.chars().any(char::is_control) {
            continue;
        }
        if seen.insert(id.to_string()) {
            ids.push(id.to_string());
        }
    }
    ids
}

/// First download link carrying the most preferred resolution tag, resolved
/// against `base_url` when relative.
pub fn parse_detail_page(html: &str, preference: &[String], base_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let hrefs: Vec<&str> = document
        .select(&ANCHORS)
        .filter_map(|a| a.value().attr("href"))
        .collect();

    for tag in preference.iter().filter(|t| !t.trim().is_empty()) {
        if let Some(href) = hrefs.iter().find(|href| href.contains(tag.as_str())) {
            return Some(resolve_href(base_url, href));
        }
    }
    None
}

fn resolve_href(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match url::Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(joined) => joined.to_string(),
        Err(_) => href.to_string(),
    }
}

pub fn fetch_listing(remote: &dyn Remote, endpoints: &Endpoints, month: MonthKey) -> MonthListing {
    let url = endpoints.index_url(month);
    match remote.fetch_text(&url) {
        Ok(None) => MonthListing::NotPublished,
        Ok(Some(html)) => {
            let ids = parse_index_page(&html, &endpoints.detail_prefix());
            if ids.is_empty() {
                MonthListing::Empty
            } else {
                MonthListing::Listed(ids)
            }
        }
        Err(err) => {
            warn::emit(&WarnEvent {
                code: "INDEX_UNAVAILABLE",
                stage: "index",
                action: "skip-month",
                month: &month.to_string(),
                item: "",
                reason: "retries-exhausted",
                err: &err.to_string(),
            });
            MonthListing::Unavailable(err.to_string())
        }
    }
}
