use crate::archive::config::SyncConfig;
use crate::archive::month::MonthKey;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use std::cell::Cell;
use std::fmt;
use std::io::Read;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// What a request is for; selects the timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Page,
    Download,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed after {attempts} attempt(s): {reason}")]
    Exhausted {
        url: String,
        attempts: u32,
        reason: String,
    },
    #[error("failed to read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Body = Box<dyn Read>;

/// Read-only access to the remote archive. `Ok(None)` means not found.
pub trait Remote {
    fn fetch(&self, url: &str, purpose: Purpose) -> Result<Option<Body>, FetchError>;

    /// Fetch a whole page as text.
    fn fetch_text(&self, url: &str) -> Result<Option<String>, FetchError> {
        let Some(mut body) = self.fetch(url, Purpose::Page)? else {
            return Ok(None);
        };
        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes)
            .map_err(|source| FetchError::Body {
                url: url.to_string(),
                source,
            })?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

/// Bounded retry with exponential backoff: `base * 2^attempt` between tries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last: E,
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }

    pub fn run<T, E: fmt::Display>(
        &self,
        label: &str,
        mut op: impl FnMut() -> Result<T, E>,
    ) -> Result<T, RetryExhausted<E>> {
        let max = self.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= max {
                        return Err(RetryExhausted {
                            attempts: attempt,
                            last: err,
                        });
                    }
                    let wait = self.backoff(attempt - 1);
                    tracing::debug!(
                        request = label,
                        attempt,
                        max,
                        wait_ms = wait.as_millis() as u64,
                        "retrying: {err}"
                    );
                    thread::sleep(wait);
                }
            }
        }
    }
}

/// Explicit HTTP session settings, built once and passed to every operation.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub user_agent: String,
    pub referer: String,
    pub page_timeout: Duration,
    pub download_timeout: Duration,
    pub delay: Duration,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn from_sync_config(cfg: &SyncConfig) -> Self {
        Self {
            user_agent: cfg.remote.user_agent.clone(),
            referer: format!("{}/", cfg.remote.base_url.trim_end_matches('/')),
            page_timeout: Duration::from_secs(cfg.http.page_timeout_secs),
            download_timeout: Duration::from_secs(cfg.http.download_timeout_secs),
            delay: Duration::from_millis(cfg.http.delay_ms),
            retry: RetryPolicy {
                max_attempts: cfg.http.max_attempts,
                base_delay: Duration::from_millis(cfg.http.backoff_base_ms),
            },
        }
    }
}

/// Spaces consecutive requests at least `delay` apart.
#[derive(Debug)]
pub struct Throttle {
    delay: Duration,
    last: Cell<Option<Instant>>,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: Cell::new(None),
        }
    }

    pub fn wait(&self) {
        if let Some(last) = self.last.get() {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                thread::sleep(self.delay - elapsed);
            }
        }
        self.last.set(Some(Instant::now()));
    }
}

pub struct HttpRemote {
    client: Client,
    config: ClientConfig,
    throttle: Throttle,
}

impl HttpRemote {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("invalid user agent header")?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(
            REFERER,
            HeaderValue::from_str(&config.referer).context("invalid referer header")?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to build http client")?;
        let throttle = Throttle::new(config.delay);
        Ok(Self {
            client,
            config,
            throttle,
        })
    }

    fn send(&self, url: &str, timeout: Duration) -> Result<Option<Response>, String> {
        self.throttle.wait();
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|err| err.to_string())?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(format!("http status {status}"));
        }
        Ok(Some(response))
    }

    fn exhausted(url: &str, exhausted: RetryExhausted<String>) -> FetchError {
        FetchError::Exhausted {
            url: url.to_string(),
            attempts: exhausted.attempts,
            reason: exhausted.last,
        }
    }
}

impl Remote for HttpRemote {
    fn fetch(&self, url: &str, purpose: Purpose) -> Result<Option<Body>, FetchError> {
        let timeout = match purpose {
            Purpose::Page => self.config.page_timeout,
            Purpose::Download => self.config.download_timeout,
        };
        self.config
            .retry
            .run(url, || {
                self.send(url, timeout)
                    .map(|found| found.map(|response| Box::new(response) as Body))
            })
            .map_err(|exhausted| Self::exhausted(url, exhausted))
    }

    /// Pages are small, so the body is read inside the retry loop and a
    /// connection dropped mid-body counts as a failed attempt.
    fn fetch_text(&self, url: &str) -> Result<Option<String>, FetchError> {
        self.config
            .retry
            .run(url, || match self.send(url, self.config.page_timeout)? {
                Some(response) => response.text().map(Some).map_err(|err| err.to_string()),
                None => Ok(None),
            })
            .map_err(|exhausted| Self::exhausted(url, exhausted))
    }
}

/// URL layout of the archive host and its CDN.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub base_url: String,
    pub cdn_base: String,
    pub market: String,
}

impl Endpoints {
    pub fn from_sync_config(cfg: &SyncConfig) -> Self {
        Self {
            base_url: cfg.remote.base_url.trim_end_matches('/').to_string(),
            cdn_base: cfg.remote.cdn_base.trim_end_matches('/').to_string(),
            market: cfg.remote.market.clone(),
        }
    }

    pub fn index_url(&self, month: MonthKey) -> String {
        format!("{}/archive/{}/{month}", self.base_url, self.market)
    }

    pub fn detail_url(&self, item_id: &str) -> String {
        format!("{}/detail/{}/{item_id}", self.base_url, self.market)
    }

    pub fn detail_prefix(&self) -> String {
        format!("/detail/{}/", self.market)
    }

    pub fn direct_url(&self, month: MonthKey, item_id: &str) -> String {
        format!("{}/{month}/{item_id}.jpg", self.cdn_base)
    }
}
