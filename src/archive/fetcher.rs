use crate::archive::config::{DownloadConfig, Strategy};
use crate::archive::http::{Endpoints, FetchError, Purpose, Remote};
use crate::archive::indexer::parse_detail_page;
use crate::archive::month::MonthKey;
use crate::archive::util::sibling_temp_file;
use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use thiserror::Error;

const JPEG_MAGIC: [u8; 2] = [0xFF, 0xD8];

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("payload from {url} is {bytes} bytes, below the {min} byte minimum")]
    TooSmall { url: String, bytes: u64, min: u64 },
    #[error("payload from {url} does not start with a JPEG signature")]
    BadSignature { url: String },
    #[error("no resolution-tagged link on detail page {0}")]
    NoDetailLink(String),
    #[error("i/o error while saving {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: io::Error,
    },
}

/// Acceptance rules for a downloaded payload.
#[derive(Debug, Clone, Copy)]
pub struct Validation {
    pub min_size: u64,
    pub require_jpeg: bool,
}

/// Stream `url` into a sibling temp file of `dest` and rename it into place
/// only when the payload passes `rules`. On any failure nothing is left at
/// `dest` from this attempt.
pub fn download_validated(
    remote: &dyn Remote,
    url: &str,
    dest: &Path,
    rules: Validation,
) -> Result<u64, DownloadError> {
    let io_err = |source: io::Error| DownloadError::Io {
        url: url.to_string(),
        source,
    };

    let Some(mut body) = remote.fetch(url, Purpose::Download)? else {
        return Err(DownloadError::NotFound(url.to_string()));
    };
    let mut tmp = sibling_temp_file(dest).map_err(|err| io_err(io::Error::other(err.to_string())))?;
    let bytes = io::copy(&mut body, tmp.as_file_mut()).map_err(|source| {
        DownloadError::Fetch(FetchError::Body {
            url: url.to_string(),
            source,
        })
    })?;

    if bytes < rules.min_size {
        return Err(DownloadError::TooSmall {
            url: url.to_string(),
            bytes,
            min: rules.min_size,
        });
    }
    if rules.require_jpeg {
        let file = tmp.as_file_mut();
        file.seek(SeekFrom::Start(0)).map_err(io_err)?;
        let mut magic = [0u8; 2];
        let read = file.read(&mut magic).map_err(io_err)?;
        if read < 2 || magic != JPEG_MAGIC {
            return Err(DownloadError::BadSignature {
                url: url.to_string(),
            });
        }
    }

    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(dest).map_err(|err| io_err(err.error))?;
    Ok(bytes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Detail,
    Cdn,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Detail => "detail",
            Self::Cdn => "cdn",
        }
    }
}

#[derive(Debug)]
pub enum ItemOutcome {
    Downloaded { bytes: u64, source: Source },
    Failed { errors: Vec<DownloadError> },
}

/// Retrieves one archived item through the configured source chain.
pub struct Downloader<'a> {
    remote: &'a dyn Remote,
    endpoints: &'a Endpoints,
    config: &'a DownloadConfig,
}

impl<'a> Downloader<'a> {
    pub fn new(remote: &'a dyn Remote, endpoints: &'a Endpoints, config: &'a DownloadConfig) -> Self {
        Self {
            remote,
            endpoints,
            config,
        }
    }

    fn from_cdn(&self, month: MonthKey, item_id: &str, dest: &Path) -> Result<u64, DownloadError> {
        let url = self.endpoints.direct_url(month, item_id);
        download_validated(
            self.remote,
            &url,
            dest,
            Validation {
                min_size: self.config.min_file_size,
                require_jpeg: true,
            },
        )
    }

    fn detail_link(&self, item_id: &str) -> Result<String, DownloadError> {
        let url = self.endpoints.detail_url(item_id);
        let Some(html) = self.remote.fetch_text(&url)? else {
            return Err(DownloadError::NotFound(url));
        };
        parse_detail_page(
            &html,
            &self.config.resolution_preference,
            &self.endpoints.base_url,
        )
        .ok_or(DownloadError::NoDetailLink(url))
    }

    fn from_link(&self, link: &str, dest: &Path) -> Result<u64, DownloadError> {
        download_validated(
            self.remote,
            link,
            dest,
            Validation {
                min_size: self.config.min_file_size,
                require_jpeg: false,
            },
        )
    }

    pub fn fetch_item(&self, month: MonthKey, item_id: &str, dest: &Path) -> ItemOutcome {
        let mut errors = Vec::new();

        if self.config.direct_only || self.config.strategy == Strategy::CdnFirst {
            match self.from_cdn(month, item_id, dest) {
                Ok(bytes) => {
                    return ItemOutcome::Downloaded {
                        bytes,
                        source: Source::Cdn,
                    };
                }
                Err(err) => errors.push(err),
            }
            if self.config.direct_only {
                return self.fail(dest, errors);
            }
            let fallback = self
                .detail_link(item_id)
                .and_then(|link| self.from_link(&link, dest));
            return match fallback {
                Ok(bytes) => ItemOutcome::Downloaded {
                    bytes,
                    source: Source::Detail,
                },
                Err(err) => {
                    errors.push(err);
                    self.fail(dest, errors)
                }
            };
        }

        match self.detail_link(item_id) {
            Ok(link) => match self.from_link(&link, dest) {
                Ok(bytes) => ItemOutcome::Downloaded {
                    bytes,
                    source: Source::Detail,
                },
                Err(err) => {
                    errors.push(err);
                    self.fail(dest, errors)
                }
            },
            // No usable link on the detail page: the CDN copy is the fallback.
            Err(err) => {
                errors.push(err);
                match self.from_cdn(month, item_id, dest) {
                    Ok(bytes) => ItemOutcome::Downloaded {
                        bytes,
                        source: Source::Cdn,
                    },
                    Err(err) => {
                        errors.push(err);
                        self.fail(dest, errors)
                    }
                }
            }
        }
    }

    /// Any file at `dest` at this point is a leftover below the size floor.
    fn fail(&self, dest: &Path, errors: Vec<DownloadError>) -> ItemOutcome {
        if dest.is_file() {
            let _ = fs::remove_file(dest);
        }
        ItemOutcome::Failed { errors }
    }
}
