use crate::error::SyncError;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "https://bingwallpaper.anerg.com";
pub const DEFAULT_CDN_BASE: &str = "https://img.nanxiongnandi.com";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub cdn_base: String,
    pub market: String,
    pub user_agent: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cdn_base: DEFAULT_CDN_BASE.to_string(),
            market: "us".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub page_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub delay_ms: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            page_timeout_secs: 30,
            download_timeout_secs: 180,
            delay_ms: 1_000,
            max_attempts: 3,
            backoff_base_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    DetailFirst,
    CdnFirst,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DetailFirst => "detail-first",
            Self::CdnFirst => "cdn-first",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "detail-first" | "detail" => Some(Self::DetailFirst),
            "cdn-first" | "cdn" => Some(Self::CdnFirst),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub strategy: Strategy,
    pub direct_only: bool,
    pub min_file_size: u64,
    pub resolution_preference: Vec<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::DetailFirst,
            direct_only: false,
            min_file_size: 50_000,
            resolution_preference: vec![
                "w:3840".to_string(),
                "w:2560".to_string(),
                "w:1920".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub sorted_subdir: String,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            sorted_subdir: "high".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncConfig {
    pub remote: RemoteConfig,
    pub http: HttpConfig,
    pub download: DownloadConfig,
    pub inventory: InventoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialSyncConfig {
    remote: Option<RemoteConfig>,
    http: Option<HttpConfig>,
    download: Option<DownloadConfig>,
    inventory: Option<InventoryConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

pub fn validate(cfg: &SyncConfig) -> Result<(), SyncError> {
    for (name, url) in [
        ("remote.base_url", &cfg.remote.base_url),
        ("remote.cdn_base", &cfg.remote.cdn_base),
    ] {
        match url::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => {
                return Err(SyncError::InvalidConfig(format!(
                    "{name} must be an http(s) URL, got `{url}`"
                )));
            }
        }
    }
    if cfg.remote.market.trim().is_empty() {
        return Err(SyncError::InvalidConfig(
            "remote.market cannot be empty".to_string(),
        ));
    }
    if cfg.http.max_attempts == 0 {
        return Err(SyncError::InvalidConfig(
            "http.max_attempts must be >= 1".to_string(),
        ));
    }
    if cfg.http.page_timeout_secs == 0 || cfg.http.download_timeout_secs == 0 {
        return Err(SyncError::InvalidConfig(
            "http timeouts must be >= 1 second".to_string(),
        ));
    }
    if cfg.download.min_file_size == 0 {
        return Err(SyncError::InvalidConfig(
            "download.min_file_size must be >= 1".to_string(),
        ));
    }
    if cfg
        .download
        .resolution_preference
        .iter()
        .all(|tag| tag.trim().is_empty())
    {
        return Err(SyncError::InvalidConfig(
            "download.resolution_preference needs at least one tag".to_string(),
        ));
    }
    if cfg.inventory.sorted_subdir.trim().is_empty() {
        return Err(SyncError::InvalidConfig(
            "inventory.sorted_subdir cannot be empty".to_string(),
        ));
    }
    Ok(())
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("BINGSYNC_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let dir = dirs::config_dir()?;
    Some(dir.join("bingsync").join("config.toml"))
}

fn merge_toml(base: &mut SyncConfig, raw: &str) -> Result<()> {
    let parsed: PartialSyncConfig = toml::from_str(raw)?;
    if let Some(remote) = parsed.remote {
        base.remote = remote;
    }
    if let Some(http) = parsed.http {
        base.http = http;
    }
    if let Some(download) = parsed.download {
        base.download = download;
    }
    if let Some(inventory) = parsed.inventory {
        base.inventory = inventory;
    }
    Ok(())
}

fn merge_file_config(base: &mut SyncConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    merge_toml(base, &raw)
        .map_err(|err| anyhow!("failed to parse bingsync config {}: {err}", path.display()))
}

fn attempts_in_range(value: u64) -> Result<u32, SyncError> {
    u32::try_from(value).map_err(|_| {
        SyncError::InvalidConfig(format!("BINGSYNC_MAX_ATTEMPTS is out of range: {value}"))
    })
}

pub fn load_config() -> Result<SyncConfig> {
    let mut cfg = SyncConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.remote.base_url = env_or_string("BINGSYNC_BASE_URL", &cfg.remote.base_url);
    cfg.remote.cdn_base = env_or_string("BINGSYNC_CDN_BASE", &cfg.remote.cdn_base);
    cfg.remote.market = env_or_string("BINGSYNC_MARKET", &cfg.remote.market);
    cfg.http.delay_ms = env_or_u64("BINGSYNC_DELAY_MS", cfg.http.delay_ms);
    cfg.http.max_attempts = attempts_in_range(env_or_u64(
        "BINGSYNC_MAX_ATTEMPTS",
        u64::from(cfg.http.max_attempts),
    ))?;
    cfg.download.min_file_size = env_or_u64("BINGSYNC_MIN_FILE_SIZE", cfg.download.min_file_size);
    cfg.download.direct_only = env_or_bool("BINGSYNC_DIRECT_ONLY", cfg.download.direct_only);
    if let Ok(raw) = env::var("BINGSYNC_STRATEGY") {
        cfg.download.strategy = Strategy::parse(&raw).ok_or_else(|| {
            SyncError::InvalidConfig(format!(
                "BINGSYNC_STRATEGY must be `detail-first` or `cdn-first`, got `{}`",
                raw.trim()
            ))
        })?;
    }

    validate(&cfg)?;
    Ok(cfg)
}
