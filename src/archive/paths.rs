use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SyncPaths {
    pub home: PathBuf,
    pub wallpaper_dir: PathBuf,
    pub state_file: PathBuf,
    pub catalog_file: PathBuf,
    pub logs_dir: PathBuf,
}

/// CLI-level overrides; they win over the environment.
#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub wallpaper_dir: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
    pub catalog_file: Option<PathBuf>,
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

impl SyncPaths {
    pub fn under(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
            wallpaper_dir: home.join("bing_wallpapers"),
            state_file: home.join("scrape_state.json"),
            catalog_file: home.join("image_dates.csv"),
            logs_dir: home.join("logs"),
        }
    }

    pub fn lock_file(&self) -> PathBuf {
        let mut name = self
            .state_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "scrape_state.json".into());
        name.push(".lock");
        self.state_file.with_file_name(name)
    }
}

pub fn resolve_paths(overrides: &PathOverrides) -> Result<SyncPaths> {
    let cwd = env::current_dir().context("current directory could not be resolved")?;
    let home = env_or_default_path("BINGSYNC_HOME", cwd);
    let defaults = SyncPaths::under(&home);

    let wallpaper_dir = overrides.wallpaper_dir.clone().unwrap_or_else(|| {
        env_or_default_path("BINGSYNC_WALLPAPER_DIR", defaults.wallpaper_dir.clone())
    });
    let state_file = overrides
        .state_file
        .clone()
        .unwrap_or_else(|| env_or_default_path("BINGSYNC_STATE_FILE", defaults.state_file.clone()));
    let catalog_file = overrides.catalog_file.clone().unwrap_or_else(|| {
        env_or_default_path("BINGSYNC_CATALOG_FILE", defaults.catalog_file.clone())
    });
    let logs_dir = env_or_default_path("BINGSYNC_LOGS_DIR", defaults.logs_dir);

    Ok(SyncPaths {
        home,
        wallpaper_dir,
        state_file,
        catalog_file,
        logs_dir,
    })
}
