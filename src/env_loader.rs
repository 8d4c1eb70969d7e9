use std::env;
use std::path::PathBuf;

include!(concat!(env!("OUT_DIR"), "/env_allowlist.rs"));

fn fallback_dotenv_path(bingsync_home: Option<PathBuf>, config_dir: Option<PathBuf>) -> Option<PathBuf> {
    match bingsync_home {
        Some(home) => Some(home.join(".env")),
        None => Some(config_dir?.join("bingsync/.env")),
    }
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("BINGSYNC_HOME").map(PathBuf::from),
        dirs::config_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}

fn unknown_keys(keys: impl Iterator<Item = String>) -> Vec<String> {
    let mut unknown: Vec<String> = keys
        .filter(|key| key.starts_with("BINGSYNC_"))
        .filter(|key| !GENERATED_ENV_ALLOWLIST.contains(&key.as_str()))
        .collect();
    unknown.sort();
    unknown
}

/// `BINGSYNC_*` variables present in the environment that nothing reads,
/// usually a typo.
pub fn unknown_env_keys() -> Vec<String> {
    unknown_keys(env::vars_os().filter_map(|(key, _)| key.into_string().ok()))
}
