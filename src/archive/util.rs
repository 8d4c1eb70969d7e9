use crate::error::SyncError;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;

/// Return the current Unix epoch in seconds.
pub fn now_epoch_secs() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Temp file in the same directory as `target`, so `persist` is a rename.
pub fn sibling_temp_file(target: &Path) -> Result<NamedTempFile> {
    let dir = parent_dir(target);
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    NamedTempFile::new_in(&dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))
}

/// Write `bytes` to `target` via temp file + rename. A crash leaves either the
/// old file or the new one, never a torn write.
pub fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = sibling_temp_file(target)?;
    tmp.write_all(bytes)
        .with_context(|| format!("failed to write temp file for {}", target.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("failed to sync temp file for {}", target.display()))?;
    tmp.persist(target)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to replace {}", target.display()))?;
    Ok(())
}

/// Exclusive advisory lock held for the lifetime of the guard.
#[derive(Debug)]
pub struct RunLock {
    file: File,
}

impl RunLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        let dir = parent_dir(path);
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open lock file {}", path.display()))?;
        if file.try_lock_exclusive().is_err() {
            return Err(SyncError::Locked(path.to_path_buf()).into());
        }
        Ok(Self { file })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
