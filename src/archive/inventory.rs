use std::fs;
use std::path::{Path, PathBuf};

/// On-disk view of the wallpaper directory. A file counts as present when it
/// sits in the sorted subdirectory or at the top level and is at least
/// `min_file_size` bytes; anything smaller is an error page or a truncated body.
#[derive(Debug, Clone)]
pub struct DiskInventory {
    wallpaper_dir: PathBuf,
    sorted_subdir: String,
    min_file_size: u64,
}

impl DiskInventory {
    pub fn new(wallpaper_dir: &Path, sorted_subdir: &str, min_file_size: u64) -> Self {
        Self {
            wallpaper_dir: wallpaper_dir.to_path_buf(),
            sorted_subdir: sorted_subdir.to_string(),
            min_file_size,
        }
    }

    /// Where new downloads land.
    pub fn download_path(&self, filename: &str) -> PathBuf {
        self.wallpaper_dir.join(filename)
    }

    pub fn candidates(&self, filename: &str) -> [PathBuf; 2] {
        [
            self.wallpaper_dir.join(&self.sorted_subdir).join(filename),
            self.wallpaper_dir.join(filename),
        ]
    }

    pub fn locate(&self, filename: &str) -> Option<PathBuf> {
        self.candidates(filename).into_iter().find(|candidate| {
            fs::metadata(candidate)
                .map(|meta| meta.is_file() && meta.len() >= self.min_file_size)
                .unwrap_or(false)
        })
    }

    pub fn is_present(&self, filename: &str) -> bool {
        self.locate(filename).is_some()
    }
}
