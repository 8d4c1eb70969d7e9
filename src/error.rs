use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("another bingsync run holds the lock {}", .0.display())]
    Locked(PathBuf),
    #[error("scrape state {} is unreadable: {reason} (rerun with --reset to start over)", path.display())]
    StateCorrupt { path: PathBuf, reason: String },
    #[error("catalog {} is malformed at line {line}: {reason}", path.display())]
    CatalogCorrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("invalid month key `{0}`: expected YYYYMM")]
    InvalidMonthKey(String),
    #[error("month {month} has {count} listed items but day {day} is outside 1..={days_in_month}")]
    DayOutOfRange {
        month: String,
        count: usize,
        day: usize,
        days_in_month: u32,
    },
    #[error("config invalid: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorCode {
    E001Locked,
    E002StateCorrupt,
    E003CatalogCorrupt,
    E004InvalidMonth,
    E005DateAnomaly,
    E006ConfigInvalid,
}

impl SyncErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001Locked => "E001_LOCKED",
            Self::E002StateCorrupt => "E002_STATE_CORRUPT",
            Self::E003CatalogCorrupt => "E003_CATALOG_CORRUPT",
            Self::E004InvalidMonth => "E004_INVALID_MONTH",
            Self::E005DateAnomaly => "E005_DATE_ANOMALY",
            Self::E006ConfigInvalid => "E006_CONFIG_INVALID",
        }
    }
}

impl SyncError {
    pub fn code(&self) -> SyncErrorCode {
        match self {
            Self::Locked(_) => SyncErrorCode::E001Locked,
            Self::StateCorrupt { .. } => SyncErrorCode::E002StateCorrupt,
            Self::CatalogCorrupt { .. } => SyncErrorCode::E003CatalogCorrupt,
            Self::InvalidMonthKey(_) => SyncErrorCode::E004InvalidMonth,
            Self::DayOutOfRange { .. } => SyncErrorCode::E005DateAnomaly,
            Self::InvalidConfig(_) => SyncErrorCode::E006ConfigInvalid,
        }
    }
}
