use std::path::PathBuf;
use thiserror::Error;

/// Invalid filter input. Always raised before any traversal starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid size '{0}': expected megabytes such as 100, -50 or 50-200")]
    InvalidSize(String),

    #[error("minimum size {min} bytes is larger than maximum size {max} bytes")]
    SizeRangeInverted { min: u64, max: u64 },

    #[error("invalid date '{0}': expected yyyy-mm-dd")]
    InvalidDate(String),

    #[error("start date {start} is later than end date {end}")]
    DateRangeInverted { start: String, end: String },

    #[error("invalid file name pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("maximum depth must be at least 1")]
    DepthTooSmall,

    #[error("scan limit must be at least 1 file")]
    CeilingTooSmall,

    #[error("directory not found: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("not a directory: {}", .0.display())]
    RootNotDirectory(PathBuf),
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid scan request: {0}")]
    InvalidRequest(#[from] FilterError),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
