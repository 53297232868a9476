use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::error::FilterError;
use super::predicates::{DateRange, NamePattern, SizeRange};
use crate::config::ScanMode;
use crate::ops::ScanPhase;

/// Paths are kept as the OS gave them; only their serialized form is
/// lossy, so names that are not valid UTF-8 can still be deleted.
fn serialize_path<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

/// A file that passed every filter of a scan. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMatch {
    #[serde(serialize_with = "serialize_path")]
    path: PathBuf,
    size: u64,
    last_modified: Option<DateTime<Utc>>,
}

impl FileMatch {
    pub fn new(path: impl Into<PathBuf>, size: u64, last_modified: Option<DateTime<Utc>>) -> Self {
        FileMatch {
            path: path.into(),
            size,
            last_modified,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }
}

/// Everything needed to run one scan. Built from user input, validated,
/// then handed to the scanner.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub root: PathBuf,
    pub max_depth: usize,
    pub max_files: u64,
    pub size: SizeRange,
    pub modified: DateRange,
    pub keywords: Vec<String>,
    pub name_pattern: Option<NamePattern>,
    /// Files above this many bytes are counted but never evaluated.
    pub max_file_size: Option<u64>,
    pub follow_links: bool,
}

impl ScanRequest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_mode(root, ScanMode::Normal)
    }

    pub fn with_mode(root: impl Into<PathBuf>, mode: ScanMode) -> Self {
        ScanRequest {
            root: root.into(),
            max_depth: mode.max_depth(),
            max_files: mode.max_files(),
            size: SizeRange::default(),
            modified: DateRange::default(),
            keywords: Vec::new(),
            name_pattern: None,
            max_file_size: None,
            follow_links: true,
        }
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn max_files(mut self, ceiling: u64) -> Self {
        self.max_files = ceiling;
        self
    }

    pub fn size(mut self, size: SizeRange) -> Self {
        self.size = size;
        self
    }

    pub fn modified(mut self, modified: DateRange) -> Self {
        self.modified = modified;
        self
    }

    /// Keywords are stored lowercased; blank entries are dropped.
    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        self
    }

    pub fn name_pattern(mut self, pattern: NamePattern) -> Self {
        self.name_pattern = Some(pattern);
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        if self.max_depth < 1 {
            return Err(FilterError::DepthTooSmall);
        }
        if self.max_files < 1 {
            return Err(FilterError::CeilingTooSmall);
        }
        self.size.validate()?;
        self.modified.validate()?;
        if !self.root.exists() {
            return Err(FilterError::RootNotFound(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(FilterError::RootNotDirectory(self.root.clone()));
        }
        Ok(())
    }
}

/// Counters shared between the walker and the evaluation workers.
#[derive(Debug, Default)]
pub struct ScanState {
    scanned: AtomicU64,
    matched: AtomicU64,
    inaccessible: AtomicU64,
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new scanned count.
    pub fn record_scanned(&self) -> u64 {
        self.scanned.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_match(&self) -> u64 {
        self.matched.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_inaccessible(&self) -> u64 {
        self.inaccessible.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn scanned(&self) -> u64 {
        self.scanned.load(Ordering::Relaxed)
    }

    pub fn matched(&self) -> u64 {
        self.matched.load(Ordering::Relaxed)
    }

    pub fn inaccessible(&self) -> u64 {
        self.inaccessible.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ScanSummary {
        ScanSummary {
            scanned: self.scanned(),
            matched: self.matched(),
            inaccessible: self.inaccessible(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub scanned: u64,
    pub matched: u64,
    pub inaccessible: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// Sorted by path so numbering is stable between listings.
    pub matches: Vec<FileMatch>,
    pub summary: ScanSummary,
    pub phase: ScanPhase,
    /// Worker drain hit its deadline; `matches` may be incomplete.
    pub timed_out: bool,
}

impl ScanReport {
    pub fn is_partial(&self) -> bool {
        self.timed_out || self.phase == ScanPhase::Aborted
    }

    pub fn total_size(&self) -> u64 {
        self.matches.iter().map(FileMatch::size).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeletionOutcome {
    /// Removed; `forced` when holders had to be terminated first.
    Deleted { forced: bool },
    NotFound,
    DeniedAfterRetry { terminated: Vec<u32>, reason: String },
}

impl DeletionOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeletionOutcome::Deleted { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    #[serde(serialize_with = "serialize_path")]
    pub path: PathBuf,
    pub outcome: DeletionOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeletionSummary {
    pub deleted: usize,
    pub forced: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl DeletionSummary {
    pub fn from_reports(reports: &[DeletionReport]) -> Self {
        let mut summary = DeletionSummary::default();
        for report in reports {
            match &report.outcome {
                DeletionOutcome::Deleted { forced } => {
                    summary.deleted += 1;
                    if *forced {
                        summary.forced += 1;
                    }
                }
                DeletionOutcome::NotFound => summary.not_found += 1,
                DeletionOutcome::DeniedAfterRetry { .. } => summary.failed += 1,
            }
        }
        summary
    }
}
