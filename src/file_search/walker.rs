use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use std::borrow::Cow;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::{DirEntry, WalkDir};

use super::types::ScanState;

lazy_static! {
    /// Lowercase directory names that are never descended into.
    static ref SKIP_DIRECTORIES: HashSet<&'static str> = [
        "system volume information",
        "$recycle.bin",
        "windows",
        "program files",
        "program files (x86)",
        "programdata",
    ]
    .into_iter()
    .collect();
}

pub fn is_skipped_dir_name(name: &OsStr) -> bool {
    SKIP_DIRECTORIES.contains(name.to_string_lossy().to_lowercase().as_str())
}

/// A regular file reached by the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl FileEntry {
    pub fn name(&self) -> Cow<'_, str> {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or(Cow::Borrowed(""))
    }
}

/// Points where the walk stops and waits for the caller's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    /// The scanned count reached the current ceiling.
    Ceiling { scanned: u64, ceiling: u64 },
    /// Many files scanned and still nothing matched. Asked at most once.
    NoMatches { scanned: u64 },
}

#[derive(Debug)]
pub enum WalkEvent {
    File(FileEntry),
    Inaccessible { path: Option<PathBuf>, reason: String },
    Threshold(Threshold),
}

#[derive(Debug, Clone, Copy)]
pub struct ThrottleSettings {
    pub ceiling: u64,
    pub no_match_threshold: u64,
    pub no_match_interval: u64,
}

/// Depth-bounded, one-shot traversal producing [`WalkEvent`]s.
///
/// A `Threshold` event holds back the file that triggered it; the walk
/// re-emits the threshold until the caller resolves it with
/// [`TreeWalker::raise_ceiling`], [`TreeWalker::confirm_no_matches`] or
/// [`TreeWalker::stop`].
pub struct TreeWalker {
    entries: Box<dyn Iterator<Item = walkdir::Result<DirEntry>> + Send>,
    state: Arc<ScanState>,
    ceiling: u64,
    no_match_threshold: u64,
    no_match_interval: u64,
    no_match_confirmed: bool,
    pending: Option<FileEntry>,
    stopped: bool,
}

impl TreeWalker {
    pub fn new(
        root: &Path,
        max_depth: usize,
        follow_links: bool,
        state: Arc<ScanState>,
        throttle: ThrottleSettings,
    ) -> Self {
        let entries = WalkDir::new(root)
            .max_depth(max_depth)
            .follow_links(follow_links)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !(e.file_type().is_dir() && is_skipped_dir_name(e.file_name()))
            });

        TreeWalker {
            entries: Box::new(entries),
            state,
            ceiling: throttle.ceiling.max(1),
            no_match_threshold: throttle.no_match_threshold,
            no_match_interval: throttle.no_match_interval.max(1),
            no_match_confirmed: false,
            pending: None,
            stopped: false,
        }
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    /// Double the ceiling and return the new value.
    pub fn raise_ceiling(&mut self) -> u64 {
        self.ceiling = self.ceiling.saturating_mul(2);
        self.ceiling
    }

    pub fn confirm_no_matches(&mut self) {
        self.no_match_confirmed = true;
    }

    /// Resolve `threshold` in favour of continuing.
    pub fn resume(&mut self, threshold: Threshold) {
        match threshold {
            Threshold::Ceiling { .. } => {
                self.raise_ceiling();
            }
            Threshold::NoMatches { .. } => self.confirm_no_matches(),
        }
    }

    pub fn stop(&mut self) {
        self.stopped = true;
        self.pending = None;
    }

    fn check_thresholds(&self) -> Option<Threshold> {
        let scanned = self.state.scanned();
        if scanned >= self.ceiling {
            return Some(Threshold::Ceiling {
                scanned,
                ceiling: self.ceiling,
            });
        }
        if !self.no_match_confirmed
            && self.state.matched() == 0
            && scanned > self.no_match_threshold
            && scanned % self.no_match_interval == 0
        {
            return Some(Threshold::NoMatches { scanned });
        }
        None
    }

    fn next_file(&mut self) -> Option<Result<FileEntry, WalkEvent>> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    self.state.record_inaccessible();
                    return Some(Err(WalkEvent::Inaccessible {
                        path: err.path().map(Path::to_path_buf),
                        reason: err.to_string(),
                    }));
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            return match entry.metadata() {
                Ok(metadata) => Some(Ok(FileEntry {
                    size: metadata.len(),
                    modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                    path: entry.into_path(),
                })),
                Err(err) => {
                    self.state.record_inaccessible();
                    Some(Err(WalkEvent::Inaccessible {
                        path: Some(entry.into_path()),
                        reason: err.to_string(),
                    }))
                }
            };
        }
    }
}

impl Iterator for TreeWalker {
    type Item = WalkEvent;

    fn next(&mut self) -> Option<WalkEvent> {
        if self.stopped {
            return None;
        }

        let entry = match self.pending.take() {
            Some(entry) => entry,
            None => match self.next_file()? {
                Ok(entry) => entry,
                Err(event) => return Some(event),
            },
        };

        if let Some(threshold) = self.check_thresholds() {
            self.pending = Some(entry);
            return Some(WalkEvent::Threshold(threshold));
        }

        self.state.record_scanned();
        Some(WalkEvent::File(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn skip_set_ignores_case() {
        assert!(is_skipped_dir_name(&OsString::from("Windows")));
        assert!(is_skipped_dir_name(&OsString::from("$RECYCLE.BIN")));
        assert!(is_skipped_dir_name(&OsString::from("Program Files (x86)")));
        assert!(!is_skipped_dir_name(&OsString::from("windows-backup")));
    }
}
