use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;
use std::time::Duration;

use super::lock_resolver::{LockResolver, SystemResolver};
use super::process_control;
use super::selection::Selection;
use super::types::{DeletionOutcome, DeletionReport, DeletionSummary, FileMatch};
use crate::config::SearchConfig;
use crate::logging::{detail, event};

/// The direct delete primitive. Swappable so lock handling can be exercised
/// without real locks.
pub trait FileRemover: Send + Sync {
    fn remove(&self, path: &Path) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsRemover;

impl FileRemover for FsRemover {
    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Deletes selected matches one by one, terminating lock holders and
/// retrying once when a direct delete is refused.
pub struct DeletionEngine<R: LockResolver = SystemResolver, F: FileRemover = FsRemover> {
    resolver: R,
    remover: F,
    release_wait: Duration,
}

impl DeletionEngine {
    pub fn new(config: &SearchConfig) -> Self {
        let resolver = SystemResolver::detect(config.holder_lookup_timeout());
        detail!("Lock resolver: {}", resolver.name());
        DeletionEngine::with_parts(resolver, FsRemover, config.release_wait())
    }
}

impl<R: LockResolver, F: FileRemover> DeletionEngine<R, F> {
    pub fn with_parts(resolver: R, remover: F, release_wait: Duration) -> Self {
        DeletionEngine {
            resolver,
            remover,
            release_wait,
        }
    }

    /// Delete the selected entries of `matches`, in listing order. A failure
    /// on one file never stops the rest.
    pub async fn delete(&self, matches: &[FileMatch], selection: &Selection) -> Vec<DeletionReport> {
        let picked = selection.pick(matches);
        if picked.is_empty() {
            event!("No files selected for deletion");
            return Vec::new();
        }

        let mut reports = Vec::with_capacity(picked.len());
        for file in picked {
            let outcome = self.delete_path(file.path()).await;
            reports.push(DeletionReport {
                path: file.path().to_path_buf(),
                outcome,
            });
        }

        let summary = DeletionSummary::from_reports(&reports);
        event!(
            "Deleted {} of {} files ({} forced, {} already gone, {} failed)",
            summary.deleted,
            reports.len(),
            summary.forced,
            summary.not_found,
            summary.failed
        );
        reports
    }

    pub async fn delete_path(&self, path: &Path) -> DeletionOutcome {
        if fs::symlink_metadata(path).is_err() {
            event!(warn, "File not found: {}", path.display());
            return DeletionOutcome::NotFound;
        }

        let first_error = match self.remover.remove(path) {
            Ok(()) => {
                event!("Deleted {}", path.display());
                return DeletionOutcome::Deleted { forced: false };
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                event!(warn, "File not found: {}", path.display());
                return DeletionOutcome::NotFound;
            }
            Err(err) => err,
        };

        event!(
            warn,
            "Could not delete {} ({}); looking for processes holding it",
            path.display(),
            first_error
        );
        let holders = match self.resolver.find_holders(path).await {
            Ok(holders) => holders,
            Err(reason) => {
                event!(warn, "Could not list holders of {}: {}", path.display(), reason);
                Vec::new()
            }
        };

        let mut terminated = Vec::new();
        for pid in holders {
            let holder = process_control::describe(pid);
            event!("Terminating {} holding {}", holder, path.display());
            if self.resolver.terminate(pid).await {
                terminated.push(pid);
            } else {
                event!(warn, "Could not terminate {}", holder);
            }
        }

        tokio::time::sleep(self.release_wait).await;

        match self.remover.remove(path) {
            Ok(()) => {
                event!(
                    "Deleted {} after terminating {} process(es)",
                    path.display(),
                    terminated.len()
                );
                DeletionOutcome::Deleted { forced: true }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => DeletionOutcome::NotFound,
            Err(err) => {
                event!(warn, "Giving up on {}: {}", path.display(), err);
                DeletionOutcome::DeniedAfterRetry {
                    terminated,
                    reason: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_search::lock_resolver::NoopResolver;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Refuses to delete until `released` is set.
    struct LockedRemover {
        released: Arc<AtomicBool>,
        attempts: AtomicUsize,
    }

    impl FileRemover for LockedRemover {
        fn remove(&self, path: &Path) -> io::Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.released.load(Ordering::SeqCst) {
                fs::remove_file(path)
            } else {
                Err(io::Error::new(ErrorKind::PermissionDenied, "file is locked"))
            }
        }
    }

    /// Reports fixed holders; terminating one releases the lock when
    /// `kill_releases` is set.
    struct FakeResolver {
        holders: Vec<u32>,
        kill_releases: bool,
        released: Arc<AtomicBool>,
        killed: Mutex<Vec<u32>>,
    }

    impl LockResolver for FakeResolver {
        async fn find_holders(&self, _path: &Path) -> Result<Vec<u32>, String> {
            Ok(self.holders.clone())
        }

        async fn terminate(&self, pid: u32) -> bool {
            self.killed.lock().unwrap().push(pid);
            if self.kill_releases {
                self.released.store(true, Ordering::SeqCst);
            }
            true
        }
    }

    fn locked_engine(kill_releases: bool) -> DeletionEngine<FakeResolver, LockedRemover> {
        let released = Arc::new(AtomicBool::new(false));
        DeletionEngine::with_parts(
            FakeResolver {
                holders: vec![1234],
                kill_releases,
                released: released.clone(),
                killed: Mutex::new(Vec::new()),
            },
            LockedRemover {
                released,
                attempts: AtomicUsize::new(0),
            },
            Duration::from_millis(5),
        )
    }

    fn touch(dir: &TempDir, name: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, b"data").unwrap();
        path
    }

    #[tokio::test]
    async fn terminating_the_holder_frees_the_file() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, "locked.log");
        let engine = locked_engine(true);

        let outcome = engine.delete_path(&path).await;

        assert_eq!(outcome, DeletionOutcome::Deleted { forced: true });
        assert!(!path.exists());
        assert_eq!(*engine.resolver.killed.lock().unwrap(), vec![1234]);
        assert_eq!(engine.remover.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retries_only_once() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, "stubborn.log");
        let engine = locked_engine(false);

        let outcome = engine.delete_path(&path).await;

        match outcome {
            DeletionOutcome::DeniedAfterRetry { terminated, reason } => {
                assert_eq!(terminated, vec![1234]);
                assert!(reason.contains("locked"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(path.exists());
        assert_eq!(engine.remover.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let engine = DeletionEngine::with_parts(
            NoopResolver,
            FsRemover,
            Duration::ZERO,
        );
        let outcome = engine.delete_path(&dir.path().join("ghost.txt")).await;
        assert_eq!(outcome, DeletionOutcome::NotFound);
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_batch() {
        let dir = TempDir::new().unwrap();
        let kept = touch(&dir, "a.txt");
        let gone = dir.path().join("b.txt");
        let removed = touch(&dir, "c.txt");
        let matches = vec![
            FileMatch::new(kept.clone(), 4, None),
            FileMatch::new(gone.clone(), 4, None),
            FileMatch::new(removed.clone(), 4, None),
        ];
        let engine = DeletionEngine::with_parts(
            NoopResolver,
            FsRemover,
            Duration::ZERO,
        );

        let reports = engine
            .delete(&matches, &Selection::parse("2-3", matches.len()))
            .await;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].outcome, DeletionOutcome::NotFound);
        assert_eq!(reports[1].outcome, DeletionOutcome::Deleted { forced: false });
        assert!(kept.exists());
        assert!(!removed.exists());
    }

    #[tokio::test]
    async fn empty_selection_deletes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, "keep.txt");
        let matches = vec![FileMatch::new(path.clone(), 4, None)];
        let engine = DeletionEngine::with_parts(
            NoopResolver,
            FsRemover,
            Duration::ZERO,
        );
        assert!(engine.delete(&matches, &Selection::None).await.is_empty());
        assert!(path.exists());
    }
}
