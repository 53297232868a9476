use bytesize::ByteSize;
use dashmap::DashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::error::ScanError;
use super::predicates::{FileMeta, FsContent, PredicateSet};
use super::prompt::UserPrompt;
use super::types::{FileMatch, ScanReport, ScanRequest, ScanState};
use super::walker::{FileEntry, Threshold, ThrottleSettings, TreeWalker, WalkEvent};
use crate::config::SearchConfig;
use crate::logging::{detail, event};
use crate::ops::{ScanPhase, ThroughputTracker};

/// Drives one scan: walks the tree, evaluates predicates on a worker pool
/// and asks the user at the throttling thresholds.
pub struct FileScanner<P: UserPrompt> {
    config: SearchConfig,
    prompt: P,
}

impl<P: UserPrompt> FileScanner<P> {
    pub fn new(config: SearchConfig, prompt: P) -> Self {
        FileScanner { config, prompt }
    }

    pub fn prompt(&self) -> &P {
        &self.prompt
    }

    pub fn scan(&self, request: ScanRequest) -> Result<ScanReport, ScanError> {
        request.validate()?;
        let root = absolute_root(&request.root)?;

        let predicates = Arc::new(PredicateSet::from_request(
            &request,
            self.config.content_line_cap,
        ));
        let state = Arc::new(ScanState::new());
        let found: Arc<DashMap<PathBuf, FileMatch>> = Arc::new(DashMap::new());
        let cancel = CancellationToken::new();
        let evaluator = Evaluator::new(self.config.worker_threads)?;

        let mut phase = ScanPhase::Idle;
        phase.advance(ScanPhase::Walking);
        event!(
            "Scanning {} (depth {}, limit {} files, {} filters)",
            root.display(),
            request.max_depth,
            request.max_files,
            predicates.len()
        );
        if predicates.is_empty() {
            event!("No filters set; every file found will be listed");
        }

        let mut walker = TreeWalker::new(
            &root,
            request.max_depth,
            request.follow_links,
            state.clone(),
            ThrottleSettings {
                ceiling: request.max_files,
                no_match_threshold: self.config.no_match_threshold,
                no_match_interval: self.config.no_match_interval,
            },
        );
        let mut throughput = ThroughputTracker::default();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let mut dispatched = 0u64;

        while let Some(walk_event) = walker.next() {
            match walk_event {
                WalkEvent::File(entry) => {
                    let scanned = state.scanned();
                    let oversized = request.max_file_size.is_some_and(|limit| entry.size > limit);
                    if oversized {
                        detail!(
                            "Skipping {} ({} over size cap)",
                            entry.path.display(),
                            ByteSize(entry.size)
                        );
                    } else {
                        dispatched += 1;
                        evaluator.submit(EvalTask {
                            entry,
                            predicates: predicates.clone(),
                            state: state.clone(),
                            found: found.clone(),
                            cancel: cancel.clone(),
                            done: done_tx.clone(),
                        });
                    }
                    self.log_progress(scanned, &state, &mut throughput);
                }
                WalkEvent::Inaccessible { path, reason } => match path {
                    Some(path) => detail!("Cannot access {}: {}", path.display(), reason),
                    None => detail!("Cannot access entry: {}", reason),
                },
                WalkEvent::Threshold(threshold) => {
                    phase.advance(ScanPhase::Paused);
                    if self.should_continue(threshold) {
                        walker.resume(threshold);
                        phase.advance(ScanPhase::Walking);
                        if let Threshold::Ceiling { .. } = threshold {
                            event!("Scan limit raised to {} files", walker.ceiling());
                        }
                    } else {
                        walker.stop();
                        phase.advance(ScanPhase::Aborted);
                        event!("Scan stopped by user after {} files", state.scanned());
                        break;
                    }
                }
            }
        }

        if !phase.is_finished() {
            phase.advance(ScanPhase::Completed);
        }

        drop(done_tx);
        let timed_out = drain(&done_rx, dispatched, self.config.drain_timeout(), &cancel);
        if timed_out {
            event!(
                warn,
                "Scan exceeded {}s while waiting for workers; results are partial",
                self.config.drain_timeout().as_secs()
            );
        }

        let mut matches: Vec<FileMatch> = found.iter().map(|e| e.value().clone()).collect();
        matches.sort_by(|a, b| a.path().cmp(b.path()));
        let summary = state.snapshot();

        if matches.is_empty() {
            event!("No files matched the filters");
            if summary.inaccessible > 0 {
                event!(
                    "{} files or directories could not be read (system files or missing permissions)",
                    summary.inaccessible
                );
            }
            event!("Try relaxing the filters or checking the directory");
        } else {
            event!(
                "Scan {}: {} scanned, {} matched ({}), {} inaccessible",
                phase,
                summary.scanned,
                matches.len(),
                ByteSize(matches.iter().map(FileMatch::size).sum::<u64>()),
                summary.inaccessible
            );
        }

        Ok(ScanReport {
            matches,
            summary,
            phase,
            timed_out,
        })
    }

    fn should_continue(&self, threshold: Threshold) -> bool {
        let question = match threshold {
            Threshold::Ceiling { scanned, ceiling } => format!(
                "Scanned {} files, reaching the limit of {}. Keep scanning with a doubled limit?",
                scanned, ceiling
            ),
            Threshold::NoMatches { scanned } => format!(
                "Scanned {} files without a single match. Keep scanning?",
                scanned
            ),
        };
        self.prompt.confirm(&question, true) == Some(true)
    }

    fn log_progress(&self, scanned: u64, state: &ScanState, tracker: &mut ThroughputTracker) {
        if scanned == 0 || scanned % self.config.progress_interval != 0 {
            return;
        }
        match tracker.tick(scanned) {
            Some(rate) => event!(
                "Scanned {} files, {} matched ({:.0} files/s)",
                scanned,
                state.matched(),
                rate
            ),
            None => event!("Scanned {} files, {} matched", scanned, state.matched()),
        }
    }
}

fn absolute_root(root: &Path) -> Result<PathBuf, ScanError> {
    if root.is_absolute() {
        return Ok(root.to_path_buf());
    }
    env::current_dir()
        .map(|cwd| cwd.join(root))
        .map_err(|source| ScanError::Io {
            path: root.to_path_buf(),
            source,
        })
}

/// Wait for `expected` completions. Returns `true` when the deadline passed
/// first, after cancelling the evaluations still queued.
fn drain(
    done: &Receiver<()>,
    expected: u64,
    timeout: Duration,
    cancel: &CancellationToken,
) -> bool {
    let deadline = Instant::now() + timeout;
    let mut completed = 0u64;
    while completed < expected {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match done.recv_timeout(remaining) {
            Ok(()) => completed += 1,
            Err(RecvTimeoutError::Timeout) => {
                cancel.cancel();
                return true;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    false
}

struct EvalTask {
    entry: FileEntry,
    predicates: Arc<PredicateSet>,
    state: Arc<ScanState>,
    found: Arc<DashMap<PathBuf, FileMatch>>,
    cancel: CancellationToken,
    done: Sender<()>,
}

impl EvalTask {
    fn run(self) {
        if !self.cancel.is_cancelled() {
            let name = self.entry.name();
            let meta = FileMeta {
                path: &self.entry.path,
                name: &name,
                size: self.entry.size,
                modified: self.entry.modified,
            };
            if self
                .predicates
                .matches(&meta, &FsContent::new(&self.entry.path))
            {
                let path = self.entry.path.clone();
                let file = FileMatch::new(path.clone(), self.entry.size, self.entry.modified);
                if self.found.insert(path, file).is_none() {
                    self.state.record_match();
                    event!(
                        "Found {} ({})",
                        self.entry.path.display(),
                        ByteSize(self.entry.size)
                    );
                }
            }
        }
        let _ = self.done.send(());
    }
}

#[cfg(feature = "parallel-scan")]
struct Evaluator {
    pool: rayon::ThreadPool,
}

#[cfg(feature = "parallel-scan")]
impl Evaluator {
    fn new(threads: usize) -> Result<Self, ScanError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("filesweep-eval-{}", i))
            .build()
            .map_err(|e| ScanError::WorkerPool(e.to_string()))?;
        Ok(Evaluator { pool })
    }

    fn submit(&self, task: EvalTask) {
        self.pool.spawn(move || task.run());
    }
}

// Serial build: evaluate on the traversal thread.
#[cfg(not(feature = "parallel-scan"))]
struct Evaluator;

#[cfg(not(feature = "parallel-scan"))]
impl Evaluator {
    fn new(_threads: usize) -> Result<Self, ScanError> {
        Ok(Evaluator)
    }

    fn submit(&self, task: EvalTask) {
        task.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_reports_timeout_and_cancels() {
        let (tx, rx) = mpsc::channel::<()>();
        tx.send(()).unwrap();
        let cancel = CancellationToken::new();
        // two expected, one delivered, sender still alive
        let timed_out = drain(&rx, 2, Duration::from_millis(20), &cancel);
        assert!(timed_out);
        assert!(cancel.is_cancelled());
        drop(tx);
    }

    #[test]
    fn drain_finishes_when_all_tasks_report() {
        let (tx, rx) = mpsc::channel::<()>();
        for _ in 0..3 {
            tx.send(()).unwrap();
        }
        drop(tx);
        let cancel = CancellationToken::new();
        assert!(!drain(&rx, 3, Duration::from_secs(1), &cancel));
        assert!(!cancel.is_cancelled());
    }
}
