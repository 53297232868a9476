use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Lifecycle of one scan: `Idle -> Walking -> (Paused)* -> Completed | Aborted`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Idle,
    Walking,
    Paused,
    Completed,
    Aborted,
}

impl ScanPhase {
    pub fn is_finished(self) -> bool {
        matches!(self, ScanPhase::Completed | ScanPhase::Aborted)
    }

    /// Move to `next`, refusing transitions the lifecycle does not allow.
    pub fn advance(&mut self, next: ScanPhase) -> bool {
        use ScanPhase::*;
        let allowed = matches!(
            (*self, next),
            (Idle, Walking)
                | (Walking, Paused)
                | (Paused, Walking)
                | (Walking, Completed)
                | (Walking, Aborted)
                | (Paused, Aborted)
        );
        if allowed {
            *self = next;
        }
        allowed
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScanPhase::Idle => "idle",
            ScanPhase::Walking => "walking",
            ScanPhase::Paused => "paused",
            ScanPhase::Completed => "completed",
            ScanPhase::Aborted => "aborted",
        };
        f.write_str(label)
    }
}

// Simple throughput helper to compute per-tick scan rate
#[derive(Default, Clone)]
pub struct ThroughputTracker {
    last_tick: Option<Instant>,
    last_files: u64,
}

impl ThroughputTracker {
    /// Files per second since the previous tick; `None` on the first tick.
    pub fn tick(&mut self, files_done: u64) -> Option<f32> {
        let now = Instant::now();
        let rate = self.last_tick.map(|prev| {
            let dt = now.duration_since(prev).as_secs_f32().max(0.001);
            let df = files_done.saturating_sub(self.last_files) as f32;
            df / dt
        });
        self.last_tick = Some(now);
        self.last_files = files_done;
        rate
    }
}
