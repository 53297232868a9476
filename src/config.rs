// src/config.rs

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::time::Duration;

/// Environment variable naming a JSON file that overrides [`SearchConfig`].
pub const CONFIG_OVERRIDE_ENV: &str = "FILESWEEP_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    // Parallelism
    pub worker_threads: usize, // Default: num_cpus::get()

    // Throttling
    pub progress_interval: u64,  // Default: 2000 files
    pub no_match_threshold: u64, // Default: 10000 files
    pub no_match_interval: u64,  // Default: 2000 files

    // Content scanning
    pub content_line_cap: usize, // Default: 50000 lines

    // Timeouts
    pub drain_timeout_secs: u64,         // Default: 3600 seconds
    pub release_wait_ms: u64,            // Default: 500 ms
    pub holder_lookup_timeout_secs: u64, // Default: 10 seconds
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            worker_threads: num_cpus::get(),
            progress_interval: 2_000,
            no_match_threshold: 10_000,
            no_match_interval: 2_000,
            content_line_cap: 50_000,
            drain_timeout_secs: 60 * 60,
            release_wait_ms: 500,
            holder_lookup_timeout_secs: 10,
        }
    }
}

impl SearchConfig {
    /// Load the override file named by `FILESWEEP_CONFIG`, or the defaults.
    pub fn load() -> Result<Self, String> {
        match env::var(CONFIG_OVERRIDE_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                let raw = fs::read_to_string(path.trim())
                    .map_err(|e| format!("Failed to read config {}: {}", path, e))?;
                Self::from_json(&raw)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, String> {
        let mut config: SearchConfig =
            serde_json::from_str(raw).map_err(|e| format!("Failed to parse config: {}", e))?;
        config.worker_threads = config.worker_threads.max(1);
        config.progress_interval = config.progress_interval.max(1);
        config.no_match_interval = config.no_match_interval.max(1);
        Ok(config)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    pub fn release_wait(&self) -> Duration {
        Duration::from_millis(self.release_wait_ms)
    }

    pub fn holder_lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.holder_lookup_timeout_secs)
    }
}

// Global configuration, falls back to defaults when the override is unreadable
lazy_static! {
    pub static ref SEARCH_CONFIG: SearchConfig = SearchConfig::load().unwrap_or_else(|err| {
        log::warn!("{}; using default search settings", err);
        SearchConfig::default()
    });
}

/// Depth and ceiling presets offered by the interactive search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    Normal,
    Deep,
}

impl ScanMode {
    pub fn max_depth(self) -> usize {
        match self {
            ScanMode::Normal => 5,
            ScanMode::Deep => 20,
        }
    }

    pub fn max_files(self) -> u64 {
        match self {
            ScanMode::Normal => 100_000,
            ScanMode::Deep => 500_000,
        }
    }
}
