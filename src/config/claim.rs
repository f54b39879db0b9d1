//! Claim coordinator configuration

use serde::{Deserialize, Serialize};
use chrono::Duration as ChronoDuration;

/// Knobs for the job-claim pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimConfig {
    /// Book-out reservation window, in minutes, for a successful claim
    pub book_out_minutes: i64,
    /// Trend window used when rebuilding a rating snapshot on cache miss
    pub trend_window_days: u32,
    /// Concurrency ceiling used when a worker never declared one
    pub default_max_concurrent_jobs: u32,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            book_out_minutes: 30,
            trend_window_days: 7,
            default_max_concurrent_jobs: 3,
        }
    }
}

impl ClaimConfig {
    /// Book-out window as a chrono duration
    pub fn book_out_window(&self) -> ChronoDuration {
        ChronoDuration::minutes(self.book_out_minutes)
    }
}
