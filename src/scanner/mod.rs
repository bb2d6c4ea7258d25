//! Scanner module containing the parallel discovery engine

pub mod engine;
pub mod rate_limiter;
pub mod results;

use serde::{Deserialize, Serialize};

pub use engine::ScanEngine;
pub use rate_limiter::RateLimiter;
pub use results::ResultStore;

/// Scan progress tracking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Addresses in the range
    pub total: u64,
    /// Addresses fully probed
    pub completed: u64,
    /// Completed addresses that answered the ping
    pub alive: usize,
}

impl ScanProgress {
    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        if self.total > 0 {
            (self.completed as f64 / self.total as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.completed)
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed >= self.total
    }
}
