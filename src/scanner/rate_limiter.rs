//! Host-probe throttling shared by every worker of a scan
//!
//! One fixed one-second window with a start count. A burst that straddles a
//! window boundary can reach twice the nominal rate.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const WINDOW: Duration = Duration::from_secs(1);

/// Longest single sleep while waiting for a slot.
const MAX_WAIT_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Mutex<Window>,
}

impl RateLimiter {
    /// `limit` probes per second; 0 disables throttling.
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            window: Mutex::new(Window {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit == 0
    }

    /// Take a slot if one is free, otherwise report how long until the
    /// current window closes.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        if self.is_unlimited() {
            return Ok(());
        }

        let now = Instant::now();
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);

        if now.duration_since(window.started) >= WINDOW {
            window.started = now;
            window.count = 0;
        }

        if window.count < self.limit {
            window.count += 1;
            Ok(())
        } else {
            Err((window.started + WINDOW).saturating_duration_since(now))
        }
    }

    /// Wait for a slot. Returns `false` if `cancel` fired first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> bool {
        loop {
            if cancel.is_cancelled() {
                return false;
            }

            let wait = match self.try_acquire() {
                Ok(()) => return true,
                Err(wait) => wait.clamp(Duration::from_millis(1), MAX_WAIT_SLICE),
            };

            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}
