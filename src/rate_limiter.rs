//! Rate limiting for tool calls.
//!
//! Sliding one-minute window shared by every transport of the process. Calls
//! beyond the budget are rejected immediately; nothing is queued.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use tokio::sync::Mutex;

use crate::types::{Error, RateLimitSettings, Result};

/// Sliding window of accepted call timestamps.
#[derive(Debug)]
struct SlidingWindow {
    timestamps: VecDeque<DateTime<Utc>>,
    requests_per_minute: u32,
}

impl SlidingWindow {
    fn new(requests_per_minute: u32) -> Self {
        Self {
            timestamps: VecDeque::new(),
            requests_per_minute,
        }
    }

    fn evict(&mut self, now: DateTime<Utc>) {
        let minute_ago = now - Duration::minutes(1);
        while let Some(&ts) = self.timestamps.front() {
            if ts <= minute_ago {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Record the call if it fits in the window.
    fn check_and_record(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.evict(now);

        if self.timestamps.len() >= self.requests_per_minute as usize {
            return Err(Error::rate_limited(format!(
                "more than {} tool calls per minute",
                self.requests_per_minute
            )));
        }

        self.timestamps.push_back(now);
        Ok(())
    }
}

/// Process-wide call limiter.
///
/// Disabled limiters accept everything and keep no state.
#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    window: Mutex<SlidingWindow>,
}

impl RateLimiter {
    pub fn new(settings: &RateLimitSettings) -> Self {
        Self {
            enabled: settings.enabled && settings.requests_per_minute > 0,
            window: Mutex::new(SlidingWindow::new(settings.requests_per_minute)),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            window: Mutex::new(SlidingWindow::new(0)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check the budget and record the call if allowed.
    pub async fn check(&self) -> Result<()> {
        self.check_at(Utc::now()).await
    }

    async fn check_at(&self, now: DateTime<Utc>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.window.lock().await.check_and_record(now)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimitSettings::default())
    }
}
