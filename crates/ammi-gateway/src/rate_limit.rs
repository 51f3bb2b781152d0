//! Per-sender fixed-window rate limiting.
//!
//! Process-local only: counters live in memory, reset on restart, and are
//! not shared between instances. Running more than one gateway multiplies
//! the effective quota.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

struct Window {
    count: u32,
    reset_at: Instant,
}

pub struct RateLimiter {
    windows: DashMap<String, Window>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    /// Count one request against `key`. Returns false when the sender has
    /// exhausted the current window.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.windows.entry(key.to_string()).or_insert_with(|| Window {
            count: 0,
            reset_at: now + self.window,
        });

        if now > entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window;
        }

        entry.count += 1;
        entry.count <= self.max_requests
    }

    /// Drop expired windows. Called periodically so idle senders do not
    /// accumulate forever.
    pub fn sweep(&self) {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, w| now <= w.reset_at);
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            debug!(removed, "swept expired rate-limit windows");
        }
    }

    pub fn tracked_senders(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_quota_then_blocks() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.check("+1555"));
        assert!(limiter.check("+1555"));
        assert!(limiter.check("+1555"));
        assert!(!limiter.check("+1555"));
        assert!(!limiter.check("+1555"));
    }

    #[test]
    fn senders_are_limited_independently() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("+1555"));
        assert!(!limiter.check("+1555"));
        assert!(limiter.check("+1666"));
    }

    #[test]
    fn window_expiry_resets_the_count() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.check("+1555"));
        assert!(!limiter.check("+1555"));

        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check("+1555"));
    }

    #[test]
    fn sweep_drops_only_expired_windows() {
        let limiter = RateLimiter::new(5, Duration::from_millis(20));
        limiter.check("stale");
        std::thread::sleep(Duration::from_millis(30));
        limiter.check("fresh");

        limiter.sweep();
        assert_eq!(limiter.tracked_senders(), 1);
    }
}
