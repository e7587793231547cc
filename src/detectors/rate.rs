//! Per-user spam rate detector.
//!
//! One sliding window per (tenant, user). Entries are appended in arrival
//! order under the map entry's lock, pruned lazily on every observation and
//! in bulk by the sweep.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Sliding window of message instants for one user in one tenant.
#[derive(Debug, Default)]
struct RateWindow {
    timestamps: VecDeque<Instant>,
}

impl RateWindow {
    /// Drop entries older than `window` relative to `now`.
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&front) = self.timestamps.front() {
            if now.duration_since(front) > window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Spam rate limiter over per-(tenant, user) sliding windows.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<(String, String), RateWindow>,
    window: Duration,
    threshold: usize,
}

impl RateLimiter {
    pub fn new(window: Duration, threshold: usize) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            threshold,
        }
    }

    /// Record one message from `user_id` in `tenant_id` and report whether
    /// the sender just exceeded the rate threshold.
    pub fn observe(&self, tenant_id: &str, user_id: &str) -> bool {
        self.observe_at(tenant_id, user_id, Instant::now())
    }

    pub(crate) fn observe_at(&self, tenant_id: &str, user_id: &str, now: Instant) -> bool {
        let key = (tenant_id.to_string(), user_id.to_string());
        let mut entry = self.windows.entry(key).or_default();
        entry.prune(now, self.window);
        entry.timestamps.push_back(now);
        entry.timestamps.len() > self.threshold
    }

    /// Prune all windows and drop the empty ones. Returns the number of
    /// windows removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub(crate) fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            window.prune(now, self.window);
            !window.timestamps.is_empty()
        });
        before - self.windows.len()
    }

    /// Number of tracked windows (sweep/test observability).
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Duration::from_secs(10), 5)
    }

    #[test]
    fn five_messages_in_window_are_fine() {
        let limiter = limiter();
        let base = Instant::now();
        for i in 0..5 {
            let spam = limiter.observe_at("t1", "u1", base + Duration::from_secs(i));
            assert!(!spam, "message {} should not be spam", i + 1);
        }
    }

    #[test]
    fn sixth_message_in_window_is_spam() {
        let limiter = limiter();
        let base = Instant::now();
        for i in 0..5 {
            limiter.observe_at("t1", "u1", base + Duration::from_millis(i * 100));
        }
        assert!(limiter.observe_at("t1", "u1", base + Duration::from_secs(1)));
    }

    #[test]
    fn old_entries_age_out() {
        let limiter = limiter();
        let base = Instant::now();
        for i in 0..5 {
            limiter.observe_at("t1", "u1", base + Duration::from_millis(i));
        }
        // Eleven seconds later the window is empty again.
        assert!(!limiter.observe_at("t1", "u1", base + Duration::from_secs(11)));
    }

    #[test]
    fn users_do_not_share_windows() {
        let limiter = limiter();
        let base = Instant::now();
        for i in 0..5 {
            limiter.observe_at("t1", "u1", base + Duration::from_millis(i));
            limiter.observe_at("t1", "u2", base + Duration::from_millis(i));
        }
        // Each user is at 5; neither has crossed the threshold.
        assert!(!limiter.observe_at("t1", "u2", base + Duration::from_secs(11)));
    }

    #[test]
    fn tenants_do_not_share_windows() {
        let limiter = limiter();
        let base = Instant::now();
        for i in 0..5 {
            limiter.observe_at("t1", "u1", base + Duration::from_millis(i));
        }
        assert!(!limiter.observe_at("t2", "u1", base + Duration::from_secs(1)));
    }

    #[test]
    fn sweep_drops_empty_windows() {
        let limiter = limiter();
        let base = Instant::now();
        limiter.observe_at("t1", "u1", base);
        limiter.observe_at("t1", "u2", base);
        assert_eq!(limiter.tracked(), 2);

        let removed = limiter.sweep_at(base + Duration::from_secs(60));
        assert_eq!(removed, 2);
        assert_eq!(limiter.tracked(), 0);
    }
}
