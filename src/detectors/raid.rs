//! Raid detector.
//!
//! A raid is several distinct users posting the same normalized text inside
//! a short window. Buckets are keyed by (tenant, fingerprint); a bucket's
//! user set only grows while the bucket is live, and a stale bucket is
//! replaced wholesale by a fresh one seeded with the current sender.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug)]
struct RaidBucket {
    first_seen: Instant,
    users: HashSet<String>,
}

/// Tracks identical-message bursts per tenant.
#[derive(Debug)]
pub struct RaidTracker {
    buckets: DashMap<(String, String), RaidBucket>,
    window: Duration,
    user_threshold: usize,
}

impl RaidTracker {
    pub fn new(window: Duration, user_threshold: usize) -> Self {
        Self {
            buckets: DashMap::new(),
            window,
            user_threshold,
        }
    }

    /// Record `user_id` posting `fingerprint` in `tenant_id`; returns true
    /// when the bucket has reached the distinct-user threshold.
    ///
    /// Empty fingerprints (all-punctuation messages) never form buckets.
    pub fn observe(&self, tenant_id: &str, user_id: &str, fingerprint: &str) -> bool {
        self.observe_at(tenant_id, user_id, fingerprint, Instant::now())
    }

    pub(crate) fn observe_at(
        &self,
        tenant_id: &str,
        user_id: &str,
        fingerprint: &str,
        now: Instant,
    ) -> bool {
        if fingerprint.is_empty() {
            return false;
        }

        let key = (tenant_id.to_string(), fingerprint.to_string());
        let mut entry = self.buckets.entry(key).or_insert_with(|| RaidBucket {
            first_seen: now,
            users: HashSet::new(),
        });

        if now.duration_since(entry.first_seen) > self.window {
            // Window expired: restart the bucket with the current sender.
            entry.first_seen = now;
            entry.users.clear();
        }

        entry.users.insert(user_id.to_string());
        entry.users.len() >= self.user_threshold
    }

    /// Drop buckets whose window has expired. Returns the number removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub(crate) fn sweep_at(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.first_seen) <= self.window);
        before - self.buckets.len()
    }

    /// Number of live buckets (sweep/test observability).
    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}
