//! Instant detector bank — free checks that run before any paid call.
//!
//! Fixed priority, first match wins:
//! 1. PII patterns → delete
//! 2. Phishing lookalikes → delete
//! 3. Obfuscated/zalgo text → delete
//! 4. Spam rate (per-user sliding window) → timeout
//! 5. Raid (distinct users, identical fingerprint) → timeout
//!
//! No check suspends or touches I/O; everything is O(|text|) plus the
//! window size. Stale window state is evicted probabilistically on the hot
//! path and periodically by a background sweep task.

pub mod patterns;
pub mod rate;
pub mod raid;

use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::TriageConfig;
use crate::normalize;
use crate::pipeline::types::{Category, InboundMessage, ModerationAction};
use patterns::PatternBank;
use rate::RateLimiter;
use raid::RaidTracker;

/// A positive detector verdict, carrying the canned user-facing notice.
#[derive(Debug, Clone)]
pub struct Detection {
    pub classification: Category,
    pub action: ModerationAction,
    pub response: String,
}

/// The detector bank. One instance per process, shared across message tasks.
pub struct DetectorBank {
    patterns: PatternBank,
    rate: RateLimiter,
    raid: RaidTracker,
    sweep_probability: f64,
}

impl DetectorBank {
    pub fn new(config: &TriageConfig) -> Self {
        Self {
            patterns: PatternBank::new(),
            rate: RateLimiter::new(config.spam_window, config.spam_threshold),
            raid: RaidTracker::new(config.raid_window, config.raid_user_threshold),
            sweep_probability: config.sweep_probability,
        }
    }

    /// Run all checks against a message in priority order.
    pub fn check(&self, message: &InboundMessage) -> Option<Detection> {
        self.check_at(message, Instant::now())
    }

    pub(crate) fn check_at(&self, message: &InboundMessage, now: Instant) -> Option<Detection> {
        // Occasionally piggyback an eviction sweep on a check.
        if rand::thread_rng().gen_bool(self.sweep_probability) {
            self.sweep_at(now);
        }

        if let Some(family) = self.patterns.check_pii(&message.text) {
            debug!(
                tenant = %message.tenant_id,
                user = %message.user_id,
                family,
                "PII pattern matched"
            );
            return Some(Detection {
                classification: Category::Pii,
                action: ModerationAction::Delete,
                response: PII_NOTICE.to_string(),
            });
        }

        if let Some(fragment) = self.patterns.check_phishing(&message.text) {
            debug!(
                tenant = %message.tenant_id,
                user = %message.user_id,
                fragment,
                "Phishing fragment matched"
            );
            return Some(Detection {
                classification: Category::Phishing,
                action: ModerationAction::Delete,
                response: PHISHING_NOTICE.to_string(),
            });
        }

        if patterns::has_zalgo(&message.text) {
            debug!(
                tenant = %message.tenant_id,
                user = %message.user_id,
                "Obfuscated text detected"
            );
            return Some(Detection {
                classification: Category::Zalgo,
                action: ModerationAction::Delete,
                response: ZALGO_NOTICE.to_string(),
            });
        }

        if self
            .rate
            .observe_at(&message.tenant_id, &message.user_id, now)
        {
            info!(
                tenant = %message.tenant_id,
                user = %message.user_id,
                "Spam rate exceeded"
            );
            return Some(Detection {
                classification: Category::Spam,
                action: ModerationAction::Timeout,
                response: SPAM_NOTICE.to_string(),
            });
        }

        let fp = normalize::fingerprint(&message.text);
        if self
            .raid
            .observe_at(&message.tenant_id, &message.user_id, &fp, now)
        {
            info!(
                tenant = %message.tenant_id,
                fingerprint = %fp,
                "Raid threshold reached"
            );
            return Some(Detection {
                classification: Category::Raid,
                action: ModerationAction::Timeout,
                response: RAID_NOTICE.to_string(),
            });
        }

        None
    }

    /// Evict empty rate windows and stale raid buckets.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub(crate) fn sweep_at(&self, now: Instant) -> usize {
        let removed = self.rate.sweep_at(now) + self.raid.sweep_at(now);
        if removed > 0 {
            debug!(removed, "Detector sweep evicted stale state");
        }
        removed
    }

    /// Spawn the periodic sweep task. Runs until the handle is aborted;
    /// never blocks message tasks.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: std::time::Duration) -> JoinHandle<()> {
        let bank = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                bank.sweep();
            }
        })
    }
}

// Canned notices. No paid call is ever made for a detector verdict.
const PII_NOTICE: &str =
    "That message looked like it contained personal information, so it was removed. \
     Please keep phone numbers, emails, and addresses out of public channels.";
const PHISHING_NOTICE: &str =
    "That link looked like a phishing attempt and was removed. Stay safe out there.";
const ZALGO_NOTICE: &str =
    "That message used obfuscated text and was removed. Please post readable text.";
const SPAM_NOTICE: &str =
    "Slow down! You're sending messages too quickly and have been timed out briefly.";
const RAID_NOTICE: &str =
    "Coordinated identical messages detected. Moderators have been alerted.";
