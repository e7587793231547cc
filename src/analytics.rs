//! Community analytics counters.
//!
//! In-memory tallies fed by pipeline outcomes: hourly activity per tenant,
//! daily sentiment, a bounded log of unanswered queries, and contributor
//! counts. Flushing to persistent storage is an observability collaborator's
//! job, not the core's.

use chrono::{DateTime, Timelike, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Mutex;

use crate::pipeline::types::Category;

/// Bound on the retained unanswered-query log.
const MAX_UNANSWERED: usize = 100;

/// Member milestones worth celebrating.
const MILESTONES: &[u64] = &[
    100, 250, 500, 1_000, 2_500, 5_000, 10_000, 25_000, 50_000, 100_000,
];

/// Sentiment bucket derived from the closed classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Derive a sentiment from a classification, when one was made.
    pub fn from_category(category: Option<Category>) -> Self {
        match category {
            Some(Category::Greeting) => Self::Positive,
            Some(Category::Toxic) => Self::Negative,
            _ => Self::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentimentCounts {
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
}

/// A query the pipeline could not answer (fallback outcome).
#[derive(Debug, Clone, Serialize)]
pub struct UnansweredQuery {
    pub tenant_id: String,
    pub user_id: String,
    pub query: String,
    pub at: DateTime<Utc>,
}

/// Per-tenant summary snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    /// Messages per hour-of-day, 24 slots.
    pub heatmap: [u64; 24],
    /// Today's sentiment counts.
    pub sentiment: SentimentCounts,
    pub unanswered_count: usize,
    /// Up to the last five unanswered queries.
    pub recent_unanswered: Vec<UnansweredQuery>,
    /// Top contributors as (user_id, count), highest first, capped at five.
    pub top_contributors: Vec<(String, u64)>,
}

/// In-memory analytics tracker.
#[derive(Debug, Default)]
pub struct AnalyticsTracker {
    hourly_activity: DashMap<(String, u32), u64>,
    sentiment: DashMap<(String, String), SentimentCounts>,
    unanswered: Mutex<Vec<UnansweredQuery>>,
    contributors: DashMap<(String, String), u64>,
}

impl AnalyticsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a processed message for the activity heatmap and sentiment.
    pub fn track_message(&self, tenant_id: &str, classification: Option<Category>) {
        self.track_message_at(tenant_id, classification, Utc::now());
    }

    pub(crate) fn track_message_at(
        &self,
        tenant_id: &str,
        classification: Option<Category>,
        now: DateTime<Utc>,
    ) {
        let hour = now.hour();
        *self
            .hourly_activity
            .entry((tenant_id.to_string(), hour))
            .or_insert(0) += 1;

        let date = now.format("%Y-%m-%d").to_string();
        let mut counts = self
            .sentiment
            .entry((tenant_id.to_string(), date))
            .or_default();
        match Sentiment::from_category(classification) {
            Sentiment::Positive => counts.positive += 1,
            Sentiment::Neutral => counts.neutral += 1,
            Sentiment::Negative => counts.negative += 1,
        }
    }

    /// Record a query the pipeline fell back on. The log is bounded; the
    /// oldest entries are dropped first.
    pub fn track_unanswered(&self, tenant_id: &str, user_id: &str, query: &str) {
        let mut log = self.unanswered.lock().expect("unanswered mutex poisoned");
        log.push(UnansweredQuery {
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            query: query.chars().take(200).collect(),
            at: Utc::now(),
        });
        if log.len() > MAX_UNANSWERED {
            let excess = log.len() - MAX_UNANSWERED;
            log.drain(..excess);
        }
    }

    /// Record a helpful contribution by a user.
    pub fn track_contribution(&self, tenant_id: &str, user_id: &str) {
        *self
            .contributors
            .entry((tenant_id.to_string(), user_id.to_string()))
            .or_insert(0) += 1;
    }

    /// True when `member_count` is exactly a celebrated milestone.
    pub fn is_milestone(&self, member_count: u64) -> bool {
        MILESTONES.contains(&member_count)
    }

    /// Snapshot a tenant's analytics.
    pub fn summary(&self, tenant_id: &str) -> AnalyticsSummary {
        self.summary_at(tenant_id, Utc::now())
    }

    pub(crate) fn summary_at(&self, tenant_id: &str, now: DateTime<Utc>) -> AnalyticsSummary {
        let mut heatmap = [0u64; 24];
        for (hour, slot) in heatmap.iter_mut().enumerate() {
            if let Some(count) = self
                .hourly_activity
                .get(&(tenant_id.to_string(), hour as u32))
            {
                *slot = *count;
            }
        }

        let date = now.format("%Y-%m-%d").to_string();
        let sentiment = self
            .sentiment
            .get(&(tenant_id.to_string(), date))
            .map(|c| *c)
            .unwrap_or_default();

        let log = self.unanswered.lock().expect("unanswered mutex poisoned");
        let tenant_unanswered: Vec<UnansweredQuery> = log
            .iter()
            .filter(|q| q.tenant_id == tenant_id)
            .cloned()
            .collect();
        let unanswered_count = tenant_unanswered.len();
        let recent_unanswered = tenant_unanswered
            .iter()
            .rev()
            .take(5)
            .cloned()
            .collect::<Vec<_>>();

        let mut top_contributors: Vec<(String, u64)> = self
            .contributors
            .iter()
            .filter(|entry| entry.key().0 == tenant_id)
            .map(|entry| (entry.key().1.clone(), *entry.value()))
            .collect();
        top_contributors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_contributors.truncate(5);

        AnalyticsSummary {
            heatmap,
            sentiment,
            unanswered_count,
            recent_unanswered,
            top_contributors,
        }
    }
}
