//! Configuration types.

use std::time::Duration;

/// Triage pipeline configuration.
///
/// Every detector threshold and window from the moderation policy lives
/// here so deployments can tune them without touching detector code.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    /// Sliding window for the per-user spam rate detector.
    pub spam_window: Duration,
    /// Messages allowed inside `spam_window` before the next one is spam.
    pub spam_threshold: usize,
    /// Window a raid bucket stays live, measured from first sighting.
    pub raid_window: Duration,
    /// Distinct users posting the same fingerprint that constitute a raid.
    pub raid_user_threshold: usize,
    /// Response cache entry lifetime.
    pub cache_ttl: Duration,
    /// Approximate token budget per knowledge chunk.
    pub chunk_token_budget: usize,
    /// Default number of chunks returned by knowledge search.
    pub search_top_k: usize,
    /// Minimum cosine similarity for a chunk to count as relevant.
    pub min_similarity: f32,
    /// Bound on every external collaborator call (classifier, responder,
    /// embedder, stores).
    pub call_timeout: Duration,
    /// Chance that a detector check also runs an eviction sweep.
    pub sweep_probability: f64,
    /// Interval for the background eviction sweep task.
    pub sweep_interval: Duration,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            spam_window: Duration::from_secs(10),
            spam_threshold: 5,
            raid_window: Duration::from_secs(30),
            raid_user_threshold: 3,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            chunk_token_budget: 500,
            search_top_k: 3,
            min_similarity: 0.3,
            call_timeout: Duration::from_secs(15),
            sweep_probability: 0.01,
            sweep_interval: Duration::from_secs(60),
        }
    }
}
