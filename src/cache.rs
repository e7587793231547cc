//! Tenant-scoped response cache.
//!
//! Sits on top of the collaborator key/value store (`KvStore`). Keys combine
//! the tenant id, a per-tenant invalidation generation, and the shared
//! message fingerprint, so entries can never be observed across tenants and
//! a whole tenant can be invalidated in O(1) by bumping its generation —
//! the orphaned entries age out under the store's TTL.
//!
//! Caching is best-effort everywhere: a missing or failing store degrades to
//! miss/no-op, never to an error the pipeline has to handle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::normalize;

// ── Collaborator contract ───────────────────────────────────────────

/// Minimal key/value store contract (e.g. Redis). May be absent entirely;
/// the pipeline must function, with reduced caching, without it.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError>;
}

/// In-memory `KvStore` for tests and store-less deployments.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: DashMap<String, (String, Instant)>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if let Some(entry) = self.entries.get(key) {
            let (value, expires_at) = entry.value();
            if Instant::now() < *expires_at {
                return Ok(Some(value.clone()));
            }
        }
        // Expired entries are dropped on the next read.
        self.entries.remove_if(key, |_, (_, expires_at)| Instant::now() >= *expires_at);
        Ok(None)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.entries
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }
}

// ── Cache entry ─────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    response: String,
    stored_at: DateTime<Utc>,
}

// ── Response cache ──────────────────────────────────────────────────

/// Tenant-scoped TTL cache over message fingerprints.
pub struct ResponseCache {
    store: Option<Arc<dyn KvStore>>,
    generations: DashMap<String, u64>,
    ttl: Duration,
    op_timeout: Duration,
}

impl ResponseCache {
    pub fn new(store: Option<Arc<dyn KvStore>>, ttl: Duration, op_timeout: Duration) -> Self {
        Self {
            store,
            generations: DashMap::new(),
            ttl,
            op_timeout,
        }
    }

    fn key_for(&self, tenant_id: &str, text: &str) -> String {
        let generation = self.generations.get(tenant_id).map(|g| *g).unwrap_or(0);
        format!(
            "cache:{tenant_id}:{generation}:{}",
            normalize::fingerprint(text)
        )
    }

    /// Look up a cached response. Any store problem is a miss.
    pub async fn get(&self, tenant_id: &str, text: &str) -> Option<String> {
        let store = self.store.as_ref()?;
        let key = self.key_for(tenant_id, text);

        let raw = match tokio::time::timeout(self.op_timeout, store.get(&key)).await {
            Ok(Ok(value)) => value?,
            Ok(Err(e)) => {
                warn!(error = %e, "Cache lookup failed, treating as miss");
                return None;
            }
            Err(_) => {
                warn!(key = %key, "Cache lookup timed out, treating as miss");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Malformed cache entry, treating as miss");
                return None;
            }
        };

        let age = Utc::now().signed_duration_since(entry.stored_at);
        if age.to_std().map(|a| a < self.ttl).unwrap_or(false) {
            debug!(tenant = %tenant_id, "Response cache hit");
            Some(entry.response)
        } else {
            None
        }
    }

    /// Store a response. Empty responses are skipped; failures are logged
    /// and swallowed.
    pub async fn put(&self, tenant_id: &str, text: &str, response: &str) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        if response.is_empty() {
            return;
        }

        let key = self.key_for(tenant_id, text);
        let entry = CacheEntry {
            response: response.to_string(),
            stored_at: Utc::now(),
        };
        let value = match serde_json::to_string(&entry) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        match tokio::time::timeout(self.op_timeout, store.set_with_ttl(&key, &value, self.ttl))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Cache write failed"),
            Err(_) => warn!(key = %key, "Cache write timed out"),
        }
    }

    /// Invalidate every entry for a tenant (knowledge or FAQ changed).
    pub fn invalidate_tenant(&self, tenant_id: &str) {
        let mut generation = self.generations.entry(tenant_id.to_string()).or_insert(0);
        *generation += 1;
        debug!(tenant = %tenant_id, generation = *generation, "Response cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_memory() -> ResponseCache {
        ResponseCache::new(
            Some(Arc::new(MemoryKv::new())),
            Duration::from_secs(24 * 60 * 60),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn round_trip_hit() {
        let cache = cache_with_memory();
        cache.put("t1", "what are the rules?", "Check the rules channel.").await;
        assert_eq!(
            cache.get("t1", "what are the rules?").await.as_deref(),
            Some("Check the rules channel.")
        );
    }

    #[tokio::test]
    async fn normalization_makes_variants_hit() {
        let cache = cache_with_memory();
        cache.put("t1", "What are the RULES?", "Check the rules channel.").await;
        assert!(cache.get("t1", "what are the rules!!").await.is_some());
    }

    #[tokio::test]
    async fn tenants_never_share_entries() {
        let cache = cache_with_memory();
        cache.put("t1", "hello", "hi from t1").await;
        assert!(cache.get("t2", "hello").await.is_none());
    }

    #[tokio::test]
    async fn missing_store_degrades_to_miss() {
        let cache = ResponseCache::new(None, Duration::from_secs(60), Duration::from_secs(1));
        cache.put("t1", "hello", "hi").await;
        assert!(cache.get("t1", "hello").await.is_none());
    }

    #[tokio::test]
    async fn empty_responses_are_not_cached() {
        let cache = cache_with_memory();
        cache.put("t1", "hello", "").await;
        assert!(cache.get("t1", "hello").await.is_none());
    }

    #[tokio::test]
    async fn stale_entries_miss() {
        let store = Arc::new(MemoryKv::new());
        let cache = ResponseCache::new(
            Some(store.clone()),
            Duration::from_secs(24 * 60 * 60),
            Duration::from_secs(1),
        );

        // Hand-write an entry stored 25 hours ago under the live key.
        let key = cache.key_for("t1", "old question");
        let entry = CacheEntry {
            response: "stale answer".into(),
            stored_at: Utc::now() - chrono::Duration::hours(25),
        };
        store
            .set_with_ttl(&key, &serde_json::to_string(&entry).unwrap(), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(cache.get("t1", "old question").await.is_none());
    }

    #[tokio::test]
    async fn invalidation_orphans_old_entries() {
        let cache = cache_with_memory();
        cache.put("t1", "pricing?", "Pro is $49/mo.").await;
        cache.invalidate_tenant("t1");
        assert!(cache.get("t1", "pricing?").await.is_none());

        // Other tenants are untouched.
        cache.put("t2", "pricing?", "Business is $99/mo.").await;
        cache.invalidate_tenant("t1");
        assert!(cache.get("t2", "pricing?").await.is_some());
    }

    #[tokio::test]
    async fn failing_store_is_not_fatal() {
        struct FailingKv;

        #[async_trait]
        impl KvStore for FailingKv {
            async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
                Err(StoreError::Unreachable("connection refused".into()))
            }
            async fn set_with_ttl(
                &self,
                _key: &str,
                _value: &str,
                _ttl: Duration,
            ) -> Result<(), StoreError> {
                Err(StoreError::Unreachable("connection refused".into()))
            }
        }

        let cache = ResponseCache::new(
            Some(Arc::new(FailingKv)),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );
        cache.put("t1", "hello", "hi").await;
        assert!(cache.get("t1", "hello").await.is_none());
    }

    #[tokio::test]
    async fn malformed_entry_is_a_miss() {
        let store = Arc::new(MemoryKv::new());
        let cache = ResponseCache::new(
            Some(store.clone()),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );
        let key = cache.key_for("t1", "hello");
        store
            .set_with_ttl(&key, "not json at all", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(cache.get("t1", "hello").await.is_none());
    }
}
