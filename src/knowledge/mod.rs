//! Knowledge retrieval — chunk, embed, store, rank.
//!
//! Backs the FAQ fallback and "complex" grounding paths. All data is hard
//! tenant-scoped: ingestion tags every chunk, search only ever fetches one
//! tenant's chunks, and clearing is per tenant.

pub mod chunker;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::TriageConfig;
use crate::llm::Embedder;
use crate::store::{ChunkStore, KnowledgeChunk, MemoryChunkStore};

/// Stats for a tenant's knowledge base (admin surface).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct KnowledgeStats {
    pub total_chunks: usize,
    pub documents: usize,
    pub document_names: Vec<String>,
}

/// Multi-tenant knowledge base.
pub struct KnowledgeBase {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn ChunkStore>,
    /// Per-tenant chunk cache; invalidated on ingest/clear.
    chunk_cache: DashMap<String, Arc<Vec<KnowledgeChunk>>>,
    chunk_token_budget: usize,
    min_similarity: f32,
    embed_timeout: Duration,
}

impl KnowledgeBase {
    /// Create a knowledge base. Passing `None` for the store degrades to
    /// in-memory-only persistence.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Option<Arc<dyn ChunkStore>>,
        config: &TriageConfig,
    ) -> Self {
        Self {
            embedder,
            store: store.unwrap_or_else(|| Arc::new(MemoryChunkStore::new())),
            chunk_cache: DashMap::new(),
            chunk_token_budget: config.chunk_token_budget,
            min_similarity: config.min_similarity,
            embed_timeout: config.call_timeout,
        }
    }

    /// Ingest a document: chunk, embed, store under `tenant_id`.
    ///
    /// Returns the number of chunks stored. Per-chunk embedding failures are
    /// logged and skipped; a failing store falls back to the in-process
    /// cache so the content remains searchable until restart.
    pub async fn ingest(&self, tenant_id: &str, content: &str, document_name: &str) -> usize {
        let pieces = chunker::chunk_text(content, self.chunk_token_budget);
        info!(
            tenant = %tenant_id,
            document = %document_name,
            chars = content.len(),
            chunks = pieces.len(),
            "Ingesting document"
        );

        let document_id = Uuid::new_v4();
        let mut chunks = Vec::with_capacity(pieces.len());
        for (index, text) in pieces.into_iter().enumerate() {
            match self.embed(&text).await {
                Some(embedding) => chunks.push(KnowledgeChunk {
                    tenant_id: tenant_id.to_string(),
                    document_id,
                    document_name: document_name.to_string(),
                    chunk_index: index,
                    text,
                    embedding,
                    created_at: Utc::now(),
                }),
                None => {
                    warn!(
                        tenant = %tenant_id,
                        document = %document_name,
                        chunk = index,
                        "Failed to embed chunk, skipping"
                    );
                }
            }
        }

        let stored = chunks.len();
        if stored == 0 {
            return 0;
        }

        if let Err(e) = self.store.put_chunks(tenant_id, chunks.clone()).await {
            warn!(error = %e, tenant = %tenant_id, "Chunk store write failed, keeping chunks in memory");
            let mut cached: Vec<KnowledgeChunk> = self
                .chunk_cache
                .get(tenant_id)
                .map(|entry| entry.as_ref().clone())
                .unwrap_or_default();
            cached.extend(chunks);
            self.chunk_cache
                .insert(tenant_id.to_string(), Arc::new(cached));
        } else {
            // Stored fresh chunks; drop the stale cache for this tenant.
            self.chunk_cache.remove(tenant_id);
        }

        stored
    }

    /// Search the tenant's knowledge for `query`.
    ///
    /// Chunks are cosine-ranked against the query embedding, sorted
    /// descending, capped at `top_k`, and filtered below the similarity
    /// floor. Any failure returns an empty result.
    pub async fn search(&self, tenant_id: &str, query: &str, top_k: usize) -> Vec<String> {
        let Some(query_embedding) = self.embed(query).await else {
            warn!(tenant = %tenant_id, "Query embedding failed, returning no results");
            return Vec::new();
        };

        let chunks = self.tenant_chunks(tenant_id).await;
        if chunks.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f32, &KnowledgeChunk)> = chunks
            .iter()
            .map(|chunk| (cosine_similarity(&query_embedding, &chunk.embedding), chunk))
            .collect();
        // Stable sort keeps equal-score chunks in ingestion order, so
        // repeated searches over unchanged data return the same ranking.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let results: Vec<String> = scored
            .into_iter()
            .take(top_k)
            .filter(|(score, _)| *score >= self.min_similarity)
            .map(|(_, chunk)| chunk.text.clone())
            .collect();

        debug!(
            tenant = %tenant_id,
            candidates = chunks.len(),
            relevant = results.len(),
            "Knowledge search complete"
        );
        results
    }

    /// Delete all knowledge for a tenant. Returns the number of chunks
    /// removed from the store.
    pub async fn clear(&self, tenant_id: &str) -> usize {
        self.chunk_cache.remove(tenant_id);
        match self.store.clear(tenant_id).await {
            Ok(removed) => {
                info!(tenant = %tenant_id, removed, "Cleared tenant knowledge");
                removed
            }
            Err(e) => {
                warn!(error = %e, tenant = %tenant_id, "Chunk store clear failed");
                0
            }
        }
    }

    /// Chunk/document counts for a tenant.
    pub async fn stats(&self, tenant_id: &str) -> KnowledgeStats {
        let chunks = self.tenant_chunks(tenant_id).await;
        let mut document_names: Vec<String> =
            chunks.iter().map(|c| c.document_name.clone()).collect();
        document_names.sort();
        document_names.dedup();

        KnowledgeStats {
            total_chunks: chunks.len(),
            documents: document_names.len(),
            document_names,
        }
    }

    /// Fetch a tenant's chunks, via the in-process cache when warm.
    async fn tenant_chunks(&self, tenant_id: &str) -> Arc<Vec<KnowledgeChunk>> {
        if let Some(cached) = self.chunk_cache.get(tenant_id) {
            return Arc::clone(cached.value());
        }

        let chunks = match self.store.chunks_for(tenant_id).await {
            Ok(chunks) => Arc::new(chunks),
            Err(e) => {
                warn!(error = %e, tenant = %tenant_id, "Chunk fetch failed");
                return Arc::new(Vec::new());
            }
        };

        self.chunk_cache
            .insert(tenant_id.to_string(), Arc::clone(&chunks));
        chunks
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        match tokio::time::timeout(self.embed_timeout, self.embedder.embed(text)).await {
            Ok(Ok(embedding)) => Some(embedding),
            Ok(Err(e)) => {
                warn!(error = %e, "Embedding call failed");
                None
            }
            Err(_) => {
                warn!("Embedding call timed out");
                None
            }
        }
    }
}

/// Cosine similarity; 0 for mismatched, empty, or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 { 0.0 } else { dot / denominator }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;

    /// Embedder that maps known keywords onto fixed axes so similarity is
    /// predictable in tests.
    struct KeywordEmbedder;

    #[async_trait::async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
            let lower = text.to_lowercase();
            Ok(vec![
                if lower.contains("refund") { 1.0 } else { 0.0 },
                if lower.contains("shipping") { 1.0 } else { 0.0 },
                if lower.contains("banana") { 1.0 } else { 0.0 },
            ])
        }
    }

    /// Embedder that always fails.
    struct BrokenEmbedder;

    #[async_trait::async_trait]
    impl Embedder for BrokenEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
            Err(LlmError::RequestFailed {
                provider: "broken".into(),
                reason: "nope".into(),
            })
        }
    }

    fn kb() -> KnowledgeBase {
        KnowledgeBase::new(
            Arc::new(KeywordEmbedder),
            Some(Arc::new(MemoryChunkStore::new())),
            &TriageConfig::default(),
        )
    }

    #[tokio::test]
    async fn ingest_then_search_returns_best_chunk_first() {
        let kb = kb();
        let stored = kb
            .ingest(
                "t1",
                "Refund requests are handled within 7 days. Shipping takes 3 weeks.",
                "policies",
            )
            .await;
        assert_eq!(stored, 1);

        // Split into two documents so the axes separate.
        kb.ingest("t1", "All about shipping times and carriers", "shipping").await;

        let results = kb.search("t1", "how do I get a refund", 3).await;
        assert!(!results.is_empty());
        assert!(results[0].contains("Refund"));
    }

    #[tokio::test]
    async fn search_filters_below_similarity_floor() {
        let kb = kb();
        kb.ingest("t1", "Bananas are yellow fruit", "fruit").await;

        // Query shares no axis with the stored chunk: similarity 0 < 0.3.
        let results = kb.search("t1", "refund please", 3).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn search_respects_top_k() {
        let kb = kb();
        for i in 0..5 {
            kb.ingest("t1", &format!("refund policy variant {i}"), "doc").await;
        }
        let results = kb.search("t1", "refund", 2).await;
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn search_is_tenant_isolated() {
        let kb = kb();
        kb.ingest("t1", "refund policy for tenant one", "doc").await;
        assert!(kb.search("t2", "refund", 3).await.is_empty());
    }

    #[tokio::test]
    async fn repeated_search_is_idempotent() {
        let kb = kb();
        kb.ingest("t1", "Refunds take 7 days", "a").await;
        kb.ingest("t1", "Refunds need a receipt", "b").await;

        let first = kb.search("t1", "refund", 3).await;
        let second = kb.search("t1", "refund", 3).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn clear_removes_tenant_knowledge() {
        let kb = kb();
        kb.ingest("t1", "refund policy here", "doc").await;
        kb.ingest("t2", "refund policy there", "doc").await;

        let removed = kb.clear("t1").await;
        assert_eq!(removed, 1);
        assert!(kb.search("t1", "refund", 3).await.is_empty());
        assert!(!kb.search("t2", "refund", 3).await.is_empty());
    }

    #[tokio::test]
    async fn broken_embedder_skips_chunks_and_searches_empty() {
        let kb = KnowledgeBase::new(
            Arc::new(BrokenEmbedder),
            Some(Arc::new(MemoryChunkStore::new())),
            &TriageConfig::default(),
        );
        let stored = kb.ingest("t1", "Some content worth keeping.", "doc").await;
        assert_eq!(stored, 0);
        assert!(kb.search("t1", "anything", 3).await.is_empty());
    }

    #[tokio::test]
    async fn stats_counts_documents_and_chunks() {
        let kb = kb();
        kb.ingest("t1", "refund info", "refunds.md").await;
        kb.ingest("t1", "shipping info", "shipping.md").await;

        let stats = kb.stats("t1").await;
        assert_eq!(stats.total_chunks, 2);
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.document_names, vec!["refunds.md", "shipping.md"]);
    }

    #[test]
    fn cosine_similarity_basics() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
