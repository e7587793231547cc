//! Chunk store contract — tenant-scoped persistence for knowledge chunks.
//!
//! The real backing store (document database, vector store) is a
//! collaborator; the core only depends on this trait. `MemoryChunkStore`
//! backs tests and deployments without a store, so ingestion and search
//! degrade to in-memory rather than crashing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// One embedded segment of an ingested document. Immutable after creation;
/// removed only by a tenant-scoped clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub tenant_id: String,
    pub document_id: Uuid,
    /// Human-supplied document name, kept for stats/admin listings.
    pub document_name: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// Tenant-scoped chunk persistence.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Append chunks for a tenant.
    async fn put_chunks(
        &self,
        tenant_id: &str,
        chunks: Vec<KnowledgeChunk>,
    ) -> Result<(), StoreError>;

    /// Fetch every chunk belonging to `tenant_id` — and only that tenant.
    async fn chunks_for(&self, tenant_id: &str) -> Result<Vec<KnowledgeChunk>, StoreError>;

    /// Delete all chunks for a tenant. Returns how many were removed.
    async fn clear(&self, tenant_id: &str) -> Result<usize, StoreError>;
}

/// In-memory chunk store.
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    chunks: dashmap::DashMap<String, Vec<KnowledgeChunk>>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn put_chunks(
        &self,
        tenant_id: &str,
        mut chunks: Vec<KnowledgeChunk>,
    ) -> Result<(), StoreError> {
        self.chunks
            .entry(tenant_id.to_string())
            .or_default()
            .append(&mut chunks);
        Ok(())
    }

    async fn chunks_for(&self, tenant_id: &str) -> Result<Vec<KnowledgeChunk>, StoreError> {
        Ok(self
            .chunks
            .get(tenant_id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn clear(&self, tenant_id: &str) -> Result<usize, StoreError> {
        Ok(self
            .chunks
            .remove(tenant_id)
            .map(|(_, chunks)| chunks.len())
            .unwrap_or(0))
    }
}
