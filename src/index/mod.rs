//! Vector index: the persistent, content-addressed home of embedded chunks.
//!
//! [`VectorBackend`] abstracts the storage engine (SQLite with `sqlite-vec`
//! in production, mocks in tests). [`KnowledgeIndex`] layers the embedding
//! service on top and is the only component allowed to mutate the store.

pub mod sqlite;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::EmbeddingProvider;
use crate::types::KnowledgeError;

pub use sqlite::SqliteVectorBackend;

/// The persisted unit inside the vector store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Content-addressed chunk id.
    pub id: String,
    /// Source path of the document the chunk came from.
    pub source: String,
    /// Chunk text.
    pub content: String,
    /// Structured tags (hierarchy levels and the like) as JSON.
    pub metadata: serde_json::Value,
}

/// One similarity-search result, most relevant first.
#[derive(Clone, Debug)]
pub struct SearchHit {
    pub entry: IndexEntry,
    /// Cosine similarity in `[0, 1]`, higher is more relevant.
    pub score: f32,
}

/// Per-id accounting for a store write.
///
/// A write where some entries land and some fail is reported here rather
/// than as an error, so callers never lose track of which ids made it.
#[derive(Clone, Debug, Default)]
pub struct WriteOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl WriteOutcome {
    /// True when every entry was written.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Storage engine contract. Implementations are treated as single-writer
/// during an ingestion run; readers may observe partially applied updates.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// All ids currently present, with no vector or content fetch.
    async fn list_ids(&self) -> Result<HashSet<String>, KnowledgeError>;

    /// Writes entries keyed by id, overwriting existing rows. Failures are
    /// attributed per id in the returned outcome.
    async fn upsert(
        &self,
        entries: Vec<(IndexEntry, Vec<f32>)>,
    ) -> Result<WriteOutcome, KnowledgeError>;

    /// Removes the given ids. Absent ids count as removed.
    async fn delete(&self, ids: &[String]) -> Result<WriteOutcome, KnowledgeError>;

    /// Top-`k` entries by descending similarity to the query vector.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, KnowledgeError>;

    /// Number of entries in the store.
    async fn count(&self) -> Result<usize, KnowledgeError>;
}

/// Owns the vector store handle and the embedding service.
///
/// All mutation of the underlying store goes through this type. Embedding
/// happens before any write, so an embedding failure leaves the store
/// untouched for that batch.
#[derive(Clone)]
pub struct KnowledgeIndex {
    backend: Arc<dyn VectorBackend>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl KnowledgeIndex {
    pub fn new(backend: Arc<dyn VectorBackend>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { backend, embedder }
    }

    /// Ids currently persisted, for reconciliation diffs.
    pub async fn existing_ids(&self) -> Result<HashSet<String>, KnowledgeError> {
        self.backend.list_ids().await
    }

    /// Embeds and writes the given entries. Returns per-id accounting.
    pub async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<WriteOutcome, KnowledgeError> {
        if entries.is_empty() {
            return Ok(WriteOutcome::default());
        }

        let texts: Vec<String> = entries.iter().map(|e| e.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != entries.len() {
            return Err(KnowledgeError::Embedding(format!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                entries.len()
            )));
        }

        let rows: Vec<(IndexEntry, Vec<f32>)> = entries.into_iter().zip(vectors).collect();
        self.backend.upsert(rows).await
    }

    /// Removes the given ids from the store.
    pub async fn delete(&self, ids: &[String]) -> Result<WriteOutcome, KnowledgeError> {
        if ids.is_empty() {
            return Ok(WriteOutcome::default());
        }
        self.backend.delete(ids).await
    }

    /// Embeds `query` and returns the top-`k` entries by relevance.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, KnowledgeError> {
        let vector = self.embedder.embed(query).await?;
        self.backend.search(&vector, k).await
    }

    pub async fn count(&self) -> Result<usize, KnowledgeError> {
        self.backend.count().await
    }
}
