//! Application configuration.
//!
//! One [`Config`] is constructed at process start and handed into each
//! component's constructor. There is no global lookup; components hold the
//! values (or clones) they need.

use std::path::PathBuf;

use crate::types::KnowledgeError;

/// Settings for the ingestion pipeline, the vector store, and the
/// conversation engine.
#[derive(Clone, Debug)]
pub struct Config {
    /// Root directory of the document corpus. Every ingested document must
    /// live under this path.
    pub knowledge_root: PathBuf,
    /// SQLite database file backing the vector store.
    pub store_path: PathBuf,
    /// Name of the embedding model exposed by the provider.
    pub embedding_model: String,
    /// Dimensionality of the embedding vectors. The store's vector table is
    /// created with this width.
    pub embedding_dimensions: usize,
    /// Name of the generation model exposed by the provider.
    pub generation_model: String,
    /// Sampling temperature for answer generation.
    pub generation_temperature: f64,
    /// Maximum chunk width in characters.
    pub chunk_size: usize,
    /// Characters of overlap carried between consecutive chunks of one
    /// document. Must be strictly less than `chunk_size`.
    pub chunk_overlap: usize,
    /// Number of chunks fetched per retrieval.
    pub retrieval_k: usize,
    /// Message count past which older history is folded into a summary.
    pub summary_threshold: usize,
    /// Most recent messages kept verbatim when summarizing.
    pub keep_recent_messages: usize,
}

impl Config {
    /// Creates a configuration with defaults for everything except the two
    /// paths, which have no sensible default.
    pub fn new(knowledge_root: impl Into<PathBuf>, store_path: impl Into<PathBuf>) -> Self {
        Self {
            knowledge_root: knowledge_root.into(),
            store_path: store_path.into(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_dimensions: 768,
            generation_model: "qwen2.5:3b".to_string(),
            generation_temperature: 0.3,
            chunk_size: 1000,
            chunk_overlap: 200,
            retrieval_k: 5,
            summary_threshold: 20,
            keep_recent_messages: 6,
        }
    }

    #[must_use]
    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }

    #[must_use]
    pub fn with_models(
        mut self,
        embedding_model: impl Into<String>,
        generation_model: impl Into<String>,
    ) -> Self {
        self.embedding_model = embedding_model.into();
        self.generation_model = generation_model.into();
        self
    }

    #[must_use]
    pub fn with_retrieval_k(mut self, k: usize) -> Self {
        self.retrieval_k = k;
        self
    }

    /// Validates the configuration. Call once at startup; a failure here is
    /// fatal.
    pub fn validate(&self) -> Result<(), KnowledgeError> {
        if self.chunk_size == 0 {
            return Err(KnowledgeError::Config(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(KnowledgeError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.retrieval_k == 0 {
            return Err(KnowledgeError::Config(
                "retrieval_k must be greater than zero".into(),
            ));
        }
        if self.embedding_dimensions == 0 {
            return Err(KnowledgeError::Config(
                "embedding_dimensions must be greater than zero".into(),
            ));
        }
        if self.keep_recent_messages > self.summary_threshold {
            return Err(KnowledgeError::Config(format!(
                "keep_recent_messages ({}) must not exceed summary_threshold ({})",
                self.keep_recent_messages, self.summary_threshold
            )));
        }
        Ok(())
    }
}
