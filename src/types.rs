//! Shared error type for the knowledge pipeline and conversation engine.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while ingesting documents, talking to model providers,
/// or reading/writing the vector store.
///
/// Variants map onto failure domains so callers can apply the right policy:
/// configuration problems are fatal at startup, per-document problems are
/// skipped and reported, provider failures abort the current batch or turn.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// Invalid configuration (bad paths, chunk sizes, retrieval settings).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A document's source path does not live under the knowledge root.
    #[error("document '{path}' is not under knowledge root '{root}'")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// The embedding service rejected or failed a request.
    #[error("embedding request failed: {0}")]
    Embedding(String),

    /// The generation service rejected or failed a request.
    #[error("generation request failed: {0}")]
    Generation(String),

    /// The vector store failed outside of an attributable per-entry write.
    #[error("storage error: {0}")]
    Storage(String),

    /// Every entry in a store write failed. Partial failures are reported
    /// through [`WriteOutcome`](crate::index::WriteOutcome) instead so runs
    /// with surviving entries are not marked failed.
    #[error("store write failed for all {} entries", failed.len())]
    StoreWrite { failed: Vec<(String, String)> },

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
