//! ```text
//! Corpus directory ──► ingestion::CorpusLoader ──► metadata::enrich
//!                                                      │
//!                                 Chunker ◄────────────┘
//!                                    │
//!            chunk ids (identity) ──►│──► reconcile::diff_ids
//!                                    │          │
//!                                    ▼          ▼
//!                        index::KnowledgeIndex (SQLite + sqlite-vec)
//!                                    ▲
//!                                    │ similarity_search
//! User turn ──► agent::IntentRouter ─┤
//!                   │ general        │ query
//!                   ▼                ▼
//!           canned reply   agent::RetrievalAugmentedResponder
//!                   └────────┬───────┘
//!                            ▼
//!              agent::ConversationEngine ──► SessionStore
//! ```
//!
pub mod agent;
pub mod config;
pub mod index;
pub mod ingestion;
pub mod llm;
pub mod message;
pub mod types;

pub use agent::{ConversationEngine, InMemorySessionStore, IntentRouter, SessionStore};
pub use config::Config;
pub use index::{IndexEntry, KnowledgeIndex, SearchHit, SqliteVectorBackend, VectorBackend};
pub use ingestion::{IngestReport, Ingestor};
pub use llm::{EmbeddingProvider, GenerationProvider, MockEmbeddingProvider, TokenStream};
pub use message::Message;
pub use types::KnowledgeError;
