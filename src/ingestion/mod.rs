//! Corpus ingestion: load documents, enrich path metadata, chunk, and
//! reconcile the result against the vector index.

pub mod chunker;
pub mod document;
pub mod identity;
pub mod metadata;
pub mod reconcile;

use std::path::PathBuf;

use tracing::{info, warn};

pub use chunker::{Chunk, Chunker};
pub use document::{CorpusLoader, Document, DocumentLoader, MarkdownLoader, PathTags, PlainTextLoader};
pub use identity::chunk_id;
pub use reconcile::{diff_ids, IndexDiff, ReconcileReport};

use crate::config::Config;
use crate::index::KnowledgeIndex;
use crate::types::KnowledgeError;

/// Summary of one ingestion run.
#[derive(Clone, Debug, Default)]
pub struct IngestReport {
    /// Documents successfully loaded from the corpus.
    pub documents_loaded: usize,
    /// Chunks produced across all documents.
    pub chunks_total: usize,
    /// Files skipped during loading or enrichment, with reasons.
    pub skipped: Vec<(PathBuf, String)>,
    /// Store-level counts from reconciliation.
    pub reconcile: ReconcileReport,
}

/// Drives the full pipeline: corpus directory in, reconciled index out.
pub struct Ingestor {
    config: Config,
    loader: CorpusLoader,
}

impl Ingestor {
    pub fn new(config: Config) -> Self {
        let loader = CorpusLoader::new(&config.knowledge_root);
        Self { config, loader }
    }

    /// Replaces the default loader set, for corpora with custom formats.
    #[must_use]
    pub fn with_loader(mut self, loader: impl DocumentLoader + 'static) -> Self {
        self.loader = self.loader.with_loader(std::sync::Arc::new(loader));
        self
    }

    /// Runs one ingestion pass against the given index.
    ///
    /// Individual unreadable files and out-of-root documents are skipped and
    /// reported; only corpus-wide failures (missing root, invalid chunking
    /// config, a fully failed store write) abort the run.
    pub async fn run(&self, index: &KnowledgeIndex) -> Result<IngestReport, KnowledgeError> {
        let chunker = Chunker::new(self.config.chunk_size, self.config.chunk_overlap)?;

        let outcome = self.loader.load_all().await?;
        let mut skipped = outcome.skipped;

        let mut documents = Vec::with_capacity(outcome.documents.len());
        for doc in outcome.documents {
            let path = doc.source.clone();
            match metadata::enrich(doc, &self.config.knowledge_root) {
                Ok(enriched) => documents.push(enriched),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping document");
                    skipped.push((path, err.to_string()));
                }
            }
        }

        let chunks = chunker.split_documents(&documents);
        let chunks_total = chunks.len();
        info!(
            documents = documents.len(),
            chunks = chunks_total,
            skipped = skipped.len(),
            "corpus prepared"
        );

        let report = reconcile::reconcile(index, chunks).await?;

        Ok(IngestReport {
            documents_loaded: documents.len(),
            chunks_total,
            skipped,
            reconcile: report,
        })
    }
}
