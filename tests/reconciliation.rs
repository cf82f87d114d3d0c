//! Integration tests for incremental indexing: diff computation, minimal
//! store mutation, idempotent re-runs, and the end-to-end corpus pipeline.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::fs;

use lorekeeper::config::Config;
use lorekeeper::index::{
    IndexEntry, KnowledgeIndex, SearchHit, SqliteVectorBackend, VectorBackend, WriteOutcome,
};
use lorekeeper::ingestion::chunker::Chunk;
use lorekeeper::ingestion::{chunk_id, reconcile, Ingestor, PathTags};
use lorekeeper::llm::{EmbeddingProvider, MockEmbeddingProvider};
use lorekeeper::types::KnowledgeError;

/// In-memory backend that records every mutation for assertions.
#[derive(Default)]
struct RecordingBackend {
    ids: Mutex<HashSet<String>>,
    upserted: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    /// Ids whose upsert should be rejected.
    reject: HashSet<String>,
}

impl RecordingBackend {
    fn seeded(ids: &[&str]) -> Self {
        Self {
            ids: Mutex::new(ids.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    fn rejecting(ids: &[&str]) -> Self {
        Self {
            reject: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl VectorBackend for RecordingBackend {
    async fn list_ids(&self) -> Result<HashSet<String>, KnowledgeError> {
        Ok(self.ids.lock().clone())
    }

    async fn upsert(
        &self,
        entries: Vec<(IndexEntry, Vec<f32>)>,
    ) -> Result<WriteOutcome, KnowledgeError> {
        let mut outcome = WriteOutcome::default();
        for (entry, _) in entries {
            if self.reject.contains(&entry.id) {
                outcome.failed.push((entry.id, "rejected".to_string()));
                continue;
            }
            self.ids.lock().insert(entry.id.clone());
            self.upserted.lock().push(entry.id.clone());
            outcome.succeeded.push(entry.id);
        }
        Ok(outcome)
    }

    async fn delete(&self, ids: &[String]) -> Result<WriteOutcome, KnowledgeError> {
        let mut outcome = WriteOutcome::default();
        for id in ids {
            self.ids.lock().remove(id);
            self.deleted.lock().push(id.clone());
            outcome.succeeded.push(id.clone());
        }
        Ok(outcome)
    }

    async fn search(&self, _query: &[f32], _k: usize) -> Result<Vec<SearchHit>, KnowledgeError> {
        Ok(Vec::new())
    }

    async fn count(&self) -> Result<usize, KnowledgeError> {
        Ok(self.ids.lock().len())
    }
}

/// Embedding provider that counts how many texts it was asked to embed.
struct CountingEmbedder {
    inner: MockEmbeddingProvider,
    calls: Mutex<usize>,
}

impl CountingEmbedder {
    fn new() -> Self {
        Self {
            inner: MockEmbeddingProvider::new(),
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError> {
        *self.calls.lock() += texts.len();
        self.inner.embed_batch(texts).await
    }
}

fn chunk(id: &str, source: &str, text: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        source: source.to_string(),
        text: text.to_string(),
        tags: PathTags::default(),
    }
}

#[tokio::test]
async fn reconciliation_applies_minimal_mutations() {
    let backend = Arc::new(RecordingBackend::seeded(&["a", "b", "c"]));
    let index = KnowledgeIndex::new(backend.clone(), Arc::new(MockEmbeddingProvider::new()));

    let chunks = vec![
        chunk("b", "/kb/b.md", "b text"),
        chunk("c", "/kb/c.md", "c text"),
        chunk("d", "/kb/d.md", "d text"),
    ];
    let report = reconcile::reconcile(&index, chunks).await.unwrap();

    assert_eq!(report.added, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.unchanged, 2);
    assert!(report.failed.is_empty());
    assert_eq!(*backend.upserted.lock(), vec!["d".to_string()]);
    assert_eq!(*backend.deleted.lock(), vec!["a".to_string()]);
}

#[tokio::test]
async fn unchanged_corpus_touches_nothing_on_rerun() {
    let backend = Arc::new(RecordingBackend::default());
    let embedder = Arc::new(CountingEmbedder::new());
    let index = KnowledgeIndex::new(backend.clone(), embedder.clone());

    let chunks = vec![
        chunk("x", "/kb/x.md", "x text"),
        chunk("y", "/kb/y.md", "y text"),
    ];

    let first = reconcile::reconcile(&index, chunks.clone()).await.unwrap();
    assert_eq!(first.added, 2);
    let embed_calls_after_first = *embedder.calls.lock();

    let second = reconcile::reconcile(&index, chunks).await.unwrap();
    assert_eq!(second.added, 0);
    assert_eq!(second.deleted, 0);
    assert_eq!(second.unchanged, 2);
    assert!(backend.deleted.lock().is_empty());
    assert_eq!(backend.upserted.lock().len(), 2);
    assert_eq!(
        *embedder.calls.lock(),
        embed_calls_after_first,
        "unchanged content must not be re-embedded"
    );
}

#[tokio::test]
async fn duplicate_chunk_ids_collapse_to_one_entry() {
    let backend = Arc::new(RecordingBackend::default());
    let index = KnowledgeIndex::new(backend.clone(), Arc::new(MockEmbeddingProvider::new()));

    let chunks = vec![
        chunk("same", "/kb/a.md", "shared text"),
        chunk("same", "/kb/a.md", "shared text"),
    ];
    let report = reconcile::reconcile(&index, chunks).await.unwrap();

    assert_eq!(report.added, 1);
    assert_eq!(backend.upserted.lock().len(), 1);
}

#[tokio::test]
async fn partial_upsert_failure_is_reported_per_id() {
    let backend = Arc::new(RecordingBackend::rejecting(&["bad"]));
    let index = KnowledgeIndex::new(backend.clone(), Arc::new(MockEmbeddingProvider::new()));

    let chunks = vec![
        chunk("good", "/kb/g.md", "fine"),
        chunk("bad", "/kb/b.md", "rejected"),
    ];
    let report = reconcile::reconcile(&index, chunks).await.unwrap();

    assert_eq!(report.added, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "bad");
    assert_eq!(*backend.upserted.lock(), vec!["good".to_string()]);
}

async fn write_corpus(root: &std::path::Path) {
    fs::create_dir_all(root.join("docs/guides")).await.unwrap();
    fs::write(
        root.join("docs/guides/intro.md"),
        "# Intro\n\nThe knowledge base covers schema design and operational runbooks.\n",
    )
    .await
    .unwrap();
    fs::write(
        root.join("docs/schema.sql"),
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);\n",
    )
    .await
    .unwrap();
    fs::write(
        root.join("deploy.sh"),
        "#!/bin/sh\nset -eu\necho deploying\n",
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn end_to_end_ingest_and_incremental_update() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("kb");
    write_corpus(&root).await;

    let embedder = Arc::new(MockEmbeddingProvider::new());
    let backend = SqliteVectorBackend::open(dir.path().join("store.db"), embedder.dimensions())
        .await
        .unwrap();
    let index = KnowledgeIndex::new(Arc::new(backend), embedder);

    let config = Config::new(&root, dir.path().join("store.db")).with_chunking(1000, 200);
    let ingestor = Ingestor::new(config);

    let report = ingestor.run(&index).await.unwrap();
    assert_eq!(report.documents_loaded, 3);
    assert!(report.skipped.is_empty());
    assert_eq!(report.reconcile.added, report.chunks_total);
    assert_eq!(index.count().await.unwrap(), report.chunks_total);

    let before = index.existing_ids().await.unwrap();
    let script_source = root.join("deploy.sh").to_string_lossy().into_owned();
    let old_script_id = chunk_id(&script_source, "#!/bin/sh\nset -eu\necho deploying\n");
    assert!(before.contains(&old_script_id));

    // Mutate one file; only its chunk ids may churn.
    fs::write(
        root.join("deploy.sh"),
        "#!/bin/sh\nset -eu\necho deploying v2\n",
    )
    .await
    .unwrap();

    let second = ingestor.run(&index).await.unwrap();
    assert_eq!(second.reconcile.added, 1);
    assert_eq!(second.reconcile.deleted, 1);
    assert_eq!(second.reconcile.unchanged, report.chunks_total - 1);

    let after = index.existing_ids().await.unwrap();
    assert!(!after.contains(&old_script_id));
    let new_script_id = chunk_id(&script_source, "#!/bin/sh\nset -eu\necho deploying v2\n");
    assert!(after.contains(&new_script_id));

    let untouched: HashSet<_> = before.intersection(&after).collect();
    assert_eq!(untouched.len(), report.chunks_total - 1);

    // Third run with no changes is a no-op.
    let third = ingestor.run(&index).await.unwrap();
    assert_eq!(third.reconcile.added, 0);
    assert_eq!(third.reconcile.deleted, 0);
}
