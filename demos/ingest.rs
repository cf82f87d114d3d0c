//! Ingests a document corpus into the local vector store.
//!
//! ```text
//! LOREKEEPER_ROOT=./knowledge \
//! LOREKEEPER_DB=./lorekeeper.sqlite \
//! cargo run --example ingest
//! ```
//!
//! Set `LOREKEEPER_MOCK=1` to use deterministic hash embeddings instead of
//! a running Ollama server.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing_subscriber::FmtSubscriber;

use lorekeeper::config::Config;
use lorekeeper::index::{KnowledgeIndex, SqliteVectorBackend};
use lorekeeper::ingestion::Ingestor;
use lorekeeper::llm::{EmbeddingProvider, MockEmbeddingProvider, OllamaEmbedding};
use lorekeeper::types::KnowledgeError;

#[tokio::main]
async fn main() -> Result<(), KnowledgeError> {
    init_tracing();

    let root = env::var("LOREKEEPER_ROOT").unwrap_or_else(|_| "./knowledge".to_string());
    let db_path = env::var("LOREKEEPER_DB").unwrap_or_else(|_| "./lorekeeper.sqlite".to_string());
    let db_path = PathBuf::from(db_path);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut config = Config::new(root, &db_path);
    if let Ok(model) = env::var("LOREKEEPER_EMBED_MODEL") {
        config.embedding_model = model;
    }
    if let Some(dims) = env::var("LOREKEEPER_EMBED_DIMS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
    {
        config.embedding_dimensions = dims;
    }
    config.validate()?;

    let use_mock = env::var("LOREKEEPER_MOCK")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let embedder: Arc<dyn EmbeddingProvider> = if use_mock {
        Arc::new(MockEmbeddingProvider::with_dimensions(
            config.embedding_dimensions,
        ))
    } else {
        Arc::new(OllamaEmbedding::new(
            &config.embedding_model,
            config.embedding_dimensions,
        )?)
    };

    let backend = SqliteVectorBackend::open(&db_path, config.embedding_dimensions).await?;
    let index = KnowledgeIndex::new(Arc::new(backend), embedder);

    let started = Instant::now();
    let report = Ingestor::new(config).run(&index).await?;

    println!("Ingestion finished in {:.2?}", started.elapsed());
    println!("  documents loaded : {}", report.documents_loaded);
    println!("  chunks produced  : {}", report.chunks_total);
    println!("  added / deleted  : {} / {}", report.reconcile.added, report.reconcile.deleted);
    println!("  unchanged        : {}", report.reconcile.unchanged);
    println!("  store size       : {}", index.count().await?);

    if !report.skipped.is_empty() {
        println!("  skipped files ({}):", report.skipped.len());
        for (path, reason) in &report.skipped {
            println!("    {} ({reason})", path.display());
        }
    }
    if !report.reconcile.failed.is_empty() {
        println!("  failed writes ({}):", report.reconcile.failed.len());
        for (id, reason) in &report.reconcile.failed {
            println!("    {id} ({reason})");
        }
    }

    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_env_filter("info").finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
