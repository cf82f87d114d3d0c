//! Interactive chat over an ingested knowledge base.
//!
//! ```text
//! LOREKEEPER_DB=./lorekeeper.sqlite cargo run --example chat
//! ```
//!
//! Questions routed to the knowledge base stream a grounded answer and list
//! the sources used; anything else gets a plain conversational reply. Type
//! `exit` or `quit` to stop.

use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tracing_subscriber::FmtSubscriber;

use lorekeeper::agent::{new_thread_id, ConversationEngine, InMemorySessionStore};
use lorekeeper::config::Config;
use lorekeeper::index::{KnowledgeIndex, SqliteVectorBackend};
use lorekeeper::llm::{OllamaEmbedding, OllamaGeneration};
use lorekeeper::types::KnowledgeError;

#[tokio::main]
async fn main() -> Result<(), KnowledgeError> {
    init_tracing();

    let root = env::var("LOREKEEPER_ROOT").unwrap_or_else(|_| "./knowledge".to_string());
    let db_path = env::var("LOREKEEPER_DB").unwrap_or_else(|_| "./lorekeeper.sqlite".to_string());
    let mut config = Config::new(root, &db_path);
    if let Ok(model) = env::var("LOREKEEPER_GEN_MODEL") {
        config.generation_model = model;
    }
    config.validate()?;

    let embedder = Arc::new(OllamaEmbedding::new(
        &config.embedding_model,
        config.embedding_dimensions,
    )?);
    let backend = SqliteVectorBackend::open(&db_path, config.embedding_dimensions).await?;
    let index = Arc::new(KnowledgeIndex::new(Arc::new(backend), embedder));
    println!("Knowledge base: {} entries", index.count().await?);

    let provider = Arc::new(OllamaGeneration::new(
        &config.generation_model,
        config.generation_temperature,
    )?);
    let sessions = Arc::new(InMemorySessionStore::new());
    let engine = ConversationEngine::new(&config, index, provider, sessions);

    let thread_id = new_thread_id();
    let stdin = io::stdin();
    println!("Ask away (exit/quit to stop).");

    loop {
        print!("\nYou: ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }
        if input.is_empty() {
            println!("Say something first.");
            continue;
        }

        let report = engine
            .process_turn(&thread_id, input, |token| {
                print!("{token}");
                let _ = io::stdout().flush();
            })
            .await?;
        println!();

        if !report.sources.is_empty() && report.retrieved > 0 {
            println!("-- sources --");
            println!("{}", report.sources);
        }
    }

    println!("Bye.");
    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_env_filter("warn").finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
