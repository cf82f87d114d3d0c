//! Provider seams for the embedding and generation services.
//!
//! The rest of the crate only sees the two traits in this module; concrete
//! backends live behind them. [`ollama`] wires both traits to a local Ollama
//! server, and [`MockEmbeddingProvider`] gives deterministic vectors for
//! tests and offline runs.

pub mod ollama;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::message::Message;
use crate::types::KnowledgeError;

pub use ollama::{OllamaEmbedding, OllamaGeneration};

/// A finite, non-restartable sequence of generated text tokens.
pub type TokenStream = BoxStream<'static, Result<String, KnowledgeError>>;

/// Produces embedding vectors for text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Width of the vectors this provider produces.
    fn dimensions(&self) -> usize;

    /// Embeds a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError>;

    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, KnowledgeError> {
        let mut vectors = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        vectors
            .pop()
            .ok_or_else(|| KnowledgeError::Embedding("provider returned no vector".into()))
    }
}

/// Produces text (or a token stream) from a conversation.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generates a complete response for the given conversation.
    async fn generate(&self, messages: &[Message]) -> Result<String, KnowledgeError>;

    /// Generates a streamed response for the given conversation.
    async fn generate_stream(&self, messages: &[Message]) -> Result<TokenStream, KnowledgeError>;

    /// Single constrained call that asks the model to label a conversation.
    /// The full history is provided so context-dependent follow-ups classify
    /// correctly. Returns the raw model output; callers own the parsing and
    /// any fallback policy.
    async fn classify(
        &self,
        instruction: &str,
        messages: &[Message],
    ) -> Result<String, KnowledgeError>;
}

/// Deterministic embedding provider for tests and offline demos.
///
/// Vectors are derived from a hash of the input text, so identical texts
/// always embed identically and distinct texts (almost) always differ.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self { dimensions: 8 }
    }

    #[must_use]
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError> {
        Ok(texts
            .iter()
            .map(|text| hash_to_vec(text, self.dimensions))
            .collect())
    }
}

fn hash_to_vec(text: &str, dimensions: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let seed = hasher.finish();
    (0..dimensions)
        .map(|i| {
            let bits = seed.rotate_left((i * 8) as u32) ^ ((i as u64) << 24);
            (bits as f32) / u32::MAX as f32
        })
        .collect()
}
