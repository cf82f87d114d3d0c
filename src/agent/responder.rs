//! Retrieval-augmented answering for turns routed to the knowledge base.

use std::sync::Arc;

use futures_util::stream;
use tracing::{debug, info};

use crate::index::{IndexEntry, KnowledgeIndex};
use crate::llm::{GenerationProvider, TokenStream};
use crate::message::Message;
use crate::types::KnowledgeError;

/// Fixed reply for a blank latest message. No retrieval is attempted.
pub const EMPTY_QUERY_NOTICE: &str = "Your query is empty. Please provide a valid question.";

/// Fixed reply when similarity search returns nothing.
pub const NO_RESULTS_NOTICE: &str = "No relevant information found in the knowledge base.";

/// A grounded answer: the token stream plus exactly the sources and entries
/// used to build its context, kept for citation.
pub struct GroundedResponse {
    pub stream: TokenStream,
    /// Newline-joined `source` of each retrieved entry, duplicates allowed.
    /// Empty when nothing was retrieved.
    pub sources: String,
    pub retrieved: Vec<IndexEntry>,
}

impl GroundedResponse {
    /// A response carrying a fixed notice instead of generated output.
    fn notice(text: &str) -> Self {
        Self {
            stream: Box::pin(stream::iter([Ok(text.to_string())])),
            sources: String::new(),
            retrieved: Vec::new(),
        }
    }
}

/// Fetches top-k chunks for the latest user message and streams an answer
/// grounded in them.
pub struct RetrievalAugmentedResponder {
    index: Arc<KnowledgeIndex>,
    provider: Arc<dyn GenerationProvider>,
    retrieval_k: usize,
}

impl RetrievalAugmentedResponder {
    pub fn new(
        index: Arc<KnowledgeIndex>,
        provider: Arc<dyn GenerationProvider>,
        retrieval_k: usize,
    ) -> Self {
        Self {
            index,
            provider,
            retrieval_k,
        }
    }

    /// Answers the conversation's latest message from the knowledge base.
    ///
    /// Blank queries and empty retrievals short-circuit with fixed notices;
    /// embedding, store, and generation failures propagate to the caller.
    pub async fn respond(&self, history: &[Message]) -> Result<GroundedResponse, KnowledgeError> {
        let latest = history.last().map(|m| m.content.as_str()).unwrap_or("");
        if latest.trim().is_empty() {
            debug!("latest message is blank, skipping retrieval");
            return Ok(GroundedResponse::notice(EMPTY_QUERY_NOTICE));
        }

        let hits = self.index.similarity_search(latest, self.retrieval_k).await?;
        if hits.is_empty() {
            info!("no hits for query");
            return Ok(GroundedResponse::notice(NO_RESULTS_NOTICE));
        }

        let context = hits
            .iter()
            .map(|hit| hit.entry.content.as_str())
            .filter(|text| !text.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let sources = hits
            .iter()
            .map(|hit| hit.entry.source.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let retrieved: Vec<IndexEntry> = hits.into_iter().map(|hit| hit.entry).collect();
        debug!(retrieved = retrieved.len(), "built grounded context");

        let instruction = Message::system(&format!(
            "Please answer the question based on the context provided below.\nContext: {context}"
        ));
        let mut prompt = Vec::with_capacity(history.len() + 1);
        prompt.push(instruction);
        prompt.extend_from_slice(history);

        let stream = self.provider.generate_stream(&prompt).await?;
        Ok(GroundedResponse {
            stream,
            sources,
            retrieved,
        })
    }
}
