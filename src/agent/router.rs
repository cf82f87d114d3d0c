//! Per-turn intent classification.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm::GenerationProvider;
use crate::message::Message;

const ROUTER_INSTRUCTION: &str =
    "You are a helpful assistant that determines the user's intent. \
     Decide whether the user wants to query the knowledge base or have a \
     general conversation. Respond with exactly one word: 'query' or 'general'.";

/// What a user turn is asking for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    /// The turn needs knowledge-base retrieval.
    Query,
    /// Plain conversation, no retrieval.
    General,
}

/// Classifies user turns via a single constrained generation call.
///
/// Routing never fails: a provider error or an answer outside the two labels
/// falls back to [`Intent::General`].
pub struct IntentRouter {
    provider: Arc<dyn GenerationProvider>,
}

impl IntentRouter {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self { provider }
    }

    /// Classifies the latest user turn. `history` is the conversation before
    /// this turn; it is forwarded so context-dependent follow-ups ("tell me
    /// more about that") route the same way as the turns they refer to.
    pub async fn classify(&self, latest_user_text: &str, history: &[Message]) -> Intent {
        let mut conversation = history.to_vec();
        conversation.push(Message::user(latest_user_text));
        match self.provider.classify(ROUTER_INSTRUCTION, &conversation).await {
            Ok(raw) => {
                let intent = parse_intent(&raw);
                debug!(raw = %raw.trim(), ?intent, "routed turn");
                intent
            }
            Err(err) => {
                warn!(error = %err, "intent classification failed, defaulting to general");
                Intent::General
            }
        }
    }
}

/// Tolerant label parse: trims whitespace and punctuation, ignores case.
/// Anything that is not recognizably `query` maps to `General`.
fn parse_intent(raw: &str) -> Intent {
    let label = raw
        .trim()
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_ascii_lowercase();
    if label == "query" {
        Intent::Query
    } else {
        Intent::General
    }
}
