//! Turn processing: route, answer, persist.

use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{info, warn};

use super::responder::RetrievalAugmentedResponder;
use super::router::{Intent, IntentRouter};
use super::session::{Session, SessionStore};
use crate::config::Config;
use crate::index::KnowledgeIndex;
use crate::llm::GenerationProvider;
use crate::message::Message;
use crate::types::KnowledgeError;

/// Fixed reply for turns routed to plain conversation.
pub const GENERAL_REPLY: &str =
    "Happy to chat! Ask me something about the knowledge base when you're ready.";

/// Conversational stand-in for a failed query turn. The session survives.
pub const TURN_ERROR_REPLY: &str =
    "Something went wrong while answering that. Please try again.";

const SUMMARY_INSTRUCTION: &str =
    "Summarize the following conversation concisely. Keep facts, decisions, \
     and unresolved questions; drop pleasantries.";

/// What one processed turn did.
#[derive(Clone, Debug)]
pub struct TurnReport {
    pub intent: Intent,
    /// The assistant reply appended to the session.
    pub reply: String,
    /// Sources backing the session's latest grounded answer.
    pub sources: String,
    /// Entries retrieved this turn. Zero for general turns and guard replies.
    pub retrieved: usize,
}

/// Drives one conversation turn at a time per thread.
///
/// Provider and index failures inside a turn never escape as errors: they
/// become a fixed conversational reply so the session loop keeps running.
/// Only session-store failures propagate.
pub struct ConversationEngine {
    router: IntentRouter,
    responder: RetrievalAugmentedResponder,
    provider: Arc<dyn GenerationProvider>,
    sessions: Arc<dyn SessionStore>,
    summary_threshold: usize,
    keep_recent: usize,
}

impl ConversationEngine {
    pub fn new(
        config: &Config,
        index: Arc<KnowledgeIndex>,
        provider: Arc<dyn GenerationProvider>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            router: IntentRouter::new(provider.clone()),
            responder: RetrievalAugmentedResponder::new(index, provider.clone(), config.retrieval_k),
            provider,
            sessions,
            summary_threshold: config.summary_threshold,
            keep_recent: config.keep_recent_messages,
        }
    }

    /// Processes one user turn on the given thread, invoking `on_token` for
    /// each streamed fragment of the assistant reply.
    pub async fn process_turn(
        &self,
        thread_id: &str,
        user_text: &str,
        mut on_token: impl FnMut(&str) + Send,
    ) -> Result<TurnReport, KnowledgeError> {
        let mut session = self
            .sessions
            .load(thread_id)
            .await?
            .unwrap_or_default();
        let intent = self.router.classify(user_text, &session.messages).await;
        session.messages.push(Message::user(user_text));
        info!(thread_id, ?intent, "processing turn");

        let (reply, retrieved) = match intent {
            Intent::General => {
                on_token(GENERAL_REPLY);
                // Prior retrieval state stays visible for citation.
                (GENERAL_REPLY.to_string(), 0)
            }
            Intent::Query => match self.responder.respond(&session.messages).await {
                Ok(mut grounded) => {
                    let mut reply = String::new();
                    let mut failed = false;
                    while let Some(item) = grounded.stream.next().await {
                        match item {
                            Ok(token) => {
                                on_token(&token);
                                reply.push_str(&token);
                            }
                            Err(err) => {
                                warn!(error = %err, "generation stream failed mid-turn");
                                failed = true;
                                break;
                            }
                        }
                    }
                    // A failed or empty stream never persists partial text as
                    // a complete answer.
                    if failed || reply.is_empty() {
                        on_token(TURN_ERROR_REPLY);
                        reply = TURN_ERROR_REPLY.to_string();
                    }
                    let count = grounded.retrieved.len();
                    session.sources = grounded.sources;
                    session.retrieved = grounded.retrieved;
                    (reply, count)
                }
                Err(err) => {
                    warn!(error = %err, "query turn failed");
                    on_token(TURN_ERROR_REPLY);
                    (TURN_ERROR_REPLY.to_string(), 0)
                }
            },
        };

        session.messages.push(Message::assistant(&reply));
        self.maybe_summarize(&mut session).await;

        let report = TurnReport {
            intent,
            reply,
            sources: session.sources.clone(),
            retrieved,
        };
        self.sessions.save(thread_id, session).await?;
        Ok(report)
    }

    /// Folds older history into one system summary message once the session
    /// crosses the configured threshold. The most recent messages stay
    /// verbatim. A failed summarization leaves the history as-is.
    async fn maybe_summarize(&self, session: &mut Session) {
        if session.messages.len() <= self.summary_threshold {
            return;
        }
        let split = session.messages.len() - self.keep_recent;
        let older = &session.messages[..split];

        let transcript = older
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = [
            Message::system(SUMMARY_INSTRUCTION),
            Message::user(&transcript),
        ];

        match self.provider.generate(&prompt).await {
            Ok(summary) => {
                let mut compacted = Vec::with_capacity(self.keep_recent + 1);
                compacted.push(Message::system(&format!(
                    "Summary of the earlier conversation: {summary}"
                )));
                compacted.extend_from_slice(&session.messages[split..]);
                info!(
                    folded = split,
                    kept = self.keep_recent,
                    "summarized session history"
                );
                session.messages = compacted;
            }
            Err(err) => {
                warn!(error = %err, "history summarization failed, keeping full history");
            }
        }
    }
}
