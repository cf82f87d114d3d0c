//! Per-thread conversation state and its persistence seam.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::index::IndexEntry;
use crate::message::Message;
use crate::types::KnowledgeError;

/// State of one conversation thread.
///
/// `sources` and `retrieved` reflect the most recent retrieval turn; general
/// turns leave them untouched so citations from the last grounded answer
/// stay inspectable.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Session {
    pub messages: Vec<Message>,
    /// Newline-joined sources from the latest retrieval turn.
    pub sources: String,
    /// Entries used to ground the latest retrieval turn.
    pub retrieved: Vec<IndexEntry>,
}

/// Mints a fresh opaque thread id for a new conversation.
pub fn new_thread_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Session {
    /// Content of the most recent user message, if any.
    pub fn latest_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.has_role(Message::USER))
            .map(|m| m.content.as_str())
    }
}

/// Checkpoint store for sessions, keyed by an opaque thread id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads a thread's session, or `None` if the thread is new.
    async fn load(&self, thread_id: &str) -> Result<Option<Session>, KnowledgeError>;

    /// Persists a thread's session, replacing any previous snapshot.
    async fn save(&self, thread_id: &str, session: Session) -> Result<(), KnowledgeError>;
}

/// Process-lifetime session store. Sessions are never evicted.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, thread_id: &str) -> Result<Option<Session>, KnowledgeError> {
        Ok(self.sessions.lock().get(thread_id).cloned())
    }

    async fn save(&self, thread_id: &str, session: Session) -> Result<(), KnowledgeError> {
        self.sessions.lock().insert(thread_id.to_string(), session);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_thread_loads_none() {
        let store = InMemorySessionStore::new();
        assert!(store.load("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = InMemorySessionStore::new();
        let mut session = Session::default();
        session.messages.push(Message::user("hello"));
        session.sources = "/kb/a.md".into();
        store.save("t1", session).await.unwrap();

        let loaded = store.load("t1").await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.sources, "/kb/a.md");
        assert!(store.load("t2").await.unwrap().is_none());
    }

    #[test]
    fn latest_user_text_skips_assistant_messages() {
        let mut session = Session::default();
        assert!(session.latest_user_text().is_none());
        session.messages.push(Message::user("first"));
        session.messages.push(Message::assistant("reply"));
        assert_eq!(session.latest_user_text(), Some("first"));
    }
}
