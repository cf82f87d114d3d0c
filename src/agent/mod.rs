//! Conversational agent: intent routing, grounded answering, and per-thread
//! turn processing over the knowledge index.

pub mod engine;
pub mod responder;
pub mod router;
pub mod session;

pub use engine::{ConversationEngine, TurnReport, GENERAL_REPLY, TURN_ERROR_REPLY};
pub use responder::{
    GroundedResponse, RetrievalAugmentedResponder, EMPTY_QUERY_NOTICE, NO_RESULTS_NOTICE,
};
pub use router::{Intent, IntentRouter};
pub use session::{new_thread_id, InMemorySessionStore, Session, SessionStore};
