//! Conversation messages exchanged between the user, the assistant, and
//! system instructions.

use serde::{Deserialize, Serialize};

/// A single message in a conversation.
///
/// Messages carry a role (one of the constants on [`Message`]) and text
/// content. They are the unit of session history and the payload handed to
/// the generation provider.
///
/// # Examples
///
/// ```
/// use lorekeeper::message::Message;
///
/// let question = Message::user("Where is the schema defined?");
/// let answer = Message::assistant("In migrations/001_init.sql.");
/// assert!(question.has_role(Message::USER));
/// assert!(!answer.has_role(Message::USER));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Role of the sender. Use the constants on [`Message`].
    pub role: String,
    /// Text content.
    pub content: String,
}

impl Message {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// Assistant response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System prompt or instruction message role.
    pub const SYSTEM: &'static str = "system";

    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Returns true if this message has the specified role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}
