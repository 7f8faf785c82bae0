use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::types::ids::{MessageId, SessionId};
use crate::types::message::Message;
use crate::{DEFAULT_SESSION_TITLE, IMAGE_ONLY_TITLE, TITLE_MAX_CHARS};

/// One independent conversation thread.
///
/// Messages are held behind `Arc` so that a snapshot of the session shares
/// every untouched message with the live copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSession {
    pub id: SessionId,
    pub title: String,
    pub messages: Vec<Arc<Message>>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// Create an empty session with the default title
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            title: DEFAULT_SESSION_TITLE.to_string(),
            messages: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn message(&self, id: MessageId) -> Option<&Arc<Message>> {
        // Replies are almost always at the tail
        self.messages.iter().rev().find(|m| m.id == id)
    }

    pub fn last_message(&self) -> Option<&Arc<Message>> {
        self.messages.last()
    }

    /// Most recent user message, used by regenerate
    pub fn last_user_message(&self) -> Option<&Arc<Message>> {
        self.messages.iter().rev().find(|m| m.is_user())
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Title derived from the first message of a session
pub fn title_from(text: &str) -> String {
    if text.is_empty() {
        return IMAGE_ONLY_TITLE.to_string();
    }
    text.chars().take(TITLE_MAX_CHARS).collect()
}
