use std::sync::Arc;

use crate::types::{Attachment, Message};

/// Everything the model stream client needs for one reply
#[derive(Debug, Clone, Default)]
pub struct StreamRequest {
    /// Prior messages of the session, oldest first
    pub history: Vec<Arc<Message>>,
    /// Text of the new user turn
    pub text: String,
    /// Attachments of the new user turn
    pub attachments: Vec<Attachment>,
    /// Ask for a search-grounded answer
    pub use_search: bool,
}

impl StreamRequest {
    /// Create a request for a new user turn
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Set prior history
    pub fn with_history(mut self, history: Vec<Arc<Message>>) -> Self {
        self.history = history;
        self
    }

    /// Add attachments to the new turn
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Enable search grounding
    pub fn with_search(mut self, use_search: bool) -> Self {
        self.use_search = use_search;
        self
    }
}
