//! Message lifecycle.
//!
//! A turn starts as a draft held by the [`InputComposer`](crate::InputComposer)
//! and only enters the store once submitted:
//! - user message: `Sent`
//! - model reply: `Pending -> Streaming -> Complete`
//! - model reply failure: `Pending | Streaming -> Failed`

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// User message appended to its session.
    Sent,
    /// Model placeholder created, no chunk received yet.
    Pending,
    /// At least one chunk has been applied.
    Streaming,
    /// Stream ended normally; content is frozen.
    Complete,
    /// Stream ended with an error; content is frozen.
    Failed,
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStatus::Sent => write!(f, "sent"),
            MessageStatus::Pending => write!(f, "pending"),
            MessageStatus::Streaming => write!(f, "streaming"),
            MessageStatus::Complete => write!(f, "complete"),
            MessageStatus::Failed => write!(f, "failed"),
        }
    }
}

impl MessageStatus {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &MessageStatus) -> bool {
        matches!(
            (self, target),
            (MessageStatus::Pending, MessageStatus::Streaming)
                | (MessageStatus::Pending, MessageStatus::Complete)
                | (MessageStatus::Streaming, MessageStatus::Complete)
                | (MessageStatus::Pending, MessageStatus::Failed)
                | (MessageStatus::Streaming, MessageStatus::Failed)
        )
    }

    /// Content may still grow.
    pub fn accepts_chunks(&self) -> bool {
        matches!(self, MessageStatus::Pending | MessageStatus::Streaming)
    }

    /// The reply stream is over, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Complete | MessageStatus::Failed)
    }
}
