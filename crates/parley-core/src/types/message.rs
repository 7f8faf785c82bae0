use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::MessageStatus;
use crate::types::content::Attachment;
use crate::types::grounding::GroundingMetadata;
use crate::types::ids::MessageId;

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thumbs up / down on a finished reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Positive,
    Negative,
}

/// One conversation entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grounding: Option<GroundingMetadata>,
    #[serde(default)]
    pub is_error: bool,
    pub status: MessageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::User,
            content: content.into(),
            attachments,
            timestamp: Utc::now(),
            grounding: None,
            is_error: false,
            status: MessageStatus::Sent,
            feedback: None,
        }
    }

    /// Create an empty model reply awaiting its first chunk
    pub fn model_placeholder() -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Model,
            content: String::new(),
            attachments: Vec::new(),
            timestamp: Utc::now(),
            grounding: None,
            is_error: false,
            status: MessageStatus::Pending,
            feedback: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_model(&self) -> bool {
        self.role == Role::Model
    }

    /// Copy / regenerate / feedback are only offered on finished replies
    pub fn actions_enabled(&self) -> bool {
        self.is_model() && self.status.is_terminal()
    }

    /// Check if the message has nothing to send upstream
    pub fn is_blank(&self) -> bool {
        self.content.is_empty() && self.attachments.is_empty()
    }
}
