use crate::types::GroundingMetadata;

/// One element of a streamed model reply
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyChunk {
    /// Text delta, possibly with the citations known so far
    Delta {
        text: String,
        grounding: Option<GroundingMetadata>,
    },
    /// Terminal element carrying a user-facing error string
    Failed { message: String },
}

impl ReplyChunk {
    /// Create a text chunk
    pub fn text(text: impl Into<String>) -> Self {
        Self::Delta {
            text: text.into(),
            grounding: None,
        }
    }

    /// Create a text chunk carrying grounding metadata
    pub fn grounded(text: impl Into<String>, grounding: GroundingMetadata) -> Self {
        Self::Delta {
            text: text.into(),
            grounding: Some(grounding),
        }
    }

    /// Create a failure chunk
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Check if this is a failure chunk
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Text to append to the reply, whatever the kind
    pub fn text_delta(&self) -> &str {
        match self {
            Self::Delta { text, .. } => text,
            Self::Failed { message } => message,
        }
    }

    /// Grounding metadata carried by this chunk, if any
    pub fn grounding(&self) -> Option<&GroundingMetadata> {
        match self {
            Self::Delta { grounding, .. } => grounding.as_ref(),
            Self::Failed { .. } => None,
        }
    }
}
