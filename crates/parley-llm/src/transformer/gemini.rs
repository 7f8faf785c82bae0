//! Gemini `generateContent` wire format.
//!
//! Requests carry the whole conversation as `contents`; streamed responses
//! are `GenerateContentResponse` objects, one per SSE `data:` line.

use parley_core::chat::{ReplyChunk, StreamRequest};
use parley_core::types::{Attachment, GroundingMetadata, Message};
use serde::{Deserialize, Serialize};

use crate::error::ConversionError;

/// Request body for `models/{model}:streamGenerateContent`
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    /// Target model; travels in the URL, not the body
    #[serde(skip)]
    pub model: String,
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

impl GeminiRequest {
    pub fn uses_search(&self) -> bool {
        self.tools.iter().any(|t| t.google_search.is_some())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl From<&Attachment> for Part {
    fn from(att: &Attachment) -> Self {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: att.mime_type.clone(),
                data: att.data.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_search: Option<GoogleSearch>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GoogleSearch {}

/// Streamed response object
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    /// Thought summaries are not part of the answer
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
}

/// Converts between parley types and the Gemini wire format
#[derive(Debug, Clone, Default)]
pub struct GeminiTransformer;

impl GeminiTransformer {
    pub fn new() -> Self {
        Self
    }

    pub fn provider_id(&self) -> &str {
        "gemini"
    }

    /// One prior message as a turn; `None` when it has nothing to say
    fn convert_message(&self, msg: &Message) -> Option<Content> {
        let mut parts = Vec::with_capacity(1 + msg.attachments.len());
        if !msg.content.is_empty() {
            parts.push(Part::Text {
                text: msg.content.clone(),
            });
        }
        parts.extend(msg.attachments.iter().map(Part::from));

        if parts.is_empty() {
            return None;
        }
        Some(Content {
            role: Some(msg.role.as_str().to_string()),
            parts,
        })
    }

    /// The trailing user turn built from the draft
    fn convert_turn(&self, text: &str, attachments: &[Attachment]) -> Content {
        let mut parts = Vec::with_capacity(1 + attachments.len());
        if !text.is_empty() || attachments.is_empty() {
            parts.push(Part::Text { text: text.to_string() });
        }
        parts.extend(attachments.iter().map(Part::from));
        Content {
            role: Some("user".to_string()),
            parts,
        }
    }

    /// Build the request for one reply
    pub fn transform_request(
        &self,
        request: &StreamRequest,
        model: &str,
        system_instruction: &str,
    ) -> GeminiRequest {
        let mut contents: Vec<Content> = request
            .history
            .iter()
            .filter_map(|msg| self.convert_message(msg))
            .collect();
        contents.push(self.convert_turn(&request.text, &request.attachments));

        let system_instruction = (!system_instruction.is_empty()).then(|| Content {
            role: None,
            parts: vec![Part::Text {
                text: system_instruction.to_string(),
            }],
        });

        let tools = if request.use_search {
            vec![Tool {
                google_search: Some(GoogleSearch::default()),
            }]
        } else {
            Vec::new()
        };

        GeminiRequest {
            model: model.to_string(),
            contents,
            system_instruction,
            tools,
        }
    }

    /// Parse one SSE `data:` payload.
    ///
    /// Returns `Ok(None)` for events with neither text nor citations, such as
    /// the trailing usage report.
    pub fn parse_stream_chunk(&self, data: &str) -> Result<Option<ReplyChunk>, ConversionError> {
        let response: GenerateContentResponse = serde_json::from_str(data)?;

        if let Some(error) = response.error {
            return Err(ConversionError::InvalidFormat(match error.code {
                Some(code) => format!("{} ({})", error.message, code),
                None => error.message,
            }));
        }

        let Some(candidate) = response.candidates.into_iter().next() else {
            return Ok(None);
        };

        let text: String = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text)
                    .collect()
            })
            .unwrap_or_default();
        let grounding = candidate.grounding_metadata.filter(|g| !g.is_empty());

        if text.is_empty() && grounding.is_none() {
            return Ok(None);
        }
        Ok(Some(ReplyChunk::Delta { text, grounding }))
    }
}
