use std::pin::Pin;

use futures::Stream;
use parley_core::chat::{ReplyChunk, StreamRequest};

/// Lazy, finite stream of reply chunks. Failures arrive as a final
/// [`ReplyChunk::Failed`] element.
pub type ReplyStream = Pin<Box<dyn Stream<Item = ReplyChunk> + Send>>;

/// Anything that can stream a model reply for a user turn
pub trait ModelStreamClient: Send + Sync {
    /// Get the provider ID
    fn provider_id(&self) -> &str;

    /// Get provider metadata
    fn metadata(&self) -> &ProviderMetadata;

    /// Stream the reply to `request`. Nothing is sent until the stream is polled.
    fn stream_reply(&self, request: StreamRequest) -> ReplyStream;
}

/// Provider metadata
#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    pub id: String,
    /// Human-readable name
    pub name: String,
    pub capabilities: ProviderCapabilities,
}

/// Provider capabilities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Supports streaming responses
    pub streaming: bool,
    /// Supports image inputs
    pub vision: bool,
    /// Can ground answers in web search results
    pub search_grounding: bool,
}

impl ProviderCapabilities {
    /// Enable all capabilities
    pub fn all() -> Self {
        Self {
            streaming: true,
            vision: true,
            search_grounding: true,
        }
    }
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            streaming: true,
            vision: false,
            search_grounding: false,
        }
    }
}
