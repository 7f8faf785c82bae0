pub mod gemini;

pub use gemini::{GeminiRequest, GeminiTransformer};

use futures::Stream;
use parley_core::chat::ReplyChunk;
use std::pin::Pin;

/// Raw provider stream: chunks until the first error
pub type LLMStream = Pin<Box<dyn Stream<Item = Result<ReplyChunk, crate::LLMError>> + Send>>;
