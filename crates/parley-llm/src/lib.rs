pub mod auth;
pub mod error;
pub mod provider;
pub mod providers;
pub mod transformer;

pub use auth::{ApiKeyAuth, Authenticator};
pub use error::{ConversionError, LLMError, Result};
pub use provider::{ModelStreamClient, ProviderCapabilities, ProviderConfig, ProviderMetadata, ReplyStream};
pub use providers::{GeminiProvider, MISSING_API_KEY_MESSAGE};
pub use transformer::{GeminiRequest, GeminiTransformer, LLMStream};
