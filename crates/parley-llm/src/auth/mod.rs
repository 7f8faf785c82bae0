use async_trait::async_trait;
use crate::error::Result;

/// Header Gemini reads the API key from
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Supplies the authentication header for each request
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Get the authentication header (header_name, header_value)
    async fn get_auth_header(&self) -> Result<(String, String)>;
}

/// API key sent in the `x-goog-api-key` header
#[derive(Clone)]
pub struct ApiKeyAuth {
    api_key: String,
}

impl ApiKeyAuth {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("header", &API_KEY_HEADER)
            .field("api_key", &"***")
            .finish()
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuth {
    async fn get_auth_header(&self) -> Result<(String, String)> {
        Ok((API_KEY_HEADER.to_string(), self.api_key.clone()))
    }
}
