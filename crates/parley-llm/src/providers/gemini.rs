use eventsource_stream::Eventsource;
use futures::StreamExt;
use parley_core::chat::{ReplyChunk, StreamRequest};
use reqwest::{header, Client};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::{ApiKeyAuth, Authenticator};
use crate::error::{LLMError, Result};
use crate::provider::{ModelStreamClient, ProviderCapabilities, ProviderConfig, ProviderMetadata, ReplyStream};
use crate::transformer::{GeminiRequest, GeminiTransformer, LLMStream};

/// Reply text when no API key is configured
pub const MISSING_API_KEY_MESSAGE: &str = "Error: API Key is missing. Please check your configuration.";

/// Streaming client for the Gemini `generateContent` API
#[derive(Clone)]
pub struct GeminiProvider {
    config: ProviderConfig,
    http_client: Client,
    transformer: GeminiTransformer,
    metadata: ProviderMetadata,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl GeminiProvider {
    /// Create a provider. A missing API key is not an error here; every
    /// reply reports it instead.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LLMError::Config(e.to_string()))?;

        let authenticator = config
            .api_key
            .clone()
            .map(|key| Arc::new(ApiKeyAuth::new(key)) as Arc<dyn Authenticator>);

        Ok(Self {
            config,
            http_client,
            transformer: GeminiTransformer::new(),
            metadata: ProviderMetadata {
                id: "gemini".to_string(),
                name: "Google Gemini".to_string(),
                capabilities: ProviderCapabilities::all(),
            },
            authenticator,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn has_credentials(&self) -> bool {
        self.authenticator.is_some()
    }

    /// Wire request for one reply, with the model picked by the search flag
    pub fn build_request(&self, request: &StreamRequest) -> GeminiRequest {
        self.transformer.transform_request(
            request,
            self.config.model_for(request.use_search),
            &self.config.system_instruction,
        )
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn build_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("text/event-stream"));

        let authenticator = self
            .authenticator
            .as_ref()
            .ok_or_else(|| LLMError::Auth("API key is missing".to_string()))?;
        let (header_name, header_value) = authenticator.get_auth_header().await?;
        let name = header::HeaderName::from_bytes(header_name.as_bytes())
            .map_err(|e| LLMError::Config(format!("Invalid auth header name: {}", e)))?;
        let value = header::HeaderValue::from_str(&header_value)
            .map_err(|e| LLMError::Config(format!("Invalid auth header value: {}", e)))?;
        headers.insert(name, value);

        Ok(headers)
    }

    /// Send the request and stream parsed chunks.
    ///
    /// The returned stream ends after the first error it yields.
    pub async fn open_stream(&self, request: &GeminiRequest) -> Result<LLMStream> {
        let headers = self.build_headers().await?;
        let url = self.stream_url(&request.model);

        let response = self
            .http_client
            .post(&url)
            .headers(headers)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => LLMError::Auth(api_error_message(&body)),
                code => LLMError::Api {
                    status: code,
                    message: api_error_message(&body),
                },
            });
        }

        let transformer = self.transformer.clone();
        let mut events = response.bytes_stream().eventsource();
        let stream = async_stream::stream! {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        let data = event.data.trim();
                        if data.is_empty() || data == "[DONE]" {
                            continue;
                        }
                        match transformer.parse_stream_chunk(data) {
                            Ok(Some(chunk)) => yield Ok(chunk),
                            Ok(None) => continue,
                            Err(e) => {
                                yield Err(LLMError::Transform(e));
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(LLMError::Stream(e.to_string()));
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Pull `error.message` out of a Gemini error body, else return it as is
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

impl ModelStreamClient for GeminiProvider {
    fn provider_id(&self) -> &str {
        self.transformer.provider_id()
    }

    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    fn stream_reply(&self, request: StreamRequest) -> ReplyStream {
        let provider = self.clone();
        Box::pin(async_stream::stream! {
            if !provider.has_credentials() {
                warn!("No API key configured, reply not requested");
                yield ReplyChunk::failed(MISSING_API_KEY_MESSAGE);
                return;
            }

            let gemini_request = provider.build_request(&request);
            info!(
                model = %gemini_request.model,
                use_search = gemini_request.uses_search(),
                turns = gemini_request.contents.len(),
                "Requesting reply"
            );

            let mut upstream = match provider.open_stream(&gemini_request).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Reply request failed: {}", e);
                    yield ReplyChunk::failed(format!("Error: {}", e));
                    return;
                }
            };

            let mut chunks = 0usize;
            while let Some(item) = upstream.next().await {
                match item {
                    Ok(chunk) => {
                        chunks += 1;
                        debug!(chunk = chunks, len = chunk.text_delta().len(), "Reply chunk");
                        yield chunk;
                    }
                    Err(e) => {
                        warn!(after = chunks, "Reply stream failed: {}", e);
                        yield ReplyChunk::failed(format!("Error: {}", e));
                        return;
                    }
                }
            }
            info!(chunks, "Reply stream finished");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_url() {
        let provider = GeminiProvider::new(ProviderConfig::new("http://host/v1beta/")).unwrap();
        assert_eq!(
            provider.stream_url("gemini-2.5-flash"),
            "http://host/v1beta/models/gemini-2.5-flash:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn test_build_request_picks_model() {
        let provider = GeminiProvider::new(ProviderConfig::default()).unwrap();
        let fast = provider.build_request(&StreamRequest::new("hi"));
        assert_eq!(fast.model, "gemini-2.5-flash");
        let search = provider.build_request(&StreamRequest::new("hi").with_search(true));
        assert_eq!(search.model, "gemini-3-pro-preview");
        assert!(search.system_instruction.is_some());
    }

    #[test]
    fn test_api_error_message() {
        assert_eq!(
            api_error_message(r#"{"error":{"code":400,"message":"API key not valid"}}"#),
            "API key not valid"
        );
        assert_eq!(api_error_message(" bad gateway \n"), "bad gateway");
    }

    #[test]
    fn test_credentials() {
        assert!(!GeminiProvider::new(ProviderConfig::default()).unwrap().has_credentials());
        let provider = GeminiProvider::new(ProviderConfig::default().with_api_key("k")).unwrap();
        assert!(provider.has_credentials());
        assert!(provider.metadata().capabilities.search_grounding);
    }
}
