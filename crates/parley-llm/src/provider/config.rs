use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_FAST_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_SEARCH_MODEL: &str = "gemini-3-pro-preview";

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are Parley, a highly capable and helpful AI assistant.
You are knowledgeable, precise, and friendly.
When answering code questions, provide clear explanations.
You can analyze images and text.
Always format your responses nicely using Markdown.";

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL for the API
    pub base_url: String,
    /// API key; `None` makes every reply a missing-key error
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Model used when search grounding is off
    pub fast_model: String,
    /// Model used when search grounding is on
    pub search_model: String,
    pub system_instruction: String,
    /// Request timeout in seconds
    #[serde(with = "serde_duration", default = "default_timeout")]
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set API key; blank keys count as missing
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = if key.trim().is_empty() { None } else { Some(key) };
        self
    }

    /// Read the API key from an environment variable
    pub fn with_api_key_from_env(self, env_var: &str) -> Self {
        match std::env::var(env_var) {
            Ok(key) => self.with_api_key(key),
            Err(_) => self,
        }
    }

    pub fn with_models(mut self, fast: impl Into<String>, search: impl Into<String>) -> Self {
        self.fast_model = fast.into();
        self.search_model = search.into();
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Model variant for a request
    pub fn model_for(&self, use_search: bool) -> &str {
        if use_search {
            &self.search_model
        } else {
            &self.fast_model
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            fast_model: DEFAULT_FAST_MODEL.to_string(),
            search_model: DEFAULT_SEARCH_MODEL.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            timeout: default_timeout(),
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(120)
}

// Durations travel as whole seconds
mod serde_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
