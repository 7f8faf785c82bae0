use thiserror::Error;

/// Unified error type for model requests
#[derive(Error, Debug)]
pub enum LLMError {
    #[error("network error: {0}")]
    Network(String),

    #[error("api error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("transform error: {0}")]
    Transform(#[from] ConversionError),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("config error: {0}")]
    Config(String),
}

/// Error while converting between internal and wire formats
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

impl From<reqwest::Error> for LLMError {
    fn from(e: reqwest::Error) -> Self {
        LLMError::Network(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LLMError>;
