pub mod config;
pub mod metadata;

pub use config::ProviderConfig;
pub use metadata::{ModelStreamClient, ProviderCapabilities, ProviderMetadata, ReplyStream};
