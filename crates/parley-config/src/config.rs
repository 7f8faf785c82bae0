use parley_core::DictationConfig;
use parley_llm::provider::config::{
    DEFAULT_BASE_URL, DEFAULT_FAST_MODEL, DEFAULT_SEARCH_MODEL, DEFAULT_SYSTEM_INSTRUCTION,
};
use parley_llm::ProviderConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 主配置结构体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub llm: LlmConfig,
    pub dictation: DictationConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            llm: LlmConfig::default(),
            dictation: DictationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// 获取配置值的快捷方法
    pub fn get_value(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["version"] => Some(self.version.clone()),
            ["llm", "base_url"] => Some(self.llm.base_url.clone()),
            ["llm", "api_key_env"] => Some(self.llm.api_key_env.clone()),
            ["llm", "fast_model"] => Some(self.llm.fast_model.clone()),
            ["llm", "search_model"] => Some(self.llm.search_model.clone()),
            ["llm", "system_instruction"] => Some(self.llm.system_instruction.clone()),
            ["llm", "timeout_seconds"] => Some(self.llm.timeout_seconds.to_string()),
            ["dictation", "command"] => self.dictation.command.clone(),
            ["dictation", "locale"] => Some(self.dictation.locale.clone()),
            ["logging", "level"] => Some(self.logging.level.to_string()),
            ["logging", "directory"] => self.logging.directory.clone(),
            _ => None,
        }
    }

    /// 设置配置值
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["llm", "base_url"] => self.llm.base_url = value.to_string(),
            ["llm", "api_key_env"] => self.llm.api_key_env = value.to_string(),
            ["llm", "fast_model"] => self.llm.fast_model = value.to_string(),
            ["llm", "search_model"] => self.llm.search_model = value.to_string(),
            ["llm", "system_instruction"] => self.llm.system_instruction = value.to_string(),
            ["llm", "timeout_seconds"] => {
                self.llm.timeout_seconds = value.parse().map_err(|_| {
                    ConfigError::Validation(format!("Invalid timeout: {}", value))
                })?;
            }
            ["dictation", "command"] => {
                self.dictation.command = (!value.is_empty()).then(|| value.to_string());
            }
            ["dictation", "locale"] => self.dictation.locale = value.to_string(),
            ["logging", "level"] => self.logging.level = value.parse()?,
            ["logging", "directory"] => {
                self.logging.directory = (!value.is_empty()).then(|| value.to_string());
            }
            _ => return Err(ConfigError::KeyNotFound(key.to_string())),
        }
        Ok(())
    }
}

/// 模型配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    /// 读取 API key 的环境变量名
    pub api_key_env: String,
    pub fast_model: String,
    pub search_model: String,
    pub system_instruction: String,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            fast_model: DEFAULT_FAST_MODEL.to_string(),
            search_model: DEFAULT_SEARCH_MODEL.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            timeout_seconds: 120,
        }
    }
}

impl LlmConfig {
    /// 转换为 provider 配置，API key 只在这里从环境变量读取一次
    pub fn to_provider_config(&self) -> ProviderConfig {
        ProviderConfig::new(self.base_url.clone())
            .with_models(self.fast_model.clone(), self.search_model.clone())
            .with_system_instruction(self.system_instruction.clone())
            .with_timeout(Duration::from_secs(self.timeout_seconds))
            .with_api_key_from_env(&self.api_key_env)
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Validation(format!("Invalid log level: {}", s))),
        }
    }
}

/// Logging 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// 日志目录，为空时使用 ~/.parley/logs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            directory: Some("~/.parley/logs".to_string()),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
