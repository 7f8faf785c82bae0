use crate::config::{Config, ConfigError, ConfigResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// 配置管理器
#[derive(Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: Arc<RwLock<Config>>,
}

impl ConfigManager {
    /// 加载配置文件，不存在时写入默认配置
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let config = if path.exists() {
            info!("Loading config from {:?}", path);
            Self::read_file(path).await?
        } else {
            info!("Config file not found, creating default config at {:?}", path);
            let default_config = Config::default();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let content = serde_json::to_string_pretty(&default_config)?;
            tokio::fs::write(path, &content).await?;
            default_config
        };

        Ok(Self {
            path: path.to_path_buf(),
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// 从默认位置加载配置
    pub async fn load_default() -> ConfigResult<Self> {
        let config_path = Self::default_config_path()?;
        Self::load(&config_path).await
    }

    /// 获取默认配置路径 (~/.parley/config.json)
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        crate::default_config_path()
            .ok_or_else(|| ConfigError::InvalidPath("Could not find home directory".to_string()))
    }

    /// 创建一个新的配置管理器（用于测试）
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            path,
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// 获取配置的共享引用
    pub fn get(&self) -> Arc<RwLock<Config>> {
        Arc::clone(&self.config)
    }

    /// 当前配置的拷贝
    pub async fn snapshot(&self) -> Config {
        self.config.read().await.clone()
    }

    /// 保存配置到文件
    pub async fn save(&self) -> ConfigResult<()> {
        let config = self.config.read().await;
        let content = serde_json::to_string_pretty(&*config)?;
        drop(config);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, content).await?;
        info!("Config saved to {:?}", self.path);
        Ok(())
    }

    /// 更新配置并保存，修改或校验失败时保持原配置不变
    pub async fn update<F>(&self, f: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config) -> ConfigResult<()>,
    {
        let mut config = self.config.write().await;
        let mut candidate = config.clone();
        f(&mut candidate)?;
        Self::validate(&candidate)?;
        *config = candidate;
        drop(config);
        self.save().await
    }

    /// 验证配置
    pub fn validate(config: &Config) -> ConfigResult<()> {
        if config.llm.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("llm.base_url cannot be empty".to_string()));
        }

        if config.llm.fast_model.trim().is_empty() || config.llm.search_model.trim().is_empty() {
            return Err(ConfigError::Validation(
                "llm.fast_model and llm.search_model cannot be empty".to_string(),
            ));
        }

        if config.llm.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "llm.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if config.dictation.locale.trim().is_empty() {
            return Err(ConfigError::Validation("dictation.locale cannot be empty".to_string()));
        }

        Ok(())
    }

    async fn read_file(path: &Path) -> ConfigResult<Config> {
        let content = tokio::fs::read_to_string(path).await?;
        let content = Self::expand_env_vars(&content)?;
        let config: Config = serde_json::from_str(&content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// 展开环境变量 ${VAR} 或 ${VAR:-default}
    fn expand_env_vars(content: &str) -> ConfigResult<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::Validation(e.to_string()))?;
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let full_match = &cap[0];
            let var_expr = &cap[1];

            let (var_name, default_value) = match var_expr.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (var_expr, None),
            };

            let replacement = match (std::env::var(var_name), default_value) {
                (Ok(val), _) => val,
                (Err(_), Some(default)) => default.to_string(),
                (Err(_), None) => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
            };

            result = result.replace(full_match, &replacement);
        }

        Ok(result)
    }

    /// 获取配置文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_creates_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let manager = ConfigManager::load(&config_path).await.unwrap();
        let config = manager.snapshot().await;

        assert!(config_path.exists());
        assert_eq!(config, Config::default());
    }

    #[tokio::test]
    async fn test_load_existing_with_env() {
        std::env::set_var("PARLEY_TEST_MODEL", "gemini-test");
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        tokio::fs::write(
            &config_path,
            r#"{"llm": {"fast_model": "${PARLEY_TEST_MODEL}", "base_url": "${PARLEY_TEST_UNSET_URL:-http://localhost:1}"}}"#,
        )
        .await
        .unwrap();

        let config = ConfigManager::load(&config_path).await.unwrap().snapshot().await;
        assert_eq!(config.llm.fast_model, "gemini-test");
        assert_eq!(config.llm.base_url, "http://localhost:1");
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("PARLEY_TEST_VAR", "test_value");

        let expanded = ConfigManager::expand_env_vars(r#"{"key": "${PARLEY_TEST_VAR}"}"#).unwrap();
        assert_eq!(expanded, r#"{"key": "test_value"}"#);

        let err = ConfigManager::expand_env_vars("${PARLEY_TEST_DEFINITELY_UNSET}").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarNotFound(_)));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.llm.timeout_seconds = 0;
        assert!(ConfigManager::validate(&config).is_err());

        config.llm.timeout_seconds = 30;
        assert!(ConfigManager::validate(&config).is_ok());

        config.llm.search_model = " ".to_string();
        assert!(ConfigManager::validate(&config).is_err());
    }

    #[tokio::test]
    async fn test_update_saves_and_rejects_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let manager = ConfigManager::load(&config_path).await.unwrap();

        manager
            .update(|c| {
                c.logging.level = LogLevel::Debug;
                Ok(())
            })
            .await
            .unwrap();
        let on_disk = tokio::fs::read_to_string(&config_path).await.unwrap();
        assert!(on_disk.contains("\"debug\""));

        let cleared = manager
            .update(|c| {
                c.llm.base_url.clear();
                Ok(())
            })
            .await;
        assert!(matches!(cleared, Err(ConfigError::Validation(_))));
        assert_eq!(manager.snapshot().await.llm.base_url, Config::default().llm.base_url);

        let unknown = manager.update(|c| c.set_value("llm.colour", "blue")).await;
        assert!(matches!(unknown, Err(ConfigError::KeyNotFound(_))));

        let reopened = ConfigManager::load(&config_path).await.unwrap();
        assert_eq!(reopened.snapshot().await.logging.level, LogLevel::Debug);
    }
}
