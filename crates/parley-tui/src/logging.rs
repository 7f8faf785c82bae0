//! 日志初始化
//!
//! The terminal belongs to the UI, so log output goes to a daily-rolling
//! file under the configured directory.

use anyhow::Context;
use parley_config::LoggingConfig;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "parley.log";

/// Quieter defaults for the HTTP stack
const DEPENDENCY_DIRECTIVES: &str = "hyper=warn,reqwest=warn,rustls=warn";

/// Keeps the background writer alive; drop it last to flush
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    pub log_dir: PathBuf,
}

/// 构建环境过滤器: `--log-level` wins over `RUST_LOG`, which wins over the config
pub fn build_filter(config: &LoggingConfig, cli_level: Option<&str>) -> anyhow::Result<EnvFilter> {
    if let Some(level) = cli_level {
        return EnvFilter::try_new(format!("{},{}", level, DEPENDENCY_DIRECTIVES))
            .with_context(|| format!("invalid log level: {}", level));
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(format!("{},{}", config.level, DEPENDENCY_DIRECTIVES))
        .with_context(|| format!("invalid log level: {}", config.level))
}

/// Resolve the log directory, expanding `~`
pub fn log_dir(config: &LoggingConfig) -> anyhow::Result<PathBuf> {
    config
        .directory
        .as_deref()
        .and_then(parley_config::expand_tilde)
        .or_else(parley_config::default_log_dir)
        .context("could not determine a log directory")
}

pub fn init(config: &LoggingConfig, cli_level: Option<&str>) -> anyhow::Result<LoggingGuard> {
    let filter = build_filter(config, cli_level)?;
    let log_dir = log_dir(config)?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (writer, file_guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::info!(log_dir = %log_dir.display(), "Logging initialized");

    Ok(LoggingGuard {
        _file_guard: file_guard,
        log_dir,
    })
}
