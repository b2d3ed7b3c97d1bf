//! 日志模块 - 控制台输出与按天滚动的日志文件

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// 是否写日志文件
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub level: String,
    /// 保留的日志文件数（按天）
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

fn default_max_files() -> usize {
    7
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            level: default_level(),
            max_files: default_max_files(),
        }
    }
}

pub const VALID_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl LogConfig {
    pub fn load(config_dir: &Path) -> Self {
        crate::config::load_section(config_dir, "log")
    }

    pub fn save(&self, config_dir: &Path) -> Result<()> {
        crate::config::save_section(config_dir, "log", self)
    }

    /// 设置日志级别，无效级别返回错误
    pub fn set_level(&mut self, level: &str) -> Result<()> {
        let level = level.to_lowercase();
        if !VALID_LEVELS.contains(&level.as_str()) {
            anyhow::bail!("无效的日志级别: {}", level);
        }
        self.level = level;
        Ok(())
    }

    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

/// 日志目录
pub fn log_dir(config_dir: &Path) -> PathBuf {
    config_dir.join("logs")
}

fn env_filter(config: &LogConfig) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env().add_directive(config.tracing_level().into());
    for directive in ["hyper=warn", "reqwest=warn"] {
        if let Ok(d) = directive.parse() {
            filter = filter.add_directive(d);
        }
    }
    filter
}

/// 初始化日志系统
///
/// 返回的 guard 需要保持到程序退出，否则缓冲的日志会丢失。
pub fn init_logging(config_dir: &Path) -> Option<WorkerGuard> {
    let config = LogConfig::load(config_dir);

    // 控制台只在 debug 构建下输出，写到 stderr 以免干扰命令输出
    let console_layer = cfg!(debug_assertions).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    let appender = config
        .enabled
        .then(|| {
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("rfe")
                .filename_suffix("log")
                .max_log_files(config.max_files.max(1))
                .build(log_dir(config_dir))
                .inspect_err(|e| eprintln!("无法创建日志文件: {}", e))
                .ok()
        })
        .flatten();

    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter(&config))
        .with(console_layer)
        .with(file_layer)
        .try_init();

    guard
}
