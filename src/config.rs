//! 应用配置模块
//!
//! 所有配置保存在配置目录下的 `config.json` 中，每个模块占一个顶层键。

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";

/// 默认配置目录
pub fn default_config_dir() -> PathBuf {
    let base = if cfg!(target_os = "windows") {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    } else if cfg!(target_os = "macos") {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
    } else {
        std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config"))
    };

    base.map(|p| p.join("rfe"))
        .unwrap_or_else(|| PathBuf::from(".rfe"))
}

/// 读取 `config.json` 中的某个键，缺失或格式错误时返回默认值
pub fn load_section<T>(config_dir: &Path, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    fs::read_to_string(config_dir.join(CONFIG_FILE))
        .ok()
        .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
        .and_then(|mut config| config.get_mut(key).map(serde_json::Value::take))
        .and_then(|section| {
            serde_json::from_value(section)
                .inspect_err(|e| tracing::warn!("配置项 {} 无效，使用默认值: {}", key, e))
                .ok()
        })
        .unwrap_or_default()
}

/// 写入 `config.json` 中的某个键，保留其他键
pub fn save_section<T>(config_dir: &Path, key: &str, value: &T) -> Result<()>
where
    T: Serialize,
{
    fs::create_dir_all(config_dir)?;
    let config_file = config_dir.join(CONFIG_FILE);

    let mut config: serde_json::Value = match fs::read_to_string(&config_file) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({})),
        Err(_) => serde_json::json!({}),
    };
    if !config.is_object() {
        config = serde_json::json!({});
    }

    config[key] = serde_json::to_value(value)?;
    fs::write(&config_file, serde_json::to_string_pretty(&config)?)?;

    Ok(())
}

/// 远程存储类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    /// REST 风格的 JSON 接口
    #[default]
    Http,
    /// 从 JSON 快照文件加载的进程内存储
    Snapshot,
}

/// 远程存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    #[serde(default)]
    pub kind: RemoteKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 快照文件路径（`snapshot` 类型使用）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,
    /// 单次请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// 服务端用 `parId: 0` 表示根节点
    #[serde(default)]
    pub zero_parent_is_root: bool,
}

fn default_base_url() -> String {
    "http://localhost/library/rfe/controller.php".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            kind: RemoteKind::default(),
            base_url: default_base_url(),
            snapshot: None,
            timeout_secs: default_timeout_secs(),
            zero_parent_is_root: false,
        }
    }
}

impl RemoteConfig {
    pub fn load(config_dir: &Path) -> Self {
        load_section(config_dir, "remote")
    }

    pub fn save(&self, config_dir: &Path) -> Result<()> {
        save_section(config_dir, "remote", self)
    }
}

/// 缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default = "default_root_id")]
    pub root_id: String,
    #[serde(default = "default_root_label")]
    pub root_label: String,
    /// 目录树查询只返回目录
    #[serde(default = "default_skip_leaves")]
    pub skip_leaves: bool,
    /// 记录已加载过的空目录，避免重复请求
    #[serde(default)]
    pub remember_empty_dirs: bool,
    /// 事件广播通道容量
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_root_id() -> String {
    "root".to_string()
}

fn default_root_label() -> String {
    "web root".to_string()
}

fn default_skip_leaves() -> bool {
    true
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root_id: default_root_id(),
            root_label: default_root_label(),
            skip_leaves: default_skip_leaves(),
            remember_empty_dirs: false,
            event_capacity: default_event_capacity(),
        }
    }
}

impl CacheConfig {
    pub fn load(config_dir: &Path) -> Self {
        load_section(config_dir, "cache")
    }

    pub fn save(&self, config_dir: &Path) -> Result<()> {
        save_section(config_dir, "cache", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheConfig::load(dir.path());
        assert_eq!(cache.root_id, "root");
        assert!(cache.skip_leaves);
        assert_eq!(RemoteConfig::load(dir.path()).kind, RemoteKind::Http);
    }

    #[test]
    fn test_sections_are_saved_independently() {
        let dir = tempfile::tempdir().unwrap();

        let remote = RemoteConfig {
            kind: RemoteKind::Snapshot,
            snapshot: Some(PathBuf::from("tree.json")),
            ..Default::default()
        };
        remote.save(dir.path()).unwrap();

        let cache = CacheConfig {
            skip_leaves: false,
            ..Default::default()
        };
        cache.save(dir.path()).unwrap();

        let loaded = RemoteConfig::load(dir.path());
        assert_eq!(loaded.kind, RemoteKind::Snapshot);
        assert_eq!(loaded.snapshot, Some(PathBuf::from("tree.json")));
        assert!(!CacheConfig::load(dir.path()).skip_leaves);
    }

    #[test]
    fn test_partial_section_uses_field_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"cache": {"rootId": "0"}, "remote": "garbage"}"#,
        )
        .unwrap();

        let cache = CacheConfig::load(dir.path());
        assert_eq!(cache.root_id, "0");
        assert_eq!(cache.event_capacity, 1024);
        assert_eq!(RemoteConfig::load(dir.path()).timeout_secs, 60);
    }
}
