//! 缓存相关命令

use crate::config::CacheConfig;
use crate::AppState;
use anyhow::Result;

/// 获取缓存配置
pub fn get_cache_config(state: &AppState) -> CacheConfig {
    CacheConfig::load(&state.config_dir)
}

/// 设置缓存配置，新配置在下次启动时生效
pub fn set_cache_config(
    state: &AppState,
    skip_leaves: Option<bool>,
    remember_empty_dirs: Option<bool>,
    root_label: Option<String>,
) -> Result<CacheConfig> {
    let mut config = CacheConfig::load(&state.config_dir);

    if let Some(skip) = skip_leaves {
        config.skip_leaves = skip;
    }
    if let Some(remember) = remember_empty_dirs {
        config.remember_empty_dirs = remember;
    }
    if let Some(label) = root_label {
        config.root_label = label;
    }

    config.save(&state.config_dir)?;
    Ok(config)
}

pub fn describe(state: &AppState, config: &CacheConfig) -> String {
    format!(
        "remote: {}\nrootId: {}\nrootLabel: {}\nskipLeaves: {}\nrememberEmptyDirs: {}\neventCapacity: {}",
        state.store.remote_name(),
        config.root_id,
        config.root_label,
        config.skip_leaves,
        config.remember_empty_dirs,
        config.event_capacity
    )
}
