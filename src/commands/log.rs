//! 日志相关命令

use crate::logging::{log_dir, LogConfig};
use crate::AppState;
use anyhow::Result;

/// 获取日志配置
pub fn get_log_config(state: &AppState) -> LogConfig {
    LogConfig::load(&state.config_dir)
}

/// 设置日志配置，新配置在下次启动时生效
pub fn set_log_config(
    state: &AppState,
    enabled: Option<bool>,
    max_files: Option<usize>,
    level: Option<String>,
) -> Result<LogConfig> {
    let mut config = LogConfig::load(&state.config_dir);

    if let Some(e) = enabled {
        config.enabled = e;
    }
    if let Some(n) = max_files {
        // 限制范围 1-90 天
        config.max_files = n.clamp(1, 90);
    }
    if let Some(l) = level {
        config.set_level(&l)?;
    }

    config.save(&state.config_dir)?;
    Ok(config)
}

pub fn describe(state: &AppState, config: &LogConfig) -> String {
    format!(
        "enabled: {}\nlevel: {}\nmaxFiles: {}\ndir: {}",
        config.enabled,
        config.level,
        config.max_files,
        log_dir(&state.config_dir).display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CachingStore, Explorer};
    use crate::storage::MemoryRemote;
    use std::sync::Arc;

    #[test]
    fn test_set_log_config_clamps_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CachingStore::with_defaults(Arc::new(MemoryRemote::with_root(
            "root", "",
        ))));
        let state = AppState {
            explorer: Arc::new(Explorer::new(store.clone())),
            store,
            config_dir: dir.path().to_path_buf(),
        };

        let config = set_log_config(&state, Some(false), Some(500), Some("Trace".into())).unwrap();
        assert_eq!(config.max_files, 90);
        assert_eq!(config.level, "trace");

        assert!(set_log_config(&state, None, None, Some("verbose".into())).is_err());
        let saved = get_log_config(&state);
        assert!(!saved.enabled);
        assert_eq!(saved.level, "trace");
    }
}
