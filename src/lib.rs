use std::path::PathBuf;
use std::sync::Arc;

pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod storage;

pub use config::{CacheConfig, RemoteConfig, RemoteKind};
pub use core::{
    CachingStore, Explorer, Listing, Node, NodeId, PasteEngine, PasteOutcome, StoreEvent,
    StoreObserver,
};
pub use error::StoreError;
pub use storage::{create_remote, RemoteStore};

/// 应用状态，在各命令之间共享
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CachingStore>,
    pub explorer: Arc<Explorer>,
    pub config_dir: PathBuf,
}

impl AppState {
    /// 使用指定的远程配置创建（命令行参数可覆盖配置文件中的远程设置）
    pub fn with_remote(config_dir: PathBuf, remote_config: &RemoteConfig) -> anyhow::Result<Self> {
        let remote = create_remote(remote_config)?;
        let cache_config = CacheConfig::load(&config_dir);
        tracing::debug!("缓存配置: {:?}", cache_config);

        let store = Arc::new(CachingStore::new(remote, cache_config));
        let explorer = Arc::new(Explorer::new(store.clone()));

        Ok(Self {
            store,
            explorer,
            config_dir,
        })
    }

    /// 保存会话（退出时调用）
    pub fn cleanup(&self) {
        if let Err(e) = self.explorer.save_session(&self.config_dir) {
            tracing::warn!("保存会话失败: {}", e);
        }
        tracing::debug!("已缓存 {} 个节点", self.store.cached_len());
    }
}
