pub mod http;
pub mod memory;

use crate::config::{RemoteConfig, RemoteKind};
use crate::core::node::{NewNode, Node, NodeId};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub use http::HttpRemote;
pub use memory::MemoryRemote;

/// 远程权威存储接口
///
/// 所有操作都可能返回 `Transport` 或 `Conflict` 错误。
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// 获取单个节点，不存在时返回 `NotFound`
    async fn get(&self, id: &NodeId) -> Result<Node>;

    /// 列出直接子节点
    async fn query_children(&self, parent: &NodeId) -> Result<Vec<Node>>;

    /// 新增节点，返回带远程分配 id 的完整节点
    async fn add(&self, node: &NewNode) -> Result<Node>;

    /// 整体替换节点的可变字段，返回更新后的节点
    async fn put(&self, node: &Node) -> Result<Node>;

    /// 删除节点
    async fn remove(&self, id: &NodeId) -> Result<()>;

    /// 存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 根据配置创建远程存储实例
pub fn create_remote(config: &RemoteConfig) -> anyhow::Result<Arc<dyn RemoteStore>> {
    match config.kind {
        RemoteKind::Http => {
            tracing::info!("连接远程存储: {}", config.base_url);
            let remote = HttpRemote::new(&config.base_url, config.timeout_secs)?
                .with_zero_parent_as_root(config.zero_parent_is_root);
            Ok(Arc::new(remote) as Arc<dyn RemoteStore>)
        }
        RemoteKind::Snapshot => {
            let path = config
                .snapshot
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Snapshot remote requires snapshot path"))?;
            tracing::info!("加载快照存储: {:?}", path);
            Ok(Arc::new(MemoryRemote::load_snapshot(path)?) as Arc<dyn RemoteStore>)
        }
    }
}
