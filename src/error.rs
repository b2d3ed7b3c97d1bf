//! 存储层错误类型

use crate::core::node::NodeId;

/// 缓存与远程存储操作的错误
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// 网络不可达或远程响应无法解析
    #[error("远程传输失败: {0}")]
    Transport(String),

    /// 远程拒绝写入（例如同名冲突）
    #[error("远程拒绝写入: {0}")]
    Conflict(String),

    /// 远程不存在该节点
    #[error("节点不存在: {0}")]
    NotFound(NodeId),

    /// 本地缓存写入时 id 已存在且不允许覆盖
    #[error("缓存中已存在节点: {0}")]
    DuplicateKey(NodeId),

    /// 计算路径时祖先节点不在缓存中
    #[error("节点 {node} 的路径断裂: 祖先 {missing} 未缓存")]
    BrokenChain { node: NodeId, missing: NodeId },
}

impl StoreError {
    /// 是否为网络层错误
    pub fn is_transport(&self) -> bool {
        matches!(self, StoreError::Transport(_))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Transport(format!("无效的响应数据: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
