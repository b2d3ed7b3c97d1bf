//! 拖放时的移动/复制

use crate::core::node::{Node, NodeId};
use crate::core::store::CachingStore;
use crate::error::{Result, StoreError};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 批量拖放中单个节点的结果
#[derive(Debug, Clone)]
pub enum PasteOutcome {
    Moved(NodeId),
    Copied { source: NodeId, copy: NodeId },
    /// 已在目标目录中，无需移动
    Unchanged(NodeId),
    /// 目标是自身或其子孙，不允许放置
    Rejected(NodeId),
    Failed { id: NodeId, error: StoreError },
}

impl PasteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            PasteOutcome::Moved(_) | PasteOutcome::Copied { .. } | PasteOutcome::Unchanged(_)
        )
    }
}

/// 移动/复制引擎
pub struct PasteEngine {
    store: Arc<CachingStore>,
}

impl PasteEngine {
    pub fn new(store: Arc<CachingStore>) -> Self {
        Self { store }
    }

    /// 祖先环检查：目标是节点自身或其子孙时返回 false
    ///
    /// 沿缓存中的 `parent_id` 向上查找；祖先不在缓存中时无法确认，同样拒绝。
    pub fn may_drop(&self, child: &Node, new_parent: &Node) -> bool {
        if child.is_root() || !new_parent.is_dir || new_parent.id == child.id {
            return false;
        }

        let mut current = new_parent.parent_id.clone();
        let mut steps = 0;
        while let Some(id) = current {
            if id == child.id {
                return false;
            }
            steps += 1;
            match self.store.cached(&id) {
                Some(ancestor) if steps <= self.store.cached_len() => current = ancestor.parent_id,
                _ => {
                    warn!("无法确认 {} 的祖先 {}，拒绝放置", new_parent.id, id);
                    return false;
                }
            }
        }
        true
    }

    /// 确定放置目标
    ///
    /// - 目录：目录本身
    /// - 文件：文件所在目录
    /// - 空白处：`fallback`（当前列表所显示的目录）
    pub fn resolve_drop_target(&self, target: Option<&Node>, fallback: &Node) -> Option<Node> {
        match target {
            Some(node) if node.is_dir => Some(node.clone()),
            Some(node) => node.parent_id.as_ref().and_then(|p| self.store.cached(p)),
            None => Some(fallback.clone()),
        }
    }

    /// 移动或复制单个节点
    ///
    /// 主操作失败时不发出任何 `ChildrenChange`，错误直接返回。
    /// 成功后依次为旧父目录（仅移动）和新父目录发出 `ChildrenChange`。
    pub async fn paste_item(
        &self,
        child: &Node,
        old_parent: &Node,
        new_parent: &Node,
        copy: bool,
    ) -> Result<NodeId> {
        if !new_parent.is_dir {
            return Err(StoreError::Conflict(format!("{} 不是目录", new_parent.name)));
        }

        // 先加载目标目录，保证通知中的子节点列表完整
        self.store.get_children_with(new_parent, false).await?;

        let id = if copy {
            let id = self.store.add(&child.copy_into(&new_parent.id)).await?;
            info!("已复制 {} -> {} (新 id {})", child.id, new_parent.id, id);
            id
        } else {
            let id = self.store.put(&child.reparented(&new_parent.id)).await?;
            info!("已移动 {}: {} -> {}", child.id, old_parent.id, new_parent.id);
            self.refresh(old_parent).await;
            id
        };

        self.refresh(new_parent).await;
        Ok(id)
    }

    /// 处理一次拖放
    ///
    /// 所有节点视为来自同一父目录，旧父目录只查询一次。每个节点独立执行，
    /// 某个节点失败不会回滚已完成的节点。
    pub async fn drop_nodes(&self, nodes: &[Node], target: &Node, copy: bool) -> Vec<PasteOutcome> {
        let Some(first) = nodes.first() else {
            return Vec::new();
        };

        let old_parent = match &first.parent_id {
            Some(parent) => self.store.get(parent).await.map_err(Some),
            None => Err(None),
        };

        let tasks = nodes.iter().map(|node| {
            let old_parent = &old_parent;
            async move {
                if !self.may_drop(node, target) {
                    warn!("拒绝放置 {} 到 {}", node.id, target.id);
                    return PasteOutcome::Rejected(node.id.clone());
                }
                if !copy && node.parent_id.as_ref() == Some(&target.id) {
                    debug!("{} 已在 {} 中", node.id, target.id);
                    return PasteOutcome::Unchanged(node.id.clone());
                }

                let old_parent = match old_parent {
                    Ok(parent) => parent,
                    Err(error) => {
                        return PasteOutcome::Failed {
                            id: node.id.clone(),
                            error: error
                                .clone()
                                .unwrap_or_else(|| StoreError::NotFound(node.id.clone())),
                        }
                    }
                };

                match self.paste_item(node, old_parent, target, copy).await {
                    Ok(id) if copy => PasteOutcome::Copied {
                        source: node.id.clone(),
                        copy: id,
                    },
                    Ok(id) => PasteOutcome::Moved(id),
                    Err(error) => PasteOutcome::Failed {
                        id: node.id.clone(),
                        error,
                    },
                }
            }
        });

        join_all(tasks).await
    }

    /// 主操作已成功，通知失败只记录日志
    async fn refresh(&self, parent: &Node) {
        if let Err(e) = self.store.notify_children_change(parent).await {
            warn!("刷新 {} 的子节点失败: {}", parent.id, e);
        }
    }
}
