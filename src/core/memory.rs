//! 内存缓存 - 远程存储的本地镜像
//!
//! 按插入顺序保存节点，支持按 id 查找和按条件查询。所有操作都是同步的。

use crate::core::node::{NewNode, Node, NodeId};
use crate::error::{Result, StoreError};
use indexmap::IndexMap;
use parking_lot::RwLock;

/// 写入选项
#[derive(Debug, Clone, Copy)]
pub struct PutOptions {
    /// 为 false 时，id 已存在则返回 `DuplicateKey`
    pub overwrite: bool,
}

impl Default for PutOptions {
    fn default() -> Self {
        Self { overwrite: true }
    }
}

impl PutOptions {
    pub fn no_overwrite() -> Self {
        Self { overwrite: false }
    }
}

/// 为缺少 id 的节点生成本地 id（UUID，避免随机数碰撞）
pub fn generate_local_id() -> NodeId {
    NodeId::new(format!("local-{}", uuid::Uuid::new_v4()))
}

/// 节点内存缓存
#[derive(Debug, Default)]
pub struct MemoryCache {
    nodes: RwLock<IndexMap<NodeId, Node>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &NodeId) -> Option<Node> {
        self.nodes.read().get(id).cloned()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.read().contains_key(id)
    }

    /// 按条件查询，结果保持插入顺序
    pub fn query<F>(&self, predicate: F) -> Vec<Node>
    where
        F: Fn(&Node) -> bool,
    {
        self.nodes
            .read()
            .values()
            .filter(|node| predicate(node))
            .cloned()
            .collect()
    }

    /// 查询 `parent_id` 等于给定 id 的所有节点
    pub fn children_of(&self, parent: &NodeId) -> Vec<Node> {
        self.query(|node| node.parent_id.as_ref() == Some(parent))
    }

    /// 插入或替换节点，替换时保留原有位置
    pub fn put(&self, node: Node, options: PutOptions) -> Result<NodeId> {
        let mut nodes = self.nodes.write();
        if !options.overwrite && nodes.contains_key(&node.id) {
            return Err(StoreError::DuplicateKey(node.id));
        }
        let id = node.id.clone();
        nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// 插入尚无 id 的节点，由缓存分配 id
    pub fn insert_new(&self, node: NewNode) -> NodeId {
        let id = generate_local_id();
        self.nodes.write().insert(id.clone(), node.into_node(id.clone()));
        id
    }

    /// 移除节点，不存在时无操作
    pub fn remove(&self, id: &NodeId) -> Option<Node> {
        self.nodes.write().shift_remove(id)
    }

    /// 移除节点及其所有已缓存的后代，返回被移除的节点
    pub fn remove_subtree(&self, id: &NodeId) -> Vec<Node> {
        let mut nodes = self.nodes.write();
        let mut removed = Vec::new();
        let mut pending = vec![id.clone()];

        while let Some(current) = pending.pop() {
            pending.extend(
                nodes
                    .values()
                    .filter(|node| node.parent_id.as_ref() == Some(&current))
                    .map(|node| node.id.clone()),
            );
            if let Some(node) = nodes.shift_remove(&current) {
                removed.push(node);
            }
        }

        removed
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    pub fn clear(&self) {
        self.nodes.write().clear();
    }
}
