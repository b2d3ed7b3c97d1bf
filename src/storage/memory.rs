use super::RemoteStore;
use crate::core::node::{NewNode, Node, NodeId};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Default)]
struct Tree {
    nodes: IndexMap<NodeId, Node>,
    next_id: u64,
}

impl Tree {
    /// 单调递增分配 id，跳过快照中已存在的 id
    fn allocate_id(&mut self) -> NodeId {
        loop {
            self.next_id += 1;
            let id = NodeId::new(format!("n{}", self.next_id));
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }

    fn directory(&self, id: &NodeId) -> Result<&Node> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if !node.is_dir {
            return Err(StoreError::Conflict(format!("{} 不是目录", node.name)));
        }
        Ok(node)
    }

    fn name_taken(&self, parent: &NodeId, name: &str, except: Option<&NodeId>) -> bool {
        self.nodes.values().any(|n| {
            n.parent_id.as_ref() == Some(parent) && n.name == name && Some(&n.id) != except
        })
    }

    /// 复制到已有同名文件的目录时生成新名称
    fn unique_copy_name(&self, parent: &NodeId, name: &str) -> String {
        if !self.name_taken(parent, name, None) {
            return name.to_string();
        }
        (1..)
            .map(|i| {
                if i == 1 {
                    format!("{} (copy)", name)
                } else {
                    format!("{} (copy {})", name, i)
                }
            })
            .find(|candidate| !self.name_taken(parent, candidate, None))
            .unwrap_or_else(|| name.to_string())
    }

    fn is_descendant(&self, id: &NodeId, ancestor: &NodeId) -> bool {
        let mut current = self.nodes.get(id);
        while let Some(node) = current {
            if &node.id == ancestor {
                return true;
            }
            current = node.parent_id.as_ref().and_then(|p| self.nodes.get(p));
        }
        false
    }

    fn children(&self, parent: &NodeId) -> Vec<Node> {
        self.nodes
            .values()
            .filter(|n| n.parent_id.as_ref() == Some(parent))
            .cloned()
            .collect()
    }

    fn copy_subtree(&mut self, source: &NodeId, target: &NodeId) {
        for child in self.children(source) {
            let id = self.allocate_id();
            self.nodes.insert(id.clone(), child.copy_into(target).into_node(id.clone()));
            if child.is_dir {
                self.copy_subtree(&child.id, &id);
            }
        }
    }

    fn remove_subtree(&mut self, id: &NodeId) -> usize {
        let mut removed = 0;
        for child in self.children(id) {
            removed += self.remove_subtree(&child.id);
        }
        if self.nodes.shift_remove(id).is_some() {
            removed += 1;
        }
        removed
    }
}

/// 进程内的权威存储
///
/// 可从 JSON 快照加载，加载自文件时每次写操作后写回快照。
#[derive(Debug)]
pub struct MemoryRemote {
    tree: Mutex<Tree>,
    snapshot_path: Option<PathBuf>,
    /// 快照的生成与写入串行执行，后完成的写入总是较新的快照
    persist_lock: tokio::sync::Mutex<()>,
    name: String,
}

impl MemoryRemote {
    /// 仅包含根目录的存储
    pub fn with_root(root_id: &str, label: &str) -> Self {
        Self::from_nodes(vec![Node {
            id: root_id.into(),
            parent_id: None,
            name: label.to_string(),
            size: 0,
            is_dir: true,
            modified_time: chrono::Utc::now().timestamp(),
        }])
    }

    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        let tree = Tree {
            nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            next_id: 0,
        };
        Self {
            tree: Mutex::new(tree),
            snapshot_path: None,
            persist_lock: tokio::sync::Mutex::new(()),
            name: "memory".to_string(),
        }
    }

    /// 从 JSON 快照（节点数组）加载
    pub fn load_snapshot(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let nodes: Vec<Node> = serde_json::from_str(&content)?;
        let roots = nodes.iter().filter(|n| n.is_root()).count();
        if roots != 1 {
            anyhow::bail!("快照必须恰好包含一个根节点，实际为 {}", roots);
        }

        let mut remote = Self::from_nodes(nodes);
        remote.snapshot_path = Some(path.to_path_buf());
        remote.name = format!("snapshot:{}", path.display());
        Ok(remote)
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.tree.lock().nodes.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tree.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.lock().nodes.is_empty()
    }

    /// 写回快照文件
    ///
    /// 内存中的修改已生效，写文件失败只记录日志。
    async fn persist(&self) {
        let Some(path) = &self.snapshot_path else {
            return;
        };

        let _guard = self.persist_lock.lock().await;
        let data = match serde_json::to_vec_pretty(&self.nodes()) {
            Ok(data) => data,
            Err(e) => {
                warn!("序列化快照失败: {}", e);
                return;
            }
        };
        if let Err(e) = tokio::fs::write(path, data).await {
            warn!("写入快照 {} 失败: {}", path.display(), e);
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn get(&self, id: &NodeId) -> Result<Node> {
        self.tree
            .lock()
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn query_children(&self, parent: &NodeId) -> Result<Vec<Node>> {
        let tree = self.tree.lock();
        let node = tree
            .nodes
            .get(parent)
            .ok_or_else(|| StoreError::NotFound(parent.clone()))?;
        if !node.is_dir {
            return Ok(Vec::new());
        }
        Ok(tree.children(parent))
    }

    async fn add(&self, node: &NewNode) -> Result<Node> {
        let created = {
            let mut tree = self.tree.lock();
            tree.directory(&node.parent_id)?;

            let mut draft = node.clone();
            match &node.copy_of {
                Some(_) => draft.name = tree.unique_copy_name(&node.parent_id, &node.name),
                None if tree.name_taken(&node.parent_id, &node.name, None) => {
                    return Err(StoreError::Conflict(format!("{} 已存在", node.name)));
                }
                None => {}
            }

            let id = tree.allocate_id();
            let created = draft.into_node(id.clone());
            tree.nodes.insert(id.clone(), created.clone());

            if let Some(source) = &node.copy_of {
                if tree.nodes.get(source).is_some_and(|s| s.is_dir) {
                    tree.copy_subtree(source, &id);
                }
            }
            created
        };

        self.persist().await;
        Ok(created)
    }

    async fn put(&self, node: &Node) -> Result<Node> {
        let updated = {
            let mut tree = self.tree.lock();
            let existing = tree
                .nodes
                .get(&node.id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(node.id.clone()))?;

            if existing.parent_id != node.parent_id {
                let parent = node
                    .parent_id
                    .as_ref()
                    .ok_or_else(|| StoreError::Conflict("不能将节点设为根节点".to_string()))?;
                tree.directory(parent)?;
                if tree.is_descendant(parent, &node.id) {
                    return Err(StoreError::Conflict(format!(
                        "不能将 {} 移动到自身或其子目录中",
                        existing.name
                    )));
                }
            }

            if let Some(parent) = &node.parent_id {
                if tree.name_taken(parent, &node.name, Some(&node.id)) {
                    return Err(StoreError::Conflict(format!("{} 已存在", node.name)));
                }
            }

            let updated = Node {
                is_dir: existing.is_dir,
                size: if existing.is_dir { 0 } else { node.size },
                ..node.clone()
            };
            tree.nodes.insert(node.id.clone(), updated.clone());
            updated
        };

        self.persist().await;
        Ok(updated)
    }

    async fn remove(&self, id: &NodeId) -> Result<()> {
        {
            let mut tree = self.tree.lock();
            let node = tree
                .nodes
                .get(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            if node.is_root() {
                return Err(StoreError::Conflict("不能删除根目录".to_string()));
            }
            let removed = tree.remove_subtree(id);
            tracing::debug!("删除 {} 个节点", removed);
        }

        self.persist().await;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
