//! 文件浏览器
//!
//! 跟踪当前显示的目录，把目录树和文件列表的操作落到缓存存储上。

use crate::core::node::{NewNode, Node, NodeId};
use crate::core::paste::{PasteEngine, PasteOutcome};
use crate::core::session::SessionState;
use crate::core::store::CachingStore;
use crate::error::{Result, StoreError};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 一次目录显示的结果
#[derive(Debug, Clone)]
pub struct Listing {
    pub dir: Node,
    /// 根优先的 id 路径
    pub path: Vec<NodeId>,
    /// 目录下的所有子节点（包括文件）
    pub children: Vec<Node>,
}

pub struct Explorer {
    store: Arc<CachingStore>,
    paste: PasteEngine,
    current: RwLock<Option<Node>>,
}

impl Explorer {
    pub fn new(store: Arc<CachingStore>) -> Self {
        Self {
            paste: PasteEngine::new(store.clone()),
            store,
            current: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &Arc<CachingStore> {
        &self.store
    }

    pub fn paste_engine(&self) -> &PasteEngine {
        &self.paste
    }

    /// 当前显示的目录，优先取缓存中的最新版本
    pub fn current(&self) -> Option<Node> {
        let snapshot = self.current.read().clone()?;
        Some(self.store.cached(&snapshot.id).unwrap_or(snapshot))
    }

    /// 当前目录，尚未显示任何目录时为根目录
    pub async fn current_or_root(&self) -> Result<Node> {
        match self.refresh_current().await? {
            Some(dir) => Ok(dir),
            None => self.store.root().await,
        }
    }

    /// 当前目录被移动或重命名后已不在缓存中时，从远程重新加载它和它的祖先
    async fn refresh_current(&self) -> Result<Option<Node>> {
        let Some(snapshot) = self.current.read().clone() else {
            return Ok(None);
        };
        let fresh = match self.store.cached(&snapshot.id) {
            Some(node) => node,
            None => {
                debug!("当前目录不在缓存中，重新加载: {}", snapshot.id);
                self.store.load_with_ancestors(&snapshot.id).await?
            }
        };
        *self.current.write() = Some(fresh.clone());
        Ok(Some(fresh))
    }

    /// 修改操作之后同步当前目录，失败时保留旧值
    async fn settle_current(&self) {
        if let Err(e) = self.refresh_current().await {
            warn!("无法刷新当前目录: {}", e);
        }
    }

    /// 显示目录：加载其路径和全部子节点，并设为当前目录
    ///
    /// 文件不能显示，返回 `None`。
    pub async fn display(&self, dir: &Node) -> Result<Option<Listing>> {
        if !dir.is_dir {
            debug!("{} 不是目录，忽略", dir.id);
            return Ok(None);
        }

        let path = self.store.get_path(dir)?;
        let children = self.store.get_children_with(dir, false).await?;
        *self.current.write() = Some(dir.clone());

        Ok(Some(Listing {
            dir: dir.clone(),
            path,
            children,
        }))
    }

    /// 按 id 显示目录，会先加载其所有祖先
    pub async fn display_id(&self, id: &NodeId) -> Result<Option<Listing>> {
        let node = self.store.load_with_ancestors(id).await?;
        self.display(&node).await
    }

    /// 显示上级目录，已在根目录时返回 `None`
    pub async fn go_dir_up(&self) -> Result<Option<Listing>> {
        let current = self.current_or_root().await?;
        match &current.parent_id {
            Some(parent) => {
                let parent = self.store.get(parent).await?;
                self.display(&parent).await
            }
            None => Ok(None),
        }
    }

    /// 重新从远程加载当前目录
    pub async fn reload(&self) -> Result<Listing> {
        let dir = self.current_or_root().await?;
        let children = self.store.reload_children(&dir).await?;
        let path = self.store.get_path(&dir)?;
        Ok(Listing {
            dir,
            path,
            children,
        })
    }

    /// 重命名节点
    pub async fn rename(&self, node: &Node, name: &str) -> Result<Node> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Conflict("名称不能为空".to_string()));
        }

        let mut renamed = node.clone();
        renamed.name = name.to_string();
        renamed.touch();

        let id = self.store.put(&renamed).await?;
        let renamed = self.store.get(&id).await?;
        self.settle_current().await;
        Ok(renamed)
    }

    /// 在目录中新建子目录
    pub async fn create_dir(&self, parent: &Node, name: &str) -> Result<Node> {
        self.create(parent, NewNode::dir(&parent.id, name.trim())).await
    }

    /// 在目录中新建空文件
    pub async fn create_file(&self, parent: &Node, name: &str) -> Result<Node> {
        self.create(parent, NewNode::file(&parent.id, name.trim(), 0)).await
    }

    async fn create(&self, parent: &Node, draft: NewNode) -> Result<Node> {
        if !parent.is_dir {
            return Err(StoreError::Conflict(format!("{} 不是目录", parent.name)));
        }
        if draft.name.is_empty() {
            return Err(StoreError::Conflict("名称不能为空".to_string()));
        }

        // 先加载父目录，新节点才能进入缓存
        self.store.get_children_with(parent, false).await?;
        let id = self.store.add(&draft).await?;
        self.store.notify_children_change(parent).await?;
        self.store.get(&id).await
    }

    /// 删除节点；删除的是当前目录（或其祖先）时退回到其父目录
    pub async fn delete(&self, node: &Node) -> Result<()> {
        let path_of_current = match self.current() {
            Some(current) => self.store.get_path(&current).unwrap_or_default(),
            None => Vec::new(),
        };

        self.store.remove(&node.id).await?;

        if let Some(parent) = node.parent_id.as_ref().and_then(|p| self.store.cached(p)) {
            self.store.notify_children_change(&parent).await?;
            if path_of_current.contains(&node.id) {
                info!("当前目录已删除，返回 {}", parent.id);
                *self.current.write() = Some(parent);
            }
        }
        Ok(())
    }

    /// 拖放节点
    ///
    /// `target` 为放置位置（目录、文件或空白处），空白处使用当前目录。
    pub async fn paste(
        &self,
        nodes: &[Node],
        target: Option<&Node>,
        copy: bool,
    ) -> Result<Vec<PasteOutcome>> {
        let fallback = self.current_or_root().await?;
        let Some(target) = self.paste.resolve_drop_target(target, &fallback) else {
            warn!("无法确定放置目标");
            return Ok(Vec::new());
        };
        let outcomes = self.paste.drop_nodes(nodes, &target, copy).await;
        self.settle_current().await;
        Ok(outcomes)
    }

    /// 恢复上次会话的目录，失败时显示根目录
    pub async fn restore_session(&self, config_dir: &Path) -> Result<Listing> {
        let session = SessionState::load(config_dir);

        if let Some(path) = session.last_path() {
            match self.store.expand_path(&path).await {
                Ok(nodes) => {
                    if let Some(dir) = nodes.last() {
                        if let Some(listing) = self.display(dir).await? {
                            debug!("恢复会话目录: {}", dir.id);
                            return Ok(listing);
                        }
                    }
                }
                Err(e) => warn!("无法恢复上次的目录，使用根目录: {}", e),
            }
        }

        let root = self.store.root().await?;
        self.display(&root)
            .await?
            .ok_or_else(|| StoreError::Conflict("根节点不是目录".to_string()))
    }

    /// 保存当前目录路径
    pub fn save_session(&self, config_dir: &Path) -> anyhow::Result<()> {
        let Some(current) = self.current() else {
            return Ok(());
        };
        let path = self.store.get_path(&current)?;
        SessionState::from_paths(&[path]).save(config_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryRemote;

    fn dir(id: &str, parent: Option<&str>) -> Node {
        Node {
            id: id.into(),
            parent_id: parent.map(NodeId::from),
            name: id.to_string(),
            size: 0,
            is_dir: true,
            modified_time: 0,
        }
    }

    fn explorer() -> Explorer {
        let remote = MemoryRemote::from_nodes(vec![
            dir("root", None),
            dir("a", Some("root")),
            dir("c", Some("a")),
            dir("x", Some("root")),
            Node {
                is_dir: false,
                size: 2000,
                ..dir("b", Some("a"))
            },
        ]);
        Explorer::new(Arc::new(CachingStore::with_defaults(Arc::new(remote))))
    }

    #[tokio::test]
    async fn test_display_and_go_up() {
        let explorer = explorer();

        let listing = explorer.display_id(&"c".into()).await.unwrap().unwrap();
        assert_eq!(listing.path.len(), 3);

        let up = explorer.go_dir_up().await.unwrap().unwrap();
        assert_eq!(up.dir.id.as_str(), "a");
        assert_eq!(up.children.len(), 2);

        explorer.go_dir_up().await.unwrap();
        assert!(explorer.go_dir_up().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_display_file_is_ignored() {
        let explorer = explorer();
        assert!(explorer.display_id(&"b".into()).await.unwrap().is_none());
        assert!(explorer.current().is_none());
    }

    #[tokio::test]
    async fn test_create_rename_delete() {
        let explorer = explorer();
        let listing = explorer.display_id(&"a".into()).await.unwrap().unwrap();

        let created = explorer.create_dir(&listing.dir, "docs").await.unwrap();
        assert_eq!(explorer.store().cached_children(&"a".into()).len(), 3);

        let renamed = explorer.rename(&created, "notes").await.unwrap();
        assert_eq!(renamed.name, "notes");

        explorer.display(&renamed).await.unwrap();
        explorer.delete(&renamed).await.unwrap();
        assert_eq!(explorer.current().unwrap().id.as_str(), "a");
        assert_eq!(explorer.store().cached_children(&"a".into()).len(), 2);
    }

    #[tokio::test]
    async fn test_paste_on_empty_space_uses_current_dir() {
        let explorer = explorer();
        explorer.display_id(&"c".into()).await.unwrap();
        let b = explorer.store().cached(&"b".into()).unwrap();

        let outcomes = explorer.paste(&[b], None, false).await.unwrap();

        assert!(outcomes[0].is_success());
        assert_eq!(
            explorer.store().get(&"b".into()).await.unwrap().parent_id,
            Some("c".into())
        );
    }

    #[tokio::test]
    async fn test_moved_current_dir_follows_new_parent() {
        let dir = tempfile::tempdir().unwrap();
        let explorer = explorer();
        explorer.display_id(&"c".into()).await.unwrap();
        let c = explorer.current().unwrap();
        let x = explorer.store().get(&"x".into()).await.unwrap();

        let outcomes = explorer.paste(&[c], Some(&x), false).await.unwrap();
        assert!(outcomes[0].is_success());
        assert_eq!(explorer.current().unwrap().parent_id, Some("x".into()));

        explorer.save_session(dir.path()).unwrap();
        let session = SessionState::load(dir.path());
        assert_eq!(
            session.last_path().unwrap(),
            vec![NodeId::from("root"), "x".into(), "c".into()]
        );

        let up = explorer.go_dir_up().await.unwrap().unwrap();
        assert_eq!(up.dir.id.as_str(), "x");
    }

    #[tokio::test]
    async fn test_renamed_current_dir_is_reflected() {
        let explorer = explorer();
        let listing = explorer.display_id(&"c".into()).await.unwrap().unwrap();

        explorer.rename(&listing.dir, "renamed").await.unwrap();

        assert_eq!(explorer.current().unwrap().name, "renamed");
        assert_eq!(explorer.reload().await.unwrap().dir.name, "renamed");
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let explorer = explorer();
        explorer.display_id(&"c".into()).await.unwrap();
        explorer.save_session(dir.path()).unwrap();

        let restored = self::explorer().restore_session(dir.path()).await.unwrap();
        assert_eq!(restored.dir.id.as_str(), "c");
    }

    #[tokio::test]
    async fn test_restore_falls_back_to_root() {
        let dir = tempfile::tempdir().unwrap();
        SessionState {
            paths: "root/gone".to_string(),
        }
        .save(dir.path())
        .unwrap();

        let restored = explorer().restore_session(dir.path()).await.unwrap();
        assert_eq!(restored.dir.id.as_str(), "root");
    }
}
