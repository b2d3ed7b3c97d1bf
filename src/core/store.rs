//! 缓存存储 - 协调远程存储与内存缓存
//!
//! 读：先查缓存，未命中时从远程加载并写入缓存。
//! 写：先写远程，成功后更新缓存并发出变更事件。`put` 在请求发出前先从缓存移除
//! 该节点，请求期间的读取不会拿到半更新的数据。
//!
//! 目录是否已加载由缓存中是否存在其子节点判断，因此已加载的空目录与未加载目录
//! 无法区分（除非开启 `remember_empty_dirs`）。

use crate::config::CacheConfig;
use crate::core::events::{EventHub, ObserverHandle, StoreEvent, StoreObserver};
use crate::core::locks::KeyedLocks;
use crate::core::memory::{MemoryCache, PutOptions};
use crate::core::node::{NewNode, Node, NodeId};
use crate::error::{Result, StoreError};
use crate::storage::RemoteStore;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

/// 缓存存储
pub struct CachingStore {
    remote: Arc<dyn RemoteStore>,
    cache: MemoryCache,
    events: EventHub,
    config: CacheConfig,
    /// 同一节点的写操作串行执行
    node_locks: KeyedLocks,
    /// 同一目录的并发加载合并为一次远程请求
    fill_locks: KeyedLocks,
    /// 子节点列表来自远程的目录
    loaded_dirs: Mutex<HashSet<NodeId>>,
}

impl CachingStore {
    pub fn new(remote: Arc<dyn RemoteStore>, config: CacheConfig) -> Self {
        Self {
            remote,
            cache: MemoryCache::new(),
            events: EventHub::new(config.event_capacity),
            config,
            node_locks: KeyedLocks::new(),
            fill_locks: KeyedLocks::new(),
            loaded_dirs: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_defaults(remote: Arc<dyn RemoteStore>) -> Self {
        Self::new(remote, CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn remote_name(&self) -> &str {
        self.remote.name()
    }

    // ============ 订阅 ============

    pub fn observe(&self, observer: Arc<dyn StoreObserver>) -> ObserverHandle {
        self.events.observe(observer)
    }

    pub fn unobserve(&self, handle: ObserverHandle) -> bool {
        self.events.unobserve(handle)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn event_stream(&self) -> BroadcastStream<StoreEvent> {
        self.events.stream()
    }

    // ============ 只读访问缓存 ============

    /// 只查缓存，不访问远程
    pub fn cached(&self, id: &NodeId) -> Option<Node> {
        self.cache.get(id)
    }

    pub fn cached_children(&self, parent: &NodeId) -> Vec<Node> {
        self.cache.children_of(parent)
    }

    pub fn query<F>(&self, predicate: F) -> Vec<Node>
    where
        F: Fn(&Node) -> bool,
    {
        self.cache.query(predicate)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    // ============ 目录树模型 ============

    /// 获取根节点
    pub async fn root(&self) -> Result<Node> {
        self.get(&NodeId::new(self.config.root_id.clone())).await
    }

    /// 显示名称，根节点没有名称时使用配置的根标签
    pub fn label<'a>(&'a self, node: &'a Node) -> &'a str {
        if node.is_root() && node.name.is_empty() {
            &self.config.root_label
        } else {
            &node.name
        }
    }

    pub fn may_have_children(&self, node: &Node) -> bool {
        node.is_dir
    }

    // ============ 读 ============

    /// 获取节点，缓存未命中时从远程加载
    pub async fn get(&self, id: &NodeId) -> Result<Node> {
        if let Some(node) = self.cache.get(id) {
            return Ok(node);
        }

        let node = self.remote.get(id).await?;
        debug!("从远程加载节点: {}", id);
        self.admit(node.clone());
        Ok(node)
    }

    /// 获取子节点，是否只返回目录由配置的 `skip_leaves` 决定
    pub async fn get_children(&self, parent: &Node) -> Result<Vec<Node>> {
        self.get_children_with(parent, self.config.skip_leaves).await
    }

    /// 获取子节点
    ///
    /// 缓存中已有子节点时直接返回，否则从远程加载并写入缓存。
    /// 文件没有子节点，直接返回空列表。
    pub async fn get_children_with(&self, parent: &Node, skip_leaves: bool) -> Result<Vec<Node>> {
        if !parent.is_dir {
            return Ok(Vec::new());
        }

        let children = match self.resident_children(&parent.id) {
            Some(children) => {
                debug!("缓存命中: {} ({} 个子节点)", parent.id, children.len());
                children
            }
            None => {
                let _guard = self.fill_locks.lock(&parent.id).await;
                // 等待期间可能已有其他调用完成加载
                match self.resident_children(&parent.id) {
                    Some(children) => children,
                    None => self.fill_children(parent).await?,
                }
            }
        };

        Ok(if skip_leaves {
            children.into_iter().filter(|c| c.is_dir).collect()
        } else {
            children
        })
    }

    /// 重新从远程加载目录，丢弃远程已不存在的缓存子节点
    pub async fn reload_children(&self, parent: &Node) -> Result<Vec<Node>> {
        if !parent.is_dir {
            return Ok(Vec::new());
        }

        let _guard = self.fill_locks.lock(&parent.id).await;
        self.attach(parent).await?;
        let children = self.remote.query_children(&parent.id).await?;
        let remote_ids: HashSet<&NodeId> = children.iter().map(|c| &c.id).collect();

        let mut evicted = Vec::new();
        for stale in self.cache.children_of(&parent.id) {
            if !remote_ids.contains(&stale.id) {
                evicted.extend(self.cache.remove_subtree(&stale.id));
            }
        }
        self.forget_loaded(&evicted);
        self.store_listing(&parent.id, &children)?;

        info!(
            "重新加载目录 {}: {} 个子节点，移除 {} 个过期缓存",
            parent.id,
            children.len(),
            evicted.len()
        );

        let parent = self.cache.get(&parent.id).unwrap_or_else(|| parent.clone());
        self.events.emit(StoreEvent::ChildrenChange {
            parent,
            children: children.clone(),
        });
        Ok(children)
    }

    /// 依次加载根优先的 id 路径上的每一级，使整条路径驻留在缓存中
    pub async fn expand_path(&self, ids: &[NodeId]) -> Result<Vec<Node>> {
        let Some((first, rest)) = ids.split_first() else {
            return Ok(Vec::new());
        };

        let mut current = self.get(first).await?;
        let mut nodes = vec![current.clone()];
        for id in rest {
            current = self
                .get_children_with(&current, false)
                .await?
                .into_iter()
                .find(|c| &c.id == id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            nodes.push(current.clone());
        }

        Ok(nodes)
    }

    /// 加载节点并使其所有祖先驻留在缓存中
    pub async fn load_with_ancestors(&self, id: &NodeId) -> Result<Node> {
        let mut chain = Vec::new();
        let mut current = Some(id.clone());

        while let Some(next) = current {
            let node = match self.cache.get(&next) {
                Some(node) => node,
                None => self.remote.get(&next).await?,
            };
            if chain.iter().any(|n: &Node| n.id == node.id) {
                return Err(StoreError::BrokenChain {
                    node: id.clone(),
                    missing: node.id,
                });
            }
            current = node.parent_id.clone();
            chain.push(node);
        }

        let ids: Vec<NodeId> = chain.into_iter().rev().map(|n| n.id).collect();
        let mut nodes = self.expand_path(&ids).await?;
        nodes.pop().ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    /// 根优先的 id 路径（包含节点自身），只查缓存
    pub fn get_path(&self, node: &Node) -> Result<Vec<NodeId>> {
        let mut path = vec![node.id.clone()];
        let mut current = node.clone();
        // 缓存中出现环时避免死循环
        let limit = self.cache.len() + 1;

        while let Some(parent_id) = current.parent_id.clone() {
            let parent = self
                .cache
                .get(&parent_id)
                .filter(|_| path.len() <= limit)
                .ok_or_else(|| StoreError::BrokenChain {
                    node: node.id.clone(),
                    missing: parent_id.clone(),
                })?;
            path.push(parent.id.clone());
            current = parent;
        }

        path.reverse();
        Ok(path)
    }

    // ============ 写 ============

    /// 更新节点
    ///
    /// 请求前先从缓存移除；失败时保持移除状态并返回错误。
    pub async fn put(&self, node: &Node) -> Result<NodeId> {
        let _guard = self.node_locks.lock(&node.id).await;

        self.cache.remove(&node.id);
        match self.remote.put(node).await {
            Ok(updated) => {
                info!("已更新节点: {} ({})", updated.id, updated.name);
                self.admit(updated.clone());
                self.events.emit(StoreEvent::Change(updated));
                Ok(node.id.clone())
            }
            Err(e) => {
                warn!("更新节点 {} 失败: {}", node.id, e);
                Err(e)
            }
        }
    }

    /// 新增节点，返回远程分配的 id
    pub async fn add(&self, node: &NewNode) -> Result<NodeId> {
        match self.remote.add(node).await {
            Ok(created) => {
                info!("已新增节点: {} ({})", created.id, created.name);
                let id = created.id.clone();
                self.admit(created.clone());
                self.events.emit(StoreEvent::NewItem(created));
                Ok(id)
            }
            Err(e) => {
                warn!("新增节点 {} 失败: {}", node.name, e);
                Err(e)
            }
        }
    }

    /// 删除节点，成功后从缓存移除该节点及其子树
    pub async fn remove(&self, id: &NodeId) -> Result<()> {
        let _guard = self.node_locks.lock(id).await;

        let snapshot = match self.cache.get(id) {
            Some(node) => node,
            None => self.remote.get(id).await?,
        };

        if let Err(e) = self.remote.remove(id).await {
            warn!("删除节点 {} 失败: {}", id, e);
            return Err(e);
        }

        let evicted = self.cache.remove_subtree(id);
        self.forget_loaded(&evicted);
        info!("已删除节点: {} ({})，移除 {} 个缓存", id, snapshot.name, evicted.len());

        self.events.emit(StoreEvent::Delete(snapshot));
        Ok(())
    }

    /// 重新计算父节点的完整子节点列表并发出 `ChildrenChange`
    pub async fn notify_children_change(&self, parent: &Node) -> Result<Vec<Node>> {
        let children = self.get_children_with(parent, false).await?;
        let parent = self.cache.get(&parent.id).unwrap_or_else(|| parent.clone());
        self.events.emit(StoreEvent::ChildrenChange {
            parent,
            children: children.clone(),
        });
        Ok(children)
    }

    /// 清空缓存，下次读取时重新从远程加载
    pub fn clear(&self) {
        self.cache.clear();
        self.loaded_dirs.lock().clear();
    }

    // ============ 内部 ============

    /// 目录的子节点是否已驻留缓存，是则返回
    fn resident_children(&self, parent: &NodeId) -> Option<Vec<Node>> {
        let children = self.cache.children_of(parent);
        let remembered =
            self.config.remember_empty_dirs && self.loaded_dirs.lock().contains(parent);
        (!children.is_empty() || remembered).then_some(children)
    }

    /// 目录的子节点列表是否来自远程
    fn is_listing_resident(&self, parent: &NodeId) -> bool {
        self.loaded_dirs.lock().contains(parent) || !self.cache.children_of(parent).is_empty()
    }

    async fn fill_children(&self, parent: &Node) -> Result<Vec<Node>> {
        self.attach(parent).await?;
        let children = self.remote.query_children(&parent.id).await?;
        debug!("从远程加载 {} 的 {} 个子节点", parent.id, children.len());

        self.store_listing(&parent.id, &children)?;
        Ok(children)
    }

    /// 写入目录的完整子节点列表，调用前父节点必须已缓存
    fn store_listing(&self, parent: &NodeId, children: &[Node]) -> Result<()> {
        for child in children {
            self.cache.put(child.clone(), PutOptions::default())?;
        }
        self.loaded_dirs.lock().insert(parent.clone());
        Ok(())
    }

    /// 使节点驻留缓存，连同它的祖先链
    ///
    /// 向上找到第一个已缓存的祖先（或根节点），再自上而下加载每一级目录的
    /// 完整子节点列表，不会只缓存某个目录的部分子节点。
    async fn attach(&self, node: &Node) -> Result<()> {
        if self.cache.contains(&node.id) {
            return Ok(());
        }

        let mut chain = vec![node.clone()];
        while let Some(parent_id) = chain.last().and_then(|n| n.parent_id.clone()) {
            if let Some(parent) = self.cache.get(&parent_id) {
                chain.push(parent);
                break;
            }
            if chain.iter().any(|n| n.id == parent_id) {
                return Err(StoreError::BrokenChain {
                    node: node.id.clone(),
                    missing: parent_id,
                });
            }
            let parent = self.remote.get(&parent_id).await?;
            chain.push(parent);
        }

        let mut levels = chain.into_iter().rev();
        let Some(mut upper) = levels.next() else {
            return Ok(());
        };
        if !self.cache.contains(&upper.id) {
            // 链顶未缓存时只能是根节点
            self.cache.put(upper.clone(), PutOptions::default())?;
        }

        for lower in levels {
            if !self.cache.contains(&lower.id) {
                let children = self.remote.query_children(&upper.id).await?;
                debug!("加载祖先目录 {} 的 {} 个子节点", upper.id, children.len());
                self.store_listing(&upper.id, &children)?;
                if !self.cache.contains(&lower.id) {
                    return Err(StoreError::NotFound(lower.id));
                }
            }
            upper = lower;
        }
        Ok(())
    }

    /// 写入缓存，父目录的子节点列表未加载时跳过，避免缓存中出现不完整的目录
    fn admit(&self, node: Node) {
        let admitted = match &node.parent_id {
            None => true,
            Some(parent) => self.cache.contains(parent) && self.is_listing_resident(parent),
        };

        if admitted {
            let _ = self.cache.put(node, PutOptions::default());
        } else {
            debug!("父目录未加载，暂不缓存: {}", node.id);
        }
    }

    fn forget_loaded(&self, evicted: &[Node]) {
        if evicted.is_empty() {
            return;
        }
        let mut loaded = self.loaded_dirs.lock();
        for node in evicted {
            loaded.remove(&node.id);
        }
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

    fn file(id: &str, parent: &str, size: u64) -> Node {
        Node {
            is_dir: false,
            size,
            ..dir(id, Some(parent))
        }
    }

    fn store(nodes: Vec<Node>) -> CachingStore {
        CachingStore::with_defaults(Arc::new(MemoryRemote::from_nodes(nodes)))
    }

    fn sample() -> CachingStore {
        store(vec![
            dir("root", None),
            dir("a", Some("root")),
            dir("c", Some("a")),
            file("b", "a", 2000),
            file("readme", "root", 10),
        ])
    }

    #[tokio::test]
    async fn test_skip_leaves_filters_files() {
        let store = sample();
        let root = store.root().await.unwrap();

        let dirs = store.get_children(&root).await.unwrap();
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].id.as_str(), "a");

        let all = store.get_children_with(&root, false).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_file_has_no_children() {
        let store = sample();
        let readme = file("readme", "root", 10);
        assert!(store.get_children_with(&readme, false).await.unwrap().is_empty());
        assert_eq!(store.cached_len(), 0);
    }

    #[tokio::test]
    async fn test_get_path_walks_cached_ancestors() {
        let store = sample();
        let c = store.load_with_ancestors(&"c".into()).await.unwrap();

        let path = store.get_path(&c).unwrap();
        assert_eq!(path, vec![NodeId::from("root"), "a".into(), "c".into()]);
    }

    #[tokio::test]
    async fn test_get_path_reports_broken_chain() {
        let store = sample();
        let c = dir("c", Some("a"));

        let err = store.get_path(&c).unwrap_err();
        assert!(matches!(err, StoreError::BrokenChain { missing, .. } if missing.as_str() == "a"));
    }

    #[tokio::test]
    async fn test_put_updates_cache_and_emits_change() {
        let store = sample();
        let root = store.root().await.unwrap();
        store.get_children_with(&root, false).await.unwrap();
        let mut rx = store.subscribe();

        let mut readme = store.get(&"readme".into()).await.unwrap();
        readme.name = "README.md".into();
        store.put(&readme).await.unwrap();

        assert_eq!(store.cached(&"readme".into()).unwrap().name, "README.md");
        assert!(matches!(rx.recv().await.unwrap(), StoreEvent::Change(n) if n.name == "README.md"));
    }

    #[tokio::test]
    async fn test_failed_put_leaves_entry_evicted() {
        let store = sample();
        let root = store.root().await.unwrap();
        store.get_children_with(&root, false).await.unwrap();
        let mut rx = store.subscribe();

        // 与同级目录 a 重名，远程拒绝
        let mut readme = store.get(&"readme".into()).await.unwrap();
        readme.name = "a".into();
        let err = store.put(&readme).await.unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(store.cached(&"readme".into()).is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_add_caches_when_listing_resident() {
        let store = sample();
        let root = store.root().await.unwrap();
        store.get_children_with(&root, false).await.unwrap();

        let id = store.add(&NewNode::dir(&root.id, "new")).await.unwrap();

        assert_eq!(store.cached(&id).unwrap().name, "new");
        assert_eq!(store.get_children_with(&root, false).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_add_into_unloaded_dir_does_not_hide_siblings() {
        let store = sample();
        let root = store.root().await.unwrap();
        let a = store.get_children(&root).await.unwrap().remove(0);

        store.add(&NewNode::file(&a.id, "x.txt", 1)).await.unwrap();

        let children = store.get_children_with(&a, false).await.unwrap();
        assert_eq!(children.len(), 3);
    }

    #[tokio::test]
    async fn test_remove_evicts_subtree_and_emits_snapshot() {
        let store = sample();
        let a = store.load_with_ancestors(&"a".into()).await.unwrap();
        store.get_children_with(&a, false).await.unwrap();
        let mut rx = store.subscribe();

        store.remove(&a.id).await.unwrap();

        assert!(store.cached(&"a".into()).is_none());
        assert!(store.cached(&"b".into()).is_none());
        assert!(matches!(rx.recv().await.unwrap(), StoreEvent::Delete(n) if n.id.as_str() == "a"));
    }

    #[tokio::test]
    async fn test_remember_empty_dirs() {
        let remote = Arc::new(MemoryRemote::from_nodes(vec![dir("root", None), dir("e", Some("root"))]));
        let config = CacheConfig {
            remember_empty_dirs: true,
            ..Default::default()
        };
        let store = CachingStore::new(remote.clone(), config);
        let e = store.load_with_ancestors(&"e".into()).await.unwrap();

        assert!(store.get_children(&e).await.unwrap().is_empty());
        // 远程新增的节点不会被看到，说明第二次读取来自缓存
        remote.add(&NewNode::file(&e.id, "late", 1)).await.unwrap();
        assert!(store.get_children_with(&e, false).await.unwrap().is_empty());

        assert_eq!(store.reload_children(&e).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reload_drops_stale_children() {
        let remote = Arc::new(MemoryRemote::from_nodes(vec![
            dir("root", None),
            dir("a", Some("root")),
            dir("d", Some("a")),
            file("f", "d", 1),
        ]));
        let store = CachingStore::with_defaults(remote.clone());
        let d = store.load_with_ancestors(&"d".into()).await.unwrap();
        store.get_children_with(&d, false).await.unwrap();
        let a = store.cached(&"a".into()).unwrap();

        remote.remove(&"d".into()).await.unwrap();
        let children = store.reload_children(&a).await.unwrap();

        assert!(children.is_empty());
        assert!(store.cached(&"d".into()).is_none());
        assert!(store.cached(&"f".into()).is_none());
    }

    #[tokio::test]
    async fn test_fill_loads_parent_ancestry_completely() {
        let store = sample();
        let a = store.get(&"a".into()).await.unwrap();
        assert!(store.cached(&"a".into()).is_none());

        store.get_children_with(&a, false).await.unwrap();

        assert!(store.cached(&"root".into()).is_some());
        let root = store.cached(&"root".into()).unwrap();
        assert_eq!(store.get_children_with(&root, false).await.unwrap().len(), 2);
        assert_eq!(store.get_path(&store.cached(&"b".into()).unwrap()).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_fill_of_detached_parent_is_not_found() {
        let store = sample();
        let ghost = dir("ghost", Some("a"));

        let err = store.get_children_with(&ghost, false).await.unwrap_err();

        assert!(matches!(err, StoreError::NotFound(id) if id.as_str() == "ghost"));
        assert!(store.cached(&"ghost".into()).is_none());
    }

    #[tokio::test]
    async fn test_label_falls_back_for_unnamed_root() {
        let store = store(vec![Node {
            name: String::new(),
            ..dir("root", None)
        }]);
        let root = store.root().await.unwrap();
        assert_eq!(store.label(&root), "web root");
        assert!(store.may_have_children(&root));
    }
}
