#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rfe_lib::core::{NewNode, Node, NodeId};
use rfe_lib::error::{Result, StoreError};
use rfe_lib::storage::{MemoryRemote, RemoteStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 记录每次远程调用，并可注入 `put` 失败的远程存储
pub struct RecordingRemote {
    inner: MemoryRemote,
    calls: Mutex<Vec<String>>,
    fail_puts: AtomicBool,
}

impl RecordingRemote {
    pub fn new(inner: MemoryRemote) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            fail_puts: AtomicBool::new(false),
        }
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// 增删改调用次数
    pub fn mutations(&self) -> usize {
        self.count("add:") + self.count("put:") + self.count("remove:")
    }

    pub fn inner(&self) -> &MemoryRemote {
        &self.inner
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl RemoteStore for RecordingRemote {
    async fn get(&self, id: &NodeId) -> Result<Node> {
        self.record(format!("get:{}", id));
        self.inner.get(id).await
    }

    async fn query_children(&self, parent: &NodeId) -> Result<Vec<Node>> {
        self.record(format!("query:{}", parent));
        self.inner.query_children(parent).await
    }

    async fn add(&self, node: &NewNode) -> Result<Node> {
        self.record(format!("add:{}", node.name));
        self.inner.add(node).await
    }

    async fn put(&self, node: &Node) -> Result<Node> {
        self.record(format!("put:{}", node.id));
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("连接被重置".to_string()));
        }
        self.inner.put(node).await
    }

    async fn remove(&self, id: &NodeId) -> Result<()> {
        self.record(format!("remove:{}", id));
        self.inner.remove(id).await
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub fn dir(id: &str, parent: Option<&str>) -> Node {
    Node {
        id: id.into(),
        parent_id: parent.map(NodeId::from),
        name: id.to_string(),
        size: 0,
        is_dir: true,
        modified_time: 0,
    }
}

pub fn file(id: &str, parent: &str, size: u64) -> Node {
    Node {
        is_dir: false,
        size,
        ..dir(id, Some(parent))
    }
}

/// root -> a -> {b (2000 字节文件), c}
pub fn sample_remote() -> Arc<RecordingRemote> {
    Arc::new(RecordingRemote::new(MemoryRemote::from_nodes(vec![
        dir("root", None),
        dir("a", Some("root")),
        file("b", "a", 2000),
        dir("c", Some("a")),
    ])))
}
