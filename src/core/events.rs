//! 变更通知
//!
//! 视图通过两种方式订阅：注册回调（[`StoreObserver`]）或订阅广播通道。

use crate::core::node::{Node, NodeId};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// 存储变更事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// 节点已持久化新增
    NewItem(Node),
    /// 节点自身字段变化（重命名、大小、时间）
    Change(Node),
    /// 父节点的子节点集合变化，携带完整的当前子节点列表
    ChildrenChange { parent: Node, children: Vec<Node> },
    /// 节点已删除，携带删除前的快照
    Delete(Node),
}

impl StoreEvent {
    /// 事件涉及的主节点 id
    pub fn node_id(&self) -> &NodeId {
        match self {
            StoreEvent::NewItem(node) => &node.id,
            StoreEvent::Change(node) => &node.id,
            StoreEvent::ChildrenChange { parent, .. } => &parent.id,
            StoreEvent::Delete(node) => &node.id,
        }
    }
}

/// 回调式观察者，所有方法默认忽略事件
pub trait StoreObserver: Send + Sync {
    fn on_new_item(&self, _node: &Node) {}

    fn on_change(&self, _node: &Node) {}

    fn on_children_change(&self, _parent: &Node, _children: &[Node]) {}

    fn on_delete(&self, _node: &Node) {}
}

/// 观察者注册句柄，用于取消注册
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

/// 事件分发器
pub struct EventHub {
    sender: broadcast::Sender<StoreEvent>,
    observers: RwLock<Vec<(ObserverHandle, Arc<dyn StoreObserver>)>>,
    next_handle: AtomicU64,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            observers: RwLock::new(Vec::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// 注册观察者
    pub fn observe(&self, observer: Arc<dyn StoreObserver>) -> ObserverHandle {
        let handle = ObserverHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((handle, observer));
        handle
    }

    /// 取消注册，返回该句柄是否存在
    pub fn unobserve(&self, handle: ObserverHandle) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(h, _)| *h != handle);
        observers.len() != before
    }

    /// 订阅广播通道，只会收到订阅之后的事件
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// 以 Stream 形式订阅
    pub fn stream(&self) -> BroadcastStream<StoreEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// 分发事件
    pub fn emit(&self, event: StoreEvent) {
        // 回调期间不持有锁，观察者可以在回调中注册或取消注册
        let observers: Vec<Arc<dyn StoreObserver>> = self
            .observers
            .read()
            .iter()
            .map(|(_, o)| o.clone())
            .collect();

        for observer in &observers {
            match &event {
                StoreEvent::NewItem(node) => observer.on_new_item(node),
                StoreEvent::Change(node) => observer.on_change(node),
                StoreEvent::ChildrenChange { parent, children } => {
                    observer.on_children_change(parent, children)
                }
                StoreEvent::Delete(node) => observer.on_delete(node),
            }
        }

        // 没有订阅者时发送失败，忽略
        let _ = self.sender.send(event);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(1024)
    }
}
