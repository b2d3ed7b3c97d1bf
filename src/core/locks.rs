//! 按节点 id 串行化的异步锁

use crate::core::node::NodeId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// 同一 id 的操作排队执行，不同 id 互不影响
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<NodeId, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取 id 对应的锁，guard 释放前其他同 id 操作会等待
    pub async fn lock(&self, id: &NodeId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            // 只剩表内引用的锁已无人使用
            locks.retain(|key, lock| key == id || Arc::strong_count(lock) > 1);
            locks.entry(id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}
