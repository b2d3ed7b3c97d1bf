//! 控制台观察者：把存储变更逐条打印出来

use crate::core::{Node, StoreObserver};
use parking_lot::Mutex;

/// 打印每个变更事件；`history` 保留已打印的行
#[derive(Default)]
pub struct ConsoleObserver {
    quiet: bool,
    history: Mutex<Vec<String>>,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 只记录不打印
    pub fn quiet() -> Self {
        Self {
            quiet: true,
            ..Default::default()
        }
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }

    fn print(&self, line: String) {
        if !self.quiet {
            eprintln!("{}", line);
        }
        self.history.lock().push(line);
    }
}

impl StoreObserver for ConsoleObserver {
    fn on_new_item(&self, node: &Node) {
        self.print(format!("+ {} [{}]", node.name, node.id));
    }

    fn on_change(&self, node: &Node) {
        self.print(format!("~ {} [{}]", node.name, node.id));
    }

    fn on_children_change(&self, parent: &Node, children: &[Node]) {
        let names: Vec<&str> = children.iter().map(|c| c.name.as_str()).collect();
        self.print(format!(
            "* {} [{}]: {}",
            parent.name,
            parent.id,
            names.join(", ")
        ));
    }

    fn on_delete(&self, node: &Node) {
        self.print(format!("- {} [{}]", node.name, node.id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CachingStore, Explorer, NodeId};
    use crate::storage::MemoryRemote;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_prints_events_in_order() {
        let remote = MemoryRemote::with_root("root", "");
        let store = Arc::new(CachingStore::with_defaults(Arc::new(remote)));
        let explorer = Explorer::new(store.clone());
        let observer = Arc::new(ConsoleObserver::quiet());
        store.observe(observer.clone());

        let root = store.root().await.unwrap();
        let docs = explorer.create_dir(&root, "docs").await.unwrap();
        explorer.delete(&docs).await.unwrap();

        let history = observer.history();
        assert_eq!(history.len(), 4);
        assert!(history[0].starts_with("+ docs"));
        assert!(history[1].ends_with(": docs"));
        assert!(history[2].starts_with("- docs"));
        assert_eq!(history[3], format!("*  [{}]: ", NodeId::from("root")));
    }
}
