//! 浏览相关命令

use crate::core::{CachingStore, Listing, Node, NodeId};
use crate::AppState;
use anyhow::{anyhow, Result};

/// 按 id 定位节点（含其祖先），未指定时为当前目录
pub async fn resolve(state: &AppState, id: Option<&str>) -> Result<Node> {
    match id {
        Some(id) => Ok(state.store.load_with_ancestors(&NodeId::from(id)).await?),
        None => Ok(state.explorer.current_or_root().await?),
    }
}

/// 列出目录内容（不改变当前目录）
pub async fn list(state: &AppState, id: Option<&str>) -> Result<String> {
    let dir = resolve(state, id).await?;
    if !dir.is_dir {
        return Ok(format_entry(&state.store, &dir));
    }
    let children = state.store.get_children_with(&dir, false).await?;
    let path = state.store.get_path(&dir)?;
    Ok(format_listing(
        &state.store,
        &Listing {
            dir,
            path,
            children,
        },
    ))
}

/// 切换当前目录
pub async fn change_dir(state: &AppState, id: &str) -> Result<String> {
    let listing = state
        .explorer
        .display_id(&NodeId::from(id))
        .await?
        .ok_or_else(|| anyhow!("{} 不是目录", id))?;
    Ok(format_path(&state.store, &listing.path))
}

/// 当前目录的路径
pub async fn current_path(state: &AppState) -> Result<String> {
    let dir = state.explorer.current_or_root().await?;
    let path = state.store.get_path(&dir)?;
    Ok(format_path(&state.store, &path))
}

/// 返回上级目录
pub async fn go_up(state: &AppState) -> Result<String> {
    match state.explorer.go_dir_up().await? {
        Some(listing) => Ok(format_path(&state.store, &listing.path)),
        None => Ok("已在根目录".to_string()),
    }
}

/// 从远程重新加载当前目录
pub async fn reload(state: &AppState) -> Result<String> {
    let listing = state.explorer.reload().await?;
    Ok(format_listing(&state.store, &listing))
}

/// 目录树，只展开目录（是否显示文件由缓存配置的 skipLeaves 决定）
pub async fn tree(state: &AppState, id: Option<&str>, depth: usize) -> Result<String> {
    let top = resolve(state, id).await?;
    let mut lines = vec![state.store.label(&top).to_string()];

    let mut stack: Vec<(Node, usize)> = vec![(top, 0)];
    while let Some((node, level)) = stack.pop() {
        if level > 0 {
            lines.push(format!(
                "{}{}",
                "  ".repeat(level),
                format_entry(&state.store, &node)
            ));
        }
        if level >= depth || !state.store.may_have_children(&node) {
            continue;
        }
        let children = state.store.get_children(&node).await?;
        stack.extend(children.into_iter().rev().map(|child| (child, level + 1)));
    }

    Ok(lines.join("\n"))
}

pub fn format_path(store: &CachingStore, path: &[NodeId]) -> String {
    let names: Vec<String> = path
        .iter()
        .filter_map(|id| store.cached(id))
        .map(|node| {
            if node.is_root() {
                String::new()
            } else {
                node.name
            }
        })
        .collect();

    match names.as_slice() {
        [] | [_] => "/".to_string(),
        _ => names.join("/"),
    }
}

pub fn format_entry(store: &CachingStore, node: &Node) -> String {
    if node.is_dir {
        format!("{}/  [{}]", store.label(node), node.id)
    } else {
        format!("{}  {}  [{}]", store.label(node), format_size(node.size), node.id)
    }
}

pub fn format_listing(store: &CachingStore, listing: &Listing) -> String {
    let mut lines = vec![format!(
        "{} ({} 项)",
        format_path(store, &listing.path),
        listing.children.len()
    )];
    lines.extend(
        listing
            .children
            .iter()
            .map(|child| format!("  {}", format_entry(store, child))),
    );
    lines.join("\n")
}

fn format_size(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", size)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CachingStore, Explorer};
    use crate::storage::MemoryRemote;
    use std::sync::Arc;

    fn node(id: &str, parent: Option<&str>, is_dir: bool) -> Node {
        Node {
            id: id.into(),
            parent_id: parent.map(NodeId::from),
            name: id.to_string(),
            size: if is_dir { 0 } else { 2048 },
            is_dir,
            modified_time: 0,
        }
    }

    fn state() -> AppState {
        let remote = MemoryRemote::from_nodes(vec![
            node("root", None, true),
            node("a", Some("root"), true),
            node("b", Some("a"), false),
            node("c", Some("a"), true),
        ]);
        let store = Arc::new(CachingStore::with_defaults(Arc::new(remote)));
        AppState {
            explorer: Arc::new(Explorer::new(store.clone())),
            store,
            config_dir: std::env::temp_dir(),
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
    }

    #[tokio::test]
    async fn test_cd_and_pwd() {
        let state = state();
        assert_eq!(current_path(&state).await.unwrap(), "/");
        assert_eq!(change_dir(&state, "c").await.unwrap(), "/a/c");
        assert_eq!(go_up(&state).await.unwrap(), "/a");
        assert!(change_dir(&state, "b").await.is_err());
    }

    #[tokio::test]
    async fn test_tree_skips_files() {
        let state = state();
        let tree = tree(&state, None, 5).await.unwrap();
        assert!(tree.contains("a/"));
        assert!(tree.contains("    c/"));
        assert!(!tree.contains("b  "));
    }

    #[tokio::test]
    async fn test_list_includes_files() {
        let state = state();
        let output = list(&state, Some("a")).await.unwrap();
        assert!(output.starts_with("/a (2 项)"));
        assert!(output.contains("b  2.0 KB"));
    }
}
