//! 修改相关命令：移动、复制、重命名、新建、删除

use crate::commands::browse::{format_entry, resolve};
use crate::core::{NodeId, PasteOutcome};
use crate::AppState;
use anyhow::{bail, Result};

/// 移动或复制节点到目标
///
/// 目标为文件时放到其所在目录，未指定目标时放到当前目录。
/// 所有源节点需来自同一目录。
pub async fn paste(
    state: &AppState,
    ids: &[String],
    target: Option<&str>,
    copy: bool,
) -> Result<String> {
    if ids.is_empty() {
        bail!("未指定要{}的节点", if copy { "复制" } else { "移动" });
    }

    let mut nodes = Vec::with_capacity(ids.len());
    for id in ids {
        nodes.push(state.store.load_with_ancestors(&NodeId::from(id.as_str())).await?);
    }
    if let Some(first) = nodes.first() {
        if nodes.iter().any(|n| n.parent_id != first.parent_id) {
            bail!("一次只能{}同一目录下的节点", if copy { "复制" } else { "移动" });
        }
    }

    let target = match target {
        Some(id) => Some(resolve(state, Some(id)).await?),
        None => None,
    };

    let outcomes = state.explorer.paste(&nodes, target.as_ref(), copy).await?;
    if outcomes.is_empty() {
        bail!("无法确定放置目标");
    }

    let lines: Vec<String> = outcomes.iter().map(describe_outcome).collect();
    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    if failed == outcomes.len() {
        bail!("{}", lines.join("\n"));
    }
    Ok(lines.join("\n"))
}

pub fn describe_outcome(outcome: &PasteOutcome) -> String {
    match outcome {
        PasteOutcome::Moved(id) => format!("已移动 {}", id),
        PasteOutcome::Copied { source, copy } => format!("已复制 {} -> {}", source, copy),
        PasteOutcome::Unchanged(id) => format!("{} 已在目标目录中", id),
        PasteOutcome::Rejected(id) => format!("不能把 {} 放到自身或其子目录中", id),
        PasteOutcome::Failed { id, error } => format!("{} 失败: {}", id, error),
    }
}

/// 重命名
pub async fn rename(state: &AppState, id: &str, name: &str) -> Result<String> {
    let node = resolve(state, Some(id)).await?;
    let renamed = state.explorer.rename(&node, name).await?;
    Ok(format_entry(&state.store, &renamed))
}

/// 新建目录，未指定父目录时在当前目录下新建
pub async fn mkdir(state: &AppState, name: &str, parent: Option<&str>) -> Result<String> {
    let parent = resolve(state, parent).await?;
    let created = state.explorer.create_dir(&parent, name).await?;
    Ok(format_entry(&state.store, &created))
}

/// 新建空文件
pub async fn touch(state: &AppState, name: &str, parent: Option<&str>) -> Result<String> {
    let parent = resolve(state, parent).await?;
    let created = state.explorer.create_file(&parent, name).await?;
    Ok(format_entry(&state.store, &created))
}

/// 删除节点（目录连同其内容）
pub async fn remove(state: &AppState, ids: &[String]) -> Result<String> {
    let mut lines = Vec::with_capacity(ids.len());
    for id in ids {
        let node = resolve(state, Some(id)).await?;
        if node.is_root() {
            bail!("不能删除根目录");
        }
        state.explorer.delete(&node).await?;
        lines.push(format!("已删除 {}", state.store.label(&node)));
    }
    Ok(lines.join("\n"))
}
