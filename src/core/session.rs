//! 选中路径的持久化
//!
//! 路径内的 id 用 `/` 连接，多条路径之间用 `,` 分隔，例如 `root/a/c,root/x`。

use crate::config::{load_section, save_section};
use crate::core::node::NodeId;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

const PATH_SEPARATOR: char = '/';
const LIST_SEPARATOR: char = ',';

/// 将多条路径编码为字符串
pub fn encode_paths(paths: &[Vec<NodeId>]) -> String {
    paths
        .iter()
        .filter(|path| !path.is_empty())
        .map(|path| {
            path.iter()
                .map(NodeId::as_str)
                .collect::<Vec<_>>()
                .join(&PATH_SEPARATOR.to_string())
        })
        .collect::<Vec<_>>()
        .join(&LIST_SEPARATOR.to_string())
}

/// 解码路径字符串，忽略空段
pub fn decode_paths(encoded: &str) -> Vec<Vec<NodeId>> {
    encoded
        .split(LIST_SEPARATOR)
        .map(|path| {
            path.split(PATH_SEPARATOR)
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(NodeId::from)
                .collect::<Vec<_>>()
        })
        .filter(|path| !path.is_empty())
        .collect()
}

/// 会话状态（上次选中的路径）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub paths: String,
}

impl SessionState {
    pub fn from_paths(paths: &[Vec<NodeId>]) -> Self {
        Self {
            paths: encode_paths(paths),
        }
    }

    pub fn paths(&self) -> Vec<Vec<NodeId>> {
        decode_paths(&self.paths)
    }

    /// 最后一条路径，恢复时用它确定当前目录
    pub fn last_path(&self) -> Option<Vec<NodeId>> {
        self.paths().pop()
    }

    pub fn load(config_dir: &Path) -> Self {
        load_section(config_dir, "session")
    }

    pub fn save(&self, config_dir: &Path) -> Result<()> {
        save_section(config_dir, "session", self)
    }
}
