//! 文件节点数据模型
//!
//! 线上格式: `{id, parId, name, size, dir, mod}`

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// 节点标识，线上可能是字符串也可能是数字
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct NodeId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Str(String),
    Int(i64),
    Float(f64),
}

impl From<RawId> for NodeId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Str(s) => NodeId(s),
            RawId::Int(n) => NodeId(n.to_string()),
            RawId::Float(f) => NodeId(f.to_string()),
        }
    }
}

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

/// 根节点的 `parId` 为 null、空串或缺失
///
/// `0` 是合法 id，不作特殊处理；旧式服务端见 `HttpRemote::with_zero_parent_as_root`。
fn deserialize_parent<'de, D>(deserializer: D) -> Result<Option<NodeId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<NodeId> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|id| !id.as_str().is_empty()))
}

/// 文件或目录节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(
        rename = "parId",
        default,
        deserialize_with = "deserialize_parent",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub name: String,
    /// 字节数，仅对文件有意义
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "dir", default)]
    pub is_dir: bool,
    /// 最后修改时间（Unix 时间戳）
    #[serde(rename = "mod", default)]
    pub modified_time: i64,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// 浅拷贝并挂到新父节点下（移动）
    pub fn reparented(&self, parent: &NodeId) -> Node {
        Node {
            parent_id: Some(parent.clone()),
            ..self.clone()
        }
    }

    /// 复制字段生成待创建的新节点，id 由存储分配
    pub fn copy_into(&self, parent: &NodeId) -> NewNode {
        NewNode {
            parent_id: parent.clone(),
            name: self.name.clone(),
            size: self.size,
            is_dir: self.is_dir,
            modified_time: self.modified_time,
            copy_of: Some(self.id.clone()),
        }
    }

    /// 更新修改时间为当前时间
    pub fn touch(&mut self) {
        self.modified_time = chrono::Utc::now().timestamp();
    }
}

/// 尚未分配 id 的节点（`POST /base` 请求体）
///
/// `copy_of` 在线上序列化为 `id` 字段，表示“复制自该节点”。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNode {
    #[serde(rename = "parId")]
    pub parent_id: NodeId,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "dir", default)]
    pub is_dir: bool,
    #[serde(rename = "mod", default)]
    pub modified_time: i64,
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub copy_of: Option<NodeId>,
}

impl NewNode {
    pub fn dir(parent: &NodeId, name: impl Into<String>) -> Self {
        Self {
            parent_id: parent.clone(),
            name: name.into(),
            size: 0,
            is_dir: true,
            modified_time: chrono::Utc::now().timestamp(),
            copy_of: None,
        }
    }

    pub fn file(parent: &NodeId, name: impl Into<String>, size: u64) -> Self {
        Self {
            parent_id: parent.clone(),
            name: name.into(),
            size,
            is_dir: false,
            modified_time: chrono::Utc::now().timestamp(),
            copy_of: None,
        }
    }

    /// 赋予 id 后得到完整节点
    pub fn into_node(self, id: NodeId) -> Node {
        Node {
            id,
            parent_id: Some(self.parent_id),
            name: self.name,
            size: if self.is_dir { 0 } else { self.size },
            is_dir: self.is_dir,
            modified_time: self.modified_time,
        }
    }
}
