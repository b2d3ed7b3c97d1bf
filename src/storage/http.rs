use super::RemoteStore;
use crate::core::node::{NewNode, Node, NodeId};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// `POST` 的响应可能是完整节点，也可能只是新 id
#[derive(Deserialize)]
#[serde(untagged)]
enum Created {
    Node(Node),
    Id(NodeId),
}

/// REST 风格的 JSON 远程存储
///
/// - `GET base/{id}` 获取节点
/// - `GET base/{id}/` 列出子节点
/// - `POST base` 新增
/// - `PUT base/{id}` 更新
/// - `DELETE base/{id}` 删除
pub struct HttpRemote {
    client: Client,
    base_url: String,
    name: String,
    zero_parent_is_root: bool,
}

impl HttpRemote {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let mut builder = Client::builder();
        if timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(timeout_secs));
        }
        let client = builder.build()?;
        let base_url = base_url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            name: format!("rest:{}", base_url),
            base_url,
            zero_parent_is_root: false,
        })
    }

    /// 旧式服务端用 `parId: 0` 表示根节点
    ///
    /// 开启后 id 为 `0` 的节点不能再作为父节点。
    pub fn with_zero_parent_as_root(mut self, enabled: bool) -> Self {
        self.zero_parent_is_root = enabled;
        self
    }

    fn normalize(&self, mut node: Node) -> Node {
        if self.zero_parent_is_root && node.parent_id.as_ref().is_some_and(|p| p.as_str() == "0") {
            node.parent_id = None;
        }
        node
    }

    fn node_url(&self, id: &NodeId) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(id.as_str()))
    }

    /// 将非 2xx 响应映射为存储错误
    async fn ensure_success(response: Response, id: &NodeId) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = if body.trim().is_empty() {
            status.to_string()
        } else {
            body
        };

        Err(match status {
            StatusCode::NOT_FOUND => StoreError::NotFound(id.clone()),
            StatusCode::CONFLICT
            | StatusCode::PRECONDITION_FAILED
            | StatusCode::UNPROCESSABLE_ENTITY => StoreError::Conflict(detail),
            _ => StoreError::Transport(format!("HTTP {}: {}", status.as_u16(), detail)),
        })
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn get(&self, id: &NodeId) -> Result<Node> {
        let response = self.client.get(self.node_url(id)).send().await?;
        let response = Self::ensure_success(response, id).await?;
        Ok(self.normalize(response.json::<Node>().await?))
    }

    async fn query_children(&self, parent: &NodeId) -> Result<Vec<Node>> {
        let url = format!("{}/", self.node_url(parent));
        let response = self.client.get(url).send().await?;
        let response = Self::ensure_success(response, parent).await?;
        let children = response.json::<Vec<Node>>().await?;
        Ok(children.into_iter().map(|c| self.normalize(c)).collect())
    }

    async fn add(&self, node: &NewNode) -> Result<Node> {
        let response = self.client.post(&self.base_url).json(node).send().await?;
        let response = Self::ensure_success(response, &node.parent_id).await?;
        let body = response.text().await?;

        match serde_json::from_str::<Created>(&body)? {
            Created::Node(created) => Ok(self.normalize(created)),
            Created::Id(id) => Ok(node.clone().into_node(id)),
        }
    }

    async fn put(&self, node: &Node) -> Result<Node> {
        let response = self
            .client
            .put(self.node_url(&node.id))
            .json(node)
            .send()
            .await?;
        let response = Self::ensure_success(response, &node.id).await?;
        let body = response.text().await?;

        // 服务端没有返回节点时以请求体为准
        Ok(serde_json::from_str::<Node>(&body)
            .map(|updated| self.normalize(updated))
            .unwrap_or_else(|_| node.clone()))
    }

    async fn remove(&self, id: &NodeId) -> Result<()> {
        let response = self.client.delete(self.node_url(id)).send().await?;
        Self::ensure_success(response, id).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_url_encodes_id() {
        let remote = HttpRemote::new("http://example.com/api/", 5).unwrap();
        assert_eq!(
            remote.node_url(&NodeId::from("a b/c")),
            "http://example.com/api/a%20b%2Fc"
        );
        assert_eq!(remote.name(), "rest:http://example.com/api");
    }

    #[test]
    fn test_created_accepts_id_or_node() {
        let id: Created = serde_json::from_str("42").unwrap();
        assert!(matches!(id, Created::Id(id) if id.as_str() == "42"));

        let node: Created =
            serde_json::from_str(r#"{"id": "n1", "parId": "root", "name": "x", "dir": true}"#).unwrap();
        assert!(matches!(node, Created::Node(n) if n.is_dir));
    }
}
