use crate::model::{generate_id, Id, Node, NodeKind};
use crate::store::traits::NodeStore;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory node store backing the server binary and the test suites.
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: Arc<RwLock<HashMap<Id, Node>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl NodeStore for MemoryStore {
    async fn get_node(&self, id: &Id) -> Result<Option<Node>> {
        let nodes = self.nodes.read().await;
        Ok(nodes.get(id).cloned())
    }

    async fn list_nodes(&self, kind: Option<NodeKind>) -> Result<Vec<Node>> {
        let nodes = self.nodes.read().await;
        Ok(nodes
            .values()
            .filter(|node| kind.map_or(true, |k| node.kind == k))
            .cloned()
            .collect())
    }

    async fn insert_node(&self, mut node: Node) -> Result<Node> {
        if node.id.is_empty() {
            node.id = generate_id();
        }
        node.version = 1;
        node.touch();

        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(&node.id) {
            return Err(anyhow!("node '{}' already exists", node.id));
        }
        nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    async fn update_node(&self, mut node: Node) -> Result<Node> {
        let mut nodes = self.nodes.write().await;
        let current = nodes
            .get(&node.id)
            .ok_or_else(|| anyhow!("node '{}' not found", node.id))?;
        node.version = current.version + 1;
        node.touch();
        nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    async fn delete_node(&self, id: &Id) -> Result<bool> {
        let mut nodes = self.nodes.write().await;
        Ok(nodes.remove(id).is_some())
    }
}
