use crate::model::{Id, Node, NodeKind};
use anyhow::Result;

/// Persistence capability the copy engine consumes.
///
/// Identity and version assignment happen store-side: `insert_node` assigns
/// a fresh id (when none is set) and version 1, `update_node` bumps the
/// version. The engine never generates identities itself.
#[async_trait::async_trait]
pub trait NodeStore: Send + Sync {
    async fn get_node(&self, id: &Id) -> Result<Option<Node>>;
    async fn list_nodes(&self, kind: Option<NodeKind>) -> Result<Vec<Node>>;
    /// Persist a new node, assigning identity and version. Returns the
    /// stored node.
    async fn insert_node(&self, node: Node) -> Result<Node>;
    /// Persist changes to an existing node, bumping its version.
    async fn update_node(&self, node: Node) -> Result<Node>;
    async fn delete_node(&self, id: &Id) -> Result<bool>;
}
