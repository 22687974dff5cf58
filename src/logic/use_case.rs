use crate::logic::CopyError;
use crate::model::{Id, Node, NodeKind};
use crate::store::NodeStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The six recognized (source kind, scope relationship) combinations that
/// disambiguate scope-sensitive edges. Computed once per top-level copy and
/// threaded unchanged through the whole recursion, so nested alias decisions
/// stay consistent with the top-level intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UseCase {
    SystemCopy,
    OperationCopySameSystem,
    OperationCopyOtherSystem,
    SituationCopySameOperation,
    SituationCopyOtherOperationSameSystem,
    SituationCopyOtherSystem,
}

/// "Same parent" in the scope-classification sense: the destination *is* the
/// source's structural parent. Distinct from same-System ancestry, which is
/// a different predicate answering a different question.
pub fn is_same_structural_parent(source: &Node, destination: &Node) -> bool {
    source.parent.as_deref() == Some(destination.id.as_str())
}

/// Nearest System ancestor of a node (the node itself when it is a System).
pub async fn ancestor_system<S: NodeStore>(
    store: &S,
    node: &Node,
) -> Result<Option<Id>, CopyError> {
    if node.kind == NodeKind::System {
        return Ok(Some(node.id.clone()));
    }

    let mut seen: HashSet<Id> = HashSet::new();
    let mut current = node.parent.clone();
    while let Some(id) = current {
        if !seen.insert(id.clone()) {
            // Parent cycle; treat as no System ancestor.
            return Ok(None);
        }
        match store.get_node(&id).await? {
            Some(parent) if parent.kind == NodeKind::System => return Ok(Some(parent.id)),
            Some(parent) => current = parent.parent.clone(),
            None => return Ok(None),
        }
    }
    Ok(None)
}

impl UseCase {
    /// Classify a top-level copy request. `None` for node kinds whose copy
    /// follows plain owned/alias rules without any special-casing.
    pub async fn classify<S: NodeStore>(
        store: &S,
        source: &Node,
        destination: &Node,
    ) -> Result<Option<UseCase>, CopyError> {
        let use_case = match source.kind {
            NodeKind::System => Some(UseCase::SystemCopy),
            NodeKind::Operation => {
                if is_same_structural_parent(source, destination) {
                    Some(UseCase::OperationCopySameSystem)
                } else {
                    Some(UseCase::OperationCopyOtherSystem)
                }
            }
            NodeKind::Situation => {
                if is_same_structural_parent(source, destination) {
                    Some(UseCase::SituationCopySameOperation)
                } else {
                    let source_system = ancestor_system(store, source).await?;
                    let destination_system = ancestor_system(store, destination).await?;
                    if source_system.is_some() && source_system == destination_system {
                        Some(UseCase::SituationCopyOtherOperationSameSystem)
                    } else {
                        Some(UseCase::SituationCopyOtherSystem)
                    }
                }
            }
            _ => None,
        };
        Ok(use_case)
    }

    /// Whether cloned event triggers must be retargeted from original
    /// situations to their clones. Skipped only for situation copies that
    /// stay within the same System.
    pub fn retargets_triggers(&self) -> bool {
        !matches!(
            self,
            UseCase::SituationCopySameOperation | UseCase::SituationCopyOtherOperationSameSystem
        )
    }
}
