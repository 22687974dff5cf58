use crate::model::{Id, Mep, NodeKind, TriggerState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default timestamp for legacy data migration
fn default_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(0, 0).unwrap_or_else(|| Utc::now())
}

/// An edge-valued property of a node.
///
/// Edges carry node ids, not embedded nodes; the graph is resolved through
/// the store. Map edges carry plain string entries and are never traversed
/// by the copy engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EdgeValue {
    Ref(Option<Id>),
    Many(Vec<Id>),
    Map(HashMap<String, String>),
}

/// Any entity participating in the copyable graph.
///
/// The `kind` selects the catalogue entry fixing every property's copy
/// classification; `scalars` holds the Value-classified properties and
/// `edges` the reference-valued ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Id,
    pub kind: NodeKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    /// Structural parent; absent only for roots (folders) and for nodes not
    /// yet attached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Id>,
    /// Assigned by the store; 0 means "never persisted".
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub scalars: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub edges: HashMap<String, EdgeValue>,

    #[serde(default = "default_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Node input model for creation (without id and version)
/// The id and version will be set store-side upon insertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNode {
    pub kind: NodeKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Id>,
    #[serde(default)]
    pub scalars: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub edges: HashMap<String, EdgeValue>,
}

impl NewNode {
    pub fn into_node(self, id: Id) -> Node {
        let now = Utc::now();
        Node {
            id,
            kind: self.kind,
            name: self.name,
            description: self.description,
            labels: self.labels,
            parent: self.parent,
            version: 0,
            scalars: self.scalars,
            edges: self.edges,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Node {
    /// Empty, unpersisted instance of `kind`; the clone shell the copy
    /// engine populates property by property.
    pub fn empty(kind: NodeKind) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            kind,
            name: String::new(),
            description: None,
            labels: Vec::new(),
            parent: None,
            version: 0,
            scalars: HashMap::new(),
            edges: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        let mut node = Self::empty(kind);
        node.name = name.into();
        node
    }

    /// Single-reference edge value, if set.
    pub fn edge_ref(&self, property: &str) -> Option<&Id> {
        match self.edges.get(property) {
            Some(EdgeValue::Ref(id)) => id.as_ref(),
            _ => None,
        }
    }

    /// Collection edge value; absent edges read as empty.
    pub fn edge_many(&self, property: &str) -> &[Id] {
        match self.edges.get(property) {
            Some(EdgeValue::Many(ids)) => ids,
            _ => &[],
        }
    }

    pub fn edge_map(&self, property: &str) -> Option<&HashMap<String, String>> {
        match self.edges.get(property) {
            Some(EdgeValue::Map(map)) => Some(map),
            _ => None,
        }
    }

    pub fn set_edge_ref(&mut self, property: &str, target: Option<Id>) {
        self.edges.insert(property.to_string(), EdgeValue::Ref(target));
    }

    pub fn push_edge_many(&mut self, property: &str, target: Id) {
        match self.edges.get_mut(property) {
            Some(EdgeValue::Many(ids)) => ids.push(target),
            _ => {
                self.edges
                    .insert(property.to_string(), EdgeValue::Many(vec![target]));
            }
        }
    }

    /// Remove `target` from a collection edge; true when something was
    /// removed.
    pub fn remove_from_edge_many(&mut self, property: &str, target: &Id) -> bool {
        match self.edges.get_mut(property) {
            Some(EdgeValue::Many(ids)) => {
                let before = ids.len();
                ids.retain(|id| id != target);
                ids.len() != before
            }
            _ => false,
        }
    }

    pub fn set_scalar(&mut self, property: &str, value: serde_json::Value) {
        self.scalars.insert(property.to_string(), value);
    }

    pub fn scalar(&self, property: &str) -> Option<&serde_json::Value> {
        self.scalars.get(property)
    }

    /// Message exchange pattern of a Transport node, parsed from its `mep`
    /// scalar.
    pub fn mep(&self) -> Option<Mep> {
        self.scalar("mep")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn set_mep(&mut self, mep: Mep) {
        self.set_scalar("mep", serde_json::to_value(mep).unwrap_or_default());
    }

    /// Activation state of an EventTrigger node, parsed from its `state`
    /// scalar.
    pub fn trigger_state(&self) -> Option<TriggerState> {
        self.scalar("state")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn set_trigger_state(&mut self, state: TriggerState) {
        self.set_scalar("state", serde_json::to_value(state).unwrap_or_default());
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
