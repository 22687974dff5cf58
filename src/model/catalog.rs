use serde::{Deserialize, Serialize};

/// Closed set of node categories participating in the copyable graph.
///
/// Each kind carries a statically declared table of copyable properties
/// (see [`NodeKind::copyable_properties`]); the copy engine never inspects a
/// node beyond what its kind's table declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Folder,
    System,
    Server,
    Transport,
    Operation,
    Situation,
    IntegrationStep,
    Template,
    ParsingRule,
    EventTrigger,
    CallChain,
    CallStep,
}

/// Classification of a single property of a node kind.
///
/// The classification is a static fact about the (owner kind, property)
/// pair; it never changes at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    /// Scalar or simple value, copied by value.
    Value,
    /// Single exclusively-owned child node, deep-cloned.
    OwnedChild,
    /// Collection of exclusively-owned children, deep-cloned preserving
    /// order.
    OwnedCollection,
    /// Shared reference, always kept pointing at the original target.
    Alias,
    /// Reference whose treatment depends on whether the copy crosses a
    /// structural scope boundary.
    ScopeSensitive(ScopeAware),
    /// String map, rebuilt shallowly; entries copied by value.
    Map,
}

/// Refinement of the scope-sensitive classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeAware {
    /// Plain scope rule: alias inside the same structural parent, clone once
    /// per session otherwise.
    Plain,
    /// Operation reference; resolution additionally consults the owning
    /// transport's message exchange pattern.
    Operation,
    /// Template reference; resolution additionally consults the template's
    /// own parent scope (Operation vs System).
    Template,
}

/// One row of a node kind's classification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertySpec {
    pub name: &'static str,
    pub kind: EdgeKind,
    /// Target kind for edge-valued properties; `None` for values and maps.
    pub target: Option<NodeKind>,
}

const fn value(name: &'static str) -> PropertySpec {
    PropertySpec {
        name,
        kind: EdgeKind::Value,
        target: None,
    }
}

const fn map(name: &'static str) -> PropertySpec {
    PropertySpec {
        name,
        kind: EdgeKind::Map,
        target: None,
    }
}

const fn owned(name: &'static str, target: NodeKind) -> PropertySpec {
    PropertySpec {
        name,
        kind: EdgeKind::OwnedCollection,
        target: Some(target),
    }
}

const fn owned_one(name: &'static str, target: NodeKind) -> PropertySpec {
    PropertySpec {
        name,
        kind: EdgeKind::OwnedChild,
        target: Some(target),
    }
}

const fn alias(name: &'static str, target: NodeKind) -> PropertySpec {
    PropertySpec {
        name,
        kind: EdgeKind::Alias,
        target: Some(target),
    }
}

const fn scoped(name: &'static str, aware: ScopeAware, target: NodeKind) -> PropertySpec {
    PropertySpec {
        name,
        kind: EdgeKind::ScopeSensitive(aware),
        target: Some(target),
    }
}

const FOLDER_PROPS: &[PropertySpec] = &[
    owned("folders", NodeKind::Folder),
    owned("systems", NodeKind::System),
    owned("servers", NodeKind::Server),
    owned("chains", NodeKind::CallChain),
];

// Transports are listed ahead of operations so that, during a system copy,
// every transport clone is already in the session cache by the time an
// operation's scope-sensitive transport reference is resolved.
const SYSTEM_PROPS: &[PropertySpec] = &[
    owned("transports", NodeKind::Transport),
    owned("operations", NodeKind::Operation),
    owned("templates", NodeKind::Template),
    owned("parsing_rules", NodeKind::ParsingRule),
    alias("server", NodeKind::Server),
];

const SERVER_PROPS: &[PropertySpec] = &[value("url")];

const TRANSPORT_PROPS: &[PropertySpec] = &[value("mep"), map("properties")];

const OPERATION_PROPS: &[PropertySpec] = &[
    scoped("transport", ScopeAware::Plain, NodeKind::Transport),
    owned("situations", NodeKind::Situation),
    owned("templates", NodeKind::Template),
    owned("parsing_rules", NodeKind::ParsingRule),
    alias("error_situation", NodeKind::Situation),
];

const SITUATION_PROPS: &[PropertySpec] = &[
    owned("steps", NodeKind::IntegrationStep),
    owned("triggers", NodeKind::EventTrigger),
];

const INTEGRATION_STEP_PROPS: &[PropertySpec] = &[
    alias("situation", NodeKind::Situation),
    alias("sender", NodeKind::System),
    alias("receiver", NodeKind::System),
    scoped("operation", ScopeAware::Operation, NodeKind::Operation),
    scoped("template", ScopeAware::Template, NodeKind::Template),
    owned_one("rule", NodeKind::ParsingRule),
];

const TEMPLATE_PROPS: &[PropertySpec] = &[value("content")];

const PARSING_RULE_PROPS: &[PropertySpec] = &[value("expression"), value("parsed_parameter")];

const EVENT_TRIGGER_PROPS: &[PropertySpec] = &[
    alias("situation", NodeKind::Situation),
    value("state"),
];

const CALL_CHAIN_PROPS: &[PropertySpec] = &[owned("steps", NodeKind::CallStep), map("keys")];

const CALL_STEP_PROPS: &[PropertySpec] = &[
    alias("situation", NodeKind::Situation),
    alias("chain", NodeKind::CallChain),
];

impl NodeKind {
    /// Statically declared classification table for this kind.
    pub fn copyable_properties(&self) -> &'static [PropertySpec] {
        match self {
            NodeKind::Folder => FOLDER_PROPS,
            NodeKind::System => SYSTEM_PROPS,
            NodeKind::Server => SERVER_PROPS,
            NodeKind::Transport => TRANSPORT_PROPS,
            NodeKind::Operation => OPERATION_PROPS,
            NodeKind::Situation => SITUATION_PROPS,
            NodeKind::IntegrationStep => INTEGRATION_STEP_PROPS,
            NodeKind::Template => TEMPLATE_PROPS,
            NodeKind::ParsingRule => PARSING_RULE_PROPS,
            NodeKind::EventTrigger => EVENT_TRIGGER_PROPS,
            NodeKind::CallChain => CALL_CHAIN_PROPS,
            NodeKind::CallStep => CALL_STEP_PROPS,
        }
    }

    /// The classification of a single property, if the kind declares it.
    pub fn property_kind(&self, name: &str) -> Option<EdgeKind> {
        self.copyable_properties()
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.kind)
    }

    /// Which owned slot of this kind accepts a child of `candidate` kind.
    ///
    /// Returns the property name of the accepting collection, or `None` when
    /// this kind never owns children of that kind.
    pub fn accepts(&self, candidate: NodeKind) -> Option<&'static str> {
        self.copyable_properties()
            .iter()
            .find(|spec| {
                matches!(spec.kind, EdgeKind::OwnedChild | EdgeKind::OwnedCollection)
                    && spec.target == Some(candidate)
            })
            .map(|spec| spec.name)
    }

    /// Whether the copy engine may build an empty instance of this kind.
    ///
    /// Servers describe deployed infrastructure and are only ever referenced,
    /// never duplicated.
    pub fn is_instantiable(&self) -> bool {
        !matches!(self, NodeKind::Server)
    }
}
