use crate::logic::use_case::{is_same_structural_parent, UseCase};
use crate::logic::{CopyError, MoveError};
use crate::model::{EdgeKind, EdgeValue, Id, Node, NodeKind, ScopeAware, TriggerState};
use crate::store::{CopySessionCache, NodeStore};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Caller-supplied knobs for one top-level copy invocation.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Scopes the identity cache; unrelated concurrent copies must use
    /// distinct sessions.
    pub session: String,
    /// When set, every cloned event trigger is reset to the inactive state
    /// after rewiring.
    pub deactivate_triggers: bool,
}

impl CopyOptions {
    pub fn session(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            deactivate_triggers: false,
        }
    }

    pub fn deactivating(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            deactivate_triggers: true,
        }
    }
}

/// Per-invocation state threaded through every recursive clone so nested
/// alias decisions stay consistent with the top-level intent.
#[derive(Debug, Clone)]
pub(crate) struct CopyContext {
    pub session: String,
    pub use_case: Option<UseCase>,
    /// Top-level "same parent" verdict: destination is the source's
    /// structural parent.
    pub same_parent: bool,
    pub destination_id: Id,
}

/// The entity-graph copy/move engine.
///
/// Owns the session-keyed identity cache (dependency-injected, not a
/// process-wide singleton) and guarantees the session is cleared on both
/// success and error paths of `copy`.
pub struct CopyOperations {
    cache: Arc<CopySessionCache>,
}

impl CopyOperations {
    pub fn new(cache: Arc<CopySessionCache>) -> Self {
        Self { cache }
    }

    pub(crate) fn cache(&self) -> &CopySessionCache {
        &self.cache
    }

    /// Explicit session teardown for callers that manage sessions across a
    /// wider transaction. `copy` already clears its own session.
    pub fn clear_session(&self, session: &str) {
        self.cache.clear_session(session);
    }

    /// Copy the subtree rooted at `source_id` under `destination_id`.
    ///
    /// Deterministic for a given (source, destination, session): the clone's
    /// owned subtree is isomorphic to the source's, alias edges point at
    /// originals and scope-crossing edges at session-deduplicated clones.
    pub async fn copy<S: NodeStore>(
        &self,
        store: &S,
        source_id: &Id,
        destination_id: &Id,
        options: &CopyOptions,
    ) -> Result<Node, CopyError> {
        let result = self
            .copy_inner(store, source_id, destination_id, options)
            .await;
        self.cache.clear_session(&options.session);
        result
    }

    async fn copy_inner<S: NodeStore>(
        &self,
        store: &S,
        source_id: &Id,
        destination_id: &Id,
        options: &CopyOptions,
    ) -> Result<Node, CopyError> {
        let source = require(store, source_id).await?;
        let destination = require(store, destination_id).await?;

        let slot = destination.kind.accepts(source.kind).ok_or_else(|| {
            CopyError::DestinationRejects {
                destination: destination.id.clone(),
                kind: source.kind,
            }
        })?;

        let use_case = UseCase::classify(store, &source, &destination).await?;
        let ctx = CopyContext {
            session: options.session.clone(),
            use_case,
            same_parent: is_same_structural_parent(&source, &destination),
            destination_id: destination.id.clone(),
        };
        log::info!(
            "copy '{}' ({:?}) -> '{}' [use case {:?}, session {}]",
            source.id,
            source.kind,
            destination.id,
            use_case,
            ctx.session
        );

        let clone_id = self
            .clone_node(store, &ctx, &source, Some(destination_id))
            .await?;

        // Attach the root clone to the accepting destination slot.
        let slot_kind = destination.kind.property_kind(slot);
        let mut destination = require(store, destination_id).await?;
        match slot_kind {
            Some(EdgeKind::OwnedChild) => destination.set_edge_ref(slot, Some(clone_id.clone())),
            _ => destination.push_edge_many(slot, clone_id.clone()),
        }
        store.update_node(destination).await?;

        if ctx.use_case.is_some() {
            self.rewire(store, &ctx, &clone_id).await?;
        }

        if options.deactivate_triggers {
            self.deactivate_cloned_triggers(store, &ctx.session).await?;
        }

        require(store, &clone_id).await
    }

    /// Recursively build a clone of `source`, persisting the shell first so
    /// children can reference the new parent id. Every produced clone is
    /// recorded in the session cache.
    pub(crate) fn clone_node<'a, S: NodeStore>(
        &'a self,
        store: &'a S,
        ctx: &'a CopyContext,
        source: &'a Node,
        parent: Option<&'a Id>,
    ) -> Pin<Box<dyn Future<Output = Result<Id, CopyError>> + Send + 'a>> {
        Box::pin(async move {
            if !source.kind.is_instantiable() {
                return Err(CopyError::CannotInstantiate(source.kind));
            }

            let mut shell = Node::empty(source.kind);
            shell.name = source.name.clone();
            shell.description = source.description.clone();
            shell.labels = source.labels.clone();
            shell.scalars = source.scalars.clone();
            shell.parent = parent.cloned();

            let mut clone = store.insert_node(shell).await?;
            self.cache.put(&ctx.session, &source.id, &clone.id);

            for spec in source.kind.copyable_properties() {
                match spec.kind {
                    // Value properties travel in the scalar map, already
                    // copied wholesale above.
                    EdgeKind::Value => {}
                    EdgeKind::Map => {
                        if let Some(map) = source.edge_map(spec.name) {
                            clone
                                .edges
                                .insert(spec.name.to_string(), EdgeValue::Map(map.clone()));
                        }
                    }
                    EdgeKind::OwnedChild => {
                        if let Some(child_id) = source.edge_ref(spec.name) {
                            let child_clone = self
                                .clone_owned(store, ctx, source, &clone, spec.name, child_id)
                                .await?;
                            clone.set_edge_ref(spec.name, Some(child_clone));
                        }
                    }
                    EdgeKind::OwnedCollection => {
                        for child_id in source.edge_many(spec.name).to_vec() {
                            let child_clone = self
                                .clone_owned(store, ctx, source, &clone, spec.name, &child_id)
                                .await?;
                            clone.push_edge_many(spec.name, child_clone);
                        }
                    }
                    EdgeKind::Alias => {
                        if let Some(target) = source.edge_ref(spec.name) {
                            clone.set_edge_ref(spec.name, Some(target.clone()));
                        }
                    }
                    EdgeKind::ScopeSensitive(aware) => {
                        if let Some(target) = source.edge_ref(spec.name) {
                            let resolved = match aware {
                                ScopeAware::Plain => {
                                    if ctx.same_parent {
                                        target.clone()
                                    } else {
                                        self.clone_once(store, ctx, target).await?
                                    }
                                }
                                // Operation- and template-aware references
                                // need knowledge that is only complete after
                                // the whole subtree exists; the post-copy
                                // rewiring pass resolves them.
                                ScopeAware::Operation | ScopeAware::Template => target.clone(),
                            };
                            clone.set_edge_ref(spec.name, Some(resolved));
                        }
                    }
                }
            }

            let clone = store.update_node(clone).await?;
            Ok(clone.id)
        })
    }

    async fn clone_owned<S: NodeStore>(
        &self,
        store: &S,
        ctx: &CopyContext,
        source: &Node,
        clone: &Node,
        property: &str,
        child_id: &Id,
    ) -> Result<Id, CopyError> {
        if let Some(existing) = self.cache.get(&ctx.session, child_id) {
            return Ok(existing);
        }
        let child = store
            .get_node(child_id)
            .await?
            .ok_or_else(|| CopyError::PropertyCopyFailed {
                property: property.to_string(),
                source: source.id.clone(),
                destination: clone.id.clone(),
                reason: format!("owned child '{}' not found", child_id),
            })?;
        self.clone_node(store, ctx, &child, Some(&clone.id)).await
    }

    /// Cache-guarded clone of a shared target: the first request within a
    /// session clones, all later requests alias to that clone. The clone is
    /// left detached; the rewiring pass re-parents it under a
    /// scope-appropriate ancestor.
    pub(crate) async fn clone_once<S: NodeStore>(
        &self,
        store: &S,
        ctx: &CopyContext,
        target_id: &Id,
    ) -> Result<Id, CopyError> {
        if let Some(existing) = self.cache.get(&ctx.session, target_id) {
            return Ok(existing);
        }
        let target = require(store, target_id).await?;
        self.clone_node(store, ctx, &target, None).await
    }

    /// Post-copy hook: reset every cloned event trigger of the session to
    /// the inactive state so copies never fire against live environments
    /// until explicitly re-enabled.
    async fn deactivate_cloned_triggers<S: NodeStore>(
        &self,
        store: &S,
        session: &str,
    ) -> Result<(), CopyError> {
        for (_, clone_id) in self.cache.session_entries(session) {
            if let Some(mut node) = store.get_node(&clone_id).await? {
                if node.kind == NodeKind::EventTrigger {
                    node.set_trigger_state(TriggerState::Inactive);
                    store.update_node(node).await?;
                }
            }
        }
        Ok(())
    }

    /// Re-parent `source_id` under `destination_id` in place, without
    /// cloning.
    pub async fn move_node<S: NodeStore>(
        &self,
        store: &S,
        source_id: &Id,
        destination_id: &Id,
    ) -> Result<(), MoveError> {
        let mut source = store
            .get_node(source_id)
            .await?
            .ok_or_else(|| MoveError::NodeMissing(source_id.clone()))?;
        let mut destination = store
            .get_node(destination_id)
            .await?
            .ok_or_else(|| MoveError::NodeMissing(destination_id.clone()))?;

        let slot = destination.kind.accepts(source.kind).ok_or_else(|| {
            MoveError::DestinationRejects {
                destination: destination.id.clone(),
                kind: source.kind,
            }
        })?;

        // Detach from the previous owner's slot, wherever it sat.
        if let Some(old_parent_id) = source.parent.clone() {
            if let Some(mut old_parent) = store.get_node(&old_parent_id).await? {
                let mut changed = false;
                for spec in old_parent.kind.copyable_properties() {
                    match spec.kind {
                        EdgeKind::OwnedCollection => {
                            changed |= old_parent.remove_from_edge_many(spec.name, source_id);
                        }
                        EdgeKind::OwnedChild
                            if old_parent.edge_ref(spec.name) == Some(source_id) =>
                        {
                            old_parent.set_edge_ref(spec.name, None);
                            changed = true;
                        }
                        _ => {}
                    }
                }
                if changed {
                    store.update_node(old_parent).await?;
                }
            }
        }

        match destination.kind.property_kind(slot) {
            Some(EdgeKind::OwnedChild) => destination.set_edge_ref(slot, Some(source_id.clone())),
            _ => destination.push_edge_many(slot, source_id.clone()),
        }
        store.update_node(destination).await?;

        source.parent = Some(destination_id.clone());
        store.update_node(source).await?;
        log::info!("moved '{}' under '{}'", source_id, destination_id);
        Ok(())
    }
}

/// Fetch a node or fail with the engine's missing-node error.
pub(crate) async fn require<S: NodeStore>(store: &S, id: &Id) -> Result<Node, CopyError> {
    store
        .get_node(id)
        .await?
        .ok_or_else(|| CopyError::NodeMissing(id.clone()))
}

/// Insert `child_id` into `owner_id`'s `slot` collection (idempotent) and
/// point the child's structural parent at the owner.
pub(crate) async fn attach_child<S: NodeStore>(
    store: &S,
    owner_id: &Id,
    slot: &str,
    child_id: &Id,
) -> Result<(), CopyError> {
    let mut owner = require(store, owner_id).await?;
    if !owner.edge_many(slot).contains(child_id) {
        owner.push_edge_many(slot, child_id.clone());
        store.update_node(owner).await?;
    }
    let mut child = require(store, child_id).await?;
    if child.parent.as_deref() != Some(owner_id.as_str()) {
        child.parent = Some(owner_id.clone());
        store.update_node(child).await?;
    }
    Ok(())
}
