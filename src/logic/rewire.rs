use crate::logic::copy_ops::{attach_child, require, CopyContext, CopyOperations};
use crate::logic::use_case::{ancestor_system, UseCase};
use crate::logic::CopyError;
use crate::model::{Id, Node, NodeKind};
use crate::store::NodeStore;
use itertools::Itertools;

/// Post-copy rewiring: the use-case-keyed pass that fixes cross-links the
/// recursive clone walk cannot resolve node-locally. Runs exactly once per
/// top-level copy, after the whole clone subtree exists and the session
/// cache knows every (original, clone) pair.
impl CopyOperations {
    pub(crate) async fn rewire<S: NodeStore>(
        &self,
        store: &S,
        ctx: &CopyContext,
        clone_id: &Id,
    ) -> Result<(), CopyError> {
        // The orchestrator only invokes rewiring for recognized use cases;
        // reaching this point without one is a defect in the clone walk.
        let Some(use_case) = ctx.use_case else {
            return Err(CopyError::UnknownUseCase(clone_id.clone()));
        };
        match use_case {
            UseCase::SystemCopy => self.rewire_system_copy(store, ctx, clone_id).await,
            UseCase::OperationCopySameSystem | UseCase::OperationCopyOtherSystem => {
                self.rewire_operation_copy(store, ctx, clone_id, use_case).await
            }
            UseCase::SituationCopySameOperation => Ok(()), // everything stayed aliased
            UseCase::SituationCopyOtherOperationSameSystem | UseCase::SituationCopyOtherSystem => {
                self.rewire_situation_copy(store, ctx, clone_id, use_case)
                    .await
            }
        }
    }

    /// System copy: every cross-link inside the copied System must point at
    /// sibling clones, never back into the original System.
    async fn rewire_system_copy<S: NodeStore>(
        &self,
        store: &S,
        ctx: &CopyContext,
        system_clone_id: &Id,
    ) -> Result<(), CopyError> {
        let system_clone = require(store, system_clone_id).await?;

        // Any transport cloned through a scope-sensitive reference before its
        // owned twin was reached is detached; bring it under the new System.
        for (_, cloned_id) in self
            .cache()
            .session_entries(&ctx.session)
            .into_iter()
            .sorted()
        {
            if let Some(node) = store.get_node(&cloned_id).await? {
                if node.kind == NodeKind::Transport && node.parent.is_none() {
                    attach_child(store, system_clone_id, "transports", &cloned_id).await?;
                }
            }
        }

        for operation_id in system_clone.edge_many("operations").to_vec() {
            let operation = require(store, &operation_id).await?;
            for situation_id in operation.edge_many("situations").to_vec() {
                let situation = require(store, &situation_id).await?;
                for step_id in situation.edge_many("steps").to_vec() {
                    let mut step = require(store, &step_id).await?;
                    let mut changed = false;
                    for property in ["sender", "receiver", "operation", "template"] {
                        changed |= self.remap_via_cache(ctx, &mut step, property);
                    }
                    if changed {
                        store.update_node(step).await?;
                    }
                }
            }
            self.retarget_triggers_for_operation(store, ctx, &operation)
                .await?;
        }
        Ok(())
    }

    /// Operation copies: resolve step operation references per the owning
    /// transport's exchange pattern, remap op-owned template references, and
    /// for cross-system copies bring the scope-cloned Transport under the
    /// destination System.
    async fn rewire_operation_copy<S: NodeStore>(
        &self,
        store: &S,
        ctx: &CopyContext,
        operation_clone_id: &Id,
        use_case: UseCase,
    ) -> Result<(), CopyError> {
        let operation = require(store, operation_clone_id).await?;

        if use_case == UseCase::OperationCopyOtherSystem {
            if let Some(transport_id) = operation.edge_ref("transport").cloned() {
                attach_child(store, &ctx.destination_id, "transports", &transport_id).await?;
            }
        }

        let transport = self.owning_transport(store, &operation).await;
        let Some(transport) = transport else {
            log::warn!(
                "operation '{}' has no transport; skipping its rewiring step",
                operation.id
            );
            return Ok(());
        };

        for situation_id in operation.edge_many("situations").to_vec() {
            let situation = require(store, &situation_id).await?;
            for step_id in situation.edge_many("steps").to_vec() {
                let mut step = require(store, &step_id).await?;
                let mut changed = self.remap_via_cache(ctx, &mut step, "template");
                changed |= self
                    .resolve_step_operation(store, ctx, &mut step, &transport)
                    .await?;
                if changed {
                    store.update_node(step).await?;
                }
            }
        }

        self.retarget_triggers_for_operation(store, ctx, &operation)
            .await?;
        Ok(())
    }

    /// Situation copies that leave their operation: resolve the step's
    /// template against the correct ancestor scope; a cross-system copy
    /// additionally handles the correlated operation and trigger
    /// retargeting.
    async fn rewire_situation_copy<S: NodeStore>(
        &self,
        store: &S,
        ctx: &CopyContext,
        situation_clone_id: &Id,
        use_case: UseCase,
    ) -> Result<(), CopyError> {
        let situation = require(store, situation_clone_id).await?;
        let destination_op = require(store, &ctx.destination_id).await?;
        let destination_system = ancestor_system(store, &destination_op).await?;
        let transport = self.owning_transport(store, &destination_op).await;

        for step_id in situation.edge_many("steps").to_vec() {
            let mut step = require(store, &step_id).await?;
            let mut changed = self
                .resolve_template_scope(store, ctx, &mut step, use_case, destination_system.as_ref())
                .await?;

            if use_case == UseCase::SituationCopyOtherSystem {
                match &transport {
                    Some(transport) => {
                        changed |= self
                            .resolve_step_operation(store, ctx, &mut step, transport)
                            .await?;
                    }
                    None => log::warn!(
                        "operation '{}' has no transport; skipping its rewiring step",
                        destination_op.id
                    ),
                }
            }

            if changed {
                store.update_node(step).await?;
            }
        }

        if use_case.retargets_triggers() {
            if let Some(transport) = &transport {
                if transport.mep().map_or(false, |mep| mep.is_outbound()) {
                    self.retarget_triggers_for_situation(store, ctx, &situation)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Template-aware resolution for situation copies: templates owned by an
    /// Operation are cloned under the destination Operation; templates owned
    /// by a System stay aliased within the same System and are cloned under
    /// the destination's System otherwise.
    async fn resolve_template_scope<S: NodeStore>(
        &self,
        store: &S,
        ctx: &CopyContext,
        step: &mut Node,
        use_case: UseCase,
        destination_system: Option<&Id>,
    ) -> Result<bool, CopyError> {
        let Some(template_id) = step.edge_ref("template").cloned() else {
            return Ok(false);
        };
        if self.remap_via_cache(ctx, step, "template") {
            return Ok(true);
        }

        let template = require(store, &template_id).await?;
        let parent_kind = match &template.parent {
            Some(parent_id) => store.get_node(parent_id).await?.map(|node| node.kind),
            None => None,
        };

        let clone_under = match parent_kind {
            Some(NodeKind::Operation) => Some(("templates", ctx.destination_id.clone())),
            Some(NodeKind::System) => {
                if use_case == UseCase::SituationCopyOtherSystem {
                    destination_system
                        .map(|system_id| ("templates", system_id.clone()))
                } else {
                    None // same System: keep the alias
                }
            }
            _ => None,
        };

        let Some((slot, owner_id)) = clone_under else {
            return Ok(false);
        };

        let template_clone = self.clone_once(store, ctx, &template_id).await?;
        attach_child(store, &owner_id, slot, &template_clone).await?;
        step.set_edge_ref("template", Some(template_clone));
        Ok(true)
    }

    /// Operation-aware resolution: an inbound transport with asynchronous
    /// response marks the step's operation reference as a correlated
    /// response operation, which is cloned (once per session) and attached
    /// as a sibling under the destination's System; any other pattern keeps
    /// the alias to the original.
    async fn resolve_step_operation<S: NodeStore>(
        &self,
        store: &S,
        ctx: &CopyContext,
        step: &mut Node,
        transport: &Node,
    ) -> Result<bool, CopyError> {
        let Some(operation_id) = step.edge_ref("operation").cloned() else {
            return Ok(false);
        };
        if self.remap_via_cache(ctx, step, "operation") {
            return Ok(true);
        }
        if !transport.mep().map_or(false, |mep| mep.is_inbound_async()) {
            return Ok(false);
        }

        let correlated_clone = self.clone_once(store, ctx, &operation_id).await?;

        let destination = require(store, &ctx.destination_id).await?;
        let owner_system = if destination.kind == NodeKind::System {
            Some(destination.id.clone())
        } else {
            ancestor_system(store, &destination).await?
        };
        if let Some(system_id) = owner_system {
            attach_child(store, &system_id, "operations", &correlated_clone).await?;
            // The correlated clone may carry its own scope-cloned transport.
            let correlated = require(store, &correlated_clone).await?;
            if let Some(transport_id) = correlated.edge_ref("transport").cloned() {
                let transport_node = require(store, &transport_id).await?;
                if transport_node.parent.is_none() {
                    attach_child(store, &system_id, "transports", &transport_id).await?;
                }
            }
        }

        step.set_edge_ref("operation", Some(correlated_clone));
        Ok(true)
    }

    /// Retarget cloned situations' event-trigger back-references when the
    /// operation's transport is outbound-directed.
    async fn retarget_triggers_for_operation<S: NodeStore>(
        &self,
        store: &S,
        ctx: &CopyContext,
        operation: &Node,
    ) -> Result<(), CopyError> {
        let Some(transport) = self.owning_transport(store, operation).await else {
            log::warn!(
                "operation '{}' has no transport; skipping trigger retargeting",
                operation.id
            );
            return Ok(());
        };
        if !transport.mep().map_or(false, |mep| mep.is_outbound()) {
            return Ok(());
        }

        for situation_id in operation.edge_many("situations").to_vec() {
            let situation = require(store, &situation_id).await?;
            self.retarget_triggers_for_situation(store, ctx, &situation)
                .await?;
        }
        Ok(())
    }

    async fn retarget_triggers_for_situation<S: NodeStore>(
        &self,
        store: &S,
        ctx: &CopyContext,
        situation: &Node,
    ) -> Result<(), CopyError> {
        for trigger_id in situation.edge_many("triggers").to_vec() {
            let mut trigger = require(store, &trigger_id).await?;
            if self.remap_via_cache(ctx, &mut trigger, "situation") {
                store.update_node(trigger).await?;
            }
        }
        Ok(())
    }

    /// Transport of an operation clone, resolved through the cache-aware
    /// reference the clone carries. `None` is a soft failure surfaced by the
    /// callers as a logged skip.
    async fn owning_transport<S: NodeStore>(&self, store: &S, operation: &Node) -> Option<Node> {
        let transport_id = operation.edge_ref("transport")?;
        match store.get_node(transport_id).await {
            Ok(node) => node,
            Err(err) => {
                log::warn!("transport lookup for '{}' failed: {err}", operation.id);
                None
            }
        }
    }

    /// Point `property` at the session clone of its current target, when one
    /// exists. Returns whether the edge changed.
    fn remap_via_cache(&self, ctx: &CopyContext, node: &mut Node, property: &str) -> bool {
        let Some(target) = node.edge_ref(property).cloned() else {
            return false;
        };
        match self.cache().get(&ctx.session, &target) {
            Some(clone) if clone != target => {
                node.set_edge_ref(property, Some(clone));
                true
            }
            _ => false,
        }
    }
}
