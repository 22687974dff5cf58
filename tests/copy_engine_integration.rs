use itp_catalog_rust::logic::{CopyError, CopyOperations, CopyOptions};
use itp_catalog_rust::model::{EdgeValue, Id, Mep, Node, NodeKind, TriggerState};
use itp_catalog_rust::store::{CopySessionCache, MemoryStore, NodeStore};
use std::collections::HashMap;
use std::sync::Arc;

struct Harness {
    store: MemoryStore,
    ops: CopyOperations,
    cache: Arc<CopySessionCache>,
}

impl Harness {
    fn new() -> Self {
        let cache = Arc::new(CopySessionCache::new());
        Self {
            store: MemoryStore::new(),
            ops: CopyOperations::new(cache.clone()),
            cache,
        }
    }

    async fn insert(&self, node: Node) -> Node {
        self.store.insert_node(node).await.unwrap()
    }

    async fn insert_child(&self, mut node: Node, parent: &Node, slot: &str) -> Node {
        node.parent = Some(parent.id.clone());
        let node = self.store.insert_node(node).await.unwrap();
        let mut parent = self.store.get_node(&parent.id).await.unwrap().unwrap();
        parent.push_edge_many(slot, node.id.clone());
        self.store.update_node(parent).await.unwrap();
        node
    }

    async fn fetch(&self, id: &Id) -> Node {
        self.store.get_node(id).await.unwrap().unwrap()
    }
}

/// System with one inbound-async operation, a situation whose step points at
/// the operation's template and at the operation itself, and an active
/// trigger. The shape from which most scenarios start.
struct SystemFixture {
    system: Node,
    transport: Node,
    operation: Node,
    template: Node,
    situation: Node,
    step: Node,
    trigger: Node,
}

async fn seed_system(h: &Harness, name: &str, mep: Mep) -> SystemFixture {
    let folder = h.insert(Node::new(NodeKind::Folder, format!("{name}-root"))).await;
    let system = h
        .insert_child(Node::new(NodeKind::System, name), &folder, "systems")
        .await;

    let mut transport = Node::new(NodeKind::Transport, format!("{name}-jms"));
    transport.set_mep(mep);
    let transport = h.insert_child(transport, &system, "transports").await;

    let mut operation = Node::new(NodeKind::Operation, format!("{name}-op"));
    operation.set_edge_ref("transport", Some(transport.id.clone()));
    let operation = h.insert_child(operation, &system, "operations").await;

    let template = h
        .insert_child(Node::new(NodeKind::Template, format!("{name}-tpl")), &operation, "templates")
        .await;
    let situation = h
        .insert_child(
            Node::new(NodeKind::Situation, format!("{name}-sit")),
            &operation,
            "situations",
        )
        .await;

    let mut step = Node::new(NodeKind::IntegrationStep, format!("{name}-step"));
    step.set_edge_ref("situation", Some(situation.id.clone()));
    step.set_edge_ref("sender", Some(system.id.clone()));
    step.set_edge_ref("receiver", Some(system.id.clone()));
    step.set_edge_ref("operation", Some(operation.id.clone()));
    step.set_edge_ref("template", Some(template.id.clone()));
    let step = h.insert_child(step, &situation, "steps").await;

    let mut trigger = Node::new(NodeKind::EventTrigger, format!("{name}-trigger"));
    trigger.set_edge_ref("situation", Some(situation.id.clone()));
    trigger.set_trigger_state(TriggerState::Active);
    let trigger = h.insert_child(trigger, &situation, "triggers").await;

    SystemFixture {
        system,
        transport,
        operation,
        template,
        situation,
        step,
        trigger,
    }
}

#[tokio::test]
async fn system_copy_end_to_end() {
    let h = Harness::new();
    let fx = seed_system(&h, "billing", Mep::InboundRequestAsynchronousResponse).await;
    let target_folder = h.insert(Node::new(NodeKind::Folder, "sandbox")).await;

    let system_clone = h
        .ops
        .copy(
            &h.store,
            &fx.system.id,
            &target_folder.id,
            &CopyOptions::session("s-e2e"),
        )
        .await
        .unwrap();

    assert_ne!(system_clone.id, fx.system.id);
    assert_eq!(system_clone.parent.as_deref(), Some(target_folder.id.as_str()));
    let target_folder = h.fetch(&target_folder.id).await;
    assert!(target_folder.edge_many("systems").contains(&system_clone.id));

    // One cloned operation, child of the cloned system.
    let op_ids = system_clone.edge_many("operations");
    assert_eq!(op_ids.len(), 1);
    let op_clone = h.fetch(&op_ids[0]).await;
    assert_ne!(op_clone.id, fx.operation.id);
    assert_eq!(op_clone.parent.as_deref(), Some(system_clone.id.as_str()));

    // Its template is a fresh clone under the cloned operation, not an alias.
    let tpl_ids = op_clone.edge_many("templates");
    assert_eq!(tpl_ids.len(), 1);
    let tpl_clone = h.fetch(&tpl_ids[0]).await;
    assert_ne!(tpl_clone.id, fx.template.id);
    assert_eq!(tpl_clone.parent.as_deref(), Some(op_clone.id.as_str()));

    // The transport was cloned once and sits under the cloned system.
    let transport_ids = system_clone.edge_many("transports");
    assert_eq!(transport_ids.len(), 1);
    assert_ne!(transport_ids[0], fx.transport.id);
    assert_eq!(op_clone.edge_ref("transport"), Some(&transport_ids[0]));

    // The cloned step references sibling clones, never the originals.
    let sit_clone = h.fetch(&op_clone.edge_many("situations")[0]).await;
    let step_clone = h.fetch(&sit_clone.edge_many("steps")[0]).await;
    assert_eq!(step_clone.edge_ref("operation"), Some(&op_clone.id));
    assert_eq!(step_clone.edge_ref("template"), Some(&tpl_clone.id));
    assert_eq!(step_clone.edge_ref("sender"), Some(&system_clone.id));
    assert_eq!(step_clone.edge_ref("receiver"), Some(&system_clone.id));

    // The originals are untouched.
    let original_step = h.fetch(&fx.step.id).await;
    assert_eq!(original_step.edge_ref("operation"), Some(&fx.operation.id));
}

#[tokio::test]
async fn shared_transport_is_cloned_exactly_once() {
    let h = Harness::new();
    let fx = seed_system(&h, "crm", Mep::InboundRequestResponse).await;

    // Second operation sharing the same transport configuration.
    let mut second_op = Node::new(NodeKind::Operation, "crm-op-2");
    second_op.set_edge_ref("transport", Some(fx.transport.id.clone()));
    let system = h.fetch(&fx.system.id).await;
    h.insert_child(second_op, &system, "operations").await;

    let target_folder = h.insert(Node::new(NodeKind::Folder, "copies")).await;
    let system_clone = h
        .ops
        .copy(
            &h.store,
            &fx.system.id,
            &target_folder.id,
            &CopyOptions::session("s-shared"),
        )
        .await
        .unwrap();

    let transport_ids = system_clone.edge_many("transports");
    assert_eq!(transport_ids.len(), 1, "shared target cloned more than once");

    let op_transports: Vec<Id> = {
        let mut refs = Vec::new();
        for op_id in system_clone.edge_many("operations") {
            let op = h.fetch(op_id).await;
            refs.push(op.edge_ref("transport").unwrap().clone());
        }
        refs
    };
    assert_eq!(op_transports.len(), 2);
    assert_eq!(op_transports[0], op_transports[1]);
    assert_eq!(op_transports[0], transport_ids[0]);
    assert_ne!(op_transports[0], fx.transport.id);
}

#[tokio::test]
async fn owned_subtree_preserves_count_and_order() {
    let h = Harness::new();
    let folder = h.insert(Node::new(NodeKind::Folder, "root")).await;
    let system = h
        .insert_child(Node::new(NodeKind::System, "ordered"), &folder, "systems")
        .await;
    for name in ["alpha", "beta", "gamma"] {
        let system = h.fetch(&system.id).await;
        h.insert_child(Node::new(NodeKind::Operation, name), &system, "operations")
            .await;
    }

    let target = h.insert(Node::new(NodeKind::Folder, "target")).await;
    let clone = h
        .ops
        .copy(&h.store, &system.id, &target.id, &CopyOptions::session("s-order"))
        .await
        .unwrap();

    let mut names = Vec::new();
    for op_id in clone.edge_many("operations") {
        names.push(h.fetch(op_id).await.name);
    }
    assert_eq!(names, ["alpha", "beta", "gamma"]);
}

#[tokio::test]
async fn situation_copy_within_same_operation_keeps_template_aliased() {
    let h = Harness::new();
    let fx = seed_system(&h, "local", Mep::InboundRequestResponse).await;

    let situation_clone = h
        .ops
        .copy(
            &h.store,
            &fx.situation.id,
            &fx.operation.id,
            &CopyOptions::session("s-local"),
        )
        .await
        .unwrap();

    assert_eq!(
        situation_clone.parent.as_deref(),
        Some(fx.operation.id.as_str())
    );
    let step_clone = h.fetch(&situation_clone.edge_many("steps")[0]).await;
    assert_eq!(step_clone.edge_ref("template"), Some(&fx.template.id));
    assert_eq!(step_clone.edge_ref("operation"), Some(&fx.operation.id));

    let operation = h.fetch(&fx.operation.id).await;
    assert_eq!(operation.edge_many("situations").len(), 2);
}

#[tokio::test]
async fn situation_copy_to_sibling_operation_splits_template_scopes() {
    let h = Harness::new();
    let fx = seed_system(&h, "sib", Mep::InboundRequestResponse).await;

    // Sibling operation in the same system, reached through an outbound
    // transport.
    let system = h.fetch(&fx.system.id).await;
    let mut out_transport = Node::new(NodeKind::Transport, "sib-out");
    out_transport.set_mep(Mep::OutboundRequestResponse);
    let out_transport = h.insert_child(out_transport, &system, "transports").await;
    let system = h.fetch(&fx.system.id).await;
    let mut sibling_op = Node::new(NodeKind::Operation, "sib-op-2");
    sibling_op.set_edge_ref("transport", Some(out_transport.id.clone()));
    let sibling_op = h.insert_child(sibling_op, &system, "operations").await;

    // System-owned template referenced by a second step.
    let system = h.fetch(&fx.system.id).await;
    let shared_template = h
        .insert_child(
            Node::new(NodeKind::Template, "sib-shared-tpl"),
            &system,
            "templates",
        )
        .await;
    let situation = h.fetch(&fx.situation.id).await;
    let mut shared_step = Node::new(NodeKind::IntegrationStep, "sib-step-2");
    shared_step.set_edge_ref("template", Some(shared_template.id.clone()));
    h.insert_child(shared_step, &situation, "steps").await;

    let situation_clone = h
        .ops
        .copy(
            &h.store,
            &fx.situation.id,
            &sibling_op.id,
            &CopyOptions::session("s-sib"),
        )
        .await
        .unwrap();

    let step_ids = situation_clone.edge_many("steps");
    assert_eq!(step_ids.len(), 2);
    let first_step = h.fetch(&step_ids[0]).await;
    let second_step = h.fetch(&step_ids[1]).await;

    // The operation-owned template is cloned under the destination operation.
    let template_ref = first_step.edge_ref("template").unwrap().clone();
    assert_ne!(template_ref, fx.template.id);
    let template_clone = h.fetch(&template_ref).await;
    assert_eq!(template_clone.parent.as_deref(), Some(sibling_op.id.as_str()));
    let destination_op = h.fetch(&sibling_op.id).await;
    assert!(destination_op.edge_many("templates").contains(&template_ref));

    // The system-owned template stays aliased within the same system, and so
    // does the operation reference.
    assert_eq!(second_step.edge_ref("template"), Some(&shared_template.id));
    assert_eq!(first_step.edge_ref("operation"), Some(&fx.operation.id));

    // Same-system situation copies never retarget triggers, even though the
    // destination transport is outbound.
    let trigger_clone = h.fetch(&situation_clone.edge_many("triggers")[0]).await;
    assert_eq!(trigger_clone.edge_ref("situation"), Some(&fx.situation.id));
}

#[tokio::test]
async fn situation_copy_across_systems_clones_template_under_new_operation() {
    let h = Harness::new();
    let fx = seed_system(&h, "far-src", Mep::InboundRequestResponse).await;
    let other = seed_system(&h, "far-dst", Mep::OutboundRequestResponse).await;

    let situation_clone = h
        .ops
        .copy(
            &h.store,
            &fx.situation.id,
            &other.operation.id,
            &CopyOptions::session("s-far"),
        )
        .await
        .unwrap();

    let step_clone = h.fetch(&situation_clone.edge_many("steps")[0]).await;
    let template_ref = step_clone.edge_ref("template").unwrap().clone();
    assert_ne!(template_ref, fx.template.id);

    let template_clone = h.fetch(&template_ref).await;
    assert_eq!(
        template_clone.parent.as_deref(),
        Some(other.operation.id.as_str())
    );
    let destination_op = h.fetch(&other.operation.id).await;
    assert!(destination_op.edge_many("templates").contains(&template_ref));

    // Outbound destination transport: the cloned trigger is retargeted from
    // the original situation to its clone.
    let trigger_clone = h.fetch(&situation_clone.edge_many("triggers")[0]).await;
    assert_eq!(trigger_clone.edge_ref("situation"), Some(&situation_clone.id));
}

#[tokio::test]
async fn operation_copy_to_other_system_rewires_correlated_response_operation() {
    let h = Harness::new();
    let fx = seed_system(&h, "corr", Mep::InboundRequestAsynchronousResponse).await;

    // Correlated response operation in the source system, sharing the
    // inbound-async transport; the fixture step points at the main
    // operation, so retarget it to the correlated one.
    let system = h.fetch(&fx.system.id).await;
    let mut response_op = Node::new(NodeKind::Operation, "corr-response");
    response_op.set_edge_ref("transport", Some(fx.transport.id.clone()));
    let response_op = h.insert_child(response_op, &system, "operations").await;
    let mut step = h.fetch(&fx.step.id).await;
    step.set_edge_ref("operation", Some(response_op.id.clone()));
    h.store.update_node(step).await.unwrap();

    let target_folder = h.insert(Node::new(NodeKind::Folder, "other")).await;
    let target_system = h
        .insert_child(Node::new(NodeKind::System, "corr-target"), &target_folder, "systems")
        .await;

    let op_clone = h
        .ops
        .copy(
            &h.store,
            &fx.operation.id,
            &target_system.id,
            &CopyOptions::session("s-corr"),
        )
        .await
        .unwrap();

    let target_system = h.fetch(&target_system.id).await;
    assert!(target_system.edge_many("operations").contains(&op_clone.id));

    // The correlated operation was cloned as a sibling under the new system.
    let sit_clone = h.fetch(&op_clone.edge_many("situations")[0]).await;
    let step_clone = h.fetch(&sit_clone.edge_many("steps")[0]).await;
    let correlated_ref = step_clone.edge_ref("operation").unwrap().clone();
    assert_ne!(correlated_ref, response_op.id);
    assert!(target_system.edge_many("operations").contains(&correlated_ref));

    // Both cloned operations share the single cloned transport.
    assert_eq!(target_system.edge_many("transports").len(), 1);
    let transport_clone_id = target_system.edge_many("transports")[0].clone();
    assert_ne!(transport_clone_id, fx.transport.id);
    let correlated_clone = h.fetch(&correlated_ref).await;
    assert_eq!(op_clone.edge_ref("transport"), Some(&transport_clone_id));
    assert_eq!(correlated_clone.edge_ref("transport"), Some(&transport_clone_id));
}

#[tokio::test]
async fn transport_property_map_is_copied_by_value() {
    let h = Harness::new();
    let fx = seed_system(&h, "mapped", Mep::InboundRequestResponse).await;

    let mut props = HashMap::new();
    props.insert("queue".to_string(), "orders.in".to_string());
    props.insert("timeout".to_string(), "30".to_string());
    let mut transport = h.fetch(&fx.transport.id).await;
    transport
        .edges
        .insert("properties".to_string(), EdgeValue::Map(props.clone()));
    h.store.update_node(transport).await.unwrap();

    let target = h.insert(Node::new(NodeKind::Folder, "target")).await;
    let system_clone = h
        .ops
        .copy(&h.store, &fx.system.id, &target.id, &CopyOptions::session("s-map"))
        .await
        .unwrap();

    let transport_clone = h.fetch(&system_clone.edge_many("transports")[0]).await;
    assert_eq!(transport_clone.edge_map("properties"), Some(&props));

    // A fresh container: emptying the original afterwards leaves the clone
    // untouched.
    let mut original = h.fetch(&fx.transport.id).await;
    original
        .edges
        .insert("properties".to_string(), EdgeValue::Map(HashMap::new()));
    h.store.update_node(original).await.unwrap();
    let transport_clone = h.fetch(&transport_clone.id).await;
    assert_eq!(transport_clone.edge_map("properties"), Some(&props));
}

#[tokio::test]
async fn owned_parsing_rule_is_deep_cloned_with_its_step() {
    let h = Harness::new();
    let fx = seed_system(&h, "rules", Mep::InboundRequestResponse).await;

    let mut rule = Node::new(NodeKind::ParsingRule, "extract-id");
    rule.set_scalar("expression", serde_json::json!("$.order.id"));
    rule.parent = Some(fx.step.id.clone());
    let rule = h.insert(rule).await;
    let mut step = h.fetch(&fx.step.id).await;
    step.set_edge_ref("rule", Some(rule.id.clone()));
    h.store.update_node(step).await.unwrap();

    let target = h.insert(Node::new(NodeKind::Folder, "target")).await;
    let system_clone = h
        .ops
        .copy(&h.store, &fx.system.id, &target.id, &CopyOptions::session("s-rules"))
        .await
        .unwrap();

    let op_clone = h.fetch(&system_clone.edge_many("operations")[0]).await;
    let sit_clone = h.fetch(&op_clone.edge_many("situations")[0]).await;
    let step_clone = h.fetch(&sit_clone.edge_many("steps")[0]).await;
    let rule_ref = step_clone.edge_ref("rule").unwrap().clone();
    assert_ne!(rule_ref, rule.id);

    let rule_clone = h.fetch(&rule_ref).await;
    assert_eq!(rule_clone.parent.as_deref(), Some(step_clone.id.as_str()));
    assert_eq!(rule_clone.scalar("expression"), rule.scalar("expression"));
}

#[tokio::test]
async fn copying_a_rule_into_a_step_fills_the_single_owned_slot() {
    let h = Harness::new();
    let fx = seed_system(&h, "slot", Mep::InboundRequestResponse).await;
    let rule = h.insert(Node::new(NodeKind::ParsingRule, "slot-rule")).await;

    let rule_clone = h
        .ops
        .copy(&h.store, &rule.id, &fx.step.id, &CopyOptions::session("s-slot"))
        .await
        .unwrap();

    assert_ne!(rule_clone.id, rule.id);
    assert_eq!(rule_clone.parent.as_deref(), Some(fx.step.id.as_str()));
    let step = h.fetch(&fx.step.id).await;
    assert_eq!(step.edge_ref("rule"), Some(&rule_clone.id));
}

#[tokio::test]
async fn copy_rejects_unacceptable_destination() {
    let h = Harness::new();
    let fx = seed_system(&h, "reject", Mep::InboundRequestResponse).await;

    let err = h
        .ops
        .copy(
            &h.store,
            &fx.transport.id,
            &fx.situation.id,
            &CopyOptions::session("s-reject"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CopyError::DestinationRejects { kind, .. } if kind == NodeKind::Transport));
}

#[tokio::test]
async fn servers_cannot_be_copied() {
    let h = Harness::new();
    let folder = h.insert(Node::new(NodeKind::Folder, "infra")).await;
    let server = h
        .insert_child(Node::new(NodeKind::Server, "env-1"), &folder, "servers")
        .await;
    let target = h.insert(Node::new(NodeKind::Folder, "target")).await;

    let err = h
        .ops
        .copy(&h.store, &server.id, &target.id, &CopyOptions::session("s-srv"))
        .await
        .unwrap_err();
    assert!(matches!(err, CopyError::CannotInstantiate(NodeKind::Server)));
}

#[tokio::test]
async fn dangling_owned_child_aborts_with_property_error() {
    let h = Harness::new();
    let folder = h.insert(Node::new(NodeKind::Folder, "root")).await;
    let mut system = Node::new(NodeKind::System, "broken");
    system.push_edge_many("operations", "no-such-node".to_string());
    let system = h.insert_child(system, &folder, "systems").await;
    let target = h.insert(Node::new(NodeKind::Folder, "target")).await;

    let err = h
        .ops
        .copy(&h.store, &system.id, &target.id, &CopyOptions::session("s-broken"))
        .await
        .unwrap_err();

    match err {
        CopyError::PropertyCopyFailed { property, source, .. } => {
            assert_eq!(property, "operations");
            assert_eq!(source, system.id);
        }
        other => panic!("expected PropertyCopyFailed, got {other:?}"),
    }

    // The session cache never leaks across the failed call.
    assert!(h.cache.session_entries("s-broken").is_empty());
}

#[tokio::test]
async fn session_cache_is_cleared_after_successful_copy() {
    let h = Harness::new();
    let fx = seed_system(&h, "clear", Mep::InboundRequestResponse).await;
    let target = h.insert(Node::new(NodeKind::Folder, "target")).await;

    h.ops
        .copy(&h.store, &fx.system.id, &target.id, &CopyOptions::session("s-clear"))
        .await
        .unwrap();

    assert!(h.cache.session_entries("s-clear").is_empty());
}

#[tokio::test]
async fn deactivation_flag_resets_cloned_triggers_only() {
    let h = Harness::new();
    let fx = seed_system(&h, "deact", Mep::InboundRequestResponse).await;
    let target = h.insert(Node::new(NodeKind::Folder, "target")).await;

    let system_clone = h
        .ops
        .copy(
            &h.store,
            &fx.system.id,
            &target.id,
            &CopyOptions::deactivating("s-deact"),
        )
        .await
        .unwrap();

    let op_clone = h.fetch(&system_clone.edge_many("operations")[0]).await;
    let sit_clone = h.fetch(&op_clone.edge_many("situations")[0]).await;
    let trigger_clone = h.fetch(&sit_clone.edge_many("triggers")[0]).await;
    assert_eq!(trigger_clone.trigger_state(), Some(TriggerState::Inactive));

    let original_trigger = h.fetch(&fx.trigger.id).await;
    assert_eq!(original_trigger.trigger_state(), Some(TriggerState::Active));
}

#[tokio::test]
async fn move_reparents_without_cloning() {
    let h = Harness::new();
    let fx = seed_system(&h, "mover", Mep::InboundRequestResponse).await;
    let other = seed_system(&h, "movee", Mep::InboundRequestResponse).await;

    h.ops
        .move_node(&h.store, &fx.operation.id, &other.system.id)
        .await
        .unwrap();

    let moved = h.fetch(&fx.operation.id).await;
    assert_eq!(moved.parent.as_deref(), Some(other.system.id.as_str()));

    let old_system = h.fetch(&fx.system.id).await;
    assert!(!old_system.edge_many("operations").contains(&fx.operation.id));
    let new_system = h.fetch(&other.system.id).await;
    assert!(new_system.edge_many("operations").contains(&fx.operation.id));
}

#[tokio::test]
async fn move_rejects_unacceptable_destination() {
    let h = Harness::new();
    let fx = seed_system(&h, "move-reject", Mep::InboundRequestResponse).await;

    let err = h
        .ops
        .move_node(&h.store, &fx.transport.id, &fx.situation.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        itp_catalog_rust::logic::MoveError::DestinationRejects { .. }
    ));
}
