use super::*;
use crate::foundation::config::{GpuConfig, MediaConfig};
use crate::foundation::core::{Size, TextureId};
use crate::gpu::GpuContext;
use crate::nodes::{FilterNode, FilterParams, PatternNode, PatternParams};

fn pattern() -> Box<dyn VideoNode> {
    Box::new(PatternNode::new(PatternParams::default()).unwrap())
}

fn mix() -> Box<dyn VideoNode> {
    Box::new(
        FilterNode::new(FilterParams {
            op: crate::nodes::FilterOp::Mix,
            ..FilterParams::default()
        })
        .unwrap(),
    )
}

fn registry() -> NodeRegistry {
    NodeRegistry::with_builtins(&MediaConfig::default())
}

#[test]
fn ids_are_sequential_and_never_zero() {
    let m = Model::new();
    let a = m.add_node(pattern()).unwrap();
    let b = m.add_node(pattern()).unwrap();
    assert_eq!((a, b), (NodeId(1), NodeId(2)));
    m.remove_node(b).unwrap();
    assert_eq!(m.add_node(pattern()).unwrap(), NodeId(3));
    assert_eq!(m.node_ids(), vec![a, NodeId(3)]);
}

#[test]
fn connect_validates_nodes_and_slots() {
    let m = Model::new();
    let a = m.add_node(pattern()).unwrap();
    let f = m.add_node(mix()).unwrap();

    assert!(matches!(m.connect(a, f, 2), Err(VidgraphError::Graph(_))));
    assert!(matches!(m.connect(NodeId(99), f, 0), Err(VidgraphError::Graph(_))));
    assert!(matches!(m.connect(f, a, 0), Err(VidgraphError::Graph(_))));

    m.connect(a, f, 0).unwrap();
    assert_eq!(m.edges(), vec![Edge { from: a, to: f, slot: 0 }]);
}

#[test]
fn reconnecting_a_slot_replaces_its_driver() {
    let m = Model::new();
    let a = m.add_node(pattern()).unwrap();
    let b = m.add_node(pattern()).unwrap();
    let f = m.add_node(mix()).unwrap();
    m.connect(a, f, 1).unwrap();
    m.connect(b, f, 1).unwrap();
    assert_eq!(m.edges(), vec![Edge { from: b, to: f, slot: 1 }]);

    assert!(m.disconnect(f, 1));
    assert!(!m.disconnect(f, 1));
    assert!(m.edges().is_empty());
}

#[test]
fn remove_node_drops_edges_and_routes() {
    let m = Model::new();
    let a = m.add_node(pattern()).unwrap();
    let f = m.add_node(mix()).unwrap();
    m.connect(a, f, 0).unwrap();
    m.set_output_route("main", a).unwrap();
    m.set_output_route("aux", f).unwrap();

    let removed = m.remove_node(a).unwrap();
    assert_eq!(removed.kind(), "pattern");
    assert!(m.edges().is_empty());
    assert_eq!(m.output_route("main"), None);
    assert_eq!(m.output_route("aux"), Some(f));
    assert!(matches!(m.remove_node(a), Err(VidgraphError::Graph(_))));
}

#[test]
fn output_routes_require_existing_nodes() {
    let m = Model::new();
    assert!(m.set_output_route("main", NodeId(1)).is_err());
    let a = m.add_node(pattern()).unwrap();
    m.set_output_route("main", a).unwrap();
    assert_eq!(m.clear_output_route("main"), Some(a));
    assert!(m.outputs().is_empty());
}

#[test]
fn set_chains_prunes_state_of_removed_chains() {
    let gpu = GpuContext::shared(&GpuConfig::default());
    let big = Chain::new(Size::new(64, 32), Arc::clone(&gpu));
    let small = Chain::new(Size::new(8, 8), Arc::clone(&gpu));
    let m = Model::new();
    let a = m.add_node(pattern()).unwrap();

    assert!(m.set_chains(vec![Arc::clone(&big), Arc::clone(&small)]));
    assert!(!m.set_chains(vec![Arc::clone(&small), Arc::clone(&big)]));

    let t_big = m.create_copy_for_rendering(&big).render().texture(a);
    let t_small = m.create_copy_for_rendering(&small).render().texture(a);
    assert_ne!(t_big, t_small);
    assert_eq!(gpu.stats().live_textures, 2);

    assert!(m.set_chains(vec![Arc::clone(&small)]));
    assert_eq!(gpu.stats().live_textures, 1);
    assert!(!gpu.contains(t_big));
    assert!(gpu.contains(t_small));
    assert_eq!(m.chains().len(), 1);
}

#[test]
fn set_chains_prunes_state_of_untracked_chains() {
    let gpu = GpuContext::shared(&GpuConfig::default());
    let tracked = Chain::new(Size::new(4, 4), Arc::clone(&gpu));
    let stray = Chain::new(Size::new(8, 8), Arc::clone(&gpu));
    let m = Model::new();
    let a = m.add_node(pattern()).unwrap();
    m.set_chains(vec![Arc::clone(&tracked)]);

    // Rendered into, never tracked.
    let t = m.create_copy_for_rendering(&stray).render().texture(a);
    assert!(gpu.contains(t));

    assert!(!m.set_chains(vec![Arc::clone(&tracked)]));
    assert!(!gpu.contains(t));
    assert_eq!(gpu.stats().live_textures, 0);
}

#[test]
fn render_in_flight_on_a_pruned_chain_is_cleaned_up_later() {
    let gpu = GpuContext::shared(&GpuConfig::default());
    let chain = Chain::new(Size::new(4, 4), Arc::clone(&gpu));
    let m = Model::new();
    let a = m.add_node(pattern()).unwrap();
    m.set_chains(vec![Arc::clone(&chain)]);

    let mut snapshot = m.create_copy_for_rendering(&chain);
    assert!(m.set_chains(Vec::new()));
    let t = snapshot.render().texture(a);
    assert!(gpu.contains(t));

    assert!(!m.set_chains(Vec::new()));
    assert_eq!(gpu.stats().live_textures, 0);
}

#[test]
fn set_param_reaches_the_live_node() {
    let m = Model::new();
    let a = m.add_node(pattern()).unwrap();
    m.set_param(a, "cell", &serde_json::json!(4)).unwrap();
    assert_eq!(m.to_def().nodes[0].params["cell"], 4);
    assert!(m.set_param(a, "nope", &serde_json::json!(1)).is_err());
    assert!(m.set_param(NodeId(9), "cell", &serde_json::json!(1)).is_err());
}

#[test]
fn topology_survives_a_def_round_trip() {
    let m = Model::new();
    let a = m.add_node(pattern()).unwrap();
    let b = m.add_node(pattern()).unwrap();
    let f = m.add_node(mix()).unwrap();
    m.connect(a, f, 0).unwrap();
    m.connect(b, f, 1).unwrap();
    m.set_output_route("main", f).unwrap();
    m.remove_node(a).unwrap();

    let def = m.to_def();
    let json = def.to_json_pretty().unwrap();
    let back = Model::from_def(&ModelDef::from_json_str(&json).unwrap(), &registry()).unwrap();

    assert_eq!(back.to_def(), def);
    assert_eq!(back.node_ids(), vec![b, f]);
    assert_eq!(back.add_node(pattern()).unwrap(), NodeId(4));
}

#[test]
fn from_def_rejects_bad_topology() {
    let reg = registry();
    let dup: ModelDef = serde_json::from_value(serde_json::json!({
        "nodes": [
            { "id": 1, "kind": "pattern" },
            { "id": 1, "kind": "pattern" }
        ]
    }))
    .unwrap();
    assert!(matches!(Model::from_def(&dup, &reg), Err(VidgraphError::Validation(_))));

    let unknown: ModelDef = serde_json::from_value(serde_json::json!({
        "nodes": [{ "id": 1, "kind": "teleport" }]
    }))
    .unwrap();
    assert!(matches!(Model::from_def(&unknown, &reg), Err(VidgraphError::Graph(_))));

    let dangling: ModelDef = serde_json::from_value(serde_json::json!({
        "nodes": [{ "id": 1, "kind": "pattern" }],
        "outputs": { "main": 2 }
    }))
    .unwrap();
    assert!(Model::from_def(&dangling, &reg).is_err());
}

#[test]
fn ids_at_the_top_of_the_range_are_rejected() {
    let reg = registry();
    let last: ModelDef = serde_json::from_value(serde_json::json!({
        "nodes": [{ "id": u32::MAX, "kind": "pattern" }]
    }))
    .unwrap();
    assert!(matches!(Model::from_def(&last, &reg), Err(VidgraphError::Validation(_))));

    let near: ModelDef = serde_json::from_value(serde_json::json!({
        "nodes": [{ "id": u32::MAX - 1, "kind": "pattern" }]
    }))
    .unwrap();
    let m = Model::from_def(&near, &reg).unwrap();
    assert!(matches!(m.add_node(pattern()), Err(VidgraphError::Validation(_))));
    assert_eq!(m.len(), 1);
}

#[test]
fn render_order_reports_cycles() {
    let m = Model::new();
    let a = m.add_node(mix()).unwrap();
    let b = m.add_node(mix()).unwrap();
    let c = m.add_node(pattern()).unwrap();
    m.connect(a, b, 0).unwrap();
    m.connect(b, a, 0).unwrap();
    let (order, blocked) = m.render_order();
    assert_eq!(order, vec![c]);
    assert_eq!(blocked, vec![a, b]);
}

#[test]
fn new_nodes_render_into_existing_chains() {
    let gpu = GpuContext::shared(&GpuConfig::default());
    let chain = Chain::new(Size::new(4, 4), Arc::clone(&gpu));
    let m = Model::new();
    m.set_chains(vec![Arc::clone(&chain)]);
    let a = m.add_node(pattern()).unwrap();
    let t = m.create_copy_for_rendering(&chain).render().texture(a);
    assert_ne!(t, TextureId::NONE);
    assert_eq!(gpu.read_pixels(t).unwrap().pixel(0, 0), Some([255, 255, 255, 255]));
}
