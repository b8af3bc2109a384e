use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::foundation::core::NodeId;
use crate::foundation::error::{VidgraphError, VidgraphResult};
use crate::graph::chain::{Chain, ChainId};
use crate::graph::def::{EdgeDef, ModelDef, NodeDef};
use crate::graph::node::VideoNode;
use crate::graph::scheduler::DagScheduler;
use crate::graph::snapshot::{Snapshot, SnapshotNode};
use crate::nodes::NodeRegistry;

/// A connection from one node's output to an input slot of another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub slot: usize,
}

struct NodeEntry {
    id: NodeId,
    node: Box<dyn VideoNode>,
}

#[derive(Default)]
struct Graph {
    next_id: u32,
    nodes: Vec<NodeEntry>,
    edges: Vec<Edge>,
    outputs: BTreeMap<String, NodeId>,
    chains: Vec<Arc<Chain>>,
}

impl Graph {
    fn position(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|e| e.id == id)
    }

    fn entry(&self, id: NodeId) -> VidgraphResult<&NodeEntry> {
        self.nodes
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| VidgraphError::graph(format!("unknown node {id}")))
    }

    fn entry_mut(&mut self, id: NodeId) -> VidgraphResult<&mut NodeEntry> {
        self.nodes
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| VidgraphError::graph(format!("unknown node {id}")))
    }

    fn input_table(&self, entry: &NodeEntry) -> SmallVec<[Option<NodeId>; 4]> {
        let mut inputs: SmallVec<[Option<NodeId>; 4]> =
            SmallVec::from_elem(None, entry.node.input_count());
        for e in self.edges.iter().filter(|e| e.to == entry.id) {
            if let Some(slot) = inputs.get_mut(e.slot) {
                *slot = Some(e.from);
            }
        }
        inputs
    }
}

/// The live node graph.
///
/// Nodes keep insertion order, which is also the render tie-break order. Every method
/// takes the internal lock only long enough to edit or copy descriptors, so a render
/// thread can snapshot while the owner thread edits.
pub struct Model {
    graph: Mutex<Graph>,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let g = self.graph();
        f.debug_struct("Model")
            .field("nodes", &g.nodes.len())
            .field("edges", &g.edges.len())
            .field("outputs", &g.outputs)
            .field("chains", &g.chains.len())
            .finish()
    }
}

impl Model {
    pub fn new() -> Self {
        Self {
            graph: Mutex::new(Graph {
                next_id: 1,
                ..Graph::default()
            }),
        }
    }

    fn graph(&self) -> MutexGuard<'_, Graph> {
        self.graph.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a node and return its id. The node is told about the current chain set.
    ///
    /// Fails once the id space is exhausted.
    pub fn add_node(&self, node: Box<dyn VideoNode>) -> VidgraphResult<NodeId> {
        let mut g = self.graph();
        let id = NodeId(g.next_id);
        g.next_id = successor(id)?;
        Self::insert(&mut g, id, node);
        Ok(id)
    }

    fn insert(g: &mut Graph, id: NodeId, mut node: Box<dyn VideoNode>) {
        if !g.chains.is_empty() {
            node.chains_edited(&g.chains, &[]);
        }
        tracing::debug!(node = %id, kind = node.kind(), "add node");
        g.nodes.push(NodeEntry { id, node });
    }

    /// Remove a node together with its connections and output routes.
    pub fn remove_node(&self, id: NodeId) -> VidgraphResult<Box<dyn VideoNode>> {
        let mut g = self.graph();
        let pos = g
            .position(id)
            .ok_or_else(|| VidgraphError::graph(format!("unknown node {id}")))?;
        let entry = g.nodes.remove(pos);
        g.edges.retain(|e| e.from != id && e.to != id);
        g.outputs.retain(|_, n| *n != id);
        tracing::debug!(node = %id, kind = entry.node.kind(), "remove node");
        Ok(entry.node)
    }

    /// Drive input `slot` of `to` from `from`, replacing any previous driver of that slot.
    ///
    /// Cycles are accepted here; rendering reports them and paints their nodes as nothing.
    pub fn connect(&self, from: NodeId, to: NodeId, slot: usize) -> VidgraphResult<()> {
        let mut g = self.graph();
        g.entry(from)?;
        let inputs = g.entry(to)?.node.input_count();
        if slot >= inputs {
            return Err(VidgraphError::graph(format!(
                "node {to} has {inputs} input(s), slot {slot} is out of range"
            )));
        }
        g.edges.retain(|e| !(e.to == to && e.slot == slot));
        g.edges.push(Edge { from, to, slot });
        Ok(())
    }

    /// Disconnect input `slot` of `to`. Returns whether a connection existed.
    pub fn disconnect(&self, to: NodeId, slot: usize) -> bool {
        let mut g = self.graph();
        let before = g.edges.len();
        g.edges.retain(|e| !(e.to == to && e.slot == slot));
        g.edges.len() != before
    }

    /// Route output `name` to `node`.
    pub fn set_output_route(&self, name: impl Into<String>, node: NodeId) -> VidgraphResult<()> {
        let mut g = self.graph();
        g.entry(node)?;
        g.outputs.insert(name.into(), node);
        Ok(())
    }

    pub fn clear_output_route(&self, name: &str) -> Option<NodeId> {
        self.graph().outputs.remove(name)
    }

    pub fn output_route(&self, name: &str) -> Option<NodeId> {
        self.graph().outputs.get(name).copied()
    }

    pub fn outputs(&self) -> BTreeMap<String, NodeId> {
        self.graph().outputs.clone()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.graph().nodes.iter().map(|e| e.id).collect()
    }

    pub fn node_kind(&self, id: NodeId) -> Option<&'static str> {
        self.graph().entry(id).ok().map(|e| e.node.kind())
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.graph().edges.clone()
    }

    pub fn len(&self) -> usize {
        self.graph().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_param(
        &self,
        id: NodeId,
        key: &str,
        value: &serde_json::Value,
    ) -> VidgraphResult<()> {
        let mut g = self.graph();
        g.entry_mut(id)?.node.set_param(key, value)
    }

    /// Let every node drain asynchronous notifications.
    pub fn poll(&self) {
        let mut g = self.graph();
        for entry in &mut g.nodes {
            entry.node.poll();
        }
    }

    /// Replace the tracked chain set.
    ///
    /// Nodes are told which chains were added and removed, then every node drops state
    /// for chains outside the new set before this returns, including chains a render
    /// painted into without them ever being tracked. The prune runs even when the set is
    /// unchanged.
    /// Returns `false` when the set is unchanged.
    pub fn set_chains(&self, chains: Vec<Arc<Chain>>) -> bool {
        let mut g = self.graph();
        let old: HashSet<ChainId> = g.chains.iter().map(|c| c.id()).collect();
        let live: HashSet<ChainId> = chains.iter().map(|c| c.id()).collect();
        let changed = old != live;
        if changed {
            let added: Vec<Arc<Chain>> = chains
                .iter()
                .filter(|c| !old.contains(&c.id()))
                .cloned()
                .collect();
            let mut removed: Vec<ChainId> = old.difference(&live).copied().collect();
            removed.sort();
            tracing::debug!(added = added.len(), removed = removed.len(), "chains edited");
            for entry in &mut g.nodes {
                entry.node.chains_edited(&added, &removed);
            }
            g.chains = chains;
        }
        let dropped: usize = g
            .nodes
            .iter_mut()
            .map(|entry| entry.node.retain_chains(&live))
            .sum();
        if dropped > 0 {
            tracing::debug!(dropped, "pruned render states of dead chains");
        }
        changed
    }

    pub fn chains(&self) -> Vec<Arc<Chain>> {
        self.graph().chains.clone()
    }

    /// Take an owned snapshot for rendering into `chain`.
    ///
    /// A node whose copy fails is kept in the topology but renders as nothing.
    pub fn create_copy_for_rendering(&self, chain: &Arc<Chain>) -> Snapshot {
        let g = self.graph();
        let nodes = g
            .nodes
            .iter()
            .map(|entry| {
                let node = match entry.node.copy_for_rendering(chain) {
                    Ok(copy) => Some(copy),
                    Err(e) => {
                        tracing::warn!(node = %entry.id, kind = entry.node.kind(), error = %e, "copy for rendering failed");
                        None
                    }
                };
                SnapshotNode {
                    id: entry.id,
                    node,
                    inputs: g.input_table(entry),
                }
            })
            .collect();
        let outputs: HashMap<String, NodeId> =
            g.outputs.iter().map(|(k, v)| (k.clone(), *v)).collect();
        Snapshot::new(Arc::clone(chain), nodes, outputs)
    }

    /// Render order of the whole graph plus the nodes a cycle keeps from being scheduled.
    pub fn render_order(&self) -> (Vec<NodeId>, Vec<NodeId>) {
        let g = self.graph();
        let pos: HashMap<NodeId, u32> = g
            .nodes
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id, i as u32))
            .collect();
        let deps: Vec<Vec<u32>> = g
            .nodes
            .iter()
            .map(|entry| {
                g.input_table(entry)
                    .iter()
                    .flatten()
                    .filter_map(|n| pos.get(n).copied())
                    .collect()
            })
            .collect();
        let (order, blocked) = DagScheduler::new(&deps).run();
        let ids = |v: Vec<u32>| -> Vec<NodeId> {
            v.into_iter().map(|i| g.nodes[i as usize].id).collect()
        };
        (ids(order), ids(blocked))
    }

    pub fn to_def(&self) -> ModelDef {
        let g = self.graph();
        ModelDef {
            nodes: g
                .nodes
                .iter()
                .map(|e| NodeDef {
                    id: e.id,
                    kind: e.node.kind().to_owned(),
                    params: e.node.serialize(),
                })
                .collect(),
            edges: g
                .edges
                .iter()
                .map(|e| EdgeDef {
                    from: e.from,
                    to: e.to,
                    slot: e.slot,
                })
                .collect(),
            outputs: g.outputs.clone(),
        }
    }

    /// Rebuild a model from its persisted topology, keeping node ids.
    pub fn from_def(def: &ModelDef, registry: &NodeRegistry) -> VidgraphResult<Self> {
        let model = Self::new();
        {
            let mut g = model.graph();
            for nd in &def.nodes {
                if nd.id.0 == 0 {
                    return Err(VidgraphError::validation("node id 0 is reserved"));
                }
                if g.position(nd.id).is_some() {
                    return Err(VidgraphError::validation(format!(
                        "duplicate node id {}",
                        nd.id
                    )));
                }
                let node = registry.create(&nd.kind, &nd.params)?;
                Self::insert(&mut g, nd.id, node);
                g.next_id = g.next_id.max(successor(nd.id)?);
            }
        }
        for e in &def.edges {
            model.connect(e.from, e.to, e.slot)?;
        }
        for (name, node) in &def.outputs {
            model.set_output_route(name.clone(), *node)?;
        }
        Ok(model)
    }
}

fn successor(id: NodeId) -> VidgraphResult<u32> {
    id.0.checked_add(1).ok_or_else(|| {
        VidgraphError::validation(format!("node id {id} leaves no room for more nodes"))
    })
}

#[cfg(test)]
#[path = "../../tests/unit/graph/model.rs"]
mod tests;
