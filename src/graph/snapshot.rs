use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::foundation::core::{NodeId, TextureId};
use crate::graph::chain::Chain;
use crate::graph::node::VideoNode;
use crate::graph::scheduler::DagScheduler;

pub(crate) struct SnapshotNode {
    pub(crate) id: NodeId,
    /// `None` when the live node failed to produce a rendering copy.
    pub(crate) node: Option<Box<dyn VideoNode>>,
    /// One entry per input slot.
    pub(crate) inputs: SmallVec<[Option<NodeId>; 4]>,
}

/// An owned copy of a model taken for one render on one chain.
///
/// Holds rendering copies of every node plus the topology at the moment it was taken.
/// Later edits to the live model never reach it.
pub struct Snapshot {
    chain: Arc<Chain>,
    nodes: Vec<SnapshotNode>,
    outputs: HashMap<String, NodeId>,
}

/// Textures produced by one render pass, keyed by producing node.
#[derive(Debug, Clone, Default)]
pub struct RenderResult {
    textures: HashMap<NodeId, TextureId>,
    order: Vec<NodeId>,
}

impl RenderResult {
    /// Texture for `node`, or `TextureId::NONE` when it was not rendered or failed.
    pub fn texture(&self, node: NodeId) -> TextureId {
        self.textures.get(&node).copied().unwrap_or(TextureId::NONE)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.textures.contains_key(&node)
    }

    /// Nodes in the order they were painted. Blocked nodes are not listed.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, TextureId)> + '_ {
        self.textures.iter().map(|(n, t)| (*n, *t))
    }

    pub fn into_map(self) -> HashMap<NodeId, TextureId> {
        self.textures
    }
}

impl Snapshot {
    pub(crate) fn new(
        chain: Arc<Chain>,
        nodes: Vec<SnapshotNode>,
        outputs: HashMap<String, NodeId>,
    ) -> Self {
        Self {
            chain,
            nodes,
            outputs,
        }
    }

    pub fn chain(&self) -> &Arc<Chain> {
        &self.chain
    }

    /// Node routed to output `name`, if any.
    pub fn output_node(&self, name: &str) -> Option<NodeId> {
        self.outputs.get(name).copied()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    /// Render every node once, in dependency order.
    #[tracing::instrument(level = "debug", skip(self), fields(chain = %self.chain.id()))]
    pub fn render(&mut self) -> RenderResult {
        let all = vec![true; self.nodes.len()];
        self.render_selected(&all)
    }

    /// Render only `targets` and the nodes they transitively read from.
    #[tracing::instrument(level = "debug", skip(self), fields(chain = %self.chain.id()))]
    pub fn render_for(&mut self, targets: &[NodeId]) -> RenderResult {
        let selected = self.ancestors(targets);
        self.render_selected(&selected)
    }

    fn positions(&self) -> HashMap<NodeId, usize> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i))
            .collect()
    }

    fn ancestors(&self, targets: &[NodeId]) -> Vec<bool> {
        let pos = self.positions();
        let mut selected = vec![false; self.nodes.len()];
        let mut stack: Vec<usize> = targets.iter().filter_map(|t| pos.get(t).copied()).collect();
        while let Some(i) = stack.pop() {
            if selected[i] {
                continue;
            }
            selected[i] = true;
            for input in self.nodes[i].inputs.iter().flatten() {
                if let Some(&j) = pos.get(input) {
                    stack.push(j);
                }
            }
        }
        selected
    }

    fn render_selected(&mut self, selected: &[bool]) -> RenderResult {
        let pos = self.positions();

        // Compact the selection so scheduler positions keep model insertion order.
        let members: Vec<usize> = (0..self.nodes.len()).filter(|&i| selected[i]).collect();
        let local: HashMap<usize, u32> = members
            .iter()
            .enumerate()
            .map(|(l, &g)| (g, l as u32))
            .collect();
        let deps: Vec<Vec<u32>> = members
            .iter()
            .map(|&g| {
                self.nodes[g]
                    .inputs
                    .iter()
                    .flatten()
                    .filter_map(|input| pos.get(input))
                    .filter_map(|gi| local.get(gi).copied())
                    .collect()
            })
            .collect();

        let (order, blocked) = DagScheduler::new(&deps).run();

        let mut result = RenderResult {
            textures: HashMap::with_capacity(members.len()),
            order: Vec::with_capacity(order.len()),
        };

        for l in order {
            let g = members[l as usize];
            let inputs: SmallVec<[TextureId; 4]> = self.nodes[g]
                .inputs
                .iter()
                .map(|i| i.map(|n| result.texture(n)).unwrap_or(TextureId::NONE))
                .collect();
            let entry = &mut self.nodes[g];
            let texture = match entry.node.as_mut() {
                Some(node) => match node.paint(&self.chain, &inputs) {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::warn!(node = %entry.id, kind = node.kind(), error = %e, "paint failed");
                        TextureId::NONE
                    }
                },
                None => TextureId::NONE,
            };
            result.textures.insert(entry.id, texture);
            result.order.push(entry.id);
        }

        if !blocked.is_empty() {
            let ids: HashSet<NodeId> = blocked
                .iter()
                .map(|&l| self.nodes[members[l as usize]].id)
                .collect();
            tracing::warn!(nodes = ?ids, "cycle in graph, nodes render as nothing");
            for id in ids {
                result.textures.insert(id, TextureId::NONE);
            }
        }

        result
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/snapshot.rs"]
mod tests;
