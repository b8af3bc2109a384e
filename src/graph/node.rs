use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::foundation::core::TextureId;
use crate::foundation::error::{VidgraphError, VidgraphResult};
use crate::graph::chain::{Chain, ChainId};

/// A unit of graph computation producing one texture per chain.
///
/// A live node belongs to a [`Model`](crate::graph::Model). At snapshot time the model
/// asks each node for an independent rendering copy; only that copy is ever painted.
/// Copies share the node's [`RenderStates`], so per-chain resources survive from one
/// render to the next.
pub trait VideoNode: Send {
    /// Registry kind name, e.g. `"pattern"`.
    fn kind(&self) -> &'static str;

    /// Number of texture input slots.
    fn input_count(&self) -> usize;

    /// Produce the copy a render pass will paint.
    ///
    /// Called from whichever thread renders, under the model lock. Must not block on
    /// texture work or touch the live instance's state.
    fn copy_for_rendering(&self, chain: &Arc<Chain>) -> VidgraphResult<Box<dyn VideoNode>>;

    /// Render into `chain`. `inputs` has exactly [`input_count`](Self::input_count)
    /// entries; unconnected or failed inputs are `TextureId::NONE`.
    fn paint(&mut self, chain: &Arc<Chain>, inputs: &[TextureId]) -> VidgraphResult<TextureId>;

    /// Parameters for topology persistence, as accepted by the node's registry factory.
    fn serialize(&self) -> serde_json::Value;

    /// Update one parameter on the live instance.
    fn set_param(&mut self, key: &str, _value: &serde_json::Value) -> VidgraphResult<()> {
        Err(VidgraphError::validation(format!(
            "{} node has no parameter '{key}'",
            self.kind()
        )))
    }

    /// The model's chain set changed. Nodes drop state for `removed` chains here.
    fn chains_edited(&mut self, _added: &[Arc<Chain>], _removed: &[ChainId]) {}

    /// Drop cached state for every chain outside `live`, including chains that were
    /// painted into without ever being tracked. Returns how many entries were dropped.
    fn retain_chains(&mut self, _live: &HashSet<ChainId>) -> usize {
        0
    }

    /// Drain asynchronous notifications on the owner thread.
    fn poll(&mut self) {}
}

/// Per-chain cached state of one node, shared by the live node and its copies.
///
/// Entries are created lazily on first paint into a chain and dropped when the chain is
/// pruned; dropping an entry releases whatever textures it owns.
pub struct RenderStates<S> {
    inner: Arc<Mutex<HashMap<ChainId, S>>>,
}

impl<S> Clone for RenderStates<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> Default for RenderStates<S> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<S> std::fmt::Debug for RenderStates<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderStates")
            .field("chains", &self.len())
            .finish()
    }
}

impl<S> RenderStates<S> {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<ChainId, S>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` on the state for `chain`, creating it first if needed.
    ///
    /// A failed `create` leaves no entry behind, so the next paint retries.
    pub fn with_state<R>(
        &self,
        chain: &Chain,
        create: impl FnOnce() -> VidgraphResult<S>,
        f: impl FnOnce(&mut S) -> VidgraphResult<R>,
    ) -> VidgraphResult<R> {
        let mut map = self.map();
        let state = match map.entry(chain.id()) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                tracing::debug!(chain = %chain.id(), "create render state");
                e.insert(create()?)
            }
        };
        f(state)
    }

    /// Run `f` on the state for `chain` only if it already exists.
    pub fn with_existing<R>(&self, chain: ChainId, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        self.map().get_mut(&chain).map(f)
    }

    pub fn remove(&self, chain: ChainId) -> bool {
        self.map().remove(&chain).is_some()
    }

    /// Drop every entry whose chain is not in `live`. Returns how many were dropped.
    pub fn retain(&self, live: &HashSet<ChainId>) -> usize {
        let dropped: Vec<S> = {
            let mut map = self.map();
            let dead: Vec<ChainId> = map.keys().filter(|id| !live.contains(id)).copied().collect();
            dead.iter().filter_map(|id| map.remove(id)).collect()
        };
        dropped.len()
    }

    pub fn contains(&self, chain: ChainId) -> bool {
        self.map().contains_key(&chain)
    }

    pub fn chains(&self) -> Vec<ChainId> {
        let mut ids: Vec<ChainId> = self.map().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/node.rs"]
mod tests;
