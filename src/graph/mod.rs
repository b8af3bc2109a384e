//! Live node graph, rendering snapshots and per-chain render state.

/// Render targets and their identities.
pub mod chain;
/// Serializable topology.
pub mod def;
/// The live, editable graph.
pub mod model;
/// Node protocol and the per-chain state cache.
pub mod node;
pub(crate) mod scheduler;
/// Owned rendering copies of a model.
pub mod snapshot;

pub use chain::{Chain, ChainId};
pub use def::{EdgeDef, ModelDef, NodeDef};
pub use model::{Edge, Model};
pub use node::{RenderStates, VideoNode};
pub use snapshot::{RenderResult, Snapshot};
