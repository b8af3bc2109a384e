//! vidgraph is a live video node graph with per-output render chains.
//!
//! A [`Model`] holds the editable graph. Every render takes an owned [`Snapshot`] bound
//! to one [`Chain`] (a resolution on a texture device), so the owner thread can keep
//! editing while another thread renders. Nodes cache per-chain resources in
//! [`RenderStates`], which the model prunes whenever the set of live chains changes.
//!
//! - Build a graph from [`NodeRegistry`] kinds or your own [`VideoNode`]s
//! - Attach [`Output`]s and an optional preview [`DisplaySurface`] to a [`Context`]
//! - Call [`Output::request_render`] from the render thread
//!
//! Time-based sources decode on a [`MediaWorker`] thread and hand frames over through a
//! lock-free [`FrameRing`].
#![forbid(unsafe_code)]

/// Edit session orchestration.
pub mod context;
pub mod foundation;
pub mod gpu;
pub mod graph;
/// Time-based media sources.
pub mod media;
/// Built-in node kinds.
pub mod nodes;

pub use crate::context::{
    Context, ContextNotification, ContextOptions, DisplaySurface, FrameConsumer,
    InMemoryConsumer, Output,
};
pub use crate::foundation::config::{EngineConfig, GpuConfig, MediaConfig};
pub use crate::foundation::core::{NodeId, Rgba8Premul, Size, TextureId};
pub use crate::foundation::error::{VidgraphError, VidgraphResult};
pub use crate::gpu::{ChainTexture, FrameRGBA, GpuContext};
pub use crate::graph::{
    Chain, ChainId, Edge, Model, ModelDef, RenderResult, RenderStates, Snapshot, VideoNode,
};
pub use crate::media::{FrameRing, FrameSource, MediaEvent, MediaWorker, PlaybackState};
pub use crate::nodes::NodeRegistry;
