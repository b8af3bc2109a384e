//! CPU-emulated texture device.
//!
//! Textures live in a [`GpuContext`] and are addressed by [`TextureId`](crate::TextureId).
//! Nodes never hold pixel buffers directly; they hold ids and ask the context to run a
//! kernel into a destination texture.

/// Texture table, allocation budget and readback.
pub mod context;
/// Row-parallel pixel kernels.
pub mod kernels;
pub(crate) mod pool;

pub use context::{ChainTexture, FrameRGBA, GpuContext, GpuContextId, GpuStats, Texture};
pub use pool::PoolStats;
