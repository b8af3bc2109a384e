use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::foundation::core::Size;
use crate::gpu::GpuContext;

static NEXT_CHAIN_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique chain identity. Per-node render state is keyed by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chain{}", self.0)
    }
}

/// One rendering target context: a resolution on a texture device.
///
/// Chains are immutable. Resizing an output means building a new chain, which gives
/// every node a fresh state entry instead of resizing one another output still uses.
pub struct Chain {
    id: ChainId,
    size: Size,
    gpu: Arc<GpuContext>,
}

impl Chain {
    pub fn new(size: Size, gpu: Arc<GpuContext>) -> Arc<Self> {
        let id = ChainId(NEXT_CHAIN_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(chain = %id, %size, "new chain");
        Arc::new(Self { id, size, gpu })
    }

    pub fn id(&self) -> ChainId {
        self.id
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn gpu(&self) -> &Arc<GpuContext> {
        &self.gpu
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("gpu", &self.gpu.id())
            .finish()
    }
}
