use std::collections::HashMap;

use crate::foundation::core::Size;

/// Pool configuration for recycled texture buffers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TexturePoolOpts {
    /// Maximum bytes retained across all buckets.
    pub(crate) max_pool_bytes: usize,
    /// Maximum number of retained buffers per size bucket.
    pub(crate) max_per_bucket: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub retained_buffers: usize,
    pub retained_bytes: usize,
    pub reused: u64,
    pub dropped_on_release: u64,
}

/// Bounded recycler for texture backing stores, keyed by size.
///
/// Chains of the same size come and go whenever an output is resized back and forth, so
/// buffers released by a pruned chain are usually wanted again soon.
#[derive(Debug)]
pub(crate) struct TexturePool {
    opts: TexturePoolOpts,
    stats: PoolStats,
    buckets: HashMap<Size, Vec<Vec<u8>>>,
}

impl TexturePool {
    pub(crate) fn new(opts: TexturePoolOpts) -> Self {
        Self {
            opts,
            stats: PoolStats::default(),
            buckets: HashMap::new(),
        }
    }

    pub(crate) fn stats(&self) -> PoolStats {
        self.stats.clone()
    }

    /// Take a zeroed buffer for `size`, reusing a retained one when available.
    pub(crate) fn take(&mut self, size: Size) -> Vec<u8> {
        if let Some(mut buf) = self.buckets.get_mut(&size).and_then(Vec::pop) {
            self.stats.retained_buffers = self.stats.retained_buffers.saturating_sub(1);
            self.stats.retained_bytes = self.stats.retained_bytes.saturating_sub(buf.len());
            self.stats.reused = self.stats.reused.saturating_add(1);
            buf.fill(0);
            return buf;
        }
        vec![0u8; size.rgba_len()]
    }

    pub(crate) fn give_back(&mut self, size: Size, buf: Vec<u8>) {
        let bytes = buf.len();
        if self.opts.max_pool_bytes == 0
            || self.opts.max_per_bucket == 0
            || self.stats.retained_bytes.saturating_add(bytes) > self.opts.max_pool_bytes
        {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        let bucket = self.buckets.entry(size).or_default();
        if bucket.len() >= self.opts.max_per_bucket {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        bucket.push(buf);
        self.stats.retained_buffers = self.stats.retained_buffers.saturating_add(1);
        self.stats.retained_bytes = self.stats.retained_bytes.saturating_add(bytes);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/gpu/pool.rs"]
mod tests;
