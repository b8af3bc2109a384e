use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::foundation::config::GpuConfig;
use crate::foundation::core::{Size, TextureId};
use crate::foundation::error::{VidgraphError, VidgraphResult};
use crate::gpu::pool::{PoolStats, TexturePool, TexturePoolOpts};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one texture device. Chains compare it to tell devices apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GpuContextId(pub u64);

/// One RGBA8 premultiplied texture.
#[derive(Debug, Clone)]
pub struct Texture {
    pub size: Size,
    pub data: Vec<u8>,
}

impl Texture {
    /// Nearest-neighbour sample at destination coordinates of a `dst` sized target.
    ///
    /// Returns the texel directly when sizes match.
    pub fn sample(&self, dst: Size, x: u32, y: u32) -> [u8; 4] {
        sample_rgba(&self.data, self.size, dst, x, y)
    }
}

/// Nearest-neighbour sample of a packed RGBA8 buffer of `src` size, addressed in the
/// coordinates of a `dst` sized target. Out-of-range reads are transparent.
pub fn sample_rgba(data: &[u8], src: Size, dst: Size, x: u32, y: u32) -> [u8; 4] {
    let (sx, sy) = if src == dst {
        (x, y)
    } else {
        (
            ((u64::from(x) * u64::from(src.width)) / u64::from(dst.width.max(1))) as u32,
            ((u64::from(y) * u64::from(src.height)) / u64::from(dst.height.max(1))) as u32,
        )
    };
    let sx = sx.min(src.width.saturating_sub(1));
    let sy = sy.min(src.height.saturating_sub(1));
    let i = ((sy as usize) * (src.width as usize) + sx as usize) * 4;
    match data.get(i..i + 4) {
        Some(px) => [px[0], px[1], px[2], px[3]],
        None => [0, 0, 0, 0],
    }
}

/// A texture read back to host memory.
///
/// Pixels are **premultiplied** RGBA8, tightly packed, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

impl FrameRGBA {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + x as usize) * 4;
        let px = self.data.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Convert to a straight-alpha image for encoders that do not understand premul.
    pub fn to_rgba_image(&self) -> VidgraphResult<image::RgbaImage> {
        let mut data = self.data.clone();
        if self.premultiplied {
            for px in data.chunks_exact_mut(4) {
                let a = u32::from(px[3]);
                if a == 0 || a == 255 {
                    continue;
                }
                for c in &mut px[..3] {
                    *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
                }
            }
        }
        image::RgbaImage::from_raw(self.width, self.height, data).ok_or_else(|| {
            VidgraphError::validation(format!(
                "frame buffer does not match {}x{}",
                self.width, self.height
            ))
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GpuStats {
    pub live_textures: usize,
    pub live_bytes: usize,
    pub allocated_total: u64,
    pub released_total: u64,
    pub pool: PoolStats,
}

#[derive(Debug)]
struct TextureTable {
    next_id: u32,
    textures: HashMap<TextureId, Texture>,
    live_bytes: usize,
    allocated_total: u64,
    released_total: u64,
    pool: TexturePool,
}

impl TextureTable {
    /// Next free id after wraparound, never `NONE`.
    fn take_id(&mut self) -> VidgraphResult<TextureId> {
        if self.textures.len() >= u32::MAX as usize {
            return Err(VidgraphError::resource("texture ids exhausted"));
        }
        loop {
            let id = TextureId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1).max(1);
            if id.is_some() && !self.textures.contains_key(&id) {
                return Ok(id);
            }
        }
    }
}

/// Texture device shared by every chain created on it.
///
/// All texture work goes through one table lock. Only the render path takes it for more
/// than a lookup, so it serialises kernels the way a single GPU queue would.
#[derive(Debug)]
pub struct GpuContext {
    id: GpuContextId,
    max_texture_bytes: Option<usize>,
    table: Mutex<TextureTable>,
}

impl GpuContext {
    pub fn new(cfg: &GpuConfig) -> Self {
        Self {
            id: GpuContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
            max_texture_bytes: cfg.max_texture_bytes,
            table: Mutex::new(TextureTable {
                next_id: 1,
                textures: HashMap::new(),
                live_bytes: 0,
                allocated_total: 0,
                released_total: 0,
                pool: TexturePool::new(TexturePoolOpts {
                    max_pool_bytes: cfg.max_pool_bytes,
                    max_per_bucket: cfg.max_textures_per_bucket,
                }),
            }),
        }
    }

    pub fn shared(cfg: &GpuConfig) -> Arc<Self> {
        Arc::new(Self::new(cfg))
    }

    pub fn id(&self) -> GpuContextId {
        self.id
    }

    fn table(&self) -> MutexGuard<'_, TextureTable> {
        // A panicking kernel leaves the table structurally intact.
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Allocate a transparent texture.
    pub fn allocate(&self, size: Size) -> VidgraphResult<TextureId> {
        if size.is_empty() {
            return Err(VidgraphError::resource(format!(
                "cannot allocate empty texture {size}"
            )));
        }
        let mut t = self.table();
        let bytes = size.rgba_len();
        if let Some(max) = self.max_texture_bytes
            && t.live_bytes.saturating_add(bytes) > max
        {
            return Err(VidgraphError::resource(format!(
                "texture budget exhausted: {} live + {bytes} requested > {max}",
                t.live_bytes
            )));
        }

        let id = t.take_id()?;
        let data = t.pool.take(size);
        t.textures.insert(id, Texture { size, data });
        t.live_bytes = t.live_bytes.saturating_add(bytes);
        t.allocated_total = t.allocated_total.saturating_add(1);
        tracing::trace!(texture = id.0, %size, "allocate texture");
        Ok(id)
    }

    /// Release a texture. Unknown ids (including `NONE`) are ignored.
    pub fn release(&self, id: TextureId) {
        let mut t = self.table();
        if let Some(tex) = t.textures.remove(&id) {
            t.live_bytes = t.live_bytes.saturating_sub(tex.data.len());
            t.released_total = t.released_total.saturating_add(1);
            t.pool.give_back(tex.size, tex.data);
            tracing::trace!(texture = id.0, "release texture");
        }
    }

    pub fn contains(&self, id: TextureId) -> bool {
        self.table().textures.contains_key(&id)
    }

    pub fn texture_size(&self, id: TextureId) -> Option<Size> {
        self.table().textures.get(&id).map(|t| t.size)
    }

    pub fn with_texture<R>(&self, id: TextureId, f: impl FnOnce(&Texture) -> R) -> Option<R> {
        let t = self.table();
        t.textures.get(&id).map(f)
    }

    pub fn with_texture_mut<R>(
        &self,
        id: TextureId,
        f: impl FnOnce(&mut Texture) -> R,
    ) -> Option<R> {
        let mut t = self.table();
        t.textures.get_mut(&id).map(f)
    }

    /// Run `f` with `dst` writable and each input readable.
    ///
    /// Inputs that are `NONE`, unknown, or equal to `dst` are passed as `None`.
    pub fn render_to<R>(
        &self,
        dst: TextureId,
        inputs: &[TextureId],
        f: impl FnOnce(&mut Texture, &[Option<&Texture>]) -> R,
    ) -> VidgraphResult<R> {
        let mut t = self.table();
        let mut target = t.textures.remove(&dst).ok_or_else(|| {
            VidgraphError::resource(format!("render target texture {} not found", dst.0))
        })?;
        let srcs: Vec<Option<&Texture>> = inputs.iter().map(|id| t.textures.get(id)).collect();
        let out = f(&mut target, &srcs);
        drop(srcs);
        t.textures.insert(dst, target);
        Ok(out)
    }

    pub fn read_pixels(&self, id: TextureId) -> Option<FrameRGBA> {
        self.with_texture(id, |tex| FrameRGBA {
            width: tex.size.width,
            height: tex.size.height,
            data: tex.data.clone(),
            premultiplied: true,
        })
    }

    pub fn stats(&self) -> GpuStats {
        let t = self.table();
        GpuStats {
            live_textures: t.textures.len(),
            live_bytes: t.live_bytes,
            allocated_total: t.allocated_total,
            released_total: t.released_total,
            pool: t.pool.stats(),
        }
    }
}

/// Owns one texture and releases it on drop.
///
/// Per-chain render state holds these, so pruning a chain frees its textures as soon as
/// the state entry is removed.
#[derive(Debug)]
pub struct ChainTexture {
    gpu: Arc<GpuContext>,
    id: TextureId,
    size: Size,
}

impl ChainTexture {
    pub fn allocate(gpu: &Arc<GpuContext>, size: Size) -> VidgraphResult<Self> {
        let id = gpu.allocate(size)?;
        Ok(Self {
            gpu: Arc::clone(gpu),
            id,
            size,
        })
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn gpu(&self) -> &Arc<GpuContext> {
        &self.gpu
    }
}

impl Drop for ChainTexture {
    fn drop(&mut self) {
        self.gpu.release(self.id);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/gpu/context.rs"]
mod tests;
