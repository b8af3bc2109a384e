use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::foundation::core::Size;
use crate::foundation::error::{VidgraphError, VidgraphResult};

/// Default preview chain resolution.
pub const DEFAULT_PREVIEW_SIZE: Size = Size::new(300, 300);

/// Default number of frame slots between a media worker and the render path.
pub const DEFAULT_RING_SLOTS: usize = 3;

/// Smallest ring that can ever publish while a frame is being read.
pub const MIN_RING_SLOTS: usize = 2;

/// Engine-wide knobs. Every field has a default so partial JSON files are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Whether the context owns a preview chain.
    pub preview: bool,
    /// Preview chain resolution.
    pub preview_size: Size,
    pub media: MediaConfig,
    pub gpu: GpuConfig,
    /// Use repository-relative resource directories instead of the platform data dir.
    pub debug_paths: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preview: true,
            preview_size: DEFAULT_PREVIEW_SIZE,
            media: MediaConfig::default(),
            gpu: GpuConfig::default(),
            debug_paths: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Frame slots per media worker ring.
    pub ring_slots: usize,
    /// Bounded capacity of each worker's status channel. Events beyond it are dropped.
    pub event_capacity: usize,
    /// Bounded capacity of each worker's command channel.
    pub command_capacity: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ring_slots: DEFAULT_RING_SLOTS,
            event_capacity: 64,
            command_capacity: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    /// Live texture byte budget; `None` is unbounded.
    pub max_texture_bytes: Option<usize>,
    /// Maximum bytes kept in the recycle pool across all buckets.
    pub max_pool_bytes: usize,
    /// Maximum number of recycled textures per size bucket.
    pub max_textures_per_bucket: usize,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            max_texture_bytes: None,
            max_pool_bytes: 128 * 1024 * 1024,
            max_textures_per_bucket: 4,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> VidgraphResult<Self> {
        let cfg: EngineConfig = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> VidgraphResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            VidgraphError::validation(format!("read config '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> VidgraphResult<()> {
        if self.preview && self.preview_size.is_empty() {
            return Err(VidgraphError::validation("preview_size must be non-zero"));
        }
        if self.media.ring_slots < MIN_RING_SLOTS {
            return Err(VidgraphError::validation(format!(
                "media.ring_slots must be >= {MIN_RING_SLOTS}, got {}",
                self.media.ring_slots
            )));
        }
        if self.media.event_capacity == 0 || self.media.command_capacity == 0 {
            return Err(VidgraphError::validation(
                "media channel capacities must be non-zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
