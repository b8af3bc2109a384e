use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::foundation::config::MediaConfig;
use crate::foundation::core::{Size, TextureId};
use crate::foundation::error::{VidgraphError, VidgraphResult};
use crate::foundation::paths;
use crate::gpu::{ChainTexture, kernels};
use crate::graph::chain::{Chain, ChainId};
use crate::graph::node::{RenderStates, VideoNode};
use crate::media::{
    FfmpegSource, FrameSource, MAX_FPS, MIN_FPS, MediaEvent, MediaWorker, PlaybackState,
    SyntheticSource,
};
use crate::nodes::params;

pub const KIND: &str = "movie";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MovieParams {
    /// Media file decoded with ffmpeg, relative to the resource library once paths are
    /// initialised. Without one a synthetic clip plays.
    pub path: Option<PathBuf>,
    /// Synthetic clip resolution.
    pub size: Size,
    /// Synthetic clip frame rate.
    pub fps: f64,
    /// Synthetic clip length in frames; unbounded when absent.
    pub frames: Option<u64>,
    pub looping: bool,
    pub paused: bool,
    pub muted: bool,
}

impl Default for MovieParams {
    fn default() -> Self {
        Self {
            path: None,
            size: Size::new(320, 180),
            fps: 25.0,
            frames: None,
            looping: true,
            paused: false,
            muted: false,
        }
    }
}

impl MovieParams {
    fn source(&self) -> Box<dyn FrameSource> {
        match &self.path {
            Some(path) if path.is_relative() && paths::is_initialized() => {
                Box::new(FfmpegSource::new(paths::library().join(path)))
            }
            Some(path) => Box::new(FfmpegSource::new(path.clone())),
            None => {
                let mut src = SyntheticSource::new(self.size, self.fps).looping(self.looping);
                if let Some(n) = self.frames {
                    src = src.with_length(n);
                }
                Box::new(src)
            }
        }
    }
}

/// What the owner thread last heard from the worker.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MovieStatus {
    pub initialized: bool,
    pub video_size: Option<Size>,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub muted: bool,
    pub paused: bool,
    pub ended: bool,
    pub last_published: u64,
    pub error: Option<String>,
}

#[derive(Debug)]
struct MovieState {
    texture: ChainTexture,
    /// Sequence number of the frame the texture holds.
    seq: u64,
}

/// Media source node. Decoding runs on a [`MediaWorker`]; painting uploads the newest
/// published frame and never waits for one.
#[derive(Debug)]
pub struct MovieNode {
    params: MovieParams,
    worker: Option<Arc<MediaWorker>>,
    states: RenderStates<MovieState>,
    status: MovieStatus,
}

impl MovieNode {
    pub fn new(params: MovieParams, cfg: &MediaConfig) -> VidgraphResult<Self> {
        if params.path.is_none() && !(MIN_FPS..=MAX_FPS).contains(&params.fps) {
            return Err(VidgraphError::validation(format!(
                "movie.fps must be within {MIN_FPS}..={MAX_FPS}, got {}",
                params.fps
            )));
        }
        let source = params.source();
        Self::with_source(params, source, cfg)
    }

    pub fn from_value(value: &serde_json::Value, cfg: &MediaConfig) -> VidgraphResult<Self> {
        Self::new(params::parse(KIND, value)?, cfg)
    }

    /// Play an arbitrary source. `params` still supplies the initial pause and mute.
    pub fn with_source(
        params: MovieParams,
        source: Box<dyn FrameSource>,
        cfg: &MediaConfig,
    ) -> VidgraphResult<Self> {
        let worker = MediaWorker::spawn(source, cfg, params.paused)?;
        if params.muted {
            worker.set_mute(true)?;
        }
        let status = MovieStatus {
            muted: params.muted,
            paused: params.paused,
            ..MovieStatus::default()
        };
        Ok(Self {
            params,
            worker: Some(Arc::new(worker)),
            states: RenderStates::new(),
            status,
        })
    }

    pub fn status(&self) -> &MovieStatus {
        &self.status
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.worker
            .as_ref()
            .map_or(PlaybackState::Disposed, |w| w.state())
    }

    pub fn worker(&self) -> Option<&Arc<MediaWorker>> {
        self.worker.as_ref()
    }

    pub fn set_position(&self, position: Duration) -> VidgraphResult<()> {
        self.live_worker()?.set_position(position)
    }

    pub fn set_paused(&mut self, paused: bool) -> VidgraphResult<()> {
        self.live_worker()?.set_pause(paused)?;
        self.params.paused = paused;
        Ok(())
    }

    pub fn set_muted(&mut self, muted: bool) -> VidgraphResult<()> {
        self.live_worker()?.set_mute(muted)?;
        self.params.muted = muted;
        Ok(())
    }

    fn live_worker(&self) -> VidgraphResult<&Arc<MediaWorker>> {
        self.worker
            .as_ref()
            .ok_or_else(|| VidgraphError::worker("movie node has no worker"))
    }

    /// Apply queued worker notifications to [`status`](Self::status).
    pub fn poll_events(&mut self) -> Vec<MediaEvent> {
        let Some(worker) = &self.worker else {
            return Vec::new();
        };
        let events = worker.try_events();
        for evt in &events {
            let s = &mut self.status;
            match evt {
                MediaEvent::Initialized(info) => {
                    s.initialized = true;
                    s.video_size = Some(info.size);
                    s.duration = info.duration;
                }
                MediaEvent::VideoSizeChanged(size) => s.video_size = Some(*size),
                MediaEvent::PositionChanged(p) => {
                    s.position = *p;
                    s.ended = false;
                }
                MediaEvent::DurationChanged(d) => s.duration = *d,
                MediaEvent::MuteChanged(m) => s.muted = *m,
                MediaEvent::PauseChanged(p) => s.paused = *p,
                MediaEvent::FramePublished { seq, .. } => s.last_published = *seq,
                MediaEvent::EndOfStream => s.ended = true,
                MediaEvent::Fatal(msg) => {
                    tracing::warn!(error = %msg, "movie source failed");
                    s.error = Some(msg.clone());
                }
            }
        }
        events
    }

    pub fn cached_chains(&self) -> Vec<ChainId> {
        self.states.chains()
    }
}

impl VideoNode for MovieNode {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn input_count(&self) -> usize {
        0
    }

    fn copy_for_rendering(&self, _chain: &Arc<Chain>) -> VidgraphResult<Box<dyn VideoNode>> {
        Ok(Box::new(Self {
            params: self.params.clone(),
            worker: self.worker.clone(),
            states: self.states.clone(),
            status: self.status.clone(),
        }))
    }

    fn paint(&mut self, chain: &Arc<Chain>, _inputs: &[TextureId]) -> VidgraphResult<TextureId> {
        let Some(worker) = &self.worker else {
            return Ok(TextureId::NONE);
        };
        if worker.is_failed() {
            return Ok(TextureId::NONE);
        }
        let ring = worker.ring();

        let latest = ring.latest_seq();
        let cached = self
            .states
            .with_existing(chain.id(), |st| (st.seq, st.texture.id()));
        if let Some((seq, texture)) = cached
            && seq == latest
            && seq != 0
        {
            return Ok(texture);
        }

        let Some(frame) = ring.read() else {
            // Nothing newer to upload: keep showing what this chain already has.
            return Ok(cached
                .filter(|(seq, _)| *seq != 0)
                .map_or(TextureId::NONE, |(_, t)| t));
        };
        self.states.with_state(
            chain,
            || {
                Ok(MovieState {
                    texture: ChainTexture::allocate(chain.gpu(), chain.size())?,
                    seq: 0,
                })
            },
            |st| {
                if st.seq != frame.seq() {
                    chain.gpu().render_to(st.texture.id(), &[], |dst, _| {
                        kernels::blit_rgba(dst, &frame.data, frame.size)
                    })?;
                    st.seq = frame.seq();
                }
                Ok(st.texture.id())
            },
        )
    }

    fn serialize(&self) -> serde_json::Value {
        params::to_value(&self.params)
    }

    fn set_param(&mut self, key: &str, value: &serde_json::Value) -> VidgraphResult<()> {
        match key {
            "paused" | "muted" => {
                let flag = value.as_bool().ok_or_else(|| {
                    VidgraphError::validation(format!("movie.{key} must be a boolean"))
                })?;
                if key == "paused" {
                    self.set_paused(flag)
                } else {
                    self.set_muted(flag)
                }
            }
            "position" => {
                let position = value
                    .as_f64()
                    .and_then(|s| Duration::try_from_secs_f64(s).ok())
                    .ok_or_else(|| {
                        VidgraphError::validation("movie.position must be seconds >= 0")
                    })?;
                self.set_position(position)
            }
            _ => Err(VidgraphError::validation(format!(
                "movie.{key} cannot change on a live node"
            ))),
        }
    }

    fn retain_chains(&mut self, live: &HashSet<ChainId>) -> usize {
        self.states.retain(live)
    }

    fn poll(&mut self) {
        self.poll_events();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/nodes/movie.rs"]
mod tests;
