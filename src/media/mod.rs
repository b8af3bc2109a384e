//! Time-based media: decoders, the producer thread and its frame hand-off.

pub mod ring;
pub mod source;
pub mod worker;

pub use ring::{FrameRing, ReadGuard, RingStats, WriteGuard};
pub use source::{
    FfmpegSource, FrameSource, MAX_FPS, MIN_FPS, MediaInfo, SyntheticSource, VideoFrame,
};
pub use worker::{MediaCommand, MediaEvent, MediaWorker, PlaybackState};
