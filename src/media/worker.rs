//! Producer thread that decodes frames ahead of the render path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError, bounded};

use crate::foundation::config::MediaConfig;
use crate::foundation::core::Size;
use crate::foundation::error::{VidgraphError, VidgraphResult};
use crate::media::ring::FrameRing;
use crate::media::source::{FrameSource, MediaInfo, VideoFrame};

/// Requests from the owner to the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaCommand {
    SetPosition(Duration),
    SetMute(bool),
    SetPause(bool),
    Shutdown,
}

/// Status notifications from the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    Initialized(MediaInfo),
    VideoSizeChanged(Size),
    PositionChanged(Duration),
    DurationChanged(Option<Duration>),
    MuteChanged(bool),
    PauseChanged(bool),
    /// A frame is ready in the ring under sequence number `seq`.
    FramePublished { seq: u64, position: Duration },
    EndOfStream,
    /// The worker stopped; nothing more will be published.
    Fatal(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PlaybackState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
    Playing = 3,
    Paused = 4,
    Disposed = 5,
}

impl PlaybackState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Uninitialized,
            1 => Self::Initializing,
            2 => Self::Ready,
            3 => Self::Playing,
            4 => Self::Paused,
            _ => Self::Disposed,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: AtomicU8,
    failed: AtomicBool,
    dropped_events: AtomicU64,
}

impl Shared {
    fn set_state(&self, s: PlaybackState) {
        self.state.store(s as u8, Ordering::Release);
    }
}

/// Handle to a running producer thread.
///
/// Frames go through a [`FrameRing`]; status goes through a bounded event channel that
/// the worker never blocks on. Dropping the handle shuts the thread down and joins it.
pub struct MediaWorker {
    ring: Arc<FrameRing<VideoFrame>>,
    shared: Arc<Shared>,
    commands: Option<Sender<MediaCommand>>,
    events: Receiver<MediaEvent>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for MediaWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaWorker")
            .field("state", &self.state())
            .field("ring", &self.ring)
            .finish()
    }
}

impl MediaWorker {
    /// Start a worker over `source`. It opens the source on its own thread.
    pub fn spawn(
        source: Box<dyn FrameSource>,
        cfg: &MediaConfig,
        start_paused: bool,
    ) -> VidgraphResult<Self> {
        let ring = Arc::new(FrameRing::new(cfg.ring_slots, VideoFrame::default)?);
        let shared = Arc::new(Shared::default());
        let (cmd_tx, cmd_rx) = bounded(cfg.command_capacity.max(1));
        let (evt_tx, evt_rx) = bounded(cfg.event_capacity.max(1));

        let mut producer = Producer {
            source,
            ring: Arc::clone(&ring),
            shared: Arc::clone(&shared),
            commands: cmd_rx,
            events: evt_tx,
            paused: start_paused,
            muted: false,
            interval: Duration::from_millis(40),
            scratch: VideoFrame::default(),
        };
        let handle = std::thread::Builder::new()
            .name("vidgraph-media".to_owned())
            .spawn(move || producer.run())
            .map_err(|e| VidgraphError::worker(format!("failed to spawn media worker: {e}")))?;

        Ok(Self {
            ring,
            shared,
            commands: Some(cmd_tx),
            events: evt_rx,
            handle: Some(handle),
        })
    }

    pub fn ring(&self) -> &Arc<FrameRing<VideoFrame>> {
        &self.ring
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Whether the worker stopped on an error.
    pub fn is_failed(&self) -> bool {
        self.shared.failed.load(Ordering::Acquire)
    }

    /// Events the worker could not queue because the channel was full.
    pub fn dropped_events(&self) -> u64 {
        self.shared.dropped_events.load(Ordering::Relaxed)
    }

    /// Queue a command without waiting.
    pub fn send(&self, cmd: MediaCommand) -> VidgraphResult<()> {
        let tx = self
            .commands
            .as_ref()
            .ok_or_else(|| VidgraphError::worker("media worker is disposed"))?;
        tx.try_send(cmd).map_err(|e| match e {
            TrySendError::Full(_) => VidgraphError::worker("media worker command queue is full"),
            TrySendError::Disconnected(_) => VidgraphError::worker("media worker has stopped"),
        })
    }

    pub fn set_position(&self, position: Duration) -> VidgraphResult<()> {
        self.send(MediaCommand::SetPosition(position))
    }

    pub fn set_mute(&self, muted: bool) -> VidgraphResult<()> {
        self.send(MediaCommand::SetMute(muted))
    }

    pub fn set_pause(&self, paused: bool) -> VidgraphResult<()> {
        self.send(MediaCommand::SetPause(paused))
    }

    /// Drain queued events without waiting.
    pub fn try_events(&self) -> Vec<MediaEvent> {
        self.events.try_iter().collect()
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<MediaEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Stop the thread and wait for it. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.commands.take() {
            let _ = tx.try_send(MediaCommand::Shutdown);
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("media worker panicked");
        }
        self.shared.set_state(PlaybackState::Disposed);
    }
}

impl Drop for MediaWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Producer {
    source: Box<dyn FrameSource>,
    ring: Arc<FrameRing<VideoFrame>>,
    shared: Arc<Shared>,
    commands: Receiver<MediaCommand>,
    events: Sender<MediaEvent>,
    paused: bool,
    muted: bool,
    interval: Duration,
    /// Decode target when every ring slot is busy, so playback time still advances.
    scratch: VideoFrame,
}

enum Step {
    Continue,
    Stop,
}

impl Producer {
    fn emit(&self, evt: MediaEvent) {
        if self.events.try_send(evt).is_err() {
            self.shared.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn fail(&self, msg: String) {
        tracing::error!(error = %msg, "media worker failed");
        self.shared.failed.store(true, Ordering::Release);
        self.emit(MediaEvent::Fatal(msg));
    }

    fn playing_state(&self) -> PlaybackState {
        if self.paused {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        }
    }

    fn run(&mut self) {
        self.shared.set_state(PlaybackState::Initializing);
        match self.source.open() {
            Ok(info) => {
                tracing::debug!(size = %info.size, interval = ?info.frame_interval, "media source opened");
                self.interval = info.frame_interval;
                let (size, duration) = (info.size, info.duration);
                self.emit(MediaEvent::Initialized(info));
                self.emit(MediaEvent::VideoSizeChanged(size));
                self.emit(MediaEvent::DurationChanged(duration));
                self.shared.set_state(PlaybackState::Ready);
            }
            Err(e) => {
                self.fail(format!("open failed: {e}"));
                self.shared.set_state(PlaybackState::Disposed);
                return;
            }
        }

        self.shared.set_state(self.playing_state());
        self.emit(MediaEvent::PauseChanged(self.paused));

        // Show the first frame even when starting paused.
        let mut pending = true;
        let mut deadline = Instant::now();
        loop {
            if pending || (!self.paused && Instant::now() >= deadline) {
                pending = false;
                deadline = Instant::now() + self.interval;
                if let Step::Stop = self.produce() {
                    break;
                }
                continue;
            }

            let cmd = if self.paused {
                self.commands.recv().map_err(|_| RecvTimeoutError::Disconnected)
            } else {
                self.commands
                    .recv_timeout(deadline.saturating_duration_since(Instant::now()))
            };
            match cmd {
                Ok(cmd) => match self.handle(cmd) {
                    Some(true) => pending = true,
                    Some(false) => {}
                    None => break,
                },
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            // Apply any backlog before producing so a seek is not followed by a stale frame.
            loop {
                match self.commands.try_recv() {
                    Ok(cmd) => match self.handle(cmd) {
                        Some(true) => pending = true,
                        Some(false) => {}
                        None => {
                            self.shared.set_state(PlaybackState::Disposed);
                            return;
                        }
                    },
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.shared.set_state(PlaybackState::Disposed);
                        return;
                    }
                }
            }
        }
        tracing::debug!("media worker stopped");
        self.shared.set_state(PlaybackState::Disposed);
    }

    /// `None` stops the worker; `Some(true)` asks for a frame right away.
    fn handle(&mut self, cmd: MediaCommand) -> Option<bool> {
        match cmd {
            MediaCommand::SetPosition(pos) => {
                if let Err(e) = self.source.seek(pos) {
                    self.fail(format!("seek failed: {e}"));
                    return None;
                }
                self.emit(MediaEvent::PositionChanged(pos));
                Some(true)
            }
            MediaCommand::SetMute(m) => {
                if self.muted != m {
                    self.muted = m;
                    self.emit(MediaEvent::MuteChanged(m));
                }
                Some(false)
            }
            MediaCommand::SetPause(p) => {
                if self.paused != p {
                    self.paused = p;
                    self.shared.set_state(self.playing_state());
                    self.emit(MediaEvent::PauseChanged(p));
                }
                Some(!p)
            }
            MediaCommand::Shutdown => None,
        }
    }

    fn produce(&mut self) -> Step {
        let published = match self.ring.write() {
            Some(mut slot) => match self.source.next_frame(&mut slot) {
                Ok(true) => {
                    let position = slot.position;
                    Ok(Some((slot.commit(), position)))
                }
                Ok(false) => Ok(None),
                Err(e) => Err(e),
            },
            None => match self.source.next_frame(&mut self.scratch) {
                Ok(true) => {
                    self.emit(MediaEvent::PositionChanged(self.scratch.position));
                    return Step::Continue;
                }
                Ok(false) => Ok(None),
                Err(e) => Err(e),
            },
        };

        match published {
            Ok(Some((seq, position))) => {
                self.emit(MediaEvent::FramePublished { seq, position });
                self.emit(MediaEvent::PositionChanged(position));
                Step::Continue
            }
            Ok(None) => {
                self.emit(MediaEvent::EndOfStream);
                if !self.paused {
                    self.paused = true;
                    self.shared.set_state(PlaybackState::Paused);
                    self.emit(MediaEvent::PauseChanged(true));
                }
                Step::Continue
            }
            Err(e) => {
                self.fail(format!("decode failed: {e}"));
                Step::Stop
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/worker.rs"]
mod tests;
