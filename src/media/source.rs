use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::foundation::core::Size;
use crate::foundation::error::{VidgraphError, VidgraphResult};

/// One decoded frame in host memory: premultiplied RGBA8, tightly packed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoFrame {
    pub size: Size,
    pub data: Vec<u8>,
    pub position: Duration,
}

impl VideoFrame {
    /// Resize the buffer for `size`, keeping the allocation when it already fits.
    pub fn reshape(&mut self, size: Size) {
        self.size = size;
        self.data.resize(size.rgba_len(), 0);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MediaInfo {
    pub size: Size,
    /// `None` for unbounded sources.
    pub duration: Option<Duration>,
    pub frame_interval: Duration,
    pub has_audio: bool,
}

/// Decoder seam driven by a [`MediaWorker`](crate::media::MediaWorker) thread.
pub trait FrameSource: Send {
    fn open(&mut self) -> VidgraphResult<MediaInfo>;

    fn seek(&mut self, position: Duration) -> VidgraphResult<()>;

    /// Decode the next frame into `frame`. `Ok(false)` at end of stream.
    fn next_frame(&mut self, frame: &mut VideoFrame) -> VidgraphResult<bool>;

    fn frame_interval(&self) -> Duration;
}

/// Lowest frame rate a source may play at.
pub const MIN_FPS: f64 = 0.01;
/// Highest frame rate a source may play at.
pub const MAX_FPS: f64 = 1000.0;

/// Interval used when a source does not know its frame rate.
const FALLBACK_INTERVAL: Duration = Duration::from_millis(40);

/// Unknown rates (zero, negative or non-finite) fall back to 25 fps; known rates outside
/// `MIN_FPS..=MAX_FPS` are a Resource error.
fn interval_from_fps(fps: f64) -> VidgraphResult<Duration> {
    if !fps.is_finite() || fps <= 0.0 {
        return Ok(FALLBACK_INTERVAL);
    }
    if !(MIN_FPS..=MAX_FPS).contains(&fps) {
        return Err(VidgraphError::resource(format!(
            "frame rate {fps} outside {MIN_FPS}..={MAX_FPS}"
        )));
    }
    Duration::try_from_secs_f64(1.0 / fps)
        .map_err(|e| VidgraphError::resource(format!("frame rate {fps}: {e}")))
}

/// Presentation time of frame `index`; `None` past `Duration::MAX`.
fn frame_time(interval: Duration, index: u64) -> Option<Duration> {
    let nanos = interval.as_nanos().checked_mul(u128::from(index))?;
    let secs = u64::try_from(nanos / 1_000_000_000).ok()?;
    Some(Duration::new(secs, (nanos % 1_000_000_000) as u32))
}

/// Deterministic procedural clip: a vertical bar sweeping across a dark background.
#[derive(Clone, Debug)]
pub struct SyntheticSource {
    size: Size,
    fps: f64,
    interval: Duration,
    frames: Option<u64>,
    looping: bool,
    cursor: u64,
    bar: [u8; 4],
}

impl SyntheticSource {
    pub fn new(size: Size, fps: f64) -> Self {
        Self {
            size,
            fps,
            interval: FALLBACK_INTERVAL,
            frames: None,
            looping: false,
            cursor: 0,
            bar: [255, 255, 255, 255],
        }
    }

    /// Limit the clip to `frames` frames.
    pub fn with_length(mut self, frames: u64) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Straight-alpha bar colour.
    pub fn with_bar_color(mut self, rgba: [u8; 4]) -> Self {
        self.bar = rgba;
        self
    }

    fn bar_x(&self, frame: u64) -> u32 {
        let w = u64::from(self.size.width.max(1));
        (frame % w) as u32
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self) -> VidgraphResult<MediaInfo> {
        if self.size.is_empty() {
            return Err(VidgraphError::resource(format!(
                "synthetic source has empty size {}",
                self.size
            )));
        }
        let frame_interval = interval_from_fps(self.fps)?;
        self.interval = frame_interval;
        Ok(MediaInfo {
            size: self.size,
            duration: self.frames.and_then(|n| frame_time(frame_interval, n)),
            frame_interval,
            has_audio: false,
        })
    }

    fn seek(&mut self, position: Duration) -> VidgraphResult<()> {
        let interval = self.frame_interval().as_secs_f64();
        let mut frame = (position.as_secs_f64() / interval).floor() as u64;
        if let Some(n) = self.frames {
            frame = frame.min(n);
        }
        self.cursor = frame;
        Ok(())
    }

    fn next_frame(&mut self, frame: &mut VideoFrame) -> VidgraphResult<bool> {
        if let Some(n) = self.frames
            && self.cursor >= n
        {
            if !self.looping || n == 0 {
                return Ok(false);
            }
            self.cursor = 0;
        }

        let index = self.cursor;
        self.cursor += 1;
        frame.reshape(self.size);
        frame.position = frame_time(self.interval, index).unwrap_or(Duration::MAX);

        let bar_x = self.bar_x(index);
        let [r, g, b, a] = self.bar;
        let bar = [
            ((u16::from(r) * u16::from(a) + 127) / 255) as u8,
            ((u16::from(g) * u16::from(a) + 127) / 255) as u8,
            ((u16::from(b) * u16::from(a) + 127) / 255) as u8,
            a,
        ];
        let bg = [16, 16, 16, 255];
        let width = self.size.width as usize;
        for (i, px) in frame.data.chunks_exact_mut(4).enumerate() {
            let x = (i % width) as u32;
            px.copy_from_slice(if x == bar_x { &bar } else { &bg });
        }
        Ok(true)
    }

    fn frame_interval(&self) -> Duration {
        self.interval
    }
}

/// File-backed clip decoded by an `ffmpeg` child process.
#[derive(Debug)]
pub struct FfmpegSource {
    path: PathBuf,
    info: Option<MediaInfo>,
    position: Duration,
    #[cfg(feature = "media-ffmpeg")]
    child: Option<ffmpeg::Decoder>,
}

impl FfmpegSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            info: None,
            position: Duration::ZERO,
            #[cfg(feature = "media-ffmpeg")]
            child: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(feature = "media-ffmpeg")]
impl FrameSource for FfmpegSource {
    fn open(&mut self) -> VidgraphResult<MediaInfo> {
        let info = ffmpeg::probe(&self.path)?;
        self.child = Some(ffmpeg::Decoder::spawn(&self.path, Duration::ZERO, info.size)?);
        self.position = Duration::ZERO;
        self.info = Some(info.clone());
        Ok(info)
    }

    fn seek(&mut self, position: Duration) -> VidgraphResult<()> {
        let info = self
            .info
            .as_ref()
            .ok_or_else(|| VidgraphError::resource("seek before open"))?;
        self.child = Some(ffmpeg::Decoder::spawn(&self.path, position, info.size)?);
        self.position = position;
        Ok(())
    }

    fn next_frame(&mut self, frame: &mut VideoFrame) -> VidgraphResult<bool> {
        let (Some(info), Some(child)) = (self.info.as_ref(), self.child.as_mut()) else {
            return Err(VidgraphError::resource("decode before open"));
        };
        frame.reshape(info.size);
        if !child.read_frame(&mut frame.data)? {
            return Ok(false);
        }
        frame.position = self.position;
        self.position += info.frame_interval;
        Ok(true)
    }

    fn frame_interval(&self) -> Duration {
        self.info
            .as_ref()
            .map_or(FALLBACK_INTERVAL, |i| i.frame_interval)
    }
}

#[cfg(not(feature = "media-ffmpeg"))]
impl FrameSource for FfmpegSource {
    fn open(&mut self) -> VidgraphResult<MediaInfo> {
        Err(VidgraphError::resource(format!(
            "cannot open '{}': file media requires the 'media-ffmpeg' feature",
            self.path.display()
        )))
    }

    fn seek(&mut self, position: Duration) -> VidgraphResult<()> {
        self.position = position;
        Ok(())
    }

    fn next_frame(&mut self, _frame: &mut VideoFrame) -> VidgraphResult<bool> {
        Ok(false)
    }

    fn frame_interval(&self) -> Duration {
        self.info
            .as_ref()
            .map_or(FALLBACK_INTERVAL, |i| i.frame_interval)
    }
}

#[cfg(feature = "media-ffmpeg")]
mod ffmpeg {
    use std::io::Read;
    use std::path::Path;
    use std::process::{Child, ChildStdout, Command, Stdio};
    use std::time::Duration;

    use super::{MediaInfo, interval_from_fps};
    use crate::foundation::core::Size;
    use crate::foundation::error::{VidgraphError, VidgraphResult};

    pub(super) fn probe(path: &Path) -> VidgraphResult<MediaInfo> {
        #[derive(serde::Deserialize)]
        struct ProbeStream {
            codec_type: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
            r_frame_rate: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeOut {
            streams: Vec<ProbeStream>,
            format: Option<ProbeFormat>,
        }

        let out = Command::new("ffprobe")
            .args(["-v", "error", "-print_format", "json", "-show_streams", "-show_format"])
            .arg(path)
            .output()
            .map_err(|e| VidgraphError::resource(format!("failed to run ffprobe: {e}")))?;
        if !out.status.success() {
            return Err(VidgraphError::resource(format!(
                "ffprobe failed for '{}': {}",
                path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let parsed: ProbeOut = serde_json::from_slice(&out.stdout)?;
        let video = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| VidgraphError::resource("no video stream found"))?;
        let size = Size::try_new(video.width.unwrap_or(0), video.height.unwrap_or(0))?;
        let fps = parse_ratio(video.r_frame_rate.as_deref().unwrap_or("0/1"));
        let duration = parsed
            .format
            .as_ref()
            .and_then(|f| f.duration.as_ref())
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
            .and_then(|d| Duration::try_from_secs_f64(d).ok());

        Ok(MediaInfo {
            size,
            duration,
            frame_interval: interval_from_fps(fps)?,
            has_audio: parsed
                .streams
                .iter()
                .any(|s| s.codec_type.as_deref() == Some("audio")),
        })
    }

    fn parse_ratio(s: &str) -> f64 {
        let Some((n, d)) = s.split_once('/') else {
            return s.parse().unwrap_or(0.0);
        };
        match (n.parse::<f64>(), d.parse::<f64>()) {
            (Ok(n), Ok(d)) if d != 0.0 => n / d,
            _ => 0.0,
        }
    }

    #[derive(Debug)]
    pub(super) struct Decoder {
        child: Child,
        stdout: ChildStdout,
    }

    impl Decoder {
        pub(super) fn spawn(path: &Path, start: Duration, size: Size) -> VidgraphResult<Self> {
            let mut child = Command::new("ffmpeg")
                .args(["-v", "error", "-ss", &format!("{:.9}", start.as_secs_f64())])
                .arg("-i")
                .arg(path)
                .args(["-f", "rawvideo", "-pix_fmt", "rgba"])
                .args(["-s", &format!("{}x{}", size.width, size.height)])
                .arg("pipe:1")
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|e| VidgraphError::resource(format!("failed to spawn ffmpeg: {e}")))?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| VidgraphError::resource("ffmpeg stdout not captured"))?;
            Ok(Self { child, stdout })
        }

        /// Fill `buf` with one frame. `Ok(false)` at end of stream.
        pub(super) fn read_frame(&mut self, buf: &mut [u8]) -> VidgraphResult<bool> {
            match self.stdout.read_exact(buf) {
                Ok(()) => {
                    premultiply_in_place(buf);
                    Ok(true)
                }
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
                Err(e) => Err(e.into()),
            }
        }
    }

    impl Drop for Decoder {
        fn drop(&mut self) {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }

    fn premultiply_in_place(rgba: &mut [u8]) {
        for px in rgba.chunks_exact_mut(4) {
            let a = u16::from(px[3]);
            if a == 255 {
                continue;
            }
            for c in &mut px[..3] {
                *c = ((u16::from(*c) * a + 127) / 255) as u8;
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/source.rs"]
mod tests;
