//! Media tracks and the combined stream handed to a recorder.
//!
//! Video is push-based: whoever owns the [`FrameSink`] requests a frame after
//! each draw and the recorder drains the matching [`VideoTrack`]. Audio is
//! pull-based: the recorder asks the [`AudioTrack`] for as many samples as
//! the video timeline has advanced, which keeps both timelines aligned from
//! frame zero.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::RgbaImage;
use tokio::sync::{mpsc, watch};

use crate::surface::Canvas;

static NEXT_TRACK_ID: AtomicU64 = AtomicU64::new(1);

/// Kind of media a track carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Shared stop handle for one track.
///
/// Stopping is idempotent; every clone observes the same state.
#[derive(Clone)]
pub struct TrackHandle {
    id: String,
    kind: TrackKind,
    live: Arc<watch::Sender<bool>>,
}

impl fmt::Debug for TrackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("live", &self.is_live())
            .finish()
    }
}

impl TrackHandle {
    pub fn new(kind: TrackKind) -> Self {
        let n = NEXT_TRACK_ID.fetch_add(1, Ordering::Relaxed);
        let prefix = match kind {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
        };
        let (tx, _rx) = watch::channel(true);
        Self {
            id: format!("{prefix}-{n}"),
            kind,
            live: Arc::new(tx),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_live(&self) -> bool {
        *self.live.borrow()
    }

    /// End the track. Returns `true` if this call stopped it.
    pub fn stop(&self) -> bool {
        let was_live = self.live.send_replace(false);
        if was_live {
            tracing::debug!(track = %self.id, "Track stopped");
        }
        was_live
    }

    /// Resolve once the track has been stopped.
    pub async fn ended(&self) {
        let mut rx = self.live.subscribe();
        let _ = rx.wait_for(|live| !*live).await;
    }
}

/// One captured video frame.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub image: Arc<RgbaImage>,
    /// Presentation time relative to recording start.
    pub timestamp: Duration,
}

/// Producer side of a captured video track.
#[derive(Debug, Clone)]
pub struct FrameSink {
    handle: TrackHandle,
    frames: mpsc::UnboundedSender<VideoFrame>,
}

impl FrameSink {
    /// Capture the canvas as the next frame of the track.
    ///
    /// Returns `false` once the track has been stopped or its consumer is
    /// gone; the frame is dropped in that case.
    pub fn request_frame(&self, canvas: &Canvas, timestamp: Duration) -> bool {
        if !self.handle.is_live() {
            return false;
        }
        self.frames
            .send(VideoFrame {
                image: canvas.snapshot(),
                timestamp,
            })
            .is_ok()
    }

    pub fn handle(&self) -> &TrackHandle {
        &self.handle
    }
}

/// Consumer side of a captured video track.
#[derive(Debug)]
pub struct VideoTrack {
    handle: TrackHandle,
    frames: mpsc::UnboundedReceiver<VideoFrame>,
    width: u32,
    height: u32,
    frame_rate: u32,
}

impl VideoTrack {
    /// Create a connected sink/track pair.
    pub fn channel(width: u32, height: u32, frame_rate: u32) -> (FrameSink, VideoTrack) {
        let handle = TrackHandle::new(TrackKind::Video);
        let (tx, rx) = mpsc::unbounded_channel();
        (
            FrameSink {
                handle: handle.clone(),
                frames: tx,
            },
            VideoTrack {
                handle,
                frames: rx,
                width,
                height,
                frame_rate,
            },
        )
    }

    pub fn handle(&self) -> &TrackHandle {
        &self.handle
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Next frame in capture order.
    ///
    /// Frames queued before the track was stopped are still delivered;
    /// `None` means the track has ended and is fully drained.
    pub async fn next_frame(&mut self) -> Option<VideoFrame> {
        loop {
            if let Ok(frame) = self.frames.try_recv() {
                return Some(frame);
            }
            if !self.handle.is_live() {
                // A frame may have been queued between the miss above and
                // the stop.
                return self.frames.try_recv().ok();
            }
            tokio::select! {
                frame = self.frames.recv() => return frame,
                _ = self.handle.ended() => continue,
            }
        }
    }
}

/// A source of interleaved PCM samples.
pub trait PcmSource: Send {
    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// Produce exactly `frames * channels` interleaved samples.
    fn render(&mut self, frames: usize) -> Vec<f32>;
}

/// A block of interleaved PCM pulled from an audio track.
#[derive(Debug, Clone)]
pub struct AudioBlock {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Pull-based audio track fed by an audio graph's destination node.
#[derive(Clone)]
pub struct AudioTrack {
    handle: TrackHandle,
    source: Arc<Mutex<dyn PcmSource>>,
    sample_rate: u32,
    channels: u16,
}

impl fmt::Debug for AudioTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioTrack")
            .field("handle", &self.handle)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish()
    }
}

impl AudioTrack {
    pub fn new(source: Arc<Mutex<dyn PcmSource>>) -> Self {
        let (sample_rate, channels) = match source.lock() {
            Ok(s) => (s.sample_rate(), s.channels()),
            Err(poisoned) => {
                let s = poisoned.into_inner();
                (s.sample_rate(), s.channels())
            }
        };
        Self {
            handle: TrackHandle::new(TrackKind::Audio),
            source,
            sample_rate,
            channels,
        }
    }

    pub fn handle(&self) -> &TrackHandle {
        &self.handle
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Pull `frames` sample frames. A stopped track yields silence.
    pub fn pull(&self, frames: usize) -> AudioBlock {
        let samples = if self.handle.is_live() {
            match self.source.lock() {
                Ok(mut s) => s.render(frames),
                Err(poisoned) => poisoned.into_inner().render(frames),
            }
        } else {
            vec![0.0; frames * usize::from(self.channels)]
        };
        AudioBlock {
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}

/// A single stream carrying the captured video track and, optionally, the
/// mixed audio track.
#[derive(Debug)]
pub struct MediaStream {
    video: VideoTrack,
    audio: Option<AudioTrack>,
}

impl MediaStream {
    pub fn new(video: VideoTrack) -> Self {
        Self { video, audio: None }
    }

    /// Merge an audio track into the stream, replacing any previous one.
    pub fn add_audio_track(&mut self, track: AudioTrack) {
        self.audio = Some(track);
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Stop handles for every track in the stream.
    pub fn track_handles(&self) -> Vec<TrackHandle> {
        let mut handles = vec![self.video.handle().clone()];
        if let Some(audio) = &self.audio {
            handles.push(audio.handle().clone());
        }
        handles
    }

    pub fn video(&self) -> &VideoTrack {
        &self.video
    }

    pub fn audio(&self) -> Option<&AudioTrack> {
        self.audio.as_ref()
    }

    pub fn into_parts(self) -> (VideoTrack, Option<AudioTrack>) {
        (self.video, self.audio)
    }
}
