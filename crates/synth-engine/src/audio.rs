//! Background music: fetch, decode, loop, gain, and expose as a track.
//!
//! Audio is best-effort. Any failure while building the graph is logged and
//! the session continues without music.

use std::sync::{Arc, Mutex, MutexGuard};

use lapse_common::error::{LapseError, LapseResult};
use lapse_media_core::audio::AudioBuffer;
use lapse_media_core::fetch::FetchOptions;
use lapse_media_core::platform::Platform;
use lapse_media_core::stream::{AudioTrack, PcmSource};

use crate::model::AudioMixOptions;

/// Buffer source with looping enabled, routed through a gain stage.
#[derive(Debug)]
struct LoopingGainSource {
    buffer: AudioBuffer,
    /// Next frame to play, in source frames.
    cursor: usize,
    gain: f32,
    playing: bool,
}

impl PcmSource for LoopingGainSource {
    fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate
    }

    fn channels(&self) -> u16 {
        self.buffer.channels
    }

    fn render(&mut self, frames: usize) -> Vec<f32> {
        let channels = usize::from(self.buffer.channels);
        let total = self.buffer.frames();
        if !self.playing || total == 0 {
            return vec![0.0; frames * channels];
        }
        let src = self.buffer.samples.as_slice();
        let mut out = Vec::with_capacity(frames * channels);
        for _ in 0..frames {
            let base = self.cursor * channels;
            out.extend(src[base..base + channels].iter().map(|s| s * self.gain));
            self.cursor = (self.cursor + 1) % total;
        }
        out
    }
}

/// Lifecycle of an [`AudioGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioGraphState {
    /// Fully wired, not yet playing.
    Connected,
    Playing,
    /// Source stopped; the context is still open.
    SourceStopped,
    Closed,
}

/// A fully connected source → gain → stream destination chain.
pub struct AudioGraph {
    source: Arc<Mutex<LoopingGainSource>>,
    track: AudioTrack,
    state: AudioGraphState,
}

impl std::fmt::Debug for AudioGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioGraph")
            .field("track", &self.track)
            .field("state", &self.state)
            .finish()
    }
}

impl AudioGraph {
    fn new(buffer: AudioBuffer, gain: f32) -> Self {
        let source = Arc::new(Mutex::new(LoopingGainSource {
            buffer,
            cursor: 0,
            gain,
            playing: false,
        }));
        let track = AudioTrack::new(source.clone());
        Self {
            source,
            track,
            state: AudioGraphState::Connected,
        }
    }

    fn source(&self) -> MutexGuard<'_, LoopingGainSource> {
        self.source
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The destination's output track, to be merged into the combined stream.
    pub fn track(&self) -> AudioTrack {
        self.track.clone()
    }

    pub fn state(&self) -> AudioGraphState {
        self.state
    }

    pub fn gain(&self) -> f32 {
        self.source().gain
    }

    /// Start playback from the beginning of the buffer.
    pub fn start(&mut self) {
        if self.state != AudioGraphState::Connected {
            return;
        }
        {
            let mut source = self.source();
            source.cursor = 0;
            source.playing = true;
        }
        self.state = AudioGraphState::Playing;
        tracing::debug!(track = %self.track.handle().id(), "Audio source started");
    }

    /// Stop the source node. No-op unless playing.
    pub fn stop_source(&mut self) {
        if self.state != AudioGraphState::Playing {
            return;
        }
        self.source().playing = false;
        self.state = AudioGraphState::SourceStopped;
    }

    /// Stop the source if needed and close the context. Idempotent.
    pub fn close(&mut self) {
        if self.state == AudioGraphState::Closed {
            return;
        }
        self.stop_source();
        self.track.handle().stop();
        self.state = AudioGraphState::Closed;
        tracing::debug!("Audio context closed");
    }
}

/// Builds the optional music graph for a session.
#[derive(Debug)]
pub struct AudioMixer<'a> {
    platform: &'a Platform,
}

impl<'a> AudioMixer<'a> {
    pub fn new(platform: &'a Platform) -> Self {
        Self { platform }
    }

    /// Build the graph, or `None` for silent output.
    ///
    /// Never fails: a missing URL means silence, and any error on the way is
    /// logged and treated the same.
    pub async fn mix(&self, options: &AudioMixOptions) -> Option<AudioGraph> {
        let url = options.url.as_deref()?;
        match self.build(url, options.effective_volume()).await {
            Ok(graph) => {
                tracing::info!(url, gain = graph.gain(), "Background music ready");
                Some(graph)
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "Background music unavailable, continuing without audio");
                None
            }
        }
    }

    async fn build(&self, url: &str, gain: f32) -> LapseResult<AudioGraph> {
        let decoder = self
            .platform
            .audio_decoder
            .as_ref()
            .ok_or_else(|| LapseError::audio("No audio decoder available"))?;
        let blob = self
            .platform
            .fetcher
            .fetch(url, FetchOptions::ANONYMOUS_CORS)
            .await?;
        let buffer = decoder.decode_audio(blob.bytes().to_vec()).await?;
        if buffer.is_empty() || buffer.sample_rate == 0 {
            return Err(LapseError::audio("Decoded audio is empty"));
        }
        tracing::debug!(
            sample_rate = buffer.sample_rate,
            channels = buffer.channels,
            duration_secs = buffer.duration().as_secs_f64(),
            "Music decoded"
        );
        Ok(AudioGraph::new(buffer, gain))
    }
}
