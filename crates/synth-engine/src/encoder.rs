//! Codec negotiation and the streaming recorder's lifecycle.

use std::sync::Arc;

use tokio::sync::mpsc;

use lapse_common::clock::{DriftMeasurement, RecordingClock, Timer};
use lapse_common::error::{EncodingStage, LapseError, LapseResult};
use lapse_media_core::recorder::{
    Recorder, RecorderEvent, RecorderFactory, RecorderOptions, RecorderState,
};
use lapse_media_core::stream::{MediaStream, TrackHandle};

use crate::audio::AudioGraph;

/// Candidate containers, best first: paired video+audio, a lower-quality
/// pairing, video with an unspecified audio codec, then the bare container.
pub const CODEC_CHAIN: [&str; 4] = [
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm;codecs=vp9",
    "video/webm",
];

pub const VIDEO_BITS_PER_SECOND: u32 = 5_000_000;
pub const AUDIO_BITS_PER_SECOND: u32 = 128_000;

/// Audio/video start skew above which a warning is logged.
const DRIFT_WARN_MS: f64 = 50.0;

/// First entry of [`CODEC_CHAIN`] the factory supports.
pub fn negotiate_codec(factory: &dyn RecorderFactory) -> LapseResult<&'static str> {
    for candidate in CODEC_CHAIN {
        if factory.is_type_supported(candidate) {
            tracing::info!(mime_type = candidate, "Negotiated recorder codec");
            return Ok(candidate);
        }
        tracing::warn!(mime_type = candidate, "Codec not supported, trying next candidate");
    }
    Err(LapseError::encoding(
        EncodingStage::CodecNegotiation,
        format!("None of {} candidate codecs is supported", CODEC_CHAIN.len()),
    ))
}

/// Owns the recorder bound to a session's combined stream.
pub struct CaptureEncoder {
    recorder: Box<dyn Recorder>,
    mime_type: String,
    tracks: Vec<TrackHandle>,
    events: Option<mpsc::UnboundedReceiver<RecorderEvent>>,
    clock: Option<RecordingClock>,
}

impl std::fmt::Debug for CaptureEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureEncoder")
            .field("mime_type", &self.mime_type)
            .field("state", &self.recorder.state())
            .field("tracks", &self.tracks)
            .finish()
    }
}

impl CaptureEncoder {
    /// Negotiate a codec and construct a recorder over `stream`.
    pub fn bind(
        factory: &dyn RecorderFactory,
        stream: MediaStream,
        frame_rate: u32,
    ) -> LapseResult<Self> {
        let mime_type = negotiate_codec(factory)?;
        let tracks = stream.track_handles();
        let options = RecorderOptions {
            mime_type: mime_type.to_string(),
            video_bits_per_second: VIDEO_BITS_PER_SECOND,
            audio_bits_per_second: AUDIO_BITS_PER_SECOND,
            frame_rate,
        };
        let recorder = factory.create(stream, options).map_err(|e| {
            LapseError::encoding_with_codec(
                EncodingStage::RecorderConstruction,
                mime_type,
                e.to_string(),
            )
        })?;
        Ok(Self {
            mime_type: recorder.mime_type().to_string(),
            recorder,
            tracks,
            events: None,
            clock: None,
        })
    }

    /// Container mime type the recorder produces.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn state(&self) -> RecorderState {
        self.recorder.state()
    }

    /// Stop handles for every track on the combined stream.
    pub fn track_handles(&self) -> &[TrackHandle] {
        &self.tracks
    }

    /// Start recording, and music playback on the same tick.
    pub fn start(&mut self, audio: Option<&mut AudioGraph>, timer: Arc<dyn Timer>) -> LapseResult<()> {
        let clock = RecordingClock::start(timer);
        let events = self.recorder.start().map_err(|e| {
            LapseError::encoding_with_codec(EncodingStage::Recording, &self.mime_type, e.to_string())
        })?;
        self.events = Some(events);
        let video_started = clock.elapsed_ns();

        if let Some(graph) = audio {
            graph.start();
            let drift = DriftMeasurement {
                reference_ns: video_started,
                measured_ns: clock.elapsed_ns(),
            };
            if drift.exceeds_threshold_ms(DRIFT_WARN_MS) {
                tracing::warn!(drift_ms = drift.drift_ms(), "Audio started late relative to video");
            } else {
                tracing::debug!(drift_ms = drift.drift_ms(), "Audio aligned with video start");
            }
        }

        tracing::info!(
            mime_type = %self.mime_type,
            epoch = clock.epoch_wall(),
            "Recording started"
        );
        self.clock = Some(clock);
        Ok(())
    }

    /// Stop every track so the recorder flushes its final chunk.
    pub fn stop(&mut self) {
        for track in &self.tracks {
            track.stop();
        }
        if self.recorder.state() == RecorderState::Recording {
            self.recorder.stop();
        }
        if let Some(clock) = &self.clock {
            tracing::debug!(elapsed_secs = clock.elapsed_secs(), "Recorder stop requested");
        }
    }

    /// Next recorder event, or `None` once the recorder hung up.
    pub async fn next_event(&mut self) -> Option<RecorderEvent> {
        match self.events.as_mut() {
            Some(events) => events.recv().await,
            None => None,
        }
    }
}
