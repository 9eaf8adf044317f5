//! One generation session, from asset loading to the finished artifact.
//!
//! ```text
//! Idle → AssetsLoading → Ready → Recording → Finalizing → Completed
//!   └──────────┴───────────┴─────────┴────────────┴──────→ Failed
//! ```
//!
//! Every exit path, including cancellation, runs the same reclamation
//! routine before the result is returned.

use serde::Serialize;

use lapse_common::cancel::CancellationToken;
use lapse_common::error::{EncodingStage, LapseError, LapseResult};
use lapse_media_core::geometry::even_dimensions;
use lapse_media_core::platform::Platform;
use lapse_media_core::recorder::RecorderEvent;
use lapse_media_core::stream::MediaStream;
use lapse_media_core::surface::DecodedImage;

use crate::assembler::{OutputArtifact, OutputAssembler, SessionResources};
use crate::assets::AssetLoader;
use crate::audio::AudioMixer;
use crate::encoder::CaptureEncoder;
use crate::model::GenerationRequest;
use crate::progress::{GenerationProgress, ProgressCallback};
use crate::registry::HandleRegistry;
use crate::scheduler::{derive_frame_rate, FrameScheduler};

/// State of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// Created, nothing started.
    Idle,
    /// Frames and music are being fetched and decoded.
    AssetsLoading,
    /// Every frame is loaded; audio resolved or absent.
    Ready,
    /// The recorder is running and frames are being drawn.
    Recording,
    /// Tracks stopped; waiting for the recorder's final chunk.
    Finalizing,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, AssetsLoading)
            | (AssetsLoading, Ready)
            | (Ready, Recording)
            | (Recording, Finalizing)
            | (Finalizing, Completed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

fn emit(
    progress: &Option<ProgressCallback>,
    stage: SessionState,
    frames_drawn: usize,
    total_frames: usize,
) {
    if let Some(cb) = progress {
        cb(GenerationProgress::new(stage, frames_drawn, total_frames));
    }
}

/// A single-use generation session.
pub struct RecordingSession<'a> {
    platform: &'a Platform,
    request: GenerationRequest,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
    state: SessionState,
    frames_drawn: usize,
}

impl std::fmt::Debug for RecordingSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSession")
            .field("frames", &self.request.frames.len())
            .field("duration", &self.request.duration)
            .field("state", &self.state)
            .finish()
    }
}

impl<'a> RecordingSession<'a> {
    pub fn new(platform: &'a Platform, request: GenerationRequest) -> Self {
        Self {
            platform,
            request,
            cancel: CancellationToken::new(),
            progress: None,
            state: SessionState::Idle,
            frames_drawn: 0,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) -> LapseResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(LapseError::invalid_input(format!(
                "Illegal session transition {:?} -> {:?}",
                self.state, next
            )));
        }
        tracing::info!(from = ?self.state, to = ?next, "Session state changed");
        self.state = next;
        emit(
            &self.progress,
            next,
            self.frames_drawn,
            self.request.frames.len(),
        );
        Ok(())
    }

    /// Run the session to completion or failure.
    pub async fn run(mut self) -> LapseResult<OutputArtifact> {
        tracing::info!(
            frames = self.request.frames.len(),
            duration_secs = self.request.duration_secs(),
            music = self.request.options.music_url.is_some(),
            "Starting generation session"
        );
        let mut resources =
            SessionResources::new(HandleRegistry::new(self.platform.object_urls.clone()));

        let result = self.execute(&mut resources).await;
        resources.reclaim();

        match result {
            Ok(artifact) => {
                self.transition(SessionState::Completed)?;
                Ok(artifact)
            }
            Err(e) => {
                tracing::error!(state = ?self.state, error = %e, "Generation failed");
                if !self.state.is_terminal() {
                    self.transition(SessionState::Failed)?;
                }
                Err(e)
            }
        }
    }

    async fn execute(&mut self, resources: &mut SessionResources) -> LapseResult<OutputArtifact> {
        let platform = self.platform;
        let (Some(surfaces), Some(capturer), Some(recorders)) = (
            platform.surfaces.as_ref(),
            platform.capturer.as_ref(),
            platform.recorder.as_ref(),
        ) else {
            let report = platform.probe();
            return Err(LapseError::unsupported(
                "required media capabilities are missing",
                report.missing(),
            ));
        };

        self.transition(SessionState::AssetsLoading)?;
        let assets = AssetLoader::new(platform)
            .load_all(&self.request.frames, &mut resources.registry, &self.cancel)
            .await?;
        let audio_options = self.request.options.audio();
        let mixer = AudioMixer::new(platform);
        resources.audio = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(LapseError::Cancelled),
            graph = mixer.mix(&audio_options) => graph,
        };
        self.transition(SessionState::Ready)?;

        let images: Vec<DecodedImage> = assets.into_iter().map(|a| a.image).collect();
        let total = images.len();
        let (width, height) = surfaces.fit_within(images[0].width(), images[0].height());
        let (width, height) = even_dimensions(width, height);
        let mut canvas = surfaces.create(width, height)?;
        let fps = derive_frame_rate(total, self.request.duration_secs());

        let (sink, video) = capturer.capture_stream(&canvas, fps).map_err(|e| {
            LapseError::encoding(
                EncodingStage::RecorderConstruction,
                format!("Stream capture failed: {e}"),
            )
        })?;
        let mut stream = MediaStream::new(video);
        if let Some(graph) = &resources.audio {
            stream.add_audio_track(graph.track());
        }
        resources.track(stream.track_handles());
        tracing::debug!(width, height, fps, audio = stream.has_audio(), "Combined stream ready");

        let mut encoder = CaptureEncoder::bind(recorders.as_ref(), stream, fps)?;
        let mut assembler = OutputAssembler::new();
        let mut scheduler = FrameScheduler::new(images, fps);

        self.transition(SessionState::Recording)?;
        encoder.start(resources.audio.as_mut(), platform.timer.clone())?;

        {
            let progress = &self.progress;
            let draw = scheduler.run(&mut canvas, &sink, platform.timer.as_ref(), |n| {
                emit(progress, SessionState::Recording, n, total)
            });
            tokio::pin!(draw);

            loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(LapseError::Cancelled),
                    event = encoder.next_event() => match event {
                        Some(RecorderEvent::DataAvailable(chunk)) => assembler.push(chunk),
                        Some(RecorderEvent::Error(message)) => {
                            return Err(LapseError::encoding_with_codec(
                                EncodingStage::Recording,
                                encoder.mime_type(),
                                message,
                            ));
                        }
                        Some(RecorderEvent::Stopped) | None => {
                            return Err(LapseError::encoding_with_codec(
                                EncodingStage::Recording,
                                encoder.mime_type(),
                                "Recorder stopped before every frame was drawn",
                            ));
                        }
                    },
                    () = &mut draw => break,
                }
            }
        }
        self.frames_drawn = total;

        self.transition(SessionState::Finalizing)?;
        encoder.stop();
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(LapseError::Cancelled),
                event = encoder.next_event() => match event {
                    Some(RecorderEvent::DataAvailable(chunk)) => assembler.push(chunk),
                    Some(RecorderEvent::Stopped) => break,
                    Some(RecorderEvent::Error(message)) => {
                        return Err(LapseError::encoding_with_codec(
                            EncodingStage::Finalizing,
                            encoder.mime_type(),
                            message,
                        ));
                    }
                    None => {
                        return Err(LapseError::encoding_with_codec(
                            EncodingStage::Finalizing,
                            encoder.mime_type(),
                            "Recorder closed without a stop event",
                        ));
                    }
                },
            }
        }

        assembler.finalize(encoder.mime_type())
    }
}
