//! Capability-aware entry point for video generation.

use serde::{Deserialize, Serialize};

use lapse_common::cancel::CancellationToken;
use lapse_common::error::{LapseError, LapseResult};
use lapse_media_core::platform::{CapabilityReport, Platform};

use crate::assembler::OutputArtifact;
use crate::model::{GenerationOptions, GenerationRequest};
use crate::progress::ProgressCallback;
use crate::session::RecordingSession;

/// What the external server-side transcoder needs when local generation is
/// unavailable: the same frames and target duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackRequest {
    pub frame_urls: Vec<String>,
    pub duration_seconds: f64,
}

impl FallbackRequest {
    pub fn to_json(&self) -> LapseResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Routes generation requests to the local pipeline when the platform can
/// run it.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    platform: Platform,
}

impl Dispatcher {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Probe every capability. No side effects.
    pub fn capabilities(&self) -> CapabilityReport {
        self.platform.probe()
    }

    pub fn is_supported(&self) -> bool {
        self.capabilities().is_supported()
    }

    /// Generate a video from `frame_urls` spread over `duration_secs`.
    pub async fn generate(
        &self,
        frame_urls: &[String],
        duration_secs: f64,
        options: GenerationOptions,
    ) -> LapseResult<OutputArtifact> {
        self.generate_with(
            frame_urls,
            duration_secs,
            options,
            CancellationToken::new(),
            None,
        )
        .await
    }

    /// [`Dispatcher::generate`] with a cancellation token and progress
    /// callback.
    ///
    /// Input validation happens before the capability probe, and both
    /// before any I/O.
    pub async fn generate_with(
        &self,
        frame_urls: &[String],
        duration_secs: f64,
        options: GenerationOptions,
        cancel: CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> LapseResult<OutputArtifact> {
        let request = GenerationRequest::new(frame_urls, duration_secs, options)?;

        let report = self.capabilities();
        if !report.is_supported() {
            let missing = report.missing();
            tracing::warn!(?missing, "Local generation unsupported, use the server-side fallback");
            return Err(LapseError::unsupported(
                format!("missing {}", missing.join(", ")),
                missing,
            ));
        }
        if !report.audio_decode && request.options.music_url.is_some() {
            tracing::warn!("No audio decoder available, music will be skipped");
        }

        RecordingSession::new(&self.platform, request)
            .with_cancellation(cancel)
            .with_progress(progress)
            .run()
            .await
    }

    /// Package a request for the external transcoder.
    pub fn fallback_request(&self, frame_urls: &[String], duration_secs: f64) -> FallbackRequest {
        FallbackRequest {
            frame_urls: frame_urls.to_vec(),
            duration_seconds: duration_secs,
        }
    }
}

/// Generate a video on `platform`. See [`Dispatcher::generate`].
pub async fn generate_video(
    platform: &Platform,
    frame_urls: &[String],
    duration_secs: f64,
    options: GenerationOptions,
) -> LapseResult<OutputArtifact> {
    Dispatcher::new(platform.clone())
        .generate(frame_urls, duration_secs, options)
        .await
}

/// Whether `platform` can generate video locally.
pub fn is_generation_supported(platform: &Platform) -> bool {
    platform.probe().is_supported()
}
