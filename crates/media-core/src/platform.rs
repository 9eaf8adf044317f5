//! The capability bundle the pipeline runs against, and its probe.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use lapse_common::clock::Timer;

use crate::audio::AudioDecoder;
use crate::capture::StreamCapturer;
use crate::fetch::{AssetFetcher, DirectImageLoader, ImageDecoder, ObjectUrlStore};
use crate::recorder::RecorderFactory;
use crate::surface::SurfaceFactory;

/// Everything the synthesis pipeline needs from its host.
///
/// The recorder, stream capture, and drawing surface are optional: a host
/// lacking any of them cannot generate video locally, which the probe
/// reports before any work starts. Audio decoding is optional too, but its
/// absence only costs the music track.
#[derive(Debug, Clone)]
pub struct Platform {
    pub fetcher: Arc<dyn AssetFetcher>,
    pub object_urls: Arc<dyn ObjectUrlStore>,
    pub image_decoder: Arc<dyn ImageDecoder>,
    pub direct_loader: Arc<dyn DirectImageLoader>,
    pub audio_decoder: Option<Arc<dyn AudioDecoder>>,
    pub capturer: Option<Arc<dyn StreamCapturer>>,
    pub recorder: Option<Arc<dyn RecorderFactory>>,
    pub surfaces: Option<Arc<dyn SurfaceFactory>>,
    pub timer: Arc<dyn Timer>,
}

/// Which required capabilities are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityReport {
    pub recorder: bool,
    pub stream_capture: bool,
    pub drawing_surface: bool,
    /// Not required; without it generation proceeds silently.
    pub audio_decode: bool,
}

impl CapabilityReport {
    /// True when local generation is possible.
    pub fn is_supported(&self) -> bool {
        self.recorder && self.stream_capture && self.drawing_surface
    }

    /// Names of the missing required capabilities.
    pub fn missing(&self) -> Vec<String> {
        [
            (self.recorder, "recorder"),
            (self.stream_capture, "stream capture"),
            (self.drawing_surface, "drawing surface"),
        ]
        .into_iter()
        .filter(|(present, _)| !present)
        .map(|(_, name)| name.to_string())
        .collect()
    }
}

impl Platform {
    /// Probe capabilities without side effects.
    pub fn probe(&self) -> CapabilityReport {
        CapabilityReport {
            recorder: self.recorder.is_some(),
            stream_capture: self.capturer.is_some(),
            drawing_surface: self.surfaces.is_some(),
            audio_decode: self.audio_decoder.is_some(),
        }
    }
}
