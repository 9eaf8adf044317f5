//! Native Lapse platform.
//!
//! Realizes the `lapse-media-core` capability traits on a desktop or server
//! host: `reqwest` for HTTP, `image` and `symphonia` for decoding, and (with
//! the `gstreamer` feature) a GStreamer pipeline as the streaming recorder.
//! Without that feature the platform has no recorder, so generation reports
//! itself unsupported and callers are pointed at the server-side fallback.

pub mod codecs;
pub mod decode;
pub mod fetch;
#[cfg(feature = "gstreamer")]
pub mod recorder;

use std::sync::Arc;

use lapse_common::clock::TokioTimer;
use lapse_common::config::AppConfig;
use lapse_media_core::capture::CanvasCapturer;
use lapse_media_core::fetch::MemoryObjectUrls;
use lapse_media_core::platform::Platform;
use lapse_media_core::recorder::RecorderFactory;
use lapse_media_core::surface::RasterSurfaces;

pub use decode::{RasterDecoder, SymphoniaDecoder};
pub use fetch::{HttpFetcher, HttpImageLoader};
#[cfg(feature = "gstreamer")]
pub use recorder::{GstRecorder, GstRecorderFactory};

#[cfg(feature = "gstreamer")]
fn recorder_factory() -> Option<Arc<dyn RecorderFactory>> {
    match recorder::GstRecorderFactory::new() {
        Ok(factory) => Some(Arc::new(factory)),
        Err(e) => {
            tracing::warn!(error = %e, "GStreamer recorder unavailable");
            None
        }
    }
}

#[cfg(not(feature = "gstreamer"))]
fn recorder_factory() -> Option<Arc<dyn RecorderFactory>> {
    tracing::debug!("Built without the gstreamer feature; no streaming recorder");
    None
}

/// Assemble the native platform from configuration.
pub fn native_platform(config: &AppConfig) -> Platform {
    let fetcher = HttpFetcher::new(&config.http);
    Platform {
        fetcher: Arc::new(fetcher.clone()),
        object_urls: Arc::new(MemoryObjectUrls::new()),
        image_decoder: Arc::new(RasterDecoder),
        direct_loader: Arc::new(HttpImageLoader::new(fetcher)),
        audio_decoder: Some(Arc::new(SymphoniaDecoder)),
        capturer: Some(Arc::new(CanvasCapturer)),
        recorder: recorder_factory(),
        surfaces: Some(Arc::new(RasterSurfaces::default())),
        timer: Arc::new(TokioTimer::new()),
    }
}
