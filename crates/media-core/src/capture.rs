//! Capturing the drawing surface as a live video track.

use std::fmt;

use lapse_common::error::{LapseError, LapseResult};

use crate::stream::{FrameSink, VideoTrack};
use crate::surface::Canvas;

/// Turns a drawing surface into a video track sampled at a fixed rate.
pub trait StreamCapturer: Send + Sync + fmt::Debug {
    /// Start capturing `canvas` at `frame_rate` frames per second.
    ///
    /// The returned sink is driven by the frame scheduler; the track goes
    /// into the combined stream.
    fn capture_stream(&self, canvas: &Canvas, frame_rate: u32)
        -> LapseResult<(FrameSink, VideoTrack)>;
}

/// Captures frames by snapshotting the in-memory canvas on request.
#[derive(Debug, Clone, Default)]
pub struct CanvasCapturer;

impl StreamCapturer for CanvasCapturer {
    fn capture_stream(
        &self,
        canvas: &Canvas,
        frame_rate: u32,
    ) -> LapseResult<(FrameSink, VideoTrack)> {
        if frame_rate == 0 {
            return Err(LapseError::invalid_input("Capture frame rate must be at least 1"));
        }
        let (sink, track) = VideoTrack::channel(canvas.width(), canvas.height(), frame_rate);
        tracing::debug!(
            track = %track.handle().id(),
            width = canvas.width(),
            height = canvas.height(),
            frame_rate,
            "Canvas capture stream created"
        );
        Ok((sink, track))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_carries_surface_geometry() {
        let canvas = Canvas::new(320, 240);
        let (sink, track) = CanvasCapturer.capture_stream(&canvas, 12).unwrap();
        assert_eq!((track.width(), track.height(), track.frame_rate()), (320, 240, 12));
        assert_eq!(sink.handle().id(), track.handle().id());
    }

    #[test]
    fn zero_frame_rate_is_rejected() {
        let canvas = Canvas::new(2, 2);
        assert!(CanvasCapturer.capture_stream(&canvas, 0).is_err());
    }
}
