//! Streaming recorder contract.
//!
//! A recorder consumes a [`MediaStream`] and emits encoded container chunks
//! as events, in the temporal order they were produced. It stops on its own
//! once every track of its stream has ended and the final chunk is flushed.

use std::fmt;

use tokio::sync::mpsc;

use lapse_common::error::LapseResult;

use crate::stream::MediaStream;

/// Event emitted by a running recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// An encoded chunk of the output container.
    DataAvailable(Vec<u8>),
    /// The recorder flushed everything and stopped.
    Stopped,
    /// The recorder failed; no further data will follow.
    Error(String),
}

/// Lifecycle of a recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Inactive,
    Recording,
    Stopping,
    Stopped,
}

/// Encoder settings the recorder is constructed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderOptions {
    /// Container and codec string, e.g. `video/webm;codecs=vp9,opus`.
    pub mime_type: String,
    pub video_bits_per_second: u32,
    pub audio_bits_per_second: u32,
    pub frame_rate: u32,
}

/// A streaming encoder bound to one stream.
pub trait Recorder: Send {
    /// Mime type of the container actually produced.
    fn mime_type(&self) -> &str;

    /// Begin encoding. Events arrive on the returned channel.
    fn start(&mut self) -> LapseResult<mpsc::UnboundedReceiver<RecorderEvent>>;

    /// Request a stop; the recorder flushes and emits [`RecorderEvent::Stopped`].
    fn stop(&mut self);

    fn state(&self) -> RecorderState;
}

/// Constructs recorders and reports which mime types the runtime supports.
pub trait RecorderFactory: Send + Sync + fmt::Debug {
    fn is_type_supported(&self, mime_type: &str) -> bool;

    fn create(
        &self,
        stream: MediaStream,
        options: RecorderOptions,
    ) -> LapseResult<Box<dyn Recorder>>;
}

/// Split a mime type such as `video/webm;codecs=vp9,opus` into its container
/// and codec list.
pub fn parse_mime_type(mime_type: &str) -> (String, Vec<String>) {
    let mut parts = mime_type.split(';');
    let container = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
    let codecs = parts
        .filter_map(|param| {
            let (key, value) = param.split_once('=')?;
            (key.trim().eq_ignore_ascii_case("codecs")).then(|| {
                value
                    .trim()
                    .trim_matches('"')
                    .split(',')
                    .map(|c| c.trim().to_ascii_lowercase())
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
            })
        })
        .flatten()
        .collect();
    (container, codecs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mime_with_codecs() {
        let (container, codecs) = parse_mime_type("video/webm;codecs=vp9,opus");
        assert_eq!(container, "video/webm");
        assert_eq!(codecs, vec!["vp9", "opus"]);
    }

    #[test]
    fn parse_mime_with_quoted_codecs() {
        let (container, codecs) = parse_mime_type("video/webm; codecs=\"VP8, Opus\"");
        assert_eq!(container, "video/webm");
        assert_eq!(codecs, vec!["vp8", "opus"]);
    }

    #[test]
    fn parse_bare_container() {
        let (container, codecs) = parse_mime_type("video/webm");
        assert_eq!(container, "video/webm");
        assert!(codecs.is_empty());
    }
}
