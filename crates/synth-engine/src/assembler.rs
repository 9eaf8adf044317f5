//! Chunk assembly and session resource reclamation.

use std::path::Path;

use serde::Serialize;

use lapse_common::error::{EncodingStage, LapseError, LapseResult};
use lapse_media_core::recorder::parse_mime_type;
use lapse_media_core::stream::TrackHandle;

use crate::audio::AudioGraph;
use crate::registry::HandleRegistry;

/// The finished video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputArtifact {
    #[serde(skip)]
    pub data: Vec<u8>,
    /// Mime type of the container actually produced.
    pub mime_type: String,
    pub approximate_size_bytes: u64,
}

impl OutputArtifact {
    /// File extension for the container, e.g. `webm`.
    pub fn file_extension(&self) -> &'static str {
        let (container, _) = parse_mime_type(&self.mime_type);
        match container.as_str() {
            "video/webm" | "audio/webm" => "webm",
            "video/mp4" => "mp4",
            "video/x-matroska" => "mkv",
            "video/ogg" => "ogv",
            _ => "bin",
        }
    }

    /// Write the artifact to `path`, creating parent directories.
    pub async fn save(&self, path: impl AsRef<Path>) -> LapseResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &self.data).await?;
        tracing::info!(
            path = %path.display(),
            size_bytes = self.approximate_size_bytes,
            "Artifact saved"
        );
        Ok(())
    }
}

/// Accumulates recorder chunks in arrival order.
#[derive(Debug, Default)]
pub struct OutputAssembler {
    chunks: Vec<Vec<u8>>,
    total_bytes: usize,
}

impl OutputAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Empty chunks are ignored.
    pub fn push(&mut self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        self.total_bytes += chunk.len();
        tracing::trace!(bytes = chunk.len(), total = self.total_bytes, "Chunk received");
        self.chunks.push(chunk);
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Concatenate every chunk into the final artifact.
    pub fn finalize(self, mime_type: &str) -> LapseResult<OutputArtifact> {
        if self.total_bytes == 0 {
            return Err(LapseError::encoding_with_codec(
                EncodingStage::Finalizing,
                mime_type,
                "Recorder produced no data",
            ));
        }
        let chunks = self.chunks.len();
        let data = self.chunks.concat();
        tracing::info!(chunks, size_bytes = data.len(), mime_type, "Artifact assembled");
        Ok(OutputArtifact {
            approximate_size_bytes: data.len() as u64,
            data,
            mime_type: mime_type.to_string(),
        })
    }
}

/// Everything a session must release before it returns.
///
/// [`SessionResources::reclaim`] runs at most once; `Drop` runs it as a
/// backstop so an early return or panic cannot leak handles.
#[derive(Debug)]
pub struct SessionResources {
    pub registry: HandleRegistry,
    pub audio: Option<AudioGraph>,
    tracks: Vec<TrackHandle>,
    reclaimed: bool,
}

impl SessionResources {
    pub fn new(registry: HandleRegistry) -> Self {
        Self {
            registry,
            audio: None,
            tracks: Vec::new(),
            reclaimed: false,
        }
    }

    /// Take responsibility for stopping these tracks.
    pub fn track(&mut self, handles: impl IntoIterator<Item = TrackHandle>) {
        self.tracks.extend(handles);
    }

    pub fn is_reclaimed(&self) -> bool {
        self.reclaimed
    }

    /// Revoke object URLs, stop and close the audio graph, and stop every
    /// track. Returns `false` if already reclaimed.
    pub fn reclaim(&mut self) -> bool {
        if self.reclaimed {
            return false;
        }
        self.reclaimed = true;

        let urls = self.registry.release_all();
        let had_audio = self.audio.is_some();
        if let Some(graph) = self.audio.as_mut() {
            graph.close();
        }
        let stopped = self.tracks.iter().filter(|t| t.stop()).count();

        tracing::debug!(urls, had_audio, tracks_stopped = stopped, "Session resources reclaimed");
        true
    }
}

impl Drop for SessionResources {
    fn drop(&mut self) {
        self.reclaim();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use lapse_media_core::fetch::{Blob, MemoryObjectUrls, ObjectUrlStore};
    use lapse_media_core::stream::{TrackKind, VideoTrack};

    #[test]
    fn chunks_concatenate_in_arrival_order() {
        let mut assembler = OutputAssembler::new();
        assembler.push(b"ab".to_vec());
        assembler.push(Vec::new());
        assembler.push(b"cd".to_vec());
        assert_eq!(assembler.chunk_count(), 2);

        let artifact = assembler.finalize("video/webm;codecs=vp9,opus").unwrap();
        assert_eq!(artifact.data, b"abcd");
        assert_eq!(artifact.approximate_size_bytes, 4);
        assert_eq!(artifact.mime_type, "video/webm;codecs=vp9,opus");
        assert_eq!(artifact.file_extension(), "webm");
    }

    #[test]
    fn empty_output_is_an_error() {
        let err = OutputAssembler::new().finalize("video/webm").unwrap_err();
        assert!(matches!(
            err,
            LapseError::Encoding {
                stage: EncodingStage::Finalizing,
                ..
            }
        ));
    }

    #[test]
    fn reclaim_runs_once_and_covers_everything() {
        let store = Arc::new(MemoryObjectUrls::new());
        let mut registry = HandleRegistry::new(store.clone());
        registry.register(Blob::new(vec![1], None));

        let (_sink, video) = VideoTrack::channel(2, 2, 1);
        let handle = video.handle().clone();
        assert_eq!(handle.kind(), TrackKind::Video);

        let mut resources = SessionResources::new(registry);
        resources.track([handle.clone()]);
        assert!(!resources.is_reclaimed());

        assert!(resources.reclaim());
        assert!(resources.is_reclaimed());
        assert!(!resources.reclaim());
        assert_eq!(store.outstanding(), 0);
        assert!(!handle.is_live());
    }

    #[test]
    fn drop_reclaims_partial_sessions() {
        let store = Arc::new(MemoryObjectUrls::new());
        {
            let mut registry = HandleRegistry::new(store.clone());
            registry.register(Blob::new(vec![1], None));
            let _resources = SessionResources::new(registry);
        }
        assert_eq!(store.outstanding(), 0);
    }

    #[tokio::test]
    async fn save_writes_bytes_and_creates_directories() {
        let dir = std::env::temp_dir().join(format!("lapse-save-{}", std::process::id()));
        let path = dir.join("nested").join("out.webm");
        let artifact = OutputArtifact {
            data: vec![0x1a, 0x45, 0xdf, 0xa3],
            mime_type: "video/webm".into(),
            approximate_size_bytes: 4,
        };
        artifact.save(&path).await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), artifact.data);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
