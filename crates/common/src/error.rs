//! Error types shared across Lapse crates.

use std::fmt;

/// Stage of the capture encoder at which an encoding failure surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingStage {
    /// No candidate in the codec chain was supported.
    CodecNegotiation,
    /// The recorder or its input stream could not be constructed.
    RecorderConstruction,
    /// The recorder reported an error while frames were being captured.
    Recording,
    /// The recorder failed while flushing its final chunks.
    Finalizing,
}

impl fmt::Display for EncodingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CodecNegotiation => "codec negotiation",
            Self::RecorderConstruction => "recorder construction",
            Self::Recording => "recording",
            Self::Finalizing => "finalizing",
        };
        f.write_str(label)
    }
}

/// Top-level error type for Lapse operations.
#[derive(Debug, thiserror::Error)]
pub enum LapseError {
    #[error("At least 2 frames are required to generate a video, got {count}")]
    InsufficientFrames { count: usize },

    #[error(
        "Video generation is not supported on this platform ({message}); \
         submit the frames to the server-side transcoder instead"
    )]
    UnsupportedPlatform {
        message: String,
        missing: Vec<String>,
    },

    #[error("Failed to load frame {index} ({url}): {reason}")]
    AssetLoad {
        index: usize,
        url: String,
        reason: String,
    },

    #[error("Encoding failed during {stage}: {message}")]
    Encoding {
        stage: EncodingStage,
        codec: Option<String>,
        message: String,
    },

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Audio error: {message}")]
    Audio { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using LapseError.
pub type LapseResult<T> = Result<T, LapseError>;

impl LapseError {
    pub fn insufficient_frames(count: usize) -> Self {
        Self::InsufficientFrames { count }
    }

    pub fn unsupported(msg: impl Into<String>, missing: Vec<String>) -> Self {
        Self::UnsupportedPlatform {
            message: msg.into(),
            missing,
        }
    }

    pub fn asset_load(index: usize, url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AssetLoad {
            index,
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn encoding(stage: EncodingStage, msg: impl Into<String>) -> Self {
        Self::Encoding {
            stage,
            codec: None,
            message: msg.into(),
        }
    }

    pub fn encoding_with_codec(
        stage: EncodingStage,
        codec: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Encoding {
            stage,
            codec: Some(codec.into()),
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn fetch(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: msg.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Index of the failing frame, when this error names one.
    pub fn frame_index(&self) -> Option<usize> {
        match self {
            Self::AssetLoad { index, .. } => Some(*index),
            _ => None,
        }
    }
}
