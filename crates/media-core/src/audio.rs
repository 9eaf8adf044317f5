//! Decoded audio buffers and the decoder contract.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use lapse_common::error::LapseResult;

/// Fully decoded PCM, interleaved `f32` samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Arc<Vec<f32>>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: Arc::new(samples),
            sample_rate,
            channels,
        }
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / usize::from(self.channels)
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }
}

/// Decodes compressed audio bytes into PCM.
#[async_trait::async_trait]
pub trait AudioDecoder: Send + Sync + fmt::Debug {
    async fn decode_audio(&self, bytes: Vec<u8>) -> LapseResult<AudioBuffer>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_counts_frames_not_samples() {
        let buffer = AudioBuffer::new(vec![0.0; 48_000 * 2], 48_000, 2);
        assert_eq!(buffer.frames(), 48_000);
        assert_eq!(buffer.duration(), Duration::from_secs(1));
    }

    #[test]
    fn degenerate_buffers_are_empty() {
        assert!(AudioBuffer::new(vec![], 44_100, 2).is_empty());
        assert_eq!(AudioBuffer::new(vec![0.5; 4], 0, 1).duration(), Duration::ZERO);
        assert_eq!(AudioBuffer::new(vec![0.5; 4], 8000, 0).frames(), 0);
    }
}
