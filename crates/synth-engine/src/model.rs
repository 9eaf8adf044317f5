//! Input model for a generation request.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use lapse_common::error::{LapseError, LapseResult};

/// Minimum number of frames a video can be generated from.
pub const MIN_FRAMES: usize = 2;

/// Default music gain.
pub const DEFAULT_MUSIC_VOLUME: f32 = 0.5;

/// One frame of the timelapse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    pub url: String,
    /// Caller-supplied position. Frames are drawn in ascending order.
    pub order: u32,
}

/// An ordered set of at least [`MIN_FRAMES`] frames.
///
/// Construction validates the count and that `order` strictly ascends; the
/// set is never reordered afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameSet {
    frames: Vec<FrameDescriptor>,
}

impl FrameSet {
    pub fn new(frames: Vec<FrameDescriptor>) -> LapseResult<Self> {
        if frames.len() < MIN_FRAMES {
            return Err(LapseError::insufficient_frames(frames.len()));
        }
        if let Some(pair) = frames.windows(2).find(|w| w[0].order >= w[1].order) {
            return Err(LapseError::invalid_input(format!(
                "Frame order must strictly ascend, found {} followed by {}",
                pair[0].order, pair[1].order
            )));
        }
        Ok(Self { frames })
    }

    /// Build a set from URLs, numbering them in the given order.
    pub fn from_urls<I, S>(urls: I) -> LapseResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let frames = urls
            .into_iter()
            .enumerate()
            .map(|(i, url)| FrameDescriptor {
                url: url.into(),
                order: i as u32,
            })
            .collect();
        Self::new(frames)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false; a frame set holds at least two frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FrameDescriptor> {
        self.frames.iter()
    }

    pub fn urls(&self) -> Vec<String> {
        self.frames.iter().map(|f| f.url.clone()).collect()
    }
}

/// Background music settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMixOptions {
    pub url: Option<String>,
    /// Gain in `[0, 1]`.
    pub volume: f32,
}

impl Default for AudioMixOptions {
    fn default() -> Self {
        Self {
            url: None,
            volume: DEFAULT_MUSIC_VOLUME,
        }
    }
}

impl AudioMixOptions {
    /// Volume clamped to `[0, 1]`; non-finite values fall back to the default.
    pub fn effective_volume(&self) -> f32 {
        if self.volume.is_finite() {
            self.volume.clamp(0.0, 1.0)
        } else {
            DEFAULT_MUSIC_VOLUME
        }
    }
}

/// Caller-facing tuning. Frame rate and bitrates are derived internally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOptions {
    pub music_url: Option<String>,
    pub music_volume: Option<f32>,
}

impl GenerationOptions {
    pub fn audio(&self) -> AudioMixOptions {
        AudioMixOptions {
            url: self.music_url.clone(),
            volume: self.music_volume.unwrap_or(DEFAULT_MUSIC_VOLUME),
        }
    }
}

/// A validated generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub frames: FrameSet,
    pub duration: Duration,
    pub options: GenerationOptions,
}

impl GenerationRequest {
    /// Validate inputs without performing any I/O.
    ///
    /// The frame count is checked before the duration.
    pub fn new(
        frame_urls: &[String],
        duration_secs: f64,
        options: GenerationOptions,
    ) -> LapseResult<Self> {
        let frames = FrameSet::from_urls(frame_urls.iter().cloned())?;
        let duration = Duration::try_from_secs_f64(duration_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| {
                LapseError::invalid_input(format!(
                    "Duration must be a positive number of seconds, got {duration_secs}"
                ))
            })?;
        Ok(Self {
            frames,
            duration,
            options,
        })
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://cdn.example/{i}.png")).collect()
    }

    #[test]
    fn fewer_than_two_frames_is_rejected() {
        for n in 0..2 {
            let err = GenerationRequest::new(&urls(n), 5.0, GenerationOptions::default())
                .unwrap_err();
            assert!(matches!(err, LapseError::InsufficientFrames { count } if count == n));
        }
    }

    #[test]
    fn frame_count_is_checked_before_duration() {
        let err = GenerationRequest::new(&urls(1), -1.0, GenerationOptions::default())
            .unwrap_err();
        assert!(matches!(err, LapseError::InsufficientFrames { .. }));
    }

    #[test]
    fn non_positive_or_non_finite_duration_is_invalid() {
        for d in [0.0, -3.0, f64::NAN, f64::INFINITY, 1e30, 1e-12] {
            let err = GenerationRequest::new(&urls(3), d, GenerationOptions::default())
                .unwrap_err();
            assert!(matches!(err, LapseError::InvalidInput { .. }), "duration {d}");
        }
    }

    #[test]
    fn frame_order_must_ascend() {
        let frames = vec![
            FrameDescriptor {
                url: "a".into(),
                order: 2,
            },
            FrameDescriptor {
                url: "b".into(),
                order: 2,
            },
        ];
        assert!(matches!(
            FrameSet::new(frames),
            Err(LapseError::InvalidInput { .. })
        ));
    }

    #[test]
    fn from_urls_preserves_caller_order() {
        let set = FrameSet::from_urls(["z", "a", "m"]).unwrap();
        assert_eq!(set.urls(), vec!["z", "a", "m"]);
        assert_eq!(set.iter().map(|f| f.order).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn music_volume_defaults_and_clamps() {
        let opts = GenerationOptions {
            music_url: Some("song.mp3".into()),
            music_volume: None,
        };
        assert_eq!(opts.audio().effective_volume(), 0.5);

        let loud = AudioMixOptions {
            url: None,
            volume: 3.0,
        };
        assert_eq!(loud.effective_volume(), 1.0);
        let nan = AudioMixOptions {
            url: None,
            volume: f32::NAN,
        };
        assert_eq!(nan.effective_volume(), DEFAULT_MUSIC_VOLUME);
    }

    #[test]
    fn options_use_camel_case_on_the_wire() {
        let opts: GenerationOptions =
            serde_json::from_str(r#"{"musicUrl":"a.mp3","musicVolume":0.25}"#).unwrap();
        assert_eq!(opts.music_url.as_deref(), Some("a.mp3"));
        assert_eq!(opts.music_volume, Some(0.25));
    }
}
