//! Progress reporting for generation sessions.

use serde::Serialize;

use crate::session::SessionState;

/// Progress callback invoked on every state transition and drawn frame.
pub type ProgressCallback = Box<dyn Fn(GenerationProgress) + Send + Sync>;

/// Generation progress report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationProgress {
    /// Current session state.
    pub stage: SessionState,

    /// Frames drawn onto the surface so far.
    pub frames_drawn: usize,

    /// Total frames in the request.
    pub total_frames: usize,

    /// Overall progress in `[0.0, 1.0]`.
    pub progress: f64,
}

impl GenerationProgress {
    pub fn new(stage: SessionState, frames_drawn: usize, total_frames: usize) -> Self {
        let progress = match stage {
            SessionState::Completed => 1.0,
            _ if total_frames == 0 => 0.0,
            _ => (frames_drawn as f64 / total_frames as f64).clamp(0.0, 1.0),
        };
        Self {
            stage,
            frames_drawn,
            total_frames,
            progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_tracks_drawn_frames() {
        let p = GenerationProgress::new(SessionState::Recording, 3, 12);
        assert!((p.progress - 0.25).abs() < 1e-9);
        assert_eq!(GenerationProgress::new(SessionState::Completed, 0, 12).progress, 1.0);
        assert_eq!(GenerationProgress::new(SessionState::Idle, 0, 0).progress, 0.0);
    }
}
