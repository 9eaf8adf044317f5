//! Fixed-interval draw loop over the drawing surface.
//!
//! The scheduler is an explicit state machine advanced one draw at a time by
//! [`FrameScheduler::step`]. [`FrameScheduler::run`] paces those steps with
//! an injected [`Timer`], so tests drive it on virtual time.

use std::time::Duration;

use lapse_common::clock::Timer;
use lapse_media_core::geometry::FitRect;
use lapse_media_core::stream::FrameSink;
use lapse_media_core::surface::{Canvas, DecodedImage, Rgba, BACKGROUND};

/// Highest frame rate the scheduler will pace.
pub const MAX_FRAME_RATE: u32 = 1000;

/// Frame rate for `frame_count` frames spread over `duration_secs`:
/// `max(1, round(n / d))`, capped at [`MAX_FRAME_RATE`].
pub fn derive_frame_rate(frame_count: usize, duration_secs: f64) -> u32 {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return 1;
    }
    let fps = (frame_count as f64 / duration_secs).round();
    if fps >= f64::from(MAX_FRAME_RATE) {
        MAX_FRAME_RATE
    } else {
        (fps as u32).max(1)
    }
}

/// Time between draws at `frame_rate`, i.e. `1000 / fps` milliseconds.
pub fn frame_interval(frame_rate: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / u64::from(frame_rate.max(1)))
}

/// Where the scheduler is in its draw loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    /// The frame at `next` is drawn on the following step.
    Drawing { next: usize },
    /// Every frame is drawn; waiting out the trailing interval.
    Draining,
    Complete,
}

/// Outcome of a single [`FrameScheduler::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchedulerStep {
    Drew {
        index: usize,
        timestamp: Duration,
        rect: FitRect,
    },
    Drained,
    Complete,
}

/// Draws each image once, in order, full-bleed and centered.
#[derive(Debug)]
pub struct FrameScheduler {
    images: Vec<DecodedImage>,
    frame_rate: u32,
    interval: Duration,
    background: Rgba<u8>,
    state: SchedulerState,
}

impl FrameScheduler {
    pub fn new(images: Vec<DecodedImage>, frame_rate: u32) -> Self {
        Self {
            images,
            frame_rate,
            interval: frame_interval(frame_rate),
            background: BACKGROUND,
            state: SchedulerState::Idle,
        }
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn frame_count(&self) -> usize {
        self.images.len()
    }

    /// Play duration of the drawn frames, `n * interval`.
    pub fn effective_duration(&self) -> Duration {
        self.interval * self.images.len() as u32
    }

    /// Advance by one step.
    ///
    /// In `Drawing` this paints the next image and requests a capture of
    /// the surface, stamped with its nominal presentation time.
    pub fn step(&mut self, canvas: &mut Canvas, sink: &FrameSink) -> SchedulerStep {
        match self.state {
            SchedulerState::Idle if self.images.is_empty() => {
                self.state = SchedulerState::Draining;
                self.step(canvas, sink)
            }
            SchedulerState::Idle => {
                self.state = SchedulerState::Drawing { next: 0 };
                self.step(canvas, sink)
            }
            SchedulerState::Drawing { next: index } => {
                let rect = canvas.draw_fitted(&self.images[index], self.background);
                let timestamp = self.interval * index as u32;
                if !sink.request_frame(canvas, timestamp) {
                    tracing::warn!(index, "Capture track is not accepting frames");
                }
                tracing::trace!(index, ts_ms = timestamp.as_millis() as u64, "Frame drawn");
                self.state = if index + 1 < self.images.len() {
                    SchedulerState::Drawing { next: index + 1 }
                } else {
                    SchedulerState::Draining
                };
                SchedulerStep::Drew {
                    index,
                    timestamp,
                    rect,
                }
            }
            SchedulerState::Draining => {
                self.state = SchedulerState::Complete;
                SchedulerStep::Drained
            }
            SchedulerState::Complete => SchedulerStep::Complete,
        }
    }

    /// Run the loop to completion.
    ///
    /// Sleeps one interval after each draw and one extra interval after the
    /// last, so the final frame is captured before completion is signalled.
    /// `on_frame` receives the number of frames drawn so far.
    pub async fn run(
        &mut self,
        canvas: &mut Canvas,
        sink: &FrameSink,
        timer: &dyn Timer,
        mut on_frame: impl FnMut(usize) + Send,
    ) {
        tracing::debug!(
            frames = self.images.len(),
            fps = self.frame_rate,
            interval_ms = self.interval.as_secs_f64() * 1000.0,
            "Frame scheduler started"
        );
        loop {
            match self.step(canvas, sink) {
                SchedulerStep::Drew { index, .. } => {
                    on_frame(index + 1);
                    timer.sleep(self.interval).await;
                }
                SchedulerStep::Drained => {
                    timer.sleep(self.interval).await;
                }
                SchedulerStep::Complete => break,
            }
        }
        tracing::debug!("Frame scheduler complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapse_common::clock::VirtualTimer;
    use lapse_media_core::stream::VideoTrack;
    use proptest::prelude::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    #[test]
    fn frame_rate_rounds_and_floors_at_one() {
        assert_eq!(derive_frame_rate(30, 10.0), 3);
        assert_eq!(derive_frame_rate(25, 10.0), 3);
        assert_eq!(derive_frame_rate(24, 10.0), 2);
        assert_eq!(derive_frame_rate(2, 60.0), 1);
        assert_eq!(derive_frame_rate(2, 0.0), 1);
    }

    #[test]
    fn tiny_durations_cap_the_rate_and_keep_time_moving() {
        assert_eq!(derive_frame_rate(2, 1e-12), MAX_FRAME_RATE);
        assert_eq!(derive_frame_rate(5000, 1.0), MAX_FRAME_RATE);
        assert_eq!(frame_interval(derive_frame_rate(2, 1e-12)), Duration::from_millis(1));
    }

    #[test]
    fn interval_is_thousand_over_fps() {
        assert_eq!(frame_interval(4), Duration::from_millis(250));
        assert_eq!(frame_interval(1), Duration::from_secs(1));
    }

    #[test]
    fn steps_walk_every_state() {
        let images = vec![DecodedImage::solid(4, 2, RED); 2];
        let mut scheduler = FrameScheduler::new(images, 2);
        let mut canvas = Canvas::new(4, 4);
        let (sink, _track) = VideoTrack::channel(4, 4, 2);

        assert_eq!(scheduler.state(), SchedulerState::Idle);
        let first = scheduler.step(&mut canvas, &sink);
        assert!(matches!(first, SchedulerStep::Drew { index: 0, timestamp, .. } if timestamp.is_zero()));
        assert_eq!(scheduler.state(), SchedulerState::Drawing { next: 1 });
        assert!(matches!(
            scheduler.step(&mut canvas, &sink),
            SchedulerStep::Drew { index: 1, .. }
        ));
        assert_eq!(scheduler.step(&mut canvas, &sink), SchedulerStep::Drained);
        assert_eq!(scheduler.step(&mut canvas, &sink), SchedulerStep::Complete);
        assert_eq!(scheduler.state(), SchedulerState::Complete);
    }

    #[tokio::test]
    async fn run_captures_every_frame_then_waits_one_interval() {
        let images = vec![DecodedImage::solid(8, 8, RED); 5];
        let mut scheduler = FrameScheduler::new(images, 5);
        let mut canvas = Canvas::new(8, 8);
        let (sink, mut track) = VideoTrack::channel(8, 8, 5);
        let timer = VirtualTimer::new();

        let mut drawn = Vec::new();
        scheduler
            .run(&mut canvas, &sink, &timer, |n| drawn.push(n))
            .await;
        sink.handle().stop();

        assert_eq!(drawn, vec![1, 2, 3, 4, 5]);
        // Five draw intervals plus the trailing one.
        assert_eq!(timer.now(), Duration::from_millis(1200));

        let mut stamps = Vec::new();
        while let Some(frame) = track.next_frame().await {
            stamps.push(frame.timestamp.as_millis());
        }
        assert_eq!(stamps, vec![0, 200, 400, 600, 800]);
    }

    #[test]
    fn effective_duration_matches_request_when_rate_divides_evenly() {
        // 40 frames over 8s: 5 fps, 200ms apart.
        let images = vec![DecodedImage::solid(1, 1, RED); 40];
        let scheduler = FrameScheduler::new(images, derive_frame_rate(40, 8.0));
        assert_eq!(scheduler.effective_duration(), Duration::from_secs(8));
    }

    proptest! {
        #[test]
        fn derived_rate_matches_formula(n in 2usize..5000, d in 0.05f64..3600.0) {
            let fps = derive_frame_rate(n, d);
            let expected = ((n as f64 / d).round() as u32).clamp(1, MAX_FRAME_RATE);
            prop_assert_eq!(fps, expected);
            prop_assert!(frame_interval(fps) > Duration::ZERO);
        }

        #[test]
        fn integral_rates_play_for_the_requested_duration(fps in 1u32..60, secs in 1u32..120) {
            let n = (fps * secs) as usize;
            let rate = derive_frame_rate(n, f64::from(secs));
            prop_assert_eq!(rate, fps);
            let effective = frame_interval(rate).as_secs_f64() * n as f64;
            // Within one frame interval of the requested duration.
            prop_assert!((effective - f64::from(secs)).abs() <= frame_interval(rate).as_secs_f64());
        }
    }
}
