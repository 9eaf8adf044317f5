//! Clock and timing utilities for frame pacing and stream alignment.
//!
//! Every session paces its draws through a [`Timer`] so the same scheduling
//! code runs against the wall clock in production and against a
//! [`VirtualTimer`] in tests. This module provides:
//! - The timer abstraction and its tokio/virtual implementations
//! - A recording clock anchored to the moment recording started
//! - Drift measurement between the audio and video start instants

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source of monotonic time and timed suspension.
#[async_trait::async_trait]
pub trait Timer: Send + Sync + fmt::Debug {
    /// Monotonic time since the timer was created.
    fn now(&self) -> Duration;

    /// Suspend the calling task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock timer backed by the tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioTimer {
    origin: tokio::time::Instant,
}

impl TokioTimer {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Timer for TokioTimer {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Deterministic timer whose clock only moves when someone sleeps on it.
///
/// `sleep` advances the virtual clock by the requested amount and yields to
/// the runtime once, so tasks waiting on produced frames get to run.
#[derive(Debug, Default)]
pub struct VirtualTimer {
    now_ns: AtomicU64,
}

impl VirtualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward without suspending.
    pub fn advance(&self, duration: Duration) {
        self.now_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Timer for VirtualTimer {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.now_ns.load(Ordering::SeqCst))
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

/// A recording clock that provides timestamps relative to a fixed epoch
/// (the moment the recorder started).
#[derive(Clone)]
pub struct RecordingClock {
    timer: Arc<dyn Timer>,

    /// Timer reading at the epoch.
    epoch: Duration,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl fmt::Debug for RecordingClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingClock")
            .field("epoch", &self.epoch)
            .field("epoch_wall", &self.epoch_wall)
            .finish()
    }
}

impl RecordingClock {
    /// Create a new recording clock anchored to the timer's current reading.
    pub fn start(timer: Arc<dyn Timer>) -> Self {
        let epoch = timer.now();
        Self {
            timer,
            epoch,
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Time elapsed since the epoch.
    pub fn elapsed(&self) -> Duration {
        self.timer.now().saturating_sub(self.epoch)
    }

    /// Nanoseconds elapsed since the epoch.
    pub fn elapsed_ns(&self) -> u64 {
        self.elapsed().as_nanos() as u64
    }

    /// Seconds elapsed since the epoch.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }

    /// Wall-clock time at the epoch.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// Drift measurement between two streams.
#[derive(Debug, Clone, Copy)]
pub struct DriftMeasurement {
    /// Timestamp in the reference stream (ns).
    pub reference_ns: u64,
    /// Timestamp in the measured stream (ns).
    pub measured_ns: u64,
}

impl DriftMeasurement {
    /// Drift in nanoseconds (positive = measured is ahead).
    pub fn drift_ns(&self) -> i64 {
        self.measured_ns as i64 - self.reference_ns as i64
    }

    /// Drift in milliseconds.
    pub fn drift_ms(&self) -> f64 {
        self.drift_ns() as f64 / 1_000_000.0
    }

    /// Whether drift exceeds an acceptable threshold.
    pub fn exceeds_threshold_ms(&self, threshold_ms: f64) -> bool {
        self.drift_ms().abs() > threshold_ms
    }
}
