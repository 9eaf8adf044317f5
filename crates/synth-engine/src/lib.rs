//! Lapse synthesis engine.
//!
//! Turns an ordered list of still images plus optional background music into
//! one encoded video, driven entirely through the capability traits in
//! `lapse-media-core`.
//!
//! ```text
//!  Dispatcher ── probe ──► UnsupportedPlatform (server-side fallback)
//!      │
//!      ▼
//!  AssetLoader ──► images ──► FrameScheduler ──draws──► Canvas
//!      │                                                 │ capture
//!  AudioMixer ──► AudioGraph ──track──┐                  ▼
//!                                     └──► MediaStream ◄─ VideoTrack
//!                                              │
//!                                        CaptureEncoder (Recorder)
//!                                              │ chunks
//!                                        OutputAssembler ──► OutputArtifact
//! ```
//!
//! Resources created along the way (object URLs, the audio graph, tracks)
//! are owned by a session's `SessionResources` and released exactly once on
//! every exit path.

pub mod assembler;
pub mod assets;
pub mod audio;
pub mod dispatcher;
pub mod encoder;
pub mod model;
pub mod progress;
pub mod registry;
pub mod scheduler;
pub mod session;

pub use assembler::{OutputArtifact, OutputAssembler, SessionResources};
pub use assets::{AssetLoader, LoadedAsset};
pub use audio::{AudioGraph, AudioGraphState, AudioMixer};
pub use dispatcher::{generate_video, is_generation_supported, Dispatcher, FallbackRequest};
pub use encoder::{negotiate_codec, CaptureEncoder, CODEC_CHAIN};
pub use model::{
    AudioMixOptions, FrameDescriptor, FrameSet, GenerationOptions, GenerationRequest, MIN_FRAMES,
};
pub use progress::{GenerationProgress, ProgressCallback};
pub use registry::HandleRegistry;
pub use scheduler::{
    derive_frame_rate, frame_interval, FrameScheduler, SchedulerState, SchedulerStep, MAX_FRAME_RATE,
};
pub use session::{RecordingSession, SessionState};
