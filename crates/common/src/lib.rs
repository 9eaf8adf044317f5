//! Lapse Common Utilities
//!
//! Shared infrastructure for all Lapse crates:
//! - Error types and result aliases
//! - Timer abstraction and recording clock for frame pacing
//! - Cancellation tokens for in-flight synthesis sessions
//! - Tracing/logging initialization
//! - Configuration loading

pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use cancel::*;
pub use clock::*;
pub use config::*;
pub use error::*;
