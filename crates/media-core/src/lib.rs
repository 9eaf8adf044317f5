//! Lapse media core contracts.
//!
//! This crate contains the capability interfaces the synthesis pipeline is
//! written against, without coupling to a concrete media runtime:
//!
//! - **Surface:** an RGBA drawing canvas and the factory that constructs it
//! - **Streams:** video/audio tracks and the combined stream a recorder consumes
//! - **Recorder:** streaming encoder that emits container chunks as events
//! - **Loading:** fetcher, object URLs, image/audio decoders
//! - **Platform:** the bundle of capabilities plus the capability probe
//!
//! Native and test implementations satisfy the same traits.

pub mod audio;
pub mod capture;
pub mod fetch;
pub mod geometry;
pub mod platform;
pub mod recorder;
pub mod stream;
pub mod surface;

pub use audio::*;
pub use capture::*;
pub use fetch::*;
pub use geometry::*;
pub use platform::*;
pub use recorder::*;
pub use stream::*;
pub use surface::*;
