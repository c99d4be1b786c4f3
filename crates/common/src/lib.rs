//! Shared types for the Kino playback core.
//!
//! # Module Overview
//!
//! - [`types`] — small value types (`Rational`, `Resolution`, `TimeCode`)
//!   and the per-stream metadata snapshot.
//! - [`format`] — supported pixel formats and the derived plane layout
//!   (`FrameFormat`) used for CPU buffer packing and view creation.
//! - [`frame`] — decoded frames and the Vulkan surface handle bundle that
//!   crosses the producer/consumer boundary.
//! - [`error`] — thiserror-based error taxonomy for decode, hand-off and
//!   player concerns.
//! - [`config`] — serde-backed tuning and decoder options.
//! - [`source`] — the `FrameSource`/`FrameSink` trait seams between the
//!   decode engine, the playback pipeline and the renderer.

pub mod config;
pub mod error;
pub mod format;
pub mod frame;
pub mod source;
pub mod types;

pub use config::{BackendKind, DecoderOptions, PlaybackTuning};
pub use error::{DecodeError, HandoffError, PlayerError};
pub use format::{FrameFormat, PixelFormat};
pub use frame::{DecodedFrame, FramePayload, VulkanSurface, MAX_SURFACE_PLANES};
pub use source::{FrameSink, FrameSource};
pub use types::{Rational, Resolution, StreamInfo, TimeCode};
