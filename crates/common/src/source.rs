//! Trait seams between the decode engine, the pipeline and the renderer.
//!
//! The async producer and the player are generic over [`FrameSource`] so
//! tests can drive the full pipeline with scripted sources; the GPU
//! hand-off sits behind [`FrameSink`] for the same reason. Collaborators
//! are injected at construction, never reached through globals.

use crate::error::{DecodeError, HandoffError};
use crate::frame::DecodedFrame;
use crate::types::StreamInfo;

/// A sequential supplier of decoded video frames.
pub trait FrameSource {
    /// Decode and return the next frame in presentation order.
    ///
    /// `Ok(None)` is end of stream; every later call must return the same.
    /// Transient "need more input" states are absorbed internally and never
    /// surface here. `copy_to_cpu` forces the copy path even when the
    /// backend could hand off a GPU surface.
    fn decode_next(&mut self, copy_to_cpu: bool) -> Result<Option<DecodedFrame>, DecodeError>;

    /// Reposition demuxing to the keyframe at or before `seconds` and reset
    /// decoder state so the next `decode_next` reads forward from there.
    fn seek_to(&mut self, seconds: f64) -> Result<(), DecodeError>;

    fn stream_info(&self) -> StreamInfo;

    /// Whether this source can produce zero-copy GPU surfaces at all.
    fn prefers_zero_copy(&self) -> bool {
        false
    }
}

/// Receiver for frames the playback clock has selected for display.
pub trait FrameSink {
    /// Make `frame` the displayed image. For GPU frames this performs the
    /// semaphore wait and view recreation; failure must leave the
    /// previously presented image intact.
    fn present(&mut self, frame: &DecodedFrame) -> Result<(), HandoffError>;
}
