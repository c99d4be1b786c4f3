//! Error taxonomy for the playback core (thiserror-based).
//!
//! End of stream is deliberately absent: it is `Ok(None)` from the decode
//! side and a stopped queue on the playback side, never an error. Transient
//! decoder "feed me more input" conditions are absorbed inside the decode
//! session and never reach these types.

use thiserror::Error;

/// Decode-side errors (open, demux, decode, seek).
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to open input: {0}")]
    Open(String),

    #[error("No video stream found")]
    NoVideoStream,

    #[error("No decoder available for the video codec")]
    CodecUnavailable,

    /// Hardware device setup failed. Recoverable: the session falls back to
    /// software decoding and keeps the reason for diagnostics.
    #[error("Hardware decode init failed: {reason}")]
    HardwareInit { reason: String },

    #[error("Unsupported pixel format: {format}")]
    UnsupportedFormat { format: String },

    /// Mid-stream hard failure (corrupt data, missing hw frame descriptor).
    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Seek failed: {0}")]
    Seek(String),
}

/// GPU hand-off errors on the consumer side.
#[derive(Error, Debug)]
pub enum HandoffError {
    /// Surface failed validation (plane count / null image handles).
    #[error("Invalid GPU surface: {0}")]
    InvalidSurface(String),

    #[error("Semaphore wait failed: {0:?}")]
    SemaphoreWait(ash::vk::Result),

    #[error("Image view creation failed: {0:?}")]
    ViewCreation(ash::vk::Result),

    #[error("Sampler creation failed: {0:?}")]
    SamplerCreation(ash::vk::Result),

    #[error("Device idle wait failed: {0:?}")]
    DeviceIdle(ash::vk::Result),
}

/// Top-level player errors.
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Hand-off error: {0}")]
    Handoff(#[from] HandoffError),

    #[error("Failed to spawn decode thread: {0}")]
    ThreadSpawn(std::io::Error),
}
