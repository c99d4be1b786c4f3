//! FFmpeg-backed decode engine with Vulkan zero-copy output.
//!
//! # Architecture
//!
//! A [`DecodeSession`] owns the demuxer and the opened video decoder for a
//! single file. Frames come out through `decode_next` in presentation
//! order, either as packed CPU buffers or, when the Vulkan backend is
//! active and the caller did not force the copy path, as
//! [`kino_common::VulkanSurface`] handle bundles referencing the decoder's
//! own images (no readback, no staging copy).
//!
//! The backend is a strategy fixed at construction: requesting Vulkan
//! imports the caller's device into an FFmpeg hw-device context; if that
//! fails the session still opens, decodes in software, and records the
//! failure reason for diagnostics.

pub mod session;
pub mod vulkan;

pub use session::DecodeSession;
pub use vulkan::VulkanInteropContext;
