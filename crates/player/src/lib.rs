//! Playback pipeline: bounded frame queue, async decode producer, pacing
//! clock, GPU frame hand-off and the player facade.
//!
//! # Architecture
//!
//! Two lanes share one bounded queue. The producer lane is a single worker
//! thread pulling frames from a [`kino_common::FrameSource`] and pushing
//! them with blocking backpressure; the consumer lane is the caller's
//! render thread, which only ever uses non-blocking pops inside
//! [`VideoPlayer::advance_playback`]. Cancellation is cooperative through
//! polled atomic flags; nothing in the consumer lane can block on the
//! producer.
//!
//! ## Module Overview
//!
//! - [`frame_queue`] — the bounded FIFO between the lanes.
//! - [`producer`] — decode worker with seek-drop filtering and the
//!   permanent zero-copy downgrade.
//! - [`clock`] — wall-anchored pacing decisions (due / not yet / late).
//! - [`handoff`] — Vulkan semaphore waits and sampling-view recreation.
//! - [`player`] — the facade tying it all together (advance, seek, pause).

pub mod clock;
pub mod frame_queue;
pub mod handoff;
pub mod player;
pub mod producer;

pub use clock::{FrameDecision, PlaybackClock};
pub use frame_queue::{BoundedQueue, FrameQueue};
pub use handoff::VulkanHandoff;
pub use player::VideoPlayer;
pub use producer::DecodeProducer;

/// Player driving the FFmpeg-backed decode session.
pub type VulkanVideoPlayer = VideoPlayer<kino_decoder::DecodeSession>;
