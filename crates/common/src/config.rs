//! Tuning knobs and decoder options.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which decode backend a session should use.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// CPU decoding; frames always take the copy path.
    Software,
    /// Vulkan hardware decoding with zero-copy surface hand-off.
    #[default]
    Vulkan,
}

/// Options fixed at decode session construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecoderOptions {
    pub backend: BackendKind,
    /// Ask for zero-copy surfaces; the producer downgrades permanently if a
    /// frame arrives without a usable one.
    pub prefer_zero_copy: bool,
    /// Decoder thread count; `None` uses the available parallelism.
    pub threads: Option<usize>,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            backend: BackendKind::Vulkan,
            prefer_zero_copy: true,
            threads: None,
        }
    }
}

/// Playback pacing parameters.
///
/// The defaults are load-bearing: 50 ms is the lag past a frame's target
/// wall time before catch-up dropping starts, 1 ms is how early a frame may
/// display ahead of its target, 12 frames bounds decoder memory.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct PlaybackTuning {
    /// Lag beyond a frame's target time that triggers catch-up dropping.
    #[serde(with = "duration_millis")]
    pub late_threshold: Duration,
    /// How far ahead of its target a frame may be shown.
    #[serde(with = "duration_millis")]
    pub display_tolerance: Duration,
    /// Capacity of the decoded frame queue.
    pub max_buffered_frames: usize,
}

impl Default for PlaybackTuning {
    fn default() -> Self {
        Self {
            late_threshold: Duration::from_millis(50),
            display_tolerance: Duration::from_millis(1),
            max_buffered_frames: 12,
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuning_defaults_unchanged() {
        let t = PlaybackTuning::default();
        assert_eq!(t.late_threshold, Duration::from_millis(50));
        assert_eq!(t.display_tolerance, Duration::from_millis(1));
        assert_eq!(t.max_buffered_frames, 12);
    }

    #[test]
    fn decoder_defaults() {
        let o = DecoderOptions::default();
        assert_eq!(o.backend, BackendKind::Vulkan);
        assert!(o.prefer_zero_copy);
        assert!(o.threads.is_none());
    }
}
