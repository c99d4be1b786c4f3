//! Core value types with newtype pattern for type safety.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::format::PixelFormat;

/// Exact rational number (time bases, frame rates).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Zero denominators collapse to 0.0 rather than dividing by zero.
    pub fn as_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }

    pub fn is_zero(self) -> bool {
        self.num == 0 || self.den == 0
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Video frame dimensions in pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Time code in seconds (f64 precision).
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct TimeCode(pub f64);

impl TimeCode {
    pub const ZERO: Self = Self(0.0);

    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    pub fn as_secs(self) -> f64 {
        self.0
    }

    /// Microsecond representation used for exact seek-boundary comparisons.
    pub fn as_micros(self) -> i64 {
        (self.0 * 1_000_000.0).round() as i64
    }
}

impl fmt::Display for TimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}

/// Metadata snapshot for an opened video stream.
///
/// Captured when a decode session opens and refreshed if the stream
/// reconfigures mid-playback (resolution or pixel format change).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StreamInfo {
    pub resolution: Resolution,
    /// Frames per second used for pacing and PTS fallback. Streams that do
    /// not report a rate are treated as 30 fps.
    pub frame_rate: f64,
    /// Container duration in seconds, 0.0 when unknown.
    pub duration_seconds: f64,
    pub pixel_format: PixelFormat,
}

impl StreamInfo {
    pub fn width(&self) -> u32 {
        self.resolution.width
    }

    pub fn height(&self) -> u32 {
        self.resolution.height
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_to_f64() {
        assert_eq!(Rational::new(30000, 1001).as_f64(), 30000.0 / 1001.0);
        assert_eq!(Rational::new(1, 0).as_f64(), 0.0);
        assert!(Rational::new(0, 25).is_zero());
        assert!(Rational::new(25, 0).is_zero());
        assert!(!Rational::new(25, 1).is_zero());
    }

    #[test]
    fn timecode_micros_rounds() {
        assert_eq!(TimeCode(1.5).as_micros(), 1_500_000);
        assert_eq!(TimeCode(0.0).as_micros(), 0);
        // 33.3667 ms frame boundary must not truncate down.
        assert_eq!(TimeCode(0.033_366_7).as_micros(), 33_367);
    }

    #[test]
    fn resolution_display() {
        assert_eq!(Resolution::new(1920, 1080).to_string(), "1920x1080");
        assert_eq!(Resolution::new(3840, 2160).pixel_count(), 8_294_400);
    }
}
