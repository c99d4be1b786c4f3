//! Supported pixel formats and derived plane layout.
//!
//! The decode engine can emit frames in a handful of YUV layouts. Everything
//! downstream (CPU buffer packing, Vulkan plane views) works off a single
//! [`FrameFormat`] snapshot derived here, recomputed whenever the stream
//! reports a new pixel format or new dimensions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DecodeError;
use crate::types::Resolution;

/// YUV pixel formats the playback core accepts from the decoder.
///
/// Semi-planar formats carry interleaved chroma in a single plane; `Nv21`
/// stores it V-first and is handled by swapping samplers, not by repacking.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Nv12,
    Nv21,
    /// 10-bit semi-planar, samples in the top bits of 16-bit words.
    P010,
    /// 16-bit semi-planar.
    P016,
    Yuv420p,
    Yuv422p,
    Yuv444p,
    Yuv420p10,
    Yuv422p10,
    Yuv444p10,
}

impl PixelFormat {
    /// Log2 chroma subsampling shifts (horizontal, vertical).
    pub fn chroma_shift(self) -> (u32, u32) {
        match self {
            Self::Nv12 | Self::Nv21 | Self::P010 | Self::P016 | Self::Yuv420p | Self::Yuv420p10 => {
                (1, 1)
            }
            Self::Yuv422p | Self::Yuv422p10 => (1, 0),
            Self::Yuv444p | Self::Yuv444p10 => (0, 0),
        }
    }

    pub fn bit_depth(self) -> u32 {
        match self {
            Self::Nv12 | Self::Nv21 | Self::Yuv420p | Self::Yuv422p | Self::Yuv444p => 8,
            Self::P010 | Self::Yuv420p10 | Self::Yuv422p10 | Self::Yuv444p10 => 10,
            Self::P016 => 16,
        }
    }

    /// Interleaved-chroma formats (single UV plane).
    pub fn is_semi_planar(self) -> bool {
        matches!(self, Self::Nv12 | Self::Nv21 | Self::P010 | Self::P016)
    }

    /// True when chroma is stored V-first and sampling must swap channels.
    pub fn swaps_uv(self) -> bool {
        matches!(self, Self::Nv21)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Plane layout derived from a pixel format and frame dimensions.
///
/// All sizes are for tightly packed buffers (no row padding); the decoder
/// copies stride-aware into this layout.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameFormat {
    pub pixel_format: PixelFormat,
    pub resolution: Resolution,
    /// Horizontal chroma divisor (`1 << log2_shift`).
    pub chroma_div_x: u32,
    /// Vertical chroma divisor.
    pub chroma_div_y: u32,
    pub chroma_width: u32,
    pub chroma_height: u32,
    pub bit_depth: u32,
    /// 1 for 8-bit, 2 for anything deeper.
    pub bytes_per_component: u32,
    pub swap_uv: bool,
    pub semi_planar: bool,
    /// Packed luma plane size in bytes.
    pub y_plane_bytes: usize,
    /// Packed size of one chroma plane; for semi-planar formats this is the
    /// single interleaved UV plane.
    pub uv_plane_bytes: usize,
    /// Total packed frame size.
    pub buffer_size: usize,
}

impl FrameFormat {
    /// Compute the plane layout for a pixel format at the given dimensions.
    pub fn for_pixel_format(
        pixel_format: PixelFormat,
        resolution: Resolution,
    ) -> Result<Self, DecodeError> {
        if resolution.width == 0 || resolution.height == 0 {
            return Err(DecodeError::Decode(format!(
                "invalid frame dimensions {resolution}"
            )));
        }

        let (shift_x, shift_y) = pixel_format.chroma_shift();
        let chroma_div_x = 1u32 << shift_x;
        let chroma_div_y = 1u32 << shift_y;
        let chroma_width = resolution.width.div_ceil(chroma_div_x);
        let chroma_height = resolution.height.div_ceil(chroma_div_y);

        let bit_depth = pixel_format.bit_depth();
        let bytes_per_component = if bit_depth > 8 { 2 } else { 1 };
        let semi_planar = pixel_format.is_semi_planar();

        let y_plane_bytes =
            resolution.width as usize * resolution.height as usize * bytes_per_component as usize;
        let chroma_samples = chroma_width as usize * chroma_height as usize;
        let uv_plane_bytes = if semi_planar {
            chroma_samples * 2 * bytes_per_component as usize
        } else {
            chroma_samples * bytes_per_component as usize
        };
        let buffer_size = if semi_planar {
            y_plane_bytes + uv_plane_bytes
        } else {
            y_plane_bytes + uv_plane_bytes * 2
        };

        Ok(Self {
            pixel_format,
            resolution,
            chroma_div_x,
            chroma_div_y,
            chroma_width,
            chroma_height,
            bit_depth,
            bytes_per_component,
            swap_uv: pixel_format.swaps_uv(),
            semi_planar,
            y_plane_bytes,
            uv_plane_bytes,
            buffer_size,
        })
    }

    /// Number of distinct planes in the packed CPU layout.
    pub fn plane_count(&self) -> u32 {
        if self.semi_planar {
            2
        } else {
            3
        }
    }

    /// True when `other` requires recomputing this layout.
    pub fn needs_reconfigure(&self, pixel_format: PixelFormat, resolution: Resolution) -> bool {
        self.pixel_format != pixel_format || self.resolution != resolution
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(p: PixelFormat, w: u32, h: u32) -> FrameFormat {
        FrameFormat::for_pixel_format(p, Resolution::new(w, h)).unwrap()
    }

    // ── Chroma divisors ──────────────────────────────────────────

    #[test]
    fn divisors_420() {
        let f = fmt(PixelFormat::Yuv420p, 1920, 1080);
        assert_eq!((f.chroma_div_x, f.chroma_div_y), (2, 2));
        assert_eq!((f.chroma_width, f.chroma_height), (960, 540));
    }

    #[test]
    fn divisors_422() {
        let f = fmt(PixelFormat::Yuv422p, 1920, 1080);
        assert_eq!((f.chroma_div_x, f.chroma_div_y), (2, 1));
        assert_eq!((f.chroma_width, f.chroma_height), (960, 1080));
    }

    #[test]
    fn divisors_444() {
        let f = fmt(PixelFormat::Yuv444p, 1920, 1080);
        assert_eq!((f.chroma_div_x, f.chroma_div_y), (1, 1));
        assert_eq!((f.chroma_width, f.chroma_height), (1920, 1080));
    }

    #[test]
    fn odd_dimensions_round_up() {
        let f = fmt(PixelFormat::Nv12, 1919, 1079);
        assert_eq!((f.chroma_width, f.chroma_height), (960, 540));
    }

    // ── Buffer sizing ────────────────────────────────────────────

    #[test]
    fn nv12_buffer_size() {
        let f = fmt(PixelFormat::Nv12, 1920, 1080);
        assert_eq!(f.y_plane_bytes, 1920 * 1080);
        assert_eq!(f.uv_plane_bytes, 960 * 540 * 2);
        assert_eq!(f.buffer_size, 1920 * 1080 * 3 / 2);
        assert_eq!(f.plane_count(), 2);
    }

    #[test]
    fn yuv420p_buffer_size() {
        let f = fmt(PixelFormat::Yuv420p, 1920, 1080);
        assert_eq!(f.uv_plane_bytes, 960 * 540);
        assert_eq!(f.buffer_size, 1920 * 1080 * 3 / 2);
        assert_eq!(f.plane_count(), 3);
    }

    #[test]
    fn p010_doubles_component_bytes() {
        let f = fmt(PixelFormat::P010, 1920, 1080);
        assert_eq!(f.bit_depth, 10);
        assert_eq!(f.bytes_per_component, 2);
        assert_eq!(f.y_plane_bytes, 1920 * 1080 * 2);
        assert_eq!(f.buffer_size, 1920 * 1080 * 3);
    }

    #[test]
    fn yuv444p10_buffer_size() {
        let f = fmt(PixelFormat::Yuv444p10, 64, 64);
        assert_eq!(f.y_plane_bytes, 64 * 64 * 2);
        assert_eq!(f.buffer_size, 64 * 64 * 2 * 3);
    }

    // ── Flags & reconfiguration ──────────────────────────────────

    #[test]
    fn nv21_swaps_uv() {
        assert!(fmt(PixelFormat::Nv21, 64, 64).swap_uv);
        assert!(!fmt(PixelFormat::Nv12, 64, 64).swap_uv);
    }

    #[test]
    fn reconfigure_detection() {
        let f = fmt(PixelFormat::Nv12, 1920, 1080);
        assert!(!f.needs_reconfigure(PixelFormat::Nv12, Resolution::new(1920, 1080)));
        assert!(f.needs_reconfigure(PixelFormat::Yuv420p, Resolution::new(1920, 1080)));
        assert!(f.needs_reconfigure(PixelFormat::Nv12, Resolution::new(1280, 720)));
    }

    #[test]
    fn zero_dimensions_rejected() {
        assert!(FrameFormat::for_pixel_format(PixelFormat::Nv12, Resolution::new(0, 1080)).is_err());
        assert!(FrameFormat::for_pixel_format(PixelFormat::Nv12, Resolution::new(1920, 0)).is_err());
    }
}
