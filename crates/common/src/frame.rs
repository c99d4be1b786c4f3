//! Decoded frames and the GPU surface handle bundle.
//!
//! A [`DecodedFrame`] crosses the producer/consumer boundary exactly once.
//! Zero-copy frames reference decoder-owned Vulkan images through a
//! [`VulkanSurface`]; copy-path frames carry a tightly packed CPU buffer.
//! Surfaces are plain handle bundles in fixed arrays, cheap to copy and
//! valid only as long as the decode session that produced them.

use ash::vk;
use std::fmt;

use crate::format::FrameFormat;
use crate::types::{Resolution, TimeCode};

/// Luma plane plus at most one (interleaved) chroma plane.
pub const MAX_SURFACE_PLANES: usize = 2;

/// Per-plane Vulkan handles for a hardware-decoded frame.
///
/// All bookkeeping lives in fixed arrays indexed by plane; a surface with
/// `planes == 1` leaves index 1 at its null/default value.
#[derive(Copy, Clone)]
pub struct VulkanSurface {
    /// Number of populated planes (1 or 2).
    pub planes: u32,
    pub images: [vk::Image; MAX_SURFACE_PLANES],
    pub layouts: [vk::ImageLayout; MAX_SURFACE_PLANES],
    /// Timeline semaphores guarding decoder writes, null when absent.
    pub semaphores: [vk::Semaphore; MAX_SURFACE_PLANES],
    pub semaphore_values: [u64; MAX_SURFACE_PLANES],
    /// Queue family that last owned each plane image.
    pub queue_families: [u32; MAX_SURFACE_PLANES],
    pub plane_formats: [vk::Format; MAX_SURFACE_PLANES],
    pub resolution: Resolution,
}

impl Default for VulkanSurface {
    fn default() -> Self {
        Self {
            planes: 0,
            images: [vk::Image::null(); MAX_SURFACE_PLANES],
            layouts: [vk::ImageLayout::UNDEFINED; MAX_SURFACE_PLANES],
            semaphores: [vk::Semaphore::null(); MAX_SURFACE_PLANES],
            semaphore_values: [0; MAX_SURFACE_PLANES],
            queue_families: [vk::QUEUE_FAMILY_IGNORED; MAX_SURFACE_PLANES],
            plane_formats: [vk::Format::UNDEFINED; MAX_SURFACE_PLANES],
            resolution: Resolution::default(),
        }
    }
}

impl VulkanSurface {
    /// A surface is usable when its plane count is in range and every
    /// declared plane carries a non-null image.
    pub fn validate(&self) -> bool {
        if self.planes == 0 || self.planes as usize > MAX_SURFACE_PLANES {
            return false;
        }
        (0..self.planes as usize).all(|i| self.images[i] != vk::Image::null())
    }
}

impl fmt::Debug for VulkanSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanSurface")
            .field("planes", &self.planes)
            .field("resolution", &self.resolution)
            .field("valid", &self.validate())
            .field("plane_formats", &&self.plane_formats[..self.planes.min(2) as usize])
            .finish()
    }
}

/// Where a decoded frame's pixels live.
#[derive(Debug)]
pub enum FramePayload {
    /// Tightly packed planes per the frame's [`FrameFormat`].
    Cpu(Vec<u8>),
    /// Decoder-owned Vulkan images, handed off without copying.
    Gpu(VulkanSurface),
}

/// A single decoded video frame with its presentation timestamp.
#[derive(Debug)]
pub struct DecodedFrame {
    pub pts_seconds: f64,
    pub format: FrameFormat,
    pub payload: FramePayload,
}

impl DecodedFrame {
    /// Microsecond PTS for exact seek-boundary comparisons.
    pub fn pts_micros(&self) -> i64 {
        TimeCode::from_secs(self.pts_seconds).as_micros()
    }

    pub fn gpu_surface(&self) -> Option<&VulkanSurface> {
        match &self.payload {
            FramePayload::Gpu(surface) => Some(surface),
            FramePayload::Cpu(_) => None,
        }
    }

    /// True when the frame carries a usable zero-copy surface.
    pub fn has_valid_surface(&self) -> bool {
        self.gpu_surface().is_some_and(VulkanSurface::validate)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
