//! FFmpeg Vulkan hw-device interop.
//!
//! Imports a caller-owned Vulkan device into an FFmpeg hardware device
//! context so the decoder writes straight into Vulkan images, and extracts
//! per-plane handle bundles from decoded hardware frames.
//!
//! The `AVVulkanDeviceContext`/`AVVkFrame` struct mirrors below are
//! hand-declared against `libavutil/hwcontext_vulkan.h` (FFmpeg 7.1):
//! `ffmpeg-sys-next` only generates those bindings when the system FFmpeg
//! headers were built with Vulkan enabled, which cannot be assumed. On an
//! FFmpeg build without Vulkan support `av_hwdevice_ctx_alloc` returns
//! null and everything here degrades to a `HardwareInit` error.

use std::ffi::{c_char, c_int, c_void};

use ash::vk;
use ffmpeg_next::ffi;
use tracing::debug;

use kino_common::{DecodeError, FrameFormat, PixelFormat, Resolution, VulkanSurface};

/// Caller-supplied Vulkan handles shared with the decode engine.
///
/// The device must outlive every session created from it. The video queue
/// family is optional; without one FFmpeg is restricted to the families
/// listed here and hardware init may fail on drivers that expose decoding
/// on a dedicated family only.
#[derive(Copy, Clone, Debug)]
pub struct VulkanInteropContext {
    pub instance: vk::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: vk::Device,
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub video_queue: Option<vk::Queue>,
    pub video_queue_family: Option<u32>,
}

// ── libavutil/hwcontext_vulkan.h mirrors (FFmpeg 7.1) ────────────────

pub(crate) const AV_NUM_DATA_POINTERS: usize = 8;

/// Mirror of `AVVulkanDeviceQueueFamily`.
#[repr(C)]
#[derive(Copy, Clone)]
pub(crate) struct AvVulkanDeviceQueueFamily {
    pub idx: c_int,
    pub num: c_int,
    /// `VkQueueFlagBits`.
    pub flags: c_int,
    /// `VkVideoCodecOperationFlagBitsKHR`.
    pub video_caps: c_int,
}

/// Mirror of `AVVulkanDeviceContext` (the `hwctx` payload of a
/// `AVHWDeviceContext` with type `AV_HWDEVICE_TYPE_VULKAN`).
#[repr(C)]
pub(crate) struct AvVulkanDeviceContext {
    pub alloc: *const c_void,
    pub get_proc_addr: Option<unsafe extern "system" fn()>,
    pub inst: vk::Instance,
    pub phys_dev: vk::PhysicalDevice,
    pub act_dev: vk::Device,
    pub device_features: vk::PhysicalDeviceFeatures2<'static>,
    pub enabled_inst_extensions: *const *const c_char,
    pub nb_enabled_inst_extensions: c_int,
    pub enabled_dev_extensions: *const *const c_char,
    pub nb_enabled_dev_extensions: c_int,
    // Deprecated per-purpose queue indices, still part of the ABI.
    pub queue_family_index: c_int,
    pub nb_graphics_queues: c_int,
    pub queue_family_tx_index: c_int,
    pub nb_tx_queues: c_int,
    pub queue_family_comp_index: c_int,
    pub nb_comp_queues: c_int,
    pub queue_family_encode_index: c_int,
    pub nb_encode_queues: c_int,
    pub queue_family_decode_index: c_int,
    pub nb_decode_queues: c_int,
    pub lock_queue: Option<unsafe extern "C" fn(*mut ffi::AVHWDeviceContext, u32, u32)>,
    pub unlock_queue: Option<unsafe extern "C" fn(*mut ffi::AVHWDeviceContext, u32, u32)>,
    pub qf: [AvVulkanDeviceQueueFamily; 64],
    pub nb_qf: c_int,
}

/// Mirror of `AVVkFrame`: one decoded hardware frame, up to one image per
/// data plane, each guarded by a timeline semaphore.
#[repr(C)]
pub(crate) struct AvVkFrame {
    pub img: [vk::Image; AV_NUM_DATA_POINTERS],
    pub tiling: vk::ImageTiling,
    pub mem: [vk::DeviceMemory; AV_NUM_DATA_POINTERS],
    pub size: [usize; AV_NUM_DATA_POINTERS],
    /// `VkMemoryPropertyFlagBits`.
    pub flags: c_int,
    /// `VkAccessFlagBits` per plane.
    pub access: [c_int; AV_NUM_DATA_POINTERS],
    pub layout: [vk::ImageLayout; AV_NUM_DATA_POINTERS],
    pub sem: [vk::Semaphore; AV_NUM_DATA_POINTERS],
    pub sem_value: [u64; AV_NUM_DATA_POINTERS],
    pub internal: *mut c_void,
    pub offset: [isize; AV_NUM_DATA_POINTERS],
    pub queue_family: [u32; AV_NUM_DATA_POINTERS],
}

// ── hw-device context ────────────────────────────────────────────────

/// Owned reference to an FFmpeg Vulkan hardware device context.
pub(crate) struct HwDeviceContext {
    buf: *mut ffi::AVBufferRef,
}

// SAFETY: the buffer ref is only a refcounted handle; FFmpeg guards the
// underlying device context internally and the session serializes access.
unsafe impl Send for HwDeviceContext {}

impl HwDeviceContext {
    /// Build a hw-device context around the caller's Vulkan device.
    pub fn new_vulkan(interop: &VulkanInteropContext) -> Result<Self, DecodeError> {
        // SAFETY: FFmpeg allocates the context and its hwctx payload; we
        // fill the payload through the layout mirror before init, exactly
        // as a C caller would, and release the ref on any failure.
        unsafe {
            let mut buf = ffi::av_hwdevice_ctx_alloc(ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_VULKAN);
            if buf.is_null() {
                return Err(DecodeError::HardwareInit {
                    reason: "FFmpeg build has no Vulkan hwdevice support".into(),
                });
            }

            let dev_ctx = (*buf).data as *mut ffi::AVHWDeviceContext;
            let vk_ctx = (*dev_ctx).hwctx as *mut AvVulkanDeviceContext;
            (*vk_ctx).inst = interop.instance;
            (*vk_ctx).phys_dev = interop.physical_device;
            (*vk_ctx).act_dev = interop.device;

            let mut nb_qf = 0usize;
            (*vk_ctx).qf[nb_qf] = AvVulkanDeviceQueueFamily {
                idx: interop.graphics_queue_family as c_int,
                num: 1,
                flags: (vk::QueueFlags::GRAPHICS
                    | vk::QueueFlags::COMPUTE
                    | vk::QueueFlags::TRANSFER)
                    .as_raw() as c_int,
                video_caps: 0,
            };
            nb_qf += 1;
            if let Some(family) = interop.video_queue_family {
                (*vk_ctx).qf[nb_qf] = AvVulkanDeviceQueueFamily {
                    idx: family as c_int,
                    num: 1,
                    flags: vk::QueueFlags::VIDEO_DECODE_KHR.as_raw() as c_int,
                    video_caps: (vk::VideoCodecOperationFlagsKHR::DECODE_H264
                        | vk::VideoCodecOperationFlagsKHR::DECODE_H265)
                        .as_raw() as c_int,
                };
                nb_qf += 1;
            }
            (*vk_ctx).nb_qf = nb_qf as c_int;

            let ret = ffi::av_hwdevice_ctx_init(buf);
            if ret < 0 {
                ffi::av_buffer_unref(&mut buf);
                return Err(DecodeError::HardwareInit {
                    reason: ffmpeg_next::Error::from(ret).to_string(),
                });
            }

            debug!(
                graphics_family = interop.graphics_queue_family,
                video_family = ?interop.video_queue_family,
                "Vulkan hw-device context initialized"
            );
            Ok(Self { buf })
        }
    }

    pub fn as_ptr(&self) -> *mut ffi::AVBufferRef {
        self.buf
    }
}

impl Drop for HwDeviceContext {
    fn drop(&mut self) {
        // SAFETY: buf came from av_hwdevice_ctx_alloc and is non-null.
        unsafe { ffi::av_buffer_unref(&mut self.buf) };
    }
}

// ── get_format selection ─────────────────────────────────────────────

/// Decoder `get_format` callback: pick the Vulkan hardware format when the
/// codec offers it, otherwise the last (software) entry in the list.
pub(crate) unsafe extern "C" fn select_vulkan_format(
    _ctx: *mut ffi::AVCodecContext,
    mut list: *const ffi::AVPixelFormat,
) -> ffi::AVPixelFormat {
    let mut fallback = ffi::AVPixelFormat::AV_PIX_FMT_NONE;
    while !list.is_null() && *list != ffi::AVPixelFormat::AV_PIX_FMT_NONE {
        if *list == ffi::AVPixelFormat::AV_PIX_FMT_VULKAN {
            return ffi::AVPixelFormat::AV_PIX_FMT_VULKAN;
        }
        fallback = *list;
        list = list.add(1);
    }
    fallback
}

// ── surface extraction ───────────────────────────────────────────────

/// Vulkan sampling formats for the luma and chroma planes of a format.
///
/// Mapped locally instead of through `av_vkfmt_from_pixfmt`, which is
/// absent from FFmpeg builds without Vulkan support.
pub fn plane_formats(format: PixelFormat) -> [vk::Format; 2] {
    match format {
        PixelFormat::Nv12 | PixelFormat::Nv21 => [vk::Format::R8_UNORM, vk::Format::R8G8_UNORM],
        PixelFormat::P010 | PixelFormat::P016 => [vk::Format::R16_UNORM, vk::Format::R16G16_UNORM],
        PixelFormat::Yuv420p | PixelFormat::Yuv422p | PixelFormat::Yuv444p => {
            [vk::Format::R8_UNORM, vk::Format::R8_UNORM]
        }
        PixelFormat::Yuv420p10 | PixelFormat::Yuv422p10 | PixelFormat::Yuv444p10 => {
            [vk::Format::R16_UNORM, vk::Format::R16_UNORM]
        }
    }
}

/// Build a [`VulkanSurface`] from a decoded hardware frame.
///
/// Returns `None` when the frame carries no `AVVkFrame` descriptor; the
/// caller treats that as a hard decode failure since the decoder promised
/// a hardware frame.
///
/// # Safety
/// `frame` must point to a valid `AVFrame` in `AV_PIX_FMT_VULKAN` format
/// whose `data[0]` is either null or an `AVVkFrame` owned by a live
/// hw-frames context on the imported device.
pub(crate) unsafe fn surface_from_hw_frame(
    frame: *const ffi::AVFrame,
    format: &FrameFormat,
) -> Option<VulkanSurface> {
    let vkf = (*frame).data[0] as *const AvVkFrame;
    if vkf.is_null() {
        return None;
    }
    let vkf = &*vkf;

    let planes = if vkf.img[1] == vk::Image::null() { 1u32 } else { 2 };
    let mut surface = VulkanSurface {
        planes,
        plane_formats: plane_formats(format.pixel_format),
        resolution: Resolution::new((*frame).width as u32, (*frame).height as u32),
        ..Default::default()
    };
    for plane in 0..planes as usize {
        surface.images[plane] = vkf.img[plane];
        surface.layouts[plane] = vkf.layout[plane];
        surface.semaphores[plane] = vkf.sem[plane];
        surface.semaphore_values[plane] = vkf.sem_value[plane];
        surface.queue_families[plane] = vkf.queue_family[plane];
    }
    Some(surface)
}

// ── Tests ────────────────────────────────────────────────────────────
