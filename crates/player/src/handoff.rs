//! Vulkan frame hand-off on the consumer side.
//!
//! The decoder wrote the frame's planes on its own queue and signalled
//! per-plane timeline semaphores. Before the render pass may sample the
//! images, this module waits those semaphores (no timeout bound: a decode
//! that never completes is a driver fault, not something to paper over),
//! then recreates the sampling views. The previous views are destroyed
//! only after a device idle drain so no in-flight command buffer still
//! references them. A failed wait leaves the old views untouched and the
//! previous frame keeps displaying.

use ash::vk;
use tracing::{debug, warn};

use kino_common::{DecodedFrame, FrameSink, HandoffError, VulkanSurface, MAX_SURFACE_PLANES};

/// Chroma channel order is fixed at view creation instead of in a shader
/// branch: V-first formats sample through a swizzled view.
fn chroma_swizzle(swap_uv: bool) -> vk::ComponentMapping {
    if swap_uv {
        vk::ComponentMapping {
            r: vk::ComponentSwizzle::G,
            g: vk::ComponentSwizzle::R,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        }
    } else {
        vk::ComponentMapping::default()
    }
}

/// Owns the sampling views and sampler for the currently displayed frame.
pub struct VulkanHandoff {
    device: ash::Device,
    sampler: vk::Sampler,
    /// Luma view at index 0, chroma at 1. The chroma slot aliases the luma
    /// view for single-plane surfaces and must not be double-destroyed.
    views: [vk::ImageView; MAX_SURFACE_PLANES],
    /// Consumer-side record of each plane's image layout.
    plane_layouts: [vk::ImageLayout; MAX_SURFACE_PLANES],
    /// Queue family the views are sampled on.
    queue_family: u32,
}

impl VulkanHandoff {
    /// `queue_family` is the render thread's queue family, recorded so the
    /// caller can issue ownership transfers when the decoder used another.
    pub fn new(device: ash::Device, queue_family: u32) -> Result<Self, HandoffError> {
        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE);
        // SAFETY: device is a valid loaded device owned by the caller.
        let sampler = unsafe { device.create_sampler(&sampler_info, None) }
            .map_err(HandoffError::SamplerCreation)?;
        Ok(Self {
            device,
            sampler,
            views: [vk::ImageView::null(); MAX_SURFACE_PLANES],
            plane_layouts: [vk::ImageLayout::UNDEFINED; MAX_SURFACE_PLANES],
            queue_family,
        })
    }

    pub fn luma_view(&self) -> Option<vk::ImageView> {
        (self.views[0] != vk::ImageView::null()).then_some(self.views[0])
    }

    pub fn chroma_view(&self) -> Option<vk::ImageView> {
        (self.views[1] != vk::ImageView::null()).then_some(self.views[1])
    }

    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    pub fn plane_layouts(&self) -> [vk::ImageLayout; MAX_SURFACE_PLANES] {
        self.plane_layouts
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Block until every semaphore the decoder attached has signalled.
    /// Surfaces without semaphores are trivially ready.
    fn wait_decode_complete(&self, surface: &VulkanSurface) -> Result<(), HandoffError> {
        let mut semaphores = Vec::with_capacity(MAX_SURFACE_PLANES);
        let mut values = Vec::with_capacity(MAX_SURFACE_PLANES);
        for plane in 0..surface.planes as usize {
            if surface.semaphores[plane] != vk::Semaphore::null() {
                semaphores.push(surface.semaphores[plane]);
                values.push(surface.semaphore_values[plane]);
            }
        }
        if semaphores.is_empty() {
            return Ok(());
        }
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);
        // SAFETY: timeline semaphores owned by the decoder's device, which
        // is the same device this hand-off was created with.
        unsafe { self.device.wait_semaphores(&wait_info, u64::MAX) }
            .map_err(HandoffError::SemaphoreWait)
    }

    fn destroy_views(&mut self) {
        let alias = self.views[1] == self.views[0];
        for (plane, view) in self.views.iter_mut().enumerate() {
            if *view != vk::ImageView::null() && !(plane == 1 && alias) {
                // SAFETY: the device was idled by the caller; nothing in
                // flight references this view.
                unsafe { self.device.destroy_image_view(*view, None) };
            }
            *view = vk::ImageView::null();
        }
    }

    fn create_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        components: vk::ComponentMapping,
    ) -> Result<vk::ImageView, HandoffError> {
        let info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(components)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );
        // SAFETY: image is a live decoder image; the create info uses a
        // single-mip single-layer color range valid for all plane images.
        unsafe { self.device.create_image_view(&info, None) }
            .map_err(HandoffError::ViewCreation)
    }
}

impl FrameSink for VulkanHandoff {
    fn present(&mut self, frame: &DecodedFrame) -> Result<(), HandoffError> {
        let Some(surface) = frame.gpu_surface() else {
            // CPU frames are uploaded by the caller. Views left over from
            // earlier GPU frames reference decoder images that may have
            // been recycled since, so a downgrade to the copy path must
            // release them.
            if self.views[0] != vk::ImageView::null() {
                // SAFETY: drains all queues before the destroy.
                unsafe { self.device.device_wait_idle() }.map_err(HandoffError::DeviceIdle)?;
                self.destroy_views();
                self.plane_layouts = [vk::ImageLayout::UNDEFINED; MAX_SURFACE_PLANES];
            }
            return Ok(());
        };
        if !surface.validate() {
            return Err(HandoffError::InvalidSurface(format!(
                "{} plane(s) with null image handle",
                surface.planes
            )));
        }

        // Old views survive any failure up to here.
        self.wait_decode_complete(surface)?;

        // SAFETY: drains all queues so the old views can be destroyed and
        // the new images bound without racing in-flight work.
        unsafe { self.device.device_wait_idle() }.map_err(HandoffError::DeviceIdle)?;
        self.destroy_views();

        let luma = self.create_view(
            surface.images[0],
            surface.plane_formats[0],
            vk::ComponentMapping::default(),
        )?;
        let chroma = if surface.planes > 1 {
            match self.create_view(
                surface.images[1],
                surface.plane_formats[1],
                chroma_swizzle(frame.format.swap_uv),
            ) {
                Ok(view) => view,
                Err(e) => {
                    // SAFETY: luma was just created and is unreferenced.
                    unsafe { self.device.destroy_image_view(luma, None) };
                    return Err(e);
                }
            }
        } else {
            // Single-plane surface: sample chroma from the luma image.
            luma
        };

        self.views = [luma, chroma];
        self.plane_layouts = surface.layouts;
        debug!(
            pts = frame.pts_seconds,
            planes = surface.planes,
            "bound frame views"
        );
        Ok(())
    }
}

impl Drop for VulkanHandoff {
    fn drop(&mut self) {
        // SAFETY: idling first keeps the destroys ordered after any render
        // work still sampling the views.
        unsafe {
            if self.device.device_wait_idle().is_err() {
                warn!("device idle wait failed during hand-off teardown");
            }
        }
        self.destroy_views();
        if self.sampler != vk::Sampler::null() {
            // SAFETY: sampler was created in new() on the same device.
            unsafe { self.device.destroy_sampler(self.sampler, None) };
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chroma_swizzle_swaps_rg_for_v_first() {
        let swizzled = chroma_swizzle(true);
        assert_eq!(swizzled.r, vk::ComponentSwizzle::G);
        assert_eq!(swizzled.g, vk::ComponentSwizzle::R);
        let identity = chroma_swizzle(false);
        assert_eq!(identity.r, vk::ComponentSwizzle::IDENTITY);
    }
}
