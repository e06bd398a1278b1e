/// Sampler - Vulkan implementation of the Sampler trait
///
/// Samplers are shared through the graphics context's sampler cache, so the
/// backend only creates one per distinct descriptor.

use prism_render::graphics_device::{Sampler as DeviceSampler, SamplerDesc};
use prism_render::prism::Result;
use prism_render::engine_err;
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{address_mode_to_vk, filter_to_vk};

/// Vulkan sampler implementation
pub struct Sampler {
    ctx: Arc<GpuContext>,
    pub(crate) sampler: vk::Sampler,
}

impl Sampler {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &SamplerDesc) -> Result<Self> {
        let (filter, mipmap_mode) = filter_to_vk(desc.filter);
        let address = address_mode_to_vk(desc.address_mode);

        let mut create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter)
            .min_filter(filter)
            .mipmap_mode(mipmap_mode)
            .address_mode_u(address)
            .address_mode_v(address)
            .address_mode_w(address)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(desc.mip_levels.max(1) as f32)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .unnormalized_coordinates(false);

        // Clamped to the device limit, disabled when the feature is missing
        if desc.max_anisotropy > 0 && ctx.sampler_anisotropy_enabled {
            create_info = create_info
                .anisotropy_enable(true)
                .max_anisotropy((desc.max_anisotropy as f32).min(ctx.max_sampler_anisotropy));
        } else {
            create_info = create_info.anisotropy_enable(false).max_anisotropy(1.0);
        }

        let sampler = unsafe {
            ctx.device
                .create_sampler(&create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create sampler {:?}: {:?}", desc, e))?
        };
        Ok(Self { ctx, sampler })
    }
}

impl DeviceSampler for Sampler {}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_sampler(self.sampler, None);
        }
    }
}
