/// Image capture - reads an image back to the CPU as RGBA8 pixels
///
/// The source is blitted into a temporary RGBA8 image of the requested size,
/// which is then copied into a readback buffer. The source is returned to its
/// resting layout afterwards.

use prism_render::graphics_device::{DeviceImage, TextureFormat};
use prism_render::prism::Result;
use prism_render::{engine_bail, engine_debug, engine_err};
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;

use crate::vulkan_buffer::StagingBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_image::Image;

/// Temporary blit target, destroyed when dropped
struct CaptureTarget {
    ctx: Arc<GpuContext>,
    image: vk::Image,
    allocation: Option<Allocation>,
}

impl CaptureTarget {
    fn new(ctx: Arc<GpuContext>, format: vk::Format, width: u32, height: u32) -> Result<Self> {
        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D { width, height, depth: 1 })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::TRANSFER_SRC)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe {
            ctx.device
                .create_image(&create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create capture image: {:?}", e))?
        };
        let allocation = match ctx.allocate_image_memory("capture", image) {
            Ok(allocation) => allocation,
            Err(error) => {
                unsafe { ctx.device.destroy_image(image, None) };
                return Err(error);
            }
        };
        Ok(Self { ctx, image, allocation: Some(allocation) })
    }
}

impl Drop for CaptureTarget {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
        unsafe {
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}

/// Capture `source` scaled to `width` x `height`, RGBA8 rows from top to bottom
pub(crate) fn capture_image(
    ctx: &Arc<GpuContext>,
    source: &Image,
    width: u32,
    height: u32,
    linear: bool,
) -> Result<Vec<u8>> {
    let desc = source.desc();
    if width == 0 || height == 0 {
        engine_bail!("prism::vulkan", "Cannot capture '{}' at {}x{}", desc.name, width, height);
    }
    if desc.format.is_depth() {
        engine_bail!("prism::vulkan", "Cannot capture depth image '{}' as RGBA8", desc.name);
    }
    engine_debug!(
        "prism::vulkan",
        "Capturing '{}' ({}x{}) at {}x{}",
        desc.name, desc.width, desc.height, width, height
    );

    // Keep sRGB encoding as is instead of decoding it during the blit
    let target_format = match desc.format {
        TextureFormat::B8G8R8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        _ => vk::Format::R8G8B8A8_UNORM,
    };
    let target = CaptureTarget::new(Arc::clone(ctx), target_format, width, height)?;
    let byte_count = width as u64 * height as u64 * 4;
    let readback = StagingBuffer::readback(Arc::clone(ctx), &desc.name, byte_count)?;

    let color_range = vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    };
    let color_layers = vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level: 0,
        base_array_layer: 0,
        layer_count: 1,
    };
    let target_barrier = |old_layout: vk::ImageLayout,
                          new_layout: vk::ImageLayout,
                          src_access: vk::AccessFlags,
                          dst_access: vk::AccessFlags| {
        vk::ImageMemoryBarrier::default()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(target.image)
            .subresource_range(color_range)
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
    };

    ctx.submit_one_shot(|device, command_buffer| unsafe {
        let to_transfer = [
            source.barrier(
                color_range,
                source.resting_layout,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::AccessFlags::MEMORY_WRITE,
                vk::AccessFlags::TRANSFER_READ,
            ),
            target_barrier(
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::AccessFlags::empty(),
                vk::AccessFlags::TRANSFER_WRITE,
            ),
        ];
        device.cmd_pipeline_barrier(
            command_buffer,
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::PipelineStageFlags::TRANSFER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &to_transfer,
        );

        let blit = vk::ImageBlit {
            src_subresource: color_layers,
            src_offsets: [
                vk::Offset3D::default(),
                vk::Offset3D { x: desc.width as i32, y: desc.height as i32, z: 1 },
            ],
            dst_subresource: color_layers,
            dst_offsets: [
                vk::Offset3D::default(),
                vk::Offset3D { x: width as i32, y: height as i32, z: 1 },
            ],
        };
        device.cmd_blit_image(
            command_buffer,
            source.image,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            target.image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[blit],
            if linear { vk::Filter::LINEAR } else { vk::Filter::NEAREST },
        );

        let after_blit = [
            source.barrier(
                color_range,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                source.resting_layout,
                vk::AccessFlags::TRANSFER_READ,
                vk::AccessFlags::empty(),
            ),
            target_barrier(
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::TRANSFER_READ,
            ),
        ];
        device.cmd_pipeline_barrier(
            command_buffer,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::TRANSFER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &after_blit,
        );

        let region = vk::BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: color_layers,
            image_offset: vk::Offset3D::default(),
            image_extent: vk::Extent3D { width, height, depth: 1 },
        };
        device.cmd_copy_image_to_buffer(
            command_buffer,
            target.image,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            readback.buffer,
            &[region],
        );
    })?;

    let mapped_ptr = readback.mapped_ptr()?;
    let mut pixels = vec![0u8; byte_count as usize];
    unsafe {
        std::ptr::copy_nonoverlapping(mapped_ptr as *const u8, pixels.as_mut_ptr(), pixels.len());
    }
    Ok(pixels)
}
