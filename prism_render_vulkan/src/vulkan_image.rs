/// Image - Vulkan implementation of the DeviceImage trait
///
/// Every image rests in a single layout between submissions: render passes,
/// copies and captures transition away from it and back. Sampled and
/// attachment images rest in SHADER_READ_ONLY_OPTIMAL, compute outputs in
/// GENERAL and swapchain images in PRESENT_SRC_KHR.

use prism_render::graphics_device::{DeviceImage, ImageDesc, ImageViewType, OutputUsage};
use prism_render::prism::Result;
use prism_render::{engine_bail, engine_err};
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;

use crate::vulkan_buffer::StagingBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{aspect_of, texture_format_to_vk, view_type_to_vk};
use crate::vulkan_swapchain::SwapchainHandle;

/// Who owns the VkImage
enum ImageOwner {
    /// Created by the device, memory owned here
    Allocated(Option<Allocation>),
    /// Presentable image owned by a swapchain
    Swapchain(#[allow(dead_code)] Arc<SwapchainHandle>),
}

/// Vulkan image implementation
pub struct Image {
    ctx: Arc<GpuContext>,
    /// Vulkan image
    pub(crate) image: vk::Image,
    /// View over every layer and mip (2D, 2D array or cube)
    pub(crate) view: vk::ImageView,
    /// Single-layer 2D views used as framebuffer attachments (render outputs only)
    pub(crate) layer_views: Vec<vk::ImageView>,
    /// Layout the image is left in between submissions
    pub(crate) resting_layout: vk::ImageLayout,
    pub(crate) aspect: vk::ImageAspectFlags,
    owner: ImageOwner,
    desc: ImageDesc,
}

impl Image {
    /// Create an image, upload `layers_data` and generate the mip chain
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &ImageDesc, layers_data: &[&[u8]]) -> Result<Self> {
        validate(desc, layers_data)?;

        let format = texture_format_to_vk(desc.format);
        let aspect = aspect_of(desc.format);
        let is_depth = desc.format.is_depth();

        let mut usage = vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::TRANSFER_SRC;
        usage |= match (desc.writable, is_depth) {
            (None, _) => vk::ImageUsageFlags::empty(),
            (Some(OutputUsage::Graphics), false) => vk::ImageUsageFlags::COLOR_ATTACHMENT,
            (Some(OutputUsage::Graphics), true) => vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            (Some(OutputUsage::Compute), _) => vk::ImageUsageFlags::STORAGE,
        };
        let flags = if desc.view_type == ImageViewType::Cube {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        };
        let resting_layout = match desc.writable {
            Some(OutputUsage::Compute) => vk::ImageLayout::GENERAL,
            _ => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };

        let image_create_info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
            .mip_levels(desc.mip_levels)
            .array_layers(desc.layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe {
            ctx.device
                .create_image(&image_create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create image '{}': {:?}", desc.name, e))?
        };
        let allocation = match ctx.allocate_image_memory(&desc.name, image) {
            Ok(allocation) => allocation,
            Err(error) => {
                unsafe { ctx.device.destroy_image(image, None) };
                return Err(error);
            }
        };

        // From here on Drop releases whatever was created
        let mut created = Self {
            ctx,
            image,
            view: vk::ImageView::null(),
            layer_views: Vec::new(),
            resting_layout,
            aspect,
            owner: ImageOwner::Allocated(Some(allocation)),
            desc: desc.clone(),
        };

        created.view = created.create_view(view_type_to_vk(desc.view_type), 0, desc.layers, desc.mip_levels)?;
        if desc.writable.is_some() {
            for layer in 0..desc.layers {
                let view = created.create_view(vk::ImageViewType::TYPE_2D, layer, 1, 1)?;
                created.layer_views.push(view);
            }
        }

        if layers_data.is_empty() {
            created.transition_to_resting()?;
        } else {
            created.upload(layers_data)?;
        }
        Ok(created)
    }

    /// Wrap a presentable image of a swapchain
    pub(crate) fn from_swapchain(
        ctx: Arc<GpuContext>,
        swapchain: Arc<SwapchainHandle>,
        image: vk::Image,
        desc: ImageDesc,
    ) -> Result<Self> {
        let mut created = Self {
            ctx,
            image,
            view: vk::ImageView::null(),
            layer_views: Vec::new(),
            resting_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            aspect: vk::ImageAspectFlags::COLOR,
            owner: ImageOwner::Swapchain(swapchain),
            desc,
        };
        created.view = created.create_view(vk::ImageViewType::TYPE_2D, 0, 1, 1)?;
        created.layer_views.push(created.view);
        Ok(created)
    }

    fn create_view(
        &self,
        view_type: vk::ImageViewType,
        base_layer: u32,
        layer_count: u32,
        level_count: u32,
    ) -> Result<vk::ImageView> {
        let view_create_info = vk::ImageViewCreateInfo::default()
            .image(self.image)
            .view_type(view_type)
            .format(texture_format_to_vk(self.desc.format))
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.aspect,
                base_mip_level: 0,
                level_count,
                base_array_layer: base_layer,
                layer_count,
            });
        unsafe {
            self.ctx
                .device
                .create_image_view(&view_create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create view of image '{}': {:?}", self.desc.name, e))
        }
    }

    /// Subresource range covering every layer and mip
    pub(crate) fn full_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect,
            base_mip_level: 0,
            level_count: self.desc.mip_levels,
            base_array_layer: 0,
            layer_count: self.desc.layers,
        }
    }

    /// Layout a shader samples the image in
    pub(crate) fn sampled_layout(&self) -> vk::ImageLayout {
        self.resting_layout
    }

    /// Layout barrier between two layouts over a subresource range
    pub(crate) fn barrier(
        &self,
        range: vk::ImageSubresourceRange,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
        src_access: vk::AccessFlags,
        dst_access: vk::AccessFlags,
    ) -> vk::ImageMemoryBarrier<'static> {
        vk::ImageMemoryBarrier::default()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(range)
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
    }

    /// First transition of an image created without data
    fn transition_to_resting(&self) -> Result<()> {
        let barrier = self.barrier(
            self.full_range(),
            vk::ImageLayout::UNDEFINED,
            self.resting_layout,
            vk::AccessFlags::empty(),
            vk::AccessFlags::SHADER_READ,
        );
        self.ctx.submit_one_shot(|device, command_buffer| unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        })
    }

    /// Upload one slice per layer into mip 0, then fill the other mips with linear blits
    fn upload(&self, layers_data: &[&[u8]]) -> Result<()> {
        let data: Vec<u8> = layers_data.concat();
        let staging = StagingBuffer::new(Arc::clone(&self.ctx), &self.desc.name, &data)?;
        let layer_size = layers_data[0].len() as u64;
        let (width, height) = (self.desc.width, self.desc.height);
        let mip_levels = self.desc.mip_levels;
        let layers = self.desc.layers;
        let aspect = self.aspect;

        let regions: Vec<vk::BufferImageCopy> = (0..layers)
            .map(|layer| {
                vk::BufferImageCopy::default()
                    .buffer_offset(layer as u64 * layer_size)
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: aspect,
                        mip_level: 0,
                        base_array_layer: layer,
                        layer_count: 1,
                    })
                    .image_extent(vk::Extent3D { width, height, depth: 1 })
            })
            .collect();

        let mip_range = |mip: u32| vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: mip,
            level_count: 1,
            base_array_layer: 0,
            layer_count: layers,
        };
        let to_transfer = self.barrier(
            self.full_range(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
        );

        self.ctx.submit_one_shot(|device, command_buffer| unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer],
            );
            device.cmd_copy_buffer_to_image(
                command_buffer,
                staging.buffer,
                self.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &regions,
            );

            // Each level is blitted from the previous one, which is then done
            for mip in 1..mip_levels {
                let src_mip = mip - 1;
                let to_src = self.barrier(
                    mip_range(src_mip),
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    vk::AccessFlags::TRANSFER_WRITE,
                    vk::AccessFlags::TRANSFER_READ,
                );
                device.cmd_pipeline_barrier(
                    command_buffer,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_src],
                );

                let blit = vk::ImageBlit::default()
                    .src_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: aspect,
                        mip_level: src_mip,
                        base_array_layer: 0,
                        layer_count: layers,
                    })
                    .src_offsets([
                        vk::Offset3D { x: 0, y: 0, z: 0 },
                        vk::Offset3D { x: mip_extent(width, src_mip), y: mip_extent(height, src_mip), z: 1 },
                    ])
                    .dst_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: aspect,
                        mip_level: mip,
                        base_array_layer: 0,
                        layer_count: layers,
                    })
                    .dst_offsets([
                        vk::Offset3D { x: 0, y: 0, z: 0 },
                        vk::Offset3D { x: mip_extent(width, mip), y: mip_extent(height, mip), z: 1 },
                    ]);
                device.cmd_blit_image(
                    command_buffer,
                    self.image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    self.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[blit],
                    vk::Filter::LINEAR,
                );

                let src_done = self.barrier(
                    mip_range(src_mip),
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    self.resting_layout,
                    vk::AccessFlags::TRANSFER_READ,
                    vk::AccessFlags::SHADER_READ,
                );
                device.cmd_pipeline_barrier(
                    command_buffer,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::ALL_COMMANDS,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[src_done],
                );
            }

            let last_done = self.barrier(
                mip_range(mip_levels - 1),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                self.resting_layout,
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::SHADER_READ,
            );
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[last_done],
            );
        })
    }
}

/// Size of a mip level along one axis
pub(crate) fn mip_extent(size: u32, mip: u32) -> i32 {
    (size >> mip).max(1) as i32
}

fn validate(desc: &ImageDesc, layers_data: &[&[u8]]) -> Result<()> {
    if desc.width == 0 || desc.height == 0 || desc.layers == 0 || desc.mip_levels == 0 {
        engine_bail!(
            "prism::vulkan",
            "Image '{}' has an empty extent ({}x{}, {} layers, {} mips)",
            desc.name, desc.width, desc.height, desc.layers, desc.mip_levels
        );
    }
    if desc.view_type == ImageViewType::Cube && desc.layers != 6 {
        engine_bail!("prism::vulkan", "Cube image '{}' needs 6 layers, got {}", desc.name, desc.layers);
    }
    if layers_data.is_empty() {
        return Ok(());
    }
    if layers_data.len() != desc.layers as usize {
        engine_bail!(
            "prism::vulkan",
            "Image '{}' has {} layers but {} data slices were given",
            desc.name, desc.layers, layers_data.len()
        );
    }
    let layer_size = desc.width as usize * desc.height as usize * desc.format.bytes_per_pixel() as usize;
    if let Some((layer, data)) = layers_data.iter().enumerate().find(|(_, data)| data.len() != layer_size) {
        engine_bail!(
            "prism::vulkan",
            "Layer {} of image '{}' has {} bytes, expected {}",
            layer, desc.name, data.len(), layer_size
        );
    }
    Ok(())
}

impl DeviceImage for Image {
    fn desc(&self) -> &ImageDesc {
        &self.desc
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            for view in self.layer_views.drain(..) {
                if view != self.view {
                    self.ctx.device.destroy_image_view(view, None);
                }
            }
            if self.view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.view, None);
            }
            if let ImageOwner::Allocated(allocation) = &mut self.owner {
                if let Some(allocation) = allocation.take() {
                    self.ctx.free(allocation);
                }
                self.ctx.device.destroy_image(self.image, None);
            }
        }
    }
}
