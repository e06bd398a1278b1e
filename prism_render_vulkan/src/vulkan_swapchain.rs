/// Swapchain - Vulkan implementation of the Swapchain trait
///
/// Presentation only: the render core records and submits the commands that
/// draw into the acquired image.

use prism_render::graphics_device::{
    AcquireOutcome, DeviceImage, ImageDesc, ImageViewType, OutputUsage, PresentOutcome,
    Semaphore as DeviceSemaphore, Swapchain as DeviceSwapchain, SwapchainDesc, TextureFormat,
};
use prism_render::prism::Result;
use prism_render::{engine_bail, engine_debug, engine_err, engine_info};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::vk_to_presentation_format;
use crate::vulkan_image::Image;
use crate::vulkan_sync::Semaphore;

/// Owner of the VkSwapchainKHR
///
/// Shared with the swapchain images so the swapchain outlives their views.
pub(crate) struct SwapchainHandle {
    ctx: Arc<GpuContext>,
    swapchain: vk::SwapchainKHR,
}

impl Drop for SwapchainHandle {
    fn drop(&mut self) {
        unsafe {
            self.ctx.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// Vulkan swapchain implementation
pub struct Swapchain {
    ctx: Arc<GpuContext>,
    handle: Arc<SwapchainHandle>,
    images: Vec<Arc<dyn DeviceImage>>,
    format: TextureFormat,
    extent: vk::Extent2D,
}

impl Swapchain {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &SwapchainDesc) -> Result<Self> {
        unsafe {
            let surface_loader = &ctx.surface_loader;

            let capabilities = surface_loader
                .get_physical_device_surface_capabilities(ctx.physical_device, ctx.surface)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to get surface capabilities: {:?}", e))?;
            let surface_formats = surface_loader
                .get_physical_device_surface_formats(ctx.physical_device, ctx.surface)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to query surface formats: {:?}", e))?;
            let present_modes = surface_loader
                .get_physical_device_surface_present_modes(ctx.physical_device, ctx.surface)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to query present modes: {:?}", e))?;

            // Preferred formats first, in order
            let (surface_format, format) = [
                vk::Format::B8G8R8A8_SRGB,
                vk::Format::B8G8R8A8_UNORM,
                vk::Format::R8G8B8A8_UNORM,
            ]
            .iter()
            .find_map(|preferred| {
                surface_formats
                    .iter()
                    .find(|f| f.format == *preferred)
                    .and_then(|f| vk_to_presentation_format(f.format).map(|format| (*f, format)))
            })
            .ok_or_else(|| {
                engine_err!("prism::vulkan", "No supported presentation format among {:?}", surface_formats)
            })?;

            let present_mode = if desc.vertical_sync {
                vk::PresentModeKHR::FIFO
            } else {
                [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
                    .into_iter()
                    .find(|mode| present_modes.contains(mode))
                    .unwrap_or(vk::PresentModeKHR::FIFO)
            };

            // u32::MAX means the surface size follows the swapchain
            let extent = if capabilities.current_extent.width != u32::MAX {
                capabilities.current_extent
            } else {
                vk::Extent2D {
                    width: desc.width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
                    height: desc.height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
                }
            };
            if extent.width == 0 || extent.height == 0 {
                engine_bail!("prism::vulkan", "Cannot create a swapchain of {}x{}", extent.width, extent.height);
            }

            let mut image_count = capabilities.min_image_count + 1;
            if capabilities.max_image_count > 0 {
                image_count = image_count.min(capabilities.max_image_count);
            }

            let queue_families = [ctx.graphics_queue_family, ctx.present_queue_family];
            let mut create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(ctx.surface)
                .min_image_count(image_count)
                .image_format(surface_format.format)
                .image_color_space(surface_format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(present_mode)
                .clipped(true);
            create_info = if ctx.graphics_queue_family != ctx.present_queue_family {
                create_info
                    .image_sharing_mode(vk::SharingMode::CONCURRENT)
                    .queue_family_indices(&queue_families)
            } else {
                create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            };

            let swapchain = ctx
                .swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create swapchain: {:?}", e))?;
            let handle = Arc::new(SwapchainHandle {
                ctx: Arc::clone(&ctx),
                swapchain,
            });

            let vk_images = ctx
                .swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to get swapchain images: {:?}", e))?;

            let mut images: Vec<Arc<dyn DeviceImage>> = Vec::with_capacity(vk_images.len());
            for (index, vk_image) in vk_images.iter().enumerate() {
                let image_desc = ImageDesc {
                    name: format!("swapchain image {}", index),
                    width: extent.width,
                    height: extent.height,
                    layers: 1,
                    mip_levels: 1,
                    format,
                    view_type: ImageViewType::Type2D,
                    writable: Some(OutputUsage::Graphics),
                };
                images.push(Arc::new(Image::from_swapchain(
                    Arc::clone(&ctx),
                    Arc::clone(&handle),
                    *vk_image,
                    image_desc,
                )?));
            }

            // Presentable images start undefined
            ctx.submit_one_shot(|device, command_buffer| {
                let barriers: Vec<vk::ImageMemoryBarrier> = vk_images
                    .iter()
                    .map(|vk_image| {
                        vk::ImageMemoryBarrier::default()
                            .old_layout(vk::ImageLayout::UNDEFINED)
                            .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                            .image(*vk_image)
                            .subresource_range(vk::ImageSubresourceRange {
                                aspect_mask: vk::ImageAspectFlags::COLOR,
                                base_mip_level: 0,
                                level_count: 1,
                                base_array_layer: 0,
                                layer_count: 1,
                            })
                    })
                    .collect();
                device.cmd_pipeline_barrier(
                    command_buffer,
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &barriers,
                );
            })?;

            engine_info!(
                "prism::vulkan",
                "Swapchain created: {}x{}, {} images, {:?}, {:?}",
                extent.width, extent.height, images.len(), format, present_mode
            );

            Ok(Self {
                ctx,
                handle,
                images,
                format,
                extent,
            })
        }
    }
}

impl DeviceSwapchain for Swapchain {
    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn extent(&self) -> (u32, u32) {
        (self.extent.width, self.extent.height)
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn image(&self, index: usize) -> Option<Arc<dyn DeviceImage>> {
        self.images.get(index).cloned()
    }

    fn acquire_next_image(&mut self, signal: &Arc<dyn DeviceSemaphore>) -> Result<AcquireOutcome> {
        let result = unsafe {
            self.ctx.swapchain_loader.acquire_next_image(
                self.handle.swapchain,
                u64::MAX,
                Semaphore::handle(signal),
                vk::Fence::null(),
            )
        };
        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_debug!("prism::vulkan", "Swapchain out of date on acquire");
                Ok(AcquireOutcome::OutOfDate)
            }
            Err(e) => Err(engine_err!("prism::vulkan", "Failed to acquire swapchain image: {:?}", e)),
        }
    }

    fn present(&mut self, image_index: u32, wait: &Arc<dyn DeviceSemaphore>) -> Result<PresentOutcome> {
        let wait_semaphores = [Semaphore::handle(wait)];
        let swapchains = [self.handle.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = {
            let _queue = self.ctx.lock_queue()?;
            unsafe { self.ctx.swapchain_loader.queue_present(self.ctx.present_queue, &present_info) }
        };
        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(vk::Result::ERROR_FULL_SCREEN_EXCLUSIVE_MODE_LOST_EXT) => Ok(PresentOutcome::FullScreenExclusiveLost),
            Err(e) => Err(engine_err!("prism::vulkan", "Failed to present swapchain image: {:?}", e)),
        }
    }
}
