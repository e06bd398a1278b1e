/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait

use prism_render::graphics_device::{
    Buffer as DeviceBuffer, BufferDesc, CommandList as DeviceCommandList,
    DescriptorSet as DeviceDescriptorSet, DescriptorSetDesc, DeviceImage, DevicePipeline,
    Fence as DeviceFence, Framebuffer as DeviceFramebuffer, FramebufferDesc, GraphicsDevice,
    ImageDesc, PipelineDesc, RenderPass as DeviceRenderPass, RenderPassDesc,
    Sampler as DeviceSampler, SamplerDesc, Semaphore as DeviceSemaphore, Shader as DeviceShader,
    ShaderDesc, SubmitInfo, Swapchain as DeviceSwapchain, SwapchainDesc, TextureFormat,
};
use prism_render::prism::{Error, RenderConfig, Result};
use prism_render::{engine_error, engine_err, engine_info, engine_warn};
use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{CStr, CString};
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_capture::capture_image;
use crate::vulkan_command_list::CommandList;
use crate::vulkan_context::{GpuContext, GpuContextDesc};
use crate::vulkan_descriptor_set::DescriptorSet;
use crate::vulkan_format::{pipeline_stages_to_vk, texture_format_to_vk};
use crate::vulkan_frame_buffer::Framebuffer;
use crate::vulkan_image::Image;
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_render_pass::RenderPass;
use crate::vulkan_sampler::Sampler;
use crate::vulkan_shader::Shader;
use crate::vulkan_swapchain::Swapchain;
use crate::vulkan_sync::{Fence, Semaphore};

/// Log an initialization failure and build the matching error
fn init_failed(message: String) -> Error {
    engine_error!("prism::vulkan", "{}", message);
    Error::InitializationFailed(message)
}

/// Physical device chosen for rendering, with its queue families
struct SelectedDevice {
    physical_device: vk::PhysicalDevice,
    graphics_family: u32,
    present_family: u32,
    name: String,
}

/// Vulkan device implementation
///
/// Central object for creating resources and submitting commands.
/// Every resource keeps the shared GpuContext alive, so the device, the
/// surface and the instance are destroyed after the last resource.
pub struct VulkanGraphicsDevice {
    ctx: Arc<GpuContext>,
}

impl VulkanGraphicsDevice {
    /// Create a new Vulkan device presenting to `window`
    ///
    /// # Arguments
    ///
    /// * `window` - Window for surface creation
    /// * `config` - Render configuration (application name and version, validation)
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &RenderConfig) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| init_failed(format!("Failed to load Vulkan library: {:?}", e)))?;

            // Application Info
            let app_name = CString::new(config.app_name.as_str())
                .map_err(|e| init_failed(format!("Invalid application name: {}", e)))?;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(
                    0,
                    config.app_version.0,
                    config.app_version.1,
                    config.app_version.2,
                ))
                .engine_name(c"Prism")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            // Required extensions
            let display_handle = window
                .display_handle()
                .map_err(|e| init_failed(format!("Failed to get display handle: {}", e)))?;
            #[allow(unused_mut)]
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| init_failed(format!("Failed to get required extensions: {}", e)))?
                .to_vec();

            #[cfg(feature = "vulkan-validation")]
            let validation = config.enable_validation;
            #[cfg(not(feature = "vulkan-validation"))]
            let validation = false;
            if config.enable_validation && !validation {
                engine_warn!(
                    "prism::vulkan",
                    "Validation requested but the crate was built without the vulkan-validation feature"
                );
            }

            #[cfg(feature = "vulkan-validation")]
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }
            let layer_names = if validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);
            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_failed(format!("Failed to create instance: {:?}", e)))?;

            #[cfg(feature = "vulkan-validation")]
            let debug_messenger = if validation {
                Some(Self::create_debug_messenger(&entry, &instance)?)
            } else {
                None
            };

            // Surface
            let window_handle = window
                .window_handle()
                .map_err(|e| init_failed(format!("Failed to get window handle: {}", e)))?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| init_failed(format!("Failed to create surface: {:?}", e)))?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let selected = Self::select_physical_device(&instance, &surface_loader, surface)?;
            engine_info!(
                "prism::vulkan",
                "Using GPU '{}' (graphics queue family {}, present queue family {})",
                selected.name, selected.graphics_family, selected.present_family
            );

            // Logical device
            let queue_priorities = [1.0];
            let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
                .queue_family_index(selected.graphics_family)
                .queue_priorities(&queue_priorities)];
            if selected.present_family != selected.graphics_family {
                queue_create_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(selected.present_family)
                        .queue_priorities(&queue_priorities),
                );
            }

            let supported_features = instance.get_physical_device_features(selected.physical_device);
            let limits = instance.get_physical_device_properties(selected.physical_device).limits;
            let sampler_anisotropy_enabled = supported_features.sampler_anisotropy == vk::TRUE;
            let device_features = vk::PhysicalDeviceFeatures::default()
                .sampler_anisotropy(sampler_anisotropy_enabled)
                .geometry_shader(supported_features.geometry_shader == vk::TRUE)
                .fill_mode_non_solid(supported_features.fill_mode_non_solid == vk::TRUE);

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&device_features);
            let device = instance
                .create_device(selected.physical_device, &device_create_info, None)
                .map_err(|e| init_failed(format!("Failed to create device: {:?}", e)))?;

            // GPU allocator
            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device: selected.physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| init_failed(format!("Failed to create allocator: {:?}", e)))?;

            // Upload command pool (TRANSIENT + RESET for reusable one-shot uploads)
            let upload_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(selected.graphics_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let upload_command_pool = device
                .create_command_pool(&upload_pool_create_info, None)
                .map_err(|e| init_failed(format!("Failed to create upload command pool: {:?}", e)))?;

            let ctx = Arc::new(GpuContext::new(GpuContextDesc {
                entry,
                instance,
                physical_device: selected.physical_device,
                device,
                allocator,
                graphics_queue_family: selected.graphics_family,
                present_queue_family: selected.present_family,
                upload_command_pool,
                surface,
                surface_loader,
                max_sampler_anisotropy: limits.max_sampler_anisotropy,
                sampler_anisotropy_enabled,
                #[cfg(feature = "vulkan-validation")]
                debug_messenger,
            }));

            Ok(Self { ctx })
        }
    }

    #[cfg(feature = "vulkan-validation")]
    unsafe fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<crate::vulkan_context::DebugMessenger> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        crate::debug::init_debug_config();

        let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

        let messenger = loader
            .create_debug_utils_messenger(&debug_info, None)
            .map_err(|e| init_failed(format!("Failed to create debug messenger: {:?}", e)))?;
        Ok(crate::vulkan_context::DebugMessenger { loader, messenger })
    }

    /// Pick a GPU with graphics and present support and the swapchain extension,
    /// discrete GPUs first
    unsafe fn select_physical_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<SelectedDevice> {
        let physical_devices = instance
            .enumerate_physical_devices()
            .map_err(|e| init_failed(format!("Failed to enumerate physical devices: {:?}", e)))?;

        let mut best: Option<(u32, SelectedDevice)> = None;
        for physical_device in physical_devices {
            let properties = instance.get_physical_device_properties(physical_device);
            let name = CStr::from_ptr(properties.device_name.as_ptr()).to_string_lossy().into_owned();

            let has_swapchain = instance
                .enumerate_device_extension_properties(physical_device)
                .map(|extensions| {
                    extensions.iter().any(|extension| {
                        CStr::from_ptr(extension.extension_name.as_ptr()) == ash::khr::swapchain::NAME
                    })
                })
                .unwrap_or(false);
            if !has_swapchain {
                continue;
            }

            let queue_families = instance.get_physical_device_queue_family_properties(physical_device);
            let graphics_family = queue_families
                .iter()
                .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|index| index as u32);
            let supports_present = |index: u32| {
                surface_loader
                    .get_physical_device_surface_support(physical_device, index, surface)
                    .unwrap_or(false)
            };
            // Same family for both when possible
            let present_family = match graphics_family {
                Some(graphics) if supports_present(graphics) => Some(graphics),
                _ => (0..queue_families.len() as u32).find(|&index| supports_present(index)),
            };
            let (Some(graphics_family), Some(present_family)) = (graphics_family, present_family) else {
                continue;
            };

            let score = match properties.device_type {
                vk::PhysicalDeviceType::DISCRETE_GPU => 3,
                vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
                vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
                _ => 0,
            };
            if best.as_ref().map_or(true, |(best_score, _)| score > *best_score) {
                best = Some((
                    score,
                    SelectedDevice { physical_device, graphics_family, present_family, name },
                ));
            }
        }

        best.map(|(_, selected)| selected)
            .ok_or_else(|| init_failed("No Vulkan GPU with graphics, present and swapchain support".to_string()))
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn create_buffer(&self, desc: &BufferDesc, data: Option<&[u8]>) -> Result<Arc<dyn DeviceBuffer>> {
        Ok(Arc::new(Buffer::new(Arc::clone(&self.ctx), desc, data)?))
    }

    fn create_image(&self, desc: &ImageDesc, layers_data: &[&[u8]]) -> Result<Arc<dyn DeviceImage>> {
        Ok(Arc::new(Image::new(Arc::clone(&self.ctx), desc, layers_data)?))
    }

    fn supports_linear_blit(&self, format: TextureFormat) -> bool {
        let properties = unsafe {
            self.ctx
                .instance
                .get_physical_device_format_properties(self.ctx.physical_device, texture_format_to_vk(format))
        };
        properties.optimal_tiling_features.contains(
            vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR
                | vk::FormatFeatureFlags::BLIT_SRC
                | vk::FormatFeatureFlags::BLIT_DST,
        )
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn DeviceSampler>> {
        Ok(Arc::new(Sampler::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_shader(&self, desc: &ShaderDesc) -> Result<Arc<dyn DeviceShader>> {
        Ok(Arc::new(Shader::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn DeviceRenderPass>> {
        Ok(Arc::new(RenderPass::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn DeviceFramebuffer>> {
        Ok(Arc::new(Framebuffer::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn DevicePipeline>> {
        Ok(Arc::new(Pipeline::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_descriptor_sets(&self, desc: &DescriptorSetDesc) -> Result<Vec<Arc<dyn DeviceDescriptorSet>>> {
        DescriptorSet::allocate(Arc::clone(&self.ctx), desc)
    }

    fn create_command_list(&self, name: &str) -> Result<Box<dyn DeviceCommandList>> {
        Ok(Box::new(CommandList::new(Arc::clone(&self.ctx), name)?))
    }

    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn DeviceFence>> {
        Ok(Arc::new(Fence::new(Arc::clone(&self.ctx), signaled)?))
    }

    fn create_semaphore(&self) -> Result<Arc<dyn DeviceSemaphore>> {
        Ok(Arc::new(Semaphore::new(Arc::clone(&self.ctx))?))
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<Box<dyn DeviceSwapchain>> {
        Ok(Box::new(Swapchain::new(Arc::clone(&self.ctx), desc)?))
    }

    fn submit(&self, info: &SubmitInfo) -> Result<()> {
        let command_list = unsafe { &*(info.command_list as *const dyn DeviceCommandList as *const CommandList) };

        let wait_semaphores: Vec<vk::Semaphore> =
            info.wait.iter().map(|wait| Semaphore::handle(&wait.semaphore)).collect();
        let wait_stages: Vec<vk::PipelineStageFlags> =
            info.wait.iter().map(|wait| pipeline_stages_to_vk(wait.stages)).collect();
        let signal_semaphores: Vec<vk::Semaphore> = info.signal.iter().map(Semaphore::handle).collect();
        let fence = info
            .fence
            .map(|fence| unsafe { (*(fence as *const dyn DeviceFence as *const Fence)).fence })
            .unwrap_or(vk::Fence::null());

        let command_buffers = [command_list.command_buffer];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let _queue = self.ctx.lock_queue()?;
        unsafe {
            self.ctx
                .device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], fence)
                .map_err(|e| match e {
                    vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
                        engine_error!("prism::vulkan", "Out of memory while submitting commands");
                        Error::OutOfMemory
                    }
                    _ => engine_err!("prism::vulkan", "Failed to submit commands to GPU queue: {:?}", e),
                })
        }
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .device_wait_idle()
                .map_err(|e| engine_err!("prism::vulkan", "Failed to wait idle: {:?}", e))
        }
    }

    fn capture_image(&self, image: &Arc<dyn DeviceImage>, width: u32, height: u32) -> Result<Vec<u8>> {
        self.wait_idle()?;
        let source = unsafe { &*(Arc::as_ptr(image) as *const Image) };
        let linear = self.supports_linear_blit(source.desc().format);
        capture_image(&self.ctx, source, width, height, linear)
    }
}
