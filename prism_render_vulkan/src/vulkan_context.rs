/// GpuContext - Vulkan objects shared by every resource of the device
///
/// Contains everything needed for GPU operations:
/// - Instance, surface and logical device
/// - Allocator for memory management
/// - Queues for submission and presentation
/// - Command pool for one-shot transfer operations
///
/// Every resource keeps an `Arc<GpuContext>`, so the device is destroyed
/// only after the last buffer, image or swapchain created from it.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};
use prism_render::prism::{Error, Result};
use prism_render::{engine_err, engine_error};

/// Debug messenger and the loader needed to destroy it
#[cfg(feature = "vulkan-validation")]
pub(crate) struct DebugMessenger {
    pub(crate) loader: ash::ext::debug_utils::Instance,
    pub(crate) messenger: vk::DebugUtilsMessengerEXT,
}

/// Shared GPU context for all Vulkan resources
pub struct GpuContext {
    /// Vulkan entry (keeps the loader library alive)
    _entry: ash::Entry,
    /// Vulkan instance
    pub(crate) instance: ash::Instance,
    /// Physical device
    pub(crate) physical_device: vk::PhysicalDevice,
    /// Vulkan logical device
    pub(crate) device: ash::Device,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop so it is dropped BEFORE the device is destroyed
    allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Graphics queue and its family
    pub(crate) graphics_queue: vk::Queue,
    pub(crate) graphics_queue_family: u32,
    /// Present queue (may be the graphics queue)
    pub(crate) present_queue: vk::Queue,
    pub(crate) present_queue_family: u32,
    /// Queue submission and presentation need external synchronization
    pub(crate) queue_lock: Mutex<()>,

    /// Command pool for one-shot transfers (TRANSIENT + RESET_COMMAND_BUFFER)
    upload_command_pool: Mutex<vk::CommandPool>,

    /// Window surface the swapchains present to
    pub(crate) surface: vk::SurfaceKHR,
    pub(crate) surface_loader: ash::khr::surface::Instance,
    pub(crate) swapchain_loader: ash::khr::swapchain::Device,

    /// Device limits used by samplers
    pub(crate) max_sampler_anisotropy: f32,
    pub(crate) sampler_anisotropy_enabled: bool,

    #[cfg(feature = "vulkan-validation")]
    pub(crate) debug_messenger: Option<DebugMessenger>,
}

/// Everything `GpuContext::new` takes ownership of
pub(crate) struct GpuContextDesc {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    pub allocator: Allocator,
    pub graphics_queue_family: u32,
    pub present_queue_family: u32,
    pub upload_command_pool: vk::CommandPool,
    pub surface: vk::SurfaceKHR,
    pub surface_loader: ash::khr::surface::Instance,
    pub max_sampler_anisotropy: f32,
    pub sampler_anisotropy_enabled: bool,
    #[cfg(feature = "vulkan-validation")]
    pub debug_messenger: Option<DebugMessenger>,
}

impl GpuContext {
    pub(crate) fn new(desc: GpuContextDesc) -> Self {
        let graphics_queue = unsafe { desc.device.get_device_queue(desc.graphics_queue_family, 0) };
        let present_queue = unsafe { desc.device.get_device_queue(desc.present_queue_family, 0) };
        let swapchain_loader = ash::khr::swapchain::Device::new(&desc.instance, &desc.device);
        Self {
            _entry: desc.entry,
            instance: desc.instance,
            physical_device: desc.physical_device,
            device: desc.device,
            allocator: ManuallyDrop::new(Mutex::new(desc.allocator)),
            graphics_queue,
            graphics_queue_family: desc.graphics_queue_family,
            present_queue,
            present_queue_family: desc.present_queue_family,
            queue_lock: Mutex::new(()),
            upload_command_pool: Mutex::new(desc.upload_command_pool),
            surface: desc.surface,
            surface_loader: desc.surface_loader,
            swapchain_loader,
            max_sampler_anisotropy: desc.max_sampler_anisotropy,
            sampler_anisotropy_enabled: desc.sampler_anisotropy_enabled,
            #[cfg(feature = "vulkan-validation")]
            debug_messenger: desc.debug_messenger,
        }
    }

    /// Lock the allocator
    pub(crate) fn allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| engine_err!("prism::vulkan", "GPU allocator lock poisoned"))
    }

    /// Allocate and bind memory for a buffer
    pub(crate) fn allocate_buffer_memory(
        &self,
        name: &str,
        buffer: vk::Buffer,
        location: MemoryLocation,
    ) -> Result<Allocation> {
        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let allocation = self
            .allocator()?
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!("prism::vulkan", "Out of GPU memory for buffer '{}' ({:.2} MB): {:?}", name, size_mb, e);
                Error::OutOfMemory
            })?;
        unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                .map_err(|e| engine_err!("prism::vulkan", "Failed to bind memory of buffer '{}': {:?}", name, e))?;
        }
        Ok(allocation)
    }

    /// Allocate and bind device-local memory for an image
    pub(crate) fn allocate_image_memory(&self, name: &str, image: vk::Image) -> Result<Allocation> {
        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let allocation = self
            .allocator()?
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!("prism::vulkan", "Out of GPU memory for image '{}' ({:.2} MB): {:?}", name, size_mb, e);
                Error::OutOfMemory
            })?;
        unsafe {
            self.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
                .map_err(|e| engine_err!("prism::vulkan", "Failed to bind memory of image '{}': {:?}", name, e))?;
        }
        Ok(allocation)
    }

    /// Release an allocation (errors are ignored: this runs from Drop impls)
    pub(crate) fn free(&self, allocation: Allocation) {
        if let Ok(mut allocator) = self.allocator.lock() {
            allocator.free(allocation).ok();
        }
    }

    /// Lock the queues for a submission or a presentation
    pub(crate) fn lock_queue(&self) -> Result<MutexGuard<'_, ()>> {
        self.queue_lock
            .lock()
            .map_err(|_| engine_err!("prism::vulkan", "Queue lock poisoned"))
    }

    /// Record commands into a one-shot command buffer, submit them and wait
    ///
    /// Blocking: only used at resource creation and for captures.
    pub(crate) fn submit_one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let pool = self
            .upload_command_pool
            .lock()
            .map_err(|_| engine_err!("prism::vulkan", "Upload command pool lock poisoned"))?;

        unsafe {
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = self
                .device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to allocate one-shot command buffer: {:?}", e))?[0];

            let result = (|| {
                let begin_info = vk::CommandBufferBeginInfo::default()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
                self.device
                    .begin_command_buffer(command_buffer, &begin_info)
                    .map_err(|e| engine_err!("prism::vulkan", "Failed to begin one-shot command buffer: {:?}", e))?;

                record(&self.device, command_buffer);

                self.device
                    .end_command_buffer(command_buffer)
                    .map_err(|e| engine_err!("prism::vulkan", "Failed to end one-shot command buffer: {:?}", e))?;

                let command_buffers = [command_buffer];
                let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
                let _queue = self.lock_queue()?;
                self.device
                    .queue_submit(self.graphics_queue, &[submit_info], vk::Fence::null())
                    .map_err(|e| engine_err!("prism::vulkan", "Failed to submit one-shot commands: {:?}", e))?;
                self.device
                    .queue_wait_idle(self.graphics_queue)
                    .map_err(|e| engine_err!("prism::vulkan", "Failed to wait for one-shot commands: {:?}", e))
            })();

            self.device.free_command_buffers(*pool, &[command_buffer]);
            result
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            if let Ok(pool) = self.upload_command_pool.get_mut() {
                self.device.destroy_command_pool(*pool, None);
            }

            // Free VkDeviceMemory pages BEFORE destroying the device
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);

            #[cfg(feature = "vulkan-validation")]
            if let Some(debug) = self.debug_messenger.take() {
                crate::debug::cleanup_debug_config();
                debug.loader.destroy_debug_utils_messenger(debug.messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}
