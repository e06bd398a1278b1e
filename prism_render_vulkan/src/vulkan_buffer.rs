/// Buffer - Vulkan implementation of the Buffer trait

use prism_render::graphics_device::{Buffer as DeviceBuffer, BufferDesc, BufferUsage, MemoryLocation};
use prism_render::prism::{Error, Result};
use prism_render::{engine_bail, engine_err, engine_error};
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Vulkan buffer implementation
pub struct Buffer {
    /// Shared GPU context (device, allocator, queue, command pool)
    ctx: Arc<GpuContext>,
    /// Vulkan buffer
    pub(crate) buffer: vk::Buffer,
    /// GPU memory allocation
    allocation: Option<Allocation>,
    /// Buffer size
    size: u64,
}

impl Buffer {
    /// Create a buffer, staging the initial content of device-local buffers
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &BufferDesc, data: Option<&[u8]>) -> Result<Self> {
        if desc.size == 0 {
            engine_bail!("prism::vulkan", "Buffer '{}' has a size of 0", desc.name);
        }
        if let Some(data) = data {
            if data.len() as u64 > desc.size {
                engine_bail!(
                    "prism::vulkan",
                    "Initial data of buffer '{}' ({} bytes) exceeds its size ({} bytes)",
                    desc.name, data.len(), desc.size
                );
            }
        }

        let usage = match desc.usage {
            BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Storage => vk::BufferUsageFlags::STORAGE_BUFFER,
        };
        let location = match desc.location {
            MemoryLocation::DeviceLocal => gpu_allocator::MemoryLocation::GpuOnly,
            MemoryLocation::HostVisible => gpu_allocator::MemoryLocation::CpuToGpu,
        };

        let buffer_create_info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(usage | vk::BufferUsageFlags::TRANSFER_DST)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe {
            ctx.device.create_buffer(&buffer_create_info, None).map_err(|e| {
                engine_err!("prism::vulkan", "Failed to create buffer '{}' of size {} bytes: {:?}", desc.name, desc.size, e)
            })?
        };

        let allocation = match ctx.allocate_buffer_memory(&desc.name, buffer, location) {
            Ok(allocation) => allocation,
            Err(error) => {
                unsafe { ctx.device.destroy_buffer(buffer, None) };
                return Err(error);
            }
        };

        let created = Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size: desc.size,
        };

        if let Some(data) = data {
            match desc.location {
                MemoryLocation::HostVisible => created.write_mapped(0, data)?,
                MemoryLocation::DeviceLocal => created.upload_staged(&desc.name, data)?,
            }
        }
        Ok(created)
    }

    /// Copy into the persistently mapped memory
    fn write_mapped(&self, offset: u64, data: &[u8]) -> Result<()> {
        if offset + data.len() as u64 > self.size {
            engine_bail!(
                "prism::vulkan",
                "Buffer write out of range (offset {} + {} bytes > size {})",
                offset, data.len(), self.size
            );
        }
        let allocation = self.allocation.as_ref().ok_or_else(|| {
            engine_error!("prism::vulkan", "Buffer update failed: no GPU allocation");
            Error::BackendError("Buffer has no allocation".to_string())
        })?;
        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| Error::BackendError("Buffer is not CPU-accessible".to_string()))?
            .as_ptr() as *mut u8;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr.add(offset as usize), data.len());
        }
        Ok(())
    }

    /// Fill a device-local buffer through a temporary staging buffer
    fn upload_staged(&self, name: &str, data: &[u8]) -> Result<()> {
        let staging = StagingBuffer::new(Arc::clone(&self.ctx), name, data)?;
        let region = vk::BufferCopy::default().size(data.len() as u64);
        self.ctx.submit_one_shot(|device, command_buffer| unsafe {
            device.cmd_copy_buffer(command_buffer, staging.buffer, self.buffer, &[region]);
        })
    }
}

impl DeviceBuffer for Buffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.write_mapped(offset, data)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
        unsafe {
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}

/// Host-visible buffer holding data to transfer, destroyed when dropped
pub(crate) struct StagingBuffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
}

impl StagingBuffer {
    /// Staging buffer for an upload, filled with `data`
    pub(crate) fn new(ctx: Arc<GpuContext>, name: &str, data: &[u8]) -> Result<Self> {
        let staging = Self::with_location(
            ctx,
            &format!("{} staging", name),
            data.len() as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            gpu_allocator::MemoryLocation::CpuToGpu,
        )?;
        let mapped_ptr = staging.mapped_ptr()?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr, data.len());
        }
        Ok(staging)
    }

    /// Readback buffer of `size` bytes
    pub(crate) fn readback(ctx: Arc<GpuContext>, name: &str, size: u64) -> Result<Self> {
        Self::with_location(
            ctx,
            &format!("{} readback", name),
            size,
            vk::BufferUsageFlags::TRANSFER_DST,
            gpu_allocator::MemoryLocation::GpuToCpu,
        )
    }

    fn with_location(
        ctx: Arc<GpuContext>,
        name: &str,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: gpu_allocator::MemoryLocation,
    ) -> Result<Self> {
        let create_info = vk::BufferCreateInfo::default()
            .size(size.max(1))
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe {
            ctx.device
                .create_buffer(&create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create buffer '{}': {:?}", name, e))?
        };
        let allocation = match ctx.allocate_buffer_memory(name, buffer, location) {
            Ok(allocation) => allocation,
            Err(error) => {
                unsafe { ctx.device.destroy_buffer(buffer, None) };
                return Err(error);
            }
        };
        Ok(Self { ctx, buffer, allocation: Some(allocation) })
    }

    pub(crate) fn mapped_ptr(&self) -> Result<*mut u8> {
        self.allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .map(|ptr| ptr.as_ptr() as *mut u8)
            .ok_or_else(|| engine_err!("prism::vulkan", "Staging buffer is not mapped"))
    }
}

impl Drop for StagingBuffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
        unsafe {
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
