/// GPU buffer of one frame slot, created static and promoted to dynamic on update

use std::sync::Arc;
use crate::error::Result;
use crate::engine_debug;
use crate::graphics_device::{Buffer, BufferDesc, BufferUsage, GraphicsDevice, MemoryLocation};

/// Smallest buffer created (zero-sized buffers are invalid)
const MIN_BUFFER_SIZE: u64 = 16;

/// Buffer memory strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Device-local, uploaded once through a staging buffer
    Static,
    /// Host-visible, written directly on update
    Dynamic,
}

/// Owns one device buffer and recreates it when needed
pub struct BufferHandler {
    name: String,
    usage: BufferUsage,
    kind: BufferKind,
    data_size: u64,
    buffer: Arc<dyn Buffer>,
}

impl BufferHandler {
    /// Create the buffer with its initial content
    pub fn new(
        device: &dyn GraphicsDevice,
        name: &str,
        usage: BufferUsage,
        kind: BufferKind,
        data: &[u8],
    ) -> Result<Self> {
        let data_size = data.len() as u64;
        let buffer = Self::create(device, name, usage, kind, data_size, Some(data))?;
        Ok(Self {
            name: name.to_string(),
            usage,
            kind,
            data_size,
            buffer,
        })
    }

    fn create(
        device: &dyn GraphicsDevice,
        name: &str,
        usage: BufferUsage,
        kind: BufferKind,
        size: u64,
        data: Option<&[u8]>,
    ) -> Result<Arc<dyn Buffer>> {
        let location = match kind {
            BufferKind::Static => MemoryLocation::DeviceLocal,
            BufferKind::Dynamic => MemoryLocation::HostVisible,
        };
        let desc = BufferDesc {
            name: name.to_string(),
            size: size.max(MIN_BUFFER_SIZE),
            usage,
            location,
        };
        device.create_buffer(&desc, data.filter(|d| !d.is_empty()))
    }

    /// Write new content
    ///
    /// A static buffer becomes dynamic; a dynamic buffer is recreated when
    /// the data no longer fits. Returns true when the buffer identity changed,
    /// meaning command lists referencing the old buffer must be re-recorded.
    pub fn update_data(&mut self, device: &dyn GraphicsDevice, data: &[u8]) -> Result<bool> {
        let new_size = data.len() as u64;
        let expand = self.buffer.size() < new_size;
        self.data_size = new_size;

        let mut recreated = false;
        if self.kind == BufferKind::Static || expand {
            engine_debug!("prism::BufferHandler", "Recreating buffer '{}' as dynamic ({} bytes)", self.name, new_size);
            self.kind = BufferKind::Dynamic;
            let size = self.buffer.size().max(new_size);
            self.buffer = Self::create(device, &self.name, self.usage, self.kind, size, None)?;
            recreated = true;
        }
        if !data.is_empty() {
            self.buffer.update(0, data)?;
        }
        Ok(recreated)
    }

    pub fn buffer(&self) -> &Arc<dyn Buffer> {
        &self.buffer
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Size of the last written data in bytes
    pub fn data_size(&self) -> u64 {
        self.data_size
    }
}

/// One buffer handler per frame slot
pub struct PerFrameBuffers {
    handlers: Vec<BufferHandler>,
}

impl PerFrameBuffers {
    pub fn new(
        device: &dyn GraphicsDevice,
        name: &str,
        usage: BufferUsage,
        kind: BufferKind,
        num_slots: usize,
        data: &[u8],
    ) -> Result<Self> {
        let handlers = (0..num_slots)
            .map(|slot| BufferHandler::new(device, &format!("{} - slot{}", name, slot), usage, kind, data))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { handlers })
    }

    pub fn buffer(&self, slot: usize) -> &Arc<dyn Buffer> {
        self.handlers[slot].buffer()
    }

    pub fn handler(&self, slot: usize) -> &BufferHandler {
        &self.handlers[slot]
    }

    /// Update the buffer of one slot, see `BufferHandler::update_data`
    pub fn update_data(&mut self, device: &dyn GraphicsDevice, slot: usize, data: &[u8]) -> Result<bool> {
        self.handlers[slot].update_data(device, data)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
#[path = "buffer_handler_tests.rs"]
mod tests;
