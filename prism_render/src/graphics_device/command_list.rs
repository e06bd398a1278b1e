/// CommandList trait - for recording rendering commands

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    Buffer, DescriptorSet, DeviceImage, DevicePipeline, Framebuffer, RenderPass,
};

/// Command list for recording rendering commands
///
/// Each command list owns its own command pool, so resetting one frame
/// slot never invalidates the recording of another slot.
/// Commands are submitted to the GPU via GraphicsDevice::submit().
pub trait CommandList: Send + Sync {
    /// Reset the underlying command pool (the previous recording is discarded)
    fn reset(&mut self) -> Result<()>;

    /// Begin recording commands
    fn begin(&mut self) -> Result<()>;

    /// End recording commands
    fn end(&mut self) -> Result<()>;

    /// Begin a render pass
    ///
    /// # Arguments
    ///
    /// * `render_pass` - The render pass to begin
    /// * `framebuffer` - The framebuffer containing color and depth attachments
    /// * `render_area` - Area of the framebuffer to render
    /// * `clear_values` - Clear values, in attachment order (colors, then depth)
    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        render_area: Rect2D,
        clear_values: &[ClearValue],
    ) -> Result<()>;

    /// End the current render pass
    fn end_render_pass(&mut self) -> Result<()>;

    /// Bind a graphics or compute pipeline
    fn bind_pipeline(&mut self, pipeline: &Arc<dyn DevicePipeline>) -> Result<()>;

    /// Bind a descriptor set at set index 0
    ///
    /// # Arguments
    ///
    /// * `pipeline` - Pipeline owning the layout
    /// * `descriptor_set` - Descriptor set to bind
    fn bind_descriptor_set(
        &mut self,
        pipeline: &Arc<dyn DevicePipeline>,
        descriptor_set: &Arc<dyn DescriptorSet>,
    ) -> Result<()>;

    /// Push constants at offset 0
    fn push_constants(&mut self, pipeline: &Arc<dyn DevicePipeline>, data: &[u8]) -> Result<()>;

    /// Set the scissor rectangle
    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    /// Bind vertex buffers at sequential binding slots
    ///
    /// # Arguments
    ///
    /// * `first_binding` - Binding slot of the first buffer
    /// * `buffers` - Buffers to bind (offset 0)
    fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[Arc<dyn Buffer>]) -> Result<()>;

    /// Bind an index buffer
    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, index_type: IndexType) -> Result<()>;

    /// Draw non-indexed vertices
    fn draw(&mut self, vertex_count: u32, instance_count: u32) -> Result<()>;

    /// Draw indexed vertices
    fn draw_indexed(&mut self, index_count: u32, instance_count: u32) -> Result<()>;

    /// Dispatch compute workgroups
    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) -> Result<()>;

    /// Copy the whole content of an image into another image of the same size
    fn copy_image(&mut self, src: &Arc<dyn DeviceImage>, dst: &Arc<dyn DeviceImage>) -> Result<()>;
}

/// 2D rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    /// Rectangle at the origin covering `width` x `height`
    pub fn from_size(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

/// Clear value for attachments
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

/// Index type for indexed drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}
