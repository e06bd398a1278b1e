/// Graphics device abstraction
///
/// Backend-agnostic traits for every GPU object used by the render core.
/// Backends (Vulkan) implement them; tests use the mock device.

mod buffer;
mod command_list;
mod descriptor_set;
mod format;
mod frame_buffer;
mod graphics_device;
mod image;
mod pipeline;
mod render_pass;
mod sampler;
mod shader;
mod swapchain;
mod sync;

#[cfg(test)]
pub mod mock_graphics_device;

pub use buffer::{Buffer, BufferDesc, BufferUsage, MemoryLocation};
pub use command_list::{ClearValue, CommandList, IndexType, Rect2D};
pub use descriptor_set::{DescriptorResource, DescriptorSet, DescriptorSetDesc, DescriptorWrite};
pub use format::{TextureFormat, VertexFormat};
pub use frame_buffer::{Framebuffer, FramebufferAttachment, FramebufferDesc};
pub use graphics_device::GraphicsDevice;
pub use image::{DeviceImage, ImageDesc, ImageViewType, OutputUsage};
pub use pipeline::{
    BlendFactor, BlendFunction, DescriptorBinding, DescriptorType, DevicePipeline,
    PipelineDesc, PipelineType, PolygonMode, PrimitiveTopology, VertexAttribute,
    VertexBinding, VertexInputRate,
};
pub use render_pass::{AttachmentDesc, ImageLayout, LoadOp, RenderPass, RenderPassDesc, StoreOp};
pub use sampler::{AddressMode, Filter, Sampler, SamplerDesc};
pub use shader::{Shader, ShaderDesc, ShaderStage, ShaderStageDesc};
pub use swapchain::{
    AcquireOutcome, FramebufferSizeProvider, PresentOutcome, Swapchain, SwapchainDesc,
};
pub use sync::{Fence, PipelineStages, Semaphore, SubmitInfo, WaitSemaphore};
