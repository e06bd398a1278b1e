/// GraphicsDevice trait - factory for every GPU object the render core uses

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    Buffer, BufferDesc, CommandList, DescriptorSet, DescriptorSetDesc, DeviceImage,
    DevicePipeline, Fence, Framebuffer, FramebufferDesc, ImageDesc, PipelineDesc,
    RenderPass, RenderPassDesc, Sampler, SamplerDesc, Semaphore, Shader, ShaderDesc,
    SubmitInfo, Swapchain, SwapchainDesc, TextureFormat,
};

/// Graphics device trait
///
/// Implemented by backends (Vulkan) and by the test mock.
/// Every creation call either succeeds or returns a hard error.
pub trait GraphicsDevice: Send + Sync {
    /// Create a buffer
    ///
    /// # Arguments
    ///
    /// * `desc` - Buffer description
    /// * `data` - Optional initial content (staged for device-local buffers)
    fn create_buffer(&self, desc: &BufferDesc, data: Option<&[u8]>) -> Result<Arc<dyn Buffer>>;

    /// Create an image, upload one data slice per layer and generate mips
    ///
    /// # Arguments
    ///
    /// * `desc` - Image description
    /// * `layers_data` - Per-layer pixel data (empty for render outputs)
    fn create_image(&self, desc: &ImageDesc, layers_data: &[&[u8]]) -> Result<Arc<dyn DeviceImage>>;

    /// Whether the format supports linear-filtered blits (mip generation)
    fn supports_linear_blit(&self, format: TextureFormat) -> bool;

    /// Create a sampler
    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn Sampler>>;

    /// Create a shader from compiled stages
    fn create_shader(&self, desc: &ShaderDesc) -> Result<Arc<dyn Shader>>;

    /// Create a render pass
    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>>;

    /// Create a framebuffer
    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>>;

    /// Compile a pipeline with its layout and descriptor-set layout
    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn DevicePipeline>>;

    /// Allocate descriptor sets from a dedicated pool
    fn create_descriptor_sets(&self, desc: &DescriptorSetDesc) -> Result<Vec<Arc<dyn DescriptorSet>>>;

    /// Create a command list with its own command pool
    fn create_command_list(&self, name: &str) -> Result<Box<dyn CommandList>>;

    /// Create a fence
    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>>;

    /// Create a semaphore
    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>>;

    /// Create a swapchain for the device surface
    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<Box<dyn Swapchain>>;

    /// Submit a command list to the graphics queue
    fn submit(&self, info: &SubmitInfo) -> Result<()>;

    /// Block until the device is idle
    fn wait_idle(&self) -> Result<()>;

    /// Read back an image as RGBA8 pixels resized to the destination size
    ///
    /// One-shot blocking operation, not meant for the per-frame path.
    fn capture_image(&self, image: &Arc<dyn DeviceImage>, width: u32, height: u32) -> Result<Vec<u8>>;
}
