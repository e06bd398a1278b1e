/// Mock graphics device for unit tests (no GPU required)
///
/// Records created objects, recorded commands and queue submissions so the
/// render core can be tested without a real GPU or graphics backend.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::engine_bail;
use crate::graphics_device::{
    AcquireOutcome, Buffer, BufferDesc, ClearValue, CommandList, DescriptorResource,
    DescriptorSet, DescriptorSetDesc, DescriptorWrite, DeviceImage, DevicePipeline, Fence,
    Framebuffer, FramebufferDesc, FramebufferSizeProvider, GraphicsDevice, ImageDesc,
    ImageViewType, IndexType, MemoryLocation, PipelineDesc, PipelineType, PresentOutcome, Rect2D,
    RenderPass, RenderPassDesc, Sampler, SamplerDesc, Semaphore, Shader, ShaderDesc, ShaderStage,
    SubmitInfo, Swapchain, SwapchainDesc, TextureFormat,
};

// ============================================================================
// Shared log
// ============================================================================

/// One recorded queue submission
#[derive(Debug, Clone)]
pub struct MockSubmission {
    /// Name of the submitted command list
    pub command_list: String,
    /// Ids of the waited semaphores, in submission order
    pub wait: Vec<u64>,
    /// Ids of the signaled semaphores
    pub signal: Vec<u64>,
    /// Whether a fence was attached
    pub fence: bool,
}

/// Everything the mock device has seen
#[derive(Debug, Default)]
pub struct MockLog {
    pub created_buffers: Vec<String>,
    pub created_images: Vec<ImageDesc>,
    pub created_samplers: usize,
    pub created_render_passes: Vec<RenderPassDesc>,
    pub created_framebuffers: Vec<(u32, u32)>,
    pub created_pipelines: Vec<String>,
    pub created_descriptor_sets: usize,
    pub descriptor_writes: usize,
    pub created_command_lists: Vec<String>,
    pub created_semaphores: usize,
    pub created_swapchains: usize,
    pub submissions: Vec<MockSubmission>,
    pub presents: Vec<u32>,
    pub fence_waits: usize,
    pub wait_idle_count: usize,
    pub captures: usize,
    /// Recorded commands per command list name (current recording only)
    pub commands: HashMap<String, Vec<String>>,
    /// Number of recordings (begin calls) per command list name
    pub recordings: HashMap<String, usize>,
}

type SharedLog = Arc<Mutex<MockLog>>;

fn with_log<R>(log: &SharedLog, f: impl FnOnce(&mut MockLog) -> R) -> R {
    let mut guard = log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut guard)
}

// ============================================================================
// Mock Buffer
// ============================================================================

#[derive(Debug)]
pub struct MockBuffer {
    pub name: String,
    pub size: u64,
    pub location: MemoryLocation,
    pub data: Mutex<Vec<u8>>,
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        if self.location != MemoryLocation::HostVisible {
            engine_bail!("prism::mock", "Buffer '{}' is not host visible", self.name);
        }
        let end = offset as usize + data.len();
        if end as u64 > self.size {
            engine_bail!("prism::mock", "Buffer '{}' overflow: {} > {}", self.name, end, self.size);
        }
        let mut content = self.data.lock().unwrap_or_else(|p| p.into_inner());
        content[offset as usize..end].copy_from_slice(data);
        Ok(())
    }
}

// ============================================================================
// Mock Image / Sampler / Shader
// ============================================================================

#[derive(Debug)]
pub struct MockImage {
    pub desc: ImageDesc,
}

impl DeviceImage for MockImage {
    fn desc(&self) -> &ImageDesc {
        &self.desc
    }
}

#[derive(Debug)]
pub struct MockSampler {
    pub desc: SamplerDesc,
}

impl Sampler for MockSampler {}

#[derive(Debug)]
pub struct MockShader {
    pub id: u64,
    pub name: String,
    pub stages: Vec<ShaderStage>,
}

impl Shader for MockShader {
    fn shader_id(&self) -> u64 {
        self.id
    }

    fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Mock RenderPass / Framebuffer / Pipeline / DescriptorSet
// ============================================================================

#[derive(Debug)]
pub struct MockRenderPass;

impl RenderPass for MockRenderPass {}

#[derive(Debug)]
pub struct MockFramebuffer {
    pub width: u32,
    pub height: u32,
}

impl Framebuffer for MockFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

#[derive(Debug)]
pub struct MockPipeline {
    pub name: String,
    pub pipeline_type: PipelineType,
}

impl DevicePipeline for MockPipeline {
    fn pipeline_type(&self) -> PipelineType {
        self.pipeline_type
    }
}

pub struct MockDescriptorSet {
    log: SharedLog,
}

impl DescriptorSet for MockDescriptorSet {
    fn write(&self, writes: &[DescriptorWrite]) -> Result<()> {
        for write in writes {
            if let DescriptorResource::SampledImages(images) = &write.resource {
                if images.is_empty() {
                    engine_bail!("prism::mock", "Empty sampled image array at binding {}", write.binding);
                }
            }
        }
        with_log(&self.log, |log| log.descriptor_writes += writes.len());
        Ok(())
    }
}

// ============================================================================
// Mock CommandList
// ============================================================================

pub struct MockCommandList {
    pub name: String,
    log: SharedLog,
}

impl MockCommandList {
    fn record(&self, command: String) {
        with_log(&self.log, |log| {
            log.commands.entry(self.name.clone()).or_default().push(command)
        });
    }
}

impl CommandList for MockCommandList {
    fn reset(&mut self) -> Result<()> {
        with_log(&self.log, |log| {
            log.commands.insert(self.name.clone(), Vec::new());
        });
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        with_log(&self.log, |log| {
            *log.recordings.entry(self.name.clone()).or_default() += 1;
        });
        self.record("begin".to_string());
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.record("end".to_string());
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        _render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        _render_area: Rect2D,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.record(format!(
            "begin_render_pass({}x{}, clears={})",
            framebuffer.width(),
            framebuffer.height(),
            clear_values.len()
        ));
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.record("end_render_pass".to_string());
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn DevicePipeline>) -> Result<()> {
        // SAFETY: every pipeline handed to a mock command list was created by the mock device
        let pipeline = unsafe { &*(Arc::as_ptr(pipeline) as *const MockPipeline) };
        self.record(format!("bind_pipeline({})", pipeline.name));
        Ok(())
    }

    fn bind_descriptor_set(
        &mut self,
        _pipeline: &Arc<dyn DevicePipeline>,
        _descriptor_set: &Arc<dyn DescriptorSet>,
    ) -> Result<()> {
        self.record("bind_descriptor_set".to_string());
        Ok(())
    }

    fn push_constants(&mut self, _pipeline: &Arc<dyn DevicePipeline>, data: &[u8]) -> Result<()> {
        self.record(format!("push_constants({:?})", data));
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.record(format!(
            "set_scissor({}, {}, {}, {})",
            scissor.x, scissor.y, scissor.width, scissor.height
        ));
        Ok(())
    }

    fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[Arc<dyn Buffer>]) -> Result<()> {
        self.record(format!("bind_vertex_buffers({}, {})", first_binding, buffers.len()));
        Ok(())
    }

    fn bind_index_buffer(&mut self, _buffer: &Arc<dyn Buffer>, index_type: IndexType) -> Result<()> {
        self.record(format!("bind_index_buffer({:?})", index_type));
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) -> Result<()> {
        self.record(format!("draw({}, {})", vertex_count, instance_count));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32) -> Result<()> {
        self.record(format!("draw_indexed({}, {})", index_count, instance_count));
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.record(format!("dispatch({}, {}, {})", x, y, z));
        Ok(())
    }

    fn copy_image(&mut self, src: &Arc<dyn DeviceImage>, dst: &Arc<dyn DeviceImage>) -> Result<()> {
        self.record(format!("copy_image({} -> {})", src.desc().name, dst.desc().name));
        Ok(())
    }
}

// ============================================================================
// Mock Fence / Semaphore
// ============================================================================

pub struct MockFence {
    log: SharedLog,
    pub signaled: Mutex<bool>,
}

impl Fence for MockFence {
    fn wait(&self) -> Result<()> {
        with_log(&self.log, |log| log.fence_waits += 1);
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        *self.signaled.lock().unwrap_or_else(|p| p.into_inner()) = false;
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockSemaphore {
    pub id: u64,
}

impl Semaphore for MockSemaphore {}

/// Id of a semaphore created by the mock device
pub fn semaphore_id(semaphore: &Arc<dyn Semaphore>) -> u64 {
    // SAFETY: only mock semaphores exist in tests using the mock device
    unsafe { (*(Arc::as_ptr(semaphore) as *const MockSemaphore)).id }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

pub struct MockSwapchain {
    log: SharedLog,
    extent: (u32, u32),
    images: Vec<Arc<dyn DeviceImage>>,
    next_image: u32,
    acquire_script: Arc<Mutex<VecDeque<AcquireOutcome>>>,
    present_script: Arc<Mutex<VecDeque<PresentOutcome>>>,
}

impl Swapchain for MockSwapchain {
    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn extent(&self) -> (u32, u32) {
        self.extent
    }

    fn format(&self) -> TextureFormat {
        TextureFormat::B8G8R8A8_SRGB
    }

    fn image(&self, index: usize) -> Option<Arc<dyn DeviceImage>> {
        self.images.get(index).cloned()
    }

    fn acquire_next_image(&mut self, _signal: &Arc<dyn Semaphore>) -> Result<AcquireOutcome> {
        let scripted = self.acquire_script.lock().unwrap_or_else(|p| p.into_inner()).pop_front();
        if let Some(outcome) = scripted {
            return Ok(outcome);
        }
        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % self.images.len() as u32;
        Ok(AcquireOutcome::Acquired { image_index, suboptimal: false })
    }

    fn present(&mut self, image_index: u32, _wait: &Arc<dyn Semaphore>) -> Result<PresentOutcome> {
        with_log(&self.log, |log| log.presents.push(image_index));
        let scripted = self.present_script.lock().unwrap_or_else(|p| p.into_inner()).pop_front();
        Ok(scripted.unwrap_or(PresentOutcome::Presented))
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

/// Mock graphics device
pub struct MockGraphicsDevice {
    pub log: SharedLog,
    next_id: AtomicU64,
    unsupported_blit_formats: Mutex<Vec<TextureFormat>>,
    surface_size: Mutex<(u32, u32)>,
    swapchain_image_count: usize,
    acquire_script: Arc<Mutex<VecDeque<AcquireOutcome>>>,
    present_script: Arc<Mutex<VecDeque<PresentOutcome>>>,
}

impl MockGraphicsDevice {
    /// Mock device with an 800x600 surface and 3 swapchain images
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(MockLog::default())),
            next_id: AtomicU64::new(1),
            unsupported_blit_formats: Mutex::new(Vec::new()),
            surface_size: Mutex::new((800, 600)),
            swapchain_image_count: 3,
            acquire_script: Arc::new(Mutex::new(VecDeque::new())),
            present_script: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Mock device whose swapchains have `count` images
    pub fn with_swapchain_image_count(mut self, count: usize) -> Self {
        self.swapchain_image_count = count;
        self
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Make `supports_linear_blit` return false for a format
    pub fn disable_linear_blit(&self, format: TextureFormat) {
        self.unsupported_blit_formats.lock().unwrap_or_else(|p| p.into_inner()).push(format);
    }

    /// Size of the surface used for new swapchains
    pub fn set_surface_size(&self, width: u32, height: u32) {
        *self.surface_size.lock().unwrap_or_else(|p| p.into_inner()) = (width, height);
    }

    /// Queue an outcome for the next acquire on any swapchain
    pub fn script_acquire(&self, outcome: AcquireOutcome) {
        self.acquire_script.lock().unwrap_or_else(|p| p.into_inner()).push_back(outcome);
    }

    /// Queue an outcome for the next present on any swapchain
    pub fn script_present(&self, outcome: PresentOutcome) {
        self.present_script.lock().unwrap_or_else(|p| p.into_inner()).push_back(outcome);
    }

    /// Snapshot access to the log
    pub fn with_log<R>(&self, f: impl FnOnce(&mut MockLog) -> R) -> R {
        with_log(&self.log, f)
    }

    /// Commands of the current recording of a command list
    pub fn commands(&self, command_list: &str) -> Vec<String> {
        self.with_log(|log| log.commands.get(command_list).cloned().unwrap_or_default())
    }

    /// Number of recordings of a command list
    pub fn recordings(&self, command_list: &str) -> usize {
        self.with_log(|log| log.recordings.get(command_list).copied().unwrap_or(0))
    }

    /// Create a shader with a fresh identity
    pub fn mock_shader(&self, name: &str, stages: &[ShaderStage]) -> Arc<dyn Shader> {
        Arc::new(MockShader {
            id: self.next_id(),
            name: name.to_string(),
            stages: stages.to_vec(),
        })
    }
}

impl FramebufferSizeProvider for MockGraphicsDevice {
    fn framebuffer_size(&self) -> (u32, u32) {
        *self.surface_size.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_buffer(&self, desc: &BufferDesc, data: Option<&[u8]>) -> Result<Arc<dyn Buffer>> {
        let mut content = vec![0u8; desc.size as usize];
        if let Some(data) = data {
            if data.len() as u64 > desc.size {
                engine_bail!("prism::mock", "Initial data larger than buffer '{}'", desc.name);
            }
            content[..data.len()].copy_from_slice(data);
        }
        self.with_log(|log| log.created_buffers.push(desc.name.clone()));
        Ok(Arc::new(MockBuffer {
            name: desc.name.clone(),
            size: desc.size,
            location: desc.location,
            data: Mutex::new(content),
        }))
    }

    fn create_image(&self, desc: &ImageDesc, _layers_data: &[&[u8]]) -> Result<Arc<dyn DeviceImage>> {
        if desc.mip_levels > 1 && !self.supports_linear_blit(desc.format) {
            engine_bail!("prism::mock", "Linear blit unsupported for {:?}", desc.format);
        }
        self.with_log(|log| log.created_images.push(desc.clone()));
        Ok(Arc::new(MockImage { desc: desc.clone() }))
    }

    fn supports_linear_blit(&self, format: TextureFormat) -> bool {
        !self.unsupported_blit_formats.lock().unwrap_or_else(|p| p.into_inner()).contains(&format)
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn Sampler>> {
        self.with_log(|log| log.created_samplers += 1);
        Ok(Arc::new(MockSampler { desc: *desc }))
    }

    fn create_shader(&self, desc: &ShaderDesc) -> Result<Arc<dyn Shader>> {
        Ok(Arc::new(MockShader {
            id: self.next_id(),
            name: desc.name.clone(),
            stages: desc.stages.iter().map(|s| s.stage).collect(),
        }))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        self.with_log(|log| log.created_render_passes.push(desc.clone()));
        Ok(Arc::new(MockRenderPass))
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>> {
        self.with_log(|log| log.created_framebuffers.push((desc.width, desc.height)));
        Ok(Arc::new(MockFramebuffer { width: desc.width, height: desc.height }))
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn DevicePipeline>> {
        self.with_log(|log| log.created_pipelines.push(desc.name.clone()));
        Ok(Arc::new(MockPipeline {
            name: desc.name.clone(),
            pipeline_type: desc.pipeline_type,
        }))
    }

    fn create_descriptor_sets(&self, desc: &DescriptorSetDesc) -> Result<Vec<Arc<dyn DescriptorSet>>> {
        self.with_log(|log| log.created_descriptor_sets += desc.count as usize);
        Ok((0..desc.count)
            .map(|_| Arc::new(MockDescriptorSet { log: self.log.clone() }) as Arc<dyn DescriptorSet>)
            .collect())
    }

    fn create_command_list(&self, name: &str) -> Result<Box<dyn CommandList>> {
        self.with_log(|log| log.created_command_lists.push(name.to_string()));
        Ok(Box::new(MockCommandList { name: name.to_string(), log: self.log.clone() }))
    }

    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>> {
        Ok(Arc::new(MockFence { log: self.log.clone(), signaled: Mutex::new(signaled) }))
    }

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>> {
        self.with_log(|log| log.created_semaphores += 1);
        Ok(Arc::new(MockSemaphore { id: self.next_id() }))
    }

    fn create_swapchain(&self, _desc: &SwapchainDesc) -> Result<Box<dyn Swapchain>> {
        let (width, height) = *self.surface_size.lock().unwrap_or_else(|p| p.into_inner());
        if width == 0 || height == 0 {
            engine_bail!("prism::mock", "Invalid surface size {}x{}", width, height);
        }
        let images = (0..self.swapchain_image_count)
            .map(|i| {
                Arc::new(MockImage {
                    desc: ImageDesc {
                        name: format!("swapchain image {}", i),
                        width,
                        height,
                        layers: 1,
                        mip_levels: 1,
                        format: TextureFormat::B8G8R8A8_SRGB,
                        view_type: ImageViewType::Type2D,
                        writable: None,
                    },
                }) as Arc<dyn DeviceImage>
            })
            .collect();
        self.with_log(|log| log.created_swapchains += 1);
        Ok(Box::new(MockSwapchain {
            log: self.log.clone(),
            extent: (width, height),
            images,
            next_image: 0,
            acquire_script: self.acquire_script.clone(),
            present_script: self.present_script.clone(),
        }))
    }

    fn submit(&self, info: &SubmitInfo) -> Result<()> {
        // SAFETY: every command list submitted to the mock device was created by it
        let command_list = unsafe {
            &*(info.command_list as *const dyn CommandList as *const MockCommandList)
        };
        let submission = MockSubmission {
            command_list: command_list.name.clone(),
            wait: info.wait.iter().map(|w| semaphore_id(&w.semaphore)).collect(),
            signal: info.signal.iter().map(semaphore_id).collect(),
            fence: info.fence.is_some(),
        };
        self.with_log(|log| log.submissions.push(submission));
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.with_log(|log| log.wait_idle_count += 1);
        Ok(())
    }

    fn capture_image(&self, _image: &Arc<dyn DeviceImage>, width: u32, height: u32) -> Result<Vec<u8>> {
        self.with_log(|log| log.captures += 1);
        Ok(vec![0u8; (width * height * 4) as usize])
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
