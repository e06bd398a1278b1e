/// Render target core - render pass, framebuffers and per-slot command lists
///
/// A target records its enabled processors into one command list per frame
/// slot. A slot is re-recorded only when the target or one of its enabled
/// processors reports the slot's commands as stale; otherwise the previous
/// recording is submitted again as is.
///
/// Per-slot refresh state:
///
/// ```text
/// Clean --attach/detach/enable/disable/descriptor change--> Dirty
///   ^                                                         |
///   +-------------------- update_command_list ----------------+
/// ```

use std::hash::{Hash, Hasher};
use std::sync::Arc;
use rustc_hash::FxHasher;

use crate::context::GraphicsContext;
use crate::error::{Error, Result};
use crate::graphics_device::{
    AttachmentDesc, ClearValue, CommandList, DeviceImage, Framebuffer, FramebufferAttachment, FramebufferDesc,
    GraphicsDevice, ImageLayout, LoadOp, OutputUsage, PipelineStages, PipelineType, Rect2D,
    RenderPass, RenderPassDesc, Semaphore, StoreOp, TextureFormat, WaitSemaphore,
};
use crate::processor::Processor;
use crate::render_graph::{ProcessorArena, ProcessorHandle, TargetHandle, TextureArena, TextureHandle};
use crate::target::{OffscreenTarget, ScreenTarget};
use crate::texture::{Texture, TextureCopier};
use crate::{engine_debug, engine_error, engine_info};

/// Depth value the depth attachment is cleared to
const DEPTH_CLEAR_VALUE: f32 = 1.0;

pub(crate) fn config_error(message: String) -> Error {
    engine_error!("prism::RenderTarget", "{}", message);
    Error::InvalidConfiguration(message)
}

// ===== DEPTH POLICY =====

/// Ownership of a target's depth attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthPolicy {
    /// No depth attachment
    None,
    /// Owned by the target, cleared and discarded every frame
    Local,
    /// Owned by the target, cleared then kept for other targets to sample
    Shared,
    /// Shared depth of another target, loaded and kept
    External,
}

// ===== TARGET INFO =====

/// What a pipeline needs to know about the target it renders into
#[derive(Clone)]
pub struct RenderTargetInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    /// Number of frame slots (swapchain images, 1 offscreen)
    pub slot_count: usize,
    /// None for compute targets
    pub render_pass: Option<Arc<dyn RenderPass>>,
    pub render_pass_compatibility_id: u64,
    pub color_attachment_count: usize,
    pub has_depth_attachment: bool,
}

// ===== KIND =====

pub enum RenderTargetKind {
    Screen(ScreenTarget),
    Offscreen(OffscreenTarget),
}

/// Attachments a target kind renders into, produced at initialization
pub(crate) struct TargetSurface {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub is_array: bool,
    pub slot_count: usize,
    /// False for compute targets (no render pass)
    pub graphics: bool,
    pub color_attachments: Vec<AttachmentDesc>,
    /// Color attachments of each framebuffer set, per layer
    pub color_sets: Vec<Vec<Vec<FramebufferAttachment>>>,
    /// Clear colors of each framebuffer set
    pub clear_colors: Vec<Vec<[f32; 4]>>,
}

/// GPU objects of an initialized target
pub(crate) struct TargetResources {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub render_pass: Option<Arc<dyn RenderPass>>,
    pub compatibility_id: u64,
    pub color_attachment_count: usize,
    /// Framebuffers per set, per layer
    pub framebuffers: Vec<Vec<Arc<dyn Framebuffer>>>,
    pub clear_values: Vec<Vec<ClearValue>>,
    pub command_lists: Vec<Box<dyn CommandList>>,
    pub slot_dirty: Vec<bool>,
    /// Depth image the framebuffers were built on
    pub depth_image: Option<Arc<dyn DeviceImage>>,
}

// ===== RENDER TARGET =====

pub struct RenderTarget {
    pub(crate) name: String,
    pub(crate) depth_policy: DepthPolicy,
    pub(crate) depth_texture: Option<TextureHandle>,
    pub(crate) processors: Vec<ProcessorHandle>,
    pub(crate) texture_copiers: Vec<TextureCopier>,
    pub(crate) resources: Option<TargetResources>,
    pub(crate) kind: RenderTargetKind,
}

impl RenderTarget {
    pub(crate) fn new(name: &str, depth_policy: DepthPolicy, kind: RenderTargetKind) -> Self {
        Self {
            name: name.to_string(),
            depth_policy,
            depth_texture: None,
            processors: Vec::new(),
            texture_copiers: Vec::new(),
            resources: None,
            kind,
        }
    }

    // ===== LIFECYCLE =====

    /// Build the render pass, depth texture, framebuffers, command lists and
    /// synchronization objects, then initialize the attached processors
    pub(crate) fn initialize(
        &mut self,
        context: &mut GraphicsContext,
        processors: &mut ProcessorArena,
        textures: &mut TextureArena,
    ) -> Result<()> {
        if self.resources.is_some() {
            return Ok(());
        }
        let device = context.device().clone();
        let surface = match &mut self.kind {
            RenderTargetKind::Screen(screen) => screen.create_surface(&self.name, device.as_ref(), context.config())?,
            RenderTargetKind::Offscreen(offscreen) => {
                offscreen.create_surface(&self.name, self.depth_policy, device.as_ref(), context.config(), textures)?
            }
        };
        let depth = self.prepare_depth_texture(device.as_ref(), &surface, processors, textures)?;
        let depth_image = match depth {
            Some(handle) => Some(texture_of(textures, handle)?.image()?.clone()),
            None => None,
        };

        let mut render_pass = None;
        let mut compatibility_id = 0;
        let mut framebuffers = Vec::new();
        let mut clear_values = Vec::new();
        if surface.graphics {
            let desc = RenderPassDesc {
                color_attachments: surface.color_attachments.clone(),
                depth_attachment: depth.map(|_| depth_attachment_desc(self.depth_policy)),
            };
            compatibility_id = render_pass_compatibility_id(&desc);
            let pass = device.create_render_pass(&desc)?;

            for (color_set, clear_colors) in surface.color_sets.iter().zip(&surface.clear_colors) {
                let set = (0..surface.layers as usize)
                    .map(|layer| {
                        device.create_framebuffer(&FramebufferDesc {
                            render_pass: pass.clone(),
                            color_attachments: color_set.get(layer).cloned().unwrap_or_default(),
                            depth_attachment: depth_image
                                .as_ref()
                                .map(|image| FramebufferAttachment { image: image.clone(), layer: layer as u32 }),
                            width: surface.width,
                            height: surface.height,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                framebuffers.push(set);

                let mut values: Vec<ClearValue> = clear_colors.iter().map(|c| ClearValue::Color(*c)).collect();
                if depth.is_some() {
                    values.push(ClearValue::DepthStencil { depth: DEPTH_CLEAR_VALUE, stencil: 0 });
                }
                clear_values.push(values);
            }
            render_pass = Some(pass);
        }

        let command_lists = (0..surface.slot_count)
            .map(|slot| device.create_command_list(&format!("{} - slot{}", self.name, slot)))
            .collect::<Result<Vec<_>>>()?;

        self.resources = Some(TargetResources {
            width: surface.width,
            height: surface.height,
            layers: surface.layers,
            render_pass,
            compatibility_id,
            color_attachment_count: surface.color_attachments.len(),
            framebuffers,
            clear_values,
            command_lists,
            slot_dirty: vec![true; surface.slot_count],
            depth_image,
        });

        let info = self.info()?;
        for handle in &self.processors {
            if let Some(processor) = processors.get_mut(*handle) {
                processor.initialize(context, &info)?;
            }
        }
        engine_info!(
            "prism::RenderTarget",
            "Initialized render target '{}' ({}x{}x{}, {} slots)",
            self.name, info.width, info.height, info.layers, info.slot_count
        );
        Ok(())
    }

    /// Create (or recreate in place) the owned depth texture, or check the external one
    fn prepare_depth_texture(
        &mut self,
        device: &dyn GraphicsDevice,
        surface: &TargetSurface,
        processors: &mut ProcessorArena,
        textures: &mut TextureArena,
    ) -> Result<Option<TextureHandle>> {
        match self.depth_policy {
            DepthPolicy::None => Ok(None),
            DepthPolicy::External => {
                let handle = self.depth_texture.ok_or_else(|| {
                    config_error(format!("External depth texture not set on render target: {}", self.name))
                })?;
                let texture = textures
                    .get(handle)
                    .ok_or_else(|| Error::InvalidResource(format!("External depth texture of '{}' was removed", self.name)))?;
                if texture.layers() != surface.layers {
                    return Err(config_error(format!(
                        "External depth texture has {} layers but render target '{}' has {}",
                        texture.layers(),
                        self.name,
                        surface.layers
                    )));
                }
                if !texture.is_initialized() {
                    return Err(Error::InvalidResource(format!(
                        "External depth texture '{}' of render target '{}' is not initialized",
                        texture.name(),
                        self.name
                    )));
                }
                Ok(Some(handle))
            }
            DepthPolicy::Local | DepthPolicy::Shared => {
                let name = format!("{} - depth", self.name);
                let mut texture = if surface.is_array {
                    Texture::build_array(&name, surface.width, surface.height, surface.layers, TextureFormat::D32_FLOAT, None)?
                } else {
                    Texture::build(&name, surface.width, surface.height, TextureFormat::D32_FLOAT, None)?
                };
                texture.enable_texture_writing(OutputUsage::Graphics)?;
                texture.initialize(device)?;

                match self.depth_texture.filter(|handle| textures.contains_key(*handle)) {
                    Some(handle) => {
                        // Same handle across rebuilds: readers rebind the new image
                        texture.set_last_writer(textures[handle].last_writer());
                        textures[handle] = texture;
                        for processor in processors.values_mut() {
                            processor.on_texture_image_replaced(handle);
                        }
                    }
                    None => self.depth_texture = Some(textures.insert(texture)),
                }
                Ok(self.depth_texture)
            }
        }
    }

    /// Whether the external depth texture got a new image since the
    /// framebuffers were built (its owner was rebuilt)
    fn external_depth_replaced(&self, textures: &TextureArena) -> bool {
        if self.depth_policy != DepthPolicy::External {
            return false;
        }
        let built = self.resources.as_ref().and_then(|resources| resources.depth_image.as_ref());
        let current = self.depth_texture.and_then(|handle| textures.get(handle)?.image().ok());
        built.zip(current).is_some_and(|(built, current)| !Arc::ptr_eq(built, current))
    }

    /// Release everything built by `initialize` (no-op when not initialized)
    ///
    /// Waits for the device first: the command lists and framebuffers may
    /// still be in use by pending submissions.
    pub(crate) fn cleanup(
        &mut self,
        device: &dyn GraphicsDevice,
        processors: &mut ProcessorArena,
        textures: &mut TextureArena,
    ) -> Result<()> {
        if self.resources.is_none() {
            return Ok(());
        }
        device.wait_idle()?;
        for handle in &self.processors {
            if let Some(processor) = processors.get_mut(*handle) {
                processor.cleanup();
            }
        }
        match &mut self.kind {
            RenderTargetKind::Screen(screen) => screen.cleanup(),
            RenderTargetKind::Offscreen(offscreen) => offscreen.cleanup(),
        }
        if matches!(self.depth_policy, DepthPolicy::Local | DepthPolicy::Shared) {
            if let Some(texture) = self.depth_texture.and_then(|handle| textures.get_mut(handle)) {
                texture.cleanup();
            }
        }
        self.resources = None;
        engine_debug!("prism::RenderTarget", "Released render target '{}'", self.name);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.resources.is_some()
    }

    // ===== PROCESSORS =====

    /// Attach a processor; every slot is re-recorded
    pub(crate) fn add_processor(&mut self, handle: ProcessorHandle, processor: &Processor, processors: &ProcessorArena) {
        debug_assert!(
            processor.pipeline_type() == PipelineType::Graphics || !self.has_depth_attachment(),
            "compute processor '{}' on render target '{}' with depth attachment",
            processor.name(),
            self.name
        );
        debug_assert!(
            self.processors
                .iter()
                .filter_map(|h| processors.get(*h))
                .all(|p| p.pipeline_type() == processor.pipeline_type()),
            "render target '{}' mixes graphics and compute processors",
            self.name
        );
        debug_assert!(!self.processors.contains(&handle), "processor '{}' attached twice", processor.name());
        self.processors.push(handle);
        self.mark_dirty();
    }

    pub(crate) fn remove_processor(&mut self, handle: ProcessorHandle) {
        debug_assert!(self.processors.contains(&handle), "processor not attached to render target '{}'", self.name);
        self.processors.retain(|h| *h != handle);
        self.mark_dirty();
    }

    /// Re-record every slot before its next submission
    pub(crate) fn mark_dirty(&mut self) {
        if let Some(resources) = self.resources.as_mut() {
            resources.slot_dirty.fill(true);
        }
    }

    /// Attached processors, in attachment order
    pub fn processors(&self) -> &[ProcessorHandle] {
        &self.processors
    }

    /// Enabled processors in recording order: rendering order, then pipeline id
    pub fn sorted_enabled_processors(&self, processors: &ProcessorArena) -> Vec<ProcessorHandle> {
        let mut sorted: Vec<ProcessorHandle> = self
            .processors
            .iter()
            .copied()
            .filter(|h| processors.get(*h).is_some_and(Processor::is_enabled))
            .collect();
        sorted.sort_by_key(|h| {
            let processor = &processors[*h];
            (processor.rendering_order(), processor.pipeline_id())
        });
        sorted
    }

    fn has_graphics_processors(&self, processors: &ProcessorArena) -> bool {
        self.processors
            .iter()
            .filter_map(|h| processors.get(*h))
            .any(|p| p.pipeline_type() == PipelineType::Graphics)
    }

    // ===== TEXTURE COPIERS =====

    /// Copy `source` into `destination` at the start of every recording
    pub(crate) fn add_texture_copier(
        &mut self,
        copier: TextureCopier,
        device: &dyn GraphicsDevice,
        textures: &mut TextureArena,
    ) -> Result<()> {
        copier.initialize(device, textures)?;
        self.texture_copiers.push(copier);
        self.mark_dirty();
        Ok(())
    }

    pub(crate) fn remove_all_texture_copiers(&mut self) {
        self.texture_copiers.clear();
        self.mark_dirty();
    }

    pub fn texture_copiers(&self) -> &[TextureCopier] {
        &self.texture_copiers
    }

    // ===== DEPTH =====

    pub fn depth_policy(&self) -> DepthPolicy {
        self.depth_policy
    }

    pub fn has_depth_attachment(&self) -> bool {
        self.depth_policy != DepthPolicy::None
    }

    /// Depth texture other targets may use (Shared or External policy)
    pub fn depth_texture(&self) -> Result<TextureHandle> {
        match (self.depth_policy, self.depth_texture) {
            (DepthPolicy::Shared | DepthPolicy::External, Some(handle)) => Ok(handle),
            _ => Err(Error::InvalidResource(format!("No shareable depth texture on render target: {}", self.name))),
        }
    }

    /// Use the shared depth texture of another target (before initialization)
    pub(crate) fn set_external_depth_texture(&mut self, handle: TextureHandle, textures: &TextureArena) -> Result<()> {
        if self.depth_policy != DepthPolicy::External {
            return Err(config_error(format!("Render target '{}' has no external depth policy", self.name)));
        }
        if self.is_initialized() {
            return Err(config_error(format!(
                "External depth texture must be set before initialization of render target: {}",
                self.name
            )));
        }
        let texture = texture_of(textures, handle)?;
        if !texture.is_depth_format() {
            return Err(config_error(format!("Texture '{}' is not a depth texture", texture.name())));
        }
        self.depth_texture = Some(handle);
        Ok(())
    }

    // ===== FRAME =====

    /// Upload the staged data of every enabled processor for one slot
    pub(crate) fn update_processor_data(
        &self,
        slot: usize,
        context: &mut GraphicsContext,
        processors: &mut ProcessorArena,
        textures: &TextureArena,
    ) -> Result<()> {
        for handle in &self.processors {
            if let Some(processor) = processors.get_mut(*handle) {
                if processor.is_enabled() {
                    processor.update_graphic_data(slot, context, textures)?;
                }
            }
        }
        Ok(())
    }

    /// Whether the slot must be re-recorded before submission
    pub fn needs_command_list_refresh(&self, slot: usize, processors: &ProcessorArena) -> bool {
        let target_dirty = self
            .resources
            .as_ref()
            .is_some_and(|r| r.slot_dirty.get(slot).copied().unwrap_or(true));
        target_dirty
            || self
                .processors
                .iter()
                .filter_map(|h| processors.get(*h))
                .any(|p| p.is_enabled() && p.needs_command_list_refresh(slot))
    }

    /// Framebuffer set recorded for a slot
    fn framebuffer_set(&self, slot: usize) -> usize {
        match &self.kind {
            RenderTargetKind::Screen(_) => slot,
            RenderTargetKind::Offscreen(offscreen) => offscreen.active_framebuffer_set(),
        }
    }

    /// Re-record the slot's command list when stale
    ///
    /// The caller guarantees the slot's previous submission has completed.
    /// Returns true when the command list was recorded.
    pub(crate) fn update_command_list(
        &mut self,
        slot: usize,
        processors: &mut ProcessorArena,
        textures: &TextureArena,
    ) -> Result<bool> {
        if !self.needs_command_list_refresh(slot, processors) {
            return Ok(false);
        }
        let sorted = self.sorted_enabled_processors(processors);
        let set = self.framebuffer_set(slot);
        let resources = self
            .resources
            .as_mut()
            .ok_or_else(|| Error::InvalidResource(format!("Render target '{}' is not initialized", self.name)))?;

        let command_list = resources.command_lists[slot].as_mut();
        command_list.reset()?;
        command_list.begin()?;
        for copier in &self.texture_copiers {
            copier.execute_copy(command_list, textures)?;
        }

        let render_area = Rect2D::from_size(resources.width, resources.height);
        for layer in 0..resources.layers {
            if let Some(render_pass) = &resources.render_pass {
                command_list.begin_render_pass(
                    render_pass,
                    &resources.framebuffers[set][layer as usize],
                    render_area,
                    &resources.clear_values[set],
                )?;
            }
            let mut bound_pipeline_id = 0;
            for handle in &sorted {
                bound_pipeline_id = processors[*handle].update_command_list(command_list, slot, layer, bound_pipeline_id)?;
            }
            if resources.render_pass.is_some() {
                command_list.end_render_pass()?;
            }
        }
        command_list.end()?;

        for handle in &sorted {
            processors[*handle].mark_recorded(slot);
        }
        resources.slot_dirty[slot] = false;
        engine_debug!(
            "prism::RenderTarget",
            "Recorded slot {} of '{}' ({} processors)",
            slot, self.name, sorted.len()
        );
        Ok(true)
    }

    // ===== DEPENDENCIES =====

    /// Textures this target's next submission reads
    ///
    /// The enabled processors' texture readers, the texture copier sources,
    /// the external depth texture and the loaded offscreen outputs.
    pub fn textures_read(&self, processors: &ProcessorArena) -> Vec<TextureHandle> {
        let read_by_processors = self
            .processors
            .iter()
            .filter_map(|h| processors.get(*h))
            .filter(|p| p.is_enabled())
            .flat_map(|p| p.textures_read());
        let copied = self.texture_copiers.iter().map(TextureCopier::source);
        let external_depth = self.depth_texture.filter(|_| self.depth_policy == DepthPolicy::External);
        let loaded_outputs: Vec<TextureHandle> = match &self.kind {
            RenderTargetKind::Offscreen(offscreen) => offscreen.loaded_outputs().collect(),
            RenderTargetKind::Screen(_) => Vec::new(),
        };
        read_by_processors.chain(copied).chain(external_depth).chain(loaded_outputs).collect()
    }

    /// Targets whose last submission wrote a texture this target reads
    ///
    /// Each upstream target appears once, in discovery order.
    pub fn render_dependencies(&self, processors: &ProcessorArena, textures: &TextureArena) -> Vec<TargetHandle> {
        self.dependencies_with(processors, |texture| textures.get(texture).and_then(Texture::last_writer))
    }

    /// Dependencies resolved through an arbitrary texture-to-writer lookup
    pub(crate) fn dependencies_with(
        &self,
        processors: &ProcessorArena,
        writer_of: impl Fn(TextureHandle) -> Option<TargetHandle>,
    ) -> Vec<TargetHandle> {
        let mut dependencies = Vec::new();
        for writer in self.textures_read(processors).into_iter().filter_map(writer_of) {
            if !dependencies.contains(&writer) {
                dependencies.push(writer);
            }
        }
        dependencies
    }

    /// Stages at which this target's submission waits for its dependencies
    pub fn dependency_wait_stages(&self, processors: &ProcessorArena) -> PipelineStages {
        let mut stages = if self.has_graphics_processors(processors) {
            let mut graphics = PipelineStages::COLOR_ATTACHMENT_OUTPUT | PipelineStages::FRAGMENT_SHADER;
            if self.has_depth_attachment() {
                graphics |= PipelineStages::EARLY_FRAGMENT_TESTS;
            }
            graphics
        } else {
            PipelineStages::COMPUTE_SHADER
        };
        if !self.texture_copiers.is_empty() {
            stages |= PipelineStages::TRANSFER;
        }
        stages
    }

    // ===== FRAME PROTOCOL =====

    /// Wait until the target can be recorded again and pick the frame slot
    ///
    /// Returns None when the frame must be skipped (screen swapchain out of
    /// date); the caller then releases the dependencies' semaphores.
    pub(crate) fn begin_frame(
        &mut self,
        frame_index: u64,
        num_dependents: usize,
        context: &mut GraphicsContext,
        processors: &mut ProcessorArena,
        textures: &mut TextureArena,
    ) -> Result<Option<usize>> {
        if !self.is_initialized() {
            return Err(Error::InvalidResource(format!("Render target '{}' is not initialized", self.name)));
        }
        if self.external_depth_replaced(textures) {
            engine_debug!("prism::RenderTarget", "External depth of '{}' was rebuilt, rebuilding target", self.name);
            self.cleanup(context.device().as_ref(), processors, textures)?;
            self.initialize(context, processors, textures)?;
        }
        if self.is_screen() {
            self.begin_screen_frame(num_dependents, context, processors, textures)
        } else {
            self.begin_offscreen_frame(frame_index, num_dependents, context)
        }
    }

    /// Upload, record when stale and submit the slot picked by `begin_frame`
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn submit_frame(
        &mut self,
        own_handle: TargetHandle,
        slot: usize,
        frame_index: u64,
        num_dependents: usize,
        dependency_waits: Vec<WaitSemaphore>,
        context: &mut GraphicsContext,
        processors: &mut ProcessorArena,
        textures: &mut TextureArena,
    ) -> Result<()> {
        if self.is_screen() {
            self.submit_screen_frame(slot, dependency_waits, context, processors, textures)
        } else {
            self.submit_offscreen_frame(
                own_handle,
                frame_index,
                num_dependents,
                dependency_waits,
                context,
                processors,
                textures,
            )
        }
    }

    /// Consume one of this frame's submit semaphores (offscreen targets only)
    ///
    /// Returns None when the target has not rendered during `frame_index`:
    /// its output is a previous frame's and needs no wait.
    pub fn pop_submit_semaphore(&mut self, frame_index: u64, requester: &str) -> Result<Option<Arc<dyn Semaphore>>> {
        match &mut self.kind {
            RenderTargetKind::Offscreen(offscreen) => offscreen.pop_submit_semaphore(&self.name, frame_index, requester),
            RenderTargetKind::Screen(_) => Ok(None),
        }
    }

    /// A dependent target skipped its submission: drop one semaphore unwaited
    pub fn mark_submit_semaphore_unused(&mut self, frame_index: u64) -> Result<()> {
        match &mut self.kind {
            RenderTargetKind::Offscreen(offscreen) => offscreen.mark_submit_semaphore_unused(&self.name, frame_index),
            RenderTargetKind::Screen(_) => Ok(()),
        }
    }

    // ===== ACCESSORS =====

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &RenderTargetKind {
        &self.kind
    }

    pub fn is_screen(&self) -> bool {
        matches!(self.kind, RenderTargetKind::Screen(_))
    }

    pub fn width(&self) -> u32 {
        self.resources.as_ref().map_or(0, |r| r.width)
    }

    pub fn height(&self) -> u32 {
        self.resources.as_ref().map_or(0, |r| r.height)
    }

    pub fn layers(&self) -> u32 {
        self.resources.as_ref().map_or(0, |r| r.layers)
    }

    /// Number of frame slots, 0 before initialization
    pub fn slot_count(&self) -> usize {
        self.resources.as_ref().map_or(0, |r| r.command_lists.len())
    }

    pub fn render_pass_compatibility_id(&self) -> u64 {
        self.resources.as_ref().map_or(0, |r| r.compatibility_id)
    }

    /// Snapshot used to build pipelines against this target
    pub fn info(&self) -> Result<RenderTargetInfo> {
        let resources = self
            .resources
            .as_ref()
            .ok_or_else(|| Error::InvalidResource(format!("Render target '{}' is not initialized", self.name)))?;
        Ok(RenderTargetInfo {
            name: self.name.clone(),
            width: resources.width,
            height: resources.height,
            layers: resources.layers,
            slot_count: resources.command_lists.len(),
            render_pass: resources.render_pass.clone(),
            render_pass_compatibility_id: resources.compatibility_id,
            color_attachment_count: resources.color_attachment_count,
            has_depth_attachment: self.has_depth_attachment(),
        })
    }
}

pub(crate) fn texture_of(textures: &TextureArena, handle: TextureHandle) -> Result<&Texture> {
    textures
        .get(handle)
        .ok_or_else(|| Error::InvalidResource("Render target uses a removed texture".to_string()))
}

fn depth_attachment_desc(depth_policy: DepthPolicy) -> AttachmentDesc {
    let external = depth_policy == DepthPolicy::External;
    AttachmentDesc {
        format: TextureFormat::D32_FLOAT,
        samples: 1,
        load_op: if external { LoadOp::Load } else { LoadOp::Clear },
        store_op: if depth_policy == DepthPolicy::Local { StoreOp::DontCare } else { StoreOp::Store },
        initial_layout: if external { ImageLayout::ShaderReadOnly } else { ImageLayout::Undefined },
        final_layout: if depth_policy == DepthPolicy::Local {
            ImageLayout::DepthStencilAttachment
        } else {
            ImageLayout::ShaderReadOnly
        },
    }
}

/// Hash of the attachment references, formats and sample counts
///
/// Pipelines built against one render pass are valid in any render pass
/// with the same id.
pub(crate) fn render_pass_compatibility_id(desc: &RenderPassDesc) -> u64 {
    let mut hasher = FxHasher::default();
    for (index, attachment) in desc.color_attachments.iter().enumerate() {
        index.hash(&mut hasher);
        attachment.format.hash(&mut hasher);
        attachment.samples.hash(&mut hasher);
    }
    match &desc.depth_attachment {
        Some(attachment) => {
            desc.color_attachments.len().hash(&mut hasher);
            attachment.format.hash(&mut hasher);
            attachment.samples.hash(&mut hasher);
        }
        None => u32::MAX.hash(&mut hasher),
    }
    hasher.finish()
}

#[cfg(test)]
#[path = "render_target_tests.rs"]
mod tests;
