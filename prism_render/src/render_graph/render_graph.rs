/// RenderGraph - owns textures, render targets and processors, and drives frames
///
/// Offscreen targets are rendered in dependency order (producers first),
/// screen targets last. Ordering between dependent targets is GPU-side only:
/// a target's submission waits on one submit semaphore popped from each
/// upstream target that rendered earlier in the same frame.

use std::collections::VecDeque;
use std::sync::Arc;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::context::GraphicsContext;
use crate::error::{Error, Result};
use crate::graphics_device::{FramebufferSizeProvider, GraphicsDevice, OutputUsage, WaitSemaphore};
use crate::processor::{Processor, ProcessorDesc};
use crate::render_graph::{
    ProcessorArena, ProcessorHandle, TargetArena, TargetHandle, TextureArena, TextureHandle,
};
use crate::target::{
    DepthPolicy, LoadType, OffscreenTarget, OutputTexture, RenderTarget, RenderTargetKind, ScreenTarget,
};
use crate::texture::{CapturedImage, Texture, TextureCopier, TextureReader};
use crate::{engine_debug, engine_error, engine_info};

fn graph_error(message: String) -> Error {
    engine_error!("prism::RenderGraph", "{}", message);
    Error::InvalidConfiguration(message)
}

fn target_mut(targets: &mut TargetArena, handle: TargetHandle) -> Result<&mut RenderTarget> {
    targets
        .get_mut(handle)
        .ok_or_else(|| Error::InvalidResource("Render target no longer exists".to_string()))
}

fn processor_mut(processors: &mut ProcessorArena, handle: ProcessorHandle) -> Result<&mut Processor> {
    processors
        .get_mut(handle)
        .ok_or_else(|| Error::InvalidResource("Processor no longer exists".to_string()))
}

/// Render graph
///
/// Every GPU-facing object of the render core lives here and is addressed
/// by a generation-checked handle. Mutations that invalidate recorded
/// commands go through the graph so the owning target is marked dirty.
pub struct RenderGraph {
    context: GraphicsContext,
    textures: TextureArena,
    targets: TargetArena,
    processors: ProcessorArena,
}

impl RenderGraph {
    pub fn new(context: GraphicsContext) -> Self {
        Self {
            context,
            textures: TextureArena::with_key(),
            targets: TargetArena::with_key(),
            processors: ProcessorArena::with_key(),
        }
    }

    pub fn context(&self) -> &GraphicsContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut GraphicsContext {
        &mut self.context
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        self.context.device()
    }

    pub fn textures(&self) -> &TextureArena {
        &self.textures
    }

    /// Processor arena, as taken by the render target queries
    pub fn processors(&self) -> &ProcessorArena {
        &self.processors
    }

    // ===== TEXTURES =====

    pub fn add_texture(&mut self, texture: Texture) -> TextureHandle {
        self.textures.insert(texture)
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&Texture> {
        self.textures.get(handle)
    }

    /// Mutable access for configuration before initialization
    pub fn texture_mut(&mut self, handle: TextureHandle) -> Option<&mut Texture> {
        self.textures.get_mut(handle)
    }

    pub fn initialize_texture(&mut self, handle: TextureHandle) -> Result<()> {
        let device = self.context.device().clone();
        self.textures
            .get_mut(handle)
            .ok_or_else(|| Error::InvalidResource("Texture no longer exists".to_string()))?
            .initialize(device.as_ref())
    }

    /// Remove a texture no processor or target uses anymore
    pub fn remove_texture(&mut self, handle: TextureHandle) -> Result<Texture> {
        let used_by_processor = self.processors.values().find(|p| p.textures_read().any(|t| t == handle));
        if let Some(processor) = used_by_processor {
            return Err(graph_error(format!("Texture still read by processor: {}", processor.name())));
        }
        let used_by_target = self
            .targets
            .values()
            .find(|t| t.written_textures().contains(&handle) || t.textures_read(&self.processors).contains(&handle));
        if let Some(target) = used_by_target {
            return Err(graph_error(format!("Texture still used by render target: {}", target.name())));
        }
        let mut texture = self
            .textures
            .remove(handle)
            .ok_or_else(|| Error::InvalidResource("Texture no longer exists".to_string()))?;
        if texture.is_initialized() {
            self.context.device().wait_idle()?;
            texture.cleanup();
        }
        Ok(texture)
    }

    pub fn capture_texture(&self, handle: TextureHandle, width: u32, height: u32) -> Result<CapturedImage> {
        self.textures
            .get(handle)
            .ok_or_else(|| Error::InvalidResource("Texture no longer exists".to_string()))?
            .capture(self.context.device().as_ref(), width, height)
    }

    // ===== RENDER TARGETS =====

    /// Create a target presenting to the window behind `size_provider`
    pub fn create_screen_target(
        &mut self,
        name: &str,
        depth_policy: DepthPolicy,
        size_provider: Arc<dyn FramebufferSizeProvider>,
    ) -> TargetHandle {
        let screen = ScreenTarget::new(size_provider, self.context.config().vertical_sync);
        self.targets.insert(RenderTarget::new(name, depth_policy, RenderTargetKind::Screen(screen)))
    }

    /// Create a target rendering into textures
    pub fn create_offscreen_target(&mut self, name: &str, depth_policy: DepthPolicy) -> TargetHandle {
        self.targets
            .insert(RenderTarget::new(name, depth_policy, RenderTargetKind::Offscreen(OffscreenTarget::new())))
    }

    pub fn render_target(&self, handle: TargetHandle) -> Option<&RenderTarget> {
        self.targets.get(handle)
    }

    pub fn render_targets(&self) -> impl Iterator<Item = (TargetHandle, &RenderTarget)> {
        self.targets.iter()
    }

    /// Build the target's GPU objects and initialize its processors
    pub fn initialize_target(&mut self, handle: TargetHandle) -> Result<()> {
        let Self { context, textures, targets, processors } = self;
        target_mut(targets, handle)?.initialize(context, processors, textures)
    }

    pub fn cleanup_target(&mut self, handle: TargetHandle) -> Result<()> {
        let Self { context, textures, targets, processors } = self;
        target_mut(targets, handle)?.cleanup(context.device().as_ref(), processors, textures)
    }

    /// Remove a target without processors, forgetting it as last writer
    pub fn remove_target(&mut self, handle: TargetHandle) -> Result<()> {
        let target = self
            .targets
            .get(handle)
            .ok_or_else(|| Error::InvalidResource("Render target no longer exists".to_string()))?;
        if !target.processors().is_empty() {
            return Err(graph_error(format!(
                "Render target '{}' still has {} processors",
                target.name(),
                target.processors().len()
            )));
        }
        self.cleanup_target(handle)?;

        let mut target = self
            .targets
            .remove(handle)
            .ok_or_else(|| Error::InvalidResource("Render target no longer exists".to_string()))?;
        for texture in self.textures.values_mut() {
            if texture.last_writer() == Some(handle) {
                texture.set_last_writer(None);
            }
        }
        if matches!(target.depth_policy(), DepthPolicy::Local | DepthPolicy::Shared) {
            if let Some(depth) = target.depth_texture.take() {
                self.textures.remove(depth);
            }
        }
        engine_debug!("prism::RenderGraph", "Removed render target '{}'", target.name());
        Ok(())
    }

    /// Size of an offscreen target's outputs (depth-only targets)
    pub fn set_output_size(&mut self, handle: TargetHandle, width: u32, height: u32, layers: u32, is_array: bool) -> Result<()> {
        target_mut(&mut self.targets, handle)?.set_output_size(width, height, layers, is_array)
    }

    /// Add a texture an offscreen target renders into (before initialization)
    pub fn add_output_texture(
        &mut self,
        handle: TargetHandle,
        texture: TextureHandle,
        load_type: LoadType,
        clear_color: Option<[f32; 4]>,
        output_usage: OutputUsage,
    ) -> Result<()> {
        let device = self.context.device().clone();
        let output = OutputTexture { texture, load_type, clear_color, output_usage, enabled: true };
        target_mut(&mut self.targets, handle)?.add_output_texture(output, device.as_ref(), &mut self.textures)
    }

    /// Render only into one of the target's outputs
    pub fn enable_only_output(&mut self, handle: TargetHandle, texture: TextureHandle) -> Result<()> {
        let Self { context, textures, targets, processors } = self;
        let target = target_mut(targets, handle)?;
        let name = target.name().to_string();
        let layout_changed = target.offscreen_mut()?.enable_only_output(&name, texture, textures)?;
        if layout_changed && target.is_initialized() {
            target.cleanup(context.device().as_ref(), processors, textures)?;
            target.initialize(context, processors, textures)?;
        } else {
            target.mark_dirty();
        }
        Ok(())
    }

    /// Drop every output of an offscreen target (releases it first)
    pub fn reset_output(&mut self, handle: TargetHandle) -> Result<()> {
        self.cleanup_target(handle)?;
        target_mut(&mut self.targets, handle)?.reset_output(handle, &mut self.textures)
    }

    /// Shared depth texture of a target, usable as another target's external depth
    pub fn depth_texture(&self, handle: TargetHandle) -> Result<TextureHandle> {
        self.targets
            .get(handle)
            .ok_or_else(|| Error::InvalidResource("Render target no longer exists".to_string()))?
            .depth_texture()
    }

    pub fn set_external_depth_texture(&mut self, handle: TargetHandle, texture: TextureHandle) -> Result<()> {
        target_mut(&mut self.targets, handle)?.set_external_depth_texture(texture, &self.textures)
    }

    /// Copy `source` into `destination` before the target's processors run
    pub fn add_texture_copier(&mut self, handle: TargetHandle, source: TextureHandle, destination: TextureHandle) -> Result<()> {
        let device = self.context.device().clone();
        target_mut(&mut self.targets, handle)?.add_texture_copier(
            TextureCopier::new(source, destination),
            device.as_ref(),
            &mut self.textures,
        )
    }

    pub fn remove_all_texture_copiers(&mut self, handle: TargetHandle) -> Result<()> {
        target_mut(&mut self.targets, handle)?.remove_all_texture_copiers();
        Ok(())
    }

    /// Rebuild a screen target at the window's current size
    pub fn on_resize(&mut self, handle: TargetHandle) -> Result<()> {
        let Self { context, textures, targets, processors } = self;
        target_mut(targets, handle)?.on_resize(context, processors, textures)
    }

    pub fn update_vertical_sync(&mut self, handle: TargetHandle, vertical_sync: bool) -> Result<()> {
        let Self { context, textures, targets, processors } = self;
        target_mut(targets, handle)?.update_vertical_sync(vertical_sync, context, processors, textures)
    }

    pub fn take_screenshot(&self, handle: TargetHandle, width: u32, height: u32) -> Result<CapturedImage> {
        self.targets
            .get(handle)
            .ok_or_else(|| Error::InvalidResource("Render target no longer exists".to_string()))?
            .take_screenshot(self.context.device().as_ref(), width, height)
    }

    // ===== PROCESSORS =====

    /// Create a processor on a target (initialized at once when the target is)
    pub fn add_processor(&mut self, target: TargetHandle, desc: ProcessorDesc) -> Result<ProcessorHandle> {
        if !self.targets.contains_key(target) {
            return Err(Error::InvalidResource("Render target no longer exists".to_string()));
        }
        let handle = self.processors.insert(Processor::new(desc, target)?);

        let Self { context, targets, processors, .. } = self;
        let render_target = &mut targets[target];
        render_target.add_processor(handle, &processors[handle], processors);
        if render_target.is_initialized() {
            let initialized = render_target
                .info()
                .and_then(|info| processors[handle].initialize(context, &info));
            if let Err(error) = initialized {
                render_target.remove_processor(handle);
                processors.remove(handle);
                return Err(error);
            }
        }
        Ok(handle)
    }

    /// Detach and destroy a processor
    pub fn remove_processor(&mut self, handle: ProcessorHandle) -> Result<()> {
        let mut processor = self
            .processors
            .remove(handle)
            .ok_or_else(|| Error::InvalidResource("Processor no longer exists".to_string()))?;
        if let Some(target) = self.targets.get_mut(processor.target()) {
            target.remove_processor(handle);
        }
        if processor.is_initialized() {
            // Recorded command lists may still reference its buffers
            self.context.device().wait_idle()?;
            processor.cleanup();
        }
        Ok(())
    }

    pub fn processor(&self, handle: ProcessorHandle) -> Option<&Processor> {
        self.processors.get(handle)
    }

    /// Mutable access for data updates (`update_data`, `update_uniform_data`, ...)
    pub fn processor_mut(&mut self, handle: ProcessorHandle) -> Option<&mut Processor> {
        self.processors.get_mut(handle)
    }

    /// Re-enable a disabled processor at a rendering order
    pub fn enable_processor(&mut self, handle: ProcessorHandle, rendering_order: i32) -> Result<()> {
        let processor = processor_mut(&mut self.processors, handle)?;
        debug_assert!(!processor.is_enabled(), "processor '{}' is already enabled", processor.name());
        processor.set_enabled(true);
        processor.set_rendering_order(rendering_order);
        let target = processor.target();
        target_mut(&mut self.targets, target)?.mark_dirty();
        Ok(())
    }

    /// Stop recording a processor (its GPU resources are kept)
    pub fn disable_processor(&mut self, handle: ProcessorHandle) -> Result<()> {
        let processor = processor_mut(&mut self.processors, handle)?;
        if processor.is_enabled() {
            processor.set_enabled(false);
            let target = processor.target();
            target_mut(&mut self.targets, target)?.mark_dirty();
        }
        Ok(())
    }

    pub fn disable_all_processors(&mut self, target: TargetHandle) -> Result<()> {
        let render_target = target_mut(&mut self.targets, target)?;
        for handle in render_target.processors() {
            if let Some(processor) = self.processors.get_mut(*handle) {
                processor.set_enabled(false);
            }
        }
        render_target.mark_dirty();
        Ok(())
    }

    pub fn set_rendering_order(&mut self, handle: ProcessorHandle, rendering_order: i32) -> Result<()> {
        let processor = processor_mut(&mut self.processors, handle)?;
        if processor.rendering_order() != rendering_order {
            processor.set_rendering_order(rendering_order);
            let target = processor.target();
            target_mut(&mut self.targets, target)?.mark_dirty();
        }
        Ok(())
    }

    /// Bind another texture to a single-texture reader of a processor
    pub fn update_uniform_texture_reader(&mut self, handle: ProcessorHandle, position: usize, reader: TextureReader) -> Result<()> {
        processor_mut(&mut self.processors, handle)?.update_uniform_texture_reader(position, reader, &self.textures)
    }

    /// Bind another texture to one element of a texture reader array
    pub fn update_uniform_texture_reader_array(
        &mut self,
        handle: ProcessorHandle,
        position: usize,
        index: usize,
        reader: TextureReader,
    ) -> Result<()> {
        processor_mut(&mut self.processors, handle)?.update_uniform_texture_reader_array(position, index, reader, &self.textures)
    }

    // ===== DEPENDENCIES =====

    /// Upstream targets the next submission of `handle` waits on
    pub fn render_dependencies(&self, handle: TargetHandle) -> Result<Vec<TargetHandle>> {
        let target = self
            .targets
            .get(handle)
            .ok_or_else(|| Error::InvalidResource("Render target no longer exists".to_string()))?;
        let mut dependencies = target.render_dependencies(&self.processors, &self.textures);
        dependencies.retain(|dependency| *dependency != handle);
        Ok(dependencies)
    }

    /// Initialized targets in render order with the number of readers each
    /// one signals this frame
    ///
    /// Offscreen targets are ordered producers first (a producer writes a
    /// texture the consumer reads); screen targets come last. The reader
    /// counts replay the frame: a target's dependencies are resolved against
    /// the writers as they will be when it renders.
    pub fn frame_plan(&self) -> Result<Vec<(TargetHandle, usize)>> {
        let (screens, offscreens): (Vec<TargetHandle>, Vec<TargetHandle>) = self
            .targets
            .iter()
            .filter(|(_, target)| target.is_initialized())
            .map(|(handle, _)| handle)
            .partition(|handle| self.targets[*handle].is_screen());

        let mut producers: FxHashMap<TextureHandle, Vec<TargetHandle>> = FxHashMap::default();
        for handle in &offscreens {
            for texture in self.targets[*handle].written_textures() {
                producers.entry(texture).or_default().push(*handle);
            }
        }
        let mut in_degree: FxHashMap<TargetHandle, usize> = FxHashMap::default();
        let mut consumers: FxHashMap<TargetHandle, Vec<TargetHandle>> = FxHashMap::default();
        for handle in &offscreens {
            let mut upstream: Vec<TargetHandle> = Vec::new();
            for texture in self.targets[*handle].textures_read(&self.processors) {
                for producer in producers.get(&texture).into_iter().flatten() {
                    if producer != handle && !upstream.contains(producer) {
                        upstream.push(*producer);
                    }
                }
            }
            in_degree.insert(*handle, upstream.len());
            for producer in upstream {
                consumers.entry(producer).or_default().push(*handle);
            }
        }

        let mut ready: VecDeque<TargetHandle> =
            offscreens.iter().copied().filter(|handle| in_degree[handle] == 0).collect();
        let mut order = Vec::with_capacity(offscreens.len() + screens.len());
        while let Some(handle) = ready.pop_front() {
            order.push(handle);
            for consumer in consumers.get(&handle).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(consumer) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(*consumer);
                    }
                }
            }
        }
        if order.len() != offscreens.len() {
            let cyclic: Vec<&str> = offscreens
                .iter()
                .filter(|handle| !order.contains(*handle))
                .map(|handle| self.targets[*handle].name())
                .collect();
            return Err(graph_error(format!(
                "Cyclic dependency between render targets: {}",
                cyclic.join(", ")
            )));
        }
        order.extend(screens);

        let mut writers: FxHashMap<TextureHandle, TargetHandle> = FxHashMap::default();
        let mut rendered: FxHashSet<TargetHandle> = FxHashSet::default();
        let mut dependents: FxHashMap<TargetHandle, usize> = FxHashMap::default();
        for handle in &order {
            let target = &self.targets[*handle];
            let dependencies = target.dependencies_with(&self.processors, |texture| {
                writers
                    .get(&texture)
                    .copied()
                    .or_else(|| self.textures.get(texture).and_then(Texture::last_writer))
            });
            for dependency in dependencies {
                if dependency != *handle && rendered.contains(&dependency) {
                    *dependents.entry(dependency).or_default() += 1;
                }
            }
            for texture in target.written_textures() {
                writers.insert(texture, *handle);
            }
            rendered.insert(*handle);
        }

        Ok(order
            .into_iter()
            .map(|handle| (handle, dependents.get(&handle).copied().unwrap_or(0)))
            .collect())
    }

    /// Number of targets waiting on `handle` during the next frame
    pub fn num_dependents(&self, handle: TargetHandle) -> Result<usize> {
        Ok(self
            .frame_plan()?
            .into_iter()
            .find(|(planned, _)| *planned == handle)
            .map_or(0, |(_, dependents)| dependents))
    }

    // ===== FRAME =====

    /// Render one target, signaling `num_dependents` submit semaphores
    ///
    /// The dependencies' semaphores of this frame are popped and waited on.
    /// When a screen target skips its frame (swapchain out of date) they are
    /// popped and marked unused instead.
    pub fn render(&mut self, handle: TargetHandle, frame_index: u64, num_dependents: usize) -> Result<()> {
        let Self { context, textures, targets, processors } = self;
        let slot = target_mut(targets, handle)?.begin_frame(frame_index, num_dependents, context, processors, textures)?;

        let target = &targets[handle];
        let mut dependencies = target.render_dependencies(processors, textures);
        dependencies.retain(|dependency| *dependency != handle);
        let stages = target.dependency_wait_stages(processors);
        let requester = target.name().to_string();

        let Some(slot) = slot else {
            for dependency in dependencies {
                target_mut(targets, dependency)?.mark_submit_semaphore_unused(frame_index)?;
            }
            engine_info!("prism::RenderGraph", "Frame {} skipped on render target '{}'", frame_index, requester);
            return Ok(());
        };

        let mut waits = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            if let Some(semaphore) = target_mut(targets, dependency)?.pop_submit_semaphore(frame_index, &requester)? {
                waits.push(WaitSemaphore { semaphore, stages });
            }
        }
        target_mut(targets, handle)?.submit_frame(
            handle,
            slot,
            frame_index,
            num_dependents,
            waits,
            context,
            processors,
            textures,
        )
    }

    /// Render every initialized target for one frame
    pub fn render_frame(&mut self, frame_index: u64) -> Result<()> {
        for (handle, num_dependents) in self.frame_plan()? {
            self.render(handle, frame_index, num_dependents)?;
        }
        Ok(())
    }
}

impl Drop for RenderGraph {
    fn drop(&mut self) {
        let Self { context, textures, targets, processors } = self;
        let device = context.device().clone();
        if let Err(error) = device.wait_idle() {
            engine_error!("prism::RenderGraph", "Failed to wait for device idle: {}", error);
        }
        for target in targets.values_mut() {
            if let Err(error) = target.cleanup(device.as_ref(), processors, textures) {
                engine_error!("prism::RenderGraph", "Failed to release render target '{}': {}", target.name(), error);
            }
        }
        for texture in textures.values_mut() {
            texture.cleanup();
        }
    }
}

#[cfg(test)]
#[path = "render_graph_tests.rs"]
mod tests;
