/// Offscreen render target - renders into textures read by other targets
///
/// Each submission signals one semaphore per downstream reader planned for
/// the frame. A reader pops exactly one of them; a semaphore popped twice in
/// the same frame is an error, as is rendering again before every semaphore
/// of the previous submission was consumed.

use std::sync::Arc;

use crate::config::RenderConfig;
use crate::context::GraphicsContext;
use crate::error::{Error, Result};
use crate::graphics_device::{
    AttachmentDesc, Fence, FramebufferAttachment, GraphicsDevice, ImageLayout, LoadOp, OutputUsage,
    Semaphore, StoreOp, SubmitInfo, WaitSemaphore,
};
use crate::render_graph::{ProcessorArena, TargetHandle, TextureArena, TextureHandle};
use crate::target::render_target::{config_error, texture_of, TargetSurface};
use crate::target::{DepthPolicy, RenderTarget, RenderTargetKind};
use crate::texture::TextureType;
use crate::{engine_debug, engine_trace};

/// Clear color used when an output is cleared without an explicit color (orange)
pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [1.0, 0.5, 0.0, 1.0];

/// How an output texture's previous content is treated at the start of the pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadType {
    /// Content undefined (fully overwritten)
    NoLoad,
    /// Cleared to the output's clear color
    LoadClear,
    /// Previous content kept (texture written by an earlier target)
    LoadContent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputTexture {
    pub texture: TextureHandle,
    pub load_type: LoadType,
    pub clear_color: Option<[f32; 4]>,
    pub output_usage: OutputUsage,
    pub enabled: bool,
}

/// Offscreen-specific state of a render target
pub struct OffscreenTarget {
    width: u32,
    height: u32,
    layers: u32,
    is_array: bool,
    outputs: Vec<OutputTexture>,
    /// Framebuffer set recorded (index of the enabled output in per-output mode)
    active_framebuffer_set: usize,
    fence: Option<Arc<dyn Fence>>,
    submit_semaphores: Vec<Arc<dyn Semaphore>>,
    submit_frame_index: Option<u64>,
    remaining_submit_semaphores: usize,
    submit_semaphores_stale: bool,
}

impl OffscreenTarget {
    pub(crate) fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            layers: 0,
            is_array: false,
            outputs: Vec::new(),
            active_framebuffer_set: 0,
            fence: None,
            submit_semaphores: Vec::new(),
            submit_frame_index: None,
            remaining_submit_semaphores: 0,
            submit_semaphores_stale: false,
        }
    }

    // ===== OUTPUTS =====

    pub(crate) fn set_output_size(&mut self, width: u32, height: u32, layers: u32, is_array: bool) -> Result<()> {
        if width == 0 || height == 0 || layers == 0 {
            return Err(config_error(format!("Invalid output size of {}x{}x{}", width, height, layers)));
        }
        debug_assert!(is_array || layers == 1, "non-array output with {} layers", layers);
        self.width = width;
        self.height = height;
        self.layers = layers;
        self.is_array = is_array;
        Ok(())
    }

    pub(crate) fn add_output_texture(
        &mut self,
        target_name: &str,
        output: OutputTexture,
        device: &dyn GraphicsDevice,
        textures: &mut TextureArena,
    ) -> Result<()> {
        if output.output_usage == OutputUsage::Compute && output.load_type != LoadType::NoLoad {
            return Err(config_error(format!(
                "Compute output textures cannot be loaded on render target: {}",
                target_name
            )));
        }
        let texture = textures
            .get_mut(output.texture)
            .ok_or_else(|| Error::InvalidResource(format!("Output texture of '{}' was removed", target_name)))?;
        let size = (texture.width(), texture.height(), texture.layers());
        if self.layers != 0 && size != (self.width, self.height, self.layers) {
            return Err(config_error(format!(
                "Output texture '{}' ({}x{}x{}) does not match the size of render target '{}' ({}x{}x{})",
                texture.name(),
                texture.width(),
                texture.height(),
                texture.layers(),
                target_name,
                self.width,
                self.height,
                self.layers
            )));
        }

        match output.load_type {
            LoadType::LoadContent => {
                if !texture.is_writable() {
                    return Err(config_error(format!(
                        "Content of the texture '{}' must already be written to be loaded by render target: {}",
                        texture.name(),
                        target_name
                    )));
                }
            }
            LoadType::LoadClear | LoadType::NoLoad => {
                if output.load_type == LoadType::LoadClear && output.clear_color.is_none() {
                    return Err(config_error(format!(
                        "Clear color is missing for texture '{}' on render target: {}",
                        texture.name(),
                        target_name
                    )));
                }
                texture.enable_texture_writing(output.output_usage)?;
            }
        }
        texture.initialize(device)?;

        if self.layers == 0 {
            (self.width, self.height, self.layers) = size;
            self.is_array = texture.texture_type() == TextureType::Array;
        }
        self.outputs.push(output);
        Ok(())
    }

    /// Render only into `texture`, one framebuffer per output
    ///
    /// Returns true when the render pass layout changed (the target must be
    /// rebuilt when initialized).
    pub(crate) fn enable_only_output(
        &mut self,
        target_name: &str,
        texture: TextureHandle,
        textures: &TextureArena,
    ) -> Result<bool> {
        let index = self
            .outputs
            .iter()
            .position(|output| output.texture == texture)
            .ok_or_else(|| config_error(format!("Texture is not an output of render target: {}", target_name)))?;
        let image_shape = |handle: TextureHandle| {
            textures
                .get(handle)
                .map(|t| (t.width(), t.height(), t.layers(), t.format()))
        };
        debug_assert!(
            self.outputs.windows(2).all(|pair| pair[0].load_type == pair[1].load_type
                && pair[0].output_usage == pair[1].output_usage
                && pair[0].clear_color == pair[1].clear_color
                && image_shape(pair[0].texture) == image_shape(pair[1].texture)),
            "outputs of '{}' are not interchangeable",
            target_name
        );

        let was_per_output = self.is_per_output();
        for (i, output) in self.outputs.iter_mut().enumerate() {
            output.enabled = i == index;
        }
        self.active_framebuffer_set = index;
        Ok(was_per_output != self.is_per_output())
    }

    /// One framebuffer set per output when some outputs are disabled
    fn is_per_output(&self) -> bool {
        self.outputs.iter().any(|output| !output.enabled)
    }

    pub(crate) fn clear_outputs(&mut self) {
        self.outputs.clear();
        self.width = 0;
        self.height = 0;
        self.layers = 0;
        self.is_array = false;
        self.active_framebuffer_set = 0;
    }

    pub fn outputs(&self) -> &[OutputTexture] {
        &self.outputs
    }

    /// Enabled outputs whose previous content is loaded
    pub fn loaded_outputs(&self) -> impl Iterator<Item = TextureHandle> + '_ {
        self.outputs
            .iter()
            .filter(|output| output.enabled && output.load_type == LoadType::LoadContent)
            .map(|output| output.texture)
    }

    pub(crate) fn active_framebuffer_set(&self) -> usize {
        self.active_framebuffer_set
    }

    pub fn output_size(&self) -> (u32, u32, u32) {
        (self.width, self.height, self.layers)
    }

    fn has_compute_outputs(&self) -> bool {
        self.outputs.iter().any(|output| output.output_usage == OutputUsage::Compute)
    }

    // ===== LIFECYCLE =====

    pub(crate) fn create_surface(
        &mut self,
        name: &str,
        depth_policy: DepthPolicy,
        device: &dyn GraphicsDevice,
        config: &RenderConfig,
        textures: &TextureArena,
    ) -> Result<TargetSurface> {
        if self.layers == 0 {
            return Err(config_error(format!("Output size not defined on render target: {}", name)));
        }
        let graphics = !self.has_compute_outputs();
        if !graphics && depth_policy != DepthPolicy::None {
            return Err(config_error(format!("Compute render target '{}' cannot have a depth attachment", name)));
        }

        let mut color_attachments = Vec::new();
        for output in self.outputs.iter().filter(|output| output.enabled) {
            let texture = texture_of(textures, output.texture)?;
            let final_layout = match output.output_usage {
                OutputUsage::Graphics => ImageLayout::ShaderReadOnly,
                OutputUsage::Compute => ImageLayout::General,
            };
            color_attachments.push(AttachmentDesc {
                format: texture.format(),
                samples: 1,
                load_op: match output.load_type {
                    LoadType::LoadContent => LoadOp::Load,
                    LoadType::LoadClear => LoadOp::Clear,
                    LoadType::NoLoad => LoadOp::DontCare,
                },
                store_op: StoreOp::Store,
                initial_layout: if output.load_type == LoadType::LoadContent { final_layout } else { ImageLayout::Undefined },
                final_layout,
            });
        }

        let layer_attachments = |outputs: &[OutputTexture]| -> Result<Vec<Vec<FramebufferAttachment>>> {
            (0..self.layers)
                .map(|layer| {
                    outputs
                        .iter()
                        .map(|output| {
                            let image = texture_of(textures, output.texture)?.image()?.clone();
                            Ok(FramebufferAttachment { image, layer })
                        })
                        .collect()
                })
                .collect()
        };
        let clear_colors = |outputs: &[OutputTexture]| -> Vec<[f32; 4]> {
            outputs.iter().map(|output| output.clear_color.unwrap_or(DEFAULT_CLEAR_COLOR)).collect()
        };
        let (color_sets, set_clear_colors) = if !graphics {
            (Vec::new(), Vec::new())
        } else if self.is_per_output() {
            let sets = self
                .outputs
                .iter()
                .map(|output| layer_attachments(std::slice::from_ref(output)))
                .collect::<Result<Vec<_>>>()?;
            let colors = self.outputs.iter().map(|output| clear_colors(std::slice::from_ref(output))).collect();
            (sets, colors)
        } else {
            (vec![layer_attachments(&self.outputs)?], vec![clear_colors(&self.outputs)])
        };

        self.fence = Some(device.create_fence(true)?);
        self.submit_semaphores = (0..config.max_submit_semaphores)
            .map(|_| device.create_semaphore())
            .collect::<Result<Vec<_>>>()?;
        self.remaining_submit_semaphores = 0;
        self.submit_semaphores_stale = false;
        if !self.is_per_output() {
            self.active_framebuffer_set = 0;
        }

        Ok(TargetSurface {
            width: self.width,
            height: self.height,
            layers: self.layers,
            is_array: self.is_array,
            slot_count: 1,
            graphics,
            color_attachments,
            color_sets,
            clear_colors: set_clear_colors,
        })
    }

    pub(crate) fn cleanup(&mut self) {
        self.fence = None;
        self.submit_semaphores.clear();
        self.remaining_submit_semaphores = 0;
    }

    // ===== SUBMIT SEMAPHORES =====

    pub(crate) fn pop_submit_semaphore(
        &mut self,
        target_name: &str,
        frame_index: u64,
        requester: &str,
    ) -> Result<Option<Arc<dyn Semaphore>>> {
        if self.submit_frame_index != Some(frame_index) {
            // Rendered during an earlier frame: already synchronized
            debug_assert!(self.submit_frame_index.map_or(true, |frame| frame < frame_index));
            return Ok(None);
        }
        if self.remaining_submit_semaphores == 0 {
            return Err(Error::InvalidResource(format!(
                "No more submit semaphore available on render target: {}/{} (requester: {})",
                target_name, frame_index, requester
            )));
        }
        self.remaining_submit_semaphores -= 1;
        Ok(Some(self.submit_semaphores[self.remaining_submit_semaphores].clone()))
    }

    pub(crate) fn mark_submit_semaphore_unused(&mut self, target_name: &str, frame_index: u64) -> Result<()> {
        if self.pop_submit_semaphore(target_name, frame_index, target_name)?.is_some() {
            // Signaled but never waited: recreated before the next submission
            self.submit_semaphores_stale = true;
        }
        Ok(())
    }

    /// Semaphores signaled during the current frame and not yet popped
    pub fn remaining_submit_semaphores(&self) -> usize {
        self.remaining_submit_semaphores
    }
}

impl RenderTarget {
    pub fn offscreen(&self) -> Result<&OffscreenTarget> {
        match &self.kind {
            RenderTargetKind::Offscreen(offscreen) => Ok(offscreen),
            RenderTargetKind::Screen(_) => {
                Err(Error::InvalidResource(format!("Render target '{}' is not an offscreen target", self.name)))
            }
        }
    }

    pub(crate) fn offscreen_mut(&mut self) -> Result<&mut OffscreenTarget> {
        match &mut self.kind {
            RenderTargetKind::Offscreen(offscreen) => Ok(offscreen),
            RenderTargetKind::Screen(_) => {
                Err(Error::InvalidResource(format!("Render target '{}' is not an offscreen target", self.name)))
            }
        }
    }

    /// Set the size of the outputs (required for depth-only targets)
    pub(crate) fn set_output_size(&mut self, width: u32, height: u32, layers: u32, is_array: bool) -> Result<()> {
        self.ensure_not_initialized("set the output size")?;
        self.offscreen_mut()?.set_output_size(width, height, layers, is_array)
    }

    /// Add a texture rendered into (before initialization)
    ///
    /// The texture is made writable and initialized, except for loaded
    /// outputs which must already be writable.
    pub(crate) fn add_output_texture(
        &mut self,
        output: OutputTexture,
        device: &dyn GraphicsDevice,
        textures: &mut TextureArena,
    ) -> Result<()> {
        self.ensure_not_initialized("add an output texture")?;
        let name = self.name.clone();
        self.offscreen_mut()?.add_output_texture(&name, output, device, textures)
    }

    /// Drop every output, forgetting this target as their writer
    pub(crate) fn reset_output(&mut self, own_handle: TargetHandle, textures: &mut TextureArena) -> Result<()> {
        self.ensure_not_initialized("reset the outputs")?;
        let offscreen = self.offscreen_mut()?;
        let written: Vec<TextureHandle> = offscreen.outputs.iter().map(|output| output.texture).collect();
        offscreen.clear_outputs();
        for texture in written.into_iter().chain(self.depth_texture) {
            if let Some(texture) = textures.get_mut(texture) {
                if texture.last_writer() == Some(own_handle) {
                    texture.set_last_writer(None);
                }
            }
        }
        Ok(())
    }

    fn ensure_not_initialized(&self, action: &str) -> Result<()> {
        if self.is_initialized() {
            return Err(config_error(format!(
                "Cannot {} of initialized render target: {}",
                action, self.name
            )));
        }
        Ok(())
    }

    /// Textures this target writes: its outputs and its shared depth
    pub fn written_textures(&self) -> Vec<TextureHandle> {
        match &self.kind {
            RenderTargetKind::Offscreen(offscreen) => offscreen
                .outputs
                .iter()
                .map(|output| output.texture)
                .chain(self.depth_texture.filter(|_| self.depth_policy == DepthPolicy::Shared))
                .collect(),
            RenderTargetKind::Screen(_) => Vec::new(),
        }
    }

    /// Wait for the previous submission and validate the submit semaphores
    pub(crate) fn begin_offscreen_frame(
        &mut self,
        frame_index: u64,
        num_dependents: usize,
        context: &GraphicsContext,
    ) -> Result<Option<usize>> {
        let max_submit_semaphores = context.config().max_submit_semaphores;
        let name = self.name.clone();
        let offscreen = self.offscreen_mut()?;
        let fence = offscreen
            .fence
            .clone()
            .ok_or_else(|| Error::InvalidResource(format!("Render target '{}' is not initialized", name)))?;
        fence.wait()?;

        if num_dependents > max_submit_semaphores {
            return Err(config_error(format!(
                "Number of dependencies to output ({}) is higher than the maximum expected on render target: {}/{}",
                num_dependents, name, frame_index
            )));
        }
        if offscreen.remaining_submit_semaphores != 0 {
            return Err(config_error(format!(
                "Not all submit semaphores (remaining: {}) have been consumed on render target: {}/{}",
                offscreen.remaining_submit_semaphores, name, frame_index
            )));
        }
        if offscreen.submit_semaphores_stale {
            let device = context.device();
            device.wait_idle()?;
            offscreen.submit_semaphores = (0..max_submit_semaphores)
                .map(|_| device.create_semaphore())
                .collect::<Result<Vec<_>>>()?;
            offscreen.submit_semaphores_stale = false;
            engine_debug!("prism::OffscreenTarget", "Recreated stale submit semaphores of '{}'", name);
        }
        Ok(Some(0))
    }

    /// Record when needed and submit, signaling one semaphore per dependent
    pub(crate) fn submit_offscreen_frame(
        &mut self,
        own_handle: TargetHandle,
        frame_index: u64,
        num_dependents: usize,
        dependency_waits: Vec<WaitSemaphore>,
        context: &mut GraphicsContext,
        processors: &mut ProcessorArena,
        textures: &mut TextureArena,
    ) -> Result<()> {
        self.update_processor_data(0, context, processors, textures)?;
        self.update_command_list(0, processors, textures)?;

        for texture in self.written_textures() {
            if let Some(texture) = textures.get_mut(texture) {
                texture.set_last_writer(Some(own_handle));
            }
        }

        let name = self.name.clone();
        let offscreen = self.offscreen_mut()?;
        let fence = offscreen
            .fence
            .clone()
            .ok_or_else(|| Error::InvalidResource(format!("Render target '{}' is not initialized", name)))?;
        let signal: Vec<Arc<dyn Semaphore>> = offscreen.submit_semaphores[..num_dependents].to_vec();
        offscreen.remaining_submit_semaphores = num_dependents;
        offscreen.submit_frame_index = Some(frame_index);

        fence.reset()?;
        let resources = self
            .resources
            .as_ref()
            .ok_or_else(|| Error::InvalidResource(format!("Render target '{}' is not initialized", name)))?;
        context.device().submit(&SubmitInfo {
            command_list: resources.command_lists[0].as_ref(),
            wait: &dependency_waits,
            signal: &signal,
            fence: Some(fence.as_ref()),
        })?;
        engine_trace!(
            "prism::OffscreenTarget",
            "Submitted '{}' for frame {} ({} waits, {} dependents)",
            name, frame_index, dependency_waits.len(), num_dependents
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "offscreen_target_tests.rs"]
mod tests;
