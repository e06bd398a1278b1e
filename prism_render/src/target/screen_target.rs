/// Screen render target - swapchain frame loop
///
/// Frame protocol (one call per frame, render thread only):
///
/// 1. wait the fence of the current frame in flight
/// 2. acquire a swapchain image; out of date rebuilds the target and skips the frame
/// 3. wait the fence of the previous frame that used the acquired image
/// 4. upload processor data and re-record the image's command list when stale
/// 5. submit waiting on image availability and on the upstream targets
/// 6. present; out of date or suboptimal rebuilds the target
/// 7. advance to the next frame in flight

use std::sync::Arc;

use crate::config::RenderConfig;
use crate::context::GraphicsContext;
use crate::data::MAX_FRAME_SLOTS;
use crate::error::{Error, Result};
use crate::graphics_device::{
    AcquireOutcome, AttachmentDesc, Fence, FramebufferAttachment, FramebufferSizeProvider,
    GraphicsDevice, ImageLayout, LoadOp, PipelineStages, PresentOutcome, Semaphore, StoreOp,
    SubmitInfo, Swapchain, SwapchainDesc, WaitSemaphore,
};
use crate::render_graph::{ProcessorArena, TextureArena};
use crate::target::render_target::{config_error, TargetSurface};
use crate::target::{RenderTarget, RenderTargetKind};
use crate::texture::CapturedImage;
use crate::{engine_debug, engine_error, engine_info, engine_warn};

/// Clear color of the swapchain images
const SCREEN_CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Synchronization objects of one frame in flight
#[derive(Clone)]
struct FrameSync {
    image_available: Arc<dyn Semaphore>,
    render_finished: Arc<dyn Semaphore>,
    fence: Arc<dyn Fence>,
}

/// Screen-specific state of a render target
pub struct ScreenTarget {
    size_provider: Arc<dyn FramebufferSizeProvider>,
    vertical_sync: bool,
    swapchain: Option<Box<dyn Swapchain>>,
    frames: Vec<FrameSync>,
    /// Fence of the frame in flight that last rendered each swapchain image
    image_fences: Vec<Option<Arc<dyn Fence>>>,
    current_frame: usize,
    acquired_image: Option<u32>,
    presentation_errors_logged: u32,
}

impl ScreenTarget {
    pub(crate) fn new(size_provider: Arc<dyn FramebufferSizeProvider>, vertical_sync: bool) -> Self {
        Self {
            size_provider,
            vertical_sync,
            swapchain: None,
            frames: Vec::new(),
            image_fences: Vec::new(),
            current_frame: 0,
            acquired_image: None,
            presentation_errors_logged: 0,
        }
    }

    /// Create the swapchain and the per-frame synchronization objects
    pub(crate) fn create_surface(
        &mut self,
        name: &str,
        device: &dyn GraphicsDevice,
        config: &RenderConfig,
    ) -> Result<TargetSurface> {
        let (width, height) = self.size_provider.framebuffer_size();
        let swapchain = device.create_swapchain(&SwapchainDesc {
            width,
            height,
            vertical_sync: self.vertical_sync,
        })?;
        let (width, height) = swapchain.extent();
        let image_count = swapchain.image_count();
        if image_count > MAX_FRAME_SLOTS {
            return Err(config_error(format!(
                "Swapchain of render target '{}' has {} images, at most {} frame slots are supported",
                name, image_count, MAX_FRAME_SLOTS
            )));
        }

        let color_sets = (0..image_count)
            .map(|index| {
                let image = swapchain.image(index).ok_or_else(|| {
                    Error::BackendError(format!("Swapchain image {} missing on render target: {}", index, name))
                })?;
                Ok(vec![vec![FramebufferAttachment { image, layer: 0 }]])
            })
            .collect::<Result<Vec<_>>>()?;

        self.frames = (0..config.frames_in_flight)
            .map(|_| {
                Ok(FrameSync {
                    image_available: device.create_semaphore()?,
                    render_finished: device.create_semaphore()?,
                    fence: device.create_fence(true)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.image_fences = vec![None; image_count];
        self.current_frame = 0;
        self.acquired_image = None;

        let surface = TargetSurface {
            width,
            height,
            layers: 1,
            is_array: false,
            slot_count: image_count,
            graphics: true,
            color_attachments: vec![AttachmentDesc {
                format: swapchain.format(),
                samples: 1,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                initial_layout: ImageLayout::Undefined,
                final_layout: ImageLayout::PresentSrc,
            }],
            color_sets,
            clear_colors: vec![vec![SCREEN_CLEAR_COLOR]; image_count],
        };
        self.swapchain = Some(swapchain);
        Ok(surface)
    }

    pub(crate) fn cleanup(&mut self) {
        self.image_fences.clear();
        self.frames.clear();
        self.swapchain = None;
        self.acquired_image = None;
    }

    pub fn is_vertical_sync_enabled(&self) -> bool {
        self.vertical_sync
    }

    /// Frame in flight used by the next frame
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Swapchain image acquired by the last rendered frame
    pub fn acquired_image(&self) -> Option<u32> {
        self.acquired_image
    }

    fn swapchain_mut(&mut self) -> Result<&mut Box<dyn Swapchain>> {
        self.swapchain
            .as_mut()
            .ok_or_else(|| Error::InvalidResource("Screen render target is not initialized".to_string()))
    }

    fn current_sync(&self) -> Result<FrameSync> {
        self.frames
            .get(self.current_frame)
            .cloned()
            .ok_or_else(|| Error::InvalidResource("Screen render target is not initialized".to_string()))
    }
}

impl RenderTarget {
    pub(crate) fn screen(&self) -> Result<&ScreenTarget> {
        match &self.kind {
            RenderTargetKind::Screen(screen) => Ok(screen),
            RenderTargetKind::Offscreen(_) => {
                Err(Error::InvalidResource(format!("Render target '{}' is not a screen target", self.name)))
            }
        }
    }

    pub(crate) fn screen_mut(&mut self) -> Result<&mut ScreenTarget> {
        match &mut self.kind {
            RenderTargetKind::Screen(screen) => Ok(screen),
            RenderTargetKind::Offscreen(_) => {
                Err(Error::InvalidResource(format!("Render target '{}' is not a screen target", self.name)))
            }
        }
    }

    /// Wait for the frame in flight and acquire the next swapchain image
    ///
    /// Returns the acquired image index (the frame slot), or None when the
    /// swapchain was out of date: the target has been rebuilt and the frame
    /// must be skipped.
    pub(crate) fn begin_screen_frame(
        &mut self,
        num_dependents: usize,
        context: &mut GraphicsContext,
        processors: &mut ProcessorArena,
        textures: &mut TextureArena,
    ) -> Result<Option<usize>> {
        if num_dependents != 0 {
            return Err(config_error(format!(
                "No dependencies to outputs expected on screen render target: {}",
                self.name
            )));
        }
        let screen = self.screen_mut()?;
        let sync = screen.current_sync()?;
        sync.fence.wait()?;

        let outcome = screen.swapchain_mut()?.acquire_next_image(&sync.image_available)?;
        let image_index = match outcome {
            AcquireOutcome::Acquired { image_index, suboptimal } => {
                if suboptimal {
                    engine_debug!("prism::ScreenTarget", "Suboptimal swapchain image acquired on '{}'", self.name);
                }
                image_index
            }
            AcquireOutcome::OutOfDate => {
                engine_warn!("prism::ScreenTarget", "Swapchain out of date on '{}', frame skipped", self.name);
                self.on_resize(context, processors, textures)?;
                return Ok(None);
            }
        };

        let screen = self.screen_mut()?;
        let slot = image_index as usize;
        if let Some(previous) = screen.image_fences.get(slot).cloned().flatten() {
            previous.wait()?;
        }
        if let Some(image_fence) = screen.image_fences.get_mut(slot) {
            *image_fence = Some(sync.fence.clone());
        }
        screen.acquired_image = Some(image_index);
        Ok(Some(slot))
    }

    /// Record when needed, submit and present the acquired image
    pub(crate) fn submit_screen_frame(
        &mut self,
        slot: usize,
        dependency_waits: Vec<WaitSemaphore>,
        context: &mut GraphicsContext,
        processors: &mut ProcessorArena,
        textures: &mut TextureArena,
    ) -> Result<()> {
        self.update_processor_data(slot, context, processors, textures)?;
        self.update_command_list(slot, processors, textures)?;

        let sync = self.screen()?.current_sync()?;
        let mut wait = Vec::with_capacity(dependency_waits.len() + 1);
        wait.push(WaitSemaphore {
            semaphore: sync.image_available.clone(),
            stages: PipelineStages::COLOR_ATTACHMENT_OUTPUT,
        });
        wait.extend(dependency_waits);

        sync.fence.reset()?;
        let resources = self
            .resources
            .as_ref()
            .ok_or_else(|| Error::InvalidResource(format!("Render target '{}' is not initialized", self.name)))?;
        context.device().submit(&SubmitInfo {
            command_list: resources.command_lists[slot].as_ref(),
            wait: &wait,
            signal: &[sync.render_finished.clone()],
            fence: Some(sync.fence.as_ref()),
        })?;

        let max_error_logs = context.config().max_error_logs;
        let screen = self.screen_mut()?;
        let outcome = screen.swapchain_mut()?.present(slot as u32, &sync.render_finished)?;
        screen.current_frame = (screen.current_frame + 1) % screen.frames.len();
        let log_error = outcome == PresentOutcome::FullScreenExclusiveLost
            && screen.presentation_errors_logged < max_error_logs;
        if log_error {
            screen.presentation_errors_logged += 1;
        }
        match outcome {
            PresentOutcome::Presented => Ok(()),
            PresentOutcome::Suboptimal | PresentOutcome::OutOfDate => {
                engine_debug!("prism::ScreenTarget", "Presentation of '{}' requires a rebuild ({:?})", self.name, outcome);
                self.on_resize(context, processors, textures)
            }
            PresentOutcome::FullScreenExclusiveLost => {
                if log_error {
                    engine_error!(
                        "prism::ScreenTarget",
                        "Error when queuing an image for presentation: full-screen exclusive mode lost ({})",
                        self.name
                    );
                }
                self.on_resize(context, processors, textures)
            }
        }
    }

    /// Rebuild the target at the window's current size
    ///
    /// Skipped while the window reports a zero size (minimized).
    pub fn on_resize(
        &mut self,
        context: &mut GraphicsContext,
        processors: &mut ProcessorArena,
        textures: &mut TextureArena,
    ) -> Result<()> {
        let (width, height) = self.screen()?.size_provider.framebuffer_size();
        if width == 0 || height == 0 {
            engine_debug!("prism::ScreenTarget", "Resize of '{}' skipped: invalid size {}x{}", self.name, width, height);
            return Ok(());
        }
        self.cleanup(context.device().as_ref(), processors, textures)?;
        self.initialize(context, processors, textures)?;
        engine_info!("prism::ScreenTarget", "Screen render target '{}' resized to {}x{}", self.name, width, height);
        Ok(())
    }

    /// Switch vertical synchronization, rebuilding the swapchain when it changes
    pub fn update_vertical_sync(
        &mut self,
        vertical_sync: bool,
        context: &mut GraphicsContext,
        processors: &mut ProcessorArena,
        textures: &mut TextureArena,
    ) -> Result<()> {
        let screen = self.screen_mut()?;
        if screen.vertical_sync == vertical_sync {
            return Ok(());
        }
        screen.vertical_sync = vertical_sync;
        if self.is_initialized() {
            self.cleanup(context.device().as_ref(), processors, textures)?;
            self.initialize(context, processors, textures)?;
        }
        Ok(())
    }

    /// Read back the last acquired swapchain image as RGBA8
    pub fn take_screenshot(&self, device: &dyn GraphicsDevice, width: u32, height: u32) -> Result<CapturedImage> {
        let screen = self.screen()?;
        let image = screen
            .acquired_image
            .and_then(|index| screen.swapchain.as_ref()?.image(index as usize))
            .ok_or_else(|| {
                Error::InvalidResource(format!("No swapchain image rendered yet on render target: {}", self.name))
            })?;
        let pixels = device.capture_image(&image, width, height)?;
        Ok(CapturedImage { width, height, pixels })
    }
}

#[cfg(test)]
#[path = "screen_target_tests.rs"]
mod tests;
