/// Swapchain trait and window framebuffer size provider

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{DeviceImage, Semaphore, TextureFormat};

/// Result of acquiring a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired (possibly from a suboptimal swapchain)
    Acquired { image_index: u32, suboptimal: bool },
    /// The surface changed; the swapchain must be recreated
    OutOfDate,
}

/// Result of presenting a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
    /// Transient loss of full-screen exclusive mode
    FullScreenExclusiveLost,
}

/// Descriptor for creating a swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainDesc {
    /// Requested width (clamped by the backend to the surface capabilities)
    pub width: u32,
    /// Requested height
    pub height: u32,
    /// FIFO presentation when true
    pub vertical_sync: bool,
}

/// Swapchain trait - presentable images of a window surface
pub trait Swapchain: Send + Sync {
    /// Number of images in the swapchain
    fn image_count(&self) -> usize;

    /// Extent of the images (width, height)
    fn extent(&self) -> (u32, u32);

    /// Pixel format of the images
    fn format(&self) -> TextureFormat;

    /// Swapchain image by index
    fn image(&self, index: usize) -> Option<Arc<dyn DeviceImage>>;

    /// Acquire the next image (blocking, no timeout)
    ///
    /// # Arguments
    ///
    /// * `signal` - Semaphore signaled when the image is available
    fn acquire_next_image(&mut self, signal: &Arc<dyn Semaphore>) -> Result<AcquireOutcome>;

    /// Queue an image for presentation
    ///
    /// # Arguments
    ///
    /// * `image_index` - Index returned by acquire_next_image
    /// * `wait` - Semaphore signaled when rendering is finished
    fn present(&mut self, image_index: u32, wait: &Arc<dyn Semaphore>) -> Result<PresentOutcome>;
}

/// Supplies the framebuffer size in pixels of the presentation window
///
/// A zero width or height means the size is currently invalid (minimized window).
pub trait FramebufferSizeProvider: Send + Sync {
    fn framebuffer_size(&self) -> (u32, u32);
}

impl FramebufferSizeProvider for winit::window::Window {
    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.inner_size();
        (size.width, size.height)
    }
}
