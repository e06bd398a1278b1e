/// Framebuffer trait - groups the attachments a render pass renders into

use std::sync::Arc;
use crate::graphics_device::{DeviceImage, RenderPass};

/// Framebuffer resource trait
pub trait Framebuffer: Send + Sync {
    /// Get the width in pixels
    fn width(&self) -> u32;

    /// Get the height in pixels
    fn height(&self) -> u32;
}

/// One attachment: a single layer of a device image
#[derive(Clone)]
pub struct FramebufferAttachment {
    pub image: Arc<dyn DeviceImage>,
    pub layer: u32,
}

/// Descriptor for creating a framebuffer
#[derive(Clone)]
pub struct FramebufferDesc {
    /// The render pass this framebuffer is compatible with
    pub render_pass: Arc<dyn RenderPass>,
    /// Color attachments, in render pass order
    pub color_attachments: Vec<FramebufferAttachment>,
    /// Optional depth attachment
    pub depth_attachment: Option<FramebufferAttachment>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}
