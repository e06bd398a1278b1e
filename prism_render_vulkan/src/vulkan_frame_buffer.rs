/// Framebuffer - Vulkan implementation of the Framebuffer trait
///
/// Wraps a VkFramebuffer over single-layer views of its attachments.
/// Keeps the attachments and the render pass alive while it exists.

use prism_render::graphics_device::{
    DeviceImage, Framebuffer as DeviceFramebuffer, FramebufferAttachment, FramebufferDesc,
    RenderPass as DeviceRenderPass,
};
use prism_render::prism::Result;
use prism_render::{engine_bail, engine_err};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_image::Image;
use crate::vulkan_render_pass::RenderPass;

/// Vulkan framebuffer implementation
pub struct Framebuffer {
    ctx: Arc<GpuContext>,
    /// Vulkan framebuffer handle
    pub(crate) framebuffer: vk::Framebuffer,
    /// Width in pixels
    width: u32,
    /// Height in pixels
    height: u32,
    _render_pass: Arc<dyn DeviceRenderPass>,
    _attachments: Vec<Arc<dyn DeviceImage>>,
}

impl Framebuffer {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &FramebufferDesc) -> Result<Self> {
        if desc.width == 0 || desc.height == 0 {
            engine_bail!("prism::vulkan", "Framebuffer size {}x{} is invalid", desc.width, desc.height);
        }

        let attachments: Vec<&FramebufferAttachment> = desc
            .color_attachments
            .iter()
            .chain(desc.depth_attachment.iter())
            .collect();

        let mut views = Vec::with_capacity(attachments.len());
        for attachment in &attachments {
            let image = unsafe { &*(Arc::as_ptr(&attachment.image) as *const Image) };
            let view = image.layer_views.get(attachment.layer as usize).ok_or_else(|| {
                engine_err!(
                    "prism::vulkan",
                    "Layer {} of image '{}' cannot be used as an attachment",
                    attachment.layer, image.desc().name
                )
            })?;
            views.push(*view);
        }

        let vk_render_pass = unsafe { &*(Arc::as_ptr(&desc.render_pass) as *const RenderPass) };
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(vk_render_pass.render_pass)
            .attachments(&views)
            .width(desc.width)
            .height(desc.height)
            .layers(1);

        let framebuffer = unsafe {
            ctx.device
                .create_framebuffer(&create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create framebuffer: {:?}", e))?
        };

        Ok(Self {
            ctx,
            framebuffer,
            width: desc.width,
            height: desc.height,
            _render_pass: Arc::clone(&desc.render_pass),
            _attachments: attachments.iter().map(|attachment| Arc::clone(&attachment.image)).collect(),
        })
    }
}

impl DeviceFramebuffer for Framebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
