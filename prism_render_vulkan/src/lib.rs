/*!
# Prism Render - Vulkan Backend

Vulkan implementation of the prism_render graphics device.

This crate implements the `GraphicsDevice` traits of prism_render using the
Ash library for Vulkan bindings and gpu-allocator for memory management.

Validation layer support is compiled in only with the `vulkan-validation`
feature; its messages are routed to the engine logger.

```no_run
use prism_render::prism::{GraphicsContext, RenderConfig, RenderGraph};
use prism_render_vulkan::VulkanGraphicsDevice;
use std::sync::Arc;

# fn run(window: &winit::window::Window) -> prism_render::prism::Result<()> {
let config = RenderConfig::default();
let device = VulkanGraphicsDevice::new(window, &config)?;
let context = GraphicsContext::new(Arc::new(device), config)?;
let mut graph = RenderGraph::new(context);
# let _ = &mut graph;
# Ok(())
# }
```
*/

mod vulkan;
mod vulkan_context;
mod vulkan_format;

// Device resources
mod vulkan_buffer;
mod vulkan_image;
mod vulkan_sampler;
mod vulkan_shader;
mod vulkan_render_pass;
mod vulkan_frame_buffer;
mod vulkan_pipeline;
mod vulkan_descriptor_set;
mod vulkan_sync;
mod vulkan_command_list;
mod vulkan_swapchain;
mod vulkan_capture;

#[cfg(feature = "vulkan-validation")]
mod debug;

pub use vulkan::VulkanGraphicsDevice;

// Re-export debug utilities
#[cfg(feature = "vulkan-validation")]
pub use debug::{print_validation_stats_report, validation_stats, ValidationStats};
