/*!
# Prism Render

GPU rendering core: pipeline cache, processors, render targets and the
render graph that orders them.

This crate provides the platform-agnostic part of the renderer. GPU objects
are created through the `GraphicsDevice` trait, implemented by the Vulkan
backend (`prism_render_vulkan`) and by a mock device in unit tests.

## Architecture

- **GraphicsContext**: device handle, configuration, pipeline and sampler caches
- **PipelineBuilder**: builds pipelines, deduplicated by a hash of their state
- **Texture**: device image with staged pixel data and last-writer tracking
- **Processor**: one draw or dispatch with its per-slot buffers and descriptor sets
- **RenderTarget**: render pass, framebuffers and per-slot command lists (screen or offscreen)
- **RenderGraph**: handle-based arenas and the frame driver
*/

// Internal modules
mod config;
mod context;
mod engine;
mod error;
pub mod data;
pub mod graphics_device;
pub mod log;
pub mod pipeline;
pub mod processor;
pub mod render_graph;
pub mod target;
pub mod texture;

// Main prism namespace module
pub mod prism {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging facade
    pub use crate::engine::Engine;

    // Configuration and context
    pub use crate::config::RenderConfig;
    pub use crate::context::GraphicsContext;

    // Device abstraction
    pub use crate::graphics_device::{
        BlendFactor, BlendFunction, FramebufferSizeProvider, GraphicsDevice, OutputUsage,
        PolygonMode, PipelineType, Rect2D, Shader, ShaderDesc, ShaderStage, ShaderStageDesc,
        TextureFormat,
    };

    // Processor inputs
    pub use crate::data::{DataContainer, VariableType};

    // Pipelines
    pub use crate::pipeline::{Pipeline, PipelineBuilder, PipelineCache, ShapeType};

    // Textures
    pub use crate::texture::{
        Anisotropy, CapturedImage, ReadMode, ReadQuality, Texture, TextureCopier, TextureParam,
        TextureReader, TextureType,
    };

    // Processors, targets and the graph
    pub use crate::processor::{Processor, ProcessorDesc};
    pub use crate::render_graph::{ProcessorHandle, RenderGraph, TargetHandle, TextureHandle};
    pub use crate::target::{DepthPolicy, LoadType, RenderTarget, RenderTargetInfo};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }
}

// Re-export math library at crate root
pub use glam;
