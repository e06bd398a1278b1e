/// GraphicsContext - the device handle and process-lifetime caches, passed down explicitly

use std::sync::Arc;
use crate::config::RenderConfig;
use crate::error::Result;
use crate::engine_info;
use crate::graphics_device::{GraphicsDevice, Sampler};
use crate::pipeline::PipelineCache;
use crate::texture::{SamplerCache, TextureParam};

/// Graphics context owned by the application root
///
/// Holds everything the render core would otherwise keep in globals:
/// the device, the configuration, the pipeline cache and the sampler cache.
pub struct GraphicsContext {
    device: Arc<dyn GraphicsDevice>,
    config: RenderConfig,
    pipeline_cache: PipelineCache,
    sampler_cache: SamplerCache,
}

impl GraphicsContext {
    /// Create a context after validating the configuration
    pub fn new(device: Arc<dyn GraphicsDevice>, config: RenderConfig) -> Result<Self> {
        config.validate()?;
        engine_info!(
            "prism::GraphicsContext",
            "Graphics context created ({} frames in flight, vsync {})",
            config.frames_in_flight,
            config.vertical_sync
        );
        Ok(Self {
            device,
            config,
            pipeline_cache: PipelineCache::new(),
            sampler_cache: SamplerCache::new(),
        })
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn pipeline_cache(&self) -> &PipelineCache {
        &self.pipeline_cache
    }

    pub fn pipeline_cache_mut(&mut self) -> &mut PipelineCache {
        &mut self.pipeline_cache
    }

    /// Shared sampler for a texture parameter and mip count
    pub fn sampler(&mut self, param: &TextureParam, mip_levels: u32) -> Result<Arc<dyn Sampler>> {
        self.sampler_cache.get_or_create(self.device.as_ref(), param, mip_levels)
    }

    pub fn sampler_cache(&self) -> &SamplerCache {
        &self.sampler_cache
    }
}
