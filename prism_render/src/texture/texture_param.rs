/// Sampling parameters and the shared sampler cache

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::engine_trace;
use crate::error::Result;
use crate::graphics_device::{AddressMode, Filter, GraphicsDevice, Sampler, SamplerDesc};

/// Anisotropy requested when enabled (clamped by the device limit)
const MAX_ANISOTROPY: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadMode {
    EdgeClamp,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadQuality {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anisotropy {
    Disabled,
    Enabled,
}

/// How a texture is sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureParam {
    pub read_mode: ReadMode,
    pub read_quality: ReadQuality,
    pub anisotropy: Anisotropy,
}

impl TextureParam {
    pub fn new(read_mode: ReadMode, read_quality: ReadQuality, anisotropy: Anisotropy) -> Self {
        Self { read_mode, read_quality, anisotropy }
    }

    pub fn nearest() -> Self {
        Self::new(ReadMode::EdgeClamp, ReadQuality::Nearest, Anisotropy::Disabled)
    }

    pub fn linear() -> Self {
        Self::new(ReadMode::EdgeClamp, ReadQuality::Linear, Anisotropy::Disabled)
    }

    pub fn repeat_nearest() -> Self {
        Self::new(ReadMode::Repeat, ReadQuality::Nearest, Anisotropy::Disabled)
    }

    pub fn repeat_linear() -> Self {
        Self::new(ReadMode::Repeat, ReadQuality::Linear, Anisotropy::Disabled)
    }

    /// Sampler description for an image with `mip_levels` levels
    pub fn sampler_desc(&self, mip_levels: u32) -> SamplerDesc {
        SamplerDesc {
            address_mode: match self.read_mode {
                ReadMode::EdgeClamp => AddressMode::ClampToEdge,
                ReadMode::Repeat => AddressMode::Repeat,
            },
            filter: match self.read_quality {
                ReadQuality::Nearest => Filter::Nearest,
                ReadQuality::Linear => Filter::Linear,
            },
            max_anisotropy: match self.anisotropy {
                Anisotropy::Disabled => 0,
                Anisotropy::Enabled => MAX_ANISOTROPY,
            },
            mip_levels,
        }
    }
}

impl Default for TextureParam {
    fn default() -> Self {
        Self::nearest()
    }
}

/// Device samplers shared by every reader with the same parameters
///
/// Lives in the graphics context; samplers are released with it.
#[derive(Default)]
pub struct SamplerCache {
    samplers: FxHashMap<SamplerDesc, Arc<dyn Sampler>>,
}

impl SamplerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(
        &mut self,
        device: &dyn GraphicsDevice,
        param: &TextureParam,
        mip_levels: u32,
    ) -> Result<Arc<dyn Sampler>> {
        let desc = param.sampler_desc(mip_levels);
        if let Some(sampler) = self.samplers.get(&desc) {
            return Ok(sampler.clone());
        }
        engine_trace!("prism::SamplerCache", "Creating sampler {:?}", desc);
        let sampler = device.create_sampler(&desc)?;
        self.samplers.insert(desc, sampler.clone());
        Ok(sampler)
    }

    pub fn len(&self) -> usize {
        self.samplers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }
}

#[cfg(test)]
#[path = "texture_param_tests.rs"]
mod tests;
