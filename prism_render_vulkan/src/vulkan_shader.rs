/// Shader - Vulkan implementation of the Shader trait

use prism_render::graphics_device::{Shader as DeviceShader, ShaderDesc, ShaderStage};
use prism_render::prism::Result;
use prism_render::{engine_bail, engine_err};
use ash::vk;
use std::ffi::CString;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::shader_stage_to_vk;

static NEXT_SHADER_ID: AtomicU64 = AtomicU64::new(1);

/// One compiled stage
pub(crate) struct ShaderModule {
    pub(crate) module: vk::ShaderModule,
    pub(crate) stage: vk::ShaderStageFlags,
    pub(crate) entry_point: CString,
}

/// Vulkan shader implementation: one module per stage
pub struct Shader {
    ctx: Arc<GpuContext>,
    id: u64,
    name: String,
    stages: Vec<ShaderStage>,
    pub(crate) modules: Vec<ShaderModule>,
}

impl Shader {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &ShaderDesc) -> Result<Self> {
        if desc.stages.is_empty() {
            engine_bail!("prism::vulkan", "Shader '{}' has no stage", desc.name);
        }
        let is_compute = desc.stages.iter().any(|stage| stage.stage == ShaderStage::Compute);
        if is_compute && desc.stages.len() > 1 {
            engine_bail!("prism::vulkan", "Compute shader '{}' cannot have other stages", desc.name);
        }

        let mut shader = Self {
            ctx,
            id: NEXT_SHADER_ID.fetch_add(1, Ordering::Relaxed),
            name: desc.name.clone(),
            stages: Vec::with_capacity(desc.stages.len()),
            modules: Vec::with_capacity(desc.stages.len()),
        };

        for stage in &desc.stages {
            if stage.code.is_empty() {
                engine_bail!("prism::vulkan", "Stage {:?} of shader '{}' has no code", stage.stage, desc.name);
            }
            let entry_point = CString::new(stage.entry_point.as_str()).map_err(|_| {
                engine_err!("prism::vulkan", "Invalid entry point '{}' in shader '{}'", stage.entry_point, desc.name)
            })?;
            let create_info = vk::ShaderModuleCreateInfo::default().code(&stage.code);
            let module = unsafe {
                shader.ctx.device.create_shader_module(&create_info, None).map_err(|e| {
                    engine_err!("prism::vulkan", "Failed to create {:?} module of shader '{}': {:?}", stage.stage, desc.name, e)
                })?
            };
            shader.modules.push(ShaderModule {
                module,
                stage: shader_stage_to_vk(stage.stage),
                entry_point,
            });
            shader.stages.push(stage.stage);
        }
        Ok(shader)
    }
}

impl DeviceShader for Shader {
    fn shader_id(&self) -> u64 {
        self.id
    }

    fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            for module in &self.modules {
                self.ctx.device.destroy_shader_module(module.module, None);
            }
        }
    }
}
