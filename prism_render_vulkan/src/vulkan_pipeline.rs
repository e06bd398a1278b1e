/// Pipeline - Vulkan implementation of the DevicePipeline trait
///
/// Owns the VkPipeline, its layout and its descriptor-set layout.
/// Graphics pipelines use a static viewport and a dynamic scissor.

use prism_render::graphics_device::{
    DevicePipeline, PipelineDesc, PipelineType, Shader as DeviceShader,
};
use prism_render::prism::Result;
use prism_render::{engine_bail, engine_err};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    blend_factor_to_vk, descriptor_type_to_vk, input_rate_to_vk, polygon_mode_to_vk,
    shader_stages_to_vk, topology_to_vk, vertex_format_to_vk,
};
use crate::vulkan_render_pass::RenderPass;
use crate::vulkan_shader::Shader;

/// Vulkan pipeline implementation
pub struct Pipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) pipeline_layout: vk::PipelineLayout,
    pub(crate) descriptor_set_layout: vk::DescriptorSetLayout,
    /// Stages reached by push constants
    pub(crate) push_constant_stages: vk::ShaderStageFlags,
    pub(crate) bind_point: vk::PipelineBindPoint,
    pipeline_type: PipelineType,
}

impl Pipeline {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &PipelineDesc) -> Result<Self> {
        let shader = unsafe { &*(Arc::as_ptr(&desc.shader) as *const Shader) };
        let shader_stages = shader_stages_to_vk(desc.shader.stages());

        // Descriptor-set layout
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
            .descriptor_bindings
            .iter()
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding.binding)
                    .descriptor_type(descriptor_type_to_vk(binding.descriptor_type))
                    .descriptor_count(binding.count.max(1))
                    .stage_flags(shader_stages)
            })
            .collect();
        let set_layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let descriptor_set_layout = unsafe {
            ctx.device
                .create_descriptor_set_layout(&set_layout_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create descriptor set layout of '{}': {:?}", desc.name, e))?
        };

        // Pipeline layout
        let push_constant_ranges = if desc.push_constant_size > 0 {
            vec![vk::PushConstantRange::default()
                .stage_flags(shader_stages)
                .offset(0)
                .size(desc.push_constant_size)]
        } else {
            Vec::new()
        };
        let set_layouts = [descriptor_set_layout];
        let layout_create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        let pipeline_layout = match unsafe { ctx.device.create_pipeline_layout(&layout_create_info, None) } {
            Ok(layout) => layout,
            Err(e) => {
                unsafe { ctx.device.destroy_descriptor_set_layout(descriptor_set_layout, None) };
                return Err(engine_err!("prism::vulkan", "Failed to create pipeline layout of '{}': {:?}", desc.name, e));
            }
        };

        let (pipeline, bind_point) = match desc.pipeline_type {
            PipelineType::Graphics => (
                Self::create_graphics_pipeline(&ctx, desc, shader, pipeline_layout),
                vk::PipelineBindPoint::GRAPHICS,
            ),
            PipelineType::Compute => (
                Self::create_compute_pipeline(&ctx, desc, shader, pipeline_layout),
                vk::PipelineBindPoint::COMPUTE,
            ),
        };
        let pipeline = match pipeline {
            Ok(pipeline) => pipeline,
            Err(error) => {
                unsafe {
                    ctx.device.destroy_pipeline_layout(pipeline_layout, None);
                    ctx.device.destroy_descriptor_set_layout(descriptor_set_layout, None);
                }
                return Err(error);
            }
        };

        Ok(Self {
            ctx,
            pipeline,
            pipeline_layout,
            descriptor_set_layout,
            push_constant_stages: shader_stages,
            bind_point,
            pipeline_type: desc.pipeline_type,
        })
    }

    fn create_graphics_pipeline(
        ctx: &GpuContext,
        desc: &PipelineDesc,
        shader: &Shader,
        layout: vk::PipelineLayout,
    ) -> Result<vk::Pipeline> {
        let render_pass = match &desc.render_pass {
            Some(render_pass) => unsafe { &*(Arc::as_ptr(render_pass) as *const RenderPass) },
            None => engine_bail!("prism::vulkan", "Graphics pipeline '{}' has no render pass", desc.name),
        };

        let shader_stages: Vec<vk::PipelineShaderStageCreateInfo> = shader
            .modules
            .iter()
            .map(|module| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(module.stage)
                    .module(module.module)
                    .name(&module.entry_point)
            })
            .collect();

        // Vertex input state
        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = desc
            .vertex_bindings
            .iter()
            .map(|binding| vk::VertexInputBindingDescription {
                binding: binding.binding,
                stride: binding.stride,
                input_rate: input_rate_to_vk(binding.input_rate),
            })
            .collect();
        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc
            .vertex_attributes
            .iter()
            .map(|attribute| vk::VertexInputAttributeDescription {
                location: attribute.location,
                binding: attribute.binding,
                format: vertex_format_to_vk(attribute.format),
                offset: attribute.offset,
            })
            .collect();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        // Input assembly state
        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology))
            .primitive_restart_enable(desc.primitive_restart);

        // Viewport is static, scissor is set per render
        let (width, height) = desc.viewport;
        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D { width, height },
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        // Rasterization state
        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(polygon_mode_to_vk(desc.polygon_mode))
            .line_width(1.0)
            .cull_mode(if desc.cull_back_faces { vk::CullModeFlags::BACK } else { vk::CullModeFlags::NONE })
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        // Multisample state
        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        // Depth state
        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_test)
            .depth_write_enable(desc.depth_write)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        // Color blend state, one per color attachment
        let color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = desc
            .color_blend
            .iter()
            .map(|blend| match blend {
                Some(function) => vk::PipelineColorBlendAttachmentState::default()
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
                    .blend_enable(true)
                    .src_color_blend_factor(blend_factor_to_vk(function.src_color))
                    .dst_color_blend_factor(blend_factor_to_vk(function.dst_color))
                    .color_blend_op(vk::BlendOp::ADD)
                    .src_alpha_blend_factor(blend_factor_to_vk(function.src_alpha))
                    .dst_alpha_blend_factor(blend_factor_to_vk(function.dst_alpha))
                    .alpha_blend_op(vk::BlendOp::ADD),
                None => vk::PipelineColorBlendAttachmentState::default()
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
                    .blend_enable(false),
            })
            .collect();
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        // Dynamic state
        let dynamic_states = [vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass.render_pass)
            .subpass(0);

        let pipelines = unsafe {
            ctx.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create graphics pipeline '{}': {:?}", desc.name, e.1))?
        };
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| engine_err!("prism::vulkan", "No graphics pipeline returned for '{}'", desc.name))
    }

    fn create_compute_pipeline(
        ctx: &GpuContext,
        desc: &PipelineDesc,
        shader: &Shader,
        layout: vk::PipelineLayout,
    ) -> Result<vk::Pipeline> {
        let module = match shader.modules.as_slice() {
            [module] if module.stage == vk::ShaderStageFlags::COMPUTE => module,
            _ => engine_bail!(
                "prism::vulkan",
                "Compute pipeline '{}' needs a single compute stage, shader '{}' has {:?}",
                desc.name, shader.name(), shader.stages()
            ),
        };

        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(module.module)
            .name(&module.entry_point);
        let create_info = vk::ComputePipelineCreateInfo::default().stage(stage).layout(layout);

        let pipelines = unsafe {
            ctx.device
                .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create compute pipeline '{}': {:?}", desc.name, e.1))?
        };
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| engine_err!("prism::vulkan", "No compute pipeline returned for '{}'", desc.name))
    }
}

impl DevicePipeline for Pipeline {
    fn pipeline_type(&self) -> PipelineType {
        self.pipeline_type
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
            self.ctx.device.destroy_pipeline_layout(self.pipeline_layout, None);
            self.ctx.device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
        }
    }
}
