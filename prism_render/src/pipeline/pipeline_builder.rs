/// PipelineBuilder - hashes the requested state and builds a pipeline on cache miss

use std::hash::{Hash, Hasher};
use std::sync::Arc;
use rustc_hash::FxHasher;

use crate::context::GraphicsContext;
use crate::data::VariableType;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BlendFunction, DescriptorBinding, DescriptorType, PipelineDesc, PipelineType, PolygonMode,
    Rect2D, Shader, ShaderStage, VertexAttribute, VertexBinding, VertexInputRate,
};
use crate::pipeline::{Pipeline, ShapeType};
use crate::target::RenderTargetInfo;
use crate::{engine_debug, engine_error};

/// Push constant carrying the target layer index (one i32)
const LAYER_INDEX_PUSH_CONSTANT_SIZE: u32 = 4;

fn config_error(message: String) -> Error {
    engine_error!("prism::PipelineBuilder", "{}", message);
    Error::InvalidConfiguration(message)
}

/// Collects the state of one pipeline request
///
/// Setup calls that only make sense for graphics pipelines fail on a
/// compute builder.
#[derive(Clone)]
pub struct PipelineBuilder {
    pipeline_type: PipelineType,
    name: String,
    shader: Option<Arc<dyn Shader>>,
    shape_type: ShapeType,
    blend_functions: Vec<BlendFunction>,
    depth_test: bool,
    depth_write: bool,
    cull_face: bool,
    polygon_mode: PolygonMode,
    data: Vec<VariableType>,
    instance_data: Option<VariableType>,
    uniform_count: u32,
    texture_reader_sizes: Vec<u32>,
    output_count: u32,
    scissor: Option<Rect2D>,
    layer_index_in_shader: bool,
}

impl PipelineBuilder {
    pub fn new(pipeline_type: PipelineType, name: &str) -> Self {
        Self {
            pipeline_type,
            name: name.to_string(),
            shader: None,
            shape_type: ShapeType::Triangle,
            blend_functions: Vec::new(),
            depth_test: false,
            depth_write: false,
            cull_face: true,
            polygon_mode: PolygonMode::Fill,
            data: Vec::new(),
            instance_data: None,
            uniform_count: 0,
            texture_reader_sizes: Vec::new(),
            output_count: 0,
            scissor: None,
            layer_index_in_shader: false,
        }
    }

    fn require_graphics(&self, what: &str) -> Result<()> {
        if self.pipeline_type != PipelineType::Graphics {
            return Err(config_error(format!("{} only exist on graphics pipeline", what)));
        }
        Ok(())
    }

    pub fn setup_shader(&mut self, shader: Arc<dyn Shader>) {
        self.shader = Some(shader);
    }

    pub fn setup_shape_type(&mut self, shape_type: ShapeType) -> Result<()> {
        self.require_graphics("Shape type")?;
        self.shape_type = shape_type;
        Ok(())
    }

    /// Blend functions, one per color attachment (empty = blending disabled)
    pub fn setup_blend_functions(&mut self, blend_functions: Vec<BlendFunction>) -> Result<()> {
        self.require_graphics("Blend functions")?;
        self.blend_functions = blend_functions;
        Ok(())
    }

    pub fn setup_depth_operations(&mut self, depth_test: bool, depth_write: bool) -> Result<()> {
        self.require_graphics("Depth operations")?;
        self.depth_test = depth_test;
        self.depth_write = depth_write;
        Ok(())
    }

    pub fn setup_cull_face_operation(&mut self, cull_face: bool) -> Result<()> {
        self.require_graphics("Cull face operation")?;
        self.cull_face = cull_face;
        Ok(())
    }

    pub fn setup_polygon_mode(&mut self, polygon_mode: PolygonMode) -> Result<()> {
        self.require_graphics("Polygon mode")?;
        self.polygon_mode = polygon_mode;
        Ok(())
    }

    /// Vertex layout: one binding per data container, instance data last
    pub fn setup_data(&mut self, data: Vec<VariableType>, instance_data: Option<VariableType>) -> Result<()> {
        self.require_graphics("Data")?;
        self.data = data;
        self.instance_data = instance_data;
        Ok(())
    }

    /// Descriptor layout
    ///
    /// # Arguments
    ///
    /// * `uniform_count` - Number of uniform buffers
    /// * `texture_reader_sizes` - Element count of each texture reader array
    /// * `output_count` - Number of storage image outputs (compute)
    pub fn setup_uniform(&mut self, uniform_count: u32, texture_reader_sizes: Vec<u32>, output_count: u32) {
        self.uniform_count = uniform_count;
        self.texture_reader_sizes = texture_reader_sizes;
        self.output_count = output_count;
    }

    /// Custom scissor (None = whole target)
    pub fn setup_scissor(&mut self, scissor: Option<Rect2D>) {
        self.scissor = scissor;
    }

    pub fn setup_layer_index_data_in_shader(&mut self, enabled: bool) -> Result<()> {
        self.require_graphics("Layer index data")?;
        self.layer_index_in_shader = enabled;
        Ok(())
    }

    pub fn pipeline_type(&self) -> PipelineType {
        self.pipeline_type
    }

    pub fn shape_type(&self) -> ShapeType {
        self.shape_type
    }

    fn check_setup(&self, target: &RenderTargetInfo) -> Result<&Arc<dyn Shader>> {
        let shader = self
            .shader
            .as_ref()
            .ok_or_else(|| config_error(format!("Shader not setup on pipeline: {}", self.name)))?;

        match self.pipeline_type {
            PipelineType::Graphics => {
                if self.data.is_empty() {
                    return Err(config_error(format!("Data not setup on pipeline: {}", self.name)));
                }
                if (self.depth_test || self.depth_write) && !target.has_depth_attachment {
                    return Err(config_error(format!(
                        "Depth operations are enabled but there is no depth attachment on the render target: {}",
                        target.name
                    )));
                }
                if !self.blend_functions.is_empty()
                    && self.blend_functions.len() != target.color_attachment_count
                {
                    return Err(config_error(format!(
                        "Number of blend functions ({}) does not match with number of color attachments ({})",
                        self.blend_functions.len(),
                        target.color_attachment_count
                    )));
                }
                if target.render_pass.is_none() {
                    return Err(config_error(format!(
                        "Render target '{}' has no render pass for graphics pipeline: {}",
                        target.name, self.name
                    )));
                }
            }
            PipelineType::Compute => {
                if !shader.stages().contains(&ShaderStage::Compute) {
                    return Err(config_error(format!(
                        "Shader '{}' has no compute stage for pipeline: {}",
                        shader.name(),
                        self.name
                    )));
                }
            }
        }
        Ok(shader)
    }

    /// Content hash of the full pipeline state against a target
    pub fn compute_hash(&self, target: &RenderTargetInfo) -> Result<u64> {
        let shader = self.check_setup(target)?;
        Ok(self.hash_state(shader.as_ref(), target))
    }

    fn hash_state(&self, shader: &dyn Shader, target: &RenderTargetInfo) -> u64 {
        let mut hasher = FxHasher::default();
        self.pipeline_type.hash(&mut hasher);

        self.data.len().hash(&mut hasher);
        for variable_type in self.data.iter().chain(self.instance_data.iter()) {
            variable_type.vertex_format().hash(&mut hasher);
            variable_type.repeat_count().hash(&mut hasher);
        }
        self.instance_data.is_some().hash(&mut hasher);

        for blend in &self.blend_functions {
            blend.hash(&mut hasher);
        }
        // The rectangle itself is dynamic state
        self.scissor.is_some().hash(&mut hasher);

        target.width.hash(&mut hasher);
        target.height.hash(&mut hasher);
        target.render_pass_compatibility_id.hash(&mut hasher);
        shader.shader_id().hash(&mut hasher);

        self.shape_type.hash(&mut hasher);
        self.depth_test.hash(&mut hasher);
        self.depth_write.hash(&mut hasher);
        self.cull_face.hash(&mut hasher);
        self.polygon_mode.hash(&mut hasher);

        self.uniform_count.hash(&mut hasher);
        self.texture_reader_sizes.hash(&mut hasher);
        self.output_count.hash(&mut hasher);
        self.layer_index_in_shader.hash(&mut hasher);
        hasher.finish()
    }

    fn descriptor_bindings(&self) -> Vec<DescriptorBinding> {
        let mut bindings = Vec::new();
        let mut binding = 0;
        for _ in 0..self.uniform_count {
            bindings.push(DescriptorBinding { binding, descriptor_type: DescriptorType::UniformBuffer, count: 1 });
            binding += 1;
        }
        for &count in &self.texture_reader_sizes {
            bindings.push(DescriptorBinding { binding, descriptor_type: DescriptorType::CombinedImageSampler, count });
            binding += 1;
        }
        for _ in 0..self.output_count {
            bindings.push(DescriptorBinding { binding, descriptor_type: DescriptorType::StorageImage, count: 1 });
            binding += 1;
        }
        bindings
    }

    /// Vertex bindings and attributes: one binding per container, attribute
    /// locations sequential across bindings, multi-slot rows split evenly
    fn vertex_input(&self) -> (Vec<VertexBinding>, Vec<VertexAttribute>) {
        let mut bindings = Vec::new();
        let mut attributes = Vec::new();
        let mut location = 0;

        let rates = self
            .data
            .iter()
            .map(|v| (v, VertexInputRate::Vertex))
            .chain(self.instance_data.iter().map(|v| (v, VertexInputRate::Instance)));
        for (binding, (variable_type, input_rate)) in rates.enumerate() {
            let binding = binding as u32;
            let stride = variable_type.byte_size();
            bindings.push(VertexBinding { binding, stride, input_rate });

            let repeat_count = variable_type.repeat_count();
            for i in 0..repeat_count {
                attributes.push(VertexAttribute {
                    location,
                    binding,
                    format: variable_type.vertex_format(),
                    offset: i * (stride / repeat_count),
                });
                location += 1;
            }
        }
        (bindings, attributes)
    }

    fn pipeline_desc(&self, shader: &Arc<dyn Shader>, target: &RenderTargetInfo) -> PipelineDesc {
        let (vertex_bindings, vertex_attributes) = self.vertex_input();
        let color_blend = if self.blend_functions.is_empty() {
            vec![None; target.color_attachment_count]
        } else {
            self.blend_functions.iter().copied().map(Some).collect()
        };
        let push_constant_size = if self.layer_index_in_shader { LAYER_INDEX_PUSH_CONSTANT_SIZE } else { 0 };

        PipelineDesc {
            name: self.name.clone(),
            pipeline_type: self.pipeline_type,
            shader: shader.clone(),
            descriptor_bindings: self.descriptor_bindings(),
            push_constant_size,
            vertex_bindings,
            vertex_attributes,
            topology: self.shape_type.topology(),
            primitive_restart: !self.shape_type.is_list_topology(),
            polygon_mode: self.polygon_mode,
            cull_back_faces: self.cull_face,
            depth_test: self.depth_test,
            depth_write: self.depth_write,
            color_blend,
            viewport: (target.width, target.height),
            render_pass: match self.pipeline_type {
                PipelineType::Graphics => target.render_pass.clone(),
                PipelineType::Compute => None,
            },
        }
    }

    /// Return the cached pipeline for this state, building it on a miss
    ///
    /// Any device failure while building is a hard error.
    pub fn build(&self, context: &mut GraphicsContext, target: &RenderTargetInfo) -> Result<Arc<Pipeline>> {
        let shader = self.check_setup(target)?;
        let hash = self.hash_state(shader.as_ref(), target);

        if let Some(pipeline) = context.pipeline_cache().get(hash) {
            return Ok(pipeline);
        }

        let desc = self.pipeline_desc(shader, target);
        let device_pipeline = context.device().create_pipeline(&desc)?;
        let pipeline = Arc::new(Pipeline {
            id: context.pipeline_cache().next_id(),
            hash,
            name: self.name.clone(),
            pipeline_type: self.pipeline_type,
            device_pipeline,
            descriptor_bindings: desc.descriptor_bindings,
            primitive_restart: desc.primitive_restart,
            push_constant_size: desc.push_constant_size,
        });
        engine_debug!(
            "prism::PipelineBuilder",
            "Pipeline {} created for '{}' (hash {:#018x})",
            pipeline.id(),
            self.name,
            hash
        );
        Ok(context.pipeline_cache_mut().insert(pipeline))
    }
}

#[cfg(test)]
#[path = "pipeline_builder_tests.rs"]
mod tests;
