/// Construction-time description of a processor

use std::sync::Arc;
use crate::data::DataContainer;
use crate::graphics_device::{BlendFunction, PipelineType, PolygonMode, Rect2D, Shader};
use crate::pipeline::ShapeType;
use crate::render_graph::TextureHandle;
use crate::texture::TextureReader;

/// Everything a processor is built from
///
/// The shape of the inputs (number of data containers, uniforms, reader
/// arrays and their lengths) is fixed for the processor's lifetime; only
/// their content can be updated afterwards.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use prism_render::prism::Shader;
/// # fn shader() -> Arc<dyn Shader> { unimplemented!() }
/// use prism_render::prism::{DataContainer, ProcessorDesc, VariableType};
///
/// let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
/// let desc = ProcessorDesc {
///     data: vec![DataContainer::vertex(VariableType::Vec3, &positions)],
///     depth_test: true,
///     depth_write: true,
///     ..ProcessorDesc::graphics("triangle", shader())
/// };
/// ```
#[derive(Clone)]
pub struct ProcessorDesc {
    pub name: String,
    pub pipeline_type: PipelineType,
    pub shader: Arc<dyn Shader>,

    // Fixed-function state (graphics only)
    pub shape_type: ShapeType,
    /// One per color attachment of the target, empty disables blending
    pub blend_functions: Vec<BlendFunction>,
    pub depth_test: bool,
    pub depth_write: bool,
    pub cull_face: bool,
    pub polygon_mode: PolygonMode,

    // Inputs
    /// Vertex streams, one binding each
    pub data: Vec<DataContainer>,
    /// Per-instance rows, bound after the vertex streams
    pub instance_data: Option<DataContainer>,
    /// u32 indices
    pub indices: Option<DataContainer>,
    pub uniform_data: Vec<DataContainer>,
    /// One descriptor binding per array
    pub texture_readers: Vec<Vec<TextureReader>>,
    /// Storage images written by a compute processor
    pub outputs: Vec<TextureHandle>,

    /// Custom scissor, None covers the whole target
    pub scissor: Option<Rect2D>,
    /// Push the target layer index as an i32 constant (re-records every frame)
    pub layer_index_in_shader: bool,
    /// Bit N set = recorded on target layer N
    pub layers_mask: u8,
}

impl ProcessorDesc {
    fn new(name: &str, pipeline_type: PipelineType, shader: Arc<dyn Shader>) -> Self {
        Self {
            name: name.to_string(),
            pipeline_type,
            shader,
            shape_type: ShapeType::Triangle,
            blend_functions: Vec::new(),
            depth_test: false,
            depth_write: false,
            cull_face: true,
            polygon_mode: PolygonMode::Fill,
            data: Vec::new(),
            instance_data: None,
            indices: None,
            uniform_data: Vec::new(),
            texture_readers: Vec::new(),
            outputs: Vec::new(),
            scissor: None,
            layer_index_in_shader: false,
            layers_mask: 0xFF,
        }
    }

    /// Graphics processor with default state and no inputs
    pub fn graphics(name: &str, shader: Arc<dyn Shader>) -> Self {
        Self::new(name, PipelineType::Graphics, shader)
    }

    /// Compute processor with no inputs
    pub fn compute(name: &str, shader: Arc<dyn Shader>) -> Self {
        Self::new(name, PipelineType::Compute, shader)
    }
}
