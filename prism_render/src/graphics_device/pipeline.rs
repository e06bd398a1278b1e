/// Device pipeline trait and the full compiled-state descriptor

use std::sync::Arc;
use crate::graphics_device::{RenderPass, Shader, VertexFormat};

/// Pipeline type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineType {
    Graphics,
    Compute,
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    PointList,
}

/// Polygon rasterization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    Fill,
    Wireframe,
}

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    SrcAlpha,
    OneMinusSrcAlpha,
    OneMinusSrcColor,
    One,
    Zero,
}

/// Blend function of one color attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFunction {
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl BlendFunction {
    /// Classic alpha blending
    pub fn alpha() -> Self {
        Self {
            src_color: BlendFactor::SrcAlpha,
            dst_color: BlendFactor::OneMinusSrcAlpha,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
        }
    }

    /// Additive blending
    pub fn additive() -> Self {
        Self {
            src_color: BlendFactor::One,
            dst_color: BlendFactor::One,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::One,
        }
    }
}

/// Vertex input rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexInputRate {
    Vertex,
    Instance,
}

/// Vertex binding description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBinding {
    pub binding: u32,
    pub stride: u32,
    pub input_rate: VertexInputRate,
}

/// Vertex attribute description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub binding: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

/// Descriptor type of one layout binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    UniformBuffer,
    CombinedImageSampler,
    StorageImage,
}

/// One binding of the descriptor-set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    /// Array length (texture-reader arrays), 1 otherwise
    pub count: u32,
}

/// Full compiled state of a pipeline
#[derive(Clone)]
pub struct PipelineDesc {
    /// Debug name
    pub name: String,
    /// Graphics or compute
    pub pipeline_type: PipelineType,
    /// Shader stages
    pub shader: Arc<dyn Shader>,
    /// Descriptor-set layout
    pub descriptor_bindings: Vec<DescriptorBinding>,
    /// Push constant block size in bytes (0 = none)
    pub push_constant_size: u32,

    // Graphics-only state (ignored by compute pipelines)
    pub vertex_bindings: Vec<VertexBinding>,
    pub vertex_attributes: Vec<VertexAttribute>,
    pub topology: PrimitiveTopology,
    pub primitive_restart: bool,
    pub polygon_mode: PolygonMode,
    pub cull_back_faces: bool,
    pub depth_test: bool,
    pub depth_write: bool,
    /// One entry per color attachment, None = blending disabled
    pub color_blend: Vec<Option<BlendFunction>>,
    /// Viewport size
    pub viewport: (u32, u32),
    /// Render pass the pipeline is compiled against
    pub render_pass: Option<Arc<dyn RenderPass>>,
}

/// Compiled device pipeline (pipeline, layout and descriptor-set layout)
pub trait DevicePipeline: Send + Sync {
    /// Graphics or compute
    fn pipeline_type(&self) -> PipelineType;
}
