/// Cached pipeline and shape types

use std::sync::Arc;
use crate::graphics_device::{DescriptorBinding, DevicePipeline, PipelineType, PrimitiveTopology};

/// Shape assembled from vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeType {
    Triangle,
    TriangleStrip,
    Point,
}

impl ShapeType {
    /// List topologies do not use primitive restart
    pub fn is_list_topology(&self) -> bool {
        match self {
            ShapeType::Triangle | ShapeType::Point => true,
            ShapeType::TriangleStrip => false,
        }
    }

    pub fn topology(&self) -> PrimitiveTopology {
        match self {
            ShapeType::Triangle => PrimitiveTopology::TriangleList,
            ShapeType::TriangleStrip => PrimitiveTopology::TriangleStrip,
            ShapeType::Point => PrimitiveTopology::PointList,
        }
    }
}

/// Immutable compiled pipeline shared by every processor with the same state
pub struct Pipeline {
    pub(crate) id: u32,
    pub(crate) hash: u64,
    pub(crate) name: String,
    pub(crate) pipeline_type: PipelineType,
    pub(crate) device_pipeline: Arc<dyn DevicePipeline>,
    pub(crate) descriptor_bindings: Vec<DescriptorBinding>,
    pub(crate) primitive_restart: bool,
    pub(crate) push_constant_size: u32,
}

impl Pipeline {
    /// Sequential id in cache insertion order, starting at 1
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Content hash of the compiled state
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Name of the processor that first requested this state
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipeline_type(&self) -> PipelineType {
        self.pipeline_type
    }

    pub fn device_pipeline(&self) -> &Arc<dyn DevicePipeline> {
        &self.device_pipeline
    }

    /// Descriptor-set layout (uniforms, then samplers, then storage images)
    pub fn descriptor_bindings(&self) -> &[DescriptorBinding] {
        &self.descriptor_bindings
    }

    pub fn primitive_restart(&self) -> bool {
        self.primitive_restart
    }

    pub fn push_constant_size(&self) -> u32 {
        self.push_constant_size
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("hash", &self.hash)
            .field("name", &self.name)
            .field("pipeline_type", &self.pipeline_type)
            .finish()
    }
}
