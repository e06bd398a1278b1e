/// DescriptorSet trait - the table of resources one pipeline invocation reads

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{Buffer, DeviceImage, DevicePipeline, Sampler};

/// Resource written into one binding
#[derive(Clone)]
pub enum DescriptorResource {
    /// Whole uniform buffer
    UniformBuffer(Arc<dyn Buffer>),
    /// Array of combined image samplers
    SampledImages(Vec<(Arc<dyn DeviceImage>, Arc<dyn Sampler>)>),
    /// Storage image (compute output)
    StorageImage(Arc<dyn DeviceImage>),
}

/// One binding update
#[derive(Clone)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub resource: DescriptorResource,
}

/// Descriptor for allocating descriptor sets
#[derive(Clone)]
pub struct DescriptorSetDesc {
    /// Debug name
    pub name: String,
    /// Pipeline whose descriptor-set layout is used
    pub pipeline: Arc<dyn DevicePipeline>,
    /// Number of sets to allocate (one per frame slot)
    pub count: u32,
    /// Uniform buffer descriptors per set
    pub uniform_count: u32,
    /// Combined image sampler descriptors per set
    pub sampler_count: u32,
    /// Storage image descriptors per set
    pub storage_count: u32,
}

/// Descriptor set trait
pub trait DescriptorSet: Send + Sync {
    /// Write bindings into the set
    ///
    /// The set must not be in use by a pending submission.
    fn write(&self, writes: &[DescriptorWrite]) -> Result<()>;
}
