/// Pipelines: immutable compiled state, deduplicated by a content hash

mod pipeline;
mod pipeline_builder;
mod pipeline_cache;

pub use pipeline::{Pipeline, ShapeType};
pub use pipeline_builder::PipelineBuilder;
pub use pipeline_cache::PipelineCache;
