/// Processors: the draw and dispatch units recorded by render targets

mod processor;
mod processor_desc;

pub use processor::Processor;
pub use processor_desc::ProcessorDesc;
