/// Processor inputs: CPU-side data containers and their per-slot GPU buffers

mod buffer_handler;
mod data_container;

pub use buffer_handler::{BufferHandler, BufferKind, PerFrameBuffers};
pub use data_container::{DataContainer, DataLayout, SlotState, VariableType, MAX_FRAME_SLOTS};
