/// CPU-side data of a processor input with deferred, per-slot upload tracking.
///
/// A container holds the latest bytes of one vertex stream, one uniform block
/// or one index list. Replacing the content does no GPU work: every frame slot
/// moves to `Staged`, and the owning processor uploads each slot when that slot
/// is next prepared.
///
/// Per-slot state machine:
///
/// ```text
/// Clean --replace--> Staged --upload--> Uploaded --record--> Bound
///                      ^                                       |
///                      +---------------replace-----------------+
/// ```

use bytemuck::Pod;
use crate::error::{Error, Result};
use crate::graphics_device::VertexFormat;

/// Highest number of frame slots a container tracks
pub const MAX_FRAME_SLOTS: usize = 8;

/// Allocation is kept when shrinking by at most this factor
const MAX_MEMORY_RATIO: usize = 5;

// ===== VARIABLE TYPE =====

/// Type of one vertex row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    TwoMat4,
}

impl VariableType {
    /// Number of floats in one row
    pub fn float_count(&self) -> u32 {
        match self {
            VariableType::Float => 1,
            VariableType::Vec2 => 2,
            VariableType::Vec3 => 3,
            VariableType::Vec4 => 4,
            VariableType::Mat4 => 16,
            VariableType::TwoMat4 => 32,
        }
    }

    /// Size of one row in bytes
    pub fn byte_size(&self) -> u32 {
        self.float_count() * std::mem::size_of::<f32>() as u32
    }

    /// Vertex attribute format of one attribute slot
    pub fn vertex_format(&self) -> VertexFormat {
        match self {
            VariableType::Float => VertexFormat::R32_SFLOAT,
            VariableType::Vec2 => VertexFormat::R32G32_SFLOAT,
            VariableType::Vec3 => VertexFormat::R32G32B32_SFLOAT,
            VariableType::Vec4 | VariableType::Mat4 | VariableType::TwoMat4 => {
                VertexFormat::R32G32B32A32_SFLOAT
            }
        }
    }

    /// Number of attribute locations one row occupies
    pub fn repeat_count(&self) -> u32 {
        match self {
            VariableType::Mat4 => 4,
            VariableType::TwoMat4 => 8,
            _ => 1,
        }
    }
}

// ===== DATA LAYOUT =====

/// What the bytes of a container represent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataLayout {
    /// Vertex or instance rows
    Vertex(VariableType),
    /// One uniform block
    Uniform,
    /// u32 indices
    Index,
}

// ===== SLOT STATE =====

/// Upload state of one frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Nothing replaced since the GPU buffers were created
    Clean,
    /// New data waiting for upload to this slot
    Staged,
    /// Uploaded; the slot's command list has not been recorded against it yet
    Uploaded,
    /// Uploaded and referenced by the slot's recorded command list
    Bound,
}

// ===== DATA CONTAINER =====

#[derive(Debug, Clone)]
pub struct DataContainer {
    layout: DataLayout,
    bytes: Vec<u8>,
    slots: [SlotState; MAX_FRAME_SLOTS],
}

impl DataContainer {
    /// Vertex (or instance) rows
    pub fn vertex<T: Pod>(variable_type: VariableType, rows: &[T]) -> Self {
        debug_assert_eq!(std::mem::size_of::<T>() as u32, variable_type.byte_size());
        Self {
            layout: DataLayout::Vertex(variable_type),
            bytes: bytemuck::cast_slice(rows).to_vec(),
            slots: [SlotState::Clean; MAX_FRAME_SLOTS],
        }
    }

    /// One uniform block
    pub fn uniform<T: Pod>(value: &T) -> Self {
        Self {
            layout: DataLayout::Uniform,
            bytes: bytemuck::bytes_of(value).to_vec(),
            slots: [SlotState::Clean; MAX_FRAME_SLOTS],
        }
    }

    /// Index list
    pub fn indices(indices: &[u32]) -> Self {
        Self {
            layout: DataLayout::Index,
            bytes: bytemuck::cast_slice(indices).to_vec(),
            slots: [SlotState::Clean; MAX_FRAME_SLOTS],
        }
    }

    pub fn layout(&self) -> DataLayout {
        self.layout
    }

    /// Variable type of vertex containers
    pub fn variable_type(&self) -> Option<VariableType> {
        match self.layout {
            DataLayout::Vertex(variable_type) => Some(variable_type),
            _ => None,
        }
    }

    /// Size of one row in bytes
    pub fn row_size(&self) -> u32 {
        match self.layout {
            DataLayout::Vertex(variable_type) => variable_type.byte_size(),
            DataLayout::Uniform => self.bytes.len() as u32,
            DataLayout::Index => std::mem::size_of::<u32>() as u32,
        }
    }

    /// Number of rows (vertices, instances or indices); a uniform block is one row
    pub fn row_count(&self) -> usize {
        match self.layout {
            DataLayout::Uniform => 1,
            _ => self.bytes.len() / self.row_size() as usize,
        }
    }

    /// Size of all the rows in bytes
    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Replace the whole content and stage it for every frame slot
    pub fn replace_data<T: Pod>(&mut self, rows: &[T]) {
        debug_assert!(
            self.layout == DataLayout::Uniform
                || std::mem::size_of::<T>() as u32 == self.row_size(),
            "data type does not match the container row size"
        );
        self.replace_bytes(bytemuck::cast_slice(rows));
    }

    /// Replace the whole content with raw bytes
    pub fn replace_bytes(&mut self, bytes: &[u8]) {
        let current = self.bytes.len();
        if current < bytes.len() || current > bytes.len() * MAX_MEMORY_RATIO {
            self.bytes = Vec::with_capacity(bytes.len());
        } else {
            self.bytes.clear();
        }
        self.bytes.extend_from_slice(bytes);
        self.slots = [SlotState::Staged; MAX_FRAME_SLOTS];
    }

    /// Capacity of the CPU-side allocation in bytes
    pub fn allocated_size(&self) -> usize {
        self.bytes.capacity()
    }

    /// State of a frame slot
    pub fn slot_state(&self, slot: usize) -> Result<SlotState> {
        self.slots.get(slot).copied().ok_or_else(|| {
            Error::InvalidResource(format!("Number of frames higher than expected: {}", slot))
        })
    }

    /// Whether new data is waiting for upload to this slot
    pub fn has_new_data(&self, slot: usize) -> Result<bool> {
        Ok(self.slot_state(slot)? == SlotState::Staged)
    }

    /// The slot's GPU buffer now holds the latest data
    pub fn mark_uploaded(&mut self, slot: usize) {
        if let Some(state) = self.slots.get_mut(slot) {
            if *state == SlotState::Staged {
                *state = SlotState::Uploaded;
            }
        }
    }

    /// The slot's command list was recorded against the uploaded buffer
    pub fn mark_bound(&mut self, slot: usize) {
        if let Some(state) = self.slots.get_mut(slot) {
            if *state == SlotState::Uploaded {
                *state = SlotState::Bound;
            }
        }
    }

    /// GPU buffers were created from the current content for every slot
    pub fn mark_all_processed(&mut self) {
        self.slots = [SlotState::Clean; MAX_FRAME_SLOTS];
    }
}

#[cfg(test)]
#[path = "data_container_tests.rs"]
mod tests;
