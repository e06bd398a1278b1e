use super::*;
use glam::{Mat4, Vec2, Vec3};

#[test]
fn test_variable_type_sizes() {
    assert_eq!(VariableType::Float.byte_size(), 4);
    assert_eq!(VariableType::Vec3.byte_size(), 12);
    assert_eq!(VariableType::Mat4.byte_size(), 64);
    assert_eq!(VariableType::TwoMat4.byte_size(), 128);
    assert_eq!(VariableType::Mat4.repeat_count(), 4);
    assert_eq!(VariableType::TwoMat4.repeat_count(), 8);
    assert_eq!(VariableType::Vec2.repeat_count(), 1);
    assert_eq!(VariableType::Mat4.vertex_format(), VertexFormat::R32G32B32A32_SFLOAT);
    assert_eq!(VariableType::Vec3.vertex_format(), VertexFormat::R32G32B32_SFLOAT);
}

#[test]
fn test_vertex_container_rows() {
    let container = DataContainer::vertex(
        VariableType::Vec3,
        &[Vec3::ZERO, Vec3::X, Vec3::Y],
    );
    assert_eq!(container.row_count(), 3);
    assert_eq!(container.row_size(), 12);
    assert_eq!(container.byte_size(), 36);
    assert_eq!(container.variable_type(), Some(VariableType::Vec3));
}

#[test]
fn test_uniform_and_index_containers() {
    let uniform = DataContainer::uniform(&Mat4::IDENTITY);
    assert_eq!(uniform.row_count(), 1);
    assert_eq!(uniform.byte_size(), 64);
    assert_eq!(uniform.variable_type(), None);

    let indices = DataContainer::indices(&[0, 1, 2, 2, 3, 0]);
    assert_eq!(indices.row_count(), 6);
    assert_eq!(indices.layout(), DataLayout::Index);
}

#[test]
fn test_slot_state_machine() {
    let mut container = DataContainer::vertex(VariableType::Vec2, &[Vec2::ZERO]);
    assert_eq!(container.slot_state(0).unwrap(), SlotState::Clean);
    assert!(!container.has_new_data(0).unwrap());

    container.replace_data(&[Vec2::ONE, Vec2::X]);
    assert!(container.has_new_data(0).unwrap());
    assert!(container.has_new_data(1).unwrap());

    container.mark_uploaded(0);
    assert_eq!(container.slot_state(0).unwrap(), SlotState::Uploaded);
    assert!(container.has_new_data(1).unwrap());

    container.mark_bound(0);
    assert_eq!(container.slot_state(0).unwrap(), SlotState::Bound);

    // Binding a slot that was never uploaded changes nothing
    container.mark_bound(1);
    assert_eq!(container.slot_state(1).unwrap(), SlotState::Staged);

    container.replace_data(&[Vec2::Y]);
    assert_eq!(container.slot_state(0).unwrap(), SlotState::Staged);
}

#[test]
fn test_has_new_data_out_of_range() {
    let container = DataContainer::vertex(VariableType::Float, &[1.0f32]);
    assert!(container.has_new_data(MAX_FRAME_SLOTS).is_err());
}

#[test]
fn test_replace_keeps_allocation_within_ratio() {
    let mut container = DataContainer::vertex(VariableType::Float, &[0.0f32; 10]);
    let allocated = container.allocated_size();

    // Shrinking to 1/5 keeps the allocation
    container.replace_data(&[1.0f32; 2]);
    assert_eq!(container.allocated_size(), allocated);
    assert_eq!(container.row_count(), 2);

    // Growing reallocates to the new size
    container.replace_data(&[2.0f32; 20]);
    assert_eq!(container.row_count(), 20);
    assert!(container.allocated_size() >= 80);
}

#[test]
fn test_replace_reallocates_when_shrinking_past_ratio() {
    let mut container = DataContainer::vertex(VariableType::Float, &[0.0f32; 10]);
    let allocated = container.allocated_size();

    container.replace_data(&[1.0f32; 1]);
    assert!(container.allocated_size() < allocated);
    assert_eq!(container.row_count(), 1);
}

#[test]
fn test_mark_all_processed() {
    let mut container = DataContainer::uniform(&[1.0f32, 2.0, 3.0, 4.0]);
    container.replace_data(&[5.0f32, 6.0, 7.0, 8.0]);
    container.mark_all_processed();
    for slot in 0..MAX_FRAME_SLOTS {
        assert_eq!(container.slot_state(slot).unwrap(), SlotState::Clean);
    }
}
