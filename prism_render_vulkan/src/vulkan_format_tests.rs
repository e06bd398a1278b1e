//! Unit tests for Vulkan format conversion functions
//!
//! Pure conversions only, no GPU required.

use super::*;

// ============================================================================
// TEXTURE FORMAT CONVERSION TESTS
// ============================================================================

#[test]
fn test_texture_format_to_vk_color_formats() {
    assert_eq!(texture_format_to_vk(TextureFormat::R8G8B8A8_UNORM), vk::Format::R8G8B8A8_UNORM);
    assert_eq!(texture_format_to_vk(TextureFormat::B8G8R8A8_SRGB), vk::Format::B8G8R8A8_SRGB);
    assert_eq!(texture_format_to_vk(TextureFormat::B8G8R8A8_UNORM), vk::Format::B8G8R8A8_UNORM);
    assert_eq!(texture_format_to_vk(TextureFormat::R16G16B16A16_SFLOAT), vk::Format::R16G16B16A16_SFLOAT);
}

#[test]
fn test_texture_format_to_vk_packed_float() {
    assert_eq!(
        texture_format_to_vk(TextureFormat::B10G11R11_UFLOAT),
        vk::Format::B10G11R11_UFLOAT_PACK32
    );
}

#[test]
fn test_texture_format_to_vk_depth_format() {
    // D32_FLOAT -> D32_SFLOAT
    assert_eq!(texture_format_to_vk(TextureFormat::D32_FLOAT), vk::Format::D32_SFLOAT);
    assert_eq!(aspect_of(TextureFormat::D32_FLOAT), vk::ImageAspectFlags::DEPTH);
    assert_eq!(aspect_of(TextureFormat::R32_SFLOAT), vk::ImageAspectFlags::COLOR);
}

#[test]
fn test_presentation_format_round_trip() {
    for format in [TextureFormat::B8G8R8A8_SRGB, TextureFormat::B8G8R8A8_UNORM, TextureFormat::R8G8B8A8_UNORM] {
        assert_eq!(vk_to_presentation_format(texture_format_to_vk(format)), Some(format));
    }
}

#[test]
fn test_presentation_format_rejects_other_formats() {
    assert_eq!(vk_to_presentation_format(vk::Format::R16G16B16A16_SFLOAT), None);
    assert_eq!(vk_to_presentation_format(vk::Format::A2B10G10R10_UNORM_PACK32), None);
}

// ============================================================================
// VERTEX AND SHADER CONVERSION TESTS
// ============================================================================

#[test]
fn test_vertex_format_to_vk() {
    assert_eq!(vertex_format_to_vk(VertexFormat::R32_SFLOAT), vk::Format::R32_SFLOAT);
    assert_eq!(vertex_format_to_vk(VertexFormat::R32G32_SFLOAT), vk::Format::R32G32_SFLOAT);
    assert_eq!(vertex_format_to_vk(VertexFormat::R32G32B32_SFLOAT), vk::Format::R32G32B32_SFLOAT);
    assert_eq!(vertex_format_to_vk(VertexFormat::R32G32B32A32_SFLOAT), vk::Format::R32G32B32A32_SFLOAT);
}

#[test]
fn test_shader_stages_union() {
    let flags = shader_stages_to_vk(&[ShaderStage::Vertex, ShaderStage::Geometry, ShaderStage::Fragment]);
    assert_eq!(
        flags,
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::GEOMETRY | vk::ShaderStageFlags::FRAGMENT
    );
    assert_eq!(shader_stages_to_vk(&[]), vk::ShaderStageFlags::empty());
}

#[test]
fn test_wireframe_maps_to_line_mode() {
    assert_eq!(polygon_mode_to_vk(PolygonMode::Wireframe), vk::PolygonMode::LINE);
    assert_eq!(polygon_mode_to_vk(PolygonMode::Fill), vk::PolygonMode::FILL);
}

// ============================================================================
// ATTACHMENT AND SYNCHRONIZATION CONVERSION TESTS
// ============================================================================

#[test]
fn test_attachment_ops_to_vk() {
    assert_eq!(load_op_to_vk(LoadOp::Load), vk::AttachmentLoadOp::LOAD);
    assert_eq!(load_op_to_vk(LoadOp::Clear), vk::AttachmentLoadOp::CLEAR);
    assert_eq!(load_op_to_vk(LoadOp::DontCare), vk::AttachmentLoadOp::DONT_CARE);
    assert_eq!(store_op_to_vk(StoreOp::Store), vk::AttachmentStoreOp::STORE);
    assert_eq!(store_op_to_vk(StoreOp::DontCare), vk::AttachmentStoreOp::DONT_CARE);
}

#[test]
fn test_image_layouts_to_vk() {
    assert_eq!(image_layout_to_vk(ImageLayout::General), vk::ImageLayout::GENERAL);
    assert_eq!(image_layout_to_vk(ImageLayout::ShaderReadOnly), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    assert_eq!(image_layout_to_vk(ImageLayout::PresentSrc), vk::ImageLayout::PRESENT_SRC_KHR);
}

#[test]
fn test_pipeline_stages_combined() {
    let stages = PipelineStages::FRAGMENT_SHADER | PipelineStages::TRANSFER;
    assert_eq!(
        pipeline_stages_to_vk(stages),
        vk::PipelineStageFlags::FRAGMENT_SHADER | vk::PipelineStageFlags::TRANSFER
    );
}

#[test]
fn test_empty_pipeline_stages_wait_on_all_commands() {
    assert_eq!(pipeline_stages_to_vk(PipelineStages::empty()), vk::PipelineStageFlags::ALL_COMMANDS);
}

#[test]
fn test_sampler_filters_to_vk() {
    assert_eq!(filter_to_vk(Filter::Linear), (vk::Filter::LINEAR, vk::SamplerMipmapMode::LINEAR));
    assert_eq!(filter_to_vk(Filter::Nearest), (vk::Filter::NEAREST, vk::SamplerMipmapMode::NEAREST));
    assert_eq!(address_mode_to_vk(AddressMode::Repeat), vk::SamplerAddressMode::REPEAT);
}
