use super::*;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::{ClearValue, PipelineStages, ShaderStage, TextureFormat};
use crate::processor::ProcessorDesc;
use crate::render_graph::RenderGraph;
use crate::texture::{Texture, TextureParam, TextureReader};
use crate::data::{DataContainer, VariableType};
use crate::error::Error;

fn setup() -> (Arc<MockGraphicsDevice>, RenderGraph) {
    let device = Arc::new(MockGraphicsDevice::new());
    let context = GraphicsContext::new(device.clone(), RenderConfig::default()).unwrap();
    (device, RenderGraph::new(context))
}

fn color_texture(graph: &mut RenderGraph, name: &str, width: u32, height: u32) -> TextureHandle {
    graph.add_texture(Texture::build(name, width, height, TextureFormat::R8G8B8A8_UNORM, None).unwrap())
}

fn clear(graph: &mut RenderGraph, target: TargetHandle, texture: TextureHandle) -> Result<()> {
    graph.add_output_texture(target, texture, LoadType::LoadClear, Some([0.0, 0.0, 0.0, 1.0]), OutputUsage::Graphics)
}

fn sampling(device: &MockGraphicsDevice, name: &str, texture: TextureHandle) -> ProcessorDesc {
    let positions: [[f32; 2]; 3] = [[-1.0, -1.0], [3.0, -1.0], [-1.0, 3.0]];
    ProcessorDesc {
        data: vec![DataContainer::vertex(VariableType::Vec2, &positions)],
        texture_readers: vec![vec![TextureReader::new(texture, TextureParam::linear())]],
        ..ProcessorDesc::graphics(name, device.mock_shader(name, &[ShaderStage::Vertex, ShaderStage::Fragment]))
    }
}

/// Initialized offscreen target rendering into a new 64x64 texture
fn producer(graph: &mut RenderGraph, name: &str) -> (TargetHandle, TextureHandle) {
    let texture = color_texture(graph, &format!("{} color", name), 64, 64);
    let target = graph.create_offscreen_target(name, DepthPolicy::None);
    clear(graph, target, texture).unwrap();
    graph.initialize_target(target).unwrap();
    (target, texture)
}

/// Initialized offscreen target sampling `source`
fn consumer(device: &MockGraphicsDevice, graph: &mut RenderGraph, name: &str, source: TextureHandle) -> TargetHandle {
    let texture = color_texture(graph, &format!("{} color", name), 32, 32);
    let target = graph.create_offscreen_target(name, DepthPolicy::None);
    clear(graph, target, texture).unwrap();
    graph.add_processor(target, sampling(device, name, source)).unwrap();
    graph.initialize_target(target).unwrap();
    target
}

// ============================================================================
// Outputs
// ============================================================================

#[test]
fn test_output_size_taken_from_first_texture() {
    let (_, mut graph) = setup();
    let target = graph.create_offscreen_target("gbuffer", DepthPolicy::None);
    let albedo = color_texture(&mut graph, "albedo", 128, 64);
    let normal = color_texture(&mut graph, "normal", 128, 64);
    let small = color_texture(&mut graph, "small", 64, 64);

    clear(&mut graph, target, albedo).unwrap();
    clear(&mut graph, target, normal).unwrap();
    assert!(matches!(clear(&mut graph, target, small), Err(Error::InvalidConfiguration(_))));

    let offscreen = graph.render_target(target).unwrap().offscreen().unwrap();
    assert_eq!(offscreen.output_size(), (128, 64, 1));
    assert_eq!(offscreen.outputs().len(), 2);
    assert!(graph.texture(albedo).unwrap().is_writable());
    assert!(graph.texture(albedo).unwrap().is_initialized());
}

#[test]
fn test_output_load_rules() {
    let (_, mut graph) = setup();
    let target = graph.create_offscreen_target("post", DepthPolicy::None);
    let fresh = color_texture(&mut graph, "fresh", 64, 64);

    // Nothing was ever written into it
    let loaded = graph.add_output_texture(target, fresh, LoadType::LoadContent, None, OutputUsage::Graphics);
    assert!(matches!(loaded, Err(Error::InvalidConfiguration(_))));

    let cleared = graph.add_output_texture(target, fresh, LoadType::LoadClear, None, OutputUsage::Graphics);
    assert!(matches!(cleared, Err(Error::InvalidConfiguration(_))));

    let compute = graph.add_output_texture(target, fresh, LoadType::LoadClear, Some([0.0; 4]), OutputUsage::Compute);
    assert!(matches!(compute, Err(Error::InvalidConfiguration(_))));

    graph.add_output_texture(target, fresh, LoadType::NoLoad, None, OutputUsage::Graphics).unwrap();
}

#[test]
fn test_outputs_fixed_after_initialization() {
    let (_, mut graph) = setup();
    let (target, _) = producer(&mut graph, "scene");
    let other = color_texture(&mut graph, "other", 64, 64);

    assert!(clear(&mut graph, target, other).is_err());
    assert!(graph.set_output_size(target, 64, 64, 1, false).is_err());
}

#[test]
fn test_depth_only_target_requires_output_size() {
    let (device, mut graph) = setup();
    let target = graph.create_offscreen_target("shadow", DepthPolicy::Shared);
    assert!(matches!(graph.initialize_target(target), Err(Error::InvalidConfiguration(_))));
    assert!(graph.set_output_size(target, 0, 128, 1, false).is_err());

    graph.set_output_size(target, 256, 256, 1, false).unwrap();
    graph.initialize_target(target).unwrap();

    device.with_log(|log| {
        let pass = log.created_render_passes.last().unwrap();
        assert!(pass.color_attachments.is_empty());
        assert_eq!(pass.depth_attachment.unwrap().store_op, StoreOp::Store);
    });
    graph.render_frame(0).unwrap();
    assert_eq!(device.commands("shadow - slot0")[1], "begin_render_pass(256x256, clears=1)");

    let depth = graph.depth_texture(target).unwrap();
    assert_eq!(graph.render_target(target).unwrap().written_textures(), vec![depth]);
    assert_eq!(graph.texture(depth).unwrap().last_writer(), Some(target));
}

#[test]
fn test_attachment_operations_follow_load_type() {
    let (device, mut graph) = setup();
    let (scene, color) = producer(&mut graph, "scene");
    graph.render_frame(0).unwrap();

    let overlay = graph.create_offscreen_target("overlay", DepthPolicy::None);
    graph.add_output_texture(overlay, color, LoadType::LoadContent, None, OutputUsage::Graphics).unwrap();
    graph.initialize_target(overlay).unwrap();

    device.with_log(|log| {
        let cleared = log.created_render_passes[0].color_attachments[0];
        assert_eq!((cleared.load_op, cleared.initial_layout), (LoadOp::Clear, ImageLayout::Undefined));
        let loaded = log.created_render_passes[1].color_attachments[0];
        assert_eq!((loaded.load_op, loaded.initial_layout), (LoadOp::Load, ImageLayout::ShaderReadOnly));
        assert_eq!(loaded.final_layout, ImageLayout::ShaderReadOnly);
    });
    assert_eq!(graph.render_dependencies(overlay).unwrap(), vec![scene]);
}

#[test]
fn test_default_clear_color_when_unset() {
    let (_, mut graph) = setup();
    let target = graph.create_offscreen_target("scene", DepthPolicy::None);
    let texture = color_texture(&mut graph, "color", 16, 16);
    graph.add_output_texture(target, texture, LoadType::NoLoad, None, OutputUsage::Graphics).unwrap();
    graph.initialize_target(target).unwrap();

    let resources = graph.render_target(target).unwrap().resources.as_ref().unwrap();
    assert_eq!(resources.clear_values[0], vec![ClearValue::Color(DEFAULT_CLEAR_COLOR)]);
}

#[test]
fn test_enable_only_output_switches_framebuffer_set() {
    let (device, mut graph) = setup();
    let target = graph.create_offscreen_target("faces", DepthPolicy::None);
    let first = color_texture(&mut graph, "face 0", 32, 32);
    let second = color_texture(&mut graph, "face 1", 32, 32);
    clear(&mut graph, target, first).unwrap();
    clear(&mut graph, target, second).unwrap();
    graph.initialize_target(target).unwrap();
    assert_eq!(device.with_log(|log| log.created_render_passes[0].color_attachments.len()), 2);

    graph.enable_only_output(target, second).unwrap();

    // Rebuilt with one framebuffer per output
    device.with_log(|log| {
        assert_eq!(log.created_render_passes.len(), 2);
        assert_eq!(log.created_render_passes[1].color_attachments.len(), 1);
        assert_eq!(log.created_framebuffers.len(), 3);
    });
    let offscreen = graph.render_target(target).unwrap().offscreen().unwrap();
    assert_eq!(offscreen.active_framebuffer_set(), 1);
    graph.render_frame(0).unwrap();
    assert_eq!(device.commands("faces - slot0")[1], "begin_render_pass(32x32, clears=1)");

    // Same layout: only re-recorded
    graph.enable_only_output(target, first).unwrap();
    assert_eq!(device.with_log(|log| log.created_render_passes.len()), 2);
    assert_eq!(graph.render_target(target).unwrap().offscreen().unwrap().active_framebuffer_set(), 0);
    assert!(graph.render_target(target).unwrap().needs_command_list_refresh(0, graph.processors()));

    let unknown = color_texture(&mut graph, "unknown", 32, 32);
    assert!(graph.enable_only_output(target, unknown).is_err());
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "not interchangeable")]
fn test_enable_only_output_rejects_mismatched_formats() {
    let (_, mut graph) = setup();
    let target = graph.create_offscreen_target("faces", DepthPolicy::None);
    let first = color_texture(&mut graph, "face 0", 32, 32);
    let second = graph.add_texture(Texture::build("face 1", 32, 32, TextureFormat::R16G16B16A16_SFLOAT, None).unwrap());
    clear(&mut graph, target, first).unwrap();
    clear(&mut graph, target, second).unwrap();

    let _ = graph.enable_only_output(target, second);
}

#[test]
fn test_reset_output_forgets_written_textures() {
    let (_, mut graph) = setup();
    let (target, color) = producer(&mut graph, "scene");
    graph.render_frame(0).unwrap();
    assert_eq!(graph.texture(color).unwrap().last_writer(), Some(target));

    graph.reset_output(target).unwrap();

    assert!(!graph.render_target(target).unwrap().is_initialized());
    assert!(graph.render_target(target).unwrap().written_textures().is_empty());
    assert_eq!(graph.texture(color).unwrap().last_writer(), None);
    assert!(graph.initialize_target(target).is_err());
}

// ============================================================================
// Compute targets
// ============================================================================

#[test]
fn test_compute_target_dispatches_without_render_pass() {
    let (device, mut graph) = setup();
    let texture = graph.add_texture(
        Texture::build("blurred", 64, 64, TextureFormat::R16G16B16A16_SFLOAT, None).unwrap(),
    );
    let target = graph.create_offscreen_target("blur", DepthPolicy::None);
    graph.add_output_texture(target, texture, LoadType::NoLoad, None, OutputUsage::Compute).unwrap();
    let desc = ProcessorDesc {
        outputs: vec![texture],
        ..ProcessorDesc::compute("blur", device.mock_shader("blur", &[ShaderStage::Compute]))
    };
    graph.add_processor(target, desc).unwrap();
    graph.initialize_target(target).unwrap();

    graph.render_frame(0).unwrap();

    assert!(device.with_log(|log| log.created_render_passes.is_empty()));
    assert_eq!(
        device.commands("blur - slot0"),
        vec!["begin", "bind_pipeline(blur)", "bind_descriptor_set", "dispatch(4, 4, 1)", "end"]
    );
    let stages = graph.render_target(target).unwrap().dependency_wait_stages(graph.processors());
    assert_eq!(stages, PipelineStages::COMPUTE_SHADER);
}

#[test]
fn test_compute_target_rejects_depth() {
    let (_, mut graph) = setup();
    let texture = graph.add_texture(
        Texture::build("blurred", 64, 64, TextureFormat::R16G16B16A16_SFLOAT, None).unwrap(),
    );
    let target = graph.create_offscreen_target("blur", DepthPolicy::Local);
    graph.add_output_texture(target, texture, LoadType::NoLoad, None, OutputUsage::Compute).unwrap();
    assert!(matches!(graph.initialize_target(target), Err(Error::InvalidConfiguration(_))));
}

// ============================================================================
// Submit semaphores
// ============================================================================

#[test]
fn test_one_semaphore_per_dependent() {
    let (device, mut graph) = setup();
    let (scene, color) = producer(&mut graph, "scene");
    let first = consumer(&device, &mut graph, "first", color);
    let second = consumer(&device, &mut graph, "second", color);
    let third = consumer(&device, &mut graph, "third", color);

    graph.render(scene, 0, 2).unwrap();
    graph.render(first, 0, 0).unwrap();
    graph.render(second, 0, 0).unwrap();

    let result = graph.render(third, 0, 0);
    assert!(matches!(result, Err(Error::InvalidResource(message)) if message.contains("scene/0 (requester: third)")));
    device.with_log(|log| {
        let signaled = &log.submissions[0].signal;
        assert_eq!(signaled.len(), 2);
        // Popped last to first
        assert_eq!(log.submissions[1].wait, vec![signaled[1]]);
        assert_eq!(log.submissions[2].wait, vec![signaled[0]]);
    });
}

#[test]
fn test_unconsumed_semaphores_block_next_frame() {
    let (_, mut graph) = setup();
    let (scene, _) = producer(&mut graph, "scene");

    graph.render(scene, 0, 1).unwrap();
    let result = graph.render(scene, 1, 0);
    assert!(matches!(result, Err(Error::InvalidConfiguration(message)) if message.contains("remaining: 1")));
}

#[test]
fn test_dependents_bounded_by_semaphore_pool() {
    let (_, mut graph) = setup();
    let (scene, _) = producer(&mut graph, "scene");
    let max_submit_semaphores = graph.context().config().max_submit_semaphores;

    assert!(graph.render(scene, 0, max_submit_semaphores + 1).is_err());
    graph.render(scene, 0, max_submit_semaphores).unwrap();
}

#[test]
fn test_output_of_previous_frame_needs_no_wait() {
    let (device, mut graph) = setup();
    let (scene, color) = producer(&mut graph, "scene");
    let reader = consumer(&device, &mut graph, "reader", color);

    graph.render(scene, 0, 0).unwrap();
    graph.render(reader, 1, 0).unwrap();

    assert_eq!(graph.render_dependencies(reader).unwrap(), vec![scene]);
    device.with_log(|log| assert!(log.submissions[1].wait.is_empty()));
}
