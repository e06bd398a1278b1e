use super::*;
use crate::config::RenderConfig;
use crate::data::{DataContainer, VariableType};
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::{ShaderStage, TextureFormat};
use crate::texture::TextureParam;

fn setup() -> (Arc<MockGraphicsDevice>, RenderGraph) {
    let device = Arc::new(MockGraphicsDevice::new());
    let context = GraphicsContext::new(device.clone(), RenderConfig::default()).unwrap();
    (device, RenderGraph::new(context))
}

fn fullscreen(device: &MockGraphicsDevice, name: &str, sources: &[TextureHandle]) -> ProcessorDesc {
    let positions: [[f32; 2]; 3] = [[-1.0, -1.0], [3.0, -1.0], [-1.0, 3.0]];
    ProcessorDesc {
        data: vec![DataContainer::vertex(VariableType::Vec2, &positions)],
        texture_readers: sources
            .iter()
            .map(|source| vec![TextureReader::new(*source, TextureParam::linear())])
            .collect(),
        ..ProcessorDesc::graphics(name, device.mock_shader(name, &[ShaderStage::Vertex, ShaderStage::Fragment]))
    }
}

fn color_texture(graph: &mut RenderGraph, name: &str) -> TextureHandle {
    graph.add_texture(Texture::build(name, 64, 64, TextureFormat::R8G8B8A8_UNORM, None).unwrap())
}

/// Offscreen target clearing its own output, with one processor per source list
fn pass(
    device: &MockGraphicsDevice,
    graph: &mut RenderGraph,
    name: &str,
    sources: &[TextureHandle],
) -> (TargetHandle, TextureHandle) {
    let output = color_texture(graph, &format!("{} color", name));
    let target = graph.create_offscreen_target(name, DepthPolicy::None);
    graph
        .add_output_texture(target, output, LoadType::LoadClear, Some([0.0, 0.0, 0.0, 1.0]), OutputUsage::Graphics)
        .unwrap();
    if !sources.is_empty() {
        graph.add_processor(target, fullscreen(device, name, sources)).unwrap();
    }
    (target, output)
}

fn screen(device: &Arc<MockGraphicsDevice>, graph: &mut RenderGraph, sources: &[TextureHandle]) -> TargetHandle {
    let screen = graph.create_screen_target("screen", DepthPolicy::None, device.clone());
    graph.add_processor(screen, fullscreen(device, "present", sources)).unwrap();
    screen
}

// ============================================================================
// Frame plan
// ============================================================================

#[test]
fn test_frame_plan_orders_producers_first() {
    let (device, mut graph) = setup();
    // Created before its producer
    let bloom_color = color_texture(&mut graph, "bloom color");
    let bloom = graph.create_offscreen_target("bloom", DepthPolicy::None);
    graph
        .add_output_texture(bloom, bloom_color, LoadType::NoLoad, None, OutputUsage::Graphics)
        .unwrap();
    let (scene, scene_color) = pass(&device, &mut graph, "scene", &[]);
    graph.add_processor(bloom, fullscreen(&device, "bloom", &[scene_color])).unwrap();
    let screen = screen(&device, &mut graph, &[bloom_color, scene_color]);
    for target in [bloom, scene, screen] {
        graph.initialize_target(target).unwrap();
    }

    let plan = graph.frame_plan().unwrap();

    assert_eq!(plan, vec![(scene, 2), (bloom, 1), (screen, 0)]);
    assert_eq!(graph.num_dependents(scene).unwrap(), 2);
}

#[test]
fn test_frame_plan_skips_uninitialized_targets() {
    let (device, mut graph) = setup();
    let (scene, scene_color) = pass(&device, &mut graph, "scene", &[]);
    let screen = screen(&device, &mut graph, &[scene_color]);
    graph.initialize_target(screen).unwrap();

    assert_eq!(graph.frame_plan().unwrap(), vec![(screen, 0)]);
    assert_eq!(graph.num_dependents(scene).unwrap(), 0);
}

#[test]
fn test_cyclic_dependency_rejected() {
    let (device, mut graph) = setup();
    let (ping, ping_color) = pass(&device, &mut graph, "ping", &[]);
    let (pong, pong_color) = pass(&device, &mut graph, "pong", &[ping_color]);
    graph.add_processor(ping, fullscreen(&device, "ping", &[pong_color])).unwrap();
    graph.initialize_target(ping).unwrap();
    graph.initialize_target(pong).unwrap();

    let result = graph.frame_plan();
    assert!(matches!(result, Err(Error::InvalidConfiguration(message)) if message.contains("Cyclic dependency")));
    assert!(graph.render_frame(0).is_err());
}

#[test]
fn test_loaded_own_output_is_not_a_dependency() {
    let (device, mut graph) = setup();
    let mut accumulation = Texture::build("accumulation", 64, 64, TextureFormat::R16G16B16A16_SFLOAT, None).unwrap();
    accumulation.enable_texture_writing(OutputUsage::Graphics).unwrap();
    let accumulation = graph.add_texture(accumulation);
    let target = graph.create_offscreen_target("accumulate", DepthPolicy::None);
    graph
        .add_output_texture(target, accumulation, LoadType::LoadContent, None, OutputUsage::Graphics)
        .unwrap();
    graph.initialize_target(target).unwrap();

    for frame in 0..3 {
        graph.render_frame(frame).unwrap();
    }

    assert_eq!(graph.frame_plan().unwrap(), vec![(target, 0)]);
    assert!(graph.render_dependencies(target).unwrap().is_empty());
    device.with_log(|log| assert!(log.submissions.iter().all(|s| s.wait.is_empty() && s.signal.is_empty())));
}

#[test]
fn test_external_depth_reader_follows_owner() {
    let (device, mut graph) = setup();
    // Created first so slot map order disagrees with dependency order
    let transparent = graph.create_offscreen_target("transparent", DepthPolicy::External);
    let opaque_color = color_texture(&mut graph, "opaque color");
    let opaque = graph.create_offscreen_target("opaque", DepthPolicy::Shared);
    graph
        .add_output_texture(opaque, opaque_color, LoadType::LoadClear, Some([0.0; 4]), OutputUsage::Graphics)
        .unwrap();
    graph.initialize_target(opaque).unwrap();

    graph
        .add_output_texture(transparent, opaque_color, LoadType::LoadContent, None, OutputUsage::Graphics)
        .unwrap();
    let depth = graph.depth_texture(opaque).unwrap();
    graph.set_external_depth_texture(transparent, depth).unwrap();
    graph.add_processor(transparent, fullscreen(&device, "glass", &[])).unwrap();
    graph.initialize_target(transparent).unwrap();

    assert_eq!(graph.frame_plan().unwrap(), vec![(opaque, 1), (transparent, 0)]);

    graph.render_frame(0).unwrap();
    device.with_log(|log| {
        assert_eq!(log.submissions[1].command_list, "transparent - slot0");
        assert_eq!(log.submissions[1].wait, log.submissions[0].signal);
    });
    assert_eq!(graph.texture(opaque_color).unwrap().last_writer(), Some(transparent));
    assert_eq!(graph.texture(depth).unwrap().last_writer(), Some(opaque));
}

// ============================================================================
// Frame rendering
// ============================================================================

#[test]
fn test_render_frame_chains_submissions() {
    let (device, mut graph) = setup();
    let (scene, scene_color) = pass(&device, &mut graph, "scene", &[]);
    let (blur, blur_color) = pass(&device, &mut graph, "blur", &[scene_color]);
    let screen = screen(&device, &mut graph, &[blur_color]);
    for target in [screen, blur, scene] {
        graph.initialize_target(target).unwrap();
    }

    for frame in 0..3 {
        graph.render_frame(frame).unwrap();
    }

    device.with_log(|log| {
        assert_eq!(log.submissions.len(), 9);
        for frame in log.submissions.chunks(3) {
            assert_eq!(frame[0].command_list, "scene - slot0");
            assert_eq!(frame[1].command_list, "blur - slot0");
            assert_eq!(frame[1].wait, frame[0].signal);
            assert_eq!(frame[2].wait[1..], frame[1].signal[..]);
        }
        assert_eq!(log.presents, vec![0, 1, 2]);
    });
    for target in [scene, blur] {
        let offscreen = graph.render_target(target).unwrap().offscreen().unwrap();
        assert_eq!(offscreen.remaining_submit_semaphores(), 0);
    }
}

#[test]
fn test_render_frame_without_targets() {
    let (device, mut graph) = setup();
    graph.create_offscreen_target("idle", DepthPolicy::None);
    graph.render_frame(0).unwrap();
    assert!(device.with_log(|log| log.submissions.is_empty()));
}

// ============================================================================
// Processors
// ============================================================================

#[test]
fn test_processor_added_to_initialized_target_is_initialized() {
    let (device, mut graph) = setup();
    let (scene, _) = pass(&device, &mut graph, "scene", &[]);
    graph.initialize_target(scene).unwrap();

    let processor = graph.add_processor(scene, fullscreen(&device, "sky", &[])).unwrap();

    assert!(graph.processor(processor).unwrap().is_initialized());
    assert_eq!(graph.processor(processor).unwrap().target(), scene);
    assert_eq!(graph.render_target(scene).unwrap().processors(), &[processor]);
}

#[test]
fn test_failed_processor_initialization_rolls_back() {
    let (device, mut graph) = setup();
    let (scene, _) = pass(&device, &mut graph, "scene", &[]);
    graph.initialize_target(scene).unwrap();

    // No depth attachment on the target
    let desc = ProcessorDesc { depth_test: true, ..fullscreen(&device, "mesh", &[]) };
    assert!(graph.add_processor(scene, desc).is_err());

    assert!(graph.render_target(scene).unwrap().processors().is_empty());
    assert!(graph.processors().is_empty());
}

#[test]
fn test_remove_processor_waits_for_device() {
    let (device, mut graph) = setup();
    let (scene, _) = pass(&device, &mut graph, "scene", &[]);
    let processor = graph.add_processor(scene, fullscreen(&device, "sky", &[])).unwrap();

    // Never initialized: nothing in flight
    graph.remove_processor(processor).unwrap();
    assert_eq!(device.with_log(|log| log.wait_idle_count), 0);

    graph.initialize_target(scene).unwrap();
    let processor = graph.add_processor(scene, fullscreen(&device, "sky", &[])).unwrap();
    graph.remove_processor(processor).unwrap();
    assert_eq!(device.with_log(|log| log.wait_idle_count), 1);
    assert!(graph.processor(processor).is_none());
    assert!(graph.remove_processor(processor).is_err());
}

#[test]
fn test_state_changes_mark_target_dirty() {
    let (device, mut graph) = setup();
    let (scene, _) = pass(&device, &mut graph, "scene", &[]);
    let sky = graph.add_processor(scene, fullscreen(&device, "sky", &[])).unwrap();
    let sun = graph.add_processor(scene, fullscreen(&device, "sun", &[])).unwrap();
    graph.initialize_target(scene).unwrap();
    graph.render_frame(0).unwrap();

    let needs_refresh = |graph: &RenderGraph| graph.render_target(scene).unwrap().needs_command_list_refresh(0, graph.processors());
    assert!(!needs_refresh(&graph));

    graph.set_rendering_order(sky, 0).unwrap();
    assert!(!needs_refresh(&graph));

    graph.set_rendering_order(sky, 5).unwrap();
    assert!(needs_refresh(&graph));
    graph.render_frame(1).unwrap();
    assert_eq!(graph.render_target(scene).unwrap().sorted_enabled_processors(graph.processors()), vec![sun, sky]);

    graph.disable_all_processors(scene).unwrap();
    assert!(needs_refresh(&graph));
    graph.render_frame(2).unwrap();
    assert!(graph.render_target(scene).unwrap().sorted_enabled_processors(graph.processors()).is_empty());
    assert_eq!(device.commands("scene - slot0"), vec!["begin", "begin_render_pass(64x64, clears=1)", "end_render_pass", "end"]);
}

#[test]
fn test_reader_update_changes_dependencies() {
    let (device, mut graph) = setup();
    let (scene, scene_color) = pass(&device, &mut graph, "scene", &[]);
    let still = graph.add_texture(Texture::build_empty_rgba("still").unwrap());
    graph.initialize_texture(still).unwrap();
    let screen = screen(&device, &mut graph, &[scene_color]);
    graph.initialize_target(scene).unwrap();
    graph.initialize_target(screen).unwrap();
    graph.render_frame(0).unwrap();
    assert_eq!(graph.render_dependencies(screen).unwrap(), vec![scene]);

    let present = graph.render_target(screen).unwrap().processors()[0];
    graph
        .update_uniform_texture_reader(present, 0, TextureReader::new(still, TextureParam::nearest()))
        .unwrap();

    assert!(graph.render_dependencies(screen).unwrap().is_empty());
    assert_eq!(graph.num_dependents(scene).unwrap(), 0);
    graph.render_frame(1).unwrap();
}

// ============================================================================
// Removal
// ============================================================================

#[test]
fn test_remove_target_requires_no_processors() {
    let (device, mut graph) = setup();
    let (scene, scene_color) = pass(&device, &mut graph, "scene", &[]);
    let sky = graph.add_processor(scene, fullscreen(&device, "sky", &[])).unwrap();
    graph.initialize_target(scene).unwrap();
    graph.render_frame(0).unwrap();

    assert!(matches!(graph.remove_target(scene), Err(Error::InvalidConfiguration(_))));

    graph.remove_processor(sky).unwrap();
    graph.remove_target(scene).unwrap();
    assert!(graph.render_target(scene).is_none());
    assert_eq!(graph.texture(scene_color).unwrap().last_writer(), None);
}

#[test]
fn test_remove_target_drops_owned_depth() {
    let (device, mut graph) = setup();
    let screen = graph.create_screen_target("screen", DepthPolicy::Shared, device.clone());
    graph.initialize_target(screen).unwrap();
    let depth = graph.depth_texture(screen).unwrap();

    graph.remove_target(screen).unwrap();

    assert!(graph.texture(depth).is_none());
    assert!(graph.remove_target(screen).is_err());
}

#[test]
fn test_remove_texture_in_use_rejected() {
    let (device, mut graph) = setup();
    let (scene, scene_color) = pass(&device, &mut graph, "scene", &[]);
    let (_, blur_color) = pass(&device, &mut graph, "blur", &[scene_color]);
    let unused = color_texture(&mut graph, "unused");
    graph.initialize_texture(unused).unwrap();

    // Read by the blur processor and written by the scene target
    assert!(matches!(graph.remove_texture(scene_color), Err(Error::InvalidConfiguration(_))));
    // Output of the blur target
    assert!(graph.remove_texture(blur_color).is_err());
    assert!(graph.texture(scene_color).is_some());

    let removed = graph.remove_texture(unused).unwrap();
    assert!(!removed.is_initialized());
    assert_eq!(device.with_log(|log| log.wait_idle_count), 1);

    graph.reset_output(scene).unwrap();
    assert!(graph.remove_texture(scene_color).is_err());
}

#[test]
fn test_drop_releases_everything() {
    let (device, mut graph) = setup();
    let (scene, scene_color) = pass(&device, &mut graph, "scene", &[]);
    let screen = screen(&device, &mut graph, &[scene_color]);
    graph.initialize_target(scene).unwrap();
    graph.initialize_target(screen).unwrap();
    graph.render_frame(0).unwrap();

    drop(graph);

    // Once for the graph, then once per initialized target
    assert_eq!(device.with_log(|log| log.wait_idle_count), 3);
}
