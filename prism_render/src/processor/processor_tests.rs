use super::*;
use slotmap::SlotMap;
use crate::config::RenderConfig;
use crate::data::{SlotState, VariableType};
use crate::graphics_device::mock_graphics_device::{MockGraphicsDevice, MockRenderPass};
use crate::graphics_device::{RenderPass, ShaderStage, TextureFormat};
use crate::texture::{Texture, TextureParam};

fn setup() -> (Arc<MockGraphicsDevice>, GraphicsContext) {
    let device = Arc::new(MockGraphicsDevice::new());
    let context = GraphicsContext::new(device.clone(), RenderConfig::default()).unwrap();
    (device, context)
}

fn target_handle() -> TargetHandle {
    let mut targets: SlotMap<TargetHandle, ()> = SlotMap::with_key();
    targets.insert(())
}

fn target_info(slot_count: usize, layers: u32) -> RenderTargetInfo {
    RenderTargetInfo {
        name: "scene".to_string(),
        width: 100,
        height: 50,
        layers,
        slot_count,
        render_pass: Some(Arc::new(MockRenderPass) as Arc<dyn RenderPass>),
        render_pass_compatibility_id: 7,
        color_attachment_count: 1,
        has_depth_attachment: true,
    }
}

fn triangle(device: &MockGraphicsDevice) -> ProcessorDesc {
    let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    ProcessorDesc {
        data: vec![DataContainer::vertex(VariableType::Vec3, &positions)],
        uniform_data: vec![DataContainer::uniform(&[0.0f32; 4])],
        ..ProcessorDesc::graphics("triangle", device.mock_shader("triangle", &[ShaderStage::Vertex, ShaderStage::Fragment]))
    }
}

fn quad(device: &MockGraphicsDevice) -> ProcessorDesc {
    let positions: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
    ProcessorDesc {
        data: vec![DataContainer::vertex(VariableType::Vec2, &positions)],
        indices: Some(DataContainer::indices(&[0, 1, 2, 2, 3, 0])),
        ..ProcessorDesc::graphics("quad", device.mock_shader("quad", &[ShaderStage::Vertex, ShaderStage::Fragment]))
    }
}

fn record(device: &MockGraphicsDevice, processor: &Processor, slot: usize, layer: u32) -> Vec<String> {
    let mut command_list = device.create_command_list("record").unwrap();
    command_list.reset().unwrap();
    processor.update_command_list(command_list.as_mut(), slot, layer, 0).unwrap();
    device.commands("record")
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_new_processor_is_enabled_and_uninitialized() {
    let (device, _) = setup();
    let processor = Processor::new(triangle(&device), target_handle()).unwrap();
    assert!(processor.is_enabled());
    assert_eq!(processor.rendering_order(), 0);
    assert!(!processor.is_initialized());
    assert_eq!(processor.pipeline_id(), 0);
}

#[test]
fn test_compute_processor_rejects_vertex_data() {
    let (device, _) = setup();
    let desc = ProcessorDesc {
        data: vec![DataContainer::vertex(VariableType::Float, &[1.0f32])],
        ..ProcessorDesc::compute("blur", device.mock_shader("blur", &[ShaderStage::Compute]))
    };
    assert!(matches!(Processor::new(desc, target_handle()), Err(Error::InvalidConfiguration(_))));
}

#[test]
fn test_empty_texture_reader_array_rejected() {
    let (device, _) = setup();
    let desc = ProcessorDesc { texture_readers: vec![Vec::new()], ..triangle(&device) };
    assert!(Processor::new(desc, target_handle()).is_err());
}

// ============================================================================
// Initialization
// ============================================================================

#[test]
fn test_initialize_creates_per_slot_resources() {
    let (device, mut context) = setup();
    let mut processor = Processor::new(triangle(&device), target_handle()).unwrap();
    processor.initialize(&mut context, &target_info(3, 1)).unwrap();

    assert!(processor.is_initialized());
    assert_eq!(processor.pipeline_id(), 1);
    device.with_log(|log| {
        assert!(log.created_buffers.contains(&"triangle - data0 - slot2".to_string()));
        assert!(log.created_buffers.contains(&"triangle - uniform0 - slot0".to_string()));
        assert_eq!(log.created_descriptor_sets, 3);
    });
    assert!((0..3).all(|slot| processor.needs_command_list_refresh(slot)));
}

#[test]
fn test_processors_with_same_state_share_pipeline() {
    let (device, mut context) = setup();
    let desc = triangle(&device);
    let mut first = Processor::new(desc.clone(), target_handle()).unwrap();
    let mut second = Processor::new(ProcessorDesc { name: "other".to_string(), ..desc }, target_handle()).unwrap();
    first.initialize(&mut context, &target_info(2, 1)).unwrap();
    second.initialize(&mut context, &target_info(2, 1)).unwrap();

    assert!(Arc::ptr_eq(first.pipeline().unwrap(), second.pipeline().unwrap()));
    assert_eq!(context.pipeline_cache().len(), 1);
}

#[test]
fn test_cleanup_then_reinitialize() {
    let (device, mut context) = setup();
    let mut processor = Processor::new(triangle(&device), target_handle()).unwrap();
    processor.initialize(&mut context, &target_info(2, 1)).unwrap();
    processor.cleanup();
    assert!(!processor.is_initialized());

    let mut bigger = target_info(2, 1);
    bigger.width = 200;
    processor.initialize(&mut context, &bigger).unwrap();
    assert_eq!(processor.pipeline_id(), 2);
}

// ============================================================================
// Data updates
// ============================================================================

#[test]
fn test_update_graphic_data_uploads_only_requested_slot() {
    let (device, mut context) = setup();
    let textures = TextureArena::with_key();
    let mut processor = Processor::new(triangle(&device), target_handle()).unwrap();
    processor.initialize(&mut context, &target_info(2, 1)).unwrap();
    processor.update_graphic_data(0, &mut context, &textures).unwrap();
    processor.mark_recorded(0);
    processor.update_graphic_data(1, &mut context, &textures).unwrap();
    processor.mark_recorded(1);

    processor.update_data(0, &[[0.5f32, 0.5, 0.0], [1.0, 0.5, 0.0], [0.5, 1.0, 0.0]]);
    let buffers_before = device.with_log(|log| log.created_buffers.len());
    processor.update_graphic_data(0, &mut context, &textures).unwrap();

    // The static slot 0 buffer is recreated as dynamic
    assert_eq!(device.with_log(|log| log.created_buffers.len()), buffers_before + 1);
    assert!(processor.needs_command_list_refresh(0));
    assert!(!processor.needs_command_list_refresh(1));
    assert_eq!(processor.data[0].slot_state(1).unwrap(), SlotState::Staged);
}

#[test]
fn test_uniform_update_of_same_size_keeps_recording() {
    let (device, mut context) = setup();
    let textures = TextureArena::with_key();
    let mut processor = Processor::new(triangle(&device), target_handle()).unwrap();
    processor.initialize(&mut context, &target_info(1, 1)).unwrap();
    processor.update_graphic_data(0, &mut context, &textures).unwrap();
    processor.mark_recorded(0);
    let writes_before = device.with_log(|log| log.descriptor_writes);

    processor.update_uniform_data(0, &[1.0f32, 2.0, 3.0, 4.0]);
    processor.update_graphic_data(0, &mut context, &textures).unwrap();

    assert!(!processor.needs_command_list_refresh(0));
    assert_eq!(device.with_log(|log| log.descriptor_writes), writes_before);
    assert_eq!(processor.uniform_data[0].slot_state(0).unwrap(), SlotState::Bound);
}

#[test]
fn test_row_count_change_requires_new_recording() {
    let (device, mut context) = setup();
    let textures = TextureArena::with_key();
    let mut processor = Processor::new(quad(&device), target_handle()).unwrap();
    processor.initialize(&mut context, &target_info(1, 1)).unwrap();

    // First update promotes the index buffer to dynamic
    processor.update_indices(&[0, 1, 2, 2, 3, 0]);
    processor.update_graphic_data(0, &mut context, &textures).unwrap();
    processor.mark_recorded(0);
    assert!(!processor.needs_command_list_refresh(0));

    processor.update_indices(&[0, 1, 2]);
    processor.update_graphic_data(0, &mut context, &textures).unwrap();
    assert!(processor.needs_command_list_refresh(0));
}

#[test]
fn test_texture_reader_requires_initialized_texture() {
    let (device, _) = setup();
    let mut textures = TextureArena::with_key();
    let albedo = textures.insert(Texture::build_empty_rgba("albedo").unwrap());
    let desc = ProcessorDesc {
        texture_readers: vec![vec![TextureReader::new(albedo, TextureParam::linear())]],
        ..triangle(&device)
    };
    let mut processor = Processor::new(desc, target_handle()).unwrap();

    let replacement = textures.insert(Texture::build_empty_rgba("replacement").unwrap());
    let reader = TextureReader::new(replacement, TextureParam::nearest());
    assert!(processor.update_uniform_texture_reader(0, reader, &textures).is_err());

    textures[replacement].initialize(device.as_ref()).unwrap();
    processor.update_uniform_texture_reader(0, reader, &textures).unwrap();
    assert_eq!(processor.texture_readers()[0][0].texture, replacement);
    assert_eq!(processor.textures_read().collect::<Vec<_>>(), vec![replacement]);
}

#[test]
fn test_texture_reader_change_dirties_every_slot_descriptor() {
    let (device, mut context) = setup();
    let mut textures = TextureArena::with_key();
    let albedo = textures.insert(Texture::build_empty_rgba("albedo").unwrap());
    let other = textures.insert(Texture::build_empty_rgba("other").unwrap());
    textures[albedo].initialize(device.as_ref()).unwrap();
    textures[other].initialize(device.as_ref()).unwrap();

    let desc = ProcessorDesc {
        texture_readers: vec![vec![TextureReader::new(albedo, TextureParam::linear())]],
        ..triangle(&device)
    };
    let mut processor = Processor::new(desc, target_handle()).unwrap();
    processor.initialize(&mut context, &target_info(2, 1)).unwrap();
    for slot in 0..2 {
        processor.update_graphic_data(slot, &mut context, &textures).unwrap();
        processor.mark_recorded(slot);
    }
    let writes_before = device.with_log(|log| log.descriptor_writes);

    processor
        .update_uniform_texture_reader(0, TextureReader::new(other, TextureParam::linear()), &textures)
        .unwrap();
    for slot in 0..2 {
        processor.update_graphic_data(slot, &mut context, &textures).unwrap();
        assert!(processor.needs_command_list_refresh(slot));
    }
    // Uniform + sampler binding per slot
    assert_eq!(device.with_log(|log| log.descriptor_writes), writes_before + 4);
    assert_eq!(context.sampler_cache().len(), 1);
}

// ============================================================================
// Recording
// ============================================================================

#[test]
fn test_non_indexed_draw_uses_first_container_rows() {
    let (device, mut context) = setup();
    let textures = TextureArena::with_key();
    let mut processor = Processor::new(triangle(&device), target_handle()).unwrap();
    processor.initialize(&mut context, &target_info(1, 1)).unwrap();
    processor.update_graphic_data(0, &mut context, &textures).unwrap();

    assert_eq!(
        record(&device, &processor, 0, 0),
        vec![
            "bind_pipeline(triangle)",
            "bind_descriptor_set",
            "set_scissor(0, 0, 100, 50)",
            "bind_vertex_buffers(0, 1)",
            "draw(3, 1)",
        ]
    );
}

#[test]
fn test_indexed_draw_with_instances() {
    let (device, mut context) = setup();
    let transforms = [[0.0f32; 16]; 2];
    let desc = ProcessorDesc {
        instance_data: Some(DataContainer::vertex(VariableType::Mat4, &transforms)),
        scissor: Some(Rect2D { x: 5, y: 5, width: 10, height: 10 }),
        ..quad(&device)
    };
    let mut processor = Processor::new(desc, target_handle()).unwrap();
    processor.initialize(&mut context, &target_info(1, 1)).unwrap();

    assert_eq!(
        record(&device, &processor, 0, 0),
        vec![
            "bind_pipeline(quad)",
            "set_scissor(5, 5, 10, 10)",
            "bind_vertex_buffers(0, 1)",
            "bind_vertex_buffers(1, 1)",
            "bind_index_buffer(U32)",
            "draw_indexed(6, 2)",
        ]
    );
}

#[test]
fn test_bound_pipeline_is_not_rebound() {
    let (device, mut context) = setup();
    let mut processor = Processor::new(quad(&device), target_handle()).unwrap();
    processor.initialize(&mut context, &target_info(1, 1)).unwrap();

    let mut command_list = device.create_command_list("record").unwrap();
    let bound = processor.update_command_list(command_list.as_mut(), 0, 0, 0).unwrap();
    assert_eq!(bound, processor.pipeline_id());
    processor.update_command_list(command_list.as_mut(), 0, 0, bound).unwrap();

    let binds = device.commands("record").iter().filter(|c| c.starts_with("bind_pipeline")).count();
    assert_eq!(binds, 1);
}

#[test]
fn test_layers_mask_skips_layers() {
    let (device, mut context) = setup();
    let desc = ProcessorDesc { layers_mask: 0b10, ..quad(&device) };
    let mut processor = Processor::new(desc, target_handle()).unwrap();
    processor.initialize(&mut context, &target_info(1, 2)).unwrap();

    assert!(record(&device, &processor, 0, 0).is_empty());
    assert!(!record(&device, &processor, 0, 1).is_empty());

    processor.mark_recorded(0);
    processor.set_layers_mask(0b01);
    assert!(processor.needs_command_list_refresh(0));
    assert!(!record(&device, &processor, 0, 0).is_empty());
}

#[test]
fn test_layer_index_is_pushed_and_always_refreshed() {
    let (device, mut context) = setup();
    let desc = ProcessorDesc { layer_index_in_shader: true, ..quad(&device) };
    let mut processor = Processor::new(desc, target_handle()).unwrap();
    processor.initialize(&mut context, &target_info(1, 2)).unwrap();
    processor.mark_recorded(0);

    assert!(processor.needs_command_list_refresh(0));
    let commands = record(&device, &processor, 0, 1);
    assert_eq!(commands[1], "push_constants([1, 0, 0, 0])");
}

#[test]
fn test_compute_dispatch_covers_target() {
    let (device, mut context) = setup();
    let mut textures = TextureArena::with_key();
    let mut output = Texture::build_array("blurred", 100, 50, 3, TextureFormat::R16G16B16A16_SFLOAT, None).unwrap();
    output.enable_texture_writing(crate::graphics_device::OutputUsage::Compute).unwrap();
    output.initialize(device.as_ref()).unwrap();
    let output = textures.insert(output);

    let desc = ProcessorDesc {
        outputs: vec![output],
        ..ProcessorDesc::compute("blur", device.mock_shader("blur", &[ShaderStage::Compute]))
    };
    let mut processor = Processor::new(desc, target_handle()).unwrap();
    let mut info = target_info(1, 3);
    info.render_pass = None;
    info.has_depth_attachment = false;
    processor.initialize(&mut context, &info).unwrap();
    processor.update_graphic_data(0, &mut context, &textures).unwrap();

    assert_eq!(
        record(&device, &processor, 0, 0),
        vec!["bind_pipeline(blur)", "bind_descriptor_set", "dispatch(7, 4, 3)"]
    );
    assert!(record(&device, &processor, 0, 1).is_empty());
}

#[test]
fn test_set_scissor_requires_custom_scissor() {
    let (device, mut context) = setup();
    let mut processor = Processor::new(quad(&device), target_handle()).unwrap();
    assert!(processor.set_scissor(Rect2D::from_size(10, 10)).is_err());

    let desc = ProcessorDesc { scissor: Some(Rect2D::from_size(10, 10)), ..quad(&device) };
    let mut processor = Processor::new(desc, target_handle()).unwrap();
    processor.initialize(&mut context, &target_info(1, 1)).unwrap();
    processor.mark_recorded(0);
    let pipeline = processor.pipeline_id();

    processor.set_scissor(Rect2D { x: 2, y: 3, width: 4, height: 5 }).unwrap();
    assert!(processor.needs_command_list_refresh(0));
    assert_eq!(processor.pipeline_id(), pipeline);
    assert!(record(&device, &processor, 0, 0).contains(&"set_scissor(2, 3, 4, 5)".to_string()));
}
