use super::*;
use crate::graphics_device::mock_graphics_device::{MockBuffer, MockGraphicsDevice};

fn content(buffer: &Arc<dyn Buffer>) -> Vec<u8> {
    let mock = unsafe { &*(Arc::as_ptr(buffer) as *const MockBuffer) };
    mock.data.lock().unwrap().clone()
}

#[test]
fn test_static_buffer_created_device_local() {
    let device = MockGraphicsDevice::new();
    let handler = BufferHandler::new(&device, "vb", BufferUsage::Vertex, BufferKind::Static, &[1u8; 32]).unwrap();
    assert_eq!(handler.kind(), BufferKind::Static);
    assert_eq!(handler.buffer().size(), 32);
    assert_eq!(handler.data_size(), 32);
}

#[test]
fn test_empty_data_uses_minimum_size() {
    let device = MockGraphicsDevice::new();
    let handler = BufferHandler::new(&device, "empty", BufferUsage::Vertex, BufferKind::Dynamic, &[]).unwrap();
    assert_eq!(handler.buffer().size(), MIN_BUFFER_SIZE);
}

#[test]
fn test_static_update_promotes_to_dynamic() {
    let device = MockGraphicsDevice::new();
    let mut handler = BufferHandler::new(&device, "vb", BufferUsage::Vertex, BufferKind::Static, &[0u8; 32]).unwrap();

    let changed = handler.update_data(&device, &[7u8; 16]).unwrap();
    assert!(changed);
    assert_eq!(handler.kind(), BufferKind::Dynamic);
    assert_eq!(handler.buffer().size(), 32);
    assert_eq!(&content(handler.buffer())[..16], &[7u8; 16]);
}

#[test]
fn test_dynamic_update_in_place() {
    let device = MockGraphicsDevice::new();
    let mut handler = BufferHandler::new(&device, "ub", BufferUsage::Uniform, BufferKind::Dynamic, &[0u8; 64]).unwrap();
    let before = Arc::as_ptr(handler.buffer()) as *const () as usize;

    let changed = handler.update_data(&device, &[3u8; 64]).unwrap();
    assert!(!changed);
    assert_eq!(Arc::as_ptr(handler.buffer()) as *const () as usize, before);
    assert_eq!(content(handler.buffer()), vec![3u8; 64]);
}

#[test]
fn test_dynamic_update_grows_buffer() {
    let device = MockGraphicsDevice::new();
    let mut handler = BufferHandler::new(&device, "ub", BufferUsage::Vertex, BufferKind::Dynamic, &[0u8; 16]).unwrap();
    let changed = handler.update_data(&device, &[1u8; 48]).unwrap();
    assert!(changed);
    assert_eq!(handler.buffer().size(), 48);
    assert_eq!(handler.data_size(), 48);
}

#[test]
fn test_per_frame_buffers_are_independent() {
    let device = MockGraphicsDevice::new();
    let mut buffers = PerFrameBuffers::new(&device, "data0", BufferUsage::Vertex, BufferKind::Static, 3, &[0u8; 16]).unwrap();
    assert_eq!(buffers.len(), 3);

    assert!(buffers.update_data(&device, 1, &[9u8; 16]).unwrap());
    assert_eq!(buffers.handler(0).kind(), BufferKind::Static);
    assert_eq!(buffers.handler(1).kind(), BufferKind::Dynamic);
    assert_eq!(buffers.handler(2).kind(), BufferKind::Static);

    let names = device.with_log(|log| log.created_buffers.clone());
    assert!(names.contains(&"data0 - slot2".to_string()));
}
