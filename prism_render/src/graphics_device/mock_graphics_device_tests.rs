use super::*;
use crate::graphics_device::{BufferUsage, PipelineStages, WaitSemaphore};

fn buffer_desc(name: &str, size: u64, location: MemoryLocation) -> BufferDesc {
    BufferDesc {
        name: name.to_string(),
        size,
        usage: BufferUsage::Vertex,
        location,
    }
}

#[test]
fn test_mock_buffer_update_writes_bytes() {
    let device = MockGraphicsDevice::new();
    let buffer = device
        .create_buffer(&buffer_desc("vb", 8, MemoryLocation::HostVisible), None)
        .unwrap();
    buffer.update(4, &[1, 2, 3, 4]).unwrap();

    let mock = unsafe { &*(Arc::as_ptr(&buffer) as *const MockBuffer) };
    assert_eq!(*mock.data.lock().unwrap(), vec![0, 0, 0, 0, 1, 2, 3, 4]);
    assert_eq!(device.with_log(|log| log.created_buffers.clone()), vec!["vb".to_string()]);
}

#[test]
fn test_mock_buffer_update_rejects_device_local() {
    let device = MockGraphicsDevice::new();
    let buffer = device
        .create_buffer(&buffer_desc("vb", 8, MemoryLocation::DeviceLocal), Some(&[1, 2]))
        .unwrap();
    assert!(buffer.update(0, &[1]).is_err());
}

#[test]
fn test_mock_buffer_update_rejects_overflow() {
    let device = MockGraphicsDevice::new();
    let buffer = device
        .create_buffer(&buffer_desc("ub", 4, MemoryLocation::HostVisible), None)
        .unwrap();
    assert!(buffer.update(2, &[1, 2, 3]).is_err());
}

#[test]
fn test_mock_command_list_records_and_resets() {
    let device = MockGraphicsDevice::new();
    let mut list = device.create_command_list("main").unwrap();
    list.begin().unwrap();
    list.draw(3, 1).unwrap();
    list.end().unwrap();
    assert_eq!(device.commands("main"), vec!["begin", "draw(3, 1)", "end"]);

    list.reset().unwrap();
    assert!(device.commands("main").is_empty());
    assert_eq!(device.recordings("main"), 1);
}

#[test]
fn test_mock_submit_records_semaphore_ids() {
    let device = MockGraphicsDevice::new();
    let list = device.create_command_list("offscreen").unwrap();
    let wait = device.create_semaphore().unwrap();
    let signal = device.create_semaphore().unwrap();
    let fence = device.create_fence(true).unwrap();

    device
        .submit(&SubmitInfo {
            command_list: list.as_ref(),
            wait: &[WaitSemaphore { semaphore: wait.clone(), stages: PipelineStages::FRAGMENT_SHADER }],
            signal: &[signal.clone()],
            fence: Some(fence.as_ref()),
        })
        .unwrap();

    let submissions = device.with_log(|log| log.submissions.clone());
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].command_list, "offscreen");
    assert_eq!(submissions[0].wait, vec![semaphore_id(&wait)]);
    assert_eq!(submissions[0].signal, vec![semaphore_id(&signal)]);
    assert!(submissions[0].fence);
}

#[test]
fn test_mock_swapchain_round_robin_and_scripts() {
    let device = MockGraphicsDevice::new();
    let semaphore = device.create_semaphore().unwrap();
    let mut swapchain = device
        .create_swapchain(&SwapchainDesc { width: 1, height: 1, vertical_sync: true })
        .unwrap();
    assert_eq!(swapchain.image_count(), 3);
    assert_eq!(swapchain.extent(), (800, 600));

    device.script_acquire(AcquireOutcome::OutOfDate);
    assert_eq!(swapchain.acquire_next_image(&semaphore).unwrap(), AcquireOutcome::OutOfDate);
    assert_eq!(
        swapchain.acquire_next_image(&semaphore).unwrap(),
        AcquireOutcome::Acquired { image_index: 0, suboptimal: false }
    );
    assert_eq!(
        swapchain.acquire_next_image(&semaphore).unwrap(),
        AcquireOutcome::Acquired { image_index: 1, suboptimal: false }
    );

    device.script_present(PresentOutcome::Suboptimal);
    assert_eq!(swapchain.present(1, &semaphore).unwrap(), PresentOutcome::Suboptimal);
    assert_eq!(swapchain.present(1, &semaphore).unwrap(), PresentOutcome::Presented);
}

#[test]
fn test_mock_swapchain_invalid_surface() {
    let device = MockGraphicsDevice::new();
    device.set_surface_size(0, 600);
    assert!(device
        .create_swapchain(&SwapchainDesc { width: 0, height: 600, vertical_sync: true })
        .is_err());
}

#[test]
fn test_mock_linear_blit_support() {
    let device = MockGraphicsDevice::new();
    assert!(device.supports_linear_blit(TextureFormat::R8G8B8A8_UNORM));
    device.disable_linear_blit(TextureFormat::R8G8B8A8_UNORM);
    assert!(!device.supports_linear_blit(TextureFormat::R8G8B8A8_UNORM));
    assert!(device.supports_linear_blit(TextureFormat::R32_SFLOAT));
}
