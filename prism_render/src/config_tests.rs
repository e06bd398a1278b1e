use crate::config::RenderConfig;
use crate::error::Error;

#[test]
fn test_default_values() {
    let config = RenderConfig::default();
    assert_eq!(config.frames_in_flight, 2);
    assert!(config.vertical_sync);
    assert_eq!(config.max_submit_semaphores, 5);
    assert_eq!(config.max_error_logs, 50);
    assert_eq!(config.enable_validation, cfg!(debug_assertions));
    assert!(config.validate().is_ok());
}

#[test]
fn test_zero_frames_in_flight_rejected() {
    let config = RenderConfig { frames_in_flight: 0, ..Default::default() };
    assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));
}

#[test]
fn test_zero_submit_semaphores_rejected() {
    let config = RenderConfig { max_submit_semaphores: 0, ..Default::default() };
    assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));
}
