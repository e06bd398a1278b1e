/// Render configuration

use crate::error::{Error, Result};

/// Render configuration shared by the graphics context and the backend
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Application name
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Enable validation/debug layers
    pub enable_validation: bool,
    /// Number of frames the CPU may prepare ahead of the GPU
    pub frames_in_flight: usize,
    /// Present with vertical synchronization
    pub vertical_sync: bool,
    /// Maximum number of downstream readers one offscreen target can signal per frame
    pub max_submit_semaphores: usize,
    /// Maximum number of times one transient presentation error is logged
    pub max_error_logs: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            app_name: "Prism Application".to_string(),
            app_version: (1, 0, 0),
            enable_validation: cfg!(debug_assertions),
            frames_in_flight: 2,
            vertical_sync: true,
            max_submit_semaphores: 5,
            max_error_logs: 50,
        }
    }
}

impl RenderConfig {
    /// Check the values the frame loop relies on
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            crate::engine_error!("prism::RenderConfig", "frames_in_flight must be at least 1");
            return Err(Error::InvalidConfiguration("frames_in_flight must be at least 1".to_string()));
        }
        if self.max_submit_semaphores == 0 {
            crate::engine_error!("prism::RenderConfig", "max_submit_semaphores must be at least 1");
            return Err(Error::InvalidConfiguration("max_submit_semaphores must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
