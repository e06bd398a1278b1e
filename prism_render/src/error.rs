/// Error types for the Prism render core
///
/// Device-level failures, resource misuse, and fatal configuration errors
/// all flow through the same `Error` enum.

use std::fmt;

/// Result type for Prism render operations
pub type Result<T> = std::result::Result<T, Error>;

/// Prism render errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan object creation, submission, wait)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (stale handle, missing attachment, misused texture)
    InvalidResource(String),

    /// Initialization failed (device, swapchain, render target)
    InitializationFailed(String),

    /// Invalid configuration (missing setup before build, unsupported format feature)
    InvalidConfiguration(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
