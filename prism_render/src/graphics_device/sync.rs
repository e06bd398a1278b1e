/// Synchronization primitives and queue submission

use bitflags::bitflags;
use crate::error::Result;
use crate::graphics_device::CommandList;

/// CPU-GPU synchronization
pub trait Fence: Send + Sync {
    /// Block until the fence is signaled (no timeout)
    fn wait(&self) -> Result<()>;

    /// Reset the fence to unsignaled
    fn reset(&self) -> Result<()>;
}

/// GPU-GPU synchronization
pub trait Semaphore: Send + Sync {}

bitflags! {
    /// Pipeline stages at which a semaphore wait takes effect
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u32 {
        const COLOR_ATTACHMENT_OUTPUT = 1 << 0;
        const EARLY_FRAGMENT_TESTS = 1 << 1;
        const FRAGMENT_SHADER = 1 << 2;
        const COMPUTE_SHADER = 1 << 3;
        const TRANSFER = 1 << 4;
        const ALL_COMMANDS = 1 << 5;
    }
}

/// One semaphore wait of a submission
#[derive(Clone)]
pub struct WaitSemaphore {
    pub semaphore: std::sync::Arc<dyn Semaphore>,
    pub stages: PipelineStages,
}

/// Queue submission of a single command list
pub struct SubmitInfo<'a> {
    pub command_list: &'a dyn CommandList,
    pub wait: &'a [WaitSemaphore],
    pub signal: &'a [std::sync::Arc<dyn Semaphore>],
    /// Fence signaled on completion (must be reset by the caller beforehand)
    pub fence: Option<&'a dyn Fence>,
}
