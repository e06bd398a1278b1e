/// Render target module
///
/// A render target owns a render pass, its framebuffers and one command
/// list per frame slot, and records the processors attached to it.
/// It renders either to the window (screen) or into textures (offscreen).

mod offscreen_target;
mod render_target;
mod screen_target;

pub use offscreen_target::{LoadType, OffscreenTarget, OutputTexture, DEFAULT_CLEAR_COLOR};
pub use render_target::{DepthPolicy, RenderTarget, RenderTargetInfo, RenderTargetKind};
pub use screen_target::ScreenTarget;
