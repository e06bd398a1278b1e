/// Render graph: resource arenas and the frame driver
///
/// Textures, render targets and processors live in slot map arenas owned by
/// the `RenderGraph`. They reference each other through stable handles, so a
/// texture's last writer or a processor's target is a lookup, never a pointer.
/// Each frame the graph renders offscreen targets in dependency order, then
/// the screen targets.

mod render_graph;

use slotmap::{new_key_type, SlotMap};
use crate::processor::Processor;
use crate::target::RenderTarget;
use crate::texture::Texture;

pub use render_graph::RenderGraph;

// ===== SLOT MAP KEYS =====

new_key_type! {
    /// Stable key of a texture in the render graph.
    pub struct TextureHandle;

    /// Stable key of a render target in the render graph.
    ///
    /// Textures store the handle of the target that last wrote them.
    pub struct TargetHandle;

    /// Stable key of a processor in the render graph.
    pub struct ProcessorHandle;
}

pub type TextureArena = SlotMap<TextureHandle, Texture>;
pub type TargetArena = SlotMap<TargetHandle, RenderTarget>;
pub type ProcessorArena = SlotMap<ProcessorHandle, Processor>;
