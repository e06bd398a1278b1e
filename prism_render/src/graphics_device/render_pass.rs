/// RenderPass trait - describes how attachments are loaded, stored and transitioned

use crate::graphics_device::TextureFormat;

/// Render pass trait
pub trait RenderPass: Send + Sync {
    // Marker trait: backends downcast to their own type
}

/// Descriptor for creating a render pass with a single subpass
#[derive(Debug, Clone)]
pub struct RenderPassDesc {
    /// Color attachments (attachment indices 0..n)
    pub color_attachments: Vec<AttachmentDesc>,
    /// Optional depth attachment (attachment index n)
    pub depth_attachment: Option<AttachmentDesc>,
}

/// Descriptor for a single attachment in a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentDesc {
    /// Pixel format
    pub format: TextureFormat,
    /// Number of samples (1 = no MSAA)
    pub samples: u32,
    /// Load operation
    pub load_op: LoadOp,
    /// Store operation
    pub store_op: StoreOp,
    /// Layout before the pass
    pub initial_layout: ImageLayout,
    /// Layout after the pass
    pub final_layout: ImageLayout,
}

/// Load operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

/// Store operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Store,
    DontCare,
}

/// Image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    General,
    ColorAttachment,
    DepthStencilAttachment,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    PresentSrc,
}
