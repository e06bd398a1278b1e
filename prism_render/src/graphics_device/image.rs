/// Device image trait and descriptor

use crate::graphics_device::TextureFormat;

/// How an image is viewed by shaders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageViewType {
    Type2D,
    Type2DArray,
    Cube,
}

/// How a writable image is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputUsage {
    /// Rendered as a color/depth attachment, then sampled
    Graphics,
    /// Written as a storage image by compute shaders
    Compute,
}

/// Descriptor for creating a device image
#[derive(Debug, Clone)]
pub struct ImageDesc {
    /// Debug name
    pub name: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Number of array layers (6 for cube maps)
    pub layers: u32,
    /// Number of mip levels (levels past 0 are generated with linear blits)
    pub mip_levels: u32,
    /// Pixel format
    pub format: TextureFormat,
    /// View type
    pub view_type: ImageViewType,
    /// Output usage when the image is a render output, None for read-only images
    pub writable: Option<OutputUsage>,
}

/// Device image resource trait
///
/// Owns the image, its memory allocation and its views.
pub trait DeviceImage: Send + Sync {
    /// Creation parameters of the image
    fn desc(&self) -> &ImageDesc;
}
