/// Pixel and vertex attribute formats

/// Texture pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    D32_FLOAT,
    R8_UNORM,
    R16_SFLOAT,
    R32_SFLOAT,
    R8G8_UNORM,
    R16G16_SFLOAT,
    R32G32_SFLOAT,
    B10G11R11_UFLOAT,
    R8G8B8A8_UNORM,
    R16G16B16A16_SFLOAT,
    R32G32B32A32_SFLOAT,

    // Presentation formats (swapchain images)
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
}

impl TextureFormat {
    /// Size of one pixel in bytes
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::R8_UNORM => 1,
            TextureFormat::R16_SFLOAT | TextureFormat::R8G8_UNORM => 2,
            TextureFormat::D32_FLOAT
            | TextureFormat::R32_SFLOAT
            | TextureFormat::R8G8B8A8_UNORM
            | TextureFormat::R16G16_SFLOAT
            | TextureFormat::B10G11R11_UFLOAT
            | TextureFormat::B8G8R8A8_UNORM
            | TextureFormat::B8G8R8A8_SRGB => 4,
            TextureFormat::R32G32_SFLOAT | TextureFormat::R16G16B16A16_SFLOAT => 8,
            TextureFormat::R32G32B32A32_SFLOAT => 16,
        }
    }

    /// Returns true for depth formats
    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::D32_FLOAT)
    }
}

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum VertexFormat {
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
}

impl VertexFormat {
    /// Size in bytes of one attribute of this format
    pub fn size_bytes(&self) -> u32 {
        match self {
            VertexFormat::R32_SFLOAT => 4,
            VertexFormat::R32G32_SFLOAT => 8,
            VertexFormat::R32G32B32_SFLOAT => 12,
            VertexFormat::R32G32B32A32_SFLOAT => 16,
        }
    }
}
