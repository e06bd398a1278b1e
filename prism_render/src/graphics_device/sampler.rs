/// Sampler trait and descriptor

/// Addressing outside of [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
}

/// Texel filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Descriptor for creating a sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub address_mode: AddressMode,
    pub filter: Filter,
    /// Maximum anisotropy, 0 disables anisotropic filtering
    pub max_anisotropy: u32,
    /// Mip levels of the sampled image (max LOD)
    pub mip_levels: u32,
}

/// Sampler resource trait
pub trait Sampler: Send + Sync {}
