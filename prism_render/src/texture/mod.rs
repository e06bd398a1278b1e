/// Textures, their sampling parameters and image copies

mod texture;
mod texture_copier;
mod texture_param;
mod texture_reader;

pub use texture::{CapturedImage, Texture, TextureType};
pub use texture_copier::TextureCopier;
pub use texture_param::{Anisotropy, ReadMode, ReadQuality, SamplerCache, TextureParam};
pub use texture_reader::TextureReader;
