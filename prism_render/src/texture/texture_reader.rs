/// Texture reader: one sampled texture binding of a processor

use crate::render_graph::TextureHandle;
use crate::texture::TextureParam;

/// A texture sampled with given parameters
///
/// Several readers may reference the same texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureReader {
    pub texture: TextureHandle,
    pub param: TextureParam,
}

impl TextureReader {
    pub fn new(texture: TextureHandle, param: TextureParam) -> Self {
        Self { texture, param }
    }
}
