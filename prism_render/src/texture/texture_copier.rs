/// Image copy recorded at the start of a render target's command list

use crate::error::{Error, Result};
use crate::engine_error;
use crate::graphics_device::{CommandList, GraphicsDevice};
use crate::render_graph::{TextureArena, TextureHandle};

/// Copies a source texture into a writable destination texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCopier {
    source: TextureHandle,
    destination: TextureHandle,
}

impl TextureCopier {
    pub fn new(source: TextureHandle, destination: TextureHandle) -> Self {
        Self { source, destination }
    }

    pub fn source(&self) -> TextureHandle {
        self.source
    }

    pub fn destination(&self) -> TextureHandle {
        self.destination
    }

    /// Initialize the destination, which must be writable
    pub fn initialize(&self, device: &dyn GraphicsDevice, textures: &mut TextureArena) -> Result<()> {
        let destination = textures.get_mut(self.destination).ok_or_else(|| {
            Error::InvalidResource("Texture copier destination no longer exists".to_string())
        })?;
        if !destination.is_writable() {
            let message = format!("Destination texture must be writable: {}", destination.name());
            engine_error!("prism::TextureCopier", "{}", message);
            return Err(Error::InvalidConfiguration(message));
        }
        destination.initialize(device)
    }

    pub fn execute_copy(&self, command_list: &mut dyn CommandList, textures: &TextureArena) -> Result<()> {
        let (Some(source), Some(destination)) = (textures.get(self.source), textures.get(self.destination)) else {
            return Err(Error::InvalidResource("Texture copier references a removed texture".to_string()));
        };
        command_list.copy_image(source.image()?, destination.image()?)
    }
}

#[cfg(test)]
#[path = "texture_copier_tests.rs"]
mod tests;
