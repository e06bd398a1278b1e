/// Texture - a device image with its staged pixel data and writer tracking
///
/// A texture is configured (mipmaps, writability) while uninitialized, then
/// `initialize` creates the device image once. Render targets that write a
/// texture record themselves as its last writer so that readers can find the
/// submission they must wait on.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{DeviceImage, GraphicsDevice, ImageDesc, ImageViewType, OutputUsage, TextureFormat};
use crate::render_graph::TargetHandle;
use crate::{engine_debug, engine_error};

fn texture_error(message: String) -> Error {
    engine_error!("prism::Texture", "{}", message);
    Error::InvalidConfiguration(message)
}

/// Logical layout of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureType {
    Default,
    Array,
    /// Six layers: +X, -X, +Y, -Y, +Z, -Z
    CubeMap,
}

impl TextureType {
    pub fn view_type(&self) -> ImageViewType {
        match self {
            TextureType::Default => ImageViewType::Type2D,
            TextureType::Array => ImageViewType::Type2DArray,
            TextureType::CubeMap => ImageViewType::Cube,
        }
    }
}

/// RGBA8 pixels read back from a texture
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

pub struct Texture {
    name: String,
    texture_type: TextureType,
    width: u32,
    height: u32,
    layers: u32,
    format: TextureFormat,
    mip_levels: u32,
    writable: bool,
    output_usage: OutputUsage,
    last_writer: Option<TargetHandle>,
    has_transparency: Option<bool>,
    /// Per-layer pixel data waiting for `initialize` (empty = no content)
    staged_layers: Vec<Vec<u8>>,
    image: Option<Arc<dyn DeviceImage>>,
}

impl Texture {
    fn new(
        name: &str,
        texture_type: TextureType,
        width: u32,
        height: u32,
        layers: u32,
        format: TextureFormat,
        images: &[Option<&[u8]>],
    ) -> Result<Self> {
        if width == 0 || height == 0 || layers == 0 {
            return Err(texture_error(format!(
                "Invalid texture size of {}x{}x{}", width, height, layers
            )));
        }

        let layer_size = width as usize * height as usize * format.bytes_per_pixel() as usize;
        let layers_per_image = layers as usize / images.len().max(1);
        let mut staged_layers = Vec::new();
        if images.iter().any(|image| image.is_some()) {
            for image in images {
                match image {
                    Some(bytes) => {
                        if bytes.len() != layer_size * layers_per_image {
                            return Err(texture_error(format!(
                                "Texture '{}' expects {} bytes per image but received {}",
                                name, layer_size * layers_per_image, bytes.len()
                            )));
                        }
                        staged_layers.extend(bytes.chunks(layer_size).map(|layer| layer.to_vec()));
                    }
                    None => staged_layers.extend((0..layers_per_image).map(|_| Vec::new())),
                }
            }
        }

        Ok(Self {
            name: name.to_string(),
            texture_type,
            width,
            height,
            layers,
            format,
            mip_levels: 1,
            writable: false,
            output_usage: OutputUsage::Graphics,
            last_writer: None,
            has_transparency: None,
            staged_layers,
            image: None,
        })
    }

    // ===== FACTORIES =====

    /// 2D texture, `data` holds width*height pixels (None for a render output)
    pub fn build(name: &str, width: u32, height: u32, format: TextureFormat, data: Option<&[u8]>) -> Result<Self> {
        Self::new(name, TextureType::Default, width, height, 1, format, &[data])
    }

    /// Array texture, `data` holds all layers one after another
    pub fn build_array(
        name: &str,
        width: u32,
        height: u32,
        layers: u32,
        format: TextureFormat,
        data: Option<&[u8]>,
    ) -> Result<Self> {
        Self::new(name, TextureType::Array, width, height, layers, format, &[data])
    }

    /// Cube map from its six faces
    pub fn build_cube_map(
        name: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
        faces: [Option<&[u8]>; 6],
    ) -> Result<Self> {
        Self::new(name, TextureType::CubeMap, width, height, 6, format, &faces)
    }

    /// 1x1 pink placeholder for missing color textures
    pub fn build_empty_rgba(name: &str) -> Result<Self> {
        Self::build(name, 1, 1, TextureFormat::R8G8B8A8_UNORM, Some(&[255u8, 20, 147, 255][..]))
    }

    /// 1x1 black placeholder for missing single-channel textures
    pub fn build_empty_greyscale(name: &str) -> Result<Self> {
        Self::build(name, 1, 1, TextureFormat::R8_UNORM, Some(&[0u8][..]))
    }

    /// 1x1 two-layer RG placeholder for missing array textures
    pub fn build_empty_array_rg(name: &str) -> Result<Self> {
        let texels: [f32; 4] = [0.0, 0.25, 0.5, 1.0];
        Self::build_array(name, 1, 1, 2, TextureFormat::R32G32_SFLOAT, Some(bytemuck::cast_slice(&texels)))
    }

    /// 1x1 float placeholder holding the far depth value (1.0)
    pub fn build_empty_depth(name: &str) -> Result<Self> {
        Self::build(name, 1, 1, TextureFormat::R32_SFLOAT, Some(bytemuck::bytes_of(&1.0f32)))
    }

    // ===== CONFIGURATION =====

    /// Allocate a full mip chain, generated from level 0 on initialization
    pub fn enable_mipmap(&mut self) {
        debug_assert!(!self.is_initialized(), "mipmap must be enabled before initialization");
        self.mip_levels = self.width.max(self.height).ilog2() + 1;
    }

    /// Allow render targets to write this texture
    ///
    /// The first call must happen before initialization; later calls must
    /// request the same output usage.
    pub fn enable_texture_writing(&mut self, output_usage: OutputUsage) -> Result<()> {
        if !self.writable {
            if self.is_initialized() {
                return Err(texture_error(format!(
                    "Texture '{}' is already initialized and cannot become writable", self.name
                )));
            }
            self.writable = true;
            self.output_usage = output_usage;
        } else if self.output_usage != output_usage {
            return Err(texture_error(format!(
                "Texture '{}' is already written with {:?} usage, cannot switch to {:?}",
                self.name, self.output_usage, output_usage
            )));
        }
        Ok(())
    }

    pub fn set_has_transparency(&mut self, has_transparency: bool) {
        self.has_transparency = Some(has_transparency);
    }

    // ===== LIFECYCLE =====

    /// Create the device image (no-op when already initialized)
    ///
    /// Staged pixel data is uploaded then released: a texture re-initialized
    /// after `cleanup` has undefined content until it is rendered into.
    pub fn initialize(&mut self, device: &dyn GraphicsDevice) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }
        if self.has_mipmap() && !device.supports_linear_blit(self.format) {
            return Err(texture_error(format!(
                "Texture image format does not support linear blitting: {:?} ({})",
                self.format, self.name
            )));
        }

        let desc = ImageDesc {
            name: self.name.clone(),
            width: self.width,
            height: self.height,
            layers: self.layers,
            mip_levels: self.mip_levels,
            format: self.format,
            view_type: self.texture_type.view_type(),
            writable: self.writable.then_some(self.output_usage),
        };
        let layers_data: Vec<&[u8]> = self.staged_layers.iter().map(|layer| layer.as_slice()).collect();
        let image = device.create_image(&desc, &layers_data)?;

        engine_debug!(
            "prism::Texture",
            "Initialized texture '{}' ({}x{}x{}, {} mip levels)",
            self.name, self.width, self.height, self.layers, self.mip_levels
        );
        self.staged_layers.clear();
        self.image = Some(image);
        Ok(())
    }

    /// Release the device image (no-op when not initialized)
    pub fn cleanup(&mut self) {
        if self.image.take().is_some() {
            engine_debug!("prism::Texture", "Released texture '{}'", self.name);
        }
    }

    /// Read the texture back as RGBA8 resized to the destination size
    ///
    /// Only single-layer, non-mipmapped color textures can be captured.
    pub fn capture(&self, device: &dyn GraphicsDevice, width: u32, height: u32) -> Result<CapturedImage> {
        let image = self.image()?;
        if self.layers != 1 || self.has_mipmap() || self.is_depth_format() {
            let message = format!(
                "Capture of texture '{}' unsupported (layers: {}, mip levels: {}, format: {:?})",
                self.name, self.layers, self.mip_levels, self.format
            );
            engine_error!("prism::Texture", "{}", message);
            return Err(Error::InvalidResource(message));
        }
        let pixels = device.capture_image(image, width, height)?;
        Ok(CapturedImage { width, height, pixels })
    }

    // ===== ACCESSORS =====

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layers(&self) -> u32 {
        self.layers
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn is_depth_format(&self) -> bool {
        self.format.is_depth()
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    pub fn has_mipmap(&self) -> bool {
        self.mip_levels > 1
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn output_usage(&self) -> OutputUsage {
        self.output_usage
    }

    pub fn is_initialized(&self) -> bool {
        self.image.is_some()
    }

    /// Device image, error when the texture is not initialized
    pub fn image(&self) -> Result<&Arc<dyn DeviceImage>> {
        self.image.as_ref().ok_or_else(|| {
            Error::InvalidResource(format!("Texture '{}' is not initialized", self.name))
        })
    }

    pub fn has_transparency(&self) -> Result<bool> {
        self.has_transparency.ok_or_else(|| {
            Error::InvalidResource(format!("No transparency value defined for texture: {}", self.name))
        })
    }

    /// Render target that most recently submitted work writing this texture
    pub fn last_writer(&self) -> Option<TargetHandle> {
        self.last_writer
    }

    pub fn set_last_writer(&mut self, writer: Option<TargetHandle>) {
        debug_assert!(writer.is_none() || self.writable, "texture '{}' is not writable", self.name);
        self.last_writer = writer;
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("name", &self.name)
            .field("texture_type", &self.texture_type)
            .field("size", &(self.width, self.height, self.layers))
            .field("format", &self.format)
            .field("mip_levels", &self.mip_levels)
            .field("writable", &self.writable)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
