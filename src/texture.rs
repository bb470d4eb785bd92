use log::info;

use crate::device::{GraphicsDevice, TextureId, TextureImage, TextureParams};
use crate::error::{FrameworkError, Result};

const PLACEHOLDER: [u8; 4] = [0, 0, 0, 0];

/// 2D texture owned by exactly one holder.
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    params: TextureParams,
    size: (u32, u32),
}

impl Texture {
    /// Creates a texture holding a single transparent pixel until data is uploaded.
    pub fn new(device: &mut dyn GraphicsDevice, params: TextureParams) -> Result<Self> {
        let id = device.create_texture()?;
        let placeholder = TextureImage {
            width: 1,
            height: 1,
            pixels: &PLACEHOLDER,
        };
        device.upload_texture(id, &placeholder, params);
        Ok(Self {
            id,
            params,
            size: (1, 1),
        })
    }

    /// Creates a texture and uploads `image` right away.
    pub fn from_rgba(
        device: &mut dyn GraphicsDevice,
        image: &TextureImage<'_>,
        params: TextureParams,
    ) -> Result<Self> {
        let mut texture = Self::new(device, params)?;
        texture.upload(device, image)?;
        Ok(texture)
    }

    /// Replaces the texel data; mipmaps are regenerated when the min filter uses them.
    pub fn upload(&mut self, device: &mut dyn GraphicsDevice, image: &TextureImage<'_>) -> Result<()> {
        let expected = image.width as usize * image.height as usize * 4;
        if image.pixels.len() != expected {
            return Err(FrameworkError::invariant(format!(
                "{}x{} RGBA image needs {expected} bytes, got {}",
                image.width,
                image.height,
                image.pixels.len()
            )));
        }
        device.upload_texture(self.id, image, self.params);
        self.size = (image.width, image.height);
        info!(
            "uploaded {}x{} texture {}",
            image.width, image.height, self.id.0
        );
        Ok(())
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Sampler reading this texture from texture unit `unit`.
    pub fn sampler(&self, unit: u32) -> Sampler2D {
        Sampler2D {
            texture: self.id,
            unit,
        }
    }
}

/// Texture bound to a texture unit, as consumed by `sampler2D` uniforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sampler2D {
    pub texture: TextureId,
    pub unit: u32,
}
