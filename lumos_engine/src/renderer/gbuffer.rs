/// GBuffer - named off-screen textures shared by the renderers
///
/// Owned by the application (render manager) and handed to renderers as a
/// `SharedGBuffer`. Renderers read the textures as framebuffer attachments
/// and must be resized after the GBuffer.

use std::sync::{Arc, RwLock};
use rustc_hash::FxHashMap;
use crate::error::Result;
use crate::graphics_device::{
    GraphicsDevice, Texture, TextureDesc, TextureFilter, TextureFormat, TextureParameters,
    TextureWrap,
};

pub type SharedGBuffer = Arc<RwLock<GBuffer>>;

/// Colour slots of the GBuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GBufferTexture {
    Colour,
    Position,
    Normal,
    Pbr,
    /// Forward renderer output when rendering off-screen
    Offscreen0,
}

impl GBufferTexture {
    pub const ALL: [GBufferTexture; 5] = [
        GBufferTexture::Colour,
        GBufferTexture::Position,
        GBufferTexture::Normal,
        GBufferTexture::Pbr,
        GBufferTexture::Offscreen0,
    ];

    /// Targets written by the deferred geometry pass, in attachment order
    pub const DEFERRED_TARGETS: [GBufferTexture; 4] = [
        GBufferTexture::Colour,
        GBufferTexture::Position,
        GBufferTexture::Normal,
        GBufferTexture::Pbr,
    ];

    pub fn format(self) -> TextureFormat {
        match self {
            GBufferTexture::Position | GBufferTexture::Normal => TextureFormat::Rgba16,
            _ => TextureFormat::Rgba8,
        }
    }

    fn name(self) -> &'static str {
        match self {
            GBufferTexture::Colour => "gbuffer_colour",
            GBufferTexture::Position => "gbuffer_position",
            GBufferTexture::Normal => "gbuffer_normal",
            GBufferTexture::Pbr => "gbuffer_pbr",
            GBufferTexture::Offscreen0 => "gbuffer_offscreen0",
        }
    }
}

pub struct GBuffer {
    width: u32,
    height: u32,
    textures: FxHashMap<GBufferTexture, Arc<dyn Texture>>,
    depth: Arc<dyn Texture>,
}

impl GBuffer {
    pub fn new(device: &dyn GraphicsDevice, width: u32, height: u32) -> Result<Self> {
        let (textures, depth) = Self::create_textures(device, width, height)?;
        Ok(Self { width, height, textures, depth })
    }

    pub fn shared(device: &dyn GraphicsDevice, width: u32, height: u32) -> Result<SharedGBuffer> {
        Ok(Arc::new(RwLock::new(Self::new(device, width, height)?)))
    }

    fn create_textures(
        device: &dyn GraphicsDevice,
        width: u32,
        height: u32,
    ) -> Result<(FxHashMap<GBufferTexture, Arc<dyn Texture>>, Arc<dyn Texture>)> {
        let mut textures = FxHashMap::default();
        for slot in GBufferTexture::ALL {
            let parameters = TextureParameters::new(slot.format(), TextureFilter::Linear, TextureWrap::ClampToEdge);
            let texture = device.create_texture(TextureDesc::colour(slot.name(), width, height, parameters))?;
            textures.insert(slot, texture);
        }
        let depth = device.create_texture(TextureDesc::depth("gbuffer_depth", width, height))?;
        Ok((textures, depth))
    }

    /// Recreate every texture at the new size
    ///
    /// Renderers holding framebuffers over the old textures must be resized next.
    pub fn resize(&mut self, device: &dyn GraphicsDevice, width: u32, height: u32) -> Result<()> {
        let (textures, depth) = Self::create_textures(device, width, height)?;
        self.textures = textures;
        self.depth = depth;
        self.width = width;
        self.height = height;

        crate::engine_debug!("lumos::GBuffer", "Resized to {}x{}", width, height);
        Ok(())
    }

    pub fn texture(&self, slot: GBufferTexture) -> Arc<dyn Texture> {
        // Every slot is created in `create_textures`.
        self.textures[&slot].clone()
    }

    pub fn depth(&self) -> Arc<dyn Texture> {
        self.depth.clone()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}
