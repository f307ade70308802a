/// Texture trait, texture descriptor, format policy and file-backed pixel loading

use std::any::Any;
use std::path::{Path, PathBuf};

// ===== FORMATS AND PARAMETERS =====

/// Texel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8,
    Rg8,
    Rgb8,
    Rgba8,
    Rgb16,
    Rgba16,
    Rgb32,
    Rgba32,
    Rgb,
    Rgba,
    Luminance,
    LuminanceAlpha,
    Depth,
    Stencil,
    DepthStencil,
    /// The presentable format chosen by the swapchain
    Screen,
}

impl TextureFormat {
    /// True for depth and depth/stencil formats
    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth | TextureFormat::DepthStencil | TextureFormat::Stencil)
    }

    /// Bytes per texel for CPU-side uploads (depth formats are never uploaded)
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::R8 | TextureFormat::Luminance => 1,
            TextureFormat::Rg8 | TextureFormat::LuminanceAlpha => 2,
            TextureFormat::Rgb8 | TextureFormat::Rgb => 3,
            TextureFormat::Rgba8 | TextureFormat::Rgba | TextureFormat::Screen => 4,
            TextureFormat::Rgb16 => 6,
            TextureFormat::Rgba16 => 8,
            TextureFormat::Rgb32 => 12,
            TextureFormat::Rgba32 => 16,
            TextureFormat::Depth | TextureFormat::Stencil | TextureFormat::DepthStencil => 4,
        }
    }
}

/// Sampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFilter {
    None,
    #[default]
    Linear,
    Nearest,
}

/// Addressing mode outside [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureWrap {
    None,
    Clamp,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
    #[default]
    Repeat,
}

/// Kind of image a texture owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureType {
    /// Sampled 2D colour image (also usable as a colour attachment)
    Colour,
    /// Single depth image
    Depth,
    /// Layered depth image for cascaded shadow maps
    DepthArray,
    /// Six-face cube map
    Cube,
    /// Presentable swapchain image
    Swapchain,
}

/// Format, filter and wrap of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureParameters {
    pub format: TextureFormat,
    pub filter: TextureFilter,
    pub wrap: TextureWrap,
}

impl Default for TextureParameters {
    fn default() -> Self {
        Self {
            format: TextureFormat::Rgba8,
            filter: TextureFilter::Linear,
            wrap: TextureWrap::Repeat,
        }
    }
}

impl TextureParameters {
    pub fn new(format: TextureFormat, filter: TextureFilter, wrap: TextureWrap) -> Self {
        Self { format, filter, wrap }
    }
}

/// Flip options applied when pixels are read from a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureLoadOptions {
    pub flip_x: bool,
    pub flip_y: bool,
}

// ===== TEXTURE DESC =====

/// Descriptor for creating a texture
#[derive(Debug, Clone)]
pub struct TextureDesc {
    /// Debug name
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub texture_type: TextureType,
    pub parameters: TextureParameters,
    /// Number of layers (`DepthArray` only; 6 is implied for `Cube`)
    pub layer_count: u32,
    /// Initial pixels, tightly packed in `parameters.format`
    pub data: Option<Vec<u8>>,
    /// File the pixels came from, if any
    pub file_path: Option<PathBuf>,
}

impl TextureDesc {
    /// 2D colour texture without initial data
    pub fn colour(name: &str, width: u32, height: u32, parameters: TextureParameters) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            texture_type: TextureType::Colour,
            parameters,
            layer_count: 1,
            data: None,
            file_path: None,
        }
    }

    /// Depth texture used as a depth attachment
    pub fn depth(name: &str, width: u32, height: u32) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            texture_type: TextureType::Depth,
            parameters: TextureParameters::new(TextureFormat::Depth, TextureFilter::Nearest, TextureWrap::ClampToEdge),
            layer_count: 1,
            data: None,
            file_path: None,
        }
    }

    /// Layered depth texture (shadow cascades)
    pub fn depth_array(name: &str, width: u32, height: u32, layer_count: u32) -> Self {
        Self {
            texture_type: TextureType::DepthArray,
            layer_count,
            ..Self::depth(name, width, height)
        }
    }

    /// Attach initial pixel data
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }
}

// ===== TEXTURE TRAIT =====

/// Texture resource trait
///
/// Dimensions and format never change after creation; a resize means a new
/// texture. The native image is released when the last `Arc` is dropped.
pub trait Texture: Send + Sync {
    /// Debug name
    fn name(&self) -> &str;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn format(&self) -> TextureFormat;

    fn texture_type(&self) -> TextureType;

    /// Number of array layers (1 for plain 2D textures, 6 for cubes)
    fn layer_count(&self) -> u32 {
        1
    }

    /// File the pixels were loaded from
    fn file_path(&self) -> Option<&Path> {
        None
    }

    /// Bind to a texture unit (immediate-mode backends only)
    fn bind(&self, _slot: u32) {}

    /// Unbind from a texture unit (immediate-mode backends only)
    fn unbind(&self, _slot: u32) {}

    /// Downcast support for backend implementations
    fn as_any(&self) -> &dyn Any;
}

// ===== FORMAT POLICY =====

/// Map an image's bits per pixel to a texture format
///
/// Unsupported depths log an error and fall back to `Rgb8`.
pub fn bits_to_texture_format(bits: u32) -> TextureFormat {
    match bits {
        8 => TextureFormat::R8,
        16 => TextureFormat::Rg8,
        24 => TextureFormat::Rgb8,
        32 => TextureFormat::Rgba8,
        _ => {
            crate::engine_error!("lumos::Texture", "Unsupported image bit-depth! ({})", bits);
            TextureFormat::Rgb8
        }
    }
}

// ===== FILE LOADING =====

/// Pixels decoded from a file
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// Bits per pixel of `pixels` (24 or 32)
    pub bits: u32,
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Format matching the decoded bit depth
    pub fn format(&self) -> TextureFormat {
        bits_to_texture_format(self.bits)
    }
}

/// Decode an image file into tightly packed RGB8/RGBA8 pixels
///
/// Returns `None` (and logs) if the file is missing or cannot be decoded;
/// the caller decides whether to substitute a fallback texture.
pub fn load_texture_data(path: &Path, options: TextureLoadOptions) -> Option<TextureData> {
    let image = match image::open(path) {
        Ok(image) => image,
        Err(e) => {
            crate::engine_error!("lumos::Texture", "Failed to load texture {:?}: {}", path, e);
            return None;
        }
    };

    let image = match (options.flip_x, options.flip_y) {
        (false, false) => image,
        (true, false) => image.fliph(),
        (false, true) => image.flipv(),
        (true, true) => image.fliph().flipv(),
    };

    let (width, height) = (image.width(), image.height());
    let (bits, pixels) = if image.color().has_alpha() {
        (32, image.to_rgba8().into_raw())
    } else {
        (24, image.to_rgb8().into_raw())
    };

    crate::engine_debug!("lumos::Texture", "Loaded {:?} ({}x{}, {} bpp)", path, width, height, bits);

    Some(TextureData { width, height, bits, pixels })
}

/// 2x2 magenta/black checkerboard used when a mesh has no material texture
pub fn checkerboard_texture_desc(name: &str) -> TextureDesc {
    const MAGENTA: [u8; 4] = [255, 0, 255, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];

    let mut pixels = Vec::with_capacity(16);
    for texel in [MAGENTA, BLACK, BLACK, MAGENTA] {
        pixels.extend_from_slice(&texel);
    }

    TextureDesc::colour(
        name,
        2,
        2,
        TextureParameters::new(TextureFormat::Rgba8, TextureFilter::Nearest, TextureWrap::Repeat),
    )
    .with_data(pixels)
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
