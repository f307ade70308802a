/// Conversions from engine enums to GL enums
///
/// Pure functions over constants, no context access. Unsupported values are
/// logged and replaced by a usable default.

use lumos_engine::engine_error;
use lumos_engine::lumos::render::{
    AttachmentKind, CullMode, IndexType, ShaderType, TextureFilter, TextureFormat, TextureType,
    TextureWrap, VertexFormat,
};

/// Internal format, pixel format and component type for `glTexImage*`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GlTextureFormat {
    pub internal_format: u32,
    pub format: u32,
    pub data_type: u32,
}

impl GlTextureFormat {
    const fn new(internal_format: u32, format: u32, data_type: u32) -> Self {
        Self { internal_format, format, data_type }
    }
}

/// Pixel format enum for `format` (`GL_RGBA` when unsupported)
pub(crate) fn texture_format_to_gl(format: TextureFormat) -> u32 {
    match format {
        TextureFormat::R8 | TextureFormat::Luminance => glow::RED,
        TextureFormat::Rg8 | TextureFormat::LuminanceAlpha => glow::RG,
        TextureFormat::Rgb8 | TextureFormat::Rgb | TextureFormat::Rgb16 | TextureFormat::Rgb32 => glow::RGB,
        TextureFormat::Rgba8 | TextureFormat::Rgba | TextureFormat::Rgba16 | TextureFormat::Rgba32 => glow::RGBA,
        TextureFormat::Depth => glow::DEPTH_COMPONENT,
        TextureFormat::DepthStencil => glow::DEPTH_STENCIL,
        TextureFormat::Stencil => glow::STENCIL_INDEX,
        TextureFormat::Screen => {
            engine_error!("lumos::opengl::Texture", "Unsupported texture format {:?}", format);
            glow::RGBA
        }
    }
}

/// Full upload description for `format`
pub(crate) fn texture_format_desc(format: TextureFormat) -> GlTextureFormat {
    let pixel_format = texture_format_to_gl(format);
    match format {
        TextureFormat::R8 | TextureFormat::Luminance => GlTextureFormat::new(glow::R8, pixel_format, glow::UNSIGNED_BYTE),
        TextureFormat::Rg8 | TextureFormat::LuminanceAlpha => GlTextureFormat::new(glow::RG8, pixel_format, glow::UNSIGNED_BYTE),
        TextureFormat::Rgb8 | TextureFormat::Rgb => GlTextureFormat::new(glow::RGB8, pixel_format, glow::UNSIGNED_BYTE),
        TextureFormat::Rgb16 => GlTextureFormat::new(glow::RGB16F, pixel_format, glow::HALF_FLOAT),
        TextureFormat::Rgba16 => GlTextureFormat::new(glow::RGBA16F, pixel_format, glow::HALF_FLOAT),
        TextureFormat::Rgb32 => GlTextureFormat::new(glow::RGB32F, pixel_format, glow::FLOAT),
        TextureFormat::Rgba32 => GlTextureFormat::new(glow::RGBA32F, pixel_format, glow::FLOAT),
        TextureFormat::Depth => GlTextureFormat::new(glow::DEPTH_COMPONENT32F, pixel_format, glow::FLOAT),
        TextureFormat::DepthStencil => GlTextureFormat::new(glow::DEPTH24_STENCIL8, pixel_format, glow::UNSIGNED_INT_24_8),
        TextureFormat::Stencil => GlTextureFormat::new(glow::STENCIL_INDEX8, pixel_format, glow::UNSIGNED_BYTE),
        TextureFormat::Rgba8 | TextureFormat::Rgba | TextureFormat::Screen => {
            GlTextureFormat::new(glow::RGBA8, pixel_format, glow::UNSIGNED_BYTE)
        }
    }
}

/// Wrap mode for `wrap` (`GL_REPEAT` when unsupported)
pub(crate) fn texture_wrap_to_gl(wrap: TextureWrap) -> u32 {
    match wrap {
        // Legacy GL_CLAMP is gone from core profiles
        TextureWrap::Clamp | TextureWrap::ClampToEdge => glow::CLAMP_TO_EDGE,
        TextureWrap::ClampToBorder => glow::CLAMP_TO_BORDER,
        TextureWrap::MirroredRepeat => glow::MIRRORED_REPEAT,
        TextureWrap::Repeat => glow::REPEAT,
        TextureWrap::None => {
            engine_error!("lumos::opengl::Texture", "Unsupported texture wrap {:?}", wrap);
            glow::REPEAT
        }
    }
}

/// (min, mag) filters; mipmapped minification only when mip levels exist
pub(crate) fn texture_filter_to_gl(filter: TextureFilter, mipmapped: bool) -> (u32, u32) {
    match filter {
        TextureFilter::Linear if mipmapped => (glow::LINEAR_MIPMAP_LINEAR, glow::LINEAR),
        TextureFilter::Linear => (glow::LINEAR, glow::LINEAR),
        TextureFilter::Nearest | TextureFilter::None => (glow::NEAREST, glow::NEAREST),
    }
}

/// Bind target of a texture of this type
pub(crate) fn texture_target(texture_type: TextureType) -> u32 {
    match texture_type {
        TextureType::Cube => glow::TEXTURE_CUBE_MAP,
        TextureType::DepthArray => glow::TEXTURE_2D_ARRAY,
        TextureType::Colour | TextureType::Depth | TextureType::Swapchain => glow::TEXTURE_2D,
    }
}

/// Framebuffer attachment point for the `colour_index`-th colour attachment
/// or for a depth-like attachment of `format`
pub(crate) fn attachment_point(kind: AttachmentKind, format: TextureFormat, colour_index: u32) -> u32 {
    let depth_point = match format {
        TextureFormat::DepthStencil => glow::DEPTH_STENCIL_ATTACHMENT,
        TextureFormat::Stencil => glow::STENCIL_ATTACHMENT,
        _ => glow::DEPTH_ATTACHMENT,
    };
    match kind {
        AttachmentKind::Depth | AttachmentKind::Shadow => depth_point,
        AttachmentKind::ArrayLayer if format.is_depth() => depth_point,
        AttachmentKind::Colour | AttachmentKind::CubeFace | AttachmentKind::ArrayLayer => {
            glow::COLOR_ATTACHMENT0 + colour_index
        }
    }
}

pub(crate) fn shader_type_to_gl(stage: ShaderType) -> u32 {
    match stage {
        ShaderType::Vertex => glow::VERTEX_SHADER,
        ShaderType::Fragment => glow::FRAGMENT_SHADER,
        ShaderType::Geometry => glow::GEOMETRY_SHADER,
        ShaderType::TessellationControl => glow::TESS_CONTROL_SHADER,
        ShaderType::TessellationEvaluation => glow::TESS_EVALUATION_SHADER,
        ShaderType::Compute => glow::COMPUTE_SHADER,
    }
}

/// Face culled for `mode`, `None` if culling is disabled
pub(crate) fn cull_mode_to_gl(mode: CullMode) -> Option<u32> {
    match mode {
        CullMode::Front => Some(glow::FRONT),
        CullMode::Back => Some(glow::BACK),
        CullMode::FrontAndBack => Some(glow::FRONT_AND_BACK),
        CullMode::None => None,
    }
}

/// Component count, component type and whether the attribute is integer
pub(crate) fn vertex_format_to_gl(format: VertexFormat) -> (i32, u32, bool) {
    match format {
        VertexFormat::IVec4 => (4, glow::INT, true),
        _ => (format.component_count() as i32, glow::FLOAT, false),
    }
}

pub(crate) fn index_type_to_gl(index_type: IndexType) -> u32 {
    match index_type {
        IndexType::U16 => glow::UNSIGNED_SHORT,
        IndexType::U32 => glow::UNSIGNED_INT,
    }
}

#[cfg(test)]
#[path = "gl_format_tests.rs"]
mod tests;
