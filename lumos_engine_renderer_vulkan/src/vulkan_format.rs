/// Conversions from engine enums to Vulkan enums
///
/// Pure functions, no device access. Unsupported values are logged and
/// replaced by a usable default.

use std::borrow::Cow;
use ash::vk;
use lumos_engine::engine_error;
use lumos_engine::lumos::render::{
    CullMode, DescriptorType, IndexType, ShaderType, TextureFilter, TextureFormat, TextureType,
    TextureWrap, VertexFormat,
};

/// Image format for `format`; `Screen` resolves to the swapchain's format
pub(crate) fn texture_format_to_vk(format: TextureFormat, screen_format: vk::Format) -> vk::Format {
    match format {
        TextureFormat::R8 => vk::Format::R8_UNORM,
        TextureFormat::Rg8 => vk::Format::R8G8_UNORM,
        // Three-channel formats have poor optimal-tiling support; stored as four channels
        TextureFormat::Rgb8 | TextureFormat::Rgb => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::Rgba8 | TextureFormat::Rgba => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::Rgb16 | TextureFormat::Rgba16 => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::Rgb32 | TextureFormat::Rgba32 => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::Depth => vk::Format::D32_SFLOAT,
        TextureFormat::DepthStencil => vk::Format::D32_SFLOAT_S8_UINT,
        TextureFormat::Stencil => vk::Format::S8_UINT,
        TextureFormat::Screen => screen_format,
        TextureFormat::Luminance | TextureFormat::LuminanceAlpha => {
            engine_error!("lumos::vulkan::Texture", "Unsupported texture format {:?}", format);
            vk::Format::R8G8B8A8_UNORM
        }
    }
}

/// Repack tightly packed `format` pixels into the layout of the image
/// created by `texture_format_to_vk`
///
/// Three-channel data gains an opaque alpha; luminance data is splatted to RGBA.
pub(crate) fn pixels_for_upload(format: TextureFormat, data: &[u8]) -> Cow<'_, [u8]> {
    match format {
        TextureFormat::Rgb8 | TextureFormat::Rgb => Cow::Owned(expand_rgb(data, 1, &[0xFF])),
        TextureFormat::Rgb16 => Cow::Owned(expand_rgb(data, 2, &half_one())),
        TextureFormat::Rgb32 => Cow::Owned(expand_rgb(data, 4, &1.0f32.to_le_bytes())),
        TextureFormat::Luminance => Cow::Owned(data.iter().flat_map(|&l| [l, l, l, 0xFF]).collect()),
        TextureFormat::LuminanceAlpha => Cow::Owned(
            data.chunks_exact(2)
                .flat_map(|la| [la[0], la[0], la[0], la[1]])
                .collect(),
        ),
        _ => Cow::Borrowed(data),
    }
}

fn expand_rgb(data: &[u8], component_size: usize, alpha: &[u8]) -> Vec<u8> {
    let texel = component_size * 3;
    let mut out = Vec::with_capacity(data.len() / texel * (texel + component_size));
    for rgb in data.chunks_exact(texel) {
        out.extend_from_slice(rgb);
        out.extend_from_slice(alpha);
    }
    out
}

/// 1.0 as an IEEE half float
fn half_one() -> [u8; 2] {
    0x3C00u16.to_le_bytes()
}

pub(crate) fn aspect_mask(format: TextureFormat) -> vk::ImageAspectFlags {
    match format {
        TextureFormat::Depth => vk::ImageAspectFlags::DEPTH,
        TextureFormat::Stencil => vk::ImageAspectFlags::STENCIL,
        TextureFormat::DepthStencil => vk::ImageAspectFlags::DEPTH,
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// Layout an image of this type rests in between passes
///
/// Render passes leave attachments in this layout and descriptor sets
/// sample from it.
pub(crate) fn resting_layout(texture_type: TextureType, format: TextureFormat) -> vk::ImageLayout {
    match texture_type {
        TextureType::Swapchain => vk::ImageLayout::PRESENT_SRC_KHR,
        TextureType::Depth | TextureType::DepthArray => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        _ if format.is_depth() => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        _ => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    }
}

/// Magnification/minification filter and mipmap mode
pub(crate) fn filter_to_vk(filter: TextureFilter) -> (vk::Filter, vk::SamplerMipmapMode) {
    match filter {
        TextureFilter::Linear => (vk::Filter::LINEAR, vk::SamplerMipmapMode::LINEAR),
        TextureFilter::Nearest | TextureFilter::None => (vk::Filter::NEAREST, vk::SamplerMipmapMode::NEAREST),
    }
}

pub(crate) fn wrap_to_vk(wrap: TextureWrap) -> vk::SamplerAddressMode {
    match wrap {
        TextureWrap::Repeat => vk::SamplerAddressMode::REPEAT,
        TextureWrap::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        TextureWrap::Clamp | TextureWrap::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        TextureWrap::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
        TextureWrap::None => {
            engine_error!("lumos::vulkan::Texture", "Unsupported texture wrap {:?}", wrap);
            vk::SamplerAddressMode::REPEAT
        }
    }
}

pub(crate) fn shader_stage_to_vk(stage: ShaderType) -> vk::ShaderStageFlags {
    match stage {
        ShaderType::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderType::Fragment => vk::ShaderStageFlags::FRAGMENT,
        ShaderType::Geometry => vk::ShaderStageFlags::GEOMETRY,
        ShaderType::TessellationControl => vk::ShaderStageFlags::TESSELLATION_CONTROL,
        ShaderType::TessellationEvaluation => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
        ShaderType::Compute => vk::ShaderStageFlags::COMPUTE,
    }
}

pub(crate) fn descriptor_type_to_vk(descriptor_type: DescriptorType) -> vk::DescriptorType {
    match descriptor_type {
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        DescriptorType::ImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    }
}

pub(crate) fn vertex_format_to_vk(format: VertexFormat) -> vk::Format {
    match format {
        VertexFormat::Float => vk::Format::R32_SFLOAT,
        VertexFormat::Vec2 => vk::Format::R32G32_SFLOAT,
        VertexFormat::Vec3 => vk::Format::R32G32B32_SFLOAT,
        VertexFormat::Vec4 => vk::Format::R32G32B32A32_SFLOAT,
        VertexFormat::IVec4 => vk::Format::R32G32B32A32_SINT,
    }
}

pub(crate) fn cull_mode_to_vk(cull_mode: CullMode) -> vk::CullModeFlags {
    match cull_mode {
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
        CullMode::None => vk::CullModeFlags::NONE,
    }
}

pub(crate) fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
