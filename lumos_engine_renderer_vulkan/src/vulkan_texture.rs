/// Texture - Vulkan implementation of the Texture trait
///
/// Owns the image, its default view and its memory. Swapchain images are
/// wrapped without ownership of the image itself.

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use lumos_engine::lumos::{Error, Result};
use lumos_engine::lumos::render::{Texture, TextureDesc, TextureFormat, TextureType};
use lumos_engine::{engine_debug, engine_error};
use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{aspect_mask, pixels_for_upload, resting_layout, texture_format_to_vk};

/// Vulkan texture implementation
pub struct VulkanTexture {
    ctx: Arc<GpuContext>,
    name: String,
    width: u32,
    height: u32,
    format: TextureFormat,
    texture_type: TextureType,
    layer_count: u32,
    file_path: Option<PathBuf>,

    pub(crate) image: vk::Image,
    /// View over every layer (cube view for cube maps)
    pub(crate) view: vk::ImageView,
    pub(crate) vk_format: vk::Format,
    /// Sampler used when the texture is bound to a descriptor set
    pub(crate) sampler: vk::Sampler,
    allocation: Option<Allocation>,
    /// False for swapchain images, which the swapchain destroys
    owns_image: bool,
}

impl VulkanTexture {
    /// Create the image, upload `desc.data` if any and move it to its resting layout
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: TextureDesc) -> Result<Self> {
        if desc.texture_type == TextureType::Swapchain {
            engine_error!("lumos::vulkan::Texture", "Texture '{}': swapchain images are created by the swapchain", desc.name);
            return Err(Error::InvalidResource(format!("texture '{}' has type Swapchain", desc.name)));
        }
        if desc.width == 0 || desc.height == 0 {
            engine_error!("lumos::vulkan::Texture", "Texture '{}' has a zero dimension ({}x{})", desc.name, desc.width, desc.height);
            return Err(Error::InvalidResource(format!("texture '{}' has zero size", desc.name)));
        }

        let format = desc.parameters.format;
        let vk_format = texture_format_to_vk(format, ctx.surface_format.format);
        let aspect = aspect_mask(format);
        let layer_count = match desc.texture_type {
            TextureType::Cube => 6,
            TextureType::DepthArray => desc.layer_count.max(1),
            _ => 1,
        };

        let usage = if format.is_depth() {
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED
        } else {
            vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::TRANSFER_DST
        };
        let (flags, view_type) = match desc.texture_type {
            TextureType::Cube => (vk::ImageCreateFlags::CUBE_COMPATIBLE, vk::ImageViewType::CUBE),
            TextureType::DepthArray => (vk::ImageCreateFlags::empty(), vk::ImageViewType::TYPE_2D_ARRAY),
            _ => (vk::ImageCreateFlags::empty(), vk::ImageViewType::TYPE_2D),
        };

        // Validate pixel data before touching the device
        let layer_size = desc.width as usize * desc.height as usize * format.bytes_per_pixel() as usize;
        let uploaded_layers = match &desc.data {
            Some(data) if format.is_depth() => {
                engine_error!("lumos::vulkan::Texture", "Texture '{}': depth textures cannot be uploaded ({} bytes)", desc.name, data.len());
                return Err(Error::InvalidResource(format!("texture '{}' uploads depth data", desc.name)));
            }
            Some(data) if data.is_empty() || data.len() % layer_size != 0 || data.len() / layer_size > layer_count as usize => {
                engine_error!(
                    "lumos::vulkan::Texture",
                    "Texture '{}': {} bytes of data do not fit {} layer(s) of {}x{} {:?}",
                    desc.name, data.len(), layer_count, desc.width, desc.height, format
                );
                return Err(Error::InvalidResource(format!("texture '{}' has mismatched data size", desc.name)));
            }
            Some(data) => (data.len() / layer_size) as u32,
            None => 0,
        };

        let sampler = ctx.sampler(desc.parameters.filter, desc.parameters.wrap)?;

        unsafe {
            let image_create_info = vk::ImageCreateInfo::default()
                .flags(flags)
                .image_type(vk::ImageType::TYPE_2D)
                .format(vk_format)
                .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
                .mip_levels(1)
                .array_layers(layer_count)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = vk_check!(ctx.device.create_image(&image_create_info, None), "vkCreateImage '{}'", desc.name)?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = match ctx.allocate(&desc.name, requirements, MemoryLocation::GpuOnly, false) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            // From here on, Drop releases whatever was created
            let mut texture = Self {
                ctx: ctx.clone(),
                name: desc.name,
                width: desc.width,
                height: desc.height,
                format,
                texture_type: desc.texture_type,
                layer_count,
                file_path: desc.file_path,
                image,
                view: vk::ImageView::null(),
                vk_format,
                sampler,
                allocation: None,
                owns_image: true,
            };

            let bind = vk_check!(
                ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()),
                "vkBindImageMemory '{}'",
                texture.name
            );
            texture.allocation = Some(allocation);
            bind?;

            texture.view = create_view(&ctx.device, image, view_type, vk_format, aspect, 0, layer_count)?;

            match &desc.data {
                Some(data) => texture.upload(data, uploaded_layers, aspect)?,
                None => texture.transition_to_resting(aspect)?,
            }

            engine_debug!(
                "lumos::vulkan::Texture",
                "Created '{}' ({}x{}, {:?}, {:?}, {} layer(s))",
                texture.name, texture.width, texture.height, texture.texture_type, format, layer_count
            );

            Ok(texture)
        }
    }

    /// Wrap a presentable image owned by the swapchain
    pub(crate) fn from_swapchain_image(
        ctx: Arc<GpuContext>,
        index: usize,
        image: vk::Image,
        vk_format: vk::Format,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let view = create_view(&ctx.device, image, vk::ImageViewType::TYPE_2D, vk_format, vk::ImageAspectFlags::COLOR, 0, 1)?;
        Ok(Self {
            ctx,
            name: format!("swapchain_{}", index),
            width,
            height,
            format: TextureFormat::Screen,
            texture_type: TextureType::Swapchain,
            layer_count: 1,
            file_path: None,
            image,
            view,
            vk_format,
            sampler: vk::Sampler::null(),
            allocation: None,
            owns_image: false,
        })
    }

    /// Layout the image is left in between passes
    pub(crate) fn layout(&self) -> vk::ImageLayout {
        resting_layout(self.texture_type, self.format)
    }

    pub(crate) fn aspect(&self) -> vk::ImageAspectFlags {
        aspect_mask(self.format)
    }

    /// A 2D view over a single layer (cube face or array layer), owned by the caller
    pub(crate) fn create_layer_view(&self, layer: u32) -> Result<vk::ImageView> {
        create_view(&self.ctx.device, self.image, vk::ImageViewType::TYPE_2D, self.vk_format, self.aspect(), layer, 1)
    }

    fn transition_to_resting(&self, aspect: vk::ImageAspectFlags) -> Result<()> {
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(self.layout())
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(full_range(aspect, self.layer_count))
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::SHADER_READ);

        self.ctx.one_time_submit(|device, command_buffer| unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        })
    }

    /// Copy `data` (one or more tightly packed layers) through a staging buffer
    fn upload(&self, data: &[u8], layers: u32, aspect: vk::ImageAspectFlags) -> Result<()> {
        let pixels = pixels_for_upload(self.format, data);
        let (staging, staging_allocation) = self.ctx.create_buffer(
            "texture_staging_buffer",
            pixels.len() as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
        )?;

        let result = (|| {
            let mapped = staging_allocation.mapped_ptr().ok_or_else(|| {
                engine_error!("lumos::vulkan::Texture", "Staging buffer for '{}' is not mapped", self.name);
                Error::BackendError(format!("staging buffer for '{}' is not mapped", self.name))
            })?;
            unsafe {
                std::ptr::copy_nonoverlapping(pixels.as_ptr(), mapped.as_ptr() as *mut u8, pixels.len());
            }

            let layer_bytes = (pixels.len() / layers as usize) as u64;
            let regions: Vec<vk::BufferImageCopy> = (0..layers)
                .map(|layer| {
                    vk::BufferImageCopy::default()
                        .buffer_offset(layer as u64 * layer_bytes)
                        .image_subresource(vk::ImageSubresourceLayers {
                            aspect_mask: aspect,
                            mip_level: 0,
                            base_array_layer: layer,
                            layer_count: 1,
                        })
                        .image_extent(vk::Extent3D { width: self.width, height: self.height, depth: 1 })
                })
                .collect();

            let to_transfer = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(self.image)
                .subresource_range(full_range(aspect, self.layer_count))
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);
            let to_resting = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(self.layout())
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(self.image)
                .subresource_range(full_range(aspect, self.layer_count))
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::SHADER_READ);

            self.ctx.one_time_submit(|device, command_buffer| unsafe {
                device.cmd_pipeline_barrier(
                    command_buffer,
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_transfer],
                );
                device.cmd_copy_buffer_to_image(
                    command_buffer,
                    staging,
                    self.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &regions,
                );
                device.cmd_pipeline_barrier(
                    command_buffer,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_resting],
                );
            })
        })();

        self.ctx.free(staging_allocation);
        unsafe { self.ctx.device.destroy_buffer(staging, None) };
        result
    }
}

fn full_range(aspect_mask: vk::ImageAspectFlags, layer_count: u32) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count,
    }
}

fn create_view(
    device: &ash::Device,
    image: vk::Image,
    view_type: vk::ImageViewType,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
    base_layer: u32,
    layer_count: u32,
) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(view_type)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: base_layer,
            layer_count,
        });

    unsafe { vk_check!(device.create_image_view(&create_info, None), "vkCreateImageView") }
}

impl Texture for VulkanTexture {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    fn layer_count(&self) -> u32 {
        self.layer_count
    }

    fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.view, None);
            }
            if let Some(allocation) = self.allocation.take() {
                self.ctx.free(allocation);
            }
            if self.owns_image {
                self.ctx.device.destroy_image(self.image, None);
            }
        }
    }
}

