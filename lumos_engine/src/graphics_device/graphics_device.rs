/// GraphicsDevice trait - the backend factory every renderer builds from

use std::path::Path;
use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{
    Buffer, BufferDesc, CommandBufferLevel, DescriptorSet, DescriptorSetInfo, Framebuffer,
    FramebufferInfo, NativeCommandBuffer, Pipeline, PipelineInfo, RenderPass, RenderPassInfo,
    Shader, ShaderDesc, Texture, TextureDesc, TextureLoadOptions, TextureParameters,
    TextureType, UniformBuffer, UniformBufferDesc, load_texture_data,
};

/// Graphics API implemented by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphicsApi {
    OpenGl,
    Vulkan,
}

/// Device limits the renderers depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Dynamic uniform offsets must be multiples of this (0 = no constraint)
    pub min_uniform_buffer_offset_alignment: u64,
    pub max_framebuffer_width: u32,
    pub max_framebuffer_height: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            min_uniform_buffer_offset_alignment: 256,
            max_framebuffer_width: 16384,
            max_framebuffer_height: 16384,
        }
    }
}

/// Main graphics device trait
///
/// Selected once at startup and shared (`Arc<dyn GraphicsDevice>`) by every
/// renderer. All creation methods take `&self`: backends keep their mutable
/// state (allocators, pools) behind their own locks.
pub trait GraphicsDevice: Send + Sync {
    fn api(&self) -> GraphicsApi;

    fn limits(&self) -> DeviceLimits;

    /// Create a texture (empty, or filled from `desc.data`)
    fn create_texture(&self, desc: TextureDesc) -> Result<Arc<dyn Texture>>;

    /// Load pixels from `path` and create a colour texture from them
    ///
    /// The pixel format follows the image's bit depth; `parameters` supplies
    /// filter and wrap.
    fn create_texture_from_file(
        &self,
        name: &str,
        path: &Path,
        parameters: TextureParameters,
        options: TextureLoadOptions,
    ) -> Result<Arc<dyn Texture>> {
        let data = load_texture_data(path, options)
            .ok_or_else(|| Error::ResourceLoadFailed(format!("texture '{}' from {:?}", name, path)))?;

        let format = data.format();
        self.create_texture(TextureDesc {
            name: name.to_string(),
            width: data.width,
            height: data.height,
            texture_type: TextureType::Colour,
            parameters: TextureParameters { format, ..parameters },
            layer_count: 1,
            data: Some(data.pixels),
            file_path: Some(path.to_path_buf()),
        })
    }

    /// Create a vertex or index buffer
    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Create a CPU-writable uniform buffer
    fn create_uniform_buffer(&self, desc: UniformBufferDesc) -> Result<Arc<dyn UniformBuffer>>;

    /// Compile every stage of `desc` and reflect its uniforms
    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn Shader>>;

    /// Allocate a native command buffer and its fence (created signaled)
    fn create_native_command_buffer(&self, level: CommandBufferLevel) -> Result<Box<dyn NativeCommandBuffer>>;

    fn create_render_pass(&self, info: &RenderPassInfo) -> Result<Arc<dyn RenderPass>>;

    /// Create a framebuffer; callers go through `FramebufferBuilder::build`
    fn create_framebuffer(&self, info: FramebufferInfo) -> Result<Arc<dyn Framebuffer>>;

    /// Build a pipeline together with its per-scene descriptor set
    fn create_pipeline(&self, info: PipelineInfo) -> Result<Arc<dyn Pipeline>>;

    /// Allocate a descriptor set from the pipeline's pool
    fn create_descriptor_set(&self, info: &DescriptorSetInfo) -> Result<Arc<dyn DescriptorSet>>;

    /// Block until the device has finished all submitted work
    fn wait_idle(&self) -> Result<()>;
}
