/// GlGraphicsDevice - OpenGL implementation of the GraphicsDevice trait
///
/// Wraps a `glow::Context` made current by the windowing layer. All calls,
/// including resource creation and drops, must happen on that thread.

use glow::HasContext;
use lumos_engine::lumos::render::{
    Buffer, BufferDesc, CommandBufferLevel, DescriptorSet, DescriptorSetInfo, DeviceLimits, Framebuffer,
    FramebufferInfo, GraphicsApi, GraphicsDevice, NativeCommandBuffer, Pipeline, PipelineInfo, RenderPass,
    RenderPassInfo, Shader, ShaderDesc, Texture, TextureDesc, UniformBuffer, UniformBufferDesc,
};
use lumos_engine::lumos::renderer::RendererConfig;
use lumos_engine::lumos::{Error, Result};
use lumos_engine::{engine_error, engine_warn};
use std::sync::Arc;

use crate::gl_buffer::{GlBuffer, GlUniformBuffer};
use crate::gl_command_buffer::GlCommandBuffer;
use crate::gl_context::GlContext;
use crate::gl_descriptor_set::GlDescriptorSet;
use crate::gl_frame_buffer::GlFramebuffer;
use crate::gl_pipeline::{dynamic_count, GlPipeline};
use crate::gl_render_pass::GlRenderPass;
use crate::gl_shader::GlShader;
use crate::gl_swapchain::{GlSwapchain, SwapBuffersFn};
use crate::gl_texture::GlTexture;

const SOURCE: &str = "lumos::opengl::GraphicsDevice";

/// OpenGL graphics device
pub struct GlGraphicsDevice {
    ctx: Arc<GlContext>,
}

impl GlGraphicsDevice {
    /// Create the device from a current GL 4.3+ context
    pub fn new(gl: glow::Context, config: &RendererConfig) -> Result<Self> {
        let version = gl.version();
        if (version.major, version.minor) < (4, 3) && !version.is_embedded {
            engine_error!(SOURCE, "OpenGL {}.{} found, 4.3 or later is required", version.major, version.minor);
            return Err(Error::InitializationFailed(format!(
                "OpenGL {}.{} is too old, 4.3 required",
                version.major, version.minor
            )));
        }

        if config.enable_validation {
            engine_warn!(SOURCE, "Validation is not available on the OpenGL backend; GL errors are checked per call");
        }

        let ctx = GlContext::new(gl);
        unsafe {
            // Cube faces are sampled as one seamless texture, as on Vulkan
            ctx.gl.enable(glow::TEXTURE_CUBE_MAP_SEAMLESS);
        }
        ctx.check_error("device setup")?;

        Ok(Self { ctx: Arc::new(ctx) })
    }

    /// Renderer string reported by the driver
    pub fn device_name(&self) -> &str {
        &self.ctx.renderer_name
    }

    /// Version string reported by the driver
    pub fn version(&self) -> &str {
        &self.ctx.version
    }

    /// Create a swapchain over the default framebuffer
    ///
    /// `swap_buffers` is called after every present, typically the window
    /// surface's swap.
    pub fn create_swapchain(&self, width: u32, height: u32, swap_buffers: SwapBuffersFn) -> GlSwapchain {
        GlSwapchain::create(self.ctx.clone(), width, height, swap_buffers)
    }
}

impl GraphicsDevice for GlGraphicsDevice {
    fn api(&self) -> GraphicsApi {
        GraphicsApi::OpenGl
    }

    fn limits(&self) -> DeviceLimits {
        self.ctx.limits
    }

    fn create_texture(&self, desc: TextureDesc) -> Result<Arc<dyn Texture>> {
        Ok(Arc::new(GlTexture::create(self.ctx.clone(), desc)?))
    }

    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        Ok(Arc::new(GlBuffer::create(self.ctx.clone(), desc)?))
    }

    fn create_uniform_buffer(&self, desc: UniformBufferDesc) -> Result<Arc<dyn UniformBuffer>> {
        Ok(Arc::new(GlUniformBuffer::create(self.ctx.clone(), desc)?))
    }

    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn Shader>> {
        Ok(Arc::new(GlShader::create(self.ctx.clone(), desc)?))
    }

    fn create_native_command_buffer(&self, level: CommandBufferLevel) -> Result<Box<dyn NativeCommandBuffer>> {
        Ok(Box::new(GlCommandBuffer::new(self.ctx.clone(), level == CommandBufferLevel::Secondary)))
    }

    fn create_render_pass(&self, info: &RenderPassInfo) -> Result<Arc<dyn RenderPass>> {
        Ok(Arc::new(GlRenderPass::create(info)?))
    }

    fn create_framebuffer(&self, info: FramebufferInfo) -> Result<Arc<dyn Framebuffer>> {
        Ok(Arc::new(GlFramebuffer::create(self.ctx.clone(), info)?))
    }

    fn create_pipeline(&self, info: PipelineInfo) -> Result<Arc<dyn Pipeline>> {
        Ok(Arc::new(GlPipeline::create(self.ctx.clone(), info)?))
    }

    fn create_descriptor_set(&self, info: &DescriptorSetInfo) -> Result<Arc<dyn DescriptorSet>> {
        let pipeline = info.pipeline.as_any().downcast_ref::<GlPipeline>().ok_or_else(|| {
            engine_error!(SOURCE, "create_descriptor_set: pipeline '{}' is not an OpenGL pipeline", info.pipeline.name());
            Error::InvalidResource(format!("pipeline '{}' is not an OpenGL pipeline", info.pipeline.name()))
        })?;
        let Some(layout) = pipeline.layouts.get(info.layout_index as usize) else {
            engine_error!(
                SOURCE,
                "create_descriptor_set: pipeline '{}' has {} layout(s), index {} requested",
                pipeline.name(), pipeline.layouts.len(), info.layout_index
            );
            return Err(Error::InvalidResource(format!("layout index {} out of range", info.layout_index)));
        };
        Ok(Arc::new(GlDescriptorSet::new(pipeline.id(), info.layout_index, dynamic_count(Some(layout)))))
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.ctx.gl.finish() };
        self.ctx.check_error("glFinish")
    }
}
