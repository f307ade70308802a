/// Swapchain - OpenGL implementation of the Swapchain trait
///
/// GL presents through the windowing layer, so the swapchain is the default
/// framebuffer plus a callback that swaps the window's buffers.

use lumos_engine::lumos::render::{NativeCommandBuffer, Swapchain, Texture, TextureFormat};
use lumos_engine::lumos::Result;
use lumos_engine::{engine_debug, engine_warn};
use std::sync::Arc;

use crate::gl_context::GlContext;
use crate::gl_texture::GlTexture;

/// Called after each frame's commands are issued
pub type SwapBuffersFn = Box<dyn FnMut() -> Result<()> + Send + Sync>;

pub struct GlSwapchain {
    ctx: Arc<GlContext>,
    image: Arc<GlTexture>,
    swap_buffers: SwapBuffersFn,
}

impl GlSwapchain {
    pub(crate) fn create(ctx: Arc<GlContext>, width: u32, height: u32, swap_buffers: SwapBuffersFn) -> Self {
        engine_debug!("lumos::opengl::Swapchain", "Default framebuffer {}x{}", width, height);
        let image = Arc::new(GlTexture::default_framebuffer(ctx.clone(), width, height));
        Self { ctx, image, swap_buffers }
    }
}

impl Swapchain for GlSwapchain {
    fn buffer_count(&self) -> usize {
        1
    }

    fn current_buffer_index(&self) -> usize {
        0
    }

    fn image(&self, index: usize) -> Arc<dyn Texture> {
        if index != 0 {
            engine_warn!("lumos::opengl::Swapchain", "Image {} requested, the default framebuffer is image 0", index);
        }
        self.image.clone()
    }

    fn acquire_next_image(&mut self) -> Result<usize> {
        Ok(0)
    }

    fn present(&mut self, command_buffer: &mut dyn NativeCommandBuffer) -> Result<()> {
        command_buffer.submit()?;
        (self.swap_buffers)()
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        self.image = Arc::new(GlTexture::default_framebuffer(self.ctx.clone(), width, height));
        engine_debug!("lumos::opengl::Swapchain", "Resized to {}x{}", width, height);
        Ok(())
    }

    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn format(&self) -> TextureFormat {
        TextureFormat::Screen
    }
}
