/// Forward renderer - draws opaque meshes straight into the swapchain
/// (or into one render texture) with one secondary command buffer per mesh

use std::path::Path;
use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{GraphicsDevice, Shader, ShaderDesc, SharedSwapchain, Texture};
use crate::renderer::{Renderer, RendererBase, RendererConfig, RendererSetup, SharedGBuffer, TargetLayout};

/// Shader loaded from the core shader directory
pub const FORWARD_SHADER: &str = "Simple";

pub struct ForwardRenderer {
    base: RendererBase,
}

impl ForwardRenderer {
    /// Load `Simple.shader` from `shader_directory` and build the renderer
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        swapchain: SharedSwapchain,
        gbuffer: SharedGBuffer,
        config: RendererConfig,
        shader_directory: &Path,
    ) -> Result<Self> {
        let shader = device.create_shader(ShaderDesc::load(FORWARD_SHADER, shader_directory)?)?;
        Self::with_shader(device, swapchain, gbuffer, config, shader)
    }

    pub fn with_shader(
        device: Arc<dyn GraphicsDevice>,
        swapchain: SharedSwapchain,
        gbuffer: SharedGBuffer,
        config: RendererConfig,
        shader: Arc<dyn Shader>,
    ) -> Result<Self> {
        let base = RendererBase::new(
            device,
            swapchain,
            gbuffer,
            config,
            RendererSetup {
                source: "lumos::ForwardRenderer",
                pipeline_name: "ForwardRenderer".to_string(),
                target: TargetLayout::Forward,
                shader,
                skinned_shader: None,
            },
        )?;
        Ok(Self { base })
    }

    /// Render into `texture` instead of the swapchain (`None` switches back)
    pub fn set_render_target(&mut self, texture: Option<Arc<dyn Texture>>, rebuild: bool) -> Result<()> {
        self.base.set_render_target(texture, rebuild)
    }

    /// Render into the GBuffer's `Offscreen0` texture
    pub fn set_render_to_gbuffer_texture(&mut self, enabled: bool) -> Result<()> {
        self.base.set_render_to_gbuffer_texture(enabled)
    }
}

impl Renderer for ForwardRenderer {
    fn base(&self) -> &RendererBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RendererBase {
        &mut self.base
    }
}

#[cfg(test)]
#[path = "forward_renderer_tests.rs"]
mod tests;
