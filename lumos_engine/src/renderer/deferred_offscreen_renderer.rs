/// Deferred off-screen renderer - the geometry pass of deferred shading
///
/// Writes colour, position, normal and PBR data into the GBuffer (plus the
/// shared depth). Meshes submitted with joint transforms go through the
/// skinned pipeline. The GBuffer textures are read by a later lighting pass.

use std::path::Path;
use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{GraphicsDevice, Shader, ShaderDesc, SharedSwapchain};
use crate::renderer::{Renderer, RendererBase, RendererConfig, RendererSetup, SharedGBuffer, TargetLayout};

pub const DEFERRED_SHADER: &str = "DeferredColour";
pub const DEFERRED_ANIM_SHADER: &str = "DeferredColourAnim";

pub struct DeferredOffScreenRenderer {
    base: RendererBase,
}

impl DeferredOffScreenRenderer {
    /// Load the static and skinned geometry shaders from `shader_directory`
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        swapchain: SharedSwapchain,
        gbuffer: SharedGBuffer,
        config: RendererConfig,
        shader_directory: &Path,
    ) -> Result<Self> {
        let shader = device.create_shader(ShaderDesc::load(DEFERRED_SHADER, shader_directory)?)?;
        let anim_shader = device.create_shader(ShaderDesc::load(DEFERRED_ANIM_SHADER, shader_directory)?)?;
        Self::with_shaders(device, swapchain, gbuffer, config, shader, anim_shader)
    }

    pub fn with_shaders(
        device: Arc<dyn GraphicsDevice>,
        swapchain: SharedSwapchain,
        gbuffer: SharedGBuffer,
        config: RendererConfig,
        shader: Arc<dyn Shader>,
        anim_shader: Arc<dyn Shader>,
    ) -> Result<Self> {
        let base = RendererBase::new(
            device,
            swapchain,
            gbuffer,
            config,
            RendererSetup {
                source: "lumos::DeferredOffScreenRenderer",
                pipeline_name: "Deferred".to_string(),
                target: TargetLayout::GBuffer,
                shader,
                skinned_shader: Some(anim_shader),
            },
        )?;
        Ok(Self { base })
    }
}

impl Renderer for DeferredOffScreenRenderer {
    fn base(&self) -> &RendererBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RendererBase {
        &mut self.base
    }
}

#[cfg(test)]
#[path = "deferred_offscreen_renderer_tests.rs"]
mod tests;
