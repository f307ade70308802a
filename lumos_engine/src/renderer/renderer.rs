/// Renderer trait - the per-frame protocol driven by the application
///
/// Frame order is fixed:
/// `begin -> begin_scene -> submit* -> set_system_uniforms -> present ->
/// end_scene -> end -> present_to_screen` (the last step only when
/// rendering to the swapchain). `render_scene` runs the whole sequence for
/// one scene.

use std::sync::Arc;
use glam::Mat4;
use crate::error::Result;
use crate::renderer::{RenderCommand, RendererBase, RendererStats};
use crate::scene::{Camera, Light, Mesh, Scene};

pub trait Renderer {
    fn base(&self) -> &RendererBase;

    fn base_mut(&mut self) -> &mut RendererBase;

    /// Clear the command queue, start the primary buffer and open the render pass
    fn begin(&mut self) -> Result<()> {
        self.base_mut().begin()
    }

    /// Stage camera matrices and lights
    fn begin_scene(&mut self, camera: &Camera, lights: &[Light]) {
        self.base_mut().begin_scene(camera, lights);
    }

    /// Queue one draw; submission order is draw order
    fn submit(&mut self, command: RenderCommand) {
        self.base_mut().submit(command);
    }

    fn submit_mesh(&mut self, mesh: &Arc<Mesh>, transform: Mat4, texture_matrix: Mat4) {
        self.submit(RenderCommand::new(mesh.clone(), transform, texture_matrix));
    }

    /// Upload system uniforms and every queued transform
    fn set_system_uniforms(&mut self) -> Result<()> {
        self.base_mut().set_system_uniforms()
    }

    /// Record one secondary buffer per queued command into the primary buffer
    fn present(&mut self) -> Result<()> {
        self.base_mut().present()
    }

    fn end_scene(&mut self) {}

    /// Close the render pass and the primary buffer (submits and waits when off-screen)
    fn end(&mut self) -> Result<()> {
        self.base_mut().end()
    }

    /// Submit the frame's primary buffer through the swapchain
    fn present_to_screen(&mut self) -> Result<()> {
        self.base_mut().present_to_screen()
    }

    /// Rebuild render pass, pipelines and framebuffers at the new size
    ///
    /// The swapchain and the GBuffer must already have been resized.
    fn on_resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.base_mut().rebuild(width, height)
    }

    fn renders_offscreen(&self) -> bool {
        self.base().renders_offscreen()
    }

    fn stats(&self) -> RendererStats {
        self.base().stats()
    }

    /// Render every visible opaque entity of `scene`
    ///
    /// The application acquires the swapchain image beforehand.
    fn render_scene(&mut self, scene: &dyn Scene) -> Result<()> {
        self.base_mut().update_current_buffer_id()?;

        self.begin()?;
        self.begin_scene(scene.camera(), scene.lights());
        scene.for_each_opaque(&mut |entity| {
            let mut command = RenderCommand::new(entity.mesh.clone(), entity.transform, entity.texture_matrix);
            if let Some(joints) = entity.joint_transforms {
                command = command.with_joints(joints.to_vec());
            }
            self.submit(command);
        });
        self.set_system_uniforms()?;
        self.present()?;
        self.end_scene();
        self.end()?;

        if !self.renders_offscreen() {
            self.present_to_screen()?;
        }
        Ok(())
    }
}
