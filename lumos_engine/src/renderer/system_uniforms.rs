/// System uniform staging: engine-provided shader inputs
///
/// Vertex stage: four matrices at fixed offsets. Fragment stage: the light
/// array and its count. Both are staged on the CPU during `begin_scene` and
/// pushed to the GPU in `set_system_uniforms`.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use crate::scene::{Camera, Light};

pub const MAX_LIGHTS: usize = 32;

/// Byte offsets inside the vertex-stage system block
pub const PROJECTION_OFFSET: usize = 0;
pub const VIEW_OFFSET: usize = 64;
pub const MODEL_OFFSET: usize = 128;
pub const TEXTURE_MATRIX_OFFSET: usize = 192;

/// Vertex-stage system block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexSystemUniforms {
    pub projection: Mat4,
    pub view: Mat4,
    pub model: Mat4,
    pub texture_matrix: Mat4,
}

impl Default for VertexSystemUniforms {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            model: Mat4::IDENTITY,
            texture_matrix: Mat4::IDENTITY,
        }
    }
}

/// Fragment-stage system block
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightUniforms {
    pub lights: [Light; MAX_LIGHTS],
    pub light_count: u32,
    _padding: [u32; 3],
}

impl Default for LightUniforms {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl LightUniforms {
    /// Copy `lights`, keeping the first `MAX_LIGHTS`
    pub fn set_lights(&mut self, lights: &[Light]) {
        if lights.len() > MAX_LIGHTS {
            crate::engine_warn!(
                "lumos::SystemUniforms",
                "{} lights submitted, only the first {} are used",
                lights.len(),
                MAX_LIGHTS
            );
        }
        let count = lights.len().min(MAX_LIGHTS);
        self.lights = [Light::zeroed(); MAX_LIGHTS];
        self.lights[..count].copy_from_slice(&lights[..count]);
        self.light_count = count as u32;
    }
}

/// Both system blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemUniforms {
    pub vertex: VertexSystemUniforms,
    pub fragment: LightUniforms,
}

impl SystemUniforms {
    /// Stage the camera matrices and lights for this frame
    pub fn begin_scene(&mut self, camera: &Camera, lights: &[Light]) {
        self.vertex.projection = *camera.projection_matrix();
        self.vertex.view = *camera.view_matrix();
        self.fragment.set_lights(lights);
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.vertex)
    }

    pub fn fragment_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.fragment)
    }

    pub fn vertex_size() -> u64 {
        std::mem::size_of::<VertexSystemUniforms>() as u64
    }

    pub fn fragment_size() -> u64 {
        std::mem::size_of::<LightUniforms>() as u64
    }
}

#[cfg(test)]
#[path = "system_uniforms_tests.rs"]
mod tests;
