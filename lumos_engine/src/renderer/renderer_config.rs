/// Renderer configuration and per-frame statistics

use crate::graphics_device::GraphicsApi;

/// Renderer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Backend selected once at startup
    pub api: GraphicsApi,
    /// Enable validation/debug layers
    pub enable_validation: bool,
    /// Application name
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Capacity of the per-object dynamic uniform buffer
    pub max_objects: u32,
    /// Capacity of the skinning dynamic uniform buffer (deferred renderer)
    pub max_animated_objects: u32,
    pub clear_colour: [f32; 4],
    /// Present with vertical sync (FIFO)
    pub vsync: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            api: GraphicsApi::Vulkan,
            enable_validation: cfg!(debug_assertions),
            app_name: "Lumos Application".to_string(),
            app_version: (1, 0, 0),
            max_objects: 2048,
            max_animated_objects: 64,
            clear_colour: [0.8, 0.8, 0.8, 1.0],
            vsync: true,
        }
    }
}

/// Renderer statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendererStats {
    /// Number of draw calls this frame
    pub draw_calls: u32,
    /// Number of triangles drawn this frame
    pub triangles: u32,
    /// Secondary command buffers executed this frame
    pub secondary_buffers: u32,
}
