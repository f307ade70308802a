/*!
# Lumos Engine

Core traits and types for the Lumos rendering engine.

The crate is backend-agnostic: every GPU object is reached through a trait
object, and the concrete Vulkan or OpenGL backend is chosen once at startup
by constructing its `GraphicsDevice` and registering it with the `Engine`.

## Architecture

- **GraphicsDevice**: factory for every GPU resource
- **CommandBuffer**: primary/secondary recording with an explicit state machine
- **RenderPass / Framebuffer / Pipeline / DescriptorSet**: render target and
  draw-state objects
- **Swapchain**: presentable images, acquire and present
- **Renderer**: per-frame protocol shared by the forward and deferred
  off-screen renderers
- **Scene**: camera, lights, meshes and the traversal trait the renderers read

Backend implementations provide concrete types that implement these traits.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod graphics_device;
pub mod renderer;
pub mod scene;

// Main lumos namespace module
pub mod lumos {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton
    pub use crate::engine::Engine;

    // Renderer trait
    pub use crate::renderer::Renderer;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Graphics device abstraction
    pub mod render {
        pub use crate::graphics_device::*;
    }

    // Renderers, GBuffer and per-frame staging
    pub mod renderer {
        pub use crate::renderer::*;
    }

    // Scene sub-module
    pub mod scene {
        pub use crate::scene::*;
    }
}

// Re-export math library at crate root
pub use glam;
