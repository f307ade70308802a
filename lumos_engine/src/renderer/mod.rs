/// Renderer module - frame orchestration over the graphics device traits

// Module declarations
pub mod renderer;
pub mod renderer_config;
pub mod renderer_base;
pub mod render_command;
pub mod system_uniforms;
pub mod dynamic_uniform;
pub mod gbuffer;
pub mod forward_renderer;
pub mod deferred_offscreen_renderer;

// Re-export everything from renderer.rs
pub use renderer::*;

// Re-export from other modules
pub use renderer_config::*;
pub use renderer_base::*;
pub use render_command::*;
pub use system_uniforms::*;
pub use dynamic_uniform::*;
pub use gbuffer::*;
pub use forward_renderer::*;
pub use deferred_offscreen_renderer::*;
