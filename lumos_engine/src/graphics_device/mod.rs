/// Graphics device module - backend-neutral resource and command traits

// Module declarations
pub mod graphics_device;
pub mod texture;
pub mod buffer;
pub mod shader;
pub mod shader_reflection;
pub mod pipeline;
pub mod descriptor_set;

// Recording and presentation
pub mod command_buffer;
pub mod render_pass;
pub mod frame_buffer;
pub mod swapchain;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use texture::*;
pub use buffer::*;
pub use shader::*;
pub use shader_reflection::*;
pub use pipeline::*;
pub use descriptor_set::*;

pub use command_buffer::*;
pub use render_pass::*;
pub use frame_buffer::*;
pub use swapchain::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
