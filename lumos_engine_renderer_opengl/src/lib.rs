/*!
# Lumos Engine - OpenGL Backend

OpenGL 4.3 implementation of the Lumos `GraphicsDevice` and its resource
traits, built on `glow`.

The backend does not create windows or contexts: the application makes a
context current, loads it into a `glow::Context` and hands it over together
with a callback that swaps the window's buffers.

```no_run
use std::sync::Arc;
use lumos_engine::lumos::Engine;
use lumos_engine::lumos::renderer::RendererConfig;
use lumos_engine_renderer_opengl::lumos::GlGraphicsDevice;
# fn run(gl: glow::Context) -> lumos_engine::lumos::Result<()> {
let config = RendererConfig::default();
let device = GlGraphicsDevice::new(gl, &config)?;
let swapchain = device.create_swapchain(1280, 720, Box::new(|| Ok(())));
Engine::create_graphics_device(Arc::new(device))?;
# let _ = swapchain;
# Ok(())
# }
```
*/

/// Check the result of a glow object-creation call
///
/// Failures are logged with file:line. Debug builds panic on the spot;
/// release builds return `Error::BackendError`.
macro_rules! gl_check {
    ($call:expr, $($what:tt)*) => {
        $call.map_err(|e| $crate::gl_failure(format!("{}: {}", format_args!($($what)*), e), file!(), line!()))
    };
}

mod gl_context;
mod gl_format;
mod gl_texture;
mod gl_buffer;
mod gl_shader;
mod gl_render_pass;
mod gl_frame_buffer;
mod gl_pipeline;
mod gl_descriptor_set;
mod gl_command_buffer;
mod gl_swapchain;
mod gl_graphics_device;

use lumos_engine::lumos::log::LogSeverity;
use lumos_engine::lumos::{Engine, Error};

pub use gl_command_buffer::GlCommandBuffer;
pub use gl_graphics_device::GlGraphicsDevice;
pub use gl_pipeline::{GlPipeline, PUSH_CONSTANT_BINDING};
pub use gl_swapchain::{GlSwapchain, SwapBuffersFn};
pub use gl_texture::GlTexture;

/// Main namespace, mirroring `lumos_engine::lumos`
pub mod lumos {
    pub use crate::gl_graphics_device::GlGraphicsDevice;
    pub use crate::gl_swapchain::GlSwapchain;
}

pub(crate) fn gl_failure(what: String, file: &'static str, line: u32) -> Error {
    let message = format!("{} failed", what);
    Engine::log_detailed(LogSeverity::Error, "lumos::opengl", message.clone(), file, line);

    if cfg!(debug_assertions) {
        panic!("[lumos::opengl] {}", message);
    }

    Error::BackendError(message)
}
