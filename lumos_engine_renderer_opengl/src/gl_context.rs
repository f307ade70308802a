/// Shared OpenGL context and device-wide queries
///
/// Every GL resource holds an `Arc<GlContext>` so the function table outlives
/// the textures, buffers and programs created through it.

use glow::HasContext;
use lumos_engine::lumos::render::DeviceLimits;
use lumos_engine::lumos::{Error, Result};
use lumos_engine::engine_info;

pub struct GlContext {
    pub(crate) gl: glow::Context,
    pub(crate) limits: DeviceLimits,
    pub(crate) renderer_name: String,
    pub(crate) version: String,
}

// GL calls are only issued from the thread the context is current on; the
// engine traits require Send + Sync so resources can sit behind Arc.
unsafe impl Send for GlContext {}
unsafe impl Sync for GlContext {}

impl GlContext {
    pub(crate) fn new(gl: glow::Context) -> Self {
        let (limits, renderer_name, version) = unsafe {
            let alignment = gl.get_parameter_i32(glow::UNIFORM_BUFFER_OFFSET_ALIGNMENT).max(1) as u64;
            let width = gl.get_parameter_i32(glow::MAX_FRAMEBUFFER_WIDTH).max(0) as u32;
            let height = gl.get_parameter_i32(glow::MAX_FRAMEBUFFER_HEIGHT).max(0) as u32;
            let defaults = DeviceLimits::default();
            let limits = DeviceLimits {
                min_uniform_buffer_offset_alignment: alignment,
                max_framebuffer_width: if width == 0 { defaults.max_framebuffer_width } else { width },
                max_framebuffer_height: if height == 0 { defaults.max_framebuffer_height } else { height },
            };
            (limits, gl.get_parameter_string(glow::RENDERER), gl.get_parameter_string(glow::VERSION))
        };

        engine_info!("lumos::opengl", "OpenGL {} on {}", version, renderer_name);
        engine_info!(
            "lumos::opengl",
            "Uniform offset alignment {}, max framebuffer {}x{}",
            limits.min_uniform_buffer_offset_alignment,
            limits.max_framebuffer_width,
            limits.max_framebuffer_height
        );

        Self { gl, limits, renderer_name, version }
    }

    /// Drain the GL error queue after `what`
    ///
    /// Only the first error is reported; `OUT_OF_MEMORY` maps to
    /// `Error::OutOfMemory`.
    pub(crate) fn check_error(&self, what: &str) -> Result<()> {
        let mut first = glow::NO_ERROR;
        loop {
            let error = unsafe { self.gl.get_error() };
            if error == glow::NO_ERROR {
                break;
            }
            if first == glow::NO_ERROR {
                first = error;
            }
        }
        if first == glow::NO_ERROR {
            return Ok(());
        }

        let error = crate::gl_failure(format!("{} ({})", what, gl_error_name(first)), file!(), line!());
        Err(match first {
            glow::OUT_OF_MEMORY => Error::OutOfMemory,
            _ => error,
        })
    }
}

pub(crate) fn gl_error_name(error: u32) -> &'static str {
    match error {
        glow::INVALID_ENUM => "GL_INVALID_ENUM",
        glow::INVALID_VALUE => "GL_INVALID_VALUE",
        glow::INVALID_OPERATION => "GL_INVALID_OPERATION",
        glow::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
        glow::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
        glow::STACK_UNDERFLOW => "GL_STACK_UNDERFLOW",
        glow::STACK_OVERFLOW => "GL_STACK_OVERFLOW",
        _ => "unknown GL error",
    }
}
