/// Framebuffer - OpenGL implementation of the Framebuffer trait
///
/// Off-screen framebuffers are FBOs with one attachment per builder entry.
/// Screen framebuffers target the default framebuffer, whose depth buffer is
/// owned by the window; a depth texture given for it is not attached.

use glow::HasContext;
use lumos_engine::lumos::render::{
    AttachmentKind, Framebuffer, FramebufferAttachment, FramebufferInfo, Texture,
};
use lumos_engine::lumos::{Error, Result};
use lumos_engine::{engine_debug, engine_error};
use std::any::Any;
use std::sync::Arc;

use crate::gl_context::GlContext;
use crate::gl_format::attachment_point;
use crate::gl_texture::GlTexture;

/// Downcast a texture created by another backend into an error
pub(crate) fn downcast_texture<'a>(texture: &'a dyn Texture, source: &str) -> Result<&'a GlTexture> {
    texture.as_any().downcast_ref::<GlTexture>().ok_or_else(|| {
        engine_error!(source, "Texture '{}' was not created by the OpenGL device", texture.name());
        Error::InvalidResource(format!("texture '{}' is not an OpenGL texture", texture.name()))
    })
}

pub struct GlFramebuffer {
    ctx: Arc<GlContext>,
    name: String,
    /// None for the default framebuffer
    pub(crate) handle: Option<glow::NativeFramebuffer>,
    attachments: Vec<FramebufferAttachment>,
    width: u32,
    height: u32,
    clear_colour: [f32; 4],
    screen: bool,
}

impl GlFramebuffer {
    pub(crate) fn create(ctx: Arc<GlContext>, info: FramebufferInfo) -> Result<Self> {
        let handle = if info.screen {
            engine_debug!("lumos::opengl::Framebuffer", "'{}' targets the default framebuffer", info.name);
            None
        } else {
            Some(create_fbo(&ctx, &info)?)
        };

        Ok(Self {
            ctx,
            name: info.name,
            handle,
            attachments: info.attachments,
            width: info.width,
            height: info.height,
            clear_colour: info.clear_colour,
            screen: info.screen,
        })
    }
}

fn create_fbo(ctx: &GlContext, info: &FramebufferInfo) -> Result<glow::NativeFramebuffer> {
    let gl = &ctx.gl;
    let fbo = unsafe { gl_check!(gl.create_framebuffer(), "glGenFramebuffers '{}'", info.name)? };

    let attached = unsafe {
        gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
        let attached = attach_all(gl, info);
        if attached.is_ok() {
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            if status != glow::FRAMEBUFFER_COMPLETE {
                engine_error!(
                    "lumos::opengl::Framebuffer",
                    "Framebuffer '{}' is incomplete: {}",
                    info.name,
                    framebuffer_status_name(status)
                );
                Err(Error::InvalidResource(format!("framebuffer '{}' is incomplete", info.name)))
            } else {
                Ok(())
            }
        } else {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            attached
        }
    };

    if let Err(e) = attached {
        unsafe { gl.delete_framebuffer(fbo) };
        return Err(e);
    }
    ctx.check_error(&format!("create framebuffer '{}'", info.name))?;

    engine_debug!(
        "lumos::opengl::Framebuffer",
        "Created '{}' ({}x{}, {} attachment(s))",
        info.name, info.width, info.height, info.attachments.len()
    );
    Ok(fbo)
}

/// Attach every texture to the bound FBO and set its draw buffers
unsafe fn attach_all(gl: &glow::Context, info: &FramebufferInfo) -> Result<()> {
    let mut colour_count = 0u32;
    for attachment in &info.attachments {
        let texture = downcast_texture(attachment.texture.as_ref(), "lumos::opengl::Framebuffer")?;
        let point = attachment_point(attachment.kind, texture.format(), colour_count);
        if (glow::COLOR_ATTACHMENT0..glow::COLOR_ATTACHMENT0 + 32).contains(&point) {
            colour_count += 1;
        }

        match attachment.kind {
            AttachmentKind::Colour | AttachmentKind::Depth if texture.target == glow::TEXTURE_2D => {
                gl.framebuffer_texture_2d(glow::FRAMEBUFFER, point, glow::TEXTURE_2D, texture.handle, 0);
            }
            AttachmentKind::CubeFace => {
                gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    point,
                    glow::TEXTURE_CUBE_MAP_POSITIVE_X + attachment.layer,
                    texture.handle,
                    0,
                );
            }
            AttachmentKind::ArrayLayer => {
                gl.framebuffer_texture_layer(glow::FRAMEBUFFER, point, texture.handle, 0, attachment.layer as i32);
            }
            // Whole layered texture (shadow cascades, or a cube/array given as a plain attachment)
            _ => gl.framebuffer_texture(glow::FRAMEBUFFER, point, texture.handle, 0),
        }
    }

    if colour_count == 0 {
        gl.draw_buffer(glow::NONE);
        gl.read_buffer(glow::NONE);
    } else {
        let buffers: Vec<u32> = (0..colour_count).map(|i| glow::COLOR_ATTACHMENT0 + i).collect();
        gl.draw_buffers(&buffers);
    }
    Ok(())
}

fn framebuffer_status_name(status: u32) -> &'static str {
    match status {
        glow::FRAMEBUFFER_UNDEFINED => "GL_FRAMEBUFFER_UNDEFINED",
        glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => "GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT",
        glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => "GL_FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT",
        glow::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => "GL_FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER",
        glow::FRAMEBUFFER_UNSUPPORTED => "GL_FRAMEBUFFER_UNSUPPORTED",
        glow::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => "GL_FRAMEBUFFER_INCOMPLETE_MULTISAMPLE",
        glow::FRAMEBUFFER_INCOMPLETE_LAYER_TARGETS => "GL_FRAMEBUFFER_INCOMPLETE_LAYER_TARGETS",
        _ => "unknown status",
    }
}

impl Framebuffer for GlFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    fn attachment_kinds(&self) -> Vec<AttachmentKind> {
        self.attachments.iter().map(|a| a.kind).collect()
    }

    fn depth_roles(&self) -> Vec<bool> {
        self.attachments.iter().map(FramebufferAttachment::is_depth).collect()
    }

    fn clear_colour(&self) -> [f32; 4] {
        self.clear_colour
    }

    fn is_screen(&self) -> bool {
        self.screen
    }

    fn bind_with_size(&self, width: u32, height: u32) {
        unsafe {
            self.ctx.gl.bind_framebuffer(glow::FRAMEBUFFER, self.handle);
            self.ctx.gl.viewport(0, 0, width as i32, height as i32);
        }
    }

    fn unbind(&self) {
        unsafe { self.ctx.gl.bind_framebuffer(glow::FRAMEBUFFER, None) };
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for GlFramebuffer {
    fn drop(&mut self) {
        if let Some(fbo) = self.handle.take() {
            unsafe { self.ctx.gl.delete_framebuffer(fbo) };
        }
        engine_debug!("lumos::opengl::Framebuffer", "Destroyed '{}'", self.name);
    }
}
