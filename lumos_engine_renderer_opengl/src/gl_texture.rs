/// Texture - OpenGL implementation of the Texture trait
///
/// 2D, cube and layered depth textures. The default framebuffer's colour
/// buffer is represented by a texture without a GL name.

use glow::HasContext;
use lumos_engine::lumos::render::{Texture, TextureDesc, TextureFormat, TextureType};
use lumos_engine::lumos::{Error, Result};
use lumos_engine::{engine_debug, engine_error};
use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::gl_context::GlContext;
use crate::gl_format::{texture_filter_to_gl, texture_format_desc, texture_target, texture_wrap_to_gl};

pub struct GlTexture {
    ctx: Arc<GlContext>,
    name: String,
    width: u32,
    height: u32,
    format: TextureFormat,
    texture_type: TextureType,
    layer_count: u32,
    file_path: Option<PathBuf>,

    /// None for the default framebuffer image
    pub(crate) handle: Option<glow::NativeTexture>,
    pub(crate) target: u32,
}

impl GlTexture {
    pub(crate) fn create(ctx: Arc<GlContext>, desc: TextureDesc) -> Result<Self> {
        if desc.texture_type == TextureType::Swapchain {
            engine_error!("lumos::opengl::Texture", "Texture '{}': swapchain images are created by the swapchain", desc.name);
            return Err(Error::InvalidResource(format!("texture '{}' has type Swapchain", desc.name)));
        }
        if desc.width == 0 || desc.height == 0 {
            engine_error!("lumos::opengl::Texture", "Texture '{}' has a zero dimension ({}x{})", desc.name, desc.width, desc.height);
            return Err(Error::InvalidResource(format!("texture '{}' has zero size", desc.name)));
        }

        let format = desc.parameters.format;
        let layer_count = match desc.texture_type {
            TextureType::Cube => 6,
            TextureType::DepthArray => desc.layer_count.max(1),
            _ => 1,
        };

        let layer_size = desc.width as usize * desc.height as usize * format.bytes_per_pixel() as usize;
        let data = match desc.data.as_deref() {
            Some(data) if format.is_depth() => {
                engine_error!("lumos::opengl::Texture", "Texture '{}': depth textures cannot be uploaded ({} bytes)", desc.name, data.len());
                return Err(Error::InvalidResource(format!("texture '{}' uploads depth data", desc.name)));
            }
            Some(data) if data.is_empty() || data.len() % layer_size != 0 || data.len() / layer_size > layer_count as usize => {
                engine_error!(
                    "lumos::opengl::Texture",
                    "Texture '{}': {} bytes of data do not fit {} layer(s) of {}x{} {:?}",
                    desc.name, data.len(), layer_count, desc.width, desc.height, format
                );
                return Err(Error::InvalidResource(format!("texture '{}' has mismatched data size", desc.name)));
            }
            other => other,
        };

        let target = texture_target(desc.texture_type);
        let gl_format = texture_format_desc(format);
        let mipmapped = data.is_some() && desc.texture_type != TextureType::DepthArray;
        let (min_filter, mag_filter) = texture_filter_to_gl(desc.parameters.filter, mipmapped);
        let wrap = texture_wrap_to_gl(desc.parameters.wrap) as i32;
        let (width, height) = (desc.width as i32, desc.height as i32);

        let gl = &ctx.gl;
        let handle = unsafe {
            let handle = gl_check!(gl.create_texture(), "glGenTextures '{}'", desc.name)?;
            gl.bind_texture(target, Some(handle));
            gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, min_filter as i32);
            gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, mag_filter as i32);
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, wrap);
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, wrap);
            if target == glow::TEXTURE_CUBE_MAP {
                gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_R, wrap);
            }
            if !mipmapped {
                gl.tex_parameter_i32(target, glow::TEXTURE_MAX_LEVEL, 0);
            }

            // Rows are tightly packed
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);

            match target {
                glow::TEXTURE_CUBE_MAP => {
                    for face in 0..6usize {
                        let pixels = data.and_then(|d| d.get(face * layer_size..(face + 1) * layer_size));
                        gl.tex_image_2d(
                            glow::TEXTURE_CUBE_MAP_POSITIVE_X + face as u32,
                            0,
                            gl_format.internal_format as i32,
                            width,
                            height,
                            0,
                            gl_format.format,
                            gl_format.data_type,
                            pixels,
                        );
                    }
                }
                glow::TEXTURE_2D_ARRAY => {
                    gl.tex_image_3d(
                        target,
                        0,
                        gl_format.internal_format as i32,
                        width,
                        height,
                        layer_count as i32,
                        0,
                        gl_format.format,
                        gl_format.data_type,
                        None,
                    );
                }
                _ => {
                    gl.tex_image_2d(
                        target,
                        0,
                        gl_format.internal_format as i32,
                        width,
                        height,
                        0,
                        gl_format.format,
                        gl_format.data_type,
                        data,
                    );
                }
            }

            if mipmapped {
                gl.generate_mipmap(target);
            }
            gl.bind_texture(target, None);
            handle
        };

        let texture = Self {
            ctx: ctx.clone(),
            name: desc.name,
            width: desc.width,
            height: desc.height,
            format,
            texture_type: desc.texture_type,
            layer_count,
            file_path: desc.file_path,
            handle: Some(handle),
            target,
        };
        ctx.check_error(&format!("create texture '{}'", texture.name))?;

        engine_debug!(
            "lumos::opengl::Texture",
            "Created '{}' ({}x{} {:?} {:?}, {} layer(s))",
            texture.name, texture.width, texture.height, format, texture.texture_type, layer_count
        );
        Ok(texture)
    }

    /// The default framebuffer's colour image
    pub(crate) fn default_framebuffer(ctx: Arc<GlContext>, width: u32, height: u32) -> Self {
        Self {
            ctx,
            name: "default_framebuffer".to_string(),
            width,
            height,
            format: TextureFormat::Screen,
            texture_type: TextureType::Swapchain,
            layer_count: 1,
            file_path: None,
            handle: None,
            target: glow::TEXTURE_2D,
        }
    }
}

impl Texture for GlTexture {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    fn layer_count(&self) -> u32 {
        self.layer_count
    }

    fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    fn bind(&self, slot: u32) {
        unsafe {
            self.ctx.gl.active_texture(glow::TEXTURE0 + slot);
            self.ctx.gl.bind_texture(self.target, self.handle);
        }
    }

    fn unbind(&self, slot: u32) {
        unsafe {
            self.ctx.gl.active_texture(glow::TEXTURE0 + slot);
            self.ctx.gl.bind_texture(self.target, None);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for GlTexture {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            unsafe { self.ctx.gl.delete_texture(handle) };
        }
    }
}
