/// Buffer - OpenGL implementation of the Buffer and UniformBuffer traits
///
/// Storage is allocated once with `glBufferData`; updates go through
/// `GL_COPY_WRITE_BUFFER` so no vertex array or uniform binding is disturbed.

use glow::HasContext;
use lumos_engine::lumos::render::{
    check_buffer_range, Buffer, BufferDesc, BufferUsage, UniformBuffer, UniformBufferDesc,
};
use lumos_engine::lumos::Result;
use std::any::Any;
use std::sync::Arc;

use crate::gl_context::GlContext;

fn allocate(ctx: &GlContext, name: &str, size: u64) -> Result<glow::NativeBuffer> {
    let gl = &ctx.gl;
    let handle = unsafe {
        let handle = gl_check!(gl.create_buffer(), "glGenBuffers '{}'", name)?;
        gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(handle));
        gl.buffer_data_size(glow::COPY_WRITE_BUFFER, size as i32, glow::DYNAMIC_DRAW);
        gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        handle
    };
    if let Err(e) = ctx.check_error(&format!("allocate buffer '{}' ({} bytes)", name, size)) {
        unsafe { gl.delete_buffer(handle) };
        return Err(e);
    }
    Ok(handle)
}

fn write(ctx: &GlContext, source: &str, handle: glow::NativeBuffer, size: u64, offset: u64, data: &[u8]) -> Result<()> {
    check_buffer_range(source, size, offset, data.len())?;
    unsafe {
        ctx.gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(handle));
        ctx.gl.buffer_sub_data_u8_slice(glow::COPY_WRITE_BUFFER, offset as i32, data);
        ctx.gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
    }
    Ok(())
}

// ===== VERTEX / INDEX BUFFER =====

pub struct GlBuffer {
    ctx: Arc<GlContext>,
    pub(crate) handle: glow::NativeBuffer,
    size: u64,
    usage: BufferUsage,
}

impl GlBuffer {
    pub(crate) fn create(ctx: Arc<GlContext>, desc: BufferDesc) -> Result<Self> {
        let handle = allocate(&ctx, &desc.name, desc.size)?;
        let buffer = Self { ctx, handle, size: desc.size, usage: desc.usage };
        if let Some(data) = &desc.data {
            buffer.update(0, data)?;
        }
        Ok(buffer)
    }
}

impl Buffer for GlBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        write(&self.ctx, "lumos::opengl::Buffer", self.handle, self.size, offset, data)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for GlBuffer {
    fn drop(&mut self) {
        unsafe { self.ctx.gl.delete_buffer(self.handle) };
    }
}

// ===== UNIFORM BUFFER =====

pub struct GlUniformBuffer {
    ctx: Arc<GlContext>,
    pub(crate) handle: glow::NativeBuffer,
    size: u64,
    dynamic: bool,
}

impl GlUniformBuffer {
    pub(crate) fn create(ctx: Arc<GlContext>, desc: UniformBufferDesc) -> Result<Self> {
        let handle = allocate(&ctx, &desc.name, desc.size)?;
        let buffer = Self { ctx, handle, size: desc.size, dynamic: desc.dynamic };
        if let Some(data) = &desc.data {
            buffer.update(0, data)?;
        }
        Ok(buffer)
    }
}

impl UniformBuffer for GlUniformBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        write(&self.ctx, "lumos::opengl::UniformBuffer", self.handle, self.size, offset, data)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for GlUniformBuffer {
    fn drop(&mut self) {
        unsafe { self.ctx.gl.delete_buffer(self.handle) };
    }
}
