/// Shader - OpenGL implementation of the Shader trait
///
/// Compiles every GLSL stage, links one program and routes each reflected
/// uniform block to its declared binding point. The immediate-mode
/// `set_*_uniform_buffer` calls upload into small per-block buffers owned by
/// the shader.

use glow::HasContext;
use lumos_engine::lumos::render::{
    Shader, ShaderCode, ShaderDesc, ShaderReflection, ShaderType, ShaderUniformBufferDeclaration,
};
use lumos_engine::lumos::{Error, Result};
use lumos_engine::{engine_debug, engine_error, engine_warn};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::gl_context::GlContext;
use crate::gl_format::shader_type_to_gl;

pub struct GlShader {
    ctx: Arc<GlContext>,
    name: String,
    file_path: PathBuf,
    stages: Vec<ShaderType>,
    pub(crate) program: glow::NativeProgram,
    reflection: ShaderReflection,
    /// Buffers backing `set_*_uniform_buffer`, by binding point
    block_buffers: Mutex<FxHashMap<u32, glow::NativeBuffer>>,
}

impl GlShader {
    pub(crate) fn create(ctx: Arc<GlContext>, desc: ShaderDesc) -> Result<Self> {
        if let Some((stage, _)) = desc.stages.iter().find(|(_, code)| matches!(code, ShaderCode::SpirV(_))) {
            engine_error!("lumos::opengl::Shader", "Shader '{}': {:?} stage is SPIR-V, OpenGL needs GLSL", desc.name, stage);
            return Err(Error::InvalidResource(format!("shader '{}' has a SPIR-V stage", desc.name)));
        }

        let sources = desc.glsl_sources();
        if sources.is_empty() {
            engine_error!("lumos::opengl::Shader", "Shader '{}' has no stages", desc.name);
            return Err(Error::InvalidResource(format!("shader '{}' has no stages", desc.name)));
        }

        let reflection = ShaderReflection::from_sources(&sources);
        let gl = &ctx.gl;

        let mut compiled = Vec::with_capacity(sources.len());
        for (stage, source) in &sources {
            match compile_stage(gl, &desc.name, *stage, source) {
                Ok(shader) => compiled.push(shader),
                Err(e) => {
                    for shader in compiled {
                        unsafe { gl.delete_shader(shader) };
                    }
                    return Err(e);
                }
            }
        }

        let program = unsafe {
            let program = match gl.create_program() {
                Ok(program) => program,
                Err(e) => {
                    for shader in compiled {
                        gl.delete_shader(shader);
                    }
                    return Err(crate::gl_failure(format!("glCreateProgram '{}': {}", desc.name, e), file!(), line!()));
                }
            };
            for shader in &compiled {
                gl.attach_shader(program, *shader);
            }
            gl.link_program(program);
            let linked = gl.get_program_link_status(program);
            for shader in compiled {
                gl.detach_shader(program, shader);
                gl.delete_shader(shader);
            }
            if !linked {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                engine_error!("lumos::opengl::Shader", "Shader '{}' failed to link:\n{}", desc.name, log);
                return Err(Error::InvalidResource(format!("shader '{}' failed to link", desc.name)));
            }
            program
        };

        let shader = Self {
            ctx: ctx.clone(),
            name: desc.name,
            file_path: desc.file_path,
            stages: sources.keys().copied().collect(),
            program,
            reflection,
            block_buffers: Mutex::new(FxHashMap::default()),
        };
        shader.bind_uniform_blocks();
        ctx.check_error(&format!("create shader '{}'", shader.name))?;

        engine_debug!("lumos::opengl::Shader", "Linked '{}' ({:?})", shader.name, shader.stages);
        Ok(shader)
    }

    fn declared_blocks(&self) -> impl Iterator<Item = &ShaderUniformBufferDeclaration> {
        self.stages.iter().flat_map(|stage| {
            self.reflection
                .system_uniform_buffers(*stage)
                .iter()
                .chain(self.reflection.user_uniform_buffer(*stage))
        })
    }

    /// Point every reflected block at its `layout(binding = N)`
    fn bind_uniform_blocks(&self) {
        let gl = &self.ctx.gl;
        for block in self.declared_blocks() {
            let Some(binding) = block.binding else {
                engine_warn!("lumos::opengl::Shader", "Shader '{}': block '{}' has no binding", self.name, block.name);
                continue;
            };
            match unsafe { gl.get_uniform_block_index(self.program, &block.name) } {
                Some(index) => unsafe { gl.uniform_block_binding(self.program, index, binding) },
                // Blocks the linker optimized away
                None => engine_debug!("lumos::opengl::Shader", "Shader '{}': block '{}' is inactive", self.name, block.name),
            }
        }
    }

    /// Copy `data` into the buffer behind `block` and bind it
    fn upload_block(&self, block: &ShaderUniformBufferDeclaration, data: &[u8]) -> Result<()> {
        let Some(binding) = block.binding else {
            engine_error!("lumos::opengl::Shader", "Shader '{}': block '{}' has no binding", self.name, block.name);
            return Err(Error::InvalidResource(format!("uniform block '{}' has no binding", block.name)));
        };

        let mut buffers = self.block_buffers.lock().map_err(|_| {
            lumos_engine::engine_err!("lumos::opengl::Shader", "Uniform block lock poisoned")
        })?;
        let gl = &self.ctx.gl;
        let buffer = match buffers.get(&binding) {
            Some(buffer) => *buffer,
            None => unsafe {
                let buffer = gl_check!(gl.create_buffer(), "glGenBuffers for block '{}'", block.name)?;
                gl.bind_buffer(glow::UNIFORM_BUFFER, Some(buffer));
                gl.buffer_data_size(glow::UNIFORM_BUFFER, block.size as i32, glow::DYNAMIC_DRAW);
                buffers.insert(binding, buffer);
                buffer
            },
        };

        let len = data.len().min(block.size as usize);
        unsafe {
            gl.bind_buffer(glow::UNIFORM_BUFFER, Some(buffer));
            gl.buffer_sub_data_u8_slice(glow::UNIFORM_BUFFER, 0, &data[..len]);
            gl.bind_buffer(glow::UNIFORM_BUFFER, None);
            gl.bind_buffer_base(glow::UNIFORM_BUFFER, binding, Some(buffer));
        }
        Ok(())
    }
}

fn compile_stage(gl: &glow::Context, name: &str, stage: ShaderType, source: &str) -> Result<glow::NativeShader> {
    unsafe {
        let shader = gl_check!(gl.create_shader(shader_type_to_gl(stage)), "glCreateShader '{}' {:?}", name, stage)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            engine_error!("lumos::opengl::Shader", "Shader '{}': {:?} stage failed to compile:\n{}", name, stage, log);
            return Err(Error::InvalidResource(format!("shader '{}' {:?} stage failed to compile", name, stage)));
        }
        Ok(shader)
    }
}

impl Shader for GlShader {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn shader_types(&self) -> Vec<ShaderType> {
        self.stages.clone()
    }

    fn reflection(&self) -> &ShaderReflection {
        &self.reflection
    }

    fn bind(&self) {
        unsafe { self.ctx.gl.use_program(Some(self.program)) };
    }

    fn unbind(&self) {
        unsafe { self.ctx.gl.use_program(None) };
    }

    /// `data` holds the stage's system blocks back to back, in declaration order
    fn set_system_uniform_buffer(&self, stage: ShaderType, data: &[u8]) {
        let mut offset = 0usize;
        for block in self.reflection.system_uniform_buffers(stage) {
            if offset >= data.len() {
                break;
            }
            let end = (offset + block.size as usize).min(data.len());
            if let Err(e) = self.upload_block(block, &data[offset..end]) {
                engine_error!("lumos::opengl::Shader", "Shader '{}': system block '{}' not uploaded: {}", self.name, block.name, e);
            }
            offset = end;
        }
    }

    /// Writes the block's own buffer and binds it at once, outside any
    /// recorded command list
    fn set_user_uniform_buffer(&self, stage: ShaderType, data: &[u8]) {
        match self.reflection.user_uniform_buffer(stage) {
            Some(block) => {
                if let Err(e) = self.upload_block(block, data) {
                    engine_error!("lumos::opengl::Shader", "Shader '{}': user block '{}' not uploaded: {}", self.name, block.name, e);
                }
            }
            None => engine_warn!("lumos::opengl::Shader", "Shader '{}' has no user uniform buffer for {:?}", self.name, stage),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for GlShader {
    fn drop(&mut self) {
        unsafe {
            if let Ok(buffers) = self.block_buffers.get_mut() {
                for (_, buffer) in buffers.drain() {
                    self.ctx.gl.delete_buffer(buffer);
                }
            }
            self.ctx.gl.delete_program(self.program);
        }
    }
}
