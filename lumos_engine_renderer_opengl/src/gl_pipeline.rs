/// Pipeline - OpenGL implementation of the Pipeline trait
///
/// A linked program, a vertex array holding the attribute formats and the
/// fixed-function state applied when the pipeline is bound. Push constants
/// are emulated with a uniform buffer at `PUSH_CONSTANT_BINDING`.

use glow::HasContext;
use lumos_engine::lumos::render::{
    DescriptorLayout, DescriptorSet, DescriptorType, Pipeline, PipelineId, PipelineInfo,
    PushConstantRange, Shader, VertexLayout,
};
use lumos_engine::lumos::{Error, Result};
use lumos_engine::{engine_debug, engine_error, engine_warn};
use std::any::Any;
use std::sync::Arc;

use crate::gl_context::GlContext;
use crate::gl_descriptor_set::GlDescriptorSet;
use crate::gl_format::{cull_mode_to_gl, vertex_format_to_gl};
use crate::gl_shader::GlShader;

/// Uniform binding point of the block standing in for push constants
pub const PUSH_CONSTANT_BINDING: u32 = 4;

/// State applied by a bind-pipeline command
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GlPipelineState {
    pub program: glow::NativeProgram,
    pub vertex_array: glow::NativeVertexArray,
    pub stride: i32,
    /// Culled face, None when culling is off
    pub cull_face: Option<u32>,
    pub depth_test: bool,
    pub depth_bias: bool,
    pub blend: bool,
    pub wireframe: bool,
    pub push_constants: Option<glow::NativeBuffer>,
}

/// Bytes needed to hold every push constant range
pub(crate) fn push_constant_size(ranges: &[PushConstantRange]) -> u32 {
    ranges.iter().map(|r| r.offset + r.size).max().unwrap_or(0)
}

/// Dynamic uniform buffers declared by one descriptor layout
pub(crate) fn dynamic_count(layout: Option<&DescriptorLayout>) -> u32 {
    layout.map_or(0, |layout| {
        layout
            .bindings
            .iter()
            .filter(|b| b.descriptor_type == DescriptorType::UniformBufferDynamic)
            .count() as u32
    })
}

pub struct GlPipeline {
    ctx: Arc<GlContext>,
    id: PipelineId,
    name: String,
    shader: Arc<dyn Shader>,
    pub(crate) state: GlPipelineState,
    pub(crate) layouts: Vec<DescriptorLayout>,
    pub(crate) push_constant_size: u32,
    descriptor_set: Arc<dyn DescriptorSet>,
}

impl GlPipeline {
    pub(crate) fn create(ctx: Arc<GlContext>, info: PipelineInfo) -> Result<Self> {
        let program = info
            .shader
            .as_any()
            .downcast_ref::<GlShader>()
            .ok_or_else(|| {
                engine_error!("lumos::opengl::Pipeline", "Pipeline '{}': shader '{}' is not an OpenGL shader", info.name, info.shader.name());
                Error::InvalidResource(format!("pipeline '{}' has a foreign shader", info.name))
            })?
            .program;

        let colour_count = info.render_pass.colour_attachment_count() as u32;
        if info.colour_attachment_count != colour_count {
            engine_warn!(
                "lumos::opengl::Pipeline",
                "Pipeline '{}' declares {} colour attachment(s), render pass has {}",
                info.name, info.colour_attachment_count, colour_count
            );
        }

        let gl = &ctx.gl;
        let vertex_array = create_vertex_array(&ctx, &info.name, &info.vertex_layout)?;

        let push_size = push_constant_size(&info.push_constants);
        let push_constants = if push_size > 0 {
            let buffer = unsafe {
                let buffer = match gl.create_buffer() {
                    Ok(buffer) => buffer,
                    Err(e) => {
                        gl.delete_vertex_array(vertex_array);
                        return Err(crate::gl_failure(format!("glGenBuffers push constants '{}': {}", info.name, e), file!(), line!()));
                    }
                };
                gl.bind_buffer(glow::UNIFORM_BUFFER, Some(buffer));
                gl.buffer_data_size(glow::UNIFORM_BUFFER, push_size as i32, glow::DYNAMIC_DRAW);
                gl.bind_buffer(glow::UNIFORM_BUFFER, None);
                buffer
            };
            Some(buffer)
        } else {
            None
        };

        let state = GlPipelineState {
            program,
            vertex_array,
            stride: info.vertex_layout.stride as i32,
            cull_face: cull_mode_to_gl(info.cull_mode),
            depth_test: info.render_pass.attachments().iter().any(|a| a.is_depth()),
            depth_bias: info.depth_bias_enabled,
            blend: info.transparency_enabled,
            wireframe: info.wireframe_enabled,
            push_constants,
        };

        let id = PipelineId::next();
        let descriptor_set: Arc<dyn DescriptorSet> =
            Arc::new(GlDescriptorSet::new(id, 0, dynamic_count(info.descriptor_layouts.first())));

        let pipeline = Self {
            ctx: ctx.clone(),
            id,
            name: info.name,
            shader: info.shader,
            state,
            layouts: info.descriptor_layouts,
            push_constant_size: push_size,
            descriptor_set,
        };
        ctx.check_error(&format!("create pipeline '{}'", pipeline.name))?;

        engine_debug!(
            "lumos::opengl::Pipeline",
            "Created '{}' ({} layout(s), {} push constant bytes)",
            pipeline.name, pipeline.layouts.len(), push_size
        );
        Ok(pipeline)
    }
}

/// Vertex array with one attribute format per layout entry, all on binding 0
fn create_vertex_array(ctx: &GlContext, name: &str, layout: &VertexLayout) -> Result<glow::NativeVertexArray> {
    let gl = &ctx.gl;
    unsafe {
        let vertex_array = gl_check!(gl.create_vertex_array(), "glGenVertexArrays '{}'", name)?;
        gl.bind_vertex_array(Some(vertex_array));
        for attribute in &layout.attributes {
            let (size, data_type, integer) = vertex_format_to_gl(attribute.format);
            gl.enable_vertex_attrib_array(attribute.location);
            if integer {
                gl.vertex_attrib_format_i32(attribute.location, size, data_type, attribute.offset);
            } else {
                gl.vertex_attrib_format_f32(attribute.location, size, data_type, false, attribute.offset);
            }
            gl.vertex_attrib_binding(attribute.location, 0);
        }
        gl.bind_vertex_array(None);
        Ok(vertex_array)
    }
}

impl Pipeline for GlPipeline {
    fn id(&self) -> PipelineId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn shader(&self) -> &Arc<dyn Shader> {
        &self.shader
    }

    fn descriptor_set(&self) -> &Arc<dyn DescriptorSet> {
        &self.descriptor_set
    }

    fn descriptor_layout_count(&self) -> usize {
        self.layouts.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for GlPipeline {
    fn drop(&mut self) {
        unsafe {
            if let Some(buffer) = self.state.push_constants.take() {
                self.ctx.gl.delete_buffer(buffer);
            }
            self.ctx.gl.delete_vertex_array(self.state.vertex_array);
        }
    }
}

#[cfg(test)]
#[path = "gl_pipeline_tests.rs"]
mod tests;
