/// CommandBuffer - OpenGL implementation of the NativeCommandBuffer trait
///
/// GL executes immediately, so recording stores `GlCommand`s and `submit`
/// replays them on the context thread. Secondary buffers are spliced into
/// the primary when executed. The fence is a GL sync object inserted after
/// the replay.

use glow::HasContext;
use lumos_engine::lumos::render::{
    Buffer, DescriptorSet, Framebuffer, IndexType, NativeCommandBuffer, Pipeline, RenderPass,
    ShaderType, SubpassContents,
};
use lumos_engine::lumos::{Error, Result};
use lumos_engine::{engine_error, engine_warn};
use std::any::Any;
use std::sync::Arc;

use crate::gl_buffer::GlBuffer;
use crate::gl_context::GlContext;
use crate::gl_descriptor_set::{resolve_bindings, GlDescriptorSet};
use crate::gl_format::index_type_to_gl;
use crate::gl_frame_buffer::GlFramebuffer;
use crate::gl_pipeline::{GlPipeline, GlPipelineState, PUSH_CONSTANT_BINDING};
use crate::gl_render_pass::GlRenderPass;

/// One recorded GL operation
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GlCommand {
    SetViewport { width: u32, height: u32 },
    BeginRenderPass {
        /// None for the default framebuffer
        framebuffer: Option<glow::NativeFramebuffer>,
        clear_colour: Option<[f32; 4]>,
        clear_depth: bool,
        width: u32,
        height: u32,
    },
    EndRenderPass,
    BindPipeline(GlPipelineState),
    BindUniformBuffer { binding: u32, buffer: glow::NativeBuffer, offset: u64, size: u64 },
    BindTexture { unit: u32, target: u32, texture: glow::NativeTexture },
    BindVertexBuffer { buffer: glow::NativeBuffer, stride: i32 },
    BindIndexBuffer { buffer: glow::NativeBuffer },
    DrawIndexed { index_count: u32, element_type: u32, byte_offset: u32 },
    PushConstants { buffer: glow::NativeBuffer, offset: u32, data: Vec<u8> },
}

/// Issue `commands` in order
pub(crate) unsafe fn replay(gl: &glow::Context, commands: &[GlCommand]) {
    for command in commands {
        match command {
            GlCommand::SetViewport { width, height } => {
                gl.viewport(0, 0, *width as i32, *height as i32);
            }
            GlCommand::BeginRenderPass { framebuffer, clear_colour, clear_depth, width, height } => {
                gl.bind_framebuffer(glow::FRAMEBUFFER, *framebuffer);
                gl.viewport(0, 0, *width as i32, *height as i32);
                let mut mask = 0;
                if let Some([r, g, b, a]) = clear_colour {
                    gl.color_mask(true, true, true, true);
                    gl.clear_color(*r, *g, *b, *a);
                    mask |= glow::COLOR_BUFFER_BIT;
                }
                if *clear_depth {
                    gl.depth_mask(true);
                    gl.clear_depth_f32(1.0);
                    mask |= glow::DEPTH_BUFFER_BIT;
                }
                if mask != 0 {
                    gl.clear(mask);
                }
            }
            GlCommand::EndRenderPass => {
                gl.bind_vertex_array(None);
                gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            }
            GlCommand::BindPipeline(state) => apply_pipeline_state(gl, state),
            GlCommand::BindUniformBuffer { binding, buffer, offset, size } => {
                gl.bind_buffer_range(glow::UNIFORM_BUFFER, *binding, Some(*buffer), *offset as i32, *size as i32);
            }
            GlCommand::BindTexture { unit, target, texture } => {
                gl.active_texture(glow::TEXTURE0 + unit);
                gl.bind_texture(*target, Some(*texture));
            }
            GlCommand::BindVertexBuffer { buffer, stride } => {
                gl.bind_vertex_buffer(0, Some(*buffer), 0, *stride);
            }
            GlCommand::BindIndexBuffer { buffer } => {
                gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(*buffer));
            }
            GlCommand::DrawIndexed { index_count, element_type, byte_offset } => {
                gl.draw_elements(glow::TRIANGLES, *index_count as i32, *element_type, *byte_offset as i32);
            }
            GlCommand::PushConstants { buffer, offset, data } => {
                gl.bind_buffer(glow::UNIFORM_BUFFER, Some(*buffer));
                gl.buffer_sub_data_u8_slice(glow::UNIFORM_BUFFER, *offset as i32, data);
                gl.bind_buffer(glow::UNIFORM_BUFFER, None);
            }
        }
    }
}

unsafe fn apply_pipeline_state(gl: &glow::Context, state: &GlPipelineState) {
    gl.use_program(Some(state.program));
    gl.bind_vertex_array(Some(state.vertex_array));

    match state.cull_face {
        Some(face) => {
            gl.enable(glow::CULL_FACE);
            gl.cull_face(face);
            gl.front_face(glow::CCW);
        }
        None => gl.disable(glow::CULL_FACE),
    }

    if state.depth_test {
        gl.enable(glow::DEPTH_TEST);
        gl.depth_func(glow::LEQUAL);
        gl.depth_mask(true);
    } else {
        gl.disable(glow::DEPTH_TEST);
    }

    if state.depth_bias {
        gl.enable(glow::POLYGON_OFFSET_FILL);
        gl.polygon_offset(1.75, 1.25);
    } else {
        gl.disable(glow::POLYGON_OFFSET_FILL);
    }

    if state.blend {
        gl.enable(glow::BLEND);
        gl.blend_func_separate(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA, glow::ONE, glow::ZERO);
    } else {
        gl.disable(glow::BLEND);
    }

    gl.polygon_mode(glow::FRONT_AND_BACK, if state.wireframe { glow::LINE } else { glow::FILL });

    if let Some(buffer) = state.push_constants {
        gl.bind_buffer_base(glow::UNIFORM_BUFFER, PUSH_CONSTANT_BINDING, Some(buffer));
    }
}

/// GL sync object
struct GlSync(glow::NativeFence);

// Sync objects are created, waited on and deleted on the context thread only
unsafe impl Send for GlSync {}
unsafe impl Sync for GlSync {}

enum FenceState {
    Signaled,
    Unsignaled,
    Pending(GlSync),
}

fn sync_done(status: u32) -> bool {
    status == glow::ALREADY_SIGNALED || status == glow::CONDITION_SATISFIED
}

/// State tracked while recording, to fill in what GL needs at draw time
#[derive(Default)]
struct RecordState {
    stride: Option<i32>,
    index: Option<(u32, u32)>,
}

pub struct GlCommandBuffer {
    ctx: Arc<GlContext>,
    secondary: bool,
    pub(crate) commands: Vec<GlCommand>,
    record: RecordState,
    fence: FenceState,
}

impl GlCommandBuffer {
    pub(crate) fn new(ctx: Arc<GlContext>, secondary: bool) -> Self {
        Self {
            ctx,
            secondary,
            commands: Vec::new(),
            record: RecordState::default(),
            fence: FenceState::Signaled,
        }
    }

    pub fn is_secondary(&self) -> bool {
        self.secondary
    }

    fn reset_recording(&mut self) {
        self.commands.clear();
        self.record = RecordState::default();
    }
}

fn foreign(what: &str) -> Error {
    engine_error!("lumos::opengl::CommandBuffer", "{} was not created by the OpenGL device", what);
    Error::InvalidResource(format!("{} is not an OpenGL object", what))
}

fn gl_pipeline(pipeline: &dyn Pipeline) -> Result<&GlPipeline> {
    pipeline.as_any().downcast_ref::<GlPipeline>().ok_or_else(|| foreign("pipeline"))
}

fn gl_buffer(buffer: &dyn Buffer) -> Result<&GlBuffer> {
    buffer.as_any().downcast_ref::<GlBuffer>().ok_or_else(|| foreign("buffer"))
}

impl NativeCommandBuffer for GlCommandBuffer {
    fn begin(&mut self) -> Result<()> {
        self.reset_recording();
        Ok(())
    }

    fn begin_secondary(&mut self, _render_pass: &dyn RenderPass, _framebuffer: &dyn Framebuffer) -> Result<()> {
        if !self.secondary {
            engine_error!("lumos::opengl::CommandBuffer", "begin_secondary on a primary command buffer");
            return Err(Error::InvalidResource("begin_secondary on a primary command buffer".to_string()));
        }
        // The primary has already bound the framebuffer
        self.reset_recording();
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }

    fn submit(&mut self) -> Result<()> {
        if let FenceState::Pending(sync) = std::mem::replace(&mut self.fence, FenceState::Unsignaled) {
            engine_warn!("lumos::opengl::CommandBuffer", "Submitting with an unwaited fence");
            unsafe { self.ctx.gl.delete_sync(sync.0) };
        }

        let gl = &self.ctx.gl;
        unsafe { replay(gl, &self.commands) };
        self.ctx.check_error("command buffer replay")?;

        let sync = unsafe { gl_check!(gl.fence_sync(glow::SYNC_GPU_COMMANDS_COMPLETE, 0), "glFenceSync")? };
        self.fence = FenceState::Pending(GlSync(sync));
        Ok(())
    }

    fn wait_fence(&mut self) -> Result<()> {
        let FenceState::Pending(sync) = std::mem::replace(&mut self.fence, FenceState::Signaled) else {
            return Ok(());
        };

        let gl = &self.ctx.gl;
        let result = loop {
            // Timeout in nanoseconds; loop until the GPU is done
            let status = unsafe { gl.client_wait_sync(sync.0, glow::SYNC_FLUSH_COMMANDS_BIT, 1_000_000_000) };
            if sync_done(status) {
                break Ok(());
            }
            if status == glow::WAIT_FAILED {
                break Err(crate::gl_failure("glClientWaitSync".to_string(), file!(), line!()));
            }
        };
        unsafe { gl.delete_sync(sync.0) };
        result
    }

    fn reset_fence(&mut self) -> Result<()> {
        if let FenceState::Pending(sync) = std::mem::replace(&mut self.fence, FenceState::Unsignaled) {
            engine_warn!("lumos::opengl::CommandBuffer", "Resetting a fence that was never waited on");
            unsafe { self.ctx.gl.delete_sync(sync.0) };
        }
        Ok(())
    }

    fn is_fence_signaled(&self) -> Result<bool> {
        Ok(match &self.fence {
            FenceState::Signaled => true,
            FenceState::Unsignaled => false,
            FenceState::Pending(sync) => sync_done(unsafe { self.ctx.gl.client_wait_sync(sync.0, 0, 0) }),
        })
    }

    fn execute_secondary(&mut self, secondary: &dyn NativeCommandBuffer) -> Result<()> {
        let secondary = secondary
            .as_any()
            .downcast_ref::<GlCommandBuffer>()
            .ok_or_else(|| foreign("secondary command buffer"))?;
        if !secondary.is_secondary() {
            engine_error!("lumos::opengl::CommandBuffer", "execute_secondary given a primary command buffer");
            return Err(Error::InvalidResource("execute_secondary given a primary command buffer".to_string()));
        }
        self.commands.extend(secondary.commands.iter().cloned());
        // Pipeline and buffers are whatever the secondary left bound
        self.record = RecordState::default();
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) -> Result<()> {
        self.commands.push(GlCommand::SetViewport { width, height });
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &dyn RenderPass,
        framebuffer: &dyn Framebuffer,
        clear_colour: [f32; 4],
        _contents: SubpassContents,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let gl_framebuffer = framebuffer
            .as_any()
            .downcast_ref::<GlFramebuffer>()
            .ok_or_else(|| foreign("framebuffer"))?;

        let render_pass = render_pass
            .as_any()
            .downcast_ref::<GlRenderPass>()
            .ok_or_else(|| foreign("render pass"))?;

        let clears = render_pass.clears();
        let has_colour = render_pass.colour_attachment_count() > 0;
        let has_depth = render_pass.has_depth();
        self.commands.push(GlCommand::BeginRenderPass {
            framebuffer: gl_framebuffer.handle,
            clear_colour: (clears && has_colour).then_some(clear_colour),
            clear_depth: clears && has_depth,
            width,
            height,
        });
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.commands.push(GlCommand::EndRenderPass);
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()> {
        let pipeline = gl_pipeline(pipeline)?;
        self.record.stride = Some(pipeline.state.stride);
        self.commands.push(GlCommand::BindPipeline(pipeline.state));
        Ok(())
    }

    fn bind_descriptor_sets(
        &mut self,
        _pipeline: &dyn Pipeline,
        _first_set: u32,
        sets: &[&dyn DescriptorSet],
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        let mut offsets = dynamic_offsets.iter();
        for set in sets {
            let set = set
                .as_any()
                .downcast_ref::<GlDescriptorSet>()
                .ok_or_else(|| foreign("descriptor set"))?;
            let commands = resolve_bindings(&set.bindings()?, &mut offsets)?;
            self.commands.extend(commands);
        }
        if offsets.len() > 0 {
            engine_warn!("lumos::opengl::CommandBuffer", "{} unused dynamic offset(s)", offsets.len());
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &dyn Buffer) -> Result<()> {
        let buffer = gl_buffer(buffer)?;
        let Some(stride) = self.record.stride else {
            engine_error!("lumos::opengl::CommandBuffer", "Vertex buffer bound before a pipeline");
            return Err(Error::InvalidResource("vertex buffer bound before a pipeline".to_string()));
        };
        self.commands.push(GlCommand::BindVertexBuffer { buffer: buffer.handle, stride });
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &dyn Buffer, index_type: IndexType) -> Result<()> {
        let buffer = gl_buffer(buffer)?;
        self.record.index = Some((index_type_to_gl(index_type), index_type.size_bytes()));
        self.commands.push(GlCommand::BindIndexBuffer { buffer: buffer.handle });
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32) -> Result<()> {
        let Some((element_type, index_size)) = self.record.index else {
            engine_error!("lumos::opengl::CommandBuffer", "DrawIndexed without an index buffer");
            return Err(Error::InvalidResource("draw without an index buffer".to_string()));
        };
        self.commands.push(GlCommand::DrawIndexed {
            index_count,
            element_type,
            byte_offset: first_index * index_size,
        });
        Ok(())
    }

    fn push_constants(&mut self, pipeline: &dyn Pipeline, _stage: ShaderType, offset: u32, data: &[u8]) -> Result<()> {
        let pipeline = gl_pipeline(pipeline)?;
        let Some(buffer) = pipeline.state.push_constants else {
            engine_error!("lumos::opengl::CommandBuffer", "Pipeline '{}' declares no push constants", pipeline.name());
            return Err(Error::InvalidResource(format!("pipeline '{}' has no push constants", pipeline.name())));
        };
        if offset as usize + data.len() > pipeline.push_constant_size as usize {
            engine_error!(
                "lumos::opengl::CommandBuffer",
                "Push constants {}+{} exceed {} bytes for '{}'",
                offset, data.len(), pipeline.push_constant_size, pipeline.name()
            );
            return Err(Error::InvalidResource("push constant range out of bounds".to_string()));
        }
        self.commands.push(GlCommand::PushConstants { buffer, offset, data: data.to_vec() });
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for GlCommandBuffer {
    fn drop(&mut self) {
        if let FenceState::Pending(sync) = std::mem::replace(&mut self.fence, FenceState::Signaled) {
            unsafe { self.ctx.gl.delete_sync(sync.0) };
        }
    }
}
