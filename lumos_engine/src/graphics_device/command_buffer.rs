/// Command buffers and their completion fences
///
/// `CommandBuffer` owns the recording state machine
/// (`Idle -> Recording -> Recorded -> Submitted -> Idle`) and the
/// primary/secondary rules. Backends only implement `NativeCommandBuffer`,
/// which never sees an out-of-order call.
///
/// Misuse (recording a secondary as primary, executing a secondary into a
/// primary that is not recording, ...) is a programming error: it is logged
/// with file:line and the process panics.

use std::any::Any;
use crate::error::Result;
use crate::graphics_device::{
    first_role_mismatch, Buffer, DescriptorSet, Framebuffer, GraphicsDevice, IndexType, Pipeline,
    RenderPass, ShaderType, SubpassContents, Swapchain,
};

/// Primary buffers are submitted to a queue; secondary buffers are executed
/// from inside a primary buffer's render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferLevel {
    Primary,
    Secondary,
}

/// Recording state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferState {
    /// Ready to record (fence signaled and reset, or never submitted)
    Idle,
    Recording,
    /// Recording closed, waiting for submission or execution
    Recorded,
    /// Handed to the queue; becomes Idle once the fence has been waited on
    Submitted,
}

/// Backend command buffer
///
/// Owns one native recording handle and one fence created signaled.
/// Methods are only called in a valid state by `CommandBuffer`.
pub trait NativeCommandBuffer: Send + Sync {
    /// Open a one-time-submit primary recording scope
    fn begin(&mut self) -> Result<()>;

    /// Open a secondary recording scope that continues `render_pass` on `framebuffer`
    fn begin_secondary(&mut self, render_pass: &dyn RenderPass, framebuffer: &dyn Framebuffer) -> Result<()>;

    fn end(&mut self) -> Result<()>;

    /// Submit to the device queue, signalling this buffer's fence on completion
    fn submit(&mut self) -> Result<()>;

    /// Block until the fence signals (no timeout)
    fn wait_fence(&mut self) -> Result<()>;

    /// Return the fence to the unsignaled state
    fn reset_fence(&mut self) -> Result<()>;

    fn is_fence_signaled(&self) -> Result<bool>;

    /// Record execution of `secondary` into this (primary) buffer
    fn execute_secondary(&mut self, secondary: &dyn NativeCommandBuffer) -> Result<()>;

    /// Dynamic viewport and scissor covering `width`x`height`
    fn set_viewport(&mut self, width: u32, height: u32) -> Result<()>;

    fn begin_render_pass(
        &mut self,
        render_pass: &dyn RenderPass,
        framebuffer: &dyn Framebuffer,
        clear_colour: [f32; 4],
        contents: SubpassContents,
        width: u32,
        height: u32,
    ) -> Result<()>;

    fn end_render_pass(&mut self) -> Result<()>;

    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()>;

    fn bind_descriptor_sets(
        &mut self,
        pipeline: &dyn Pipeline,
        first_set: u32,
        sets: &[&dyn DescriptorSet],
        dynamic_offsets: &[u32],
    ) -> Result<()>;

    fn bind_vertex_buffer(&mut self, buffer: &dyn Buffer) -> Result<()>;

    fn bind_index_buffer(&mut self, buffer: &dyn Buffer, index_type: IndexType) -> Result<()>;

    fn draw_indexed(&mut self, index_count: u32, first_index: u32) -> Result<()>;

    fn push_constants(&mut self, pipeline: &dyn Pipeline, stage: ShaderType, offset: u32, data: &[u8]) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A primary or secondary command buffer with its recording state
pub struct CommandBuffer {
    level: CommandBufferLevel,
    state: CommandBufferState,
    /// Contents of the render pass open on this primary buffer
    render_pass: Option<SubpassContents>,
    native: Box<dyn NativeCommandBuffer>,
}

impl CommandBuffer {
    /// Allocate a native command buffer and its (signaled) fence from `device`
    pub fn init(device: &dyn GraphicsDevice, level: CommandBufferLevel) -> Result<Self> {
        let native = device.create_native_command_buffer(level)?;
        Ok(Self::from_native(level, native))
    }

    /// Wrap an already allocated native command buffer
    pub fn from_native(level: CommandBufferLevel, native: Box<dyn NativeCommandBuffer>) -> Self {
        Self {
            level,
            state: CommandBufferState::Idle,
            render_pass: None,
            native,
        }
    }

    pub fn level(&self) -> CommandBufferLevel {
        self.level
    }

    pub fn is_primary(&self) -> bool {
        self.level == CommandBufferLevel::Primary
    }

    pub fn state(&self) -> CommandBufferState {
        self.state
    }

    /// Contents of the open render pass, if any
    pub fn active_render_pass(&self) -> Option<SubpassContents> {
        self.render_pass
    }

    pub fn native(&self) -> &dyn NativeCommandBuffer {
        self.native.as_ref()
    }

    pub fn native_mut(&mut self) -> &mut dyn NativeCommandBuffer {
        self.native.as_mut()
    }

    /// Release the buffer for reuse: wait on its fence if it was submitted
    pub fn wait(&mut self) -> Result<()> {
        if self.state == CommandBufferState::Submitted {
            self.native.wait_fence()?;
            self.native.reset_fence()?;
            self.state = CommandBufferState::Idle;
        }
        Ok(())
    }

    fn assert_recording(&self, operation: &str) {
        crate::engine_assert!(
            self.state == CommandBufferState::Recording,
            "lumos::CommandBuffer",
            "{} requires a recording command buffer (state {:?})",
            operation,
            self.state
        );
    }

    // ===== RECORDING =====

    /// Open a one-time-submit recording scope (primary buffers only)
    pub fn begin_recording(&mut self) -> Result<()> {
        crate::engine_assert!(
            self.is_primary(),
            "lumos::CommandBuffer",
            "BeginRecording called on a secondary command buffer"
        );
        crate::engine_assert!(
            self.state != CommandBufferState::Recording,
            "lumos::CommandBuffer",
            "BeginRecording called while already recording"
        );

        self.wait()?;
        self.native.begin()?;
        self.state = CommandBufferState::Recording;
        Ok(())
    }

    /// Open a recording scope inheriting `render_pass` and `framebuffer`
    /// (secondary buffers only)
    pub fn begin_recording_secondary(&mut self, render_pass: &dyn RenderPass, framebuffer: &dyn Framebuffer) -> Result<()> {
        crate::engine_assert!(
            !self.is_primary(),
            "lumos::CommandBuffer",
            "BeginRecordingSecondary called on a primary command buffer"
        );
        crate::engine_assert!(
            self.state != CommandBufferState::Recording,
            "lumos::CommandBuffer",
            "BeginRecordingSecondary called while already recording"
        );

        self.native.begin_secondary(render_pass, framebuffer)?;
        self.state = CommandBufferState::Recording;
        Ok(())
    }

    /// Close the recording scope
    pub fn end_recording(&mut self) -> Result<()> {
        self.assert_recording("EndRecording");
        crate::engine_assert!(
            self.render_pass.is_none(),
            "lumos::CommandBuffer",
            "EndRecording called with a render pass still open"
        );

        self.native.end()?;
        self.state = CommandBufferState::Recorded;
        Ok(())
    }

    // ===== SUBMISSION =====

    /// Submit to the device queue (primary buffers only)
    ///
    /// With `wait_fence`, blocks until the GPU has finished the buffer and
    /// resets the fence before returning. Without it, the buffer stays
    /// `Submitted` and the next `begin_recording`/`wait` performs the wait.
    ///
    /// Neither form idles the device queue. Work submitted by other command
    /// buffers may still be in flight when this returns; callers that read
    /// back or destroy shared resources must wait on those buffers' fences
    /// or call `GraphicsDevice::wait_idle`.
    pub fn execute(&mut self, wait_fence: bool) -> Result<()> {
        crate::engine_assert!(
            self.is_primary(),
            "lumos::CommandBuffer",
            "Execute called on a secondary command buffer"
        );
        crate::engine_assert!(
            self.state == CommandBufferState::Recorded,
            "lumos::CommandBuffer",
            "Execute requires a recorded command buffer (state {:?})",
            self.state
        );

        if self.native.is_fence_signaled()? {
            self.native.reset_fence()?;
        }
        self.native.submit()?;
        self.state = CommandBufferState::Submitted;

        if wait_fence {
            self.wait()?;
        }
        Ok(())
    }

    /// Submit through the swapchain and present (primary buffers only)
    pub fn present(&mut self, swapchain: &mut dyn Swapchain) -> Result<()> {
        crate::engine_assert!(
            self.is_primary(),
            "lumos::CommandBuffer",
            "Present called on a secondary command buffer"
        );
        crate::engine_assert!(
            self.state == CommandBufferState::Recorded,
            "lumos::CommandBuffer",
            "Present requires a recorded command buffer (state {:?})",
            self.state
        );

        if self.native.is_fence_signaled()? {
            self.native.reset_fence()?;
        }
        swapchain.present(self.native.as_mut())?;
        self.state = CommandBufferState::Submitted;
        Ok(())
    }

    /// Inject this secondary buffer's commands into `primary`
    ///
    /// `primary` must be recording inside a render pass opened with
    /// `SubpassContents::Secondary`.
    pub fn execute_secondary(&mut self, primary: &mut CommandBuffer) -> Result<()> {
        crate::engine_assert!(
            !self.is_primary(),
            "lumos::CommandBuffer",
            "ExecuteSecondary called on a primary command buffer"
        );
        crate::engine_assert!(
            primary.is_primary(),
            "lumos::CommandBuffer",
            "ExecuteSecondary target is not a primary command buffer"
        );
        crate::engine_assert!(
            primary.state == CommandBufferState::Recording,
            "lumos::CommandBuffer",
            "ExecuteSecondary target primary command buffer is not recording (state {:?})",
            primary.state
        );
        crate::engine_assert!(
            primary.render_pass == Some(SubpassContents::Secondary),
            "lumos::CommandBuffer",
            "ExecuteSecondary requires the primary to be inside a render pass expecting secondary buffers"
        );
        crate::engine_assert!(
            self.state == CommandBufferState::Recorded,
            "lumos::CommandBuffer",
            "ExecuteSecondary requires a recorded secondary buffer (state {:?})",
            self.state
        );

        primary.native.execute_secondary(self.native.as_ref())?;
        // Secondaries are never waited on individually; the primary's fence covers them.
        self.state = CommandBufferState::Idle;
        Ok(())
    }

    // ===== COMMANDS =====

    /// Dynamic viewport + scissor; call after binding a target and before drawing
    pub fn update_viewport(&mut self, width: u32, height: u32) -> Result<()> {
        self.assert_recording("UpdateViewport");
        self.native.set_viewport(width, height)
    }

    pub fn begin_render_pass(
        &mut self,
        render_pass: &dyn RenderPass,
        framebuffer: &dyn Framebuffer,
        clear_colour: [f32; 4],
        contents: SubpassContents,
        width: u32,
        height: u32,
    ) -> Result<()> {
        crate::engine_assert!(
            self.is_primary(),
            "lumos::CommandBuffer",
            "BeginRenderpass called on a secondary command buffer"
        );
        self.assert_recording("BeginRenderpass");
        crate::engine_assert!(
            self.render_pass.is_none(),
            "lumos::CommandBuffer",
            "BeginRenderpass called inside an open render pass"
        );
        crate::engine_assert!(
            framebuffer.attachment_count() == render_pass.attachment_count(),
            "lumos::CommandBuffer",
            "Framebuffer has {} attachments, render pass expects {}",
            framebuffer.attachment_count(),
            render_pass.attachment_count()
        );
        let mismatch = first_role_mismatch(&framebuffer.depth_roles(), render_pass);
        crate::engine_assert!(
            mismatch.is_none(),
            "lumos::CommandBuffer",
            "Framebuffer attachment {:?} does not match the render pass attachment role",
            mismatch
        );

        self.native.begin_render_pass(render_pass, framebuffer, clear_colour, contents, width, height)?;
        self.render_pass = Some(contents);
        Ok(())
    }

    pub fn end_render_pass(&mut self) -> Result<()> {
        self.assert_recording("EndRenderpass");
        crate::engine_assert!(
            self.render_pass.is_some(),
            "lumos::CommandBuffer",
            "EndRenderpass called without an open render pass"
        );

        self.native.end_render_pass()?;
        self.render_pass = None;
        Ok(())
    }

    pub fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()> {
        self.assert_recording("BindPipeline");
        self.native.bind_pipeline(pipeline)
    }

    pub fn bind_descriptor_sets(
        &mut self,
        pipeline: &dyn Pipeline,
        first_set: u32,
        sets: &[&dyn DescriptorSet],
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        self.assert_recording("BindDescriptorSets");
        self.native.bind_descriptor_sets(pipeline, first_set, sets, dynamic_offsets)
    }

    pub fn bind_vertex_buffer(&mut self, buffer: &dyn Buffer) -> Result<()> {
        self.assert_recording("BindVertexBuffer");
        self.native.bind_vertex_buffer(buffer)
    }

    pub fn bind_index_buffer(&mut self, buffer: &dyn Buffer, index_type: IndexType) -> Result<()> {
        self.assert_recording("BindIndexBuffer");
        self.native.bind_index_buffer(buffer, index_type)
    }

    pub fn draw_indexed(&mut self, index_count: u32, first_index: u32) -> Result<()> {
        self.assert_recording("DrawIndexed");
        self.native.draw_indexed(index_count, first_index)
    }

    pub fn push_constants(&mut self, pipeline: &dyn Pipeline, stage: ShaderType, offset: u32, data: &[u8]) -> Result<()> {
        self.assert_recording("PushConstants");
        self.native.push_constants(pipeline, stage, offset, data)
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        // Native resources must not be freed while the GPU still reads them.
        if self.state == CommandBufferState::Submitted {
            let _ = self.native.wait_fence();
        }
    }
}

#[cfg(test)]
#[path = "command_buffer_tests.rs"]
mod tests;
