/// CommandBuffer - Vulkan implementation of the NativeCommandBuffer trait
///
/// Each command buffer owns a small pool (so it can be reset on its own)
/// and a completion fence created signaled, so the first wait returns
/// immediately.

use ash::vk;
use lumos_engine::lumos::{Error, Result};
use lumos_engine::lumos::render::{
    Buffer, CommandBufferLevel, DescriptorSet, Framebuffer, IndexType, NativeCommandBuffer, Pipeline,
    RenderPass, ShaderType, SubpassContents,
};
use lumos_engine::engine_error;
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor_set::VulkanDescriptorSet;
use crate::vulkan_format::{index_type_to_vk, shader_stage_to_vk};
use crate::vulkan_frame_buffer::VulkanFramebuffer;
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_render_pass::VulkanRenderPass;

const SOURCE: &str = "lumos::vulkan::CommandBuffer";

fn foreign(what: &str) -> Error {
    engine_error!(SOURCE, "{} was not created by the Vulkan device", what);
    Error::InvalidResource(format!("{} is not a Vulkan object", what))
}

fn vk_render_pass(render_pass: &dyn RenderPass) -> Result<&VulkanRenderPass> {
    render_pass.as_any().downcast_ref::<VulkanRenderPass>().ok_or_else(|| foreign("render pass"))
}

fn vk_framebuffer(framebuffer: &dyn Framebuffer) -> Result<&VulkanFramebuffer> {
    framebuffer.as_any().downcast_ref::<VulkanFramebuffer>().ok_or_else(|| foreign("framebuffer"))
}

fn vk_pipeline(pipeline: &dyn Pipeline) -> Result<&VulkanPipeline> {
    pipeline.as_any().downcast_ref::<VulkanPipeline>().ok_or_else(|| foreign("pipeline"))
}

fn vk_buffer(buffer: &dyn Buffer) -> Result<&VulkanBuffer> {
    buffer.as_any().downcast_ref::<VulkanBuffer>().ok_or_else(|| foreign("buffer"))
}

/// Vulkan command buffer implementation
pub struct VulkanCommandBuffer {
    ctx: Arc<GpuContext>,
    level: CommandBufferLevel,
    pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,
    /// Signaled when the last submission of this buffer completes
    pub(crate) fence: vk::Fence,
    /// Submitted and not yet waited on
    pub(crate) pending: bool,
}

impl VulkanCommandBuffer {
    pub(crate) fn create(ctx: Arc<GpuContext>, level: CommandBufferLevel) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(ctx.graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe { vk_check!(ctx.device.create_command_pool(&pool_info, None), "vkCreateCommandPool")? };

        let mut command_buffer = Self {
            ctx,
            level,
            pool,
            command_buffer: vk::CommandBuffer::null(),
            fence: vk::Fence::null(),
            pending: false,
        };

        let vk_level = match level {
            CommandBufferLevel::Primary => vk::CommandBufferLevel::PRIMARY,
            CommandBufferLevel::Secondary => vk::CommandBufferLevel::SECONDARY,
        };
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk_level)
            .command_buffer_count(1);
        command_buffer.command_buffer = unsafe {
            vk_check!(
                command_buffer.ctx.device.allocate_command_buffers(&allocate_info),
                "vkAllocateCommandBuffers ({:?})",
                level
            )?[0]
        };

        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        command_buffer.fence =
            unsafe { vk_check!(command_buffer.ctx.device.create_fence(&fence_info, None), "vkCreateFence")? };

        Ok(command_buffer)
    }

    pub fn level(&self) -> CommandBufferLevel {
        self.level
    }

    fn reset(&self) -> Result<()> {
        unsafe {
            vk_check!(
                self.ctx.device.reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty()),
                "vkResetCommandBuffer"
            )
        }
    }
}

impl NativeCommandBuffer for VulkanCommandBuffer {
    fn begin(&mut self) -> Result<()> {
        self.reset()?;
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { vk_check!(self.ctx.device.begin_command_buffer(self.command_buffer, &begin_info), "vkBeginCommandBuffer") }
    }

    fn begin_secondary(&mut self, render_pass: &dyn RenderPass, framebuffer: &dyn Framebuffer) -> Result<()> {
        let render_pass = vk_render_pass(render_pass)?;
        let framebuffer = vk_framebuffer(framebuffer)?;
        self.reset()?;

        let inheritance = vk::CommandBufferInheritanceInfo::default()
            .render_pass(render_pass.render_pass)
            .subpass(0)
            .framebuffer(framebuffer.framebuffer);
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE | vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
            .inheritance_info(&inheritance);
        unsafe {
            vk_check!(
                self.ctx.device.begin_command_buffer(self.command_buffer, &begin_info),
                "vkBeginCommandBuffer (secondary)"
            )
        }
    }

    fn end(&mut self) -> Result<()> {
        unsafe { vk_check!(self.ctx.device.end_command_buffer(self.command_buffer), "vkEndCommandBuffer") }
    }

    fn submit(&mut self) -> Result<()> {
        let command_buffers = [self.command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        self.ctx.queue_submit(submit_info, self.fence)?;
        self.pending = true;
        Ok(())
    }

    fn wait_fence(&mut self) -> Result<()> {
        unsafe { vk_check!(self.ctx.device.wait_for_fences(&[self.fence], true, u64::MAX), "vkWaitForFences")? };
        self.pending = false;
        Ok(())
    }

    fn reset_fence(&mut self) -> Result<()> {
        unsafe { vk_check!(self.ctx.device.reset_fences(&[self.fence]), "vkResetFences") }
    }

    fn is_fence_signaled(&self) -> Result<bool> {
        unsafe { vk_check!(self.ctx.device.get_fence_status(self.fence), "vkGetFenceStatus") }
    }

    fn execute_secondary(&mut self, secondary: &dyn NativeCommandBuffer) -> Result<()> {
        let secondary = secondary
            .as_any()
            .downcast_ref::<VulkanCommandBuffer>()
            .ok_or_else(|| foreign("secondary command buffer"))?;
        unsafe {
            self.ctx.device.cmd_execute_commands(self.command_buffer, &[secondary.command_buffer]);
        }
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) -> Result<()> {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D { width, height },
        };
        unsafe {
            self.ctx.device.cmd_set_viewport(self.command_buffer, 0, &[viewport]);
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &[scissor]);
        }
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &dyn RenderPass,
        framebuffer: &dyn Framebuffer,
        clear_colour: [f32; 4],
        contents: SubpassContents,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let clear_values: Vec<vk::ClearValue> = render_pass
            .attachments()
            .iter()
            .map(|attachment| {
                if attachment.is_depth() {
                    vk::ClearValue {
                        depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
                    }
                } else {
                    vk::ClearValue {
                        color: vk::ClearColorValue { float32: clear_colour },
                    }
                }
            })
            .collect();

        let render_pass = vk_render_pass(render_pass)?;
        let framebuffer = vk_framebuffer(framebuffer)?;
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass.render_pass)
            .framebuffer(framebuffer.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D { width, height },
            })
            .clear_values(&clear_values);

        let vk_contents = match contents {
            SubpassContents::Inline => vk::SubpassContents::INLINE,
            SubpassContents::Secondary => vk::SubpassContents::SECONDARY_COMMAND_BUFFERS,
        };
        unsafe {
            self.ctx.device.cmd_begin_render_pass(self.command_buffer, &begin_info, vk_contents);
        }
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        unsafe { self.ctx.device.cmd_end_render_pass(self.command_buffer) };
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()> {
        let pipeline = vk_pipeline(pipeline)?;
        unsafe {
            self.ctx
                .device
                .cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
        }
        Ok(())
    }

    fn bind_descriptor_sets(
        &mut self,
        pipeline: &dyn Pipeline,
        first_set: u32,
        sets: &[&dyn DescriptorSet],
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        let pipeline = vk_pipeline(pipeline)?;
        let mut handles = Vec::with_capacity(sets.len());
        for set in sets {
            let set = set
                .as_any()
                .downcast_ref::<VulkanDescriptorSet>()
                .ok_or_else(|| foreign("descriptor set"))?;
            handles.push(set.set);
        }

        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.layout.pipeline_layout,
                first_set,
                &handles,
                dynamic_offsets,
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &dyn Buffer) -> Result<()> {
        let buffer = vk_buffer(buffer)?;
        unsafe {
            self.ctx.device.cmd_bind_vertex_buffers(self.command_buffer, 0, &[buffer.buffer], &[0]);
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &dyn Buffer, index_type: IndexType) -> Result<()> {
        let buffer = vk_buffer(buffer)?;
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(
                self.command_buffer,
                buffer.buffer,
                0,
                index_type_to_vk(index_type),
            );
        }
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32) -> Result<()> {
        unsafe {
            self.ctx.device.cmd_draw_indexed(self.command_buffer, index_count, 1, first_index, 0, 0);
        }
        Ok(())
    }

    fn push_constants(&mut self, pipeline: &dyn Pipeline, stage: ShaderType, offset: u32, data: &[u8]) -> Result<()> {
        let pipeline = vk_pipeline(pipeline)?;
        unsafe {
            self.ctx.device.cmd_push_constants(
                self.command_buffer,
                pipeline.layout.pipeline_layout,
                shader_stage_to_vk(stage),
                offset,
                data,
            );
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for VulkanCommandBuffer {
    fn drop(&mut self) {
        unsafe {
            if self.fence != vk::Fence::null() {
                // Never free a buffer the GPU may still be reading
                if self.pending {
                    let _ = self.ctx.device.wait_for_fences(&[self.fence], true, u64::MAX);
                }
                self.ctx.device.destroy_fence(self.fence, None);
            }
            // Destroying the pool frees the buffer
            self.ctx.device.destroy_command_pool(self.pool, None);
        }
    }
}
