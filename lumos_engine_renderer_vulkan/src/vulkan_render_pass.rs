/// RenderPass - Vulkan implementation of the RenderPass trait
///
/// Single subpass. Attachments keep the order they were declared in, which is
/// also the order framebuffer views must follow. Every attachment starts and
/// ends in its resting layout so it can be sampled by a later pass.

use ash::vk;
use lumos_engine::lumos::{Error, Result};
use lumos_engine::lumos::render::{AttachmentInfo, RenderPass, RenderPassInfo};
use lumos_engine::{engine_debug, engine_error};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{resting_layout, texture_format_to_vk};

/// Vulkan render pass implementation
pub struct VulkanRenderPass {
    ctx: Arc<GpuContext>,
    pub(crate) render_pass: vk::RenderPass,
    attachments: Vec<AttachmentInfo>,
    clear: bool,
}

impl VulkanRenderPass {
    pub(crate) fn create(ctx: Arc<GpuContext>, info: &RenderPassInfo) -> Result<Self> {
        let depth_count = info.attachments.iter().filter(|a| a.is_depth()).count();
        if info.attachments.is_empty() || depth_count > 1 {
            engine_error!(
                "lumos::vulkan::RenderPass",
                "Render pass needs at least one attachment and at most one depth ({} attachments, {} depth)",
                info.attachments.len(), depth_count
            );
            return Err(Error::InvalidResource("invalid render pass attachment list".to_string()));
        }

        let load_op = if info.clear { vk::AttachmentLoadOp::CLEAR } else { vk::AttachmentLoadOp::LOAD };

        let mut descriptions = Vec::with_capacity(info.attachments.len());
        let mut colour_refs = Vec::new();
        let mut depth_ref: Option<vk::AttachmentReference> = None;

        for (index, attachment) in info.attachments.iter().enumerate() {
            let layout = resting_layout(attachment.texture_type, attachment.format);
            // Contents are discarded anyway when clearing
            let initial_layout = if info.clear { vk::ImageLayout::UNDEFINED } else { layout };

            descriptions.push(
                vk::AttachmentDescription::default()
                    .format(texture_format_to_vk(attachment.format, ctx.surface_format.format))
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .load_op(load_op)
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(initial_layout)
                    .final_layout(layout),
            );

            if attachment.is_depth() {
                depth_ref = Some(
                    vk::AttachmentReference::default()
                        .attachment(index as u32)
                        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
                );
            } else {
                colour_refs.push(
                    vk::AttachmentReference::default()
                        .attachment(index as u32)
                        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
                );
            }
        }

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&colour_refs);
        if let Some(ref depth) = depth_ref {
            subpass = subpass.depth_stencil_attachment(depth);
        }

        let (stage_mask, access_mask) = if depth_ref.is_some() {
            (
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                    | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
        } else {
            (
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            )
        };

        // Previous sampling must finish before we write; our writes must land
        // before the next pass samples.
        let dependencies = [
            vk::SubpassDependency::default()
                .src_subpass(vk::SUBPASS_EXTERNAL)
                .dst_subpass(0)
                .src_stage_mask(stage_mask | vk::PipelineStageFlags::FRAGMENT_SHADER)
                .src_access_mask(vk::AccessFlags::SHADER_READ)
                .dst_stage_mask(stage_mask)
                .dst_access_mask(access_mask),
            vk::SubpassDependency::default()
                .src_subpass(0)
                .dst_subpass(vk::SUBPASS_EXTERNAL)
                .src_stage_mask(stage_mask)
                .src_access_mask(access_mask)
                .dst_stage_mask(vk::PipelineStageFlags::FRAGMENT_SHADER)
                .dst_access_mask(vk::AccessFlags::SHADER_READ),
        ];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&descriptions)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(&dependencies);

        let render_pass = unsafe { vk_check!(ctx.device.create_render_pass(&create_info, None), "vkCreateRenderPass")? };

        engine_debug!(
            "lumos::vulkan::RenderPass",
            "Created render pass ({} colour, {} depth, clear={})",
            colour_refs.len(), depth_count, info.clear
        );

        Ok(Self {
            ctx,
            render_pass,
            attachments: info.attachments.clone(),
            clear: info.clear,
        })
    }
}

impl RenderPass for VulkanRenderPass {
    fn attachments(&self) -> &[AttachmentInfo] {
        &self.attachments
    }

    fn clears(&self) -> bool {
        self.clear
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanRenderPass {
    fn drop(&mut self) {
        unsafe { self.ctx.device.destroy_render_pass(self.render_pass, None) };
    }
}
