/// Framebuffer - Vulkan implementation of the Framebuffer trait
///
/// Holds its attachment textures alive. Cube faces and array layers get a
/// single-layer view that the framebuffer owns.

use ash::vk;
use lumos_engine::lumos::{Error, Result};
use lumos_engine::lumos::render::{
    AttachmentKind, Framebuffer, FramebufferAttachment, FramebufferInfo, Texture,
};
use lumos_engine::{engine_debug, engine_error};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_texture::VulkanTexture;

/// Vulkan framebuffer implementation
pub struct VulkanFramebuffer {
    ctx: Arc<GpuContext>,
    pub(crate) framebuffer: vk::Framebuffer,
    /// Views created for this framebuffer only
    owned_views: Vec<vk::ImageView>,
    attachments: Vec<FramebufferAttachment>,
    width: u32,
    height: u32,
    clear_colour: [f32; 4],
    screen: bool,
}

pub(crate) fn downcast_texture<'a>(texture: &'a dyn Texture, source: &str) -> Result<&'a VulkanTexture> {
    texture.as_any().downcast_ref::<VulkanTexture>().ok_or_else(|| {
        engine_error!(source, "Texture '{}' was not created by the Vulkan device", texture.name());
        Error::InvalidResource(format!("texture '{}' is not a Vulkan texture", texture.name()))
    })
}

impl VulkanFramebuffer {
    pub(crate) fn create(ctx: Arc<GpuContext>, info: FramebufferInfo) -> Result<Self> {
        let render_pass = info
            .render_pass
            .as_any()
            .downcast_ref::<VulkanRenderPass>()
            .ok_or_else(|| {
                engine_error!("lumos::vulkan::Framebuffer", "Framebuffer '{}': render pass is not a Vulkan render pass", info.name);
                Error::InvalidResource(format!("framebuffer '{}' has a foreign render pass", info.name))
            })?
            .render_pass;

        let mut framebuffer = Self {
            ctx,
            framebuffer: vk::Framebuffer::null(),
            owned_views: Vec::new(),
            attachments: Vec::new(),
            width: info.width,
            height: info.height,
            clear_colour: info.clear_colour,
            screen: info.screen,
        };

        let mut views = Vec::with_capacity(info.attachments.len());
        for attachment in &info.attachments {
            let texture = downcast_texture(attachment.texture.as_ref(), "lumos::vulkan::Framebuffer")?;
            let single_layer = matches!(attachment.kind, AttachmentKind::CubeFace | AttachmentKind::ArrayLayer)
                || texture.layer_count() > 1;

            if single_layer {
                let view = texture.create_layer_view(attachment.layer)?;
                framebuffer.owned_views.push(view);
                views.push(view);
            } else {
                views.push(texture.view);
            }
        }

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&views)
            .width(info.width)
            .height(info.height)
            .layers(1);

        framebuffer.framebuffer = unsafe {
            vk_check!(
                framebuffer.ctx.device.create_framebuffer(&create_info, None),
                "vkCreateFramebuffer '{}'",
                info.name
            )?
        };
        framebuffer.attachments = info.attachments;

        engine_debug!(
            "lumos::vulkan::Framebuffer",
            "Created framebuffer '{}' {}x{} ({} attachments)",
            info.name, info.width, info.height, views.len()
        );
        Ok(framebuffer)
    }
}

impl Framebuffer for VulkanFramebuffer {
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

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanFramebuffer {
    fn drop(&mut self) {
        unsafe {
            if self.framebuffer != vk::Framebuffer::null() {
                self.ctx.device.destroy_framebuffer(self.framebuffer, None);
            }
            for view in self.owned_views.drain(..) {
                self.ctx.device.destroy_image_view(view, None);
            }
        }
    }
}
