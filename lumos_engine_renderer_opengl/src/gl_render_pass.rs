/// RenderPass - OpenGL implementation of the RenderPass trait
///
/// GL has no render pass object; this keeps the attachment layout for
/// framebuffer validation and decides whether beginning the pass clears.

use lumos_engine::lumos::render::{AttachmentInfo, RenderPass, RenderPassInfo};
use lumos_engine::lumos::{Error, Result};
use lumos_engine::engine_error;
use std::any::Any;

pub struct GlRenderPass {
    attachments: Vec<AttachmentInfo>,
    clear: bool,
}

impl GlRenderPass {
    pub(crate) fn create(info: &RenderPassInfo) -> Result<Self> {
        if info.attachments.is_empty() {
            engine_error!("lumos::opengl::RenderPass", "Render pass has no attachments");
            return Err(Error::InvalidResource("render pass has no attachments".to_string()));
        }
        let depth_count = info.attachments.iter().filter(|a| a.is_depth()).count();
        if depth_count > 1 {
            engine_error!("lumos::opengl::RenderPass", "Render pass has {} depth attachments (max 1)", depth_count);
            return Err(Error::InvalidResource("render pass has more than one depth attachment".to_string()));
        }
        Ok(Self { attachments: info.attachments.clone(), clear: info.clear })
    }

    pub(crate) fn has_depth(&self) -> bool {
        self.attachments.iter().any(|a| a.is_depth())
    }
}

impl RenderPass for GlRenderPass {
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
