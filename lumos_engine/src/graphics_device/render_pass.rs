/// Render pass trait - a fixed, ordered attachment layout

use std::any::Any;
use crate::graphics_device::{TextureFormat, TextureType};

/// One attachment slot of a render pass: its role and format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentInfo {
    /// Role of the attachment (colour, depth, ...)
    pub texture_type: TextureType,
    pub format: TextureFormat,
}

impl AttachmentInfo {
    pub fn new(texture_type: TextureType, format: TextureFormat) -> Self {
        Self { texture_type, format }
    }

    /// True for depth and layered-depth roles
    pub fn is_depth(&self) -> bool {
        matches!(self.texture_type, TextureType::Depth | TextureType::DepthArray)
    }
}

/// Descriptor for creating a render pass
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassInfo {
    /// Attachments in framebuffer order
    pub attachments: Vec<AttachmentInfo>,
    /// Clear attachments when the pass begins (otherwise load)
    pub clear: bool,
}

impl RenderPassInfo {
    /// Colour (RGBA8) + depth: the layout shared by the forward renderer and its framebuffers
    pub fn colour_depth() -> Self {
        Self {
            attachments: vec![
                AttachmentInfo::new(TextureType::Colour, TextureFormat::Rgba8),
                AttachmentInfo::new(TextureType::Depth, TextureFormat::Depth),
            ],
            clear: true,
        }
    }
}

/// How the first subpass receives its commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubpassContents {
    /// Draw calls are recorded directly into the primary buffer
    Inline,
    /// Draw calls come from secondary command buffers
    Secondary,
}

/// Render pass trait
///
/// Every framebuffer used with a pass must match its attachment roles and
/// count exactly. Begin/end are recorded through `CommandBuffer`.
pub trait RenderPass: Send + Sync {
    /// Attachments in framebuffer order
    fn attachments(&self) -> &[AttachmentInfo];

    fn attachment_count(&self) -> usize {
        self.attachments().len()
    }

    fn colour_attachment_count(&self) -> usize {
        self.attachments().iter().filter(|a| !a.is_depth()).count()
    }

    /// True if attachments are cleared when the pass begins
    fn clears(&self) -> bool;

    fn as_any(&self) -> &dyn Any;
}
