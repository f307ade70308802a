/// Framebuffer trait and the attachment builder that validates it
///
/// Attachments are added in a fixed order (colour, depth, cube face, array
/// layer, shadow). `validate()` checks that every attachment has the same
/// size and that count and roles match the render pass before the native
/// framebuffer is created.

use std::any::Any;
use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{GraphicsDevice, RenderPass, Texture, TextureType};

/// Attachment category, ordered by the sequence in which they must be added
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttachmentKind {
    Colour,
    Depth,
    CubeFace,
    ArrayLayer,
    Shadow,
}

/// One attachment of a framebuffer
#[derive(Clone)]
pub struct FramebufferAttachment {
    pub kind: AttachmentKind,
    pub texture: Arc<dyn Texture>,
    /// Cube face or array layer (0 otherwise)
    pub layer: u32,
}

impl FramebufferAttachment {
    /// True if the attachment fills a depth slot of its render pass
    ///
    /// Array layers take the role of their texture.
    pub fn is_depth(&self) -> bool {
        matches!(self.kind, AttachmentKind::Depth | AttachmentKind::Shadow)
            || matches!(self.texture.texture_type(), TextureType::Depth | TextureType::DepthArray)
    }
}

/// Index of the first attachment whose depth role differs from the render
/// pass slot at the same position
pub fn first_role_mismatch(depth_roles: &[bool], render_pass: &dyn RenderPass) -> Option<usize> {
    depth_roles
        .iter()
        .zip(render_pass.attachments())
        .position(|(depth, slot)| *depth != slot.is_depth())
}

fn role_name(depth: bool) -> &'static str {
    if depth { "depth" } else { "colour" }
}

/// Descriptor for creating a framebuffer (produced by `FramebufferBuilder`)
#[derive(Clone)]
pub struct FramebufferInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub render_pass: Arc<dyn RenderPass>,
    pub attachments: Vec<FramebufferAttachment>,
    pub clear_colour: [f32; 4],
    /// Wraps a swapchain image
    pub screen: bool,
}

/// Framebuffer trait
///
/// The native handle is released on drop.
pub trait Framebuffer: Send + Sync {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn attachment_count(&self) -> usize;

    /// Attachment categories in order
    fn attachment_kinds(&self) -> Vec<AttachmentKind>;

    /// Per attachment, true where it fills a depth slot
    fn depth_roles(&self) -> Vec<bool>;

    fn clear_colour(&self) -> [f32; 4];

    /// True if this framebuffer presents to the screen
    fn is_screen(&self) -> bool;

    /// Bind and set the viewport to `width`x`height` in one step
    /// (immediate-mode backends only)
    fn bind_with_size(&self, _width: u32, _height: u32) {}

    /// Bind at the framebuffer's own size
    fn bind(&self) {
        self.bind_with_size(self.width(), self.height());
    }

    fn unbind(&self) {}

    fn as_any(&self) -> &dyn Any;
}

/// Collects attachments in order, validates, then creates the framebuffer
pub struct FramebufferBuilder {
    name: String,
    render_pass: Arc<dyn RenderPass>,
    attachments: Vec<FramebufferAttachment>,
    clear_colour: [f32; 4],
    screen: bool,
}

impl FramebufferBuilder {
    pub fn new(name: &str, render_pass: Arc<dyn RenderPass>) -> Self {
        Self {
            name: name.to_string(),
            render_pass,
            attachments: Vec::new(),
            clear_colour: [0.0, 0.0, 0.0, 1.0],
            screen: false,
        }
    }

    fn push(&mut self, kind: AttachmentKind, texture: Arc<dyn Texture>, layer: u32) -> &mut Self {
        if let Some(last) = self.attachments.last() {
            crate::engine_assert!(
                last.kind <= kind,
                "lumos::Framebuffer",
                "Framebuffer '{}': {:?} attachment added after {:?}",
                self.name,
                kind,
                last.kind
            );
        }
        self.attachments.push(FramebufferAttachment { kind, texture, layer });
        self
    }

    /// Colour or depth attachment, classified by the texture's type
    pub fn add_texture_attachment(&mut self, texture: Arc<dyn Texture>) -> &mut Self {
        let kind = match texture.texture_type() {
            TextureType::Depth | TextureType::DepthArray => AttachmentKind::Depth,
            _ => AttachmentKind::Colour,
        };
        if texture.texture_type() == TextureType::Swapchain {
            self.screen = true;
        }
        self.push(kind, texture, 0)
    }

    /// One face (0..6) of a cube texture
    pub fn add_cube_texture_attachment(&mut self, face: u32, texture: Arc<dyn Texture>) -> &mut Self {
        crate::engine_assert!(
            texture.texture_type() == TextureType::Cube && face < 6,
            "lumos::Framebuffer",
            "Framebuffer '{}': cube attachment needs a cube texture and a face < 6 (got {:?}, face {})",
            self.name,
            texture.texture_type(),
            face
        );
        self.push(AttachmentKind::CubeFace, texture, face)
    }

    /// One layer of a layered texture
    pub fn add_texture_layer(&mut self, layer: u32, texture: Arc<dyn Texture>) -> &mut Self {
        crate::engine_assert!(
            layer < texture.layer_count(),
            "lumos::Framebuffer",
            "Framebuffer '{}': layer {} out of range ({} layers)",
            self.name,
            layer,
            texture.layer_count()
        );
        self.push(AttachmentKind::ArrayLayer, texture, layer)
    }

    /// Depth-array texture bound as a whole for shadow rendering
    pub fn add_shadow_attachment(&mut self, texture: Arc<dyn Texture>) -> &mut Self {
        self.push(AttachmentKind::Shadow, texture, 0)
    }

    pub fn set_clear_colour(&mut self, colour: [f32; 4]) -> &mut Self {
        self.clear_colour = colour;
        self
    }

    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    /// Check completeness: at least one attachment, identical sizes and the
    /// render pass's attachment count and roles
    pub fn validate(&self) -> Result<()> {
        let Some(first) = self.attachments.first() else {
            crate::engine_error!("lumos::Framebuffer", "Framebuffer '{}' has no attachments", self.name);
            return Err(Error::InvalidResource(format!("framebuffer '{}' has no attachments", self.name)));
        };

        let (width, height) = (first.texture.width(), first.texture.height());
        if let Some(bad) = self.attachments.iter().find(|a| a.texture.width() != width || a.texture.height() != height) {
            crate::engine_error!(
                "lumos::Framebuffer",
                "Framebuffer '{}': attachment '{}' is {}x{}, expected {}x{}",
                self.name,
                bad.texture.name(),
                bad.texture.width(),
                bad.texture.height(),
                width,
                height
            );
            return Err(Error::InvalidResource(format!("framebuffer '{}' has mismatched attachment sizes", self.name)));
        }

        let expected = self.render_pass.attachment_count();
        if self.attachments.len() != expected {
            crate::engine_error!(
                "lumos::Framebuffer",
                "Framebuffer '{}' has {} attachments, render pass expects {}",
                self.name,
                self.attachments.len(),
                expected
            );
            return Err(Error::InvalidResource(format!(
                "framebuffer '{}' has {} attachments, render pass expects {}",
                self.name,
                self.attachments.len(),
                expected
            )));
        }

        let roles: Vec<bool> = self.attachments.iter().map(FramebufferAttachment::is_depth).collect();
        if let Some(index) = first_role_mismatch(&roles, self.render_pass.as_ref()) {
            let attachment = &self.attachments[index];
            crate::engine_error!(
                "lumos::Framebuffer",
                "Framebuffer '{}': attachment {} ('{}') is a {} attachment, render pass expects {}",
                self.name,
                index,
                attachment.texture.name(),
                role_name(roles[index]),
                role_name(!roles[index])
            );
            return Err(Error::InvalidResource(format!(
                "framebuffer '{}' attachment {} does not match the render pass role",
                self.name, index
            )));
        }

        Ok(())
    }

    /// Validate, then create the native framebuffer
    pub fn build(&self, device: &dyn GraphicsDevice) -> Result<Arc<dyn Framebuffer>> {
        self.validate()?;

        let first = &self.attachments[0];
        device.create_framebuffer(FramebufferInfo {
            name: self.name.clone(),
            width: first.texture.width(),
            height: first.texture.height(),
            render_pass: self.render_pass.clone(),
            attachments: self.attachments.clone(),
            clear_colour: self.clear_colour,
            screen: self.screen,
        })
    }
}

#[cfg(test)]
#[path = "frame_buffer_tests.rs"]
mod tests;
