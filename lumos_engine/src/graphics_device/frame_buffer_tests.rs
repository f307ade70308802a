//! Unit tests for frame_buffer.rs

use crate::error::Error;
use crate::graphics_device::mock_graphics_device::{MockGraphicsDevice, MockTexture};
use crate::graphics_device::{
    AttachmentInfo, AttachmentKind, Framebuffer, FramebufferBuilder, GraphicsDevice, RenderPass,
    RenderPassInfo, Texture, TextureFormat, TextureType,
};
use std::sync::Arc;

fn texture(name: &str, width: u32, height: u32, texture_type: TextureType) -> Arc<dyn Texture> {
    Arc::new(MockTexture::new(name, width, height, texture_type))
}

fn colour_depth_pass(device: &MockGraphicsDevice) -> Arc<dyn RenderPass> {
    device.create_render_pass(&RenderPassInfo::colour_depth()).unwrap()
}

#[test]
fn test_build_colour_depth() {
    let device = MockGraphicsDevice::new();
    let framebuffer = FramebufferBuilder::new("scene", colour_depth_pass(&device))
        .add_texture_attachment(texture("colour", 800, 600, TextureType::Colour))
        .add_texture_attachment(texture("depth", 800, 600, TextureType::Depth))
        .set_clear_colour([0.8, 0.8, 0.8, 1.0])
        .build(&device)
        .unwrap();

    assert_eq!((framebuffer.width(), framebuffer.height()), (800, 600));
    assert_eq!(framebuffer.attachment_kinds(), vec![AttachmentKind::Colour, AttachmentKind::Depth]);
    assert_eq!(framebuffer.clear_colour(), [0.8, 0.8, 0.8, 1.0]);
    assert!(!framebuffer.is_screen());
}

#[test]
fn test_swapchain_image_marks_screen() {
    let device = MockGraphicsDevice::new();
    let framebuffer = FramebufferBuilder::new("screen", colour_depth_pass(&device))
        .add_texture_attachment(texture("swapchain_0", 1024, 768, TextureType::Swapchain))
        .add_texture_attachment(texture("depth", 1024, 768, TextureType::Depth))
        .build(&device)
        .unwrap();

    assert!(framebuffer.is_screen());
}

#[test]
fn test_validate_empty() {
    let device = MockGraphicsDevice::new();
    let builder = FramebufferBuilder::new("empty", colour_depth_pass(&device));
    assert!(matches!(builder.validate(), Err(Error::InvalidResource(_))));
}

#[test]
fn test_validate_size_mismatch() {
    let device = MockGraphicsDevice::new();
    let mut builder = FramebufferBuilder::new("mismatch", colour_depth_pass(&device));
    builder
        .add_texture_attachment(texture("colour", 800, 600, TextureType::Colour))
        .add_texture_attachment(texture("depth", 640, 480, TextureType::Depth));

    assert!(matches!(builder.validate(), Err(Error::InvalidResource(_))));
    assert!(builder.build(&device).is_err());
}

#[test]
fn test_validate_attachment_count_must_match_render_pass() {
    let device = MockGraphicsDevice::new();
    let mut builder = FramebufferBuilder::new("missing_depth", colour_depth_pass(&device));
    builder.add_texture_attachment(texture("colour", 800, 600, TextureType::Colour));

    let Err(Error::InvalidResource(message)) = builder.validate() else {
        panic!("expected InvalidResource");
    };
    assert!(message.contains("render pass expects 2"));
}

#[test]
fn test_validate_attachment_roles_must_match_render_pass() {
    let device = MockGraphicsDevice::new();
    let mut builder = FramebufferBuilder::new("two_colours", colour_depth_pass(&device));
    builder
        .add_texture_attachment(texture("albedo", 800, 600, TextureType::Colour))
        .add_texture_attachment(texture("normals", 800, 600, TextureType::Colour));

    let Err(Error::InvalidResource(message)) = builder.validate() else {
        panic!("expected InvalidResource");
    };
    assert!(message.contains("attachment 1"));
    assert!(builder.build(&device).is_err());
    assert!(device.events().iter().all(|e| !e.starts_with("create_framebuffer")));
}

#[test]
fn test_depth_array_layer_fills_depth_slot() {
    let device = MockGraphicsDevice::new();
    let render_pass = device
        .create_render_pass(&RenderPassInfo {
            attachments: vec![AttachmentInfo::new(TextureType::DepthArray, TextureFormat::Depth)],
            clear: true,
        })
        .unwrap();
    let mut cascades = MockTexture::new("cascades", 512, 512, TextureType::DepthArray);
    cascades.layer_count = 4;

    let framebuffer = FramebufferBuilder::new("cascade_1", render_pass)
        .add_texture_layer(1, Arc::new(cascades))
        .build(&device)
        .unwrap();

    assert_eq!(framebuffer.attachment_kinds(), vec![AttachmentKind::ArrayLayer]);
    assert_eq!(framebuffer.depth_roles(), vec![true]);
}

#[test]
fn test_layered_and_cube_attachments() {
    let device = MockGraphicsDevice::new();
    let render_pass = device
        .create_render_pass(&RenderPassInfo {
            attachments: vec![
                AttachmentInfo::new(TextureType::Cube, TextureFormat::Rgba8),
                AttachmentInfo::new(TextureType::DepthArray, TextureFormat::Depth),
            ],
            clear: true,
        })
        .unwrap();
    let mut layered = MockTexture::new("cascades", 512, 512, TextureType::DepthArray);
    layered.layer_count = 4;

    let mut builder = FramebufferBuilder::new("shadow", render_pass);
    builder
        .add_cube_texture_attachment(3, texture("cube", 512, 512, TextureType::Cube))
        .add_texture_layer(2, Arc::new(layered));

    assert_eq!(builder.attachment_count(), 2);
    assert!(builder.validate().is_ok());
}

#[test]
#[should_panic(expected = "added after")]
fn test_colour_after_depth_panics() {
    let device = MockGraphicsDevice::new();
    let mut builder = FramebufferBuilder::new("order", colour_depth_pass(&device));
    builder
        .add_texture_attachment(texture("depth", 800, 600, TextureType::Depth))
        .add_texture_attachment(texture("colour", 800, 600, TextureType::Colour));
}

#[test]
#[should_panic(expected = "out of range")]
fn test_texture_layer_out_of_range_panics() {
    let device = MockGraphicsDevice::new();
    let mut builder = FramebufferBuilder::new("layers", colour_depth_pass(&device));
    builder.add_texture_layer(1, texture("single", 64, 64, TextureType::Colour));
}
