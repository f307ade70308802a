//! Integration tests for the Vulkan GraphicsDevice backend
//!
//! Every test creates a real device on a hidden window, so all of them
//! require a GPU and are marked with #[ignore].
//!
//! Run with: cargo test --test vulkan_graphics_device_tests -- --ignored

use std::sync::Arc;

use lumos_engine::lumos::render::{
    AttachmentInfo, BufferDesc, BufferUsage, CommandBuffer, CommandBufferLevel, CommandBufferState,
    FramebufferBuilder, GraphicsApi, GraphicsDevice, RenderPassInfo, SubpassContents, Swapchain,
    TextureDesc, TextureFormat, TextureParameters, TextureType, UniformBufferDesc,
};
use lumos_engine::lumos::renderer::RendererConfig;
use lumos_engine_renderer_vulkan::lumos::VulkanGraphicsDevice;
use winit::event_loop::EventLoop;
use winit::window::Window;

/// Hidden window the device and swapchain surfaces are created on
#[allow(deprecated)]
fn create_test_window() -> (Window, EventLoop<()>) {
    let event_loop = EventLoop::new().unwrap();
    let window_attrs = Window::default_attributes()
        .with_title("Lumos Vulkan Test")
        .with_inner_size(winit::dpi::LogicalSize::new(800, 600))
        .with_visible(false);
    let window = event_loop.create_window(window_attrs).unwrap();
    (window, event_loop)
}

fn create_device(window: &Window) -> VulkanGraphicsDevice {
    VulkanGraphicsDevice::new(window, &RendererConfig::default()).unwrap()
}

// ============================================================================
// DEVICE TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_device_reports_api_and_limits() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);

    assert_eq!(device.api(), GraphicsApi::Vulkan);
    assert!(!device.device_name().is_empty());

    let limits = device.limits();
    assert!(limits.min_uniform_buffer_offset_alignment.is_power_of_two());
    assert!(limits.max_framebuffer_width >= 800);
    assert!(limits.max_framebuffer_height >= 600);
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_wait_idle() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);
    device.wait_idle().unwrap();
}

// ============================================================================
// TEXTURE TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_create_colour_texture() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);

    let texture = device
        .create_texture(TextureDesc::colour("colour", 256, 128, TextureParameters::default()))
        .unwrap();

    assert_eq!(texture.name(), "colour");
    assert_eq!(texture.width(), 256);
    assert_eq!(texture.height(), 128);
    assert_eq!(texture.format(), TextureFormat::Rgba8);
    assert_eq!(texture.texture_type(), TextureType::Colour);
    assert_eq!(texture.layer_count(), 1);
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_create_texture_with_data() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);

    let pixels = vec![255u8; 64 * 64 * 4];
    let desc = TextureDesc::colour("uploaded", 64, 64, TextureParameters::default()).with_data(pixels);
    let texture = device.create_texture(desc).unwrap();

    assert_eq!(texture.width(), 64);
    device.wait_idle().unwrap();
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_create_depth_texture() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);

    let texture = device.create_texture(TextureDesc::depth("depth", 512, 512)).unwrap();

    assert_eq!(texture.texture_type(), TextureType::Depth);
    assert!(texture.format().is_depth());
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_create_depth_array_texture() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);

    let texture = device.create_texture(TextureDesc::depth_array("cascades", 1024, 1024, 4)).unwrap();

    assert_eq!(texture.texture_type(), TextureType::DepthArray);
    assert_eq!(texture.layer_count(), 4);
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_create_cube_texture() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);

    let desc = TextureDesc {
        texture_type: TextureType::Cube,
        layer_count: 6,
        ..TextureDesc::colour("cube", 128, 128, TextureParameters::default())
    };
    let texture = device.create_texture(desc).unwrap();

    assert_eq!(texture.texture_type(), TextureType::Cube);
    assert_eq!(texture.layer_count(), 6);
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_texture_data_size_mismatch_fails() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);

    let desc = TextureDesc::colour("short", 64, 64, TextureParameters::default()).with_data(vec![0u8; 16]);
    assert!(device.create_texture(desc).is_err());
}

// ============================================================================
// BUFFER TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_create_vertex_buffer() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);

    let data: Vec<u8> = (0..96).collect();
    let buffer = device
        .create_buffer(BufferDesc {
            name: "triangle".to_string(),
            size: data.len() as u64,
            usage: BufferUsage::Vertex,
            data: Some(data),
        })
        .unwrap();

    assert_eq!(buffer.size(), 96);
    assert_eq!(buffer.usage(), BufferUsage::Vertex);
    buffer.update(0, &[1, 2, 3, 4]).unwrap();
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_buffer_update_out_of_range_fails() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);

    let buffer = device
        .create_buffer(BufferDesc {
            name: "indices".to_string(),
            size: 12,
            usage: BufferUsage::Index,
            data: None,
        })
        .unwrap();

    assert!(buffer.update(8, &[0u8; 8]).is_err());
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_create_uniform_buffers() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);

    let system = device.create_uniform_buffer(UniformBufferDesc::new("system", 256)).unwrap();
    assert!(!system.is_dynamic());
    system.set_data(&[0u8; 64]).unwrap();

    let models = device.create_uniform_buffer(UniformBufferDesc::dynamic("models", 4096)).unwrap();
    assert!(models.is_dynamic());
    assert_eq!(models.size(), 4096);
    assert!(models.update(4090, &[0u8; 16]).is_err());
}

// ============================================================================
// RENDER PASS / FRAMEBUFFER TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_render_pass_and_framebuffer() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);

    let render_pass = device.create_render_pass(&RenderPassInfo::colour_depth()).unwrap();
    assert_eq!(render_pass.attachment_count(), 2);
    assert_eq!(render_pass.colour_attachment_count(), 1);

    let colour = device
        .create_texture(TextureDesc::colour("target", 320, 240, TextureParameters::default()))
        .unwrap();
    let depth = device.create_texture(TextureDesc::depth("target_depth", 320, 240)).unwrap();

    let framebuffer = FramebufferBuilder::new("offscreen", render_pass.clone())
        .add_texture_attachment(colour)
        .add_texture_attachment(depth)
        .set_clear_colour([0.1, 0.2, 0.3, 1.0])
        .build(&device)
        .unwrap();

    assert_eq!(framebuffer.width(), 320);
    assert_eq!(framebuffer.height(), 240);
    assert_eq!(framebuffer.attachment_count(), 2);
    assert!(!framebuffer.is_screen());
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_render_pass_rejects_two_depth_attachments() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);

    let info = RenderPassInfo {
        attachments: vec![
            AttachmentInfo::new(TextureType::Depth, TextureFormat::Depth),
            AttachmentInfo::new(TextureType::Depth, TextureFormat::Depth),
        ],
        clear: true,
    };
    assert!(device.create_render_pass(&info).is_err());
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_shadow_framebuffer_layer() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);

    let info = RenderPassInfo {
        attachments: vec![AttachmentInfo::new(TextureType::DepthArray, TextureFormat::Depth)],
        clear: true,
    };
    let render_pass = device.create_render_pass(&info).unwrap();
    let cascades = device.create_texture(TextureDesc::depth_array("cascades", 512, 512, 4)).unwrap();

    let framebuffer = FramebufferBuilder::new("cascade_2", render_pass)
        .add_texture_layer(2, cascades)
        .build(&device)
        .unwrap();

    assert_eq!(framebuffer.attachment_count(), 1);
    assert_eq!(framebuffer.width(), 512);
}

// ============================================================================
// COMMAND BUFFER TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_command_buffer_record_and_execute() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);

    let render_pass = device.create_render_pass(&RenderPassInfo::colour_depth()).unwrap();
    let colour = device
        .create_texture(TextureDesc::colour("cb_colour", 128, 128, TextureParameters::default()))
        .unwrap();
    let depth = device.create_texture(TextureDesc::depth("cb_depth", 128, 128)).unwrap();
    let framebuffer = FramebufferBuilder::new("cb_target", render_pass.clone())
        .add_texture_attachment(colour)
        .add_texture_attachment(depth)
        .build(&device)
        .unwrap();

    let mut commands = CommandBuffer::init(&device, CommandBufferLevel::Primary).unwrap();
    assert_eq!(commands.state(), CommandBufferState::Idle);

    // Two frames through the same buffer exercise the fence wait/reset cycle
    for _ in 0..2 {
        commands.begin_recording().unwrap();
        commands.update_viewport(128, 128).unwrap();
        commands
            .begin_render_pass(
                render_pass.as_ref(),
                framebuffer.as_ref(),
                [0.0, 0.0, 0.0, 1.0],
                SubpassContents::Inline,
                128,
                128,
            )
            .unwrap();
        commands.end_render_pass().unwrap();
        commands.end_recording().unwrap();
        commands.execute(true).unwrap();
        assert_eq!(commands.state(), CommandBufferState::Idle);
    }
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_secondary_command_buffer() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);

    let render_pass = device.create_render_pass(&RenderPassInfo::colour_depth()).unwrap();
    let colour = device
        .create_texture(TextureDesc::colour("sec_colour", 64, 64, TextureParameters::default()))
        .unwrap();
    let depth = device.create_texture(TextureDesc::depth("sec_depth", 64, 64)).unwrap();
    let framebuffer = FramebufferBuilder::new("sec_target", render_pass.clone())
        .add_texture_attachment(colour)
        .add_texture_attachment(depth)
        .build(&device)
        .unwrap();

    let mut primary = CommandBuffer::init(&device, CommandBufferLevel::Primary).unwrap();
    let mut secondary = CommandBuffer::init(&device, CommandBufferLevel::Secondary).unwrap();
    assert!(!secondary.is_primary());

    secondary
        .begin_recording_secondary(render_pass.as_ref(), framebuffer.as_ref())
        .unwrap();
    secondary.update_viewport(64, 64).unwrap();
    secondary.end_recording().unwrap();

    primary.begin_recording().unwrap();
    primary
        .begin_render_pass(
            render_pass.as_ref(),
            framebuffer.as_ref(),
            [0.0; 4],
            SubpassContents::Secondary,
            64,
            64,
        )
        .unwrap();
    secondary.execute_secondary(&mut primary).unwrap();
    primary.end_render_pass().unwrap();
    primary.end_recording().unwrap();
    primary.execute(true).unwrap();
}

// ============================================================================
// SWAPCHAIN TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_create_swapchain() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);

    let swapchain = device.create_swapchain(&window, 800, 600, true).unwrap();

    assert!(swapchain.buffer_count() >= 2);
    assert_eq!(swapchain.format(), TextureFormat::Screen);
    assert!(swapchain.width() > 0);
    assert!(swapchain.height() > 0);

    let image = swapchain.image(0);
    assert_eq!(image.texture_type(), TextureType::Swapchain);
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_swapchain_screen_framebuffer() {
    let (window, _event_loop) = create_test_window();
    let device = create_device(&window);
    let mut swapchain = device.create_swapchain(&window, 800, 600, true).unwrap();

    let info = RenderPassInfo {
        attachments: vec![
            AttachmentInfo::new(TextureType::Swapchain, TextureFormat::Screen),
            AttachmentInfo::new(TextureType::Depth, TextureFormat::Depth),
        ],
        clear: true,
    };
    let render_pass = device.create_render_pass(&info).unwrap();
    let depth = device
        .create_texture(TextureDesc::depth("screen_depth", swapchain.width(), swapchain.height()))
        .unwrap();

    let framebuffers: Vec<_> = (0..swapchain.buffer_count())
        .map(|i| {
            FramebufferBuilder::new("screen", render_pass.clone())
                .add_texture_attachment(swapchain.image(i))
                .add_texture_attachment(Arc::clone(&depth))
                .build(&device)
                .unwrap()
        })
        .collect();
    assert!(framebuffers.iter().all(|fb| fb.is_screen()));

    let index = swapchain.acquire_next_image().unwrap();
    assert_eq!(index, swapchain.current_buffer_index());
    device.wait_idle().unwrap();
}
