//! Unit tests for deferred_offscreen_renderer.rs

use std::sync::{Arc, Mutex};
use bytemuck::Zeroable;
use glam::{Mat4, Vec3};
use crate::graphics_device::mock_graphics_device::{
    MockCommandBuffer, MockDescriptorSet, MockGraphicsDevice, MockShader, MockUniformBuffer,
};
use crate::graphics_device::{AttachmentKind, Pipeline, SharedSwapchain};
use crate::renderer::{
    DeferredOffScreenRenderer, GBuffer, RenderCommand, Renderer, RendererConfig, SharedGBuffer,
    MAX_BONES,
};
use crate::scene::{Camera, Mesh, SkinnedVertex, Vertex};

struct Fixture {
    device: Arc<MockGraphicsDevice>,
    swapchain: SharedSwapchain,
    gbuffer: SharedGBuffer,
}

fn fixture() -> Fixture {
    let device = Arc::new(MockGraphicsDevice::new());
    let swapchain: SharedSwapchain = Arc::new(Mutex::new(device.create_swapchain(800, 600, 3)));
    let gbuffer = GBuffer::shared(device.as_ref(), 800, 600).unwrap();
    Fixture { device, swapchain, gbuffer }
}

fn renderer(fixture: &Fixture) -> DeferredOffScreenRenderer {
    DeferredOffScreenRenderer::with_shaders(
        fixture.device.clone(),
        fixture.swapchain.clone(),
        fixture.gbuffer.clone(),
        RendererConfig::default(),
        Arc::new(MockShader::new("DeferredColour")),
        Arc::new(MockShader::new("DeferredColourAnim")),
    )
    .unwrap()
}

fn static_mesh(device: &MockGraphicsDevice, name: &str) -> Arc<Mesh> {
    let vertices = [Vertex::zeroed(); 3];
    Arc::new(Mesh::from_data(device, name, &vertices, &[0, 1, 2]).unwrap())
}

fn skinned_mesh(device: &MockGraphicsDevice, name: &str) -> Arc<Mesh> {
    let vertices = [SkinnedVertex::zeroed(); 3];
    Arc::new(Mesh::from_data(device, name, &vertices, &[0, 1, 2]).unwrap())
}

fn primary_commands(renderer: &DeferredOffScreenRenderer) -> Vec<String> {
    renderer
        .base()
        .primary(0)
        .native()
        .as_any()
        .downcast_ref::<MockCommandBuffer>()
        .unwrap()
        .commands
        .clone()
}

fn lines_starting(commands: &[String], prefix: &str) -> Vec<String> {
    commands.iter().filter(|c| c.starts_with(prefix)).cloned().collect()
}

fn record_frame(renderer: &mut DeferredOffScreenRenderer, commands: Vec<RenderCommand>) {
    renderer.begin().unwrap();
    renderer.begin_scene(&Camera::default(), &[]);
    for command in commands {
        renderer.submit(command);
    }
    renderer.set_system_uniforms().unwrap();
    renderer.present().unwrap();
    renderer.end_scene();
    renderer.end().unwrap();
}

#[test]
fn test_single_gbuffer_framebuffer() {
    let fixture = fixture();
    let renderer = renderer(&fixture);

    let framebuffers = renderer.base().framebuffers();
    assert_eq!(framebuffers.len(), 1);
    assert_eq!(
        framebuffers[0].attachment_kinds(),
        vec![
            AttachmentKind::Colour,
            AttachmentKind::Colour,
            AttachmentKind::Colour,
            AttachmentKind::Colour,
            AttachmentKind::Depth,
        ]
    );
    assert!(!framebuffers[0].is_screen());
    assert!(renderer.renders_offscreen());
    assert_eq!(renderer.base().render_pass().colour_attachment_count(), 4);
}

#[test]
fn test_static_and_skinned_pipelines() {
    let fixture = fixture();
    let renderer = renderer(&fixture);

    assert_eq!(renderer.base().pipeline().name(), "Deferred");
    assert_eq!(renderer.base().skinned_pipeline().unwrap().name(), "DeferredAnim");
    assert!(renderer.base().joint_buffer().is_some());
}

#[test]
fn test_skinned_scene_set_binds_joint_palette() {
    let fixture = fixture();
    let renderer = renderer(&fixture);

    let skinned = renderer.base().skinned_pipeline().unwrap().clone();
    let set = skinned.descriptor_set().clone();
    let set = set.as_any().downcast_ref::<MockDescriptorSet>().unwrap();
    assert_eq!(set.dynamic_count, 2);
    assert_eq!(set.writes.lock().unwrap()[0].buffer_bindings, vec![0, 1, 2, 3]);
}

#[test]
fn test_skinned_commands_use_skinned_pipeline() {
    let fixture = fixture();
    let mut renderer = renderer(&fixture);
    let joints = vec![Mat4::from_translation(Vec3::X); 4];

    record_frame(
        &mut renderer,
        vec![
            RenderCommand::new(static_mesh(&fixture.device, "rock"), Mat4::IDENTITY, Mat4::IDENTITY),
            RenderCommand::new(skinned_mesh(&fixture.device, "knight"), Mat4::IDENTITY, Mat4::IDENTITY)
                .with_joints(joints.clone()),
            RenderCommand::new(skinned_mesh(&fixture.device, "horse"), Mat4::IDENTITY, Mat4::IDENTITY)
                .with_joints(joints),
        ],
    );

    let commands = primary_commands(&renderer);
    assert_eq!(
        lines_starting(&commands, "  bind_pipeline"),
        vec!["  bind_pipeline Deferred", "  bind_pipeline DeferredAnim", "  bind_pipeline DeferredAnim"]
    );

    // Model offset per queue position, joint offset per skinned mesh.
    let joint_stride = 64 * MAX_BONES;
    assert_eq!(
        lines_starting(&commands, "  bind_descriptor_sets"),
        vec![
            "  bind_descriptor_sets first=0 count=2 offsets=[0]".to_string(),
            "  bind_descriptor_sets first=0 count=2 offsets=[256, 0]".to_string(),
            format!("  bind_descriptor_sets first=0 count=2 offsets=[512, {}]", joint_stride),
        ]
    );
}

#[test]
fn test_joint_palette_uploaded() {
    let fixture = fixture();
    let mut renderer = renderer(&fixture);
    let joints: Vec<Mat4> = (0..3).map(|i| Mat4::from_scale(Vec3::splat(i as f32 + 1.0))).collect();

    record_frame(
        &mut renderer,
        vec![RenderCommand::new(skinned_mesh(&fixture.device, "knight"), Mat4::IDENTITY, Mat4::IDENTITY)
            .with_joints(joints.clone())],
    );

    let buffer = renderer.base().joint_buffer().unwrap().clone();
    let buffer = buffer.as_any().downcast_ref::<MockUniformBuffer>().unwrap();
    assert_eq!(buffer.read(0, 3 * 64), bytemuck::cast_slice::<Mat4, u8>(&joints).to_vec());
}

#[test]
fn test_oversized_palette_is_truncated() {
    let fixture = fixture();
    let mut renderer = renderer(&fixture);
    let joints = vec![Mat4::IDENTITY; MAX_BONES + 20];

    record_frame(
        &mut renderer,
        vec![RenderCommand::new(skinned_mesh(&fixture.device, "giant"), Mat4::IDENTITY, Mat4::IDENTITY)
            .with_joints(joints)],
    );

    assert_eq!(renderer.stats().draw_calls, 1);
}

#[test]
#[should_panic(expected = "Skinned command queue full")]
fn test_skinned_submit_past_capacity_panics() {
    let fixture = fixture();
    let config = RendererConfig { max_animated_objects: 2, ..RendererConfig::default() };
    let mut renderer = DeferredOffScreenRenderer::with_shaders(
        fixture.device.clone(),
        fixture.swapchain.clone(),
        fixture.gbuffer.clone(),
        config,
        Arc::new(MockShader::new("DeferredColour")),
        Arc::new(MockShader::new("DeferredColourAnim")),
    )
    .unwrap();
    let mesh = skinned_mesh(&fixture.device, "knight");

    renderer.begin().unwrap();
    renderer.submit(RenderCommand::new(static_mesh(&fixture.device, "rock"), Mat4::IDENTITY, Mat4::IDENTITY));
    for _ in 0..3 {
        renderer.submit(
            RenderCommand::new(mesh.clone(), Mat4::IDENTITY, Mat4::IDENTITY).with_joints(vec![Mat4::IDENTITY; 4]),
        );
    }
}

#[test]
fn test_static_commands_not_limited_by_skinned_capacity() {
    let fixture = fixture();
    let config = RendererConfig { max_animated_objects: 1, ..RendererConfig::default() };
    let mut renderer = DeferredOffScreenRenderer::with_shaders(
        fixture.device.clone(),
        fixture.swapchain.clone(),
        fixture.gbuffer.clone(),
        config,
        Arc::new(MockShader::new("DeferredColour")),
        Arc::new(MockShader::new("DeferredColourAnim")),
    )
    .unwrap();
    let mut commands: Vec<RenderCommand> = (0..3)
        .map(|i| RenderCommand::new(static_mesh(&fixture.device, &format!("rock{}", i)), Mat4::IDENTITY, Mat4::IDENTITY))
        .collect();
    commands.push(
        RenderCommand::new(skinned_mesh(&fixture.device, "knight"), Mat4::IDENTITY, Mat4::IDENTITY)
            .with_joints(vec![Mat4::IDENTITY; 4]),
    );

    record_frame(&mut renderer, commands);

    assert_eq!(renderer.stats().draw_calls, 4);
}

#[test]
fn test_end_submits_and_waits() {
    let fixture = fixture();
    let mut renderer = renderer(&fixture);
    fixture.device.clear_events();

    record_frame(
        &mut renderer,
        vec![RenderCommand::new(static_mesh(&fixture.device, "rock"), Mat4::IDENTITY, Mat4::IDENTITY)],
    );

    assert_eq!(
        fixture.device.events(),
        vec!["cb1 reset_fence", "cb1 submit", "cb1 wait_fence", "cb1 reset_fence"]
    );
    let submissions = fixture.device.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0][1], "begin_render_pass Secondary 800x600");
}

#[test]
fn test_on_resize_follows_gbuffer() {
    let fixture = fixture();
    let mut renderer = renderer(&fixture);
    let old_attachments = renderer.base().render_pass().attachments().to_vec();

    fixture.gbuffer.write().unwrap().resize(fixture.device.as_ref(), 1280, 720).unwrap();
    fixture.device.clear_events();
    renderer.on_resize(1280, 720).unwrap();

    let framebuffer = &renderer.base().framebuffers()[0];
    assert_eq!((framebuffer.width(), framebuffer.height()), (1280, 720));
    assert_eq!(framebuffer.attachment_count(), 5);
    assert_eq!(renderer.base().render_pass().attachments(), old_attachments.as_slice());
    assert_eq!(
        renderer.base().render_pass().attachments().iter().filter(|a| a.is_depth()).count(),
        1
    );
    assert_eq!(framebuffer.depth_roles(), vec![false, false, false, false, true]);

    let events = fixture.device.events();
    assert!(events.contains(&"create_pipeline Deferred 1280x720".to_string()));
    assert!(events.contains(&"create_pipeline DeferredAnim 1280x720".to_string()));
}
