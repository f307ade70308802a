/// Shared renderer state and per-frame protocol
///
/// Forward and deferred renderers differ only in their attachments, their
/// shaders and whether a skinned pipeline exists; everything else (command
/// queue, system uniforms, dynamic offsets, secondary buffer arena, resize)
/// lives here.

use std::sync::{Arc, MutexGuard};
use crate::error::{Error, Result};
use crate::graphics_device::{
    AttachmentInfo, BufferInfo, CommandBuffer, CommandBufferLevel, CullMode, DescriptorLayout,
    DescriptorLayoutInfo, DescriptorPoolInfo, DescriptorSet, DescriptorSetInfo, DescriptorType,
    Framebuffer, FramebufferBuilder, GraphicsDevice, ImageInfo, Pipeline, PipelineInfo,
    PushConstantRange, RenderPass, RenderPassInfo, Shader, ShaderType, SharedSwapchain,
    SubpassContents, Swapchain, Texture, TextureFormat, TextureType, UniformBuffer,
    UniformBufferDesc, VertexLayout, checkerboard_texture_desc, MESH_DESCRIPTOR_SET,
    SCENE_DESCRIPTOR_SET,
};
use crate::renderer::{
    CommandQueue, DynamicUniformBlock, GBufferTexture, RenderCommand, RendererConfig,
    RendererStats, SharedGBuffer, SystemUniforms,
};
use crate::scene::{Camera, Light, SkinnedVertex, Vertex, ALBEDO_SAMPLER};

/// Joint matrices per skinned mesh
pub const MAX_BONES: usize = 100;

const MAT4_SIZE: usize = std::mem::size_of::<glam::Mat4>();

/// Bytes of push-constant data per draw (the texture matrix)
const PUSH_CONSTANT_SIZE: u32 = MAT4_SIZE as u32;

// Scene set bindings
const SYSTEM_BINDING: u32 = 0;
const MODEL_BINDING: u32 = 1;
const LIGHT_BINDING: u32 = 2;
const JOINT_BINDING: u32 = 3;
/// Material block binding when the shader does not declare one
const USER_BINDING: u32 = 5;
/// Scene bindings a material block may not take (4 carries push constants on OpenGL)
const RESERVED_BINDINGS: [u32; 5] = [SYSTEM_BINDING, MODEL_BINDING, LIGHT_BINDING, JOINT_BINDING, 4];

/// Which images the renderer draws into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetLayout {
    /// One colour attachment + GBuffer depth, on the swapchain or a render texture
    Forward,
    /// GBuffer colour/position/normal/pbr + depth, always off-screen
    GBuffer,
}

/// Everything a concrete renderer decides before the base is built
pub struct RendererSetup {
    /// Log source tag
    pub source: &'static str,
    pub pipeline_name: String,
    pub target: TargetLayout,
    pub shader: Arc<dyn Shader>,
    /// Enables the skinned pipeline variant
    pub skinned_shader: Option<Arc<dyn Shader>>,
}

/// Skinned pipeline variant and its joint palette buffer
struct Skinning {
    shader: Arc<dyn Shader>,
    pipeline: Arc<dyn Pipeline>,
    default_set: Arc<dyn DescriptorSet>,
    block: DynamicUniformBlock,
    buffer: Arc<dyn UniformBuffer>,
    /// Joint block slot per queue position
    slots: Vec<Option<usize>>,
}

/// Per-draw material uniforms, one dynamic slot per queue position
///
/// Present only when the renderer's shader declares a fragment user block.
struct UserUniforms {
    binding: u32,
    block: DynamicUniformBlock,
    buffer: Arc<dyn UniformBuffer>,
}

/// Objects rebuilt together on resize or target change
struct TargetObjects {
    render_pass: Arc<dyn RenderPass>,
    pipeline: Arc<dyn Pipeline>,
    default_set: Arc<dyn DescriptorSet>,
    skinned: Option<(Arc<dyn Pipeline>, Arc<dyn DescriptorSet>)>,
    framebuffers: Vec<Arc<dyn Framebuffer>>,
}

pub struct RendererBase {
    source: &'static str,
    pipeline_name: String,
    target: TargetLayout,
    device: Arc<dyn GraphicsDevice>,
    swapchain: SharedSwapchain,
    gbuffer: SharedGBuffer,
    config: RendererConfig,

    width: u32,
    height: u32,
    clear_colour: [f32; 4],
    current_buffer_id: usize,
    render_texture: Option<Arc<dyn Texture>>,
    render_to_gbuffer: bool,

    queue: CommandQueue,
    system: SystemUniforms,
    system_buffer: Arc<dyn UniformBuffer>,
    light_buffer: Arc<dyn UniformBuffer>,
    model_block: DynamicUniformBlock,
    model_buffer: Arc<dyn UniformBuffer>,
    skinning: Option<Skinning>,
    user: Option<UserUniforms>,

    shader: Arc<dyn Shader>,
    render_pass: Arc<dyn RenderPass>,
    pipeline: Arc<dyn Pipeline>,
    default_texture: Arc<dyn Texture>,
    default_set: Arc<dyn DescriptorSet>,
    framebuffers: Vec<Arc<dyn Framebuffer>>,

    /// One primary buffer per swapchain image
    primaries: Vec<CommandBuffer>,
    /// Secondary buffers indexed `[buffer index][queue position]`, grown on demand
    secondaries: Vec<Vec<CommandBuffer>>,

    stats: RendererStats,
}

impl RendererBase {
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        swapchain: SharedSwapchain,
        gbuffer: SharedGBuffer,
        config: RendererConfig,
        setup: RendererSetup,
    ) -> Result<Self> {
        let limits = device.limits();
        let max_objects = config.max_objects as usize;

        let system_buffer = device.create_uniform_buffer(UniformBufferDesc::new("system_uniforms", SystemUniforms::vertex_size()))?;
        let light_buffer = device.create_uniform_buffer(UniformBufferDesc::new("light_uniforms", SystemUniforms::fragment_size()))?;
        let model_block = DynamicUniformBlock::new(MAT4_SIZE, max_objects, limits.min_uniform_buffer_offset_alignment);
        let model_buffer = device.create_uniform_buffer(UniformBufferDesc::dynamic("model_uniforms", model_block.size() as u64))?;
        let default_texture = device.create_texture(checkerboard_texture_desc("default_texture"))?;

        let user = match user_block_layout(setup.shader.as_ref(), setup.source)? {
            Some((binding, size)) => {
                let block = DynamicUniformBlock::new(size, max_objects, limits.min_uniform_buffer_offset_alignment);
                let buffer = device.create_uniform_buffer(UniformBufferDesc::dynamic("user_uniforms", block.size() as u64))?;
                Some(UserUniforms { binding, block, buffer })
            }
            None => None,
        };

        let (width, height, buffer_count) = {
            let swapchain = lock_swapchain(&swapchain, setup.source)?;
            let count = swapchain.buffer_count();
            match setup.target {
                TargetLayout::Forward => (swapchain.width(), swapchain.height(), count),
                TargetLayout::GBuffer => {
                    let gbuffer = read_gbuffer(&gbuffer, setup.source)?;
                    (gbuffer.width(), gbuffer.height(), count)
                }
            }
        };

        let skinned_block = setup.skinned_shader.as_ref().map(|_| {
            DynamicUniformBlock::new(
                MAT4_SIZE * MAX_BONES,
                config.max_animated_objects as usize,
                limits.min_uniform_buffer_offset_alignment,
            )
        });

        let objects = build_target_objects(&TargetBuild {
            device: device.as_ref(),
            source: setup.source,
            pipeline_name: &setup.pipeline_name,
            target: setup.target,
            shader: &setup.shader,
            skinned_shader: setup.skinned_shader.as_ref(),
            swapchain: &swapchain,
            gbuffer: &gbuffer,
            render_texture: None,
            clear_colour: config.clear_colour,
            width,
            height,
            max_objects: config.max_objects,
            default_texture: &default_texture,
            user_binding: user.as_ref().map(|u| u.binding),
        })?;

        let skinning = match (setup.skinned_shader, skinned_block, objects.skinned) {
            (Some(shader), Some(block), Some((pipeline, default_set))) => {
                let buffer = device.create_uniform_buffer(UniformBufferDesc::dynamic("joint_uniforms", block.size() as u64))?;
                Some(Skinning { shader, pipeline, default_set, block, buffer, slots: Vec::new() })
            }
            _ => None,
        };

        let primaries = create_primaries(device.as_ref(), buffer_count)?;

        let renderer = Self {
            source: setup.source,
            pipeline_name: setup.pipeline_name,
            target: setup.target,
            device,
            swapchain,
            gbuffer,
            clear_colour: config.clear_colour,
            config,
            width,
            height,
            current_buffer_id: 0,
            render_texture: None,
            render_to_gbuffer: false,
            queue: CommandQueue::new(),
            system: SystemUniforms::default(),
            system_buffer,
            light_buffer,
            model_block,
            model_buffer,
            skinning,
            user,
            shader: setup.shader,
            render_pass: objects.render_pass,
            pipeline: objects.pipeline,
            default_texture,
            default_set: objects.default_set,
            framebuffers: objects.framebuffers,
            secondaries: (0..buffer_count).map(|_| Vec::new()).collect(),
            primaries,
            stats: RendererStats::default(),
        };
        renderer.bind_scene_descriptors()?;

        crate::engine_info!(
            renderer.source,
            "Initialised '{}' ({}x{}, {} buffers, {} framebuffers)",
            renderer.pipeline_name,
            width,
            height,
            buffer_count,
            renderer.framebuffers.len()
        );

        Ok(renderer)
    }

    // ===== ACCESSORS =====

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn render_pass(&self) -> &Arc<dyn RenderPass> {
        &self.render_pass
    }

    pub fn pipeline(&self) -> &Arc<dyn Pipeline> {
        &self.pipeline
    }

    pub fn skinned_pipeline(&self) -> Option<&Arc<dyn Pipeline>> {
        self.skinning.as_ref().map(|s| &s.pipeline)
    }

    pub fn framebuffers(&self) -> &[Arc<dyn Framebuffer>] {
        &self.framebuffers
    }

    pub fn model_block(&self) -> &DynamicUniformBlock {
        &self.model_block
    }

    pub fn model_buffer(&self) -> &Arc<dyn UniformBuffer> {
        &self.model_buffer
    }

    /// Material user uniforms, if the shader declares a fragment user block
    pub fn user_buffer(&self) -> Option<&Arc<dyn UniformBuffer>> {
        self.user.as_ref().map(|u| &u.buffer)
    }

    pub fn joint_buffer(&self) -> Option<&Arc<dyn UniformBuffer>> {
        self.skinning.as_ref().map(|s| &s.buffer)
    }

    pub fn primary(&self, buffer_index: usize) -> &CommandBuffer {
        &self.primaries[buffer_index]
    }

    pub fn primary_count(&self) -> usize {
        self.primaries.len()
    }

    /// Secondary buffers allocated for `buffer_index` so far
    pub fn secondary_count(&self, buffer_index: usize) -> usize {
        self.secondaries[buffer_index].len()
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn system_uniforms(&self) -> &SystemUniforms {
        &self.system
    }

    pub fn stats(&self) -> RendererStats {
        self.stats
    }

    pub fn clear_colour(&self) -> [f32; 4] {
        self.clear_colour
    }

    pub fn set_clear_colour(&mut self, colour: [f32; 4]) {
        self.clear_colour = colour;
    }

    pub fn current_buffer_id(&self) -> usize {
        self.current_buffer_id
    }

    pub fn set_current_buffer_id(&mut self, index: usize) {
        crate::engine_assert!(
            index < self.primaries.len(),
            self.source,
            "Buffer index {} out of range ({} primary buffers)",
            index,
            self.primaries.len()
        );
        self.current_buffer_id = index;
    }

    /// Follow the swapchain's acquired image
    pub fn update_current_buffer_id(&mut self) -> Result<()> {
        let index = lock_swapchain(&self.swapchain, self.source)?.current_buffer_index();
        self.set_current_buffer_id(index);
        Ok(())
    }

    pub fn render_texture(&self) -> Option<&Arc<dyn Texture>> {
        self.render_texture.as_ref()
    }

    /// True if frames go to a texture instead of the swapchain
    pub fn renders_offscreen(&self) -> bool {
        self.target == TargetLayout::GBuffer || self.render_texture.is_some()
    }

    // ===== RENDER TARGET =====

    /// Draw into `texture` (or back to the swapchain with `None`)
    pub fn set_render_target(&mut self, texture: Option<Arc<dyn Texture>>, rebuild: bool) -> Result<()> {
        self.render_texture = texture;
        if rebuild {
            self.rebuild(self.width, self.height)?;
        }
        Ok(())
    }

    /// Draw into the GBuffer's `Offscreen0` texture
    pub fn set_render_to_gbuffer_texture(&mut self, enabled: bool) -> Result<()> {
        self.render_to_gbuffer = enabled;
        let texture = if enabled {
            Some(read_gbuffer(&self.gbuffer, self.source)?.texture(GBufferTexture::Offscreen0))
        } else {
            None
        };
        self.set_render_target(texture, true)
    }

    // ===== FRAME PROTOCOL =====

    pub fn begin(&mut self) -> Result<()> {
        self.queue.clear();
        self.stats = RendererStats::default();

        let framebuffer = self.current_framebuffer();
        let primary = &mut self.primaries[self.current_buffer_id];
        primary.begin_recording()?;
        primary.begin_render_pass(
            self.render_pass.as_ref(),
            framebuffer.as_ref(),
            self.clear_colour,
            SubpassContents::Secondary,
            framebuffer.width(),
            framebuffer.height(),
        )
    }

    pub fn begin_scene(&mut self, camera: &Camera, lights: &[Light]) {
        self.system.begin_scene(camera, lights);
    }

    pub fn submit(&mut self, command: RenderCommand) {
        crate::engine_assert!(
            self.queue.len() < self.model_block.capacity(),
            self.source,
            "Command queue full ({} objects)",
            self.model_block.capacity()
        );
        if let (Some(skinning), true) = (&self.skinning, command.is_skinned()) {
            let skinned = self.queue.iter().filter(|c| c.is_skinned()).count();
            crate::engine_assert!(
                skinned < skinning.block.capacity(),
                self.source,
                "Skinned command queue full ({} animated objects)",
                skinning.block.capacity()
            );
        }
        self.queue.push(command);
    }

    pub fn set_system_uniforms(&mut self) -> Result<()> {
        self.shader.set_system_uniform_buffer(ShaderType::Vertex, self.system.vertex_bytes());
        self.system_buffer.set_data(self.system.vertex_bytes())?;

        for (index, command) in self.queue.iter().enumerate() {
            self.model_block.write(index, &command.transform);
        }
        if !self.queue.is_empty() {
            self.model_buffer.update(0, self.model_block.used_bytes(self.queue.len()))?;
        }

        if let Some(user) = &mut self.user {
            let element_size = user.block.element_size();
            for (index, command) in self.queue.iter().enumerate() {
                let data = command.mesh.material().map_or(&[][..], |m| m.user_uniforms());
                if data.len() > element_size {
                    crate::engine_warn!(
                        self.source,
                        "{} bytes of user uniforms on '{}', the shader block holds {}",
                        data.len(),
                        command.mesh.name(),
                        element_size
                    );
                }
                user.block.write_padded(index, &data[..data.len().min(element_size)]);
            }
            if !self.queue.is_empty() {
                user.buffer.update(0, user.block.used_bytes(self.queue.len()))?;
            }
        }

        self.shader.set_system_uniform_buffer(ShaderType::Fragment, self.system.fragment_bytes());
        self.light_buffer.set_data(self.system.fragment_bytes())?;

        if let Some(skinning) = &mut self.skinning {
            skinning.shader.set_system_uniform_buffer(ShaderType::Vertex, self.system.vertex_bytes());
            skinning.shader.set_system_uniform_buffer(ShaderType::Fragment, self.system.fragment_bytes());

            skinning.slots.clear();
            let mut next = 0;
            for command in self.queue.iter() {
                let Some(joints) = &command.joint_transforms else {
                    skinning.slots.push(None);
                    continue;
                };
                if joints.len() > MAX_BONES {
                    crate::engine_warn!(self.source, "{} joints on '{}', keeping {}", joints.len(), command.mesh.name(), MAX_BONES);
                }
                skinning.block.write_slice(next, &joints[..joints.len().min(MAX_BONES)]);
                skinning.slots.push(Some(next));
                next += 1;
            }
            if next > 0 {
                skinning.buffer.update(0, skinning.block.used_bytes(next))?;
            }
        }

        Ok(())
    }

    pub fn present(&mut self) -> Result<()> {
        let buffer_index = self.current_buffer_id;
        let framebuffer = self.current_framebuffer();
        let (width, height) = (framebuffer.width(), framebuffer.height());

        while self.secondaries[buffer_index].len() < self.queue.len() {
            let secondary = CommandBuffer::init(self.device.as_ref(), CommandBufferLevel::Secondary)?;
            self.secondaries[buffer_index].push(secondary);
        }

        for (position, command) in self.queue.iter().enumerate() {
            let model_offset = self.model_block.offset(position) as u32;
            let skinned = self
                .skinning
                .as_ref()
                .and_then(|s| s.slots.get(position).copied().flatten().map(|slot| (s, slot)));

            // Dynamic offsets follow binding order within the scene set
            let mut dynamic = vec![(MODEL_BINDING, model_offset)];
            let (pipeline, default_set) = match skinned {
                Some((skinning, slot)) => {
                    dynamic.push((JOINT_BINDING, skinning.block.offset(slot) as u32));
                    (&skinning.pipeline, &skinning.default_set)
                }
                None => (&self.pipeline, &self.default_set),
            };
            if let Some(user) = &self.user {
                dynamic.push((user.binding, user.block.offset(position) as u32));
            }
            dynamic.sort_by_key(|(binding, _)| *binding);
            let offsets: Vec<u32> = dynamic.into_iter().map(|(_, offset)| offset).collect();

            let mesh = &command.mesh;
            let mesh_set = match mesh.material() {
                Some(material) => {
                    if self.user.is_none() && !material.user_uniforms().is_empty() {
                        crate::engine_warn!(
                            self.source,
                            "Material '{}' has user uniforms but '{}' declares no user block",
                            material.name(),
                            pipeline.shader().name()
                        );
                    }
                    material.prepare_descriptor_set(self.device.as_ref(), pipeline.as_ref(), &self.default_texture)?
                }
                None => default_set.clone(),
            };

            let secondary = &mut self.secondaries[buffer_index][position];
            secondary.begin_recording_secondary(self.render_pass.as_ref(), framebuffer.as_ref())?;
            secondary.update_viewport(width, height)?;
            secondary.bind_pipeline(pipeline.as_ref())?;
            secondary.bind_descriptor_sets(
                pipeline.as_ref(),
                SCENE_DESCRIPTOR_SET,
                &[pipeline.descriptor_set().as_ref(), mesh_set.as_ref()],
                &offsets,
            )?;
            secondary.push_constants(pipeline.as_ref(), ShaderType::Vertex, 0, bytemuck::bytes_of(&command.texture_matrix))?;
            secondary.bind_vertex_buffer(mesh.vertex_buffer().as_ref())?;
            secondary.bind_index_buffer(mesh.index_buffer().as_ref(), mesh.index_type())?;
            secondary.draw_indexed(mesh.index_count(), 0)?;
            secondary.end_recording()?;
            secondary.execute_secondary(&mut self.primaries[buffer_index])?;

            self.stats.draw_calls += 1;
            self.stats.triangles += mesh.index_count() / 3;
            self.stats.secondary_buffers += 1;
        }

        Ok(())
    }

    pub fn end(&mut self) -> Result<()> {
        let offscreen = self.renders_offscreen();
        let primary = &mut self.primaries[self.current_buffer_id];
        primary.end_render_pass()?;
        primary.end_recording()?;

        // Later passes sample the target this frame.
        if offscreen {
            primary.execute(true)?;
        }
        Ok(())
    }

    pub fn present_to_screen(&mut self) -> Result<()> {
        if self.renders_offscreen() {
            crate::engine_warn!(self.source, "present_to_screen called while rendering off-screen");
            return Ok(());
        }
        let mut swapchain = lock_swapchain(&self.swapchain, self.source)?;
        self.primaries[self.current_buffer_id].present(&mut *swapchain)
    }

    // ===== RESIZE =====

    /// Replace render pass, pipelines, framebuffers and command buffers in one step
    ///
    /// Everything new is built before anything old is released; on error the
    /// renderer keeps its previous state.
    pub fn rebuild(&mut self, width: u32, height: u32) -> Result<()> {
        self.device.wait_idle()?;

        if self.render_to_gbuffer {
            self.render_texture = Some(read_gbuffer(&self.gbuffer, self.source)?.texture(GBufferTexture::Offscreen0));
        }

        let objects = build_target_objects(&TargetBuild {
            device: self.device.as_ref(),
            source: self.source,
            pipeline_name: &self.pipeline_name,
            target: self.target,
            shader: &self.shader,
            skinned_shader: self.skinning.as_ref().map(|s| &s.shader),
            swapchain: &self.swapchain,
            gbuffer: &self.gbuffer,
            render_texture: self.render_texture.as_ref(),
            clear_colour: self.clear_colour,
            width,
            height,
            max_objects: self.config.max_objects,
            default_texture: &self.default_texture,
            user_binding: self.user.as_ref().map(|u| u.binding),
        })?;

        let buffer_count = lock_swapchain(&self.swapchain, self.source)?.buffer_count();
        let extra_primaries = create_primaries(self.device.as_ref(), buffer_count.saturating_sub(self.primaries.len()))?;

        // Commit
        self.render_pass = objects.render_pass;
        self.pipeline = objects.pipeline;
        self.default_set = objects.default_set;
        self.framebuffers = objects.framebuffers;
        if let (Some(skinning), Some((pipeline, default_set))) = (&mut self.skinning, objects.skinned) {
            skinning.pipeline = pipeline;
            skinning.default_set = default_set;
        }

        self.primaries.truncate(buffer_count);
        self.primaries.extend(extra_primaries);
        self.secondaries.resize_with(buffer_count, Vec::new);
        if self.current_buffer_id >= buffer_count {
            self.current_buffer_id = 0;
        }

        self.width = width;
        self.height = height;
        self.bind_scene_descriptors()?;

        crate::engine_debug!(self.source, "Rebuilt at {}x{} ({} buffers)", width, height, buffer_count);
        Ok(())
    }

    // ===== INTERNALS =====

    fn current_framebuffer(&self) -> Arc<dyn Framebuffer> {
        let index = if self.framebuffers.len() == 1 { 0 } else { self.current_buffer_id };
        self.framebuffers[index].clone()
    }

    /// Point the scene sets (set 0) of every pipeline at the uniform buffers
    fn bind_scene_descriptors(&self) -> Result<()> {
        let mut buffers = vec![
            BufferInfo {
                buffer: self.system_buffer.clone(),
                offset: 0,
                size: SystemUniforms::vertex_size(),
                descriptor_type: DescriptorType::UniformBuffer,
                binding: SYSTEM_BINDING,
                stage: ShaderType::Vertex,
            },
            BufferInfo {
                buffer: self.model_buffer.clone(),
                offset: 0,
                size: MAT4_SIZE as u64,
                descriptor_type: DescriptorType::UniformBufferDynamic,
                binding: MODEL_BINDING,
                stage: ShaderType::Vertex,
            },
            BufferInfo {
                buffer: self.light_buffer.clone(),
                offset: 0,
                size: SystemUniforms::fragment_size(),
                descriptor_type: DescriptorType::UniformBuffer,
                binding: LIGHT_BINDING,
                stage: ShaderType::Fragment,
            },
        ];
        if let Some(user) = &self.user {
            buffers.push(BufferInfo {
                buffer: user.buffer.clone(),
                offset: 0,
                size: user.block.element_size() as u64,
                descriptor_type: DescriptorType::UniformBufferDynamic,
                binding: user.binding,
                stage: ShaderType::Fragment,
            });
        }
        self.pipeline.descriptor_set().update(&buffers, &[])?;

        if let Some(skinning) = &self.skinning {
            buffers.push(BufferInfo {
                buffer: skinning.buffer.clone(),
                offset: 0,
                size: skinning.block.element_size() as u64,
                descriptor_type: DescriptorType::UniformBufferDynamic,
                binding: JOINT_BINDING,
                stage: ShaderType::Vertex,
            });
            buffers.sort_by_key(|b| b.binding);
            skinning.pipeline.descriptor_set().update(&buffers, &[])?;
        }
        Ok(())
    }
}

impl Drop for RendererBase {
    fn drop(&mut self) {
        let _ = self.device.wait_idle();
    }
}

// ===== CONSTRUCTION HELPERS =====

/// Binding and byte size of the shader's fragment user block, if it declares one
fn user_block_layout(shader: &dyn Shader, source: &str) -> Result<Option<(u32, usize)>> {
    let Some(block) = shader.user_uniform_buffer(ShaderType::Fragment) else {
        return Ok(None);
    };
    if block.size == 0 {
        crate::engine_warn!(source, "User block '{}' of '{}' is empty, ignored", block.name, shader.name());
        return Ok(None);
    }

    let binding = block.binding.unwrap_or(USER_BINDING);
    if RESERVED_BINDINGS.contains(&binding) {
        crate::engine_error!(
            source,
            "User block '{}' of '{}' uses binding {}, reserved for scene uniforms",
            block.name,
            shader.name(),
            binding
        );
        return Err(Error::InvalidResource(format!(
            "user uniform block '{}' uses reserved binding {}",
            block.name, binding
        )));
    }
    Ok(Some((binding, block.size as usize)))
}

fn lock_swapchain<'a>(swapchain: &'a SharedSwapchain, source: &str) -> Result<MutexGuard<'a, dyn Swapchain + 'static>> {
    swapchain.lock().map_err(|_| crate::engine_err!(source, "Swapchain lock poisoned"))
}

fn read_gbuffer<'a>(
    gbuffer: &'a SharedGBuffer,
    source: &str,
) -> Result<std::sync::RwLockReadGuard<'a, crate::renderer::GBuffer>> {
    gbuffer.read().map_err(|_| crate::engine_err!(source, "GBuffer lock poisoned"))
}

fn create_primaries(device: &dyn GraphicsDevice, count: usize) -> Result<Vec<CommandBuffer>> {
    (0..count)
        .map(|_| CommandBuffer::init(device, CommandBufferLevel::Primary))
        .collect()
}

struct TargetBuild<'a> {
    device: &'a dyn GraphicsDevice,
    source: &'static str,
    pipeline_name: &'a str,
    target: TargetLayout,
    shader: &'a Arc<dyn Shader>,
    skinned_shader: Option<&'a Arc<dyn Shader>>,
    swapchain: &'a SharedSwapchain,
    gbuffer: &'a SharedGBuffer,
    render_texture: Option<&'a Arc<dyn Texture>>,
    clear_colour: [f32; 4],
    width: u32,
    height: u32,
    max_objects: u32,
    default_texture: &'a Arc<dyn Texture>,
    user_binding: Option<u32>,
}

fn build_target_objects(build: &TargetBuild) -> Result<TargetObjects> {
    let render_pass = build.device.create_render_pass(&render_pass_info(build))?;
    let colour_count = render_pass.colour_attachment_count() as u32;

    let pipeline = build.device.create_pipeline(pipeline_info(build, &render_pass, build.shader, false, colour_count))?;
    let default_set = default_descriptor_set(build, &pipeline)?;

    let skinned = match build.skinned_shader {
        Some(shader) => {
            let pipeline = build.device.create_pipeline(pipeline_info(build, &render_pass, shader, true, colour_count))?;
            let set = default_descriptor_set(build, &pipeline)?;
            Some((pipeline, set))
        }
        None => None,
    };

    let framebuffers = build_framebuffers(build, &render_pass)?;

    Ok(TargetObjects { render_pass, pipeline, default_set, skinned, framebuffers })
}

fn render_pass_info(build: &TargetBuild) -> RenderPassInfo {
    let depth = AttachmentInfo::new(TextureType::Depth, TextureFormat::Depth);
    let attachments = match build.target {
        TargetLayout::Forward => {
            let colour_format = build.render_texture.map_or(TextureFormat::Screen, |t| t.format());
            vec![AttachmentInfo::new(TextureType::Colour, colour_format), depth]
        }
        TargetLayout::GBuffer => GBufferTexture::DEFERRED_TARGETS
            .iter()
            .map(|slot| AttachmentInfo::new(TextureType::Colour, slot.format()))
            .chain(std::iter::once(depth))
            .collect(),
    };
    RenderPassInfo { attachments, clear: true }
}

fn pipeline_info(
    build: &TargetBuild,
    render_pass: &Arc<dyn RenderPass>,
    shader: &Arc<dyn Shader>,
    skinned: bool,
    colour_attachment_count: u32,
) -> PipelineInfo {
    let entry = |descriptor_type, stage, binding| DescriptorLayoutInfo { descriptor_type, stage, binding };

    let mut scene_layout = DescriptorLayout {
        bindings: vec![
            entry(DescriptorType::UniformBuffer, ShaderType::Vertex, SYSTEM_BINDING),
            entry(DescriptorType::UniformBufferDynamic, ShaderType::Vertex, MODEL_BINDING),
            entry(DescriptorType::UniformBuffer, ShaderType::Fragment, LIGHT_BINDING),
        ],
    };
    if skinned {
        scene_layout
            .bindings
            .push(entry(DescriptorType::UniformBufferDynamic, ShaderType::Vertex, JOINT_BINDING));
    }
    if let Some(binding) = build.user_binding {
        scene_layout
            .bindings
            .push(entry(DescriptorType::UniformBufferDynamic, ShaderType::Fragment, binding));
    }
    scene_layout.bindings.sort_by_key(|b| b.binding);
    let mesh_layout = DescriptorLayout {
        bindings: vec![entry(DescriptorType::ImageSampler, ShaderType::Fragment, 0)],
    };

    let pool = |descriptor_type| DescriptorPoolInfo { descriptor_type, count: build.max_objects };
    let vertex_layout: VertexLayout = if skinned { SkinnedVertex::layout() } else { Vertex::layout() };

    PipelineInfo {
        name: if skinned { format!("{}Anim", build.pipeline_name) } else { build.pipeline_name.to_string() },
        shader: shader.clone(),
        render_pass: render_pass.clone(),
        vertex_layout,
        descriptor_layouts: vec![scene_layout, mesh_layout],
        pool_sizes: vec![
            pool(DescriptorType::UniformBuffer),
            pool(DescriptorType::UniformBufferDynamic),
            pool(DescriptorType::ImageSampler),
        ],
        push_constants: vec![PushConstantRange { stage: ShaderType::Vertex, offset: 0, size: PUSH_CONSTANT_SIZE }],
        cull_mode: CullMode::Back,
        transparency_enabled: false,
        depth_bias_enabled: false,
        wireframe_enabled: false,
        width: build.width,
        height: build.height,
        max_objects: build.max_objects,
        colour_attachment_count,
    }
}

/// Per-mesh set binding the checkerboard, used by meshes without a material
fn default_descriptor_set(build: &TargetBuild, pipeline: &Arc<dyn Pipeline>) -> Result<Arc<dyn DescriptorSet>> {
    let set = build.device.create_descriptor_set(&DescriptorSetInfo {
        pipeline: pipeline.as_ref(),
        layout_index: MESH_DESCRIPTOR_SET,
        shader: pipeline.shader().as_ref(),
    })?;
    set.update(&[], &[ImageInfo {
        texture: build.default_texture.clone(),
        binding: 0,
        name: ALBEDO_SAMPLER.to_string(),
    }])?;
    Ok(set)
}

fn build_framebuffers(build: &TargetBuild, render_pass: &Arc<dyn RenderPass>) -> Result<Vec<Arc<dyn Framebuffer>>> {
    let gbuffer = read_gbuffer(build.gbuffer, build.source)?;
    let depth = gbuffer.depth();

    let colour_sets: Vec<Vec<Arc<dyn Texture>>> = match (build.target, build.render_texture) {
        (TargetLayout::GBuffer, _) => vec![
            GBufferTexture::DEFERRED_TARGETS.iter().map(|slot| gbuffer.texture(*slot)).collect(),
        ],
        (TargetLayout::Forward, Some(texture)) => vec![vec![texture.clone()]],
        (TargetLayout::Forward, None) => {
            let swapchain = lock_swapchain(build.swapchain, build.source)?;
            (0..swapchain.buffer_count()).map(|i| vec![swapchain.image(i)]).collect()
        }
    };

    let mut framebuffers = Vec::with_capacity(colour_sets.len());
    for (index, colours) in colour_sets.into_iter().enumerate() {
        let mut builder = FramebufferBuilder::new(&format!("{}_{}", build.pipeline_name, index), render_pass.clone());
        for colour in colours {
            builder.add_texture_attachment(colour);
        }
        builder.add_texture_attachment(depth.clone());
        builder.set_clear_colour(build.clear_colour);

        let framebuffer = builder.build(build.device)?;
        if framebuffer.width() != build.width || framebuffer.height() != build.height {
            crate::engine_warn!(
                build.source,
                "Framebuffer is {}x{} but the renderer targets {}x{}",
                framebuffer.width(),
                framebuffer.height(),
                build.width,
                build.height
            );
        }
        framebuffers.push(framebuffer);
    }
    Ok(framebuffers)
}
