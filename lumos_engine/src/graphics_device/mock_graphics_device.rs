/// Mock graphics device for unit tests (no GPU required)
///
/// Every mock records what it was asked to do. Command buffers keep their
/// recorded commands as strings; device-level events (submissions, fence
/// operations, resource creation) go to a log shared with the device so a
/// test can assert on the exact sequence.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use crate::error::Result;
use crate::graphics_device::{
    AttachmentInfo, AttachmentKind, Buffer, BufferDesc, BufferInfo, BufferUsage,
    CommandBufferLevel, DescriptorLayout, DescriptorSet, DescriptorSetInfo, DescriptorType,
    DeviceLimits, Framebuffer, FramebufferAttachment, FramebufferInfo, GraphicsApi, GraphicsDevice, ImageInfo,
    IndexType, NativeCommandBuffer, Pipeline, PipelineId, PipelineInfo, RenderPass,
    RenderPassInfo, Shader, ShaderDesc, ShaderReflection, ShaderType, SubpassContents,
    Swapchain, Texture, TextureDesc, TextureFormat, TextureType, UniformBuffer,
    UniformBufferDesc, check_buffer_range,
};

/// Shared, ordered event log
pub type EventLog = Arc<Mutex<Vec<String>>>;

fn record(log: &EventLog, event: String) {
    if let Ok(mut events) = log.lock() {
        events.push(event);
    }
}

// ============================================================================
// Mock Texture
// ============================================================================

#[derive(Debug)]
pub struct MockTexture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub texture_type: TextureType,
    pub layer_count: u32,
    pub file_path: Option<PathBuf>,
    pub data: Option<Vec<u8>>,
}

impl MockTexture {
    pub fn new(name: &str, width: u32, height: u32, texture_type: TextureType) -> Self {
        let format = match texture_type {
            TextureType::Depth | TextureType::DepthArray => TextureFormat::Depth,
            TextureType::Swapchain => TextureFormat::Screen,
            _ => TextureFormat::Rgba8,
        };
        Self {
            name: name.to_string(),
            width,
            height,
            format,
            texture_type,
            layer_count: if texture_type == TextureType::Cube { 6 } else { 1 },
            file_path: None,
            data: None,
        }
    }
}

impl Texture for MockTexture {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    fn layer_count(&self) -> u32 {
        self.layer_count
    }

    fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Buffers
// ============================================================================

#[derive(Debug)]
pub struct MockBuffer {
    pub name: String,
    pub usage: BufferUsage,
    pub data: Mutex<Vec<u8>>,
}

impl MockBuffer {
    pub fn new(name: &str, size: u64, usage: BufferUsage) -> Self {
        Self {
            name: name.to_string(),
            usage,
            data: Mutex::new(vec![0; size as usize]),
        }
    }
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.data.lock().map(|d| d.len() as u64).unwrap_or(0)
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        check_buffer_range("lumos::MockBuffer", self.size(), offset, data.len())?;
        if let Ok(mut contents) = self.data.lock() {
            let start = offset as usize;
            contents[start..start + data.len()].copy_from_slice(data);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct MockUniformBuffer {
    pub name: String,
    pub dynamic: bool,
    pub data: Mutex<Vec<u8>>,
}

impl MockUniformBuffer {
    pub fn new(name: &str, size: u64, dynamic: bool) -> Self {
        Self {
            name: name.to_string(),
            dynamic,
            data: Mutex::new(vec![0; size as usize]),
        }
    }

    /// Copy of `len` bytes starting at `offset`
    pub fn read(&self, offset: usize, len: usize) -> Vec<u8> {
        self.data.lock().map(|d| d[offset..offset + len].to_vec()).unwrap_or_default()
    }
}

impl UniformBuffer for MockUniformBuffer {
    fn size(&self) -> u64 {
        self.data.lock().map(|d| d.len() as u64).unwrap_or(0)
    }

    fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        check_buffer_range("lumos::MockUniformBuffer", self.size(), offset, data.len())?;
        if let Ok(mut contents) = self.data.lock() {
            let start = offset as usize;
            contents[start..start + data.len()].copy_from_slice(data);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Shader
// ============================================================================

#[derive(Debug)]
pub struct MockShader {
    pub name: String,
    pub file_path: PathBuf,
    pub types: Vec<ShaderType>,
    pub reflection: ShaderReflection,
    /// (stage, bytes) pairs staged through `set_system_uniform_buffer`
    pub system_uploads: Mutex<Vec<(ShaderType, usize)>>,
}

impl MockShader {
    pub fn new(name: &str) -> Self {
        Self::from_desc(ShaderDesc::from_source(name, ""))
    }

    pub fn from_desc(desc: ShaderDesc) -> Self {
        let reflection = ShaderReflection::from_sources(&desc.glsl_sources());
        Self {
            types: desc.shader_types(),
            name: desc.name,
            file_path: desc.file_path,
            reflection,
            system_uploads: Mutex::new(Vec::new()),
        }
    }
}

impl Shader for MockShader {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn shader_types(&self) -> Vec<ShaderType> {
        self.types.clone()
    }

    fn reflection(&self) -> &ShaderReflection {
        &self.reflection
    }

    fn set_system_uniform_buffer(&self, stage: ShaderType, data: &[u8]) {
        if let Ok(mut uploads) = self.system_uploads.lock() {
            uploads.push((stage, data.len()));
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock RenderPass / Framebuffer
// ============================================================================

#[derive(Debug)]
pub struct MockRenderPass {
    pub attachments: Vec<AttachmentInfo>,
    pub clear: bool,
}

impl MockRenderPass {
    pub fn new(info: &RenderPassInfo) -> Self {
        Self { attachments: info.attachments.clone(), clear: info.clear }
    }
}

impl RenderPass for MockRenderPass {
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

#[derive(Debug)]
pub struct MockFramebuffer {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub kinds: Vec<AttachmentKind>,
    pub depth_roles: Vec<bool>,
    pub clear_colour: [f32; 4],
    pub screen: bool,
}

impl MockFramebuffer {
    pub fn new(info: &FramebufferInfo) -> Self {
        Self {
            name: info.name.clone(),
            width: info.width,
            height: info.height,
            kinds: info.attachments.iter().map(|a| a.kind).collect(),
            depth_roles: info.attachments.iter().map(FramebufferAttachment::is_depth).collect(),
            clear_colour: info.clear_colour,
            screen: info.screen,
        }
    }
}

impl Framebuffer for MockFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn attachment_count(&self) -> usize {
        self.kinds.len()
    }

    fn attachment_kinds(&self) -> Vec<AttachmentKind> {
        self.kinds.clone()
    }

    fn depth_roles(&self) -> Vec<bool> {
        self.depth_roles.clone()
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

// ============================================================================
// Mock Pipeline / DescriptorSet
// ============================================================================

/// Bindings written by one `DescriptorSet::update` call
#[derive(Debug, Clone, PartialEq)]
pub struct MockDescriptorWrite {
    pub buffer_bindings: Vec<u32>,
    pub image_bindings: Vec<u32>,
    pub image_names: Vec<String>,
}

#[derive(Debug)]
pub struct MockDescriptorSet {
    pub layout_index: u32,
    pub pipeline_id: PipelineId,
    pub dynamic_count: u32,
    pub writes: Mutex<Vec<MockDescriptorWrite>>,
}

impl MockDescriptorSet {
    pub fn new(layout_index: u32, pipeline_id: PipelineId, dynamic_count: u32) -> Self {
        Self { layout_index, pipeline_id, dynamic_count, writes: Mutex::new(Vec::new()) }
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|w| w.len()).unwrap_or(0)
    }
}

impl DescriptorSet for MockDescriptorSet {
    fn layout_index(&self) -> u32 {
        self.layout_index
    }

    fn pipeline_id(&self) -> PipelineId {
        self.pipeline_id
    }

    fn dynamic_count(&self) -> u32 {
        self.dynamic_count
    }

    fn update(&self, buffers: &[BufferInfo], images: &[ImageInfo]) -> Result<()> {
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(MockDescriptorWrite {
                buffer_bindings: buffers.iter().map(|b| b.binding).collect(),
                image_bindings: images.iter().map(|i| i.binding).collect(),
                image_names: images.iter().map(|i| i.name.clone()).collect(),
            });
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn dynamic_binding_count(layout: Option<&DescriptorLayout>) -> u32 {
    layout
        .map(|l| l.bindings.iter().filter(|b| b.descriptor_type == DescriptorType::UniformBufferDynamic).count() as u32)
        .unwrap_or(0)
}

pub struct MockPipeline {
    pub id: PipelineId,
    pub name: String,
    pub shader: Arc<dyn Shader>,
    pub descriptor_layouts: Vec<DescriptorLayout>,
    pub width: u32,
    pub height: u32,
    pub descriptor_set: Arc<dyn DescriptorSet>,
}

impl MockPipeline {
    pub fn new(info: &PipelineInfo) -> Self {
        let id = PipelineId::next();
        let dynamic_count = dynamic_binding_count(info.descriptor_layouts.first());
        Self {
            id,
            name: info.name.clone(),
            shader: info.shader.clone(),
            descriptor_layouts: info.descriptor_layouts.clone(),
            width: info.width,
            height: info.height,
            descriptor_set: Arc::new(MockDescriptorSet::new(0, id, dynamic_count)),
        }
    }
}

impl Pipeline for MockPipeline {
    fn id(&self) -> PipelineId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn shader(&self) -> &Arc<dyn Shader> {
        &self.shader
    }

    fn descriptor_set(&self) -> &Arc<dyn DescriptorSet> {
        &self.descriptor_set
    }

    fn descriptor_layout_count(&self) -> usize {
        self.descriptor_layouts.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock CommandBuffer
// ============================================================================

/// Records commands as strings; fence and submit activity goes to `events`
pub struct MockCommandBuffer {
    pub id: usize,
    pub level: CommandBufferLevel,
    pub commands: Vec<String>,
    pub fence_signaled: bool,
    pub events: EventLog,
    /// Commands of every submission, in order
    pub submissions: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockCommandBuffer {
    pub fn new(id: usize, level: CommandBufferLevel, events: EventLog, submissions: Arc<Mutex<Vec<Vec<String>>>>) -> Self {
        Self { id, level, commands: Vec::new(), fence_signaled: true, events, submissions }
    }

    /// Standalone buffer with its own logs
    pub fn standalone(level: CommandBufferLevel) -> Self {
        Self::new(0, level, EventLog::default(), Arc::default())
    }

    fn event(&self, what: &str) {
        record(&self.events, format!("cb{} {}", self.id, what));
    }
}

impl NativeCommandBuffer for MockCommandBuffer {
    fn begin(&mut self) -> Result<()> {
        self.commands.clear();
        self.commands.push("begin".to_string());
        Ok(())
    }

    fn begin_secondary(&mut self, _render_pass: &dyn RenderPass, _framebuffer: &dyn Framebuffer) -> Result<()> {
        self.commands.clear();
        self.commands.push("begin_secondary".to_string());
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.commands.push("end".to_string());
        Ok(())
    }

    fn submit(&mut self) -> Result<()> {
        self.event("submit");
        if let Ok(mut submissions) = self.submissions.lock() {
            submissions.push(self.commands.clone());
        }
        // The mock GPU completes work immediately.
        self.fence_signaled = true;
        Ok(())
    }

    fn wait_fence(&mut self) -> Result<()> {
        self.event("wait_fence");
        Ok(())
    }

    fn reset_fence(&mut self) -> Result<()> {
        self.event("reset_fence");
        self.fence_signaled = false;
        Ok(())
    }

    fn is_fence_signaled(&self) -> Result<bool> {
        Ok(self.fence_signaled)
    }

    fn execute_secondary(&mut self, secondary: &dyn NativeCommandBuffer) -> Result<()> {
        let Some(secondary) = secondary.as_any().downcast_ref::<MockCommandBuffer>() else {
            crate::engine_bail!("lumos::MockCommandBuffer", "secondary is not a MockCommandBuffer");
        };
        self.commands.push("execute_secondary".to_string());
        self.commands.extend(secondary.commands.iter().map(|c| format!("  {}", c)));
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) -> Result<()> {
        self.commands.push(format!("set_viewport {}x{}", width, height));
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        _render_pass: &dyn RenderPass,
        _framebuffer: &dyn Framebuffer,
        _clear_colour: [f32; 4],
        contents: SubpassContents,
        width: u32,
        height: u32,
    ) -> Result<()> {
        self.commands.push(format!("begin_render_pass {:?} {}x{}", contents, width, height));
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.commands.push("end_render_pass".to_string());
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()> {
        self.commands.push(format!("bind_pipeline {}", pipeline.name()));
        Ok(())
    }

    fn bind_descriptor_sets(
        &mut self,
        _pipeline: &dyn Pipeline,
        first_set: u32,
        sets: &[&dyn DescriptorSet],
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        self.commands.push(format!(
            "bind_descriptor_sets first={} count={} offsets={:?}",
            first_set,
            sets.len(),
            dynamic_offsets
        ));
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &dyn Buffer) -> Result<()> {
        let name = buffer.as_any().downcast_ref::<MockBuffer>().map(|b| b.name.as_str()).unwrap_or("?");
        self.commands.push(format!("bind_vertex_buffer {}", name));
        Ok(())
    }

    fn bind_index_buffer(&mut self, _buffer: &dyn Buffer, index_type: IndexType) -> Result<()> {
        self.commands.push(format!("bind_index_buffer {:?}", index_type));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32) -> Result<()> {
        self.commands.push(format!("draw_indexed {} {}", index_count, first_index));
        Ok(())
    }

    fn push_constants(&mut self, _pipeline: &dyn Pipeline, stage: ShaderType, offset: u32, data: &[u8]) -> Result<()> {
        self.commands.push(format!("push_constants {:?} {} {}", stage, offset, data.len()));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

pub struct MockSwapchain {
    pub images: Vec<Arc<dyn Texture>>,
    pub current: usize,
    pub width: u32,
    pub height: u32,
    pub events: EventLog,
}

impl MockSwapchain {
    pub fn new(width: u32, height: u32, image_count: usize, events: EventLog) -> Self {
        let mut swapchain = Self { images: Vec::new(), current: 0, width, height, events };
        swapchain.create_images(image_count);
        swapchain
    }

    fn create_images(&mut self, image_count: usize) {
        self.images = (0..image_count)
            .map(|i| {
                Arc::new(MockTexture::new(&format!("swapchain_{}", i), self.width, self.height, TextureType::Swapchain))
                    as Arc<dyn Texture>
            })
            .collect();
    }
}

impl Swapchain for MockSwapchain {
    fn buffer_count(&self) -> usize {
        self.images.len()
    }

    fn current_buffer_index(&self) -> usize {
        self.current
    }

    fn image(&self, index: usize) -> Arc<dyn Texture> {
        self.images[index].clone()
    }

    fn acquire_next_image(&mut self) -> Result<usize> {
        self.current = (self.current + 1) % self.images.len();
        Ok(self.current)
    }

    fn present(&mut self, command_buffer: &mut dyn NativeCommandBuffer) -> Result<()> {
        command_buffer.submit()?;
        record(&self.events, format!("present {}", self.current));
        Ok(())
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        let count = self.images.len();
        self.create_images(count);
        self.current = 0;
        Ok(())
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> TextureFormat {
        TextureFormat::Screen
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

pub struct MockGraphicsDevice {
    pub limits: DeviceLimits,
    pub events: EventLog,
    pub submissions: Arc<Mutex<Vec<Vec<String>>>>,
    next_command_buffer: Mutex<usize>,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default())
    }

    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self {
            limits,
            events: EventLog::default(),
            submissions: Arc::default(),
            next_command_buffer: Mutex::new(0),
        }
    }

    /// Device events recorded so far
    pub fn events(&self) -> Vec<String> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn clear_events(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
        if let Ok(mut submissions) = self.submissions.lock() {
            submissions.clear();
        }
    }

    /// Command lists of every submission so far
    pub fn submissions(&self) -> Vec<Vec<String>> {
        self.submissions.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Swapchain that shares this device's event log
    pub fn create_swapchain(&self, width: u32, height: u32, image_count: usize) -> MockSwapchain {
        MockSwapchain::new(width, height, image_count, self.events.clone())
    }

    fn event(&self, what: String) {
        record(&self.events, what);
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn api(&self) -> GraphicsApi {
        GraphicsApi::Vulkan
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn create_texture(&self, desc: TextureDesc) -> Result<Arc<dyn Texture>> {
        self.event(format!("create_texture {}", desc.name));
        let mut texture = MockTexture::new(&desc.name, desc.width, desc.height, desc.texture_type);
        texture.format = desc.parameters.format;
        texture.layer_count = desc.layer_count.max(texture.layer_count);
        texture.file_path = desc.file_path;
        texture.data = desc.data;
        Ok(Arc::new(texture))
    }

    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        let buffer = MockBuffer::new(&desc.name, desc.size, desc.usage);
        if let Some(data) = &desc.data {
            buffer.update(0, data)?;
        }
        Ok(Arc::new(buffer))
    }

    fn create_uniform_buffer(&self, desc: UniformBufferDesc) -> Result<Arc<dyn UniformBuffer>> {
        self.event(format!("create_uniform_buffer {} {}", desc.name, desc.size));
        let buffer = MockUniformBuffer::new(&desc.name, desc.size, desc.dynamic);
        if let Some(data) = &desc.data {
            buffer.update(0, data)?;
        }
        Ok(Arc::new(buffer))
    }

    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn Shader>> {
        self.event(format!("create_shader {}", desc.name));
        Ok(Arc::new(MockShader::from_desc(desc)))
    }

    fn create_native_command_buffer(&self, level: CommandBufferLevel) -> Result<Box<dyn NativeCommandBuffer>> {
        let id = match self.next_command_buffer.lock() {
            Ok(mut next) => {
                *next += 1;
                *next
            }
            Err(_) => 0,
        };
        Ok(Box::new(MockCommandBuffer::new(id, level, self.events.clone(), self.submissions.clone())))
    }

    fn create_render_pass(&self, info: &RenderPassInfo) -> Result<Arc<dyn RenderPass>> {
        self.event(format!("create_render_pass {}", info.attachments.len()));
        Ok(Arc::new(MockRenderPass::new(info)))
    }

    fn create_framebuffer(&self, info: FramebufferInfo) -> Result<Arc<dyn Framebuffer>> {
        self.event(format!("create_framebuffer {} {}x{}", info.name, info.width, info.height));
        Ok(Arc::new(MockFramebuffer::new(&info)))
    }

    fn create_pipeline(&self, info: PipelineInfo) -> Result<Arc<dyn Pipeline>> {
        self.event(format!("create_pipeline {} {}x{}", info.name, info.width, info.height));
        Ok(Arc::new(MockPipeline::new(&info)))
    }

    fn create_descriptor_set(&self, info: &DescriptorSetInfo) -> Result<Arc<dyn DescriptorSet>> {
        self.event(format!("create_descriptor_set {} {}", info.pipeline.name(), info.layout_index));
        let dynamic_count = info
            .pipeline
            .as_any()
            .downcast_ref::<MockPipeline>()
            .map(|p| dynamic_binding_count(p.descriptor_layouts.get(info.layout_index as usize)))
            .unwrap_or(0);
        Ok(Arc::new(MockDescriptorSet::new(info.layout_index, info.pipeline.id(), dynamic_count)))
    }

    fn wait_idle(&self) -> Result<()> {
        self.event("wait_idle".to_string());
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
