/// Pipeline trait and pipeline descriptor

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use crate::graphics_device::{DescriptorSet, RenderPass, Shader, ShaderType};

/// Descriptor set index of the per-scene layout (uniform buffers)
pub const SCENE_DESCRIPTOR_SET: u32 = 0;

/// Descriptor set index of the per-mesh layout (image samplers)
pub const MESH_DESCRIPTOR_SET: u32 = 1;

/// Process-unique pipeline identity
///
/// Material descriptor sets remember the id they were built against so a
/// rebuilt pipeline (resize, shader reload) is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId(u64);

static NEXT_PIPELINE_ID: AtomicU64 = AtomicU64::new(1);

impl PipelineId {
    /// Allocate a fresh id (called by backends when a pipeline is created)
    pub fn next() -> Self {
        PipelineId(NEXT_PIPELINE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// Face culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    Front,
    #[default]
    Back,
    FrontAndBack,
    None,
}

/// Vertex attribute data type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float,
    Vec2,
    Vec3,
    Vec4,
    /// Four 32-bit signed integers (joint indices)
    IVec4,
}

impl VertexFormat {
    pub fn size_bytes(self) -> u32 {
        match self {
            VertexFormat::Float => 4,
            VertexFormat::Vec2 => 8,
            VertexFormat::Vec3 => 12,
            VertexFormat::Vec4 | VertexFormat::IVec4 => 16,
        }
    }

    pub fn component_count(self) -> u32 {
        match self {
            VertexFormat::Float => 1,
            VertexFormat::Vec2 => 2,
            VertexFormat::Vec3 => 3,
            VertexFormat::Vec4 | VertexFormat::IVec4 => 4,
        }
    }
}

/// One vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader input location
    pub location: u32,
    pub format: VertexFormat,
    /// Offset from the start of the vertex
    pub offset: u32,
}

/// Interleaved vertex layout (single binding)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VertexLayout {
    /// Bytes per vertex
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Lay attributes out back to back; stride is the total size
    pub fn packed(formats: &[VertexFormat]) -> Self {
        let mut offset = 0;
        let attributes = formats
            .iter()
            .enumerate()
            .map(|(location, format)| {
                let attribute = VertexAttribute { location: location as u32, format: *format, offset };
                offset += format.size_bytes();
                attribute
            })
            .collect();
        Self { stride: offset, attributes }
    }
}

/// Kind of resource bound at a descriptor binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    UniformBuffer,
    /// Uniform buffer bound with a per-draw offset
    UniformBufferDynamic,
    ImageSampler,
}

/// One binding of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorLayoutInfo {
    pub descriptor_type: DescriptorType,
    pub stage: ShaderType,
    pub binding: u32,
}

/// Bindings of one descriptor set, grouped by update frequency
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DescriptorLayout {
    pub bindings: Vec<DescriptorLayoutInfo>,
}

/// How many descriptors of a type the pipeline's pool holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolInfo {
    pub descriptor_type: DescriptorType,
    pub count: u32,
}

/// Push-constant range used by a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    pub stage: ShaderType,
    pub offset: u32,
    pub size: u32,
}

/// Descriptor for creating a pipeline
#[derive(Clone)]
pub struct PipelineInfo {
    pub name: String,
    pub shader: Arc<dyn Shader>,
    pub render_pass: Arc<dyn RenderPass>,
    pub vertex_layout: VertexLayout,
    /// Index 0 = per-scene, index 1 = per-mesh
    pub descriptor_layouts: Vec<DescriptorLayout>,
    pub pool_sizes: Vec<DescriptorPoolInfo>,
    pub push_constants: Vec<PushConstantRange>,
    pub cull_mode: CullMode,
    pub transparency_enabled: bool,
    pub depth_bias_enabled: bool,
    pub wireframe_enabled: bool,
    pub width: u32,
    pub height: u32,
    /// Upper bound on per-mesh descriptor sets allocated from the pool
    pub max_objects: u32,
    pub colour_attachment_count: u32,
}

/// Pipeline trait
///
/// Immutable once built. Any change of render pass, viewport size or
/// shader means building a new pipeline (with a new `PipelineId`).
pub trait Pipeline: Send + Sync {
    fn id(&self) -> PipelineId;

    fn name(&self) -> &str;

    fn shader(&self) -> &Arc<dyn Shader>;

    /// The per-scene descriptor set (set 0) created with the pipeline
    fn descriptor_set(&self) -> &Arc<dyn DescriptorSet>;

    /// Number of descriptor set layouts
    fn descriptor_layout_count(&self) -> usize;

    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
