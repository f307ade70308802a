/// Descriptor set trait - binds buffers and images to a pipeline layout slot

use std::any::Any;
use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{DescriptorType, Pipeline, PipelineId, Shader, ShaderType, Texture, UniformBuffer};

/// A uniform buffer bound at `binding`
#[derive(Clone)]
pub struct BufferInfo {
    pub buffer: Arc<dyn UniformBuffer>,
    pub offset: u64,
    /// Bytes visible to one draw (the element size for dynamic buffers)
    pub size: u64,
    pub descriptor_type: DescriptorType,
    pub binding: u32,
    pub stage: ShaderType,
}

/// A sampled texture bound at `binding`
#[derive(Clone)]
pub struct ImageInfo {
    pub texture: Arc<dyn Texture>,
    pub binding: u32,
    /// Sampler name in the shader (immediate-mode backends resolve by name)
    pub name: String,
}

/// Descriptor for creating a descriptor set
pub struct DescriptorSetInfo<'a> {
    pub pipeline: &'a dyn Pipeline,
    /// Which of the pipeline's layouts this set instantiates
    pub layout_index: u32,
    pub shader: &'a dyn Shader,
}

/// Descriptor set trait
pub trait DescriptorSet: Send + Sync {
    /// Layout index inside the owning pipeline
    fn layout_index(&self) -> u32;

    /// Pipeline whose layout this set was allocated from
    fn pipeline_id(&self) -> PipelineId;

    /// Number of dynamic offsets expected when binding
    fn dynamic_count(&self) -> u32;

    /// Replace the bindings listed in `buffers` and `images` in one step
    fn update(&self, buffers: &[BufferInfo], images: &[ImageInfo]) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}
