/// Material - textures and user uniforms attached to a mesh.
///
/// A material owns its per-mesh descriptor set (set 1). The set is created
/// lazily by the renderer the first time the material is drawn, and again
/// whenever the pipeline it was built against has been replaced.

use std::sync::{Arc, Mutex};
use crate::error::Result;
use crate::graphics_device::{
    DescriptorSet, DescriptorSetInfo, GraphicsDevice, ImageInfo, Pipeline, PipelineId,
    Texture, MESH_DESCRIPTOR_SET,
};

/// Sampler the per-mesh set binds the albedo texture to
pub const ALBEDO_SAMPLER: &str = "texSampler";

pub struct Material {
    name: String,
    albedo: Option<Arc<dyn Texture>>,
    /// Bytes for the shader's user uniform block (fragment stage)
    user_uniforms: Vec<u8>,
    descriptor_set: Mutex<Option<Arc<dyn DescriptorSet>>>,
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            albedo: None,
            user_uniforms: Vec::new(),
            descriptor_set: Mutex::new(None),
        }
    }

    pub fn with_albedo(mut self, texture: Arc<dyn Texture>) -> Self {
        self.albedo = Some(texture);
        self
    }

    pub fn with_user_uniforms(mut self, data: Vec<u8>) -> Self {
        self.user_uniforms = data;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn albedo(&self) -> Option<&Arc<dyn Texture>> {
        self.albedo.as_ref()
    }

    pub fn user_uniforms(&self) -> &[u8] {
        &self.user_uniforms
    }

    /// The current descriptor set, if one has been built
    pub fn descriptor_set(&self) -> Option<Arc<dyn DescriptorSet>> {
        self.descriptor_set.lock().ok().and_then(|set| set.clone())
    }

    /// True if there is no set yet or it was built for another pipeline
    pub fn needs_descriptor_set(&self, pipeline: PipelineId) -> bool {
        self.descriptor_set()
            .map_or(true, |set| set.pipeline_id() != pipeline)
    }

    /// Drop the descriptor set so the next draw rebuilds it
    pub fn invalidate(&self) {
        if let Ok(mut set) = self.descriptor_set.lock() {
            *set = None;
        }
    }

    /// Return a per-mesh descriptor set valid for `pipeline`, building it if needed
    ///
    /// `fallback` is bound when the material has no albedo texture.
    pub fn prepare_descriptor_set(
        &self,
        device: &dyn GraphicsDevice,
        pipeline: &dyn Pipeline,
        fallback: &Arc<dyn Texture>,
    ) -> Result<Arc<dyn DescriptorSet>> {
        if let Some(set) = self.descriptor_set() {
            if set.pipeline_id() == pipeline.id() {
                return Ok(set);
            }
        }

        let set = device.create_descriptor_set(&DescriptorSetInfo {
            pipeline,
            layout_index: MESH_DESCRIPTOR_SET,
            shader: pipeline.shader().as_ref(),
        })?;
        set.update(&[], &[ImageInfo {
            texture: self.albedo.clone().unwrap_or_else(|| fallback.clone()),
            binding: 0,
            name: ALBEDO_SAMPLER.to_string(),
        }])?;

        crate::engine_trace!("lumos::Material", "Built descriptor set for '{}' ({})", self.name, pipeline.name());

        if let Ok(mut slot) = self.descriptor_set.lock() {
            *slot = Some(set.clone());
        }
        Ok(set)
    }
}
