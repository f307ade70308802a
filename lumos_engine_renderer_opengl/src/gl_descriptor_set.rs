/// DescriptorSet - OpenGL implementation of the DescriptorSet trait
///
/// GL has no descriptor sets: a set is the list of uniform buffer ranges and
/// textures to bind. Uniform binding N maps to `GL_UNIFORM_BUFFER` index N,
/// image binding N to texture unit N, whatever the set index.

use lumos_engine::lumos::render::{
    BufferInfo, DescriptorSet, DescriptorType, ImageInfo, PipelineId, Texture, UniformBuffer,
};
use lumos_engine::lumos::{Error, Result};
use lumos_engine::{engine_err, engine_error};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::gl_buffer::GlUniformBuffer;
use crate::gl_command_buffer::GlCommand;
use crate::gl_frame_buffer::downcast_texture;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BoundBuffer {
    pub handle: glow::NativeBuffer,
    pub buffer_size: u64,
    pub offset: u64,
    /// 0 binds up to the end of the buffer
    pub size: u64,
    pub dynamic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BoundTexture {
    pub handle: glow::NativeTexture,
    pub target: u32,
}

/// GL names a set points at, ordered by binding
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SetBindings {
    pub buffers: BTreeMap<u32, BoundBuffer>,
    pub textures: BTreeMap<u32, BoundTexture>,
}

/// Bind commands for one set
///
/// Dynamic buffers take the next offset from `dynamic_offsets`, in binding
/// order, added to their base offset.
pub(crate) fn resolve_bindings(bindings: &SetBindings, dynamic_offsets: &mut std::slice::Iter<'_, u32>) -> Result<Vec<GlCommand>> {
    let mut commands = Vec::with_capacity(bindings.buffers.len() + bindings.textures.len());

    for (binding, bound) in &bindings.buffers {
        let offset = if bound.dynamic {
            let dynamic = dynamic_offsets.next().ok_or_else(|| {
                engine_err!("lumos::opengl::DescriptorSet", "No dynamic offset for dynamic uniform buffer at binding {}", binding)
            })?;
            bound.offset + *dynamic as u64
        } else {
            bound.offset
        };
        let size = if bound.size == 0 { bound.buffer_size.saturating_sub(offset) } else { bound.size };
        if size == 0 || offset + size > bound.buffer_size {
            engine_error!(
                "lumos::opengl::DescriptorSet",
                "Binding {}: range {}+{} exceeds uniform buffer of {} bytes",
                binding, offset, size, bound.buffer_size
            );
            return Err(Error::InvalidResource(format!("uniform range at binding {} is out of bounds", binding)));
        }
        commands.push(GlCommand::BindUniformBuffer { binding: *binding, buffer: bound.handle, offset, size });
    }

    for (unit, bound) in &bindings.textures {
        commands.push(GlCommand::BindTexture { unit: *unit, target: bound.target, texture: bound.handle });
    }

    Ok(commands)
}

#[derive(Default)]
struct Bound {
    bindings: SetBindings,
    // Keep the resources alive while the set refers to them
    buffers: FxHashMap<u32, Arc<dyn UniformBuffer>>,
    textures: FxHashMap<u32, Arc<dyn Texture>>,
}

pub struct GlDescriptorSet {
    pipeline_id: PipelineId,
    layout_index: u32,
    dynamic_count: u32,
    bound: Mutex<Bound>,
}

impl GlDescriptorSet {
    pub(crate) fn new(pipeline_id: PipelineId, layout_index: u32, dynamic_count: u32) -> Self {
        Self { pipeline_id, layout_index, dynamic_count, bound: Mutex::new(Bound::default()) }
    }

    /// Copy of the current bindings for recording
    pub(crate) fn bindings(&self) -> Result<SetBindings> {
        let bound = self.bound.lock().map_err(|_| engine_err!("lumos::opengl::DescriptorSet", "Binding lock poisoned"))?;
        Ok(bound.bindings.clone())
    }
}

impl DescriptorSet for GlDescriptorSet {
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
        let mut resolved_buffers = Vec::with_capacity(buffers.len());
        for info in buffers {
            if info.descriptor_type == DescriptorType::ImageSampler {
                engine_error!("lumos::opengl::DescriptorSet", "Binding {}: buffer given for an image sampler", info.binding);
                return Err(Error::InvalidResource(format!("binding {} expects an image", info.binding)));
            }
            let uniform = info.buffer.as_any().downcast_ref::<GlUniformBuffer>().ok_or_else(|| {
                engine_error!("lumos::opengl::DescriptorSet", "Binding {}: buffer is not an OpenGL uniform buffer", info.binding);
                Error::InvalidResource(format!("binding {} has a foreign buffer", info.binding))
            })?;
            resolved_buffers.push(BoundBuffer {
                handle: uniform.handle,
                buffer_size: uniform.size(),
                offset: info.offset,
                size: info.size,
                dynamic: info.descriptor_type == DescriptorType::UniformBufferDynamic,
            });
        }

        let mut resolved_textures = Vec::with_capacity(images.len());
        for info in images {
            let texture = downcast_texture(info.texture.as_ref(), "lumos::opengl::DescriptorSet")?;
            let Some(handle) = texture.handle else {
                engine_error!(
                    "lumos::opengl::DescriptorSet",
                    "Binding {} ('{}'): texture '{}' cannot be sampled",
                    info.binding, info.name, texture.name()
                );
                return Err(Error::InvalidResource(format!("texture '{}' cannot be sampled", texture.name())));
            };
            resolved_textures.push(BoundTexture { handle, target: texture.target });
        }

        let mut bound = self.bound.lock().map_err(|_| engine_err!("lumos::opengl::DescriptorSet", "Binding lock poisoned"))?;
        for (info, resolved) in buffers.iter().zip(resolved_buffers) {
            bound.bindings.buffers.insert(info.binding, resolved);
            bound.buffers.insert(info.binding, info.buffer.clone());
        }
        for (info, resolved) in images.iter().zip(resolved_textures) {
            bound.bindings.textures.insert(info.binding, resolved);
            bound.textures.insert(info.binding, info.texture.clone());
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
#[path = "gl_descriptor_set_tests.rs"]
mod tests;
