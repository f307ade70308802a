/// DescriptorSet - Vulkan implementation of the DescriptorSet trait
///
/// Allocated from the pools of the pipeline that created it. Written through
/// `update`; resources bound to it are held until their binding is rewritten.

use ash::vk;
use lumos_engine::lumos::{Error, Result};
use lumos_engine::lumos::render::{
    BufferInfo, DescriptorSet, DescriptorType, ImageInfo, PipelineId, Texture, UniformBuffer,
};
use lumos_engine::engine_error;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::VulkanUniformBuffer;
use crate::vulkan_format::descriptor_type_to_vk;
use crate::vulkan_frame_buffer::downcast_texture;
use crate::vulkan_pipeline::PipelineLayoutObjects;

/// Resources the set currently points at, by binding
#[derive(Default)]
struct BoundResources {
    buffers: FxHashMap<u32, Arc<dyn UniformBuffer>>,
    textures: FxHashMap<u32, Arc<dyn Texture>>,
}

/// Vulkan descriptor set implementation
pub struct VulkanDescriptorSet {
    layout: Arc<PipelineLayoutObjects>,
    layout_index: u32,
    pub(crate) set: vk::DescriptorSet,
    pool: vk::DescriptorPool,
    bound: Mutex<BoundResources>,
}

impl VulkanDescriptorSet {
    pub(crate) fn allocate(layout: Arc<PipelineLayoutObjects>, layout_index: u32) -> Result<Self> {
        let (set, pool) = layout.allocate_set(layout_index)?;
        Ok(Self {
            layout,
            layout_index,
            set,
            pool,
            bound: Mutex::new(BoundResources::default()),
        })
    }
}

impl DescriptorSet for VulkanDescriptorSet {
    fn layout_index(&self) -> u32 {
        self.layout_index
    }

    fn pipeline_id(&self) -> PipelineId {
        self.layout.pipeline_id
    }

    fn dynamic_count(&self) -> u32 {
        self.layout.dynamic_counts.get(self.layout_index as usize).copied().unwrap_or(0)
    }

    fn update(&self, buffers: &[BufferInfo], images: &[ImageInfo]) -> Result<()> {
        // Infos must outlive the write array; build them all first
        let mut buffer_infos = Vec::with_capacity(buffers.len());
        for info in buffers {
            let uniform = info.buffer.as_any().downcast_ref::<VulkanUniformBuffer>().ok_or_else(|| {
                engine_error!("lumos::vulkan::DescriptorSet", "Binding {}: buffer is not a Vulkan uniform buffer", info.binding);
                Error::InvalidResource(format!("binding {} has a foreign buffer", info.binding))
            })?;
            if info.descriptor_type == DescriptorType::ImageSampler {
                engine_error!("lumos::vulkan::DescriptorSet", "Binding {}: buffer given for an image sampler", info.binding);
                return Err(Error::InvalidResource(format!("binding {} expects an image", info.binding)));
            }
            let range = if info.size == 0 { vk::WHOLE_SIZE } else { info.size };
            buffer_infos.push([vk::DescriptorBufferInfo::default()
                .buffer(uniform.buffer)
                .offset(info.offset)
                .range(range)]);
        }

        let mut image_infos = Vec::with_capacity(images.len());
        for info in images {
            let texture = downcast_texture(info.texture.as_ref(), "lumos::vulkan::DescriptorSet")?;
            if texture.sampler == vk::Sampler::null() {
                engine_error!(
                    "lumos::vulkan::DescriptorSet",
                    "Binding {} ('{}'): texture '{}' cannot be sampled",
                    info.binding, info.name, texture.name()
                );
                return Err(Error::InvalidResource(format!("texture '{}' cannot be sampled", texture.name())));
            }
            image_infos.push([vk::DescriptorImageInfo::default()
                .image_view(texture.view)
                .sampler(texture.sampler)
                .image_layout(texture.layout())]);
        }

        let buffer_writes = buffers.iter().zip(&buffer_infos).map(|(info, vk_info)| {
            vk::WriteDescriptorSet::default()
                .dst_set(self.set)
                .dst_binding(info.binding)
                .dst_array_element(0)
                .descriptor_type(descriptor_type_to_vk(info.descriptor_type))
                .buffer_info(vk_info)
        });
        let image_writes = images.iter().zip(&image_infos).map(|(info, vk_info)| {
            vk::WriteDescriptorSet::default()
                .dst_set(self.set)
                .dst_binding(info.binding)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(vk_info)
        });
        let writes: Vec<vk::WriteDescriptorSet> = buffer_writes.chain(image_writes).collect();

        unsafe { self.layout.ctx().device.update_descriptor_sets(&writes, &[]) };

        let mut bound = self.bound.lock().map_err(|_| {
            lumos_engine::engine_err!("lumos::vulkan::DescriptorSet", "Bound resource lock poisoned")
        })?;
        for info in buffers {
            bound.buffers.insert(info.binding, info.buffer.clone());
        }
        for info in images {
            bound.textures.insert(info.binding, info.texture.clone());
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDescriptorSet {
    fn drop(&mut self) {
        self.layout.free_set(self.pool, self.set);
    }
}
