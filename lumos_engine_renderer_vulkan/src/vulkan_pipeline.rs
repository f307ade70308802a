/// Pipeline - Vulkan implementation of the Pipeline trait
///
/// A pipeline owns its descriptor set layouts, its pipeline layout and the
/// descriptor pools its sets are allocated from. Those live in
/// `PipelineLayoutObjects`, shared with every descriptor set so a set can
/// outlive the pipeline handle that created it.

use ash::vk;
use lumos_engine::lumos::{Error, Result};
use lumos_engine::lumos::render::{
    DescriptorLayout, DescriptorPoolInfo, DescriptorSet, DescriptorType, Pipeline, PipelineId,
    PipelineInfo, RenderPass, Shader,
};
use lumos_engine::{engine_debug, engine_error, engine_info};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor_set::VulkanDescriptorSet;
use crate::vulkan_format::{
    cull_mode_to_vk, descriptor_type_to_vk, shader_stage_to_vk, vertex_format_to_vk,
};
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_shader::VulkanShader;

// ===== LAYOUT OBJECTS =====

/// Set layouts, pipeline layout and descriptor pools of one pipeline
pub(crate) struct PipelineLayoutObjects {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline_id: PipelineId,
    pub(crate) set_layouts: Vec<vk::DescriptorSetLayout>,
    pub(crate) pipeline_layout: vk::PipelineLayout,
    /// Dynamic uniform buffer bindings per set layout
    pub(crate) dynamic_counts: Vec<u32>,
    pool_sizes: Vec<vk::DescriptorPoolSize>,
    max_sets: u32,
    /// Grows by one pool whenever the last one is exhausted
    pools: Mutex<Vec<vk::DescriptorPool>>,
}

/// Pool sizes from the requested counts, topped up with any type a layout uses
pub(crate) fn merged_pool_sizes(
    requested: &[DescriptorPoolInfo],
    layouts: &[DescriptorLayout],
    max_objects: u32,
) -> Vec<(DescriptorType, u32)> {
    let mut counts: FxHashMap<DescriptorType, u32> = FxHashMap::default();
    for pool in requested {
        *counts.entry(pool.descriptor_type).or_default() += pool.count;
    }
    for binding in layouts.iter().flat_map(|l| l.bindings.iter()) {
        counts.entry(binding.descriptor_type).or_insert(max_objects.max(1));
    }

    let mut sizes: Vec<(DescriptorType, u32)> = counts.into_iter().map(|(t, c)| (t, c.max(1))).collect();
    sizes.sort_by_key(|(t, _)| *t as u32);
    sizes
}

impl PipelineLayoutObjects {
    fn create(ctx: Arc<GpuContext>, pipeline_id: PipelineId, info: &PipelineInfo) -> Result<Self> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> =
            merged_pool_sizes(&info.pool_sizes, &info.descriptor_layouts, info.max_objects)
                .into_iter()
                .map(|(descriptor_type, count)| vk::DescriptorPoolSize {
                    ty: descriptor_type_to_vk(descriptor_type),
                    descriptor_count: count,
                })
                .collect();
        let max_sets = pool_sizes.iter().map(|s| s.descriptor_count).sum::<u32>().max(1);

        let mut objects = Self {
            ctx,
            pipeline_id,
            set_layouts: Vec::with_capacity(info.descriptor_layouts.len()),
            pipeline_layout: vk::PipelineLayout::null(),
            dynamic_counts: Vec::with_capacity(info.descriptor_layouts.len()),
            pool_sizes,
            max_sets,
            pools: Mutex::new(Vec::new()),
        };

        for layout in &info.descriptor_layouts {
            let bindings: Vec<vk::DescriptorSetLayoutBinding> = layout
                .bindings
                .iter()
                .map(|b| {
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(b.binding)
                        .descriptor_type(descriptor_type_to_vk(b.descriptor_type))
                        .descriptor_count(1)
                        .stage_flags(shader_stage_to_vk(b.stage))
                })
                .collect();
            let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
            let set_layout = unsafe {
                vk_check!(
                    objects.ctx.device.create_descriptor_set_layout(&create_info, None),
                    "vkCreateDescriptorSetLayout '{}'",
                    info.name
                )?
            };
            objects.set_layouts.push(set_layout);
            objects.dynamic_counts.push(
                layout
                    .bindings
                    .iter()
                    .filter(|b| b.descriptor_type == DescriptorType::UniformBufferDynamic)
                    .count() as u32,
            );
        }

        let push_ranges: Vec<vk::PushConstantRange> = info
            .push_constants
            .iter()
            .map(|range| vk::PushConstantRange {
                stage_flags: shader_stage_to_vk(range.stage),
                offset: range.offset,
                size: range.size,
            })
            .collect();

        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&objects.set_layouts)
            .push_constant_ranges(&push_ranges);
        objects.pipeline_layout = unsafe {
            vk_check!(
                objects.ctx.device.create_pipeline_layout(&layout_info, None),
                "vkCreatePipelineLayout '{}'",
                info.name
            )?
        };

        let first_pool = objects.create_pool()?;
        objects
            .pools
            .get_mut()
            .map_err(|_| Error::BackendError("descriptor pool lock poisoned".to_string()))?
            .push(first_pool);

        Ok(objects)
    }

    fn create_pool(&self) -> Result<vk::DescriptorPool> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .pool_sizes(&self.pool_sizes)
            .max_sets(self.max_sets);
        unsafe { vk_check!(self.ctx.device.create_descriptor_pool(&create_info, None), "vkCreateDescriptorPool") }
    }

    /// Allocate one set for `layout_index`, returning it with the pool it came from
    pub(crate) fn allocate_set(&self, layout_index: u32) -> Result<(vk::DescriptorSet, vk::DescriptorPool)> {
        let Some(&set_layout) = self.set_layouts.get(layout_index as usize) else {
            engine_error!(
                "lumos::vulkan::Pipeline",
                "Descriptor layout index {} out of range (pipeline has {} layouts)",
                layout_index, self.set_layouts.len()
            );
            return Err(Error::InvalidResource(format!("descriptor layout index {} out of range", layout_index)));
        };

        let mut pools = self
            .pools
            .lock()
            .map_err(|_| lumos_engine::engine_err!("lumos::vulkan::Pipeline", "Descriptor pool lock poisoned"))?;
        let layouts = [set_layout];

        if let Some(&pool) = pools.last() {
            let allocate_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&layouts);
            match unsafe { self.ctx.device.allocate_descriptor_sets(&allocate_info) } {
                Ok(sets) => return Ok((sets[0], pool)),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {}
                Err(e) => {
                    return Err(crate::vk_failure(e, "vkAllocateDescriptorSets".to_string(), file!(), line!()));
                }
            }
        }

        let pool = self.create_pool()?;
        pools.push(pool);
        engine_info!("lumos::vulkan::Pipeline", "Descriptor pool exhausted, created new pool (total: {})", pools.len());

        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = unsafe {
            vk_check!(
                self.ctx.device.allocate_descriptor_sets(&allocate_info),
                "vkAllocateDescriptorSets after pool growth"
            )?
        };
        Ok((sets[0], pool))
    }

    pub(crate) fn free_set(&self, pool: vk::DescriptorPool, set: vk::DescriptorSet) {
        if let Ok(_pools) = self.pools.lock() {
            unsafe {
                let _ = self.ctx.device.free_descriptor_sets(pool, &[set]);
            }
        }
    }

    pub(crate) fn ctx(&self) -> &Arc<GpuContext> {
        &self.ctx
    }
}

impl Drop for PipelineLayoutObjects {
    fn drop(&mut self) {
        unsafe {
            if let Ok(pools) = self.pools.get_mut() {
                for pool in pools.drain(..) {
                    self.ctx.device.destroy_descriptor_pool(pool, None);
                }
            }
            if self.pipeline_layout != vk::PipelineLayout::null() {
                self.ctx.device.destroy_pipeline_layout(self.pipeline_layout, None);
            }
            for layout in self.set_layouts.drain(..) {
                self.ctx.device.destroy_descriptor_set_layout(layout, None);
            }
        }
    }
}

// ===== PIPELINE =====

/// Vulkan graphics pipeline implementation
pub struct VulkanPipeline {
    ctx: Arc<GpuContext>,
    id: PipelineId,
    name: String,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) layout: Arc<PipelineLayoutObjects>,
    shader: Arc<dyn Shader>,
    descriptor_set: Arc<dyn DescriptorSet>,
}

impl VulkanPipeline {
    pub(crate) fn create(ctx: Arc<GpuContext>, info: PipelineInfo) -> Result<Self> {
        let shader = info.shader.as_any().downcast_ref::<VulkanShader>().ok_or_else(|| {
            engine_error!("lumos::vulkan::Pipeline", "Pipeline '{}': shader is not a Vulkan shader", info.name);
            Error::InvalidResource(format!("pipeline '{}' has a foreign shader", info.name))
        })?;
        let render_pass = info.render_pass.as_any().downcast_ref::<VulkanRenderPass>().ok_or_else(|| {
            engine_error!("lumos::vulkan::Pipeline", "Pipeline '{}': render pass is not a Vulkan render pass", info.name);
            Error::InvalidResource(format!("pipeline '{}' has a foreign render pass", info.name))
        })?;
        if info.descriptor_layouts.is_empty() {
            engine_error!("lumos::vulkan::Pipeline", "Pipeline '{}' declares no descriptor layouts", info.name);
            return Err(Error::InvalidResource(format!("pipeline '{}' has no descriptor layouts", info.name)));
        }

        let stages = shader.stage_infos()?;
        let id = PipelineId::next();
        let layout = Arc::new(PipelineLayoutObjects::create(ctx.clone(), id, &info)?);

        // Vertex input
        let bindings = [vk::VertexInputBindingDescription {
            binding: 0,
            stride: info.vertex_layout.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        }];
        let attributes: Vec<vk::VertexInputAttributeDescription> = info
            .vertex_layout
            .attributes
            .iter()
            .map(|a| vk::VertexInputAttributeDescription {
                location: a.location,
                binding: 0,
                format: vertex_format_to_vk(a.format),
                offset: a.offset,
            })
            .collect();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport and scissor are set per command buffer
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let polygon_mode = if info.wireframe_enabled { vk::PolygonMode::LINE } else { vk::PolygonMode::FILL };
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(polygon_mode)
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(info.cull_mode))
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(info.depth_bias_enabled)
            .depth_bias_constant_factor(if info.depth_bias_enabled { 1.25 } else { 0.0 })
            .depth_bias_slope_factor(if info.depth_bias_enabled { 1.75 } else { 0.0 });

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false);

        let has_depth = render_pass.attachments().iter().any(|a| a.is_depth());
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(has_depth)
            .depth_write_enable(has_depth)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let blend_attachment = if info.transparency_enabled {
            vk::PipelineColorBlendAttachmentState::default()
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD)
                .color_write_mask(vk::ColorComponentFlags::RGBA)
        } else {
            vk::PipelineColorBlendAttachmentState::default()
                .blend_enable(false)
                .color_write_mask(vk::ColorComponentFlags::RGBA)
        };
        let colour_count = render_pass.colour_attachment_count();
        if info.colour_attachment_count as usize != colour_count {
            lumos_engine::engine_warn!(
                "lumos::vulkan::Pipeline",
                "Pipeline '{}' declares {} colour attachments, render pass has {}; using the render pass count",
                info.name, info.colour_attachment_count, colour_count
            );
        }
        let blend_attachments = vec![blend_attachment; colour_count];
        let colour_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&colour_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout.pipeline_layout)
            .render_pass(render_pass.render_pass)
            .subpass(0);

        let pipeline = unsafe {
            ctx.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, result)| {
                    crate::vk_failure(result, format!("vkCreateGraphicsPipelines '{}'", info.name), file!(), line!())
                })?[0]
        };

        let descriptor_set = match VulkanDescriptorSet::allocate(layout.clone(), 0) {
            Ok(set) => Arc::new(set) as Arc<dyn DescriptorSet>,
            Err(e) => {
                unsafe { ctx.device.destroy_pipeline(pipeline, None) };
                return Err(e);
            }
        };

        engine_debug!(
            "lumos::vulkan::Pipeline",
            "Created pipeline '{}' ({} set layouts, {} colour attachments)",
            info.name, layout.set_layouts.len(), colour_count
        );

        Ok(Self {
            ctx,
            id,
            name: info.name,
            pipeline,
            layout,
            shader: info.shader,
            descriptor_set,
        })
    }
}

impl Pipeline for VulkanPipeline {
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
        self.layout.set_layouts.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe { self.ctx.device.destroy_pipeline(self.pipeline, None) };
    }
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
