/// Shader - Vulkan implementation of the Shader trait
///
/// One VkShaderModule per SPIR-V stage. GLSL stages are kept only for
/// reflection; the pipeline refuses a shader with a stage it cannot build.

use ash::vk;
use lumos_engine::lumos::{Error, Result};
use lumos_engine::lumos::render::{Shader, ShaderCode, ShaderDesc, ShaderReflection, ShaderType};
use lumos_engine::{engine_debug, engine_warn};
use std::any::Any;
use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::shader_stage_to_vk;

pub(crate) const ENTRY_POINT: &CStr = c"main";

/// Vulkan shader implementation
pub struct VulkanShader {
    ctx: Arc<GpuContext>,
    name: String,
    file_path: PathBuf,
    stages: Vec<ShaderType>,
    /// Compiled modules, in pipeline order
    pub(crate) modules: Vec<(ShaderType, vk::ShaderModule)>,
    reflection: ShaderReflection,
}

impl VulkanShader {
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: ShaderDesc) -> Result<Self> {
        let reflection = ShaderReflection::from_sources(&desc.glsl_sources());
        let mut shader = Self {
            ctx,
            name: desc.name,
            file_path: desc.file_path,
            stages: desc.stages.keys().copied().collect(),
            modules: Vec::with_capacity(desc.stages.len()),
            reflection,
        };

        for (stage, code) in &desc.stages {
            let words = match code {
                ShaderCode::SpirV(words) => words,
                ShaderCode::Glsl(_) => {
                    engine_warn!(
                        "lumos::vulkan::Shader",
                        "Shader '{}': {:?} stage is GLSL only, no module created",
                        shader.name, stage
                    );
                    continue;
                }
            };

            let create_info = vk::ShaderModuleCreateInfo::default().code(words);
            // Modules already pushed are released by Drop on early return
            let module = unsafe {
                vk_check!(
                    shader.ctx.device.create_shader_module(&create_info, None),
                    "vkCreateShaderModule '{}' ({:?})",
                    shader.name,
                    stage
                )?
            };
            shader.modules.push((*stage, module));
        }

        engine_debug!(
            "lumos::vulkan::Shader",
            "Created shader '{}' ({} of {} stages compiled)",
            shader.name, shader.modules.len(), shader.stages.len()
        );
        Ok(shader)
    }

    /// Stage infos for pipeline creation; fails if any stage has no module
    pub(crate) fn stage_infos(&self) -> Result<Vec<vk::PipelineShaderStageCreateInfo<'static>>> {
        if self.modules.is_empty() || self.modules.len() != self.stages.len() {
            lumos_engine::engine_error!(
                "lumos::vulkan::Shader",
                "Shader '{}' has stages without SPIR-V ({} of {} compiled)",
                self.name, self.modules.len(), self.stages.len()
            );
            return Err(Error::InvalidResource(format!(
                "shader '{}' needs SPIR-V for every stage",
                self.name
            )));
        }

        Ok(self
            .modules
            .iter()
            .map(|(stage, module)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(shader_stage_to_vk(*stage))
                    .module(*module)
                    .name(ENTRY_POINT)
            })
            .collect())
    }
}

impl Shader for VulkanShader {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn shader_types(&self) -> Vec<ShaderType> {
        self.stages.clone()
    }

    fn reflection(&self) -> &ShaderReflection {
        &self.reflection
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanShader {
    fn drop(&mut self) {
        for (_, module) in self.modules.drain(..) {
            unsafe { self.ctx.device.destroy_shader_module(module, None) };
        }
    }
}
