/// Shader trait, shader descriptor and combined-source preprocessing

use std::any::Any;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use crate::error::{Error, Result};
use crate::graphics_device::shader_reflection::{ShaderReflection, ShaderUniformBufferDeclaration};

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShaderType {
    Vertex,
    Fragment,
    Geometry,
    TessellationControl,
    TessellationEvaluation,
    Compute,
}

impl ShaderType {
    /// Stage named by a `#shader <marker>` line
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "vertex" => Some(ShaderType::Vertex),
            "fragment" | "pixel" => Some(ShaderType::Fragment),
            "geometry" => Some(ShaderType::Geometry),
            "tess_control" | "tess_cont" => Some(ShaderType::TessellationControl),
            "tess_eval" => Some(ShaderType::TessellationEvaluation),
            "compute" => Some(ShaderType::Compute),
            _ => None,
        }
    }

    /// Conventional file extension stem for compiled SPIR-V
    pub fn spirv_stem(self) -> &'static str {
        match self {
            ShaderType::Vertex => "vert",
            ShaderType::Fragment => "frag",
            ShaderType::Geometry => "geom",
            ShaderType::TessellationControl => "tesc",
            ShaderType::TessellationEvaluation => "tese",
            ShaderType::Compute => "comp",
        }
    }
}

/// Code for one stage
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderCode {
    /// GLSL source (compiled by immediate-mode backends, reflected by everyone)
    Glsl(String),
    /// Pre-compiled SPIR-V words
    SpirV(Vec<u32>),
}

/// Descriptor for creating a shader
#[derive(Debug, Clone)]
pub struct ShaderDesc {
    pub name: String,
    pub file_path: PathBuf,
    /// Every stage the shader owns; the set is fixed once created
    pub stages: BTreeMap<ShaderType, ShaderCode>,
}

impl ShaderDesc {
    /// Build a descriptor from one combined source string
    pub fn from_source(name: &str, source: &str) -> Self {
        let stages = preprocess_shader_source(source)
            .into_iter()
            .map(|(stage, code)| (stage, ShaderCode::Glsl(code)))
            .collect();

        Self { name: name.to_string(), file_path: PathBuf::new(), stages }
    }

    /// Load `<directory>/<name>.shader`
    ///
    /// Each `#shader` block is either GLSL text or a single line naming a
    /// `.spv` file relative to `directory`.
    pub fn load(name: &str, directory: &Path) -> Result<Self> {
        let path = directory.join(format!("{}.shader", name));
        let source = std::fs::read_to_string(&path).map_err(|e| {
            crate::engine_error!("lumos::Shader", "Failed to read shader {:?}: {}", path, e);
            Error::ResourceLoadFailed(format!("{:?}: {}", path, e))
        })?;

        let mut stages = BTreeMap::new();
        for (stage, block) in preprocess_shader_source(&source) {
            let trimmed = block.trim();
            let code = if !trimmed.contains('\n') && trimmed.ends_with(".spv") {
                ShaderCode::SpirV(read_spirv(&directory.join(trimmed))?)
            } else {
                ShaderCode::Glsl(block)
            };
            stages.insert(stage, code);
        }

        if stages.is_empty() {
            crate::engine_error!("lumos::Shader", "Shader {:?} declares no stages", path);
            return Err(Error::InvalidResource(format!("shader {} has no stages", name)));
        }

        Ok(Self { name: name.to_string(), file_path: path, stages })
    }

    /// Stages in pipeline order
    pub fn shader_types(&self) -> Vec<ShaderType> {
        self.stages.keys().copied().collect()
    }

    /// GLSL sources only, keyed by stage
    pub fn glsl_sources(&self) -> BTreeMap<ShaderType, String> {
        self.stages
            .iter()
            .filter_map(|(stage, code)| match code {
                ShaderCode::Glsl(source) => Some((*stage, source.clone())),
                ShaderCode::SpirV(_) => None,
            })
            .collect()
    }
}

/// Read a SPIR-V file into words
pub fn read_spirv(path: &Path) -> Result<Vec<u32>> {
    let bytes = std::fs::read(path).map_err(|e| {
        crate::engine_error!("lumos::Shader", "Failed to read SPIR-V {:?}: {}", path, e);
        Error::ResourceLoadFailed(format!("{:?}: {}", path, e))
    })?;

    if bytes.len() % 4 != 0 {
        crate::engine_error!("lumos::Shader", "SPIR-V {:?} is not a whole number of words ({} bytes)", path, bytes.len());
        return Err(Error::InvalidResource(format!("{:?} is not valid SPIR-V", path)));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
        .collect())
}

/// Split a combined shader source on `#shader <stage>` markers
///
/// Text before the first marker is dropped. A block with an unknown marker
/// is logged and skipped.
pub fn preprocess_shader_source(source: &str) -> BTreeMap<ShaderType, String> {
    let mut sources: BTreeMap<ShaderType, String> = BTreeMap::new();
    let mut current: Option<ShaderType> = None;
    let mut skipping = false;

    for line in source.lines() {
        if let Some(marker) = line.trim_start().strip_prefix("#shader") {
            let marker = marker.trim();
            current = ShaderType::from_marker(marker);
            skipping = current.is_none();
            if skipping {
                crate::engine_error!("lumos::Shader", "Unsupported shader stage marker '{}'", marker);
            }
            continue;
        }

        if skipping {
            continue;
        }

        if let Some(stage) = current {
            let block = sources.entry(stage).or_default();
            block.push_str(line);
            block.push('\n');
        }
    }

    sources
}

/// Shader resource trait
///
/// Owns the compiled stage modules and the uniform layout reflected at load.
pub trait Shader: Send + Sync {
    fn name(&self) -> &str;

    fn file_path(&self) -> &Path;

    /// Stages in pipeline order
    fn shader_types(&self) -> Vec<ShaderType>;

    /// Uniform layout computed once at load
    fn reflection(&self) -> &ShaderReflection;

    /// Make the program current (immediate-mode backends only)
    fn bind(&self) {}

    fn unbind(&self) {}

    /// Stage engine-provided uniforms (matrices, lights) for `stage`
    ///
    /// Explicit backends take this data through descriptor sets instead.
    fn set_system_uniform_buffer(&self, _stage: ShaderType, _data: &[u8]) {}

    /// Upload material-provided uniforms for `stage` immediately
    ///
    /// Not recorded into command buffers. Renderers record per-draw material
    /// data through the dynamic user block of the scene set instead.
    fn set_user_uniform_buffer(&self, _stage: ShaderType, _data: &[u8]) {}

    /// System uniform buffers declared by `stage`
    fn system_uniforms(&self, stage: ShaderType) -> &[ShaderUniformBufferDeclaration] {
        self.reflection().system_uniform_buffers(stage)
    }

    /// User uniform buffer declared by `stage`
    fn user_uniform_buffer(&self, stage: ShaderType) -> Option<&ShaderUniformBufferDeclaration> {
        self.reflection().user_uniform_buffer(stage)
    }

    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
