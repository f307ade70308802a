/// Uniform-buffer reflection from GLSL sources
///
/// Blocks whose block or instance name starts with `Sys`/`sys_` are
/// system buffers (engine-provided). Every other block is the stage's
/// user buffer. Member offsets follow std140 rules.

use std::collections::BTreeMap;
use crate::graphics_device::shader::ShaderType;

/// Type of a uniform block member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformType {
    Float,
    Int,
    UInt,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    IVec4,
    Mat3,
    Mat4,
}

impl UniformType {
    /// Parse a GLSL type name
    pub fn from_glsl(name: &str) -> Option<Self> {
        match name {
            "float" => Some(UniformType::Float),
            "int" => Some(UniformType::Int),
            "uint" => Some(UniformType::UInt),
            "bool" => Some(UniformType::Bool),
            "vec2" => Some(UniformType::Vec2),
            "vec3" => Some(UniformType::Vec3),
            "vec4" => Some(UniformType::Vec4),
            "ivec4" => Some(UniformType::IVec4),
            "mat3" => Some(UniformType::Mat3),
            "mat4" => Some(UniformType::Mat4),
            _ => None,
        }
    }

    /// Size of one element in bytes
    pub fn size(self) -> u32 {
        match self {
            UniformType::Float | UniformType::Int | UniformType::UInt | UniformType::Bool => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 => 12,
            UniformType::Vec4 | UniformType::IVec4 => 16,
            // three vec4-aligned columns
            UniformType::Mat3 => 48,
            UniformType::Mat4 => 64,
        }
    }

    /// std140 base alignment
    pub fn alignment(self) -> u32 {
        match self {
            UniformType::Float | UniformType::Int | UniformType::UInt | UniformType::Bool => 4,
            UniformType::Vec2 => 8,
            _ => 16,
        }
    }
}

/// One member of a uniform block
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderUniformDeclaration {
    pub name: String,
    pub uniform_type: UniformType,
    /// Array length (1 for scalars)
    pub count: u32,
    /// Byte offset inside the block
    pub offset: u32,
    /// Total bytes including array padding
    pub size: u32,
}

/// A `uniform` block declared by one stage
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderUniformBufferDeclaration {
    /// Block name (`uniform <name> { ... }`)
    pub name: String,
    /// Instance name after the closing brace, if any
    pub instance_name: Option<String>,
    /// `layout(binding = N)`, if present
    pub binding: Option<u32>,
    pub stage: ShaderType,
    pub uniforms: Vec<ShaderUniformDeclaration>,
    /// Block size rounded to 16 bytes
    pub size: u32,
}

impl ShaderUniformBufferDeclaration {
    pub fn is_system(&self) -> bool {
        is_system_uniform_name(&self.name)
            || self.instance_name.as_deref().is_some_and(is_system_uniform_name)
    }

    pub fn find(&self, name: &str) -> Option<&ShaderUniformDeclaration> {
        self.uniforms.iter().find(|u| u.name == name)
    }
}

/// Naming convention for engine-provided uniform blocks
pub fn is_system_uniform_name(name: &str) -> bool {
    name.starts_with("Sys") || name.starts_with("sys_")
}

/// Uniform layout for every stage of a shader
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderReflection {
    system: BTreeMap<ShaderType, Vec<ShaderUniformBufferDeclaration>>,
    user: BTreeMap<ShaderType, ShaderUniformBufferDeclaration>,
}

impl ShaderReflection {
    /// Reflect every GLSL stage
    pub fn from_sources(sources: &BTreeMap<ShaderType, String>) -> Self {
        let mut reflection = Self::default();
        for (stage, source) in sources {
            for block in parse_uniform_blocks(*stage, source) {
                if block.is_system() {
                    reflection.system.entry(*stage).or_default().push(block);
                } else if let Some(previous) = reflection.user.get(stage) {
                    crate::engine_error!(
                        "lumos::Shader",
                        "{:?} stage declares a second user uniform buffer '{}' (keeping '{}')",
                        stage,
                        block.name,
                        previous.name
                    );
                } else {
                    reflection.user.insert(*stage, block);
                }
            }
        }
        reflection
    }

    pub fn system_uniform_buffers(&self, stage: ShaderType) -> &[ShaderUniformBufferDeclaration] {
        self.system.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn user_uniform_buffer(&self, stage: ShaderType) -> Option<&ShaderUniformBufferDeclaration> {
        self.user.get(&stage)
    }
}

fn align_up(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut previous = ' ';
                for c in chars.by_ref() {
                    if previous == '*' && c == '/' {
                        break;
                    }
                    previous = c;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

fn tokenize(source: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in strip_comments(source).chars() {
        if c.is_alphanumeric() || c == '_' {
            current.push(c);
            continue;
        }
        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        if !c.is_whitespace() {
            tokens.push(c.to_string());
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

const MEMBER_QUALIFIERS: &[&str] = &["highp", "mediump", "lowp", "row_major", "column_major"];

/// Parse every `uniform <Block> { ... } [instance];` in one stage
pub fn parse_uniform_blocks(stage: ShaderType, source: &str) -> Vec<ShaderUniformBufferDeclaration> {
    let tokens = tokenize(source);
    let mut blocks = Vec::new();
    let mut binding: Option<u32> = None;
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i].as_str() {
            "layout" => {
                // layout ( ... binding = N ... )
                let mut j = i + 1;
                while j < tokens.len() && tokens[j] != ")" {
                    if tokens[j] == "binding" && tokens.get(j + 1).map(String::as_str) == Some("=") {
                        binding = tokens.get(j + 2).and_then(|n| n.parse().ok());
                    }
                    j += 1;
                }
                i = j + 1;
            }
            "uniform" if tokens.get(i + 2).map(String::as_str) == Some("{") => {
                let name = tokens[i + 1].clone();
                let (block, next) = parse_block(stage, &tokens, i + 3, name, binding.take());
                blocks.push(block);
                i = next;
            }
            ";" => {
                binding = None;
                i += 1;
            }
            _ => i += 1,
        }
    }

    blocks
}

fn parse_block(
    stage: ShaderType,
    tokens: &[String],
    mut i: usize,
    name: String,
    binding: Option<u32>,
) -> (ShaderUniformBufferDeclaration, usize) {
    let mut uniforms = Vec::new();
    let mut offset = 0u32;

    while i < tokens.len() && tokens[i] != "}" {
        while i < tokens.len() && MEMBER_QUALIFIERS.contains(&tokens[i].as_str()) {
            i += 1;
        }
        if i + 1 >= tokens.len() {
            break;
        }

        let type_name = &tokens[i];
        let member_name = tokens[i + 1].clone();
        i += 2;

        let mut count = 1u32;
        if tokens.get(i).map(String::as_str) == Some("[") {
            count = tokens.get(i + 1).and_then(|n| n.parse().ok()).unwrap_or(1);
            i += 3;
        }
        // skip to the end of the member declaration
        while i < tokens.len() && tokens[i] != ";" && tokens[i] != "}" {
            i += 1;
        }
        if tokens.get(i).map(String::as_str) == Some(";") {
            i += 1;
        }

        let uniform_type = UniformType::from_glsl(type_name).unwrap_or_else(|| {
            crate::engine_error!(
                "lumos::Shader",
                "Unsupported uniform type '{}' for '{}' in block '{}', treating as vec4",
                type_name,
                member_name,
                name
            );
            UniformType::Vec4
        });

        let (alignment, size) = if count > 1 {
            (16, align_up(uniform_type.size(), 16) * count)
        } else {
            (uniform_type.alignment(), uniform_type.size())
        };
        let member_offset = align_up(offset, alignment);
        offset = member_offset + size;

        uniforms.push(ShaderUniformDeclaration {
            name: member_name,
            uniform_type,
            count,
            offset: member_offset,
            size,
        });
    }

    // closing brace, optional instance name, semicolon
    i += 1;
    let mut instance_name = None;
    if let Some(token) = tokens.get(i) {
        if token != ";" {
            instance_name = Some(token.clone());
            i += 1;
        }
    }
    if tokens.get(i).map(String::as_str) == Some(";") {
        i += 1;
    }

    let block = ShaderUniformBufferDeclaration {
        name,
        instance_name,
        binding,
        stage,
        uniforms,
        size: align_up(offset, 16),
    };
    (block, i)
}

#[cfg(test)]
#[path = "shader_reflection_tests.rs"]
mod tests;
