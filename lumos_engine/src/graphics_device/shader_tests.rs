//! Unit tests for shader.rs

use crate::graphics_device::shader::*;
use std::path::PathBuf;

const COMBINED: &str = "\
// header comment before any stage
#shader vertex
#version 450
void main() {}
#shader fragment
#version 450
layout(location = 0) out vec4 colour;
void main() { colour = vec4(1.0); }
";

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lumos_shader_tests_{}_{}", std::process::id(), name));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

// ============================================================================
// PREPROCESS
// ============================================================================

#[test]
fn test_preprocess_splits_stages() {
    let sources = preprocess_shader_source(COMBINED);
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[&ShaderType::Vertex], "#version 450\nvoid main() {}\n");
    assert!(sources[&ShaderType::Fragment].contains("out vec4 colour"));
    assert!(!sources[&ShaderType::Vertex].contains("header comment"));
}

#[test]
fn test_preprocess_skips_unknown_stage() {
    let source = "#shader vertex\nA\n#shader mesh\nB\n#shader fragment\nC\n";
    let sources = preprocess_shader_source(source);
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[&ShaderType::Vertex], "A\n");
    assert_eq!(sources[&ShaderType::Fragment], "C\n");
}

#[test]
fn test_marker_aliases() {
    assert_eq!(ShaderType::from_marker("pixel"), Some(ShaderType::Fragment));
    assert_eq!(ShaderType::from_marker("tess_cont"), Some(ShaderType::TessellationControl));
    assert_eq!(ShaderType::from_marker("hull"), None);
}

#[test]
fn test_desc_from_source_keeps_stage_order() {
    let desc = ShaderDesc::from_source("Simple", COMBINED);
    assert_eq!(desc.shader_types(), vec![ShaderType::Vertex, ShaderType::Fragment]);
    assert_eq!(desc.glsl_sources().len(), 2);
}

// ============================================================================
// FILE LOADING
// ============================================================================

#[test]
fn test_load_mixed_glsl_and_spirv() {
    let dir = temp_dir("mixed");
    let words: [u32; 2] = [0x0723_0203, 0x0001_0000];
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    std::fs::write(dir.join("Simple.vert.spv"), bytes).unwrap();
    std::fs::write(
        dir.join("Simple.shader"),
        "#shader vertex\nSimple.vert.spv\n#shader fragment\n#version 450\nvoid main() {}\n",
    )
    .unwrap();

    let desc = ShaderDesc::load("Simple", &dir).unwrap();

    assert_eq!(desc.stages[&ShaderType::Vertex], ShaderCode::SpirV(words.to_vec()));
    assert!(matches!(desc.stages[&ShaderType::Fragment], ShaderCode::Glsl(_)));
    assert_eq!(desc.file_path, dir.join("Simple.shader"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_load_missing_shader_fails() {
    let dir = temp_dir("missing");
    let result = ShaderDesc::load("Nope", &dir);
    assert!(matches!(result, Err(crate::error::Error::ResourceLoadFailed(_))));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_read_spirv_rejects_partial_words() {
    let dir = temp_dir("partial");
    let path = dir.join("broken.spv");
    std::fs::write(&path, [1u8, 2, 3]).unwrap();
    assert!(matches!(read_spirv(&path), Err(crate::error::Error::InvalidResource(_))));
    let _ = std::fs::remove_dir_all(&dir);
}
