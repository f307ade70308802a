//! Integration tests for the shaders shipped in `lumos_engine/shaders`
//!
//! Loads each combined source through `ShaderDesc::load` and checks the
//! reflected system blocks against the layout the renderers upload.
//! No GPU required.
//!
//! Run with: cargo test --test shader_asset_tests

use std::path::PathBuf;
use lumos_engine::lumos::render::{ShaderDesc, ShaderReflection, ShaderType, UniformType};
use lumos_engine::lumos::renderer::{SystemUniforms, MAX_BONES};

fn shader_directory() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("shaders")
}

fn load(name: &str) -> (ShaderDesc, ShaderReflection) {
    let desc = ShaderDesc::load(name, &shader_directory()).unwrap();
    let reflection = ShaderReflection::from_sources(&desc.glsl_sources());
    (desc, reflection)
}

// ============================================================================
// FORWARD
// ============================================================================

#[test]
fn test_simple_has_vertex_and_fragment() {
    let (desc, _) = load("Simple");
    assert_eq!(desc.shader_types(), vec![ShaderType::Vertex, ShaderType::Fragment]);
    assert!(desc.file_path.ends_with("Simple.shader"));
}

#[test]
fn test_simple_camera_block_matches_system_uniforms() {
    let (_, reflection) = load("Simple");

    let camera = reflection
        .system_uniform_buffers(ShaderType::Vertex)
        .iter()
        .find(|b| b.name == "SysCamera")
        .unwrap();
    assert_eq!(camera.binding, Some(0));
    assert_eq!(camera.size as u64, SystemUniforms::vertex_size());
    assert_eq!(camera.find("sys_ProjectionMatrix").unwrap().offset, 0);
    assert_eq!(camera.find("sys_ViewMatrix").unwrap().offset, 64);
    assert_eq!(camera.find("sys_ModelMatrix").unwrap().offset, 128);
    assert_eq!(camera.find("sys_TextureMatrix").unwrap().offset, 192);
}

#[test]
fn test_simple_light_block_matches_system_uniforms() {
    let (_, reflection) = load("Simple");

    let lights = &reflection.system_uniform_buffers(ShaderType::Fragment)[0];
    assert_eq!(lights.name, "SysLights");
    assert_eq!(lights.binding, Some(2));
    assert_eq!(lights.find("sys_LightData").unwrap().count, 128);

    let count = lights.find("sys_LightCount").unwrap();
    assert_eq!(count.uniform_type, UniformType::UInt);
    assert_eq!(count.offset, 2048);
    assert!(lights.size as u64 <= SystemUniforms::fragment_size());
}

#[test]
fn test_simple_has_no_user_block() {
    let (_, reflection) = load("Simple");
    assert!(reflection.user_uniform_buffer(ShaderType::Vertex).is_none());
    assert!(reflection.user_uniform_buffer(ShaderType::Fragment).is_none());
}

// ============================================================================
// DEFERRED
// ============================================================================

#[test]
fn test_deferred_shaders_load() {
    for name in ["DeferredColour", "DeferredColourAnim"] {
        let (desc, _) = load(name);
        assert_eq!(desc.shader_types(), vec![ShaderType::Vertex, ShaderType::Fragment]);
    }
}

#[test]
fn test_anim_joint_palette_size() {
    let (_, reflection) = load("DeferredColourAnim");

    let joints = reflection
        .system_uniform_buffers(ShaderType::Vertex)
        .iter()
        .find(|b| b.name == "SysJoints")
        .unwrap();
    assert_eq!(joints.binding, Some(3));
    assert_eq!(joints.find("sys_JointTransforms").unwrap().count as usize, MAX_BONES);
    assert_eq!(joints.size as usize, 64 * MAX_BONES);
}

#[test]
fn test_missing_shader_is_load_failure() {
    let result = ShaderDesc::load("DoesNotExist", &shader_directory());
    assert!(matches!(result, Err(lumos_engine::lumos::Error::ResourceLoadFailed(_))));
}
