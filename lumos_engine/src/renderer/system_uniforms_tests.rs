//! Unit tests for system_uniforms.rs

use super::*;
use glam::{Mat4, Vec3};
use crate::scene::{Camera, Light};

#[test]
fn test_vertex_block_layout() {
    assert_eq!(SystemUniforms::vertex_size(), 256);
    assert_eq!(std::mem::offset_of!(VertexSystemUniforms, projection), PROJECTION_OFFSET);
    assert_eq!(std::mem::offset_of!(VertexSystemUniforms, view), VIEW_OFFSET);
    assert_eq!(std::mem::offset_of!(VertexSystemUniforms, model), MODEL_OFFSET);
    assert_eq!(std::mem::offset_of!(VertexSystemUniforms, texture_matrix), TEXTURE_MATRIX_OFFSET);
}

#[test]
fn test_light_block_layout() {
    assert_eq!(std::mem::size_of::<Light>(), 64);
    assert_eq!(SystemUniforms::fragment_size(), (64 * MAX_LIGHTS + 16) as u64);
}

#[test]
fn test_begin_scene_copies_camera_matrices() {
    let view = Mat4::look_at_rh(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y);
    let projection = Mat4::perspective_rh(1.0, 1.5, 0.1, 100.0);
    let mut uniforms = SystemUniforms::default();

    uniforms.begin_scene(&Camera::new(view, projection), &[]);

    let bytes = uniforms.vertex_bytes();
    assert_eq!(&bytes[PROJECTION_OFFSET..PROJECTION_OFFSET + 64], bytemuck::bytes_of(&projection));
    assert_eq!(&bytes[VIEW_OFFSET..VIEW_OFFSET + 64], bytemuck::bytes_of(&view));
}

#[test]
fn test_lights_are_capped() {
    let mut uniforms = SystemUniforms::default();
    let lights = vec![Light::point(Vec3::ZERO, Vec3::ONE, 1.0, 10.0); MAX_LIGHTS + 4];

    uniforms.begin_scene(&Camera::default(), &lights);
    assert_eq!(uniforms.fragment.light_count, MAX_LIGHTS as u32);
}

#[test]
fn test_fewer_lights_clears_stale_entries() {
    let mut uniforms = SystemUniforms::default();
    let sun = Light::directional(Vec3::NEG_Y, Vec3::ONE, 2.0);

    uniforms.begin_scene(&Camera::default(), &[sun, sun]);
    uniforms.begin_scene(&Camera::default(), &[sun]);

    assert_eq!(uniforms.fragment.light_count, 1);
    assert_eq!(uniforms.fragment.lights[1], Light::zeroed());
}
