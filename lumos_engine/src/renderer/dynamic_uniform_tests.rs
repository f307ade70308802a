//! Unit tests for dynamic_uniform.rs

use super::*;
use glam::Mat4;

const MAT4_SIZE: usize = std::mem::size_of::<Mat4>();

// ============================================================================
// ALIGNMENT
// ============================================================================

#[test]
fn test_alignment_rounds_up_to_device_minimum() {
    assert_eq!(dynamic_alignment(MAT4_SIZE, 256), 256);
    assert_eq!(dynamic_alignment(MAT4_SIZE, 64), 64);
    assert_eq!(dynamic_alignment(MAT4_SIZE, 48), 96);
    assert_eq!(dynamic_alignment(300, 256), 512);
}

#[test]
fn test_alignment_without_device_minimum_is_element_size() {
    assert_eq!(dynamic_alignment(MAT4_SIZE, 0), MAT4_SIZE);
}

#[test]
fn test_offsets_are_index_times_alignment() {
    let block = DynamicUniformBlock::new(MAT4_SIZE, 8, 256);
    assert_eq!(block.offset(0), 0);
    assert_eq!(block.offset(1), 256);
    assert_eq!(block.offset(2), 512);
    assert_eq!(block.size(), 8 * 256);
}

// ============================================================================
// WRITES
// ============================================================================

#[test]
fn test_write_places_value_at_offset() {
    let mut block = DynamicUniformBlock::new(MAT4_SIZE, 4, 256);
    let transform = Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0));

    block.write(2, &transform);

    let bytes = &block.data()[512..512 + MAT4_SIZE];
    assert_eq!(bytes, bytemuck::bytes_of(&transform));
    assert!(block.data()[256..512].iter().all(|b| *b == 0));
}

#[test]
fn test_write_slice_of_joints() {
    let mut block = DynamicUniformBlock::new(MAT4_SIZE * 4, 2, 256);
    let joints = [Mat4::IDENTITY; 3];

    block.write_slice(1, &joints);
    assert_eq!(&block.data()[256..256 + 3 * MAT4_SIZE], bytemuck::cast_slice::<Mat4, u8>(&joints));
}

#[test]
fn test_write_padded_clears_previous_contents() {
    let mut block = DynamicUniformBlock::new(32, 2, 64);

    block.write_padded(1, &[7; 32]);
    block.write_padded(1, &[9; 8]);

    assert_eq!(&block.data()[64..72], &[9; 8]);
    assert!(block.data()[72..96].iter().all(|b| *b == 0));
    assert!(block.data()[..64].iter().all(|b| *b == 0));
}

#[test]
fn test_used_bytes() {
    let block = DynamicUniformBlock::new(MAT4_SIZE, 4, 256);
    assert_eq!(block.used_bytes(3).len(), 768);
    assert_eq!(block.used_bytes(10).len(), 1024);
}

#[test]
#[should_panic(expected = "exceeds capacity")]
fn test_offset_past_capacity_panics() {
    let block = DynamicUniformBlock::new(MAT4_SIZE, 2, 256);
    block.offset(2);
}

#[test]
#[should_panic(expected = "byte element")]
fn test_oversized_write_panics() {
    let mut block = DynamicUniformBlock::new(MAT4_SIZE, 2, 256);
    block.write_slice(0, &[Mat4::IDENTITY; 2]);
}
