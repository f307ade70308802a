//! Unit tests for descriptor binding resolution
//!
//! Works on GL names only, no context required.

use super::*;
use std::num::NonZeroU32;

fn buffer_name(id: u32) -> glow::NativeBuffer {
    glow::NativeBuffer(NonZeroU32::new(id).unwrap())
}

fn texture_name(id: u32) -> glow::NativeTexture {
    glow::NativeTexture(NonZeroU32::new(id).unwrap())
}

fn bound(id: u32, buffer_size: u64, offset: u64, size: u64, dynamic: bool) -> BoundBuffer {
    BoundBuffer { handle: buffer_name(id), buffer_size, offset, size, dynamic }
}

// ============================================================================
// UNIFORM BUFFER TESTS
// ============================================================================

#[test]
fn test_static_buffers_bind_in_binding_order() {
    let mut bindings = SetBindings::default();
    bindings.buffers.insert(2, bound(3, 512, 0, 512, false));
    bindings.buffers.insert(0, bound(1, 256, 0, 0, false));

    let commands = resolve_bindings(&bindings, &mut [].iter()).unwrap();

    assert_eq!(
        commands,
        vec![
            GlCommand::BindUniformBuffer { binding: 0, buffer: buffer_name(1), offset: 0, size: 256 },
            GlCommand::BindUniformBuffer { binding: 2, buffer: buffer_name(3), offset: 0, size: 512 },
        ]
    );
}

#[test]
fn test_dynamic_buffers_consume_offsets_in_order() {
    let mut bindings = SetBindings::default();
    bindings.buffers.insert(0, bound(1, 256, 0, 256, false));
    bindings.buffers.insert(1, bound(2, 4096, 0, 64, true));
    bindings.buffers.insert(3, bound(4, 8192, 128, 256, true));

    let offsets = [512u32, 1024];
    let mut iter = offsets.iter();
    let commands = resolve_bindings(&bindings, &mut iter).unwrap();

    assert_eq!(commands[1], GlCommand::BindUniformBuffer { binding: 1, buffer: buffer_name(2), offset: 512, size: 64 });
    assert_eq!(commands[2], GlCommand::BindUniformBuffer { binding: 3, buffer: buffer_name(4), offset: 1152, size: 256 });
    assert!(iter.next().is_none());
}

#[test]
fn test_offsets_carry_over_between_sets() {
    let mut first = SetBindings::default();
    first.buffers.insert(1, bound(2, 4096, 0, 64, true));
    let mut second = SetBindings::default();
    second.buffers.insert(3, bound(5, 4096, 0, 64, true));

    let offsets = [256u32, 768];
    let mut iter = offsets.iter();
    let a = resolve_bindings(&first, &mut iter).unwrap();
    let b = resolve_bindings(&second, &mut iter).unwrap();

    assert_eq!(a[0], GlCommand::BindUniformBuffer { binding: 1, buffer: buffer_name(2), offset: 256, size: 64 });
    assert_eq!(b[0], GlCommand::BindUniformBuffer { binding: 3, buffer: buffer_name(5), offset: 768, size: 64 });
}

#[test]
fn test_missing_dynamic_offset_fails() {
    let mut bindings = SetBindings::default();
    bindings.buffers.insert(1, bound(2, 4096, 0, 64, true));

    assert!(resolve_bindings(&bindings, &mut [].iter()).is_err());
}

#[test]
fn test_out_of_range_dynamic_offset_fails() {
    let mut bindings = SetBindings::default();
    bindings.buffers.insert(1, bound(2, 1024, 0, 64, true));

    let offsets = [1000u32];
    assert!(resolve_bindings(&bindings, &mut offsets.iter()).is_err());
}

// ============================================================================
// TEXTURE TESTS
// ============================================================================

#[test]
fn test_textures_bind_to_matching_units() {
    let mut bindings = SetBindings::default();
    bindings.textures.insert(0, BoundTexture { handle: texture_name(9), target: glow::TEXTURE_2D });
    bindings.textures.insert(1, BoundTexture { handle: texture_name(10), target: glow::TEXTURE_2D_ARRAY });

    let commands = resolve_bindings(&bindings, &mut [].iter()).unwrap();

    assert_eq!(
        commands,
        vec![
            GlCommand::BindTexture { unit: 0, target: glow::TEXTURE_2D, texture: texture_name(9) },
            GlCommand::BindTexture { unit: 1, target: glow::TEXTURE_2D_ARRAY, texture: texture_name(10) },
        ]
    );
}
