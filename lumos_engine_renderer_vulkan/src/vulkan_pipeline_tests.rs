//! Unit tests for descriptor pool sizing
//!
//! No GPU required.

use super::*;
use lumos_engine::lumos::render::{DescriptorLayoutInfo, ShaderType};

fn layout(types: &[DescriptorType]) -> DescriptorLayout {
    DescriptorLayout {
        bindings: types
            .iter()
            .enumerate()
            .map(|(binding, descriptor_type)| DescriptorLayoutInfo {
                descriptor_type: *descriptor_type,
                stage: ShaderType::Vertex,
                binding: binding as u32,
            })
            .collect(),
    }
}

// ============================================================================
// POOL SIZE TESTS
// ============================================================================

#[test]
fn test_requested_pool_sizes_are_kept() {
    let requested = [
        DescriptorPoolInfo { descriptor_type: DescriptorType::UniformBuffer, count: 8 },
        DescriptorPoolInfo { descriptor_type: DescriptorType::ImageSampler, count: 32 },
    ];
    let sizes = merged_pool_sizes(&requested, &[], 100);
    assert_eq!(sizes, vec![(DescriptorType::UniformBuffer, 8), (DescriptorType::ImageSampler, 32)]);
}

#[test]
fn test_duplicate_requests_accumulate() {
    let requested = [
        DescriptorPoolInfo { descriptor_type: DescriptorType::UniformBuffer, count: 3 },
        DescriptorPoolInfo { descriptor_type: DescriptorType::UniformBuffer, count: 4 },
    ];
    let sizes = merged_pool_sizes(&requested, &[], 1);
    assert_eq!(sizes, vec![(DescriptorType::UniformBuffer, 7)]);
}

#[test]
fn test_layout_types_missing_from_request_are_added() {
    let requested = [DescriptorPoolInfo { descriptor_type: DescriptorType::UniformBuffer, count: 2 }];
    let layouts = [layout(&[DescriptorType::UniformBuffer, DescriptorType::UniformBufferDynamic])];
    let sizes = merged_pool_sizes(&requested, &layouts, 16);
    assert_eq!(
        sizes,
        vec![(DescriptorType::UniformBuffer, 2), (DescriptorType::UniformBufferDynamic, 16)]
    );
}

#[test]
fn test_zero_counts_are_raised_to_one() {
    let requested = [DescriptorPoolInfo { descriptor_type: DescriptorType::ImageSampler, count: 0 }];
    let layouts = [layout(&[DescriptorType::UniformBufferDynamic])];
    let sizes = merged_pool_sizes(&requested, &layouts, 0);
    assert_eq!(
        sizes,
        vec![(DescriptorType::UniformBufferDynamic, 1), (DescriptorType::ImageSampler, 1)]
    );
}
