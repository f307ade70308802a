/// SamplerCache - one VkSampler per (filter, wrap) pair
///
/// Samplers are created on first use and live as long as the GpuContext.
/// A scene only ever needs a handful of them.

use ash::vk;
use lumos_engine::lumos::Result;
use lumos_engine::lumos::render::{TextureFilter, TextureWrap};
use rustc_hash::FxHashMap;
use crate::vulkan_format::{filter_to_vk, wrap_to_vk};

pub(crate) struct SamplerCache {
    cache: FxHashMap<(TextureFilter, TextureWrap), vk::Sampler>,
    /// Device supports (and has enabled) anisotropic filtering
    anisotropy: bool,
}

impl SamplerCache {
    pub(crate) fn new(anisotropy: bool) -> Self {
        Self {
            cache: FxHashMap::default(),
            anisotropy,
        }
    }

    /// Get or create the sampler for `filter` and `wrap`
    pub(crate) fn get(&mut self, device: &ash::Device, filter: TextureFilter, wrap: TextureWrap) -> Result<vk::Sampler> {
        if let Some(&sampler) = self.cache.get(&(filter, wrap)) {
            return Ok(sampler);
        }

        let (vk_filter, mipmap) = filter_to_vk(filter);
        let address = wrap_to_vk(wrap);
        let anisotropic = self.anisotropy && filter == TextureFilter::Linear;

        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk_filter)
            .min_filter(vk_filter)
            .mipmap_mode(mipmap)
            .address_mode_u(address)
            .address_mode_v(address)
            .address_mode_w(address)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .anisotropy_enable(anisotropic)
            .max_anisotropy(if anisotropic { 16.0 } else { 1.0 });

        let sampler = unsafe { vk_check!(device.create_sampler(&create_info, None), "vkCreateSampler")? };
        self.cache.insert((filter, wrap), sampler);
        Ok(sampler)
    }

    /// Destroy every cached sampler (the device must still be alive)
    pub(crate) fn destroy(&mut self, device: &ash::Device) {
        for (_, sampler) in self.cache.drain() {
            unsafe { device.destroy_sampler(sampler, None) };
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.cache.len()
    }
}
