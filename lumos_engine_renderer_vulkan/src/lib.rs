/*!
# Lumos Engine - Vulkan Backend

Vulkan implementation of the Lumos `GraphicsDevice` and its resource traits.

Built on `ash` for the Vulkan bindings and `gpu-allocator` for device
memory. Every resource keeps the shared `GpuContext` alive, so the logical
device and instance are destroyed only after the last texture, buffer or
pipeline has been dropped.

```no_run
use std::sync::Arc;
use lumos_engine::lumos::Engine;
use lumos_engine::lumos::renderer::RendererConfig;
use lumos_engine_renderer_vulkan::lumos::VulkanGraphicsDevice;
# fn run(window: &winit::window::Window) -> lumos_engine::lumos::Result<()> {
let config = RendererConfig::default();
let device = Arc::new(VulkanGraphicsDevice::new(window, &config)?);
let swapchain = device.create_swapchain(window, 1280, 720, config.vsync)?;
Engine::create_graphics_device(device)?;
# let _ = swapchain;
# Ok(())
# }
```
*/

/// Check the result of a native Vulkan call
///
/// Failures are logged with file:line. Debug builds panic on the spot;
/// release builds return `Error::OutOfMemory` for allocation failures and
/// `Error::BackendError` for everything else.
macro_rules! vk_check {
    ($call:expr, $($what:tt)*) => {
        $call.map_err(|result| $crate::vk_failure(result, format!($($what)*), file!(), line!()))
    };
}

#[cfg(feature = "vulkan-validation")]
mod debug;
mod vulkan_context;
mod vulkan_format;
mod vulkan_sampler;
mod vulkan_texture;
mod vulkan_buffer;
mod vulkan_shader;
mod vulkan_render_pass;
mod vulkan_frame_buffer;
mod vulkan_pipeline;
mod vulkan_descriptor_set;
mod vulkan_command_buffer;
mod vulkan_swapchain;
mod vulkan_graphics_device;

use ash::vk;
use lumos_engine::lumos::{Engine, Error};
use lumos_engine::lumos::log::LogSeverity;

pub use vulkan_graphics_device::VulkanGraphicsDevice;
pub use vulkan_swapchain::VulkanSwapchain;
pub use vulkan_command_buffer::VulkanCommandBuffer;
pub use vulkan_texture::VulkanTexture;
pub use vulkan_pipeline::VulkanPipeline;

// Validation layer utilities (feature "vulkan-validation")
#[cfg(feature = "vulkan-validation")]
pub use debug::{
    get_validation_stats, print_validation_stats_report, Config as DebugConfig, DebugSeverity, ValidationStats,
};

/// Main namespace, mirroring `lumos_engine::lumos`
pub mod lumos {
    pub use crate::vulkan_graphics_device::VulkanGraphicsDevice;
    pub use crate::vulkan_swapchain::VulkanSwapchain;
}

pub(crate) fn vk_failure(result: vk::Result, what: String, file: &'static str, line: u32) -> Error {
    let message = format!("{} failed: {:?}", what, result);
    Engine::log_detailed(LogSeverity::Error, "lumos::vulkan", message.clone(), file, line);

    if cfg!(debug_assertions) {
        panic!("[lumos::vulkan] {}", message);
    }

    match result {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => Error::OutOfMemory,
        _ => Error::BackendError(message),
    }
}
