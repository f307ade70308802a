/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Creates the instance, picks a physical device, opens the logical device
/// with a graphics and a present queue, and hands every resource an
/// `Arc<GpuContext>`.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use lumos_engine::lumos::{Error, Result};
use lumos_engine::lumos::render::{
    Buffer, BufferDesc, CommandBufferLevel, DescriptorSet, DescriptorSetInfo, DeviceLimits, Framebuffer,
    FramebufferInfo, GraphicsApi, GraphicsDevice, NativeCommandBuffer, Pipeline, PipelineInfo, RenderPass,
    RenderPassInfo, Shader, ShaderDesc, Texture, TextureDesc, UniformBuffer, UniformBufferDesc,
};
use lumos_engine::lumos::renderer::RendererConfig;
use lumos_engine::{engine_error, engine_info, engine_warn};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{CStr, CString};
use std::sync::Arc;

use crate::vulkan_buffer::{VulkanBuffer, VulkanUniformBuffer};
use crate::vulkan_command_buffer::VulkanCommandBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor_set::VulkanDescriptorSet;
use crate::vulkan_frame_buffer::VulkanFramebuffer;
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_shader::VulkanShader;
use crate::vulkan_swapchain::{choose_surface_format, create_surface, VulkanSwapchain};
use crate::vulkan_texture::VulkanTexture;

const SOURCE: &str = "lumos::vulkan::GraphicsDevice";

fn init_failed(what: &str, e: impl std::fmt::Debug) -> Error {
    engine_error!(SOURCE, "{}: {:?}", what, e);
    Error::InitializationFailed(format!("{}: {:?}", what, e))
}

/// Vulkan graphics device
pub struct VulkanGraphicsDevice {
    ctx: Arc<GpuContext>,
    device_name: String,
}

impl VulkanGraphicsDevice {
    /// Create the device for `window`
    ///
    /// The window is used to pick a present-capable queue family and the
    /// surface format; the swapchain itself is created by `create_swapchain`.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &RendererConfig) -> Result<Self> {
        #[cfg(feature = "vulkan-validation")]
        {
            Self::new_with_debug_config(window, config, crate::debug::Config { enable_stats: true, ..Default::default() })
        }
        #[cfg(not(feature = "vulkan-validation"))]
        {
            Self::create(window, config)
        }
    }

    /// Create the device with explicit validation callback settings
    #[cfg(feature = "vulkan-validation")]
    pub fn new_with_debug_config<W: HasDisplayHandle + HasWindowHandle>(
        window: &W,
        config: &RendererConfig,
        debug_config: crate::debug::Config,
    ) -> Result<Self> {
        crate::debug::init_debug_config(debug_config);
        Self::create(window, config)
    }

    fn create<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &RendererConfig) -> Result<Self> {
        let validation = config.enable_validation && cfg!(feature = "vulkan-validation");
        if config.enable_validation && !validation {
            engine_warn!(SOURCE, "Validation requested but the crate was built without 'vulkan-validation'");
        }

        unsafe {
            let entry = ash::Entry::load().map_err(|e| init_failed("Failed to load Vulkan library", e))?;

            // ===== INSTANCE =====
            let app_name = CString::new(config.app_name.as_str()).unwrap_or_else(|_| CString::from(c"Lumos Application"));
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Lumos")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            let display_handle = window.display_handle().map_err(|e| init_failed("Failed to get display handle", e))?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| init_failed("Failed to get required instance extensions", e))?
                .to_vec();
            let mut layer_names = Vec::new();
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                layer_names.push(c"VK_LAYER_KHRONOS_validation".as_ptr());
            }

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);
            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_failed("Failed to create Vulkan instance", e))?;

            #[cfg(feature = "vulkan-validation")]
            let debug_messenger = if validation {
                match create_debug_messenger(&entry, &instance) {
                    Ok(messenger) => Some(messenger),
                    Err(e) => {
                        instance.destroy_instance(None);
                        return Err(e);
                    }
                }
            } else {
                None
            };

            // Everything below may fail; release what exists so far on error
            #[cfg(feature = "vulkan-validation")]
            let cleanup = |instance: &ash::Instance, messenger: Option<crate::vulkan_context::DebugMessenger>| {
                if let Some(debug) = messenger {
                    debug.loader.destroy_debug_utils_messenger(debug.messenger, None);
                }
                instance.destroy_instance(None);
            };
            #[cfg(not(feature = "vulkan-validation"))]
            let cleanup = |instance: &ash::Instance, _: Option<()>| instance.destroy_instance(None);
            #[cfg(not(feature = "vulkan-validation"))]
            let debug_messenger: Option<()> = None;

            let selection = match select_device(&entry, &instance, window) {
                Ok(selection) => selection,
                Err(e) => {
                    cleanup(&instance, debug_messenger);
                    return Err(e);
                }
            };

            let properties = instance.get_physical_device_properties(selection.physical_device);
            let device_name = CStr::from_ptr(properties.device_name.as_ptr()).to_string_lossy().into_owned();
            let features = instance.get_physical_device_features(selection.physical_device);
            let anisotropy = features.sampler_anisotropy == vk::TRUE;

            // ===== LOGICAL DEVICE =====
            let queue_priorities = [1.0];
            let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
                .queue_family_index(selection.graphics_family)
                .queue_priorities(&queue_priorities)];
            if selection.present_family != selection.graphics_family {
                queue_create_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(selection.present_family)
                        .queue_priorities(&queue_priorities),
                );
            }

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
            let enabled_features = vk::PhysicalDeviceFeatures::default()
                .sampler_anisotropy(anisotropy)
                .fill_mode_non_solid(features.fill_mode_non_solid == vk::TRUE);
            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&enabled_features);

            let device = match instance.create_device(selection.physical_device, &device_create_info, None) {
                Ok(device) => device,
                Err(e) => {
                    cleanup(&instance, debug_messenger);
                    return Err(init_failed("Failed to create logical device", e));
                }
            };

            let allocator = match Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device: selection.physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            }) {
                Ok(allocator) => allocator,
                Err(e) => {
                    device.destroy_device(None);
                    cleanup(&instance, debug_messenger);
                    return Err(init_failed("Failed to create GPU allocator", e));
                }
            };

            let upload_pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(selection.graphics_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let upload_pool = match device.create_command_pool(&upload_pool_info, None) {
                Ok(pool) => pool,
                Err(e) => {
                    drop(allocator);
                    device.destroy_device(None);
                    cleanup(&instance, debug_messenger);
                    return Err(init_failed("Failed to create upload command pool", e));
                }
            };

            #[allow(unused_mut)]
            let mut ctx = GpuContext::new(
                entry,
                instance,
                selection.physical_device,
                device,
                allocator,
                selection.graphics_family,
                selection.present_family,
                upload_pool,
                selection.surface_format,
                properties.limits,
                anisotropy,
            );
            #[cfg(feature = "vulkan-validation")]
            {
                ctx.debug_messenger = debug_messenger;
            }

            engine_info!(
                SOURCE,
                "Vulkan device '{}' (graphics family {}, present family {}, surface {:?})",
                device_name, selection.graphics_family, selection.present_family, selection.surface_format.format
            );

            Ok(Self { ctx: Arc::new(ctx), device_name })
        }
    }

    /// Name reported by the driver
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Create a swapchain presenting to `window`
    pub fn create_swapchain<W: HasDisplayHandle + HasWindowHandle>(
        &self,
        window: &W,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<VulkanSwapchain> {
        let surface = create_surface(&self.ctx.entry, &self.ctx.instance, window)?;
        VulkanSwapchain::create(self.ctx.clone(), surface, width, height, vsync)
    }
}

// ===== INITIALIZATION HELPERS =====

#[cfg(feature = "vulkan-validation")]
unsafe fn create_debug_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
) -> Result<crate::vulkan_context::DebugMessenger> {
    let severity = crate::debug::current_severity();
    let loader = ash::ext::debug_utils::Instance::new(entry, instance);
    let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(severity.to_vk())
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));
    let messenger = loader
        .create_debug_utils_messenger(&debug_info, None)
        .map_err(|e| init_failed("Failed to create debug messenger", e))?;
    Ok(crate::vulkan_context::DebugMessenger { loader, messenger })
}

struct DeviceSelection {
    physical_device: vk::PhysicalDevice,
    graphics_family: u32,
    present_family: u32,
    surface_format: vk::SurfaceFormatKHR,
}

/// Pick a GPU able to render and present to `window`, preferring discrete GPUs
///
/// Uses a temporary surface that is destroyed before returning.
unsafe fn select_device<W: HasDisplayHandle + HasWindowHandle>(
    entry: &ash::Entry,
    instance: &ash::Instance,
    window: &W,
) -> Result<DeviceSelection> {
    let surface = create_surface(entry, instance, window)?;
    let surface_loader = ash::khr::surface::Instance::new(entry, instance);

    let result = (|| {
        let mut physical_devices = instance
            .enumerate_physical_devices()
            .map_err(|e| init_failed("Failed to enumerate physical devices", e))?;
        physical_devices.sort_by_key(|&pd| {
            match instance.get_physical_device_properties(pd).device_type {
                vk::PhysicalDeviceType::DISCRETE_GPU => 0,
                vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
                _ => 2,
            }
        });

        for physical_device in physical_devices {
            let families = instance.get_physical_device_queue_family_properties(physical_device);
            let Some(graphics_family) = families
                .iter()
                .position(|f| f.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|i| i as u32)
            else {
                continue;
            };

            let supports_present = |family: u32| {
                surface_loader
                    .get_physical_device_surface_support(physical_device, family, surface)
                    .unwrap_or(false)
            };
            // Same family for both when possible
            let present_family = if supports_present(graphics_family) {
                graphics_family
            } else {
                match (0..families.len() as u32).find(|&i| supports_present(i)) {
                    Some(family) => family,
                    None => continue,
                }
            };

            let formats = surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .unwrap_or_default();
            let Some(surface_format) = choose_surface_format(&formats) else {
                continue;
            };

            return Ok(DeviceSelection { physical_device, graphics_family, present_family, surface_format });
        }

        engine_error!(SOURCE, "No Vulkan GPU can render and present to this window");
        Err(Error::InitializationFailed("no suitable Vulkan GPU found".to_string()))
    })();

    surface_loader.destroy_surface(surface, None);
    result
}

// ===== GRAPHICS DEVICE =====

impl GraphicsDevice for VulkanGraphicsDevice {
    fn api(&self) -> GraphicsApi {
        GraphicsApi::Vulkan
    }

    fn limits(&self) -> DeviceLimits {
        let limits = &self.ctx.limits;
        DeviceLimits {
            min_uniform_buffer_offset_alignment: limits.min_uniform_buffer_offset_alignment,
            max_framebuffer_width: limits.max_framebuffer_width,
            max_framebuffer_height: limits.max_framebuffer_height,
        }
    }

    fn create_texture(&self, desc: TextureDesc) -> Result<Arc<dyn Texture>> {
        Ok(Arc::new(VulkanTexture::create(self.ctx.clone(), desc)?))
    }

    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        Ok(Arc::new(VulkanBuffer::create(self.ctx.clone(), desc)?))
    }

    fn create_uniform_buffer(&self, desc: UniformBufferDesc) -> Result<Arc<dyn UniformBuffer>> {
        Ok(Arc::new(VulkanUniformBuffer::create(self.ctx.clone(), desc)?))
    }

    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn Shader>> {
        Ok(Arc::new(VulkanShader::create(self.ctx.clone(), desc)?))
    }

    fn create_native_command_buffer(&self, level: CommandBufferLevel) -> Result<Box<dyn NativeCommandBuffer>> {
        Ok(Box::new(VulkanCommandBuffer::create(self.ctx.clone(), level)?))
    }

    fn create_render_pass(&self, info: &RenderPassInfo) -> Result<Arc<dyn RenderPass>> {
        Ok(Arc::new(VulkanRenderPass::create(self.ctx.clone(), info)?))
    }

    fn create_framebuffer(&self, info: FramebufferInfo) -> Result<Arc<dyn Framebuffer>> {
        Ok(Arc::new(VulkanFramebuffer::create(self.ctx.clone(), info)?))
    }

    fn create_pipeline(&self, info: PipelineInfo) -> Result<Arc<dyn Pipeline>> {
        Ok(Arc::new(VulkanPipeline::create(self.ctx.clone(), info)?))
    }

    fn create_descriptor_set(&self, info: &DescriptorSetInfo) -> Result<Arc<dyn DescriptorSet>> {
        let pipeline = info.pipeline.as_any().downcast_ref::<VulkanPipeline>().ok_or_else(|| {
            engine_error!(SOURCE, "create_descriptor_set: pipeline '{}' is not a Vulkan pipeline", info.pipeline.name());
            Error::InvalidResource(format!("pipeline '{}' is not a Vulkan pipeline", info.pipeline.name()))
        })?;
        Ok(Arc::new(VulkanDescriptorSet::allocate(pipeline.layout.clone(), info.layout_index)?))
    }

    fn wait_idle(&self) -> Result<()> {
        self.ctx.wait_idle()
    }
}
