/// Swapchain - Vulkan implementation of the Swapchain trait
///
/// Owns the window surface and the presentable images. `present` submits the
/// frame's primary command buffer itself so it can wait on the acquire
/// semaphore and signal the present semaphore.

use ash::vk;
use lumos_engine::lumos::{Error, Result};
use lumos_engine::lumos::render::{NativeCommandBuffer, Swapchain, Texture, TextureFormat};
use lumos_engine::{engine_debug, engine_error, engine_info, engine_warn};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::sync::Arc;

use crate::vulkan_command_buffer::VulkanCommandBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_texture::VulkanTexture;

const SOURCE: &str = "lumos::vulkan::Swapchain";

/// Frames the CPU may record ahead of the GPU
const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Create a presentation surface for `window`
pub(crate) fn create_surface<W: HasDisplayHandle + HasWindowHandle>(
    entry: &ash::Entry,
    instance: &ash::Instance,
    window: &W,
) -> Result<vk::SurfaceKHR> {
    let display_handle = window.display_handle().map_err(|e| {
        engine_error!(SOURCE, "Failed to get display handle: {}", e);
        Error::InitializationFailed(format!("Failed to get display handle: {}", e))
    })?;
    let window_handle = window.window_handle().map_err(|e| {
        engine_error!(SOURCE, "Failed to get window handle: {}", e);
        Error::InitializationFailed(format!("Failed to get window handle: {}", e))
    })?;

    unsafe {
        ash_window::create_surface(entry, instance, display_handle.as_raw(), window_handle.as_raw(), None).map_err(
            |e| {
                engine_error!(SOURCE, "Failed to create window surface: {:?}", e);
                Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
            },
        )
    }
}

/// FIFO with vsync; otherwise the lowest-latency mode the surface offers
pub(crate) fn choose_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Surface extent, clamped when the window system leaves the choice to us
pub(crate) fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

/// sRGB BGRA/RGBA when offered, otherwise whatever the surface lists first
pub(crate) fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|f| {
            matches!(f.format, vk::Format::B8G8R8A8_SRGB | vk::Format::R8G8B8A8_SRGB)
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| available.first())
        .copied()
}

/// One more image than the minimum, within the surface limit (0 = unlimited)
pub(crate) fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// Vulkan swapchain implementation
pub struct VulkanSwapchain {
    ctx: Arc<GpuContext>,

    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,

    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    images: Vec<Arc<VulkanTexture>>,
    extent: vk::Extent2D,
    vsync: bool,

    /// One per frame in flight (acquire)
    image_available_semaphores: Vec<vk::Semaphore>,
    /// One per swapchain image (present)
    render_finished_semaphores: Vec<vk::Semaphore>,

    current_frame: usize,
    current_image: usize,
}

impl VulkanSwapchain {
    pub(crate) fn create(
        ctx: Arc<GpuContext>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self> {
        let surface_loader = ash::khr::surface::Instance::new(&ctx.entry, &ctx.instance);
        let swapchain_loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);

        let supported = unsafe {
            surface_loader
                .get_physical_device_surface_support(ctx.physical_device, ctx.present_queue_family, surface)
                .unwrap_or(false)
        };
        if !supported {
            unsafe { surface_loader.destroy_surface(surface, None) };
            engine_error!(SOURCE, "Present queue family {} cannot present to this surface", ctx.present_queue_family);
            return Err(Error::InitializationFailed("surface not supported by present queue".to_string()));
        }

        let mut swapchain = Self {
            ctx,
            surface,
            surface_loader,
            swapchain: vk::SwapchainKHR::null(),
            swapchain_loader,
            images: Vec::new(),
            extent: vk::Extent2D { width, height },
            vsync,
            image_available_semaphores: Vec::with_capacity(MAX_FRAMES_IN_FLIGHT),
            render_finished_semaphores: Vec::new(),
            current_frame: 0,
            current_image: 0,
        };

        let semaphore_info = vk::SemaphoreCreateInfo::default();
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let semaphore = unsafe {
                vk_check!(swapchain.ctx.device.create_semaphore(&semaphore_info, None), "vkCreateSemaphore (acquire)")?
            };
            swapchain.image_available_semaphores.push(semaphore);
        }

        swapchain.build(width, height)?;
        Ok(swapchain)
    }

    /// (Re)create the swapchain, its image textures and present semaphores
    fn build(&mut self, width: u32, height: u32) -> Result<()> {
        let ctx = self.ctx.clone();
        let (capabilities, present_modes) = unsafe {
            let capabilities = vk_check!(
                self.surface_loader.get_physical_device_surface_capabilities(ctx.physical_device, self.surface),
                "vkGetPhysicalDeviceSurfaceCapabilitiesKHR"
            )?;
            let present_modes = vk_check!(
                self.surface_loader.get_physical_device_surface_present_modes(ctx.physical_device, self.surface),
                "vkGetPhysicalDeviceSurfacePresentModesKHR"
            )?;
            (capabilities, present_modes)
        };

        let extent = choose_extent(&capabilities, width, height);
        let present_mode = choose_present_mode(&present_modes, self.vsync);
        let surface_format = ctx.surface_format;

        let queue_families = [ctx.graphics_queue_family, ctx.present_queue_family];
        let old_swapchain = self.swapchain;
        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(choose_image_count(&capabilities))
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);
        create_info = if ctx.graphics_queue_family != ctx.present_queue_family {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_families)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = unsafe { vk_check!(self.swapchain_loader.create_swapchain(&create_info, None), "vkCreateSwapchainKHR")? };

        // Old image views go with the old textures; the old swapchain can go now
        self.images.clear();
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { self.swapchain_loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;
        self.extent = extent;

        let raw_images = unsafe { vk_check!(self.swapchain_loader.get_swapchain_images(swapchain), "vkGetSwapchainImagesKHR")? };
        for (index, &image) in raw_images.iter().enumerate() {
            let texture = VulkanTexture::from_swapchain_image(
                ctx.clone(),
                index,
                image,
                surface_format.format,
                extent.width,
                extent.height,
            )?;
            self.images.push(Arc::new(texture));
        }
        self.transition_images_to_present(&raw_images)?;

        unsafe {
            for semaphore in self.render_finished_semaphores.drain(..) {
                ctx.device.destroy_semaphore(semaphore, None);
            }
        }
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        for _ in 0..raw_images.len() {
            let semaphore = unsafe { vk_check!(ctx.device.create_semaphore(&semaphore_info, None), "vkCreateSemaphore (present)")? };
            self.render_finished_semaphores.push(semaphore);
        }

        self.current_image = 0;
        engine_info!(
            SOURCE,
            "Swapchain {}x{}, {} images, {:?}",
            extent.width, extent.height, raw_images.len(), present_mode
        );
        Ok(())
    }

    /// Fresh images are UNDEFINED; render passes that load expect PRESENT_SRC
    fn transition_images_to_present(&self, images: &[vk::Image]) -> Result<()> {
        let barriers: Vec<vk::ImageMemoryBarrier> = images
            .iter()
            .map(|&image| {
                vk::ImageMemoryBarrier::default()
                    .old_layout(vk::ImageLayout::UNDEFINED)
                    .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(image)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
            })
            .collect();

        self.ctx.one_time_submit(|device, command_buffer| unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &barriers,
            );
        })
    }
}

impl Swapchain for VulkanSwapchain {
    fn buffer_count(&self) -> usize {
        self.images.len()
    }

    fn current_buffer_index(&self) -> usize {
        self.current_image
    }

    fn image(&self, index: usize) -> Arc<dyn Texture> {
        lumos_engine::engine_assert!(
            index < self.images.len(),
            SOURCE,
            "Swapchain image {} out of range ({} images)",
            index,
            self.images.len()
        );
        self.images[index].clone()
    }

    fn acquire_next_image(&mut self) -> Result<usize> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                self.image_available_semaphores[self.current_frame],
                vk::Fence::null(),
            )
        };

        match result {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    engine_debug!(SOURCE, "Swapchain suboptimal on acquire");
                }
                self.current_image = index as usize;
                Ok(self.current_image)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_warn!(SOURCE, "Swapchain out of date on acquire, recreate required");
                Err(Error::BackendError("swapchain out of date".to_string()))
            }
            Err(e) => Err(crate::vk_failure(e, "vkAcquireNextImageKHR".to_string(), file!(), line!())),
        }
    }

    fn present(&mut self, command_buffer: &mut dyn NativeCommandBuffer) -> Result<()> {
        let command_buffer = command_buffer
            .as_any_mut()
            .downcast_mut::<VulkanCommandBuffer>()
            .ok_or_else(|| {
                engine_error!(SOURCE, "Present: command buffer was not created by the Vulkan device");
                Error::InvalidResource("present needs a Vulkan command buffer".to_string())
            })?;

        let wait_semaphores = [self.image_available_semaphores[self.current_frame]];
        let signal_semaphores = [self.render_finished_semaphores[self.current_image]];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer.command_buffer];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        self.ctx.queue_submit(submit_info, command_buffer.fence)?;
        command_buffer.pending = true;

        let swapchains = [self.swapchain];
        let image_indices = [self.current_image as u32];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;

        match self.ctx.queue_present(&self.swapchain_loader, &present_info) {
            Ok(false) => Ok(()),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => {
                engine_debug!(SOURCE, "Swapchain suboptimal on present");
                Ok(())
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_warn!(SOURCE, "Swapchain out of date on present, recreate required");
                Ok(())
            }
            Err(e) => Err(crate::vk_failure(e, "vkQueuePresentKHR".to_string(), file!(), line!())),
        }
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        self.ctx.wait_idle()?;
        self.build(width, height)
    }

    fn width(&self) -> u32 {
        self.extent.width
    }

    fn height(&self) -> u32 {
        self.extent.height
    }

    fn format(&self) -> TextureFormat {
        TextureFormat::Screen
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe {
            let _ = self.ctx.device.device_wait_idle();

            for &semaphore in self.image_available_semaphores.iter().chain(&self.render_finished_semaphores) {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
            self.images.clear();
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
