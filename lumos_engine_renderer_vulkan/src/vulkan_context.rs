/// GpuContext - everything the Vulkan resources share
///
/// Every texture, buffer, pipeline and command buffer holds an
/// `Arc<GpuContext>`. The context owns the instance and logical device and
/// destroys them when the last holder goes away, so no resource can outlive
/// the device it was created on.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use lumos_engine::lumos::{Error, Result};
use lumos_engine::lumos::render::{TextureFilter, TextureWrap};
use lumos_engine::{engine_debug, engine_err, engine_error};
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};

use crate::vulkan_sampler::SamplerCache;

/// Validation messenger owned by the context
#[cfg(feature = "vulkan-validation")]
pub(crate) struct DebugMessenger {
    pub loader: ash::ext::debug_utils::Instance,
    pub messenger: vk::DebugUtilsMessengerEXT,
}

pub(crate) struct GpuContext {
    /// Vulkan entry (surface creation for swapchains)
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,

    /// Dropped explicitly before the device is destroyed
    allocator: ManuallyDrop<Mutex<Allocator>>,

    /// vkQueueSubmit/vkQueuePresentKHR need external synchronization
    graphics_queue: Mutex<vk::Queue>,
    pub graphics_queue_family: u32,
    pub present_queue: vk::Queue,
    pub present_queue_family: u32,

    /// Pool for one-shot upload and layout-transition commands
    upload_command_pool: Mutex<vk::CommandPool>,
    samplers: Mutex<SamplerCache>,

    /// Presentable format chosen at device creation; `TextureFormat::Screen` resolves to it
    pub surface_format: vk::SurfaceFormatKHR,
    pub limits: vk::PhysicalDeviceLimits,

    #[cfg(feature = "vulkan-validation")]
    pub(crate) debug_messenger: Option<DebugMessenger>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| engine_err!("lumos::vulkan::GpuContext", "{} lock poisoned", what))
}

impl GpuContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        allocator: Allocator,
        graphics_queue_family: u32,
        present_queue_family: u32,
        upload_command_pool: vk::CommandPool,
        surface_format: vk::SurfaceFormatKHR,
        limits: vk::PhysicalDeviceLimits,
        anisotropy: bool,
    ) -> Self {
        let (graphics_queue, present_queue) = unsafe {
            (
                device.get_device_queue(graphics_queue_family, 0),
                device.get_device_queue(present_queue_family, 0),
            )
        };

        Self {
            entry,
            instance,
            physical_device,
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue: Mutex::new(graphics_queue),
            graphics_queue_family,
            present_queue,
            present_queue_family,
            upload_command_pool: Mutex::new(upload_command_pool),
            samplers: Mutex::new(SamplerCache::new(anisotropy)),
            surface_format,
            limits,
            #[cfg(feature = "vulkan-validation")]
            debug_messenger: None,
        }
    }

    // ===== MEMORY =====

    /// Allocate device memory; allocator failures surface as `Error::OutOfMemory`
    pub(crate) fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        let mut allocator = lock(&*self.allocator, "Allocator")?;
        allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!("lumos::vulkan::GpuContext", "Out of GPU memory for '{}' ({:.2} MB): {}", name, size_mb, e);
                Error::OutOfMemory
            })
    }

    /// Return an allocation to the allocator (never fails; used from Drop)
    pub(crate) fn free(&self, allocation: Allocation) {
        if let Ok(mut allocator) = self.allocator.lock() {
            if let Err(e) = allocator.free(allocation) {
                engine_error!("lumos::vulkan::GpuContext", "Failed to free GPU allocation: {}", e);
            }
        }
    }

    /// Create a buffer bound to freshly allocated memory
    pub(crate) fn create_buffer(
        &self,
        name: &str,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> Result<(vk::Buffer, Allocation)> {
        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(size.max(1))
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            let buffer = vk_check!(self.device.create_buffer(&create_info, None), "vkCreateBuffer '{}'", name)?;

            let requirements = self.device.get_buffer_memory_requirements(buffer);
            let allocation = match self.allocate(name, requirements, location, true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = vk_check!(
                self.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()),
                "vkBindBufferMemory '{}'",
                name
            ) {
                self.free(allocation);
                self.device.destroy_buffer(buffer, None);
                return Err(e);
            }

            Ok((buffer, allocation))
        }
    }

    // ===== SAMPLERS =====

    pub(crate) fn sampler(&self, filter: TextureFilter, wrap: TextureWrap) -> Result<vk::Sampler> {
        lock(&self.samplers, "SamplerCache")?.get(&self.device, filter, wrap)
    }

    // ===== SUBMISSION =====

    /// Submit to the graphics queue, signalling `fence` on completion
    pub(crate) fn queue_submit(&self, submit_info: vk::SubmitInfo, fence: vk::Fence) -> Result<()> {
        let queue = lock(&self.graphics_queue, "Graphics queue")?;
        unsafe { vk_check!(self.device.queue_submit(*queue, &[submit_info], fence), "vkQueueSubmit") }
    }

    /// Present on the present queue; returns `Ok(true)` when the swapchain is suboptimal
    pub(crate) fn queue_present(
        &self,
        loader: &ash::khr::swapchain::Device,
        present_info: &vk::PresentInfoKHR,
    ) -> std::result::Result<bool, vk::Result> {
        // The present queue is usually the graphics queue; serialize on the same lock.
        let _queue = self.graphics_queue.lock();
        unsafe { loader.queue_present(self.present_queue, present_info) }
    }

    /// Record commands into a throwaway buffer, submit and wait for completion
    ///
    /// Used at resource creation time (uploads, initial layout transitions).
    pub(crate) fn one_time_submit<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let pool = lock(&self.upload_command_pool, "Upload command pool")?;

        unsafe {
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = vk_check!(
                self.device.allocate_command_buffers(&allocate_info),
                "vkAllocateCommandBuffers (upload)"
            )?[0];

            let result = (|| {
                let begin_info = vk::CommandBufferBeginInfo::default()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
                vk_check!(self.device.begin_command_buffer(command_buffer, &begin_info), "vkBeginCommandBuffer (upload)")?;

                record(&self.device, command_buffer);

                vk_check!(self.device.end_command_buffer(command_buffer), "vkEndCommandBuffer (upload)")?;

                let command_buffers = [command_buffer];
                let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
                let queue = lock(&self.graphics_queue, "Graphics queue")?;
                vk_check!(self.device.queue_submit(*queue, &[submit_info], vk::Fence::null()), "vkQueueSubmit (upload)")?;
                vk_check!(self.device.queue_wait_idle(*queue), "vkQueueWaitIdle (upload)")
            })();

            self.device.free_command_buffers(*pool, &[command_buffer]);
            result
        }
    }

    pub(crate) fn wait_idle(&self) -> Result<()> {
        unsafe { vk_check!(self.device.device_wait_idle(), "vkDeviceWaitIdle") }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            if let Ok(mut samplers) = self.samplers.lock() {
                engine_debug!("lumos::vulkan::GpuContext", "Destroying {} cached samplers", samplers.len());
                samplers.destroy(&self.device);
            }
            if let Ok(pool) = self.upload_command_pool.lock() {
                self.device.destroy_command_pool(*pool, None);
            }

            // Allocator memory blocks must go before the device.
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);

            #[cfg(feature = "vulkan-validation")]
            if let Some(debug) = self.debug_messenger.take() {
                debug.loader.destroy_debug_utils_messenger(debug.messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}
