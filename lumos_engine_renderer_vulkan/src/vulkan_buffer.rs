/// Buffer - Vulkan implementation of the Buffer and UniformBuffer traits
///
/// Both live in host-visible (CpuToGpu) memory and are written through the
/// persistent mapping gpu-allocator provides.

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use lumos_engine::lumos::{Error, Result};
use lumos_engine::lumos::render::{
    check_buffer_range, Buffer, BufferDesc, BufferUsage, UniformBuffer, UniformBufferDesc,
};
use lumos_engine::engine_error;
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Copy `data` into the mapped allocation at `offset`
fn write_mapped(source: &str, allocation: Option<&Allocation>, size: u64, offset: u64, data: &[u8]) -> Result<()> {
    check_buffer_range(source, size, offset, data.len())?;

    let mapped = allocation.and_then(|a| a.mapped_ptr()).ok_or_else(|| {
        engine_error!(source, "Buffer update failed: memory is not host-visible");
        Error::BackendError("buffer is not CPU-accessible".to_string())
    })?;

    unsafe {
        std::ptr::copy_nonoverlapping(
            data.as_ptr(),
            (mapped.as_ptr() as *mut u8).add(offset as usize),
            data.len(),
        );
    }
    Ok(())
}

// ===== VERTEX / INDEX BUFFER =====

/// Vulkan vertex or index buffer
pub struct VulkanBuffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
    usage: BufferUsage,
}

impl VulkanBuffer {
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: BufferDesc) -> Result<Self> {
        let usage = match desc.usage {
            BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
        };
        let (buffer, allocation) = ctx.create_buffer(&desc.name, desc.size, usage, MemoryLocation::CpuToGpu)?;

        let buffer = Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size: desc.size,
            usage: desc.usage,
        };
        if let Some(data) = &desc.data {
            buffer.update(0, data)?;
        }
        Ok(buffer)
    }
}

impl Buffer for VulkanBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        write_mapped("lumos::vulkan::Buffer", self.allocation.as_ref(), self.size, offset, data)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
        unsafe { self.ctx.device.destroy_buffer(self.buffer, None) };
    }
}

// ===== UNIFORM BUFFER =====

/// Vulkan uniform buffer (plain or bound with dynamic offsets)
pub struct VulkanUniformBuffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
    dynamic: bool,
}

impl VulkanUniformBuffer {
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: UniformBufferDesc) -> Result<Self> {
        let (buffer, allocation) = ctx.create_buffer(
            &desc.name,
            desc.size,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            MemoryLocation::CpuToGpu,
        )?;

        let uniform_buffer = Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size: desc.size,
            dynamic: desc.dynamic,
        };
        if let Some(data) = &desc.data {
            uniform_buffer.update(0, data)?;
        }
        Ok(uniform_buffer)
    }
}

impl UniformBuffer for VulkanUniformBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        write_mapped("lumos::vulkan::UniformBuffer", self.allocation.as_ref(), self.size, offset, data)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanUniformBuffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
        unsafe { self.ctx.device.destroy_buffer(self.buffer, None) };
    }
}
