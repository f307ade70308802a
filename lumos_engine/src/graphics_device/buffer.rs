/// Vertex/index buffers and uniform buffers

use std::any::Any;
use crate::error::Result;

/// Buffer usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer
    Vertex,
    /// Index buffer
    Index,
}

/// Index element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexType {
    U16,
    #[default]
    U32,
}

impl IndexType {
    pub fn size_bytes(self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Descriptor for creating a vertex or index buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Debug name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    pub usage: BufferUsage,
    /// Initial contents (must not exceed `size`)
    pub data: Option<Vec<u8>>,
}

/// Vertex or index buffer
///
/// The native buffer is destroyed when dropped.
pub trait Buffer: Send + Sync {
    /// Size in bytes
    fn size(&self) -> u64;

    fn usage(&self) -> BufferUsage;

    /// Overwrite `data.len()` bytes starting at `offset`
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

/// Descriptor for creating a uniform buffer
#[derive(Debug, Clone)]
pub struct UniformBufferDesc {
    /// Debug name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Bound with a per-draw dynamic offset
    pub dynamic: bool,
    /// Initial contents (must not exceed `size`)
    pub data: Option<Vec<u8>>,
}

impl UniformBufferDesc {
    pub fn new(name: &str, size: u64) -> Self {
        Self { name: name.to_string(), size, dynamic: false, data: None }
    }

    pub fn dynamic(name: &str, size: u64) -> Self {
        Self { dynamic: true, ..Self::new(name, size) }
    }
}

/// CPU-writable uniform buffer
///
/// Written by the CPU between frames and read by the GPU while the frame
/// that references it executes; the owning command buffer's fence orders
/// the two.
pub trait UniformBuffer: Send + Sync {
    /// Size in bytes
    fn size(&self) -> u64;

    /// True if the buffer is bound with dynamic offsets
    fn is_dynamic(&self) -> bool;

    /// Overwrite `data.len()` bytes starting at `offset`
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Overwrite the buffer from the start
    fn set_data(&self, data: &[u8]) -> Result<()> {
        self.update(0, data)
    }

    fn as_any(&self) -> &dyn Any;
}

/// Reject writes that would run past the end of a buffer
pub fn check_buffer_range(source: &str, size: u64, offset: u64, len: usize) -> Result<()> {
    let end = offset.checked_add(len as u64);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(crate::engine_err!(
            source,
            "Buffer write out of range: offset {} + {} bytes > size {}",
            offset,
            len,
            size
        )),
    }
}
