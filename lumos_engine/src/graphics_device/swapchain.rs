/// Swapchain trait - presentable images owned by the application

use std::sync::{Arc, Mutex};
use crate::error::Result;
use crate::graphics_device::{NativeCommandBuffer, Texture, TextureFormat};

/// Swapchain shared between the application (acquire, resize) and renderers
/// (framebuffers, present)
pub type SharedSwapchain = Arc<Mutex<dyn Swapchain>>;

/// Swapchain trait
///
/// Renderers keep one framebuffer and one primary command buffer per image
/// and must re-query `buffer_count()` after a resize.
pub trait Swapchain: Send + Sync {
    /// Number of presentable images
    fn buffer_count(&self) -> usize;

    /// Image index acquired for the frame being recorded
    fn current_buffer_index(&self) -> usize;

    /// Presentable image `index` (usable as a framebuffer attachment)
    fn image(&self, index: usize) -> Arc<dyn Texture>;

    /// Acquire the next image; returns its index
    fn acquire_next_image(&mut self) -> Result<usize>;

    /// Submit the frame's recorded primary buffer and present the current image
    fn present(&mut self, command_buffer: &mut dyn NativeCommandBuffer) -> Result<()>;

    /// Recreate images at a new size
    fn recreate(&mut self, width: u32, height: u32) -> Result<()>;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn format(&self) -> TextureFormat;
}
