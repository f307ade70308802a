/// CPU staging for a dynamic uniform buffer
///
/// Holds `capacity` elements at stride-aligned offsets. The stride is the
/// element size rounded up to the device's minimum uniform offset alignment,
/// so every `offset(i)` is a valid dynamic offset.

use bytemuck::Pod;

pub struct DynamicUniformBlock {
    element_size: usize,
    alignment: usize,
    capacity: usize,
    data: Vec<u8>,
}

/// Element stride for `element_size` bytes under `min_alignment`
pub fn dynamic_alignment(element_size: usize, min_alignment: usize) -> usize {
    if min_alignment > 0 {
        element_size.div_ceil(min_alignment) * min_alignment
    } else {
        element_size
    }
}

impl DynamicUniformBlock {
    pub fn new(element_size: usize, capacity: usize, min_alignment: u64) -> Self {
        let alignment = dynamic_alignment(element_size, min_alignment as usize);
        Self {
            element_size,
            alignment,
            capacity,
            data: vec![0; alignment * capacity],
        }
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Bytes between consecutive elements
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total size of the backing buffer
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Byte offset of element `index`
    pub fn offset(&self, index: usize) -> usize {
        crate::engine_assert!(
            index < self.capacity,
            "lumos::DynamicUniformBlock",
            "Object index {} exceeds capacity {}",
            index,
            self.capacity
        );
        index * self.alignment
    }

    /// Store `value` at element `index`
    pub fn write<T: Pod>(&mut self, index: usize, value: &T) {
        self.write_bytes(index, bytemuck::bytes_of(value));
    }

    /// Store a run of values at element `index` (must fit in one element)
    pub fn write_slice<T: Pod>(&mut self, index: usize, values: &[T]) {
        self.write_bytes(index, bytemuck::cast_slice(values));
    }

    /// Store raw bytes at element `index`, zeroing the rest of the element
    pub fn write_padded(&mut self, index: usize, bytes: &[u8]) {
        self.write_bytes(index, bytes);
        let start = self.offset(index);
        self.data[start + bytes.len()..start + self.element_size].fill(0);
    }

    fn write_bytes(&mut self, index: usize, bytes: &[u8]) {
        crate::engine_assert!(
            bytes.len() <= self.element_size,
            "lumos::DynamicUniformBlock",
            "{} bytes written into a {} byte element",
            bytes.len(),
            self.element_size
        );
        let start = self.offset(index);
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Staged bytes covering the first `count` elements
    pub fn used_bytes(&self, count: usize) -> &[u8] {
        &self.data[..(count.min(self.capacity) * self.alignment)]
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
#[path = "dynamic_uniform_tests.rs"]
mod tests;
