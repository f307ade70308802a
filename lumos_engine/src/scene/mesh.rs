/// Mesh - GPU vertex/index buffers plus an optional material

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use crate::error::Result;
use crate::graphics_device::{
    Buffer, BufferDesc, BufferUsage, GraphicsDevice, IndexType, VertexFormat, VertexLayout,
};
use super::Material;

/// Static mesh vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub colour: [f32; 4],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
}

impl Vertex {
    pub fn layout() -> VertexLayout {
        VertexLayout::packed(&[
            VertexFormat::Vec3,
            VertexFormat::Vec4,
            VertexFormat::Vec2,
            VertexFormat::Vec3,
            VertexFormat::Vec3,
        ])
    }
}

/// Skinned mesh vertex: a static vertex plus four joint influences
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SkinnedVertex {
    pub position: [f32; 3],
    pub colour: [f32; 4],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub joint_ids: [i32; 4],
    pub joint_weights: [f32; 4],
}

impl SkinnedVertex {
    pub fn layout() -> VertexLayout {
        VertexLayout::packed(&[
            VertexFormat::Vec3,
            VertexFormat::Vec4,
            VertexFormat::Vec2,
            VertexFormat::Vec3,
            VertexFormat::Vec3,
            VertexFormat::IVec4,
            VertexFormat::Vec4,
        ])
    }
}

pub struct Mesh {
    name: String,
    vertex_buffer: Arc<dyn Buffer>,
    index_buffer: Arc<dyn Buffer>,
    index_count: u32,
    index_type: IndexType,
    material: Option<Arc<Material>>,
}

impl Mesh {
    pub fn new(
        name: &str,
        vertex_buffer: Arc<dyn Buffer>,
        index_buffer: Arc<dyn Buffer>,
        index_count: u32,
        index_type: IndexType,
    ) -> Self {
        Self {
            name: name.to_string(),
            vertex_buffer,
            index_buffer,
            index_count,
            index_type,
            material: None,
        }
    }

    /// Upload interleaved `vertices` and 32-bit `indices`
    pub fn from_data<V: Pod>(device: &dyn GraphicsDevice, name: &str, vertices: &[V], indices: &[u32]) -> Result<Self> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);

        let vertex_buffer = device.create_buffer(BufferDesc {
            name: format!("{}_vertices", name),
            size: vertex_bytes.len() as u64,
            usage: BufferUsage::Vertex,
            data: Some(vertex_bytes.to_vec()),
        })?;
        let index_buffer = device.create_buffer(BufferDesc {
            name: format!("{}_indices", name),
            size: index_bytes.len() as u64,
            usage: BufferUsage::Index,
            data: Some(index_bytes.to_vec()),
        })?;

        Ok(Self::new(name, vertex_buffer, index_buffer, indices.len() as u32, IndexType::U32))
    }

    pub fn with_material(mut self, material: Arc<Material>) -> Self {
        self.material = Some(material);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertex_buffer(&self) -> &Arc<dyn Buffer> {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &Arc<dyn Buffer> {
        &self.index_buffer
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn material(&self) -> Option<&Arc<Material>> {
        self.material.as_ref()
    }
}
