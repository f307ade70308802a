/// Scene traversal contract consumed by the renderers
///
/// Entity storage lives outside the engine core. A scene only has to hand
/// the renderer its camera, its lights and, one by one, every visible opaque
/// object.

use std::sync::Arc;
use glam::Mat4;
use super::{Camera, Light, Mesh};

/// One visible object yielded by `Scene::for_each_opaque`
#[derive(Clone, Copy)]
pub struct RenderEntity<'a> {
    pub mesh: &'a Arc<Mesh>,
    pub transform: Mat4,
    /// Identity when the entity has no texture-matrix component
    pub texture_matrix: Mat4,
    /// Skinning palette, for animated meshes
    pub joint_transforms: Option<&'a [Mat4]>,
}

impl<'a> RenderEntity<'a> {
    pub fn new(mesh: &'a Arc<Mesh>, transform: Mat4) -> Self {
        Self {
            mesh,
            transform,
            texture_matrix: Mat4::IDENTITY,
            joint_transforms: None,
        }
    }
}

pub trait Scene {
    fn camera(&self) -> &Camera;

    fn lights(&self) -> &[Light];

    /// Call `visit` once per visible opaque entity, in draw order
    fn for_each_opaque(&self, visit: &mut dyn FnMut(RenderEntity<'_>));
}
