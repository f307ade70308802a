/// Per-frame draw records

use std::sync::Arc;
use glam::Mat4;
use crate::scene::Mesh;

/// Entries reserved up front so a normal frame never reallocates
pub const COMMAND_QUEUE_RESERVE: usize = 1000;

/// One draw: a mesh, its transform and texture matrix
#[derive(Clone)]
pub struct RenderCommand {
    pub mesh: Arc<Mesh>,
    pub transform: Mat4,
    pub texture_matrix: Mat4,
    /// Joint matrices for skinned meshes (deferred renderer only)
    pub joint_transforms: Option<Vec<Mat4>>,
}

impl RenderCommand {
    pub fn new(mesh: Arc<Mesh>, transform: Mat4, texture_matrix: Mat4) -> Self {
        Self { mesh, transform, texture_matrix, joint_transforms: None }
    }

    pub fn with_joints(mut self, joints: Vec<Mat4>) -> Self {
        self.joint_transforms = Some(joints);
        self
    }

    pub fn is_skinned(&self) -> bool {
        self.joint_transforms.is_some()
    }
}

/// Commands in submission order; queue position is the object index used
/// for dynamic uniform offsets
pub struct CommandQueue {
    commands: Vec<RenderCommand>,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        Self { commands: Vec::with_capacity(COMMAND_QUEUE_RESERVE) }
    }

    pub fn push(&mut self, command: RenderCommand) {
        self.commands.push(command);
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.commands.capacity()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RenderCommand> {
        self.commands.iter()
    }

    pub fn get(&self, index: usize) -> Option<&RenderCommand> {
        self.commands.get(index)
    }
}
