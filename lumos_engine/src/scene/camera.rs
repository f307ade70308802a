/// Camera - passive data container read by the renderers.
///
/// The camera computes nothing. The caller owns it and sets the view and
/// projection matrices; `Renderer::begin_scene` copies them into the system
/// uniform block.

use glam::{Mat4, Vec3};

/// Low-level camera: a view and a projection matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    view_matrix: Mat4,
    projection_matrix: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY)
    }
}

impl Camera {
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self {
            view_matrix: view,
            projection_matrix: projection,
        }
    }

    // ===== GETTERS =====

    /// View matrix (inverse of the camera's world transform).
    pub fn view_matrix(&self) -> &Mat4 {
        &self.view_matrix
    }

    /// Projection matrix (perspective or orthographic).
    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection_matrix
    }

    /// Combined view-projection matrix (projection * view).
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix
    }

    /// World-space position, recovered from the view matrix.
    pub fn position(&self) -> Vec3 {
        self.view_matrix.inverse().w_axis.truncate()
    }

    // ===== SETTERS (store only, no computation) =====

    pub fn set_view(&mut self, matrix: Mat4) {
        self.view_matrix = matrix;
    }

    pub fn set_projection(&mut self, matrix: Mat4) {
        self.projection_matrix = matrix;
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
