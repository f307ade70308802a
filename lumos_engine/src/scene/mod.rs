//! Scene-facing contracts
//!
//! Meshes, materials, lights and the camera the renderers read, and the
//! traversal trait an external entity store implements.

mod camera;
mod light;
mod material;
mod mesh;
mod scene;

pub use camera::Camera;
pub use light::{Light, LightType};
pub use material::{Material, ALBEDO_SAMPLER};
pub use mesh::{Mesh, SkinnedVertex, Vertex};
pub use scene::{RenderEntity, Scene};
