/// Light records uploaded to the fragment-stage system uniform block

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// Kind of light, stored as a float in the uniform record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    Directional,
    Spot,
    Point,
}

impl LightType {
    fn as_f32(self) -> f32 {
        match self {
            LightType::Directional => 0.0,
            LightType::Spot => 1.0,
            LightType::Point => 2.0,
        }
    }
}

/// One light, laid out for std140 (64 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Light {
    pub position: [f32; 4],
    pub direction: [f32; 4],
    /// RGB colour, alpha unused
    pub colour: [f32; 4],
    pub intensity: f32,
    pub radius: f32,
    pub light_type: f32,
    /// Spot cone angle in radians
    pub angle: f32,
}

impl Light {
    pub fn directional(direction: Vec3, colour: Vec3, intensity: f32) -> Self {
        Self {
            position: [0.0; 4],
            direction: direction.normalize_or_zero().extend(0.0).to_array(),
            colour: colour.extend(1.0).to_array(),
            intensity,
            radius: 0.0,
            light_type: LightType::Directional.as_f32(),
            angle: 0.0,
        }
    }

    pub fn point(position: Vec3, colour: Vec3, intensity: f32, radius: f32) -> Self {
        Self {
            position: position.extend(1.0).to_array(),
            direction: [0.0; 4],
            colour: colour.extend(1.0).to_array(),
            intensity,
            radius,
            light_type: LightType::Point.as_f32(),
            angle: 0.0,
        }
    }

    pub fn spot(position: Vec3, direction: Vec3, colour: Vec3, intensity: f32, angle: f32) -> Self {
        Self {
            position: position.extend(1.0).to_array(),
            direction: direction.normalize_or_zero().extend(0.0).to_array(),
            colour: colour.extend(1.0).to_array(),
            intensity,
            radius: 0.0,
            light_type: LightType::Spot.as_f32(),
            angle,
        }
    }

    pub fn light_type(&self) -> LightType {
        match self.light_type as u32 {
            1 => LightType::Spot,
            2 => LightType::Point,
            _ => LightType::Directional,
        }
    }

    pub fn colour(&self) -> Vec4 {
        Vec4::from_array(self.colour)
    }
}
