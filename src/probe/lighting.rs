//! Scene lighting collaborator consumed by relight

use glam::Vec3;

/// Source of direct light and sky radiance for relight.
///
/// Implementations are queried from many threads at once.
pub trait SceneLighting: Sync {
    /// Direct light arriving at a surface point, already cosine-weighted and
    /// shadowed. Multiplied by albedo it gives the radiance leaving the surfel.
    fn direct_radiance(&self, position: Vec3, normal: Vec3) -> Vec3;

    /// Radiance of the sky seen along `direction`
    fn sky_radiance(&self, direction: Vec3) -> Vec3;
}

/// Uniform sky with no direct lights
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantSky {
    pub color: Vec3,
}

impl ConstantSky {
    pub fn new(color: Vec3) -> Self {
        Self { color }
    }
}

impl SceneLighting for ConstantSky {
    fn direct_radiance(&self, _position: Vec3, _normal: Vec3) -> Vec3 {
        Vec3::ZERO
    }

    fn sky_radiance(&self, _direction: Vec3) -> Vec3 {
        self.color
    }
}
