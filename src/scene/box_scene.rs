//! Analytic scene of axis-aligned boxes lit by a sun and a uniform sky

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::capture::{Cubemap, CubemapRasterizer, GBufferChannel};
use crate::core::Result;
use crate::math::{Aabb, BoxHit, Ray};
use crate::probe::SceneLighting;

/// Offset applied along the normal before tracing shadow rays
const SHADOW_BIAS: f32 = 1e-3;

/// A solid box with a single diffuse albedo
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
    pub albedo: [f32; 3],
}

impl SceneBox {
    pub fn new(min: Vec3, max: Vec3, albedo: Vec3) -> Self {
        Self {
            min: min.to_array(),
            max: max.to_array(),
            albedo: albedo.to_array(),
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(Vec3::from_array(self.min), Vec3::from_array(self.max))
    }

    pub fn albedo(&self) -> Vec3 {
        Vec3::from_array(self.albedo)
    }
}

/// Directional light
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SunLight {
    /// Unit vector pointing toward the sun
    pub direction: [f32; 3],
    /// Linear RGB color
    pub color: [f32; 3],
    pub intensity: f32,
}

impl SunLight {
    pub fn new(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            direction: direction.normalize_or_zero().to_array(),
            color: color.to_array(),
            intensity,
        }
    }

    pub fn direction(&self) -> Vec3 {
        Vec3::from_array(self.direction)
    }

    pub fn radiance(&self) -> Vec3 {
        Vec3::from_array(self.color) * self.intensity
    }
}

/// Closest surface hit along a ray
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneHit {
    pub t: f32,
    pub position: Vec3,
    pub normal: Vec3,
    pub albedo: Vec3,
}

/// Boxes, one sun and a uniform sky.
///
/// Serves as both the capture rasterizer and the relight lighting source.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxScene {
    pub boxes: Vec<SceneBox>,
    pub sun: Option<SunLight>,
    pub sky_color: [f32; 3],
}

impl BoxScene {
    pub fn new(sky_color: Vec3) -> Self {
        Self {
            boxes: Vec::new(),
            sun: None,
            sky_color: sky_color.to_array(),
        }
    }

    pub fn with_box(mut self, scene_box: SceneBox) -> Self {
        self.boxes.push(scene_box);
        self
    }

    pub fn with_sun(mut self, sun: SunLight) -> Self {
        self.sun = Some(sun);
        self
    }

    /// Courtyard with a floor, two colored walls and a pillar, lit from the
    /// upper left
    pub fn courtyard() -> Self {
        Self::new(Vec3::new(0.4, 0.6, 1.0))
            .with_box(SceneBox::new(Vec3::new(-5.0, -1.0, -5.0), Vec3::new(5.0, 0.0, 5.0), Vec3::splat(0.8)))
            .with_box(SceneBox::new(Vec3::new(-5.0, 0.0, -5.0), Vec3::new(-4.5, 4.0, 5.0), Vec3::new(0.8, 0.1, 0.1)))
            .with_box(SceneBox::new(Vec3::new(4.5, 0.0, -5.0), Vec3::new(5.0, 4.0, 5.0), Vec3::new(0.1, 0.8, 0.1)))
            .with_box(SceneBox::new(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 2.5, 1.0), Vec3::splat(0.6)))
            .with_sun(SunLight::new(Vec3::new(-0.4, 1.0, 0.3), Vec3::new(1.0, 0.95, 0.85), 3.0))
    }

    pub fn sky_color(&self) -> Vec3 {
        Vec3::from_array(self.sky_color)
    }

    /// Closest hit along `direction`.
    ///
    /// Boxes that contain the origin are ignored, so rays leaving a surface
    /// do not hit the box they start on.
    pub fn raycast(&self, origin: Vec3, direction: Vec3) -> Option<SceneHit> {
        let ray = Ray::new(origin, direction);
        let mut closest: Option<(BoxHit, &SceneBox)> = None;

        for scene_box in &self.boxes {
            if let Some(hit) = ray.enter(&scene_box.bounds()) {
                if closest.is_none_or(|(best, _)| hit.t < best.t) {
                    closest = Some((hit, scene_box));
                }
            }
        }

        closest.map(|(hit, scene_box)| SceneHit {
            t: hit.t,
            position: ray.at(hit.t),
            normal: hit.normal,
            albedo: scene_box.albedo(),
        })
    }

    /// Whether the sun is blocked from a surface point
    pub fn in_shadow(&self, position: Vec3, normal: Vec3) -> bool {
        match &self.sun {
            Some(sun) => self
                .raycast(position + normal * SHADOW_BIAS, sun.direction())
                .is_some(),
            None => true,
        }
    }
}

impl CubemapRasterizer for BoxScene {
    fn render_cubemap(&self, origin: Vec3, channel: GBufferChannel, resolution: u32) -> Result<Cubemap> {
        Cubemap::from_fn(resolution, |dir| match self.raycast(origin, dir) {
            Some(hit) => match channel {
                GBufferChannel::WorldPosition => hit.position.extend(1.0),
                GBufferChannel::Normal => hit.normal.extend(1.0),
                GBufferChannel::Albedo => hit.albedo.extend(1.0),
            },
            None => Vec4::ZERO,
        })
    }
}

impl SceneLighting for BoxScene {
    fn direct_radiance(&self, position: Vec3, normal: Vec3) -> Vec3 {
        let Some(sun) = &self.sun else {
            return Vec3::ZERO;
        };
        let n_dot_l = normal.dot(sun.direction());
        if n_dot_l <= 0.0 || self.in_shadow(position, normal) {
            return Vec3::ZERO;
        }
        sun.radiance() * n_dot_l
    }

    fn sky_radiance(&self, _direction: Vec3) -> Vec3 {
        self.sky_color()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::capture_surfels;

    fn floor_and_block() -> BoxScene {
        BoxScene::new(Vec3::ONE)
            .with_box(SceneBox::new(Vec3::new(-10.0, -1.0, -10.0), Vec3::new(10.0, 0.0, 10.0), Vec3::splat(0.5)))
            .with_box(SceneBox::new(Vec3::new(-1.0, 2.0, -1.0), Vec3::new(1.0, 3.0, 1.0), Vec3::ONE))
            .with_sun(SunLight::new(Vec3::Y, Vec3::ONE, 2.0))
    }

    #[test]
    fn test_raycast_hits_floor() {
        let scene = floor_and_block();
        let hit = scene.raycast(Vec3::new(5.0, 1.0, 0.0), Vec3::NEG_Y).expect("floor");
        assert!((hit.t - 1.0).abs() < 1e-5);
        assert_eq!(hit.normal, Vec3::Y);
        assert_eq!(hit.albedo, Vec3::splat(0.5));
    }

    #[test]
    fn test_raycast_picks_closest() {
        let scene = floor_and_block();
        let hit = scene.raycast(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y).expect("block");
        assert!((hit.position.y - 3.0).abs() < 1e-5);
        assert_eq!(hit.albedo, Vec3::ONE);
    }

    #[test]
    fn test_raycast_miss() {
        let scene = floor_and_block();
        assert!(scene.raycast(Vec3::new(5.0, 1.0, 0.0), Vec3::Y).is_none());
    }

    #[test]
    fn test_shadowed_under_block() {
        let scene = floor_and_block();
        assert!(scene.in_shadow(Vec3::ZERO, Vec3::Y));
        assert_eq!(scene.direct_radiance(Vec3::ZERO, Vec3::Y), Vec3::ZERO);

        let lit = scene.direct_radiance(Vec3::new(5.0, 0.0, 0.0), Vec3::Y);
        assert_eq!(lit, Vec3::splat(2.0));
    }

    #[test]
    fn test_back_faces_get_no_sun() {
        let scene = floor_and_block();
        assert_eq!(scene.direct_radiance(Vec3::new(5.0, 0.0, 0.0), Vec3::NEG_Y), Vec3::ZERO);
    }

    #[test]
    fn test_capture_marks_sky() {
        let scene = BoxScene::new(Vec3::ONE).with_box(SceneBox::new(
            Vec3::new(-1000.0, -1.0, -1000.0),
            Vec3::new(1000.0, 0.0, 1000.0),
            Vec3::splat(0.5),
        ));
        let surfels = capture_surfels(Vec3::new(5.0, 1.0, 0.0), &scene, 16).expect("capture");
        let sky = surfels.iter().filter(|s| s.is_sky()).count();
        // Upper hemisphere is open sky
        assert_eq!(sky, 256);
        assert!(surfels.iter().filter(|s| !s.is_sky()).all(|s| s.normal() == Vec3::Y));
    }

    #[test]
    fn test_config_roundtrip() {
        let scene = BoxScene::courtyard();
        let json = serde_json::to_string(&scene).unwrap();
        let parsed: BoxScene = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, scene);
    }
}
