//! Ray casting against axis-aligned boxes

use crate::core::types::Vec3;
use super::aabb::Aabb;

/// Entry point of a ray into a box
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxHit {
    pub t: f32,
    /// Outward normal of the entry face
    pub normal: Vec3,
}

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction
    pub direction: Vec3,
    inv_direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            inv_direction: direction.recip(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Slab test for the face where the ray enters `aabb`.
    ///
    /// Rays starting inside or on the box report no hit, so a ray leaving a
    /// surface never hits the box it starts on.
    pub fn enter(&self, aabb: &Aabb) -> Option<BoxHit> {
        let t1 = (aabb.min - self.origin) * self.inv_direction;
        let t2 = (aabb.max - self.origin) * self.inv_direction;
        let near = t1.min(t2);
        let far = t1.max(t2);

        let axis = if near.x >= near.y && near.x >= near.z {
            0
        } else if near.y >= near.z {
            1
        } else {
            2
        };
        let t_near = near[axis];
        let t_far = far.min_element();

        if !(t_near > 0.0 && t_near <= t_far) {
            return None;
        }

        let mut normal = Vec3::ZERO;
        normal[axis] = -self.direction[axis].signum();
        Some(BoxHit { t: t_near, normal })
    }
}
