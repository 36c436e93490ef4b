//! Probe grid shape, flat indexing and coefficient lookups

use std::sync::atomic::AtomicI32;

use glam::{UVec3, Vec3};

use crate::math::sh::{Sh9, SH9_SCALARS};
use crate::math::Aabb;

/// Placement and extents of a regular probe lattice
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridShape {
    /// World position of probe (0, 0, 0)
    pub corner: Vec3,
    /// Probe counts along each axis
    pub size: UVec3,
    /// Distance between neighbouring probes
    pub spacing: f32,
}

impl GridShape {
    pub fn new(corner: Vec3, size: UVec3, spacing: f32) -> Self {
        Self { corner, size, spacing }
    }

    pub fn probe_count(&self) -> usize {
        self.size.x as usize * self.size.y as usize * self.size.z as usize
    }

    /// Flat index `x*sy*sz + y*sz + z`
    #[inline]
    pub fn flat_index(&self, x: u32, y: u32, z: u32) -> usize {
        let (sy, sz) = (self.size.y as usize, self.size.z as usize);
        x as usize * sy * sz + y as usize * sz + z as usize
    }

    /// Inverse of [`GridShape::flat_index`]
    pub fn coords(&self, index: usize) -> UVec3 {
        let (sy, sz) = (self.size.y as usize, self.size.z as usize);
        UVec3::new(
            (index / (sy * sz)) as u32,
            ((index / sz) % sy) as u32,
            (index % sz) as u32,
        )
    }

    /// Offset of a probe from the corner
    pub fn local_position(&self, coords: UVec3) -> Vec3 {
        coords.as_vec3() * self.spacing
    }

    pub fn world_position(&self, coords: UVec3) -> Vec3 {
        self.corner + self.local_position(coords)
    }

    /// Box spanned by the outermost probes
    pub fn bounds(&self) -> Aabb {
        let extent = self.size.saturating_sub(UVec3::ONE);
        Aabb::new(self.corner, self.world_position(extent))
    }
}

/// Read-only view of one coefficient generation
#[derive(Clone, Copy)]
pub struct CoefficientView<'a> {
    shape: GridShape,
    coefficients: &'a [AtomicI32],
}

impl<'a> CoefficientView<'a> {
    pub fn new(shape: GridShape, coefficients: &'a [AtomicI32]) -> Self {
        Self { shape, coefficients }
    }

    pub fn shape(&self) -> &GridShape {
        &self.shape
    }

    /// Decoded coefficients of one probe slot
    pub fn probe(&self, index: usize) -> Option<Sh9> {
        self.coefficients
            .get(index * SH9_SCALARS..(index + 1) * SH9_SCALARS)
            .map(Sh9::from_atomic)
    }

    /// Trilinear blend of the 8 probes around `position`, clamped to the grid
    pub fn sample(&self, position: Vec3) -> Option<Sh9> {
        let size = self.shape.size;
        if self.shape.probe_count() == 0 || self.shape.spacing <= 0.0 {
            return None;
        }

        let max = (size - UVec3::ONE).as_vec3();
        let cell = ((position - self.shape.corner) / self.shape.spacing).clamp(Vec3::ZERO, max);
        let base = cell.floor();
        let t = cell - base;
        let i0 = base.as_uvec3();
        let i1 = (i0 + UVec3::ONE).min(size - UVec3::ONE);

        let mut sh = Sh9::default();
        for corner in 0..8u32 {
            let pick = |bit: u32, lo: u32, hi: u32, t: f32| {
                if corner & bit != 0 { (hi, t) } else { (lo, 1.0 - t) }
            };
            let (x, wx) = pick(1, i0.x, i1.x, t.x);
            let (y, wy) = pick(2, i0.y, i1.y, t.y);
            let (z, wz) = pick(4, i0.z, i1.z, t.z);
            let w = wx * wy * wz;
            if w <= 0.0 {
                continue;
            }
            if let Some(probe) = self.probe(self.shape.flat_index(x, y, z)) {
                sh.add_scaled(&probe, w);
            }
        }
        Some(sh)
    }

    /// Interpolated irradiance for a surface at `position` facing `normal`
    pub fn irradiance(&self, position: Vec3, normal: Vec3) -> Vec3 {
        self.sample(position)
            .map_or(Vec3::ZERO, |sh| sh.irradiance(normal))
    }
}
