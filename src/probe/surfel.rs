//! Surfels and the fixed-size per-probe surfel store

use std::sync::atomic::{AtomicU64, Ordering};

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::core::{Error, Result};
use crate::math::sphere::RAY_COUNT;

/// Source of store revisions, shared by every store in the process
static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// `sky_mask` at or above this value marks a sample that missed geometry
pub const SKY_THRESHOLD: f32 = 0.995;

/// Scalars per surfel in persisted and GPU layouts
pub const FLOATS_PER_SURFEL: usize = 10;

/// One surface sample seen from a probe (must match shader layout exactly)
///
/// 40 bytes, tightly packed: position, normal, albedo, sky mask.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Surfel {
    /// World-space hit position (probe origin + direction for sky samples)
    pub position: [f32; 3],
    /// World-space unit normal
    pub normal: [f32; 3],
    /// Linear albedo
    pub albedo: [f32; 3],
    /// 1 = sky, 0 = geometry
    pub sky_mask: f32,
}

impl Surfel {
    /// Geometry hit
    pub fn hit(position: Vec3, normal: Vec3, albedo: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            albedo: albedo.to_array(),
            sky_mask: 0.0,
        }
    }

    /// Sky miss along `direction` from `origin`
    pub fn sky(origin: Vec3, direction: Vec3) -> Self {
        Self {
            position: (origin + direction).to_array(),
            normal: (-direction).to_array(),
            albedo: [0.0; 3],
            sky_mask: 1.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }

    pub fn albedo(&self) -> Vec3 {
        Vec3::from_array(self.albedo)
    }

    #[inline]
    pub fn is_sky(&self) -> bool {
        self.sky_mask >= SKY_THRESHOLD
    }

    /// Flatten as `(px,py,pz,nx,ny,nz,ax,ay,az,sky)`
    pub fn to_floats(&self) -> [f32; FLOATS_PER_SURFEL] {
        let [px, py, pz] = self.position;
        let [nx, ny, nz] = self.normal;
        let [ax, ay, az] = self.albedo;
        [px, py, pz, nx, ny, nz, ax, ay, az, self.sky_mask]
    }

    /// Inverse of [`Surfel::to_floats`]; `src` must hold 10 scalars
    pub fn from_floats(src: &[f32]) -> Self {
        Self {
            position: [src[0], src[1], src[2]],
            normal: [src[3], src[4], src[5]],
            albedo: [src[6], src[7], src[8]],
            sky_mask: src[9],
        }
    }
}

/// Exactly [`RAY_COUNT`] surfels in sampling order
///
/// The index of a surfel is its identity. Every wholesale replacement takes
/// a fresh `revision` that no other store has used, so GPU mirrors can tell
/// new content apart even after probes are rebuilt.
#[derive(Clone, Debug)]
pub struct SurfelStore {
    surfels: Box<[Surfel]>,
    revision: u64,
}

impl Default for SurfelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfelStore {
    /// Zeroed store at revision 0
    pub fn new() -> Self {
        Self {
            surfels: vec![Surfel::default(); RAY_COUNT].into_boxed_slice(),
            revision: 0,
        }
    }

    pub fn as_slice(&self) -> &[Surfel] {
        &self.surfels
    }

    /// Raw bytes for GPU upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.surfels)
    }

    pub fn get(&self, index: usize) -> Option<&Surfel> {
        self.surfels.get(index)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn sky_count(&self) -> usize {
        self.surfels.iter().filter(|s| s.is_sky()).count()
    }

    /// Replace all surfels. Exactly [`RAY_COUNT`] must be given; otherwise
    /// the store is left untouched.
    pub fn replace(&mut self, surfels: Vec<Surfel>) -> Result<()> {
        if surfels.len() != RAY_COUNT {
            return Err(Error::SurfelCount {
                expected: RAY_COUNT,
                actual: surfels.len(),
            });
        }
        self.surfels = surfels.into_boxed_slice();
        self.revision = next_revision();
        Ok(())
    }

    /// Write all surfels into `out` (`RAY_COUNT * 10` scalars)
    pub fn write_floats(&self, out: &mut [f32]) {
        for (surfel, dst) in self.surfels.iter().zip(out.chunks_exact_mut(FLOATS_PER_SURFEL)) {
            dst.copy_from_slice(&surfel.to_floats());
        }
    }

    /// Overwrite all surfels from `src` (`RAY_COUNT * 10` scalars)
    pub fn read_floats(&mut self, src: &[f32]) {
        for (surfel, chunk) in self.surfels.iter_mut().zip(src.chunks_exact(FLOATS_PER_SURFEL)) {
            *surfel = Surfel::from_floats(chunk);
        }
        self.revision = next_revision();
    }
}
