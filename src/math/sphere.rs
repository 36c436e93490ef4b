//! Fixed surfel sampling directions
//!
//! 512 directions on a stratified equal-area 32x16 lattice. The enumeration
//! order is the surfel identity used by persisted datasets and must not change.

use std::f32::consts::{PI, TAU};
use std::sync::OnceLock;

use glam::Vec3;

/// Lattice columns (azimuth)
pub const RAY_COUNT_X: usize = 32;
/// Lattice rows (cosine of polar angle)
pub const RAY_COUNT_Y: usize = 16;
/// Surfels per probe
pub const RAY_COUNT: usize = RAY_COUNT_X * RAY_COUNT_Y;

/// Monte Carlo solid-angle weight of one sample
pub const SAMPLE_WEIGHT: f32 = 4.0 * PI / RAY_COUNT as f32;

/// Direction of sample `index` (Y up)
pub fn sample_direction(index: usize) -> Vec3 {
    let tx = index % RAY_COUNT_X;
    let ty = index / RAY_COUNT_X;
    let u = (tx as f32 + 0.5) / RAY_COUNT_X as f32;
    let v = (ty as f32 + 0.5) / RAY_COUNT_Y as f32;

    let phi = TAU * u;
    let cos_theta = 1.0 - 2.0 * v;
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

    Vec3::new(sin_theta * phi.cos(), cos_theta, sin_theta * phi.sin())
}

/// All sample directions in enumeration order
pub fn sample_directions() -> &'static [Vec3] {
    static DIRECTIONS: OnceLock<Vec<Vec3>> = OnceLock::new();
    DIRECTIONS.get_or_init(|| (0..RAY_COUNT).map(sample_direction).collect())
}
