//! Real SH9 (L2 spherical harmonics) basis and fixed-point coefficient encoding
//!
//! Coefficient buffers are 27 scalars laid out as `coeff * 3 + channel`.
//! Accumulation happens on integers so many writers can add into the same
//! slot with plain atomic adds; values are decoded only when consumed.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicI32, Ordering};

use glam::Vec3;

/// Number of SH basis functions (bands 0..=2)
pub const SH9_COEFFICIENTS: usize = 9;

/// Scalars per SH9 set: 9 coefficients x 3 color channels
pub const SH9_SCALARS: usize = SH9_COEFFICIENTS * 3;

/// Fixed-point scale: one integer unit is 1/10000 of a coefficient
pub const FIXED_POINT_SCALE: f32 = 10000.0;

const Y0: f32 = 0.282095;
const Y1: f32 = 0.488603;
const Y2: f32 = 1.092548;
const Y2_ZONAL: f32 = 0.315392;
const Y2_SECTORAL: f32 = 0.546274;

/// Cosine-lobe convolution weights per band (Ramamoorthi & Hanrahan)
const BAND_CONVOLUTION: [f32; 3] = [PI, 2.0 * PI / 3.0, PI / 4.0];

/// Evaluate the 9 real SH basis functions for a unit direction
#[inline]
pub fn basis(dir: Vec3) -> [f32; SH9_COEFFICIENTS] {
    let (x, y, z) = (dir.x, dir.y, dir.z);
    [
        Y0,
        Y1 * y,
        Y1 * z,
        Y1 * x,
        Y2 * x * y,
        Y2 * y * z,
        Y2_ZONAL * (3.0 * z * z - 1.0),
        Y2 * x * z,
        Y2_SECTORAL * (x * x - y * y),
    ]
}

#[inline]
fn band_of(coeff: usize) -> usize {
    match coeff {
        0 => 0,
        1..=3 => 1,
        _ => 2,
    }
}

/// Encode a coefficient to fixed point.
///
/// Truncates toward zero; out-of-range values saturate at `i32::MIN`/`i32::MAX`
/// and NaN encodes as 0.
#[inline]
pub fn encode_fixed(value: f32) -> i32 {
    (value * FIXED_POINT_SCALE) as i32
}

/// Decode a fixed-point coefficient
#[inline]
pub fn decode_fixed(value: i32) -> f32 {
    value as f32 / FIXED_POINT_SCALE
}

/// Add one weighted radiance sample's SH9 projection into a float accumulator
#[inline]
pub fn project_into(acc: &mut [f32; SH9_SCALARS], dir: Vec3, radiance: Vec3, weight: f32) {
    for (k, yk) in basis(dir).iter().enumerate() {
        let c = radiance * (*yk * weight);
        acc[k * 3] += c.x;
        acc[k * 3 + 1] += c.y;
        acc[k * 3 + 2] += c.z;
    }
}

/// Encode a whole float accumulator to fixed point.
///
/// Called once per writer after all of its samples are summed.
pub fn encode_all(values: &[f32; SH9_SCALARS]) -> [i32; SH9_SCALARS] {
    values.map(encode_fixed)
}

/// Add encoded contributions into an atomic slot (wrapping, relaxed)
#[inline]
pub fn accumulate_atomic(slot: &[AtomicI32], contribution: &[i32; SH9_SCALARS]) {
    for (dst, v) in slot.iter().zip(contribution) {
        if *v != 0 {
            dst.fetch_add(*v, Ordering::Relaxed);
        }
    }
}

/// Decoded SH9 coefficients, one RGB triple per basis function
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sh9 {
    pub coeffs: [Vec3; SH9_COEFFICIENTS],
}

impl Sh9 {
    /// Decode from a 27-scalar fixed-point buffer
    pub fn from_fixed(buffer: &[i32]) -> Self {
        let mut sh = Self::default();
        for (k, c) in sh.coeffs.iter_mut().enumerate() {
            *c = Vec3::new(
                decode_fixed(buffer[k * 3]),
                decode_fixed(buffer[k * 3 + 1]),
                decode_fixed(buffer[k * 3 + 2]),
            );
        }
        sh
    }

    /// Decode from a 27-scalar atomic fixed-point slot
    pub fn from_atomic(slot: &[AtomicI32]) -> Self {
        let mut buffer = [0i32; SH9_SCALARS];
        for (dst, src) in buffer.iter_mut().zip(slot) {
            *dst = src.load(Ordering::Relaxed);
        }
        Self::from_fixed(&buffer)
    }

    /// Flatten into the `coeff * 3 + channel` float layout
    pub fn to_array(&self) -> [f32; SH9_SCALARS] {
        let mut out = [0.0; SH9_SCALARS];
        for (k, c) in self.coeffs.iter().enumerate() {
            out[k * 3] = c.x;
            out[k * 3 + 1] = c.y;
            out[k * 3 + 2] = c.z;
        }
        out
    }

    /// Accumulate `other * weight`
    pub fn add_scaled(&mut self, other: &Sh9, weight: f32) {
        for (a, b) in self.coeffs.iter_mut().zip(&other.coeffs) {
            *a += *b * weight;
        }
    }

    /// Reconstruct the stored function in a direction
    pub fn evaluate(&self, dir: Vec3) -> Vec3 {
        basis(dir)
            .iter()
            .zip(&self.coeffs)
            .fold(Vec3::ZERO, |acc, (y, c)| acc + *c * *y)
    }

    /// Irradiance arriving at a surface with the given normal
    pub fn irradiance(&self, normal: Vec3) -> Vec3 {
        basis(normal)
            .iter()
            .zip(&self.coeffs)
            .enumerate()
            .fold(Vec3::ZERO, |acc, (k, (y, c))| {
                acc + *c * (*y * BAND_CONVOLUTION[band_of(k)])
            })
            .max(Vec3::ZERO)
    }
}
