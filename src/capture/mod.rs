//! Surfel capture from G-buffer cubemaps

pub mod cubemap;

pub use cubemap::{Cubemap, CubeFace, MAX_CAPTURE_RESOLUTION};

use glam::Vec3;

use crate::core::{Error, Result};
use crate::math::sphere::sample_directions;
use crate::probe::Surfel;

/// Which G-buffer attribute a cubemap holds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GBufferChannel {
    /// xyz = world position, w = 1 on geometry and 0 on background
    WorldPosition,
    /// xyz = world-space normal
    Normal,
    /// rgb = linear albedo
    Albedo,
}

/// Renders G-buffer cubemaps of the scene as seen from a point.
///
/// Background texels must be cleared to zero so the world-position alpha
/// distinguishes sky from geometry. Probe proxies must not be drawn.
pub trait CubemapRasterizer: Sync {
    fn render_cubemap(
        &self,
        origin: Vec3,
        channel: GBufferChannel,
        resolution: u32,
    ) -> Result<Cubemap>;
}

/// Capture one probe's surfels in sampling order.
pub fn capture_surfels(
    origin: Vec3,
    rasterizer: &dyn CubemapRasterizer,
    resolution: u32,
) -> Result<Vec<Surfel>> {
    if resolution > MAX_CAPTURE_RESOLUTION {
        return Err(Error::CaptureResolution(resolution));
    }
    let world_pos = rasterizer.render_cubemap(origin, GBufferChannel::WorldPosition, resolution)?;
    let normal = rasterizer.render_cubemap(origin, GBufferChannel::Normal, resolution)?;
    let albedo = rasterizer.render_cubemap(origin, GBufferChannel::Albedo, resolution)?;

    Ok(sample_surfels(origin, &world_pos, &normal, &albedo))
}

/// Sample the three G-buffer cubemaps along every surfel direction
pub fn sample_surfels(
    origin: Vec3,
    world_pos: &Cubemap,
    normal: &Cubemap,
    albedo: &Cubemap,
) -> Vec<Surfel> {
    sample_directions()
        .iter()
        .map(|&dir| {
            let p = world_pos.sample(dir);
            if p.w <= 0.0 {
                Surfel::sky(origin, dir)
            } else {
                Surfel::hit(
                    p.truncate(),
                    normal.sample(dir).truncate().normalize_or_zero(),
                    albedo.sample(dir).truncate(),
                )
            }
        })
        .collect()
}
