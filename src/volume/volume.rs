//! Probe volume: a regular grid of probes and its coefficient generations

use std::sync::atomic::{AtomicU32, Ordering};

use glam::{UVec3, Vec3};
use rayon::prelude::*;

use crate::capture::{CubemapRasterizer, MAX_CAPTURE_RESOLUTION};
use crate::core::{Error, Result};
use crate::math::sh::{Sh9, SH9_SCALARS};
use crate::math::Aabb;
use crate::probe::{Probe, ProbeSlot, RelightFrame, SceneLighting, VolumeId, VolumeInputs};

use super::dataset::VolumeDataset;
use super::generations::CoefficientGenerations;
use super::grid::{CoefficientView, GridShape};

static NEXT_VOLUME_ID: AtomicU32 = AtomicU32::new(0);

/// Default cubemap face resolution used for capture
pub const DEFAULT_CAPTURE_RESOLUTION: u32 = 64;

/// A 3D grid of probes sharing two generations of SH9 coefficients.
///
/// Probes are stored in flat index order, so `probes[i]` always owns slot `i`
/// of each generation.
#[derive(Debug)]
pub struct ProbeVolume {
    id: VolumeId,
    name: String,
    position: Vec3,
    size: UVec3,
    grid_size: f32,
    probes: Vec<Probe>,
    generations: CoefficientGenerations,
    sky_light_intensity: f32,
    gi_intensity: f32,
    capture_resolution: u32,
}

impl ProbeVolume {
    /// Empty volume with its minimum corner at `position`
    pub fn new(name: impl Into<String>, position: Vec3) -> Self {
        Self {
            id: VolumeId(NEXT_VOLUME_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            position,
            size: UVec3::ZERO,
            grid_size: 1.0,
            probes: Vec::new(),
            generations: CoefficientGenerations::new(0),
            sky_light_intensity: 1.0,
            gi_intensity: 1.0,
            capture_resolution: DEFAULT_CAPTURE_RESOLUTION,
        }
    }

    pub fn id(&self) -> VolumeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn size(&self) -> UVec3 {
        self.size
    }

    pub fn grid_size(&self) -> f32 {
        self.grid_size
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    pub fn shape(&self) -> GridShape {
        GridShape::new(self.position, self.size, self.grid_size)
    }

    pub fn bounds(&self) -> Aabb {
        self.shape().bounds()
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    pub fn probe(&self, index: usize) -> Option<&Probe> {
        self.probes.get(index)
    }

    pub fn probe_mut(&mut self, index: usize) -> Option<&mut Probe> {
        self.probes.get_mut(index)
    }

    /// Probe at grid coordinates
    pub fn probe_at(&self, x: u32, y: u32, z: u32) -> Option<&Probe> {
        if x >= self.size.x || y >= self.size.y || z >= self.size.z {
            return None;
        }
        self.probes.get(self.shape().flat_index(x, y, z))
    }

    pub(crate) fn probes_mut(&mut self) -> &mut [Probe] {
        &mut self.probes
    }

    pub fn sky_light_intensity(&self) -> f32 {
        self.sky_light_intensity
    }

    /// Negative values clamp to 0
    pub fn set_sky_light_intensity(&mut self, intensity: f32) {
        self.sky_light_intensity = intensity.max(0.0);
    }

    pub fn gi_intensity(&self) -> f32 {
        self.gi_intensity
    }

    /// Negative values clamp to 0
    pub fn set_gi_intensity(&mut self, intensity: f32) {
        self.gi_intensity = intensity.max(0.0);
    }

    pub fn capture_resolution(&self) -> u32 {
        self.capture_resolution
    }

    /// Face resolution used by [`ProbeVolume::capture_all`]. 0 is raised to 1;
    /// anything above [`MAX_CAPTURE_RESOLUTION`] is rejected.
    pub fn set_capture_resolution(&mut self, resolution: u32) -> Result<()> {
        if resolution > MAX_CAPTURE_RESOLUTION {
            return Err(Error::CaptureResolution(resolution));
        }
        self.capture_resolution = resolution.max(1);
        Ok(())
    }

    pub fn generations(&self) -> &CoefficientGenerations {
        &self.generations
    }

    /// Coefficients written this frame
    pub fn current_view(&self) -> CoefficientView<'_> {
        CoefficientView::new(self.shape(), self.generations.current())
    }

    /// Coefficients from the last completed frame
    pub fn previous_view(&self) -> CoefficientView<'_> {
        CoefficientView::new(self.shape(), self.generations.previous())
    }

    /// Rebuild the probe grid.
    ///
    /// Inputs are validated before anything changes; on error the current
    /// grid stays as it was. Surfels and coefficients start empty.
    pub fn regenerate(&mut self, size: UVec3, grid_size: f32) -> Result<()> {
        if size.min_element() == 0 {
            return Err(Error::InvalidGrid(format!("every extent must be at least 1, got {}", size)));
        }
        if !grid_size.is_finite() || grid_size <= 0.0 {
            return Err(Error::InvalidGrid(format!("grid size must be positive, got {}", grid_size)));
        }
        let shape = GridShape::new(self.position, size, grid_size);
        let count = (size.x as usize)
            .checked_mul(size.y as usize)
            .and_then(|n| n.checked_mul(size.z as usize))
            .filter(|n| n.checked_mul(SH9_SCALARS).is_some())
            .ok_or_else(|| Error::InvalidGrid(format!("{} probes do not fit in memory", size)))?;

        let mut probes = Vec::with_capacity(count);
        for index in 0..count {
            let slot = ProbeSlot { volume: self.id, index };
            probes.push(Probe::in_volume(shape.world_position(shape.coords(index)), slot));
        }

        self.size = size;
        self.grid_size = grid_size;
        self.probes = probes;
        self.generations = CoefficientGenerations::new(count);

        log::info!(
            "Regenerated probe volume '{}': {}x{}x{} probes, spacing {}",
            self.name, size.x, size.y, size.z, grid_size
        );
        Ok(())
    }

    /// Move the volume and all of its probes.
    ///
    /// Datasets saved at the old position no longer validate.
    pub fn set_position(&mut self, position: Vec3) {
        let delta = position - self.position;
        self.position = position;
        for probe in &mut self.probes {
            probe.set_position(probe.position() + delta);
        }
    }

    /// Hide every probe proxy, capture every probe, and return a dataset
    /// holding the new surfels.
    pub fn capture_all(&mut self, rasterizer: Option<&dyn CubemapRasterizer>) -> Result<VolumeDataset> {
        let rasterizer = rasterizer.ok_or(Error::MissingCollaborator("cubemap rasterizer"))?;

        for probe in &mut self.probes {
            probe.set_proxy_visible(false);
        }

        let resolution = self.capture_resolution;
        self.probes
            .par_iter_mut()
            .try_for_each(|probe| probe.capture(Some(rasterizer), resolution))?;

        log::info!("Captured {} probes in volume '{}'", self.probes.len(), self.name);
        Ok(VolumeDataset::from_volume(self))
    }

    /// Make the previous frame's coefficients current and vice versa
    pub fn swap_generations(&mut self) {
        self.generations.swap();
    }

    pub fn clear_current_generation(&mut self) {
        self.generations.clear_current();
    }

    /// Relight every probe into the current generation.
    ///
    /// Reads only the previous generation, so probe order does not matter.
    pub fn relight(&mut self, lighting: Option<&dyn SceneLighting>) {
        let inputs = VolumeInputs {
            volume: self.id,
            previous: CoefficientView::new(self.shape(), self.generations.previous()),
            current: self.generations.current(),
        };
        let frame = RelightFrame {
            lighting,
            sky_light_intensity: self.sky_light_intensity,
            gi_intensity: self.gi_intensity,
            volume: Some(&inputs),
        };

        self.probes.par_iter_mut().for_each(|probe| probe.relight(&frame));
    }

    /// One full frame: swap, clear, relight
    pub fn step(&mut self, lighting: Option<&dyn SceneLighting>) {
        self.swap_generations();
        self.clear_current_generation();
        self.relight(lighting);
    }

    /// Current-generation irradiance at a surface point
    pub fn sample_irradiance(&self, position: Vec3, normal: Vec3) -> Vec3 {
        self.current_view().irradiance(position, normal)
    }

    /// Decoded current-generation coefficients of one probe
    pub fn probe_coefficients(&self, index: usize) -> Option<Sh9> {
        self.current_view().probe(index)
    }
}
