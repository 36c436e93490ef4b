//! A single light probe: surfel capture and SH9 relight

use std::f32::consts::FRAC_1_PI;
use std::sync::atomic::{AtomicI32, Ordering};

use glam::Vec3;

use crate::capture::{self, CubemapRasterizer};
use crate::core::{Error, Result};
use crate::math::sh::{self, Sh9, SH9_SCALARS};
use crate::math::sphere::{RAY_COUNT, SAMPLE_WEIGHT};
use crate::volume::CoefficientView;

use super::lighting::SceneLighting;
use super::surfel::SurfelStore;
use super::VolumeId;

/// Position of a probe inside its owning volume
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeSlot {
    pub volume: VolumeId,
    /// Flat index `x*sy*sz + y*sz + z`
    pub index: usize,
}

/// Coefficient buffers of the owning volume for one frame
pub struct VolumeInputs<'a> {
    /// Volume the buffers belong to; probes from other volumes ignore them
    pub volume: VolumeId,
    /// Last frame's coefficients, read-only for the whole frame
    pub previous: CoefficientView<'a>,
    /// This frame's coefficients; each probe adds only into its own slot
    pub current: &'a [AtomicI32],
}

/// Per-frame inputs shared by every probe being relit
pub struct RelightFrame<'a> {
    pub lighting: Option<&'a dyn SceneLighting>,
    pub sky_light_intensity: f32,
    pub gi_intensity: f32,
    /// `None` for standalone probes
    pub volume: Option<&'a VolumeInputs<'a>>,
}

impl<'a> RelightFrame<'a> {
    /// Frame for probes outside any volume
    pub fn standalone(lighting: Option<&'a dyn SceneLighting>, sky_light_intensity: f32) -> Self {
        Self {
            lighting,
            sky_light_intensity,
            gi_intensity: 0.0,
            volume: None,
        }
    }
}

/// One irradiance sample point.
///
/// Buffers are allocated lazily by [`Probe::try_init`]. Surfels are filled
/// once by capture (or a dataset load); the SH9 buffers are rewritten from
/// scratch on every relight.
#[derive(Debug)]
pub struct Probe {
    position: Vec3,
    slot: Option<ProbeSlot>,
    surfels: Option<SurfelStore>,
    /// Per-surfel radiance from the last relight, kept for inspection
    radiance: Option<Box<[Vec3]>>,
    /// Local SH9 result in fixed point
    coefficients: Option<Box<[i32; SH9_SCALARS]>>,
    /// Private one-slot target used when the probe has no volume slot
    scratch: Option<Box<[AtomicI32]>>,
    proxy_visible: bool,
}

impl Probe {
    /// Standalone probe, not owned by any volume
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            slot: None,
            surfels: None,
            radiance: None,
            coefficients: None,
            scratch: None,
            proxy_visible: true,
        }
    }

    pub(crate) fn in_volume(position: Vec3, slot: ProbeSlot) -> Self {
        Self {
            slot: Some(slot),
            ..Self::new(position)
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn slot(&self) -> Option<ProbeSlot> {
        self.slot
    }

    /// Flat index in the owning volume, `None` when standalone
    pub fn index_in_volume(&self) -> Option<usize> {
        self.slot.map(|s| s.index)
    }

    pub fn proxy_visible(&self) -> bool {
        self.proxy_visible
    }

    /// Show or hide the probe's visualisation proxy
    pub fn set_proxy_visible(&mut self, visible: bool) {
        self.proxy_visible = visible;
    }

    /// Allocate any missing buffers. Safe to call repeatedly; existing
    /// buffers are kept as they are.
    pub fn try_init(&mut self) {
        self.surfels.get_or_insert_with(SurfelStore::new);
        self.radiance
            .get_or_insert_with(|| vec![Vec3::ZERO; RAY_COUNT].into_boxed_slice());
        self.coefficients
            .get_or_insert_with(|| Box::new([0; SH9_SCALARS]));
        self.scratch
            .get_or_insert_with(|| (0..SH9_SCALARS).map(|_| AtomicI32::new(0)).collect());
    }

    pub fn is_initialized(&self) -> bool {
        self.surfels.is_some()
            && self.radiance.is_some()
            && self.coefficients.is_some()
            && self.scratch.is_some()
    }

    /// Release all buffers
    pub fn release(&mut self) {
        self.surfels = None;
        self.radiance = None;
        self.coefficients = None;
        self.scratch = None;
    }

    pub fn surfels(&self) -> Result<&SurfelStore> {
        self.surfels.as_ref().ok_or(Error::UninitializedBuffer("surfels"))
    }

    pub(crate) fn surfels_mut(&mut self) -> Result<&mut SurfelStore> {
        self.surfels.as_mut().ok_or(Error::UninitializedBuffer("surfels"))
    }

    /// Radiance of each surfel as of the last relight
    pub fn radiance(&self) -> Result<&[Vec3]> {
        self.radiance.as_deref().ok_or(Error::UninitializedBuffer("surfel radiance"))
    }

    /// Local SH9 buffer in fixed point
    pub fn coefficients_fixed(&self) -> Result<&[i32; SH9_SCALARS]> {
        self.coefficients
            .as_deref()
            .ok_or(Error::UninitializedBuffer("SH9 coefficients"))
    }

    /// Local SH9 buffer, decoded
    pub fn sh9(&self) -> Result<Sh9> {
        self.coefficients_fixed().map(|c| Sh9::from_fixed(c))
    }

    /// Contents of the private scratch slot, decoded
    pub fn scratch_sh9(&self) -> Result<Sh9> {
        self.scratch
            .as_deref()
            .map(Sh9::from_atomic)
            .ok_or(Error::UninitializedBuffer("scratch coefficients"))
    }

    /// Capture the surrounding geometry into the surfel store.
    ///
    /// All cubemaps are rendered and sampled before the store is touched, so
    /// on error the previous surfels are left as they were.
    pub fn capture(
        &mut self,
        rasterizer: Option<&dyn CubemapRasterizer>,
        resolution: u32,
    ) -> Result<()> {
        let rasterizer = rasterizer.ok_or(Error::MissingCollaborator("cubemap rasterizer"))?;
        let surfels = capture::capture_surfels(self.position, rasterizer, resolution)?;

        self.try_init();
        self.surfels_mut()?.replace(surfels)
    }

    /// Integrate direct light, sky and last frame's grid into SH9.
    ///
    /// Never fails: missing lighting contributes nothing and a probe without a
    /// usable slot in `frame.volume` writes into its private scratch slot.
    pub fn relight(&mut self, frame: &RelightFrame<'_>) {
        self.try_init();

        let position = self.position;
        let slot = self.slot;
        let Self {
            surfels: Some(surfels),
            radiance: Some(radiance),
            coefficients: Some(coefficients),
            scratch: Some(scratch),
            ..
        } = self
        else {
            return;
        };

        let grid = match (slot, frame.volume) {
            (Some(slot), Some(volume)) if slot.volume == volume.volume => volume
                .current
                .get(slot.index * SH9_SCALARS..(slot.index + 1) * SH9_SCALARS)
                .map(|target| (target, &volume.previous)),
            _ => None,
        };
        let target: &[AtomicI32] = match grid {
            Some((target, _)) => target,
            None => {
                for c in scratch.iter() {
                    c.store(0, Ordering::Relaxed);
                }
                &**scratch
            }
        };
        let previous = grid.map(|(_, previous)| previous);

        let mut acc = [0.0f32; SH9_SCALARS];
        for (surfel, out) in surfels.as_slice().iter().zip(radiance.iter_mut()) {
            let p = surfel.position();
            let dir = (p - position).normalize_or_zero();

            let l = if surfel.is_sky() {
                frame
                    .lighting
                    .map_or(Vec3::ZERO, |lighting| lighting.sky_radiance(dir))
                    * frame.sky_light_intensity
            } else {
                let normal = surfel.normal();
                let direct = frame
                    .lighting
                    .map_or(Vec3::ZERO, |lighting| lighting.direct_radiance(p, normal));
                let indirect = match previous {
                    Some(previous) if frame.gi_intensity > 0.0 => {
                        previous.irradiance(p, normal) * FRAC_1_PI * frame.gi_intensity
                    }
                    _ => Vec3::ZERO,
                };
                surfel.albedo() * (direct + indirect)
            };
            *out = l;
            sh::project_into(&mut acc, dir, l, SAMPLE_WEIGHT);
        }

        **coefficients = sh::encode_all(&acc);
        sh::accumulate_atomic(target, &**coefficients);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Cubemap, GBufferChannel};
    use crate::math::sh::SH9_COEFFICIENTS;
    use crate::probe::lighting::ConstantSky;
    use crate::probe::surfel::Surfel;
    use std::f32::consts::PI;

    struct FailingRasterizer;

    impl CubemapRasterizer for FailingRasterizer {
        fn render_cubemap(&self, _: Vec3, _: GBufferChannel, _: u32) -> Result<Cubemap> {
            Err(Error::Gpu("device lost".to_string()))
        }
    }

    fn sky_probe(position: Vec3) -> Probe {
        let mut probe = Probe::new(position);
        probe.try_init();
        let surfels = crate::math::sphere::sample_directions()
            .iter()
            .map(|d| Surfel::sky(position, *d))
            .collect();
        probe.surfels_mut().expect("initialized").replace(surfels).expect("full store");
        probe
    }

    #[test]
    fn test_buffers_start_uninitialized() {
        let probe = Probe::new(Vec3::ZERO);
        assert!(!probe.is_initialized());
        assert!(matches!(probe.surfels(), Err(Error::UninitializedBuffer(_))));
        assert!(matches!(probe.sh9(), Err(Error::UninitializedBuffer(_))));
        assert_eq!(probe.index_in_volume(), None);
    }

    #[test]
    fn test_try_init_is_idempotent() {
        let mut probe = Probe::new(Vec3::ZERO);
        probe.try_init();
        let surfels_ptr = probe.surfels().unwrap().as_slice().as_ptr();
        let radiance_ptr = probe.radiance().unwrap().as_ptr();
        let coeff_ptr = probe.coefficients_fixed().unwrap().as_ptr();

        probe.try_init();
        assert_eq!(probe.surfels().unwrap().as_slice().as_ptr(), surfels_ptr);
        assert_eq!(probe.radiance().unwrap().as_ptr(), radiance_ptr);
        assert_eq!(probe.coefficients_fixed().unwrap().as_ptr(), coeff_ptr);
        assert_eq!(probe.surfels().unwrap().as_slice().len(), RAY_COUNT);
        assert_eq!(probe.radiance().unwrap().len(), RAY_COUNT);
    }

    #[test]
    fn test_try_init_keeps_surfel_content() {
        let mut probe = sky_probe(Vec3::ZERO);
        let revision = probe.surfels().unwrap().revision();
        probe.try_init();
        assert_eq!(probe.surfels().unwrap().revision(), revision);
        assert_eq!(probe.surfels().unwrap().sky_count(), RAY_COUNT);
    }

    #[test]
    fn test_capture_without_rasterizer_leaves_store_unchanged() {
        let mut probe = sky_probe(Vec3::new(1.0, 0.0, 0.0));
        let before = probe.surfels().unwrap().as_slice().to_vec();

        let result = probe.capture(None, 16);
        assert!(matches!(result, Err(Error::MissingCollaborator(_))));
        assert_eq!(probe.surfels().unwrap().as_slice(), &before[..]);
    }

    #[test]
    fn test_capture_failure_leaves_store_unchanged() {
        let mut probe = sky_probe(Vec3::ZERO);
        let revision = probe.surfels().unwrap().revision();

        let result = probe.capture(Some(&FailingRasterizer), 16);
        assert!(matches!(result, Err(Error::Gpu(_))));
        assert_eq!(probe.surfels().unwrap().revision(), revision);
    }

    #[test]
    fn test_sky_only_relight() {
        let mut probe = sky_probe(Vec3::new(3.0, 1.0, -2.0));
        let sky = ConstantSky::new(Vec3::new(1.0, 0.5, 0.25));
        let frame = RelightFrame {
            lighting: Some(&sky),
            sky_light_intensity: 2.0,
            gi_intensity: 0.0,
            volume: None,
        };
        probe.relight(&frame);

        let sh = probe.sh9().unwrap();
        // Uniform radiance L projects to c0 = L * 4pi * Y0, higher bands vanish
        let expected = sky.color * 2.0 * 4.0 * PI * 0.282095;
        assert!((sh.coeffs[0] - expected).abs().max_element() < 1e-3,
            "c0 = {}, expected {}", sh.coeffs[0], expected);
        // Lattice quadrature leaves a small residue in band 2
        for k in 1..SH9_COEFFICIENTS {
            assert!(sh.coeffs[k].abs().max_element() < 0.05,
                "coefficient {} = {}", k, sh.coeffs[k]);
        }

        let radiance = probe.radiance().unwrap();
        assert!(radiance.iter().all(|r| *r == sky.color * 2.0));
    }

    #[test]
    fn test_dim_sky_survives_fixed_point() {
        let mut probe = sky_probe(Vec3::ZERO);
        let sky = ConstantSky::new(Vec3::splat(0.01));
        probe.relight(&RelightFrame::standalone(Some(&sky), 1.0));

        let c0 = probe.sh9().unwrap().coeffs[0].x;
        let expected = 0.01 * 4.0 * PI * 0.282095;
        assert!((c0 - expected).abs() < 2e-4, "c0 = {}, expected {}", c0, expected);
        assert_eq!(probe.scratch_sh9().unwrap().coeffs[0].x, c0);
    }

    #[test]
    fn test_foreign_volume_inputs_use_scratch() {
        let mut probe = Probe::in_volume(Vec3::ZERO, ProbeSlot { volume: VolumeId(u32::MAX), index: 0 });
        probe.try_init();
        let surfels = crate::math::sphere::sample_directions()
            .iter()
            .map(|d| Surfel::sky(Vec3::ZERO, *d))
            .collect();
        probe.surfels_mut().unwrap().replace(surfels).unwrap();

        let previous: Vec<AtomicI32> = (0..SH9_SCALARS).map(|_| AtomicI32::new(0)).collect();
        let current: Vec<AtomicI32> = (0..SH9_SCALARS).map(|_| AtomicI32::new(0)).collect();
        let shape = crate::volume::GridShape::new(Vec3::ZERO, glam::UVec3::ONE, 1.0);
        let inputs = VolumeInputs {
            volume: VolumeId(u32::MAX - 1),
            previous: CoefficientView::new(shape, &previous),
            current: &current,
        };
        let sky = ConstantSky::new(Vec3::ONE);
        probe.relight(&RelightFrame {
            lighting: Some(&sky),
            sky_light_intensity: 1.0,
            gi_intensity: 1.0,
            volume: Some(&inputs),
        });

        assert!(current.iter().all(|c| c.load(Ordering::Relaxed) == 0));
        assert!(probe.scratch_sh9().unwrap().coeffs[0].x > 3.0);
    }

    #[test]
    fn test_standalone_probe_writes_scratch() {
        let mut probe = sky_probe(Vec3::ZERO);
        let sky = ConstantSky::new(Vec3::ONE);
        probe.relight(&RelightFrame::standalone(Some(&sky), 1.0));

        let local = probe.sh9().unwrap();
        let scratch = probe.scratch_sh9().unwrap();
        assert_eq!(local, scratch);
        assert!(local.coeffs[0].x > 3.0);
    }

    #[test]
    fn test_relight_is_not_cumulative() {
        let mut probe = sky_probe(Vec3::ZERO);
        let sky = ConstantSky::new(Vec3::ONE);
        let frame = RelightFrame::standalone(Some(&sky), 1.0);
        probe.relight(&frame);
        let first = *probe.coefficients_fixed().unwrap();
        probe.relight(&frame);
        assert_eq!(*probe.coefficients_fixed().unwrap(), first);
        assert_eq!(probe.scratch_sh9().unwrap(), Sh9::from_fixed(&first));
    }

    #[test]
    fn test_relight_without_lighting_is_zero() {
        let mut probe = sky_probe(Vec3::ZERO);
        probe.relight(&RelightFrame::standalone(None, 1.0));
        assert_eq!(probe.sh9().unwrap(), Sh9::default());
    }

    #[test]
    fn test_relight_allocates_lazily() {
        let mut probe = Probe::new(Vec3::ZERO);
        probe.relight(&RelightFrame::standalone(None, 1.0));
        assert!(probe.is_initialized());
    }
}
