//! Baked surfel datasets for a probe volume

use glam::Vec3;
use rkyv::{Archive, Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::math::sphere::RAY_COUNT;
use crate::probe::FLOATS_PER_SURFEL;

use super::volume::ProbeVolume;

/// Scalars stored per probe
pub const FLOATS_PER_PROBE: usize = RAY_COUNT * FLOATS_PER_SURFEL;

/// All surfels of a volume, flattened in probe index order.
///
/// Each surfel is `(px, py, pz, nx, ny, nz, ax, ay, az, sky)`. The dataset is
/// only valid for a volume with the same probe count and position.
#[derive(Archive, Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct VolumeDataset {
    pub volume_position: [f32; 3],
    pub surfel_storage: Vec<f32>,
}

impl VolumeDataset {
    /// Storage length a dataset for `volume` must have
    pub fn expected_len(volume: &ProbeVolume) -> usize {
        volume.probe_count() * FLOATS_PER_PROBE
    }

    /// Snapshot the surfels of `volume`
    pub fn from_volume(volume: &ProbeVolume) -> Self {
        let mut dataset = Self::default();
        dataset.save(volume);
        dataset
    }

    /// Rewrite this dataset from `volume`.
    ///
    /// Probes that were never initialized contribute zeroed surfels.
    pub fn save(&mut self, volume: &ProbeVolume) {
        self.volume_position = volume.position().to_array();
        self.surfel_storage.clear();
        self.surfel_storage.resize(Self::expected_len(volume), 0.0);

        for (probe, out) in volume
            .probes()
            .iter()
            .zip(self.surfel_storage.chunks_exact_mut(FLOATS_PER_PROBE))
        {
            if let Ok(store) = probe.surfels() {
                store.write_floats(out);
            }
        }
    }

    /// Check length and position against the live volume.
    ///
    /// Positions must match exactly, component by component.
    pub fn validate(&self, volume: &ProbeVolume) -> Result<()> {
        let expected_len = Self::expected_len(volume);
        let position = volume.position();
        if self.surfel_storage.len() != expected_len
            || Vec3::from_array(self.volume_position) != position
        {
            return Err(Error::StaleDataset {
                expected_len,
                actual_len: self.surfel_storage.len(),
                expected_position: position.to_array(),
                actual_position: self.volume_position,
            });
        }
        Ok(())
    }

    /// Restore every probe's surfels from this dataset.
    ///
    /// A stale dataset leaves the volume untouched.
    pub fn try_load(&self, volume: &mut ProbeVolume) -> Result<()> {
        self.validate(volume)?;

        for (probe, src) in volume
            .probes_mut()
            .iter_mut()
            .zip(self.surfel_storage.chunks_exact(FLOATS_PER_PROBE))
        {
            probe.try_init();
            probe.surfels_mut()?.read_floats(src);
        }

        log::info!(
            "Loaded {} probes of surfels into volume '{}'",
            volume.probe_count(),
            volume.name()
        );
        Ok(())
    }

    /// Like [`VolumeDataset::try_load`], logging a warning instead of failing
    pub fn load(&self, volume: &mut ProbeVolume) -> bool {
        match self.try_load(volume) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Skipping dataset for volume '{}': {}", volume.name(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Surfel;
    use glam::UVec3;

    fn volume() -> ProbeVolume {
        let mut volume = ProbeVolume::new("test", Vec3::new(1.0, 0.0, -2.0));
        volume.regenerate(UVec3::new(2, 1, 1), 1.0).unwrap();
        volume
    }

    fn fill_surfels(volume: &mut ProbeVolume) {
        for probe in volume.probes_mut() {
            let base = probe.position();
            probe.try_init();
            let surfels = (0..RAY_COUNT)
                .map(|i| {
                    let f = i as f32;
                    Surfel::hit(base + Vec3::new(f, -f, 0.5), Vec3::Z, Vec3::new(0.1, 0.2, f / 512.0))
                })
                .collect();
            probe.surfels_mut().unwrap().replace(surfels).unwrap();
        }
    }

    #[test]
    fn test_save_layout() {
        let mut volume = volume();
        fill_surfels(&mut volume);
        let dataset = VolumeDataset::from_volume(&volume);

        assert_eq!(dataset.volume_position, [1.0, 0.0, -2.0]);
        assert_eq!(dataset.surfel_storage.len(), 2 * 512 * 10);
        // Probe 1, surfel 3
        let offset = FLOATS_PER_PROBE + 3 * FLOATS_PER_SURFEL;
        assert_eq!(&dataset.surfel_storage[offset..offset + 3], &[5.0, -3.0, -1.5]);
    }

    #[test]
    fn test_save_load_is_bit_exact() {
        let mut source = volume();
        fill_surfels(&mut source);
        let dataset = VolumeDataset::from_volume(&source);

        let mut target = volume();
        assert!(dataset.load(&mut target));
        for (a, b) in source.probes().iter().zip(target.probes()) {
            assert_eq!(a.surfels().unwrap().as_bytes(), b.surfels().unwrap().as_bytes());
            assert_ne!(b.surfels().unwrap().revision(), 0);
        }
    }

    #[test]
    fn test_reload_after_regenerate_changes_revision() {
        let mut volume = volume();
        let len = VolumeDataset::expected_len(&volume);
        let first = VolumeDataset {
            volume_position: volume.position().to_array(),
            surfel_storage: vec![1.0; len],
        };
        let second = VolumeDataset {
            surfel_storage: vec![2.0; len],
            ..first.clone()
        };

        assert!(first.load(&mut volume));
        let before: Vec<u64> = volume.probes().iter().map(|p| p.surfels().unwrap().revision()).collect();

        volume.regenerate(UVec3::new(2, 1, 1), 1.0).unwrap();
        assert!(second.load(&mut volume));
        for (probe, old) in volume.probes().iter().zip(&before) {
            let store = probe.surfels().unwrap();
            assert_ne!(store.revision(), *old);
            assert_eq!(store.get(0).unwrap().sky_mask, 2.0);
        }
    }

    #[test]
    fn test_uninitialized_probes_save_zeros() {
        let volume = volume();
        let dataset = VolumeDataset::from_volume(&volume);
        assert!(dataset.surfel_storage.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_stale_length_is_rejected() {
        let mut source = volume();
        fill_surfels(&mut source);
        let dataset = VolumeDataset::from_volume(&source);

        let mut target = ProbeVolume::new("test", Vec3::new(1.0, 0.0, -2.0));
        target.regenerate(UVec3::new(3, 1, 1), 1.0).unwrap();
        assert!(matches!(
            dataset.validate(&target),
            Err(Error::StaleDataset { expected_len: 15360, actual_len: 10240, .. })
        ));
        assert!(!dataset.load(&mut target));
        assert!(target.probes().iter().all(|p| !p.is_initialized()));
    }

    #[test]
    fn test_stale_position_is_rejected() {
        let mut source = volume();
        fill_surfels(&mut source);
        let dataset = VolumeDataset::from_volume(&source);

        let mut target = volume();
        target.set_position(Vec3::new(1.0, 0.0, -2.0001));
        assert!(!dataset.load(&mut target));
        assert!(target.probes().iter().all(|p| p.surfels().is_err()));
    }
}
