//! Per-frame relight driver for registered volumes and standalone probes

use std::time::Instant;

use glam::{UVec3, Vec3};

use crate::capture::CubemapRasterizer;
use crate::probe::{Probe, RelightFrame, SceneLighting, VolumeId};
use crate::volume::{DatasetStore, ProbeVolume};

/// Volume parameters consumed by the shading stage
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadingUniforms {
    pub volume_corner: Vec3,
    pub volume_size: UVec3,
    pub grid_size: f32,
    pub sky_light_intensity: f32,
    pub gi_intensity: f32,
}

impl ShadingUniforms {
    pub fn from_volume(volume: &ProbeVolume) -> Self {
        Self {
            volume_corner: volume.position(),
            volume_size: volume.size(),
            grid_size: volume.grid_size(),
            sky_light_intensity: volume.sky_light_intensity(),
            gi_intensity: volume.gi_intensity(),
        }
    }
}

/// Owns every probe that takes part in the frame and relights them in order.
///
/// Each frame, every volume swaps its generations, clears the new current
/// one and relights its probes; standalone probes are relit afterwards into
/// their private slots.
pub struct RelightPass {
    volumes: Vec<ProbeVolume>,
    standalone: Vec<Probe>,
    standalone_sky_intensity: f32,
    frame_count: u64,
}

impl Default for RelightPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RelightPass {
    pub fn new() -> Self {
        Self {
            volumes: Vec::new(),
            standalone: Vec::new(),
            standalone_sky_intensity: 1.0,
            frame_count: 0,
        }
    }

    /// Register a volume; returns its id
    pub fn add_volume(&mut self, volume: ProbeVolume) -> VolumeId {
        let id = volume.id();
        log::info!("Registered probe volume '{}' ({} probes)", volume.name(), volume.probe_count());
        self.volumes.push(volume);
        id
    }

    pub fn remove_volume(&mut self, id: VolumeId) -> Option<ProbeVolume> {
        let index = self.volumes.iter().position(|v| v.id() == id)?;
        Some(self.volumes.remove(index))
    }

    pub fn volume(&self, id: VolumeId) -> Option<&ProbeVolume> {
        self.volumes.iter().find(|v| v.id() == id)
    }

    pub fn volume_mut(&mut self, id: VolumeId) -> Option<&mut ProbeVolume> {
        self.volumes.iter_mut().find(|v| v.id() == id)
    }

    pub fn volumes(&self) -> &[ProbeVolume] {
        &self.volumes
    }

    /// Register a probe that belongs to no volume; returns its index
    pub fn add_probe(&mut self, probe: Probe) -> usize {
        self.standalone.push(probe);
        self.standalone.len() - 1
    }

    pub fn probes(&self) -> &[Probe] {
        &self.standalone
    }

    pub fn probe_mut(&mut self, index: usize) -> Option<&mut Probe> {
        self.standalone.get_mut(index)
    }

    pub fn set_standalone_sky_intensity(&mut self, intensity: f32) {
        self.standalone_sky_intensity = intensity.max(0.0);
    }

    /// Frames executed so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Run one frame of relighting
    pub fn execute(&mut self, lighting: Option<&dyn SceneLighting>) {
        let start = Instant::now();

        for volume in &mut self.volumes {
            volume.swap_generations();
            volume.clear_current_generation();
            volume.relight(lighting);
        }

        let frame = RelightFrame::standalone(lighting, self.standalone_sky_intensity);
        for probe in &mut self.standalone {
            probe.relight(&frame);
        }

        self.frame_count += 1;
        log::debug!(
            "Relit {} volumes and {} standalone probes in {:.2}ms (frame {})",
            self.volumes.len(),
            self.standalone.len(),
            start.elapsed().as_secs_f64() * 1000.0,
            self.frame_count
        );
    }

    /// Uniforms for shading; only the first registered volume is used
    pub fn shading_uniforms(&self) -> Option<ShadingUniforms> {
        self.volumes.first().map(ShadingUniforms::from_volume)
    }

    /// Capture a volume and store its dataset under the volume name.
    ///
    /// Failures are logged and reported as `false`; the frame loop goes on.
    pub fn capture_volume(
        &mut self,
        id: VolumeId,
        rasterizer: Option<&dyn CubemapRasterizer>,
        store: &dyn DatasetStore,
    ) -> bool {
        let Some(volume) = self.volume_mut(id) else {
            log::warn!("Capture requested for unknown volume {:?}", id);
            return false;
        };

        let start = Instant::now();
        let dataset = match volume.capture_all(rasterizer) {
            Ok(dataset) => dataset,
            Err(e) => {
                log::warn!("Capture of volume '{}' failed: {}", volume.name(), e);
                return false;
            }
        };
        log::info!(
            "Captured volume '{}' in {:.1}s",
            volume.name(),
            start.elapsed().as_secs_f32()
        );

        if let Err(e) = store.save(volume.name(), &dataset) {
            log::warn!("Saving dataset for volume '{}' failed: {}", volume.name(), e);
            return false;
        }
        true
    }

    /// Restore a volume's surfels from the store.
    ///
    /// Returns `false` when nothing usable was stored.
    pub fn load_volume(&mut self, id: VolumeId, store: &dyn DatasetStore) -> bool {
        let Some(volume) = self.volume_mut(id) else {
            log::warn!("Load requested for unknown volume {:?}", id);
            return false;
        };

        match store.load(volume.name()) {
            Ok(Some(dataset)) => dataset.load(volume),
            Ok(None) => {
                log::info!("No stored dataset for volume '{}'", volume.name());
                false
            }
            Err(e) => {
                log::warn!("Reading dataset for volume '{}' failed: {}", volume.name(), e);
                false
            }
        }
    }

    /// Load the stored dataset, capturing and saving a new one if it is
    /// missing or stale
    pub fn load_or_capture(
        &mut self,
        id: VolumeId,
        rasterizer: Option<&dyn CubemapRasterizer>,
        store: &dyn DatasetStore,
    ) -> bool {
        self.load_volume(id, store) || self.capture_volume(id, rasterizer, store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{BoxScene, SceneBox, SunLight};
    use crate::volume::FileDatasetStore;
    use tempfile::TempDir;

    fn lit_floor() -> BoxScene {
        BoxScene::new(Vec3::splat(0.5))
            .with_box(SceneBox::new(Vec3::new(-50.0, -1.0, -50.0), Vec3::new(50.0, 0.0, 50.0), Vec3::splat(0.5)))
            .with_sun(SunLight::new(Vec3::Y, Vec3::ONE, 2.0))
    }

    fn captured_pass(scene: &BoxScene, gi_intensity: f32) -> (RelightPass, VolumeId) {
        let mut volume = ProbeVolume::new("floor", Vec3::new(0.0, 1.0, 0.0));
        volume.regenerate(UVec3::ONE, 1.0).unwrap();
        volume.set_capture_resolution(16).unwrap();
        volume.set_gi_intensity(gi_intensity);
        volume.capture_all(Some(scene)).unwrap();

        let mut pass = RelightPass::new();
        let id = pass.add_volume(volume);
        (pass, id)
    }

    fn dc(pass: &RelightPass, id: VolumeId) -> f32 {
        pass.volume(id).unwrap().probe_coefficients(0).unwrap().coeffs[0].x
    }

    #[test]
    fn test_indirect_light_arrives_one_frame_later() {
        let scene = lit_floor();
        let (mut pass, id) = captured_pass(&scene, 1.0);

        pass.execute(Some(&scene));
        let first = dc(&pass, id);
        assert!(first > 0.0);

        pass.execute(Some(&scene));
        let second = dc(&pass, id);
        assert!(second > first, "second frame {} should exceed first {}", second, first);
        assert_eq!(pass.frame_count(), 2);
    }

    #[test]
    fn test_no_feedback_without_gi() {
        let scene = lit_floor();
        let (mut pass, id) = captured_pass(&scene, 0.0);

        pass.execute(Some(&scene));
        let first = dc(&pass, id);
        pass.execute(Some(&scene));
        assert_eq!(dc(&pass, id), first);
    }

    #[test]
    fn test_standalone_probes_are_relit() {
        let mut pass = RelightPass::new();
        let index = pass.add_probe(Probe::new(Vec3::ZERO));
        pass.execute(None);
        assert!(pass.probes()[index].is_initialized());
        assert!(pass.probe_mut(index).is_some());
    }

    #[test]
    fn test_shading_uniforms_follow_first_volume() {
        let mut pass = RelightPass::new();
        assert!(pass.shading_uniforms().is_none());

        let mut first = ProbeVolume::new("first", Vec3::new(1.0, 2.0, 3.0));
        first.regenerate(UVec3::new(2, 2, 2), 0.5).unwrap();
        first.set_gi_intensity(0.25);
        let mut second = ProbeVolume::new("second", Vec3::ZERO);
        second.regenerate(UVec3::ONE, 1.0).unwrap();
        pass.add_volume(first);
        pass.add_volume(second);

        let uniforms = pass.shading_uniforms().unwrap();
        assert_eq!(uniforms.volume_corner, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(uniforms.volume_size, UVec3::new(2, 2, 2));
        assert_eq!(uniforms.grid_size, 0.5);
        assert_eq!(uniforms.gi_intensity, 0.25);
    }

    #[test]
    fn test_capture_then_load_through_store() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let store = FileDatasetStore::new(temp_dir.path());
        let scene = lit_floor();

        let mut pass = RelightPass::new();
        let mut volume = ProbeVolume::new("atrium", Vec3::new(0.0, 1.0, 0.0));
        volume.regenerate(UVec3::new(2, 1, 1), 1.0).unwrap();
        volume.set_capture_resolution(8).unwrap();
        let id = pass.add_volume(volume);

        assert!(!pass.load_volume(id, &store));
        assert!(pass.load_or_capture(id, Some(&scene), &store));
        assert!(store.exists("atrium"));

        let captured = pass.remove_volume(id).unwrap();
        let mut fresh = ProbeVolume::new("atrium", Vec3::new(0.0, 1.0, 0.0));
        fresh.regenerate(UVec3::new(2, 1, 1), 1.0).unwrap();
        let fresh_id = pass.add_volume(fresh);
        assert!(pass.load_volume(fresh_id, &store));

        let loaded = pass.volume(fresh_id).unwrap();
        for (a, b) in captured.probes().iter().zip(loaded.probes()) {
            assert_eq!(a.surfels().unwrap().as_bytes(), b.surfels().unwrap().as_bytes());
        }
    }

    #[test]
    fn test_capture_without_rasterizer_reports_failure() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let store = FileDatasetStore::new(temp_dir.path());
        let mut pass = RelightPass::new();
        let mut volume = ProbeVolume::new("empty", Vec3::ZERO);
        volume.regenerate(UVec3::ONE, 1.0).unwrap();
        let id = pass.add_volume(volume);

        assert!(!pass.capture_volume(id, None, &store));
        assert!(!store.exists("empty"));
    }
}
