//! Probe volume configuration, stored as JSON.

use std::path::{Path, PathBuf};

use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::volume::ProbeVolume;

/// Settings needed to build, bake and relight one probe volume.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GiConfig {
    /// Volume name, also the dataset key.
    pub name: String,
    /// World position of the volume's minimum corner (probe 0).
    pub position: [f32; 3],
    /// Probe counts along X, Y, Z.
    pub size: [u32; 3],
    /// Spacing between adjacent probes in world units.
    pub grid_size: f32,
    /// Multiplier on sky radiance seen by sky surfels.
    pub sky_light_intensity: f32,
    /// Multiplier on last frame's indirect term (infinite bounce).
    pub gi_intensity: f32,
    /// Edge length in texels of each captured cubemap face.
    pub capture_resolution: u32,
    /// Directory holding baked datasets.
    pub dataset_dir: PathBuf,
}

impl Default for GiConfig {
    fn default() -> Self {
        Self {
            name: "probe_volume".to_string(),
            position: [0.0; 3],
            size: [8, 4, 8],
            grid_size: 2.0,
            sky_light_intensity: 1.0,
            gi_intensity: 1.0,
            capture_resolution: 64,
            dataset_dir: PathBuf::from("assets/probes"),
        }
    }
}

impl GiConfig {
    /// Load a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Write the config as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Build a volume with this config's placement, shape and intensities.
    pub fn build_volume(&self) -> Result<ProbeVolume> {
        let mut volume = ProbeVolume::new(self.name.clone(), Vec3::from_array(self.position));
        volume.set_sky_light_intensity(self.sky_light_intensity);
        volume.set_gi_intensity(self.gi_intensity);
        volume.set_capture_resolution(self.capture_resolution)?;
        volume.regenerate(UVec3::from_array(self.size), self.grid_size)?;
        Ok(volume)
    }
}
