//! Probe volumes: grid lifecycle, coefficient generations and baked datasets

pub mod grid;
pub mod generations;
#[allow(clippy::module_inception)]
pub mod volume;
pub mod dataset;
pub mod store;

pub use grid::{CoefficientView, GridShape};
pub use generations::{CoefficientGenerations, Generation};
pub use volume::ProbeVolume;
pub use dataset::VolumeDataset;
pub use store::{DatasetStore, FileDatasetStore};
