//! Light probes: surfel sets, capture and per-frame SH9 relight

pub mod surfel;
pub mod lighting;
#[allow(clippy::module_inception)]
pub mod probe;

pub use surfel::{Surfel, SurfelStore, SKY_THRESHOLD, FLOATS_PER_SURFEL};
pub use lighting::{SceneLighting, ConstantSky};
pub use probe::{Probe, ProbeSlot, RelightFrame, VolumeInputs};

/// Identity of a probe volume, stored by the probes it owns
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeId(pub u32);
