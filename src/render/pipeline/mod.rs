//! Compute pipelines

pub mod relight;

pub use relight::{RelightPipeline, workgroup_grid, RELIGHT_WORKGROUP_SIZE};
