//! GPU relight backend

pub mod context;
pub mod buffer;
pub mod pipeline;

pub use context::GpuContext;
pub use buffer::{ProbeVolumeBuffers, RelightUniforms};
pub use pipeline::RelightPipeline;
