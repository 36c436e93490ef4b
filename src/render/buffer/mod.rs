//! GPU buffer management

pub mod probe_buffer;

pub use probe_buffer::{ProbeVolumeBuffers, RelightUniforms};
