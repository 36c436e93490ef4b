//! Error types for probe capture, relight and persistence

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Dataset shape or recorded position no longer matches the live volume.
    #[error(
        "stale volume dataset: expected {expected_len} scalars at {expected_position:?}, \
         found {actual_len} scalars at {actual_position:?}"
    )]
    StaleDataset {
        expected_len: usize,
        actual_len: usize,
        expected_position: [f32; 3],
        actual_position: [f32; 3],
    },

    #[error("buffer not initialized: {0}")]
    UninitializedBuffer(&'static str),

    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("surfel store holds exactly {expected} surfels, got {actual}")]
    SurfelCount { expected: usize, actual: usize },

    #[error("capture resolution {0} exceeds {max} texels per face", max = crate::capture::MAX_CAPTURE_RESOLUTION)]
    CaptureResolution(u32),

    #[error("invalid probe grid: {0}")]
    InvalidGrid(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("config error: {0}")]
    Config(String),
}
