//! Frame driver: relight ordering and shading uniforms

pub mod relight_pass;

pub use relight_pass::{RelightPass, ShadingUniforms};
