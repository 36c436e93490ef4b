//! Surfel GI - light probe volumes relit from captured surfels
//!
//! Probes capture the surrounding geometry once as 512 surfels. Every frame
//! the surfels are relit with direct light, sky and last frame's probe grid,
//! then projected onto SH9 coefficients, giving infinite-bounce diffuse GI
//! that lags one frame behind lighting changes.

pub mod core;
pub mod math;
pub mod probe;
pub mod capture;
pub mod volume;
pub mod scene;
pub mod frame;
pub mod render;
