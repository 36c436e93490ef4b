//! Mathematical utilities and data structures

pub mod aabb;
pub mod ray;
pub mod sh;
pub mod sphere;

pub use aabb::Aabb;
pub use ray::{BoxHit, Ray};
pub use sh::Sh9;
