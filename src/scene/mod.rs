//! Analytic test scenes used for capture and relight

pub mod box_scene;

pub use box_scene::{BoxScene, SceneBox, SceneHit, SunLight};
