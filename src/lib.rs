//! lutwatch - color grading pipeline for folders of photos
//!
//! Applies a 3D LUT to images, either as they arrive in a watched directory
//! or as an explicit batch, and reports each image's progress as events.
//! This library exposes modules for integration testing.

pub mod error;
pub mod models;
pub mod services;

pub use lattice_lut;
