//! Image types and operations.
//!
//! This module provides the Image type: tensor channels sampled on a grid
//! coordinate space.

pub mod image;

pub use image::Image;
