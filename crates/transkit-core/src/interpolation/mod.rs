//! Interpolation types and operations.
//!
//! This module provides interpolation traits and tensor kernels
//! for sampling values at continuous coordinates.

pub mod trait_;
pub mod boundary;
pub mod linear;
pub mod nearest;
pub mod bspline;
pub mod volume;

pub use trait_::Interpolator;
pub use boundary::Boundary;
pub use linear::LinearInterpolator;
pub use nearest::NearestNeighborInterpolator;
pub use bspline::{spline_prefilter, BSplineInterpolator};
pub use volume::{inside_mask, Kernel, SampledVolume};
