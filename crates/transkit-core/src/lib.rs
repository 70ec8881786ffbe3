//! Spatial transform representation, composition and image resampling.
//!
//! Transforms map world coordinates between named coordinate spaces. A
//! [`SpatialTransform`] is a linear (affine) map, a dense per-voxel field, or
//! an ordered chain of either; any of them can be composed, inverted where
//! possible, applied to point batches and used to resample images.

pub mod error;
pub mod config;
pub mod spatial;
pub mod interpolation;
pub mod transform;
pub mod mapping;
pub mod image;
pub mod filter;

pub use config::{
    ExtrapolationPolicy, FieldInversion, FieldOptions, FillMode, InterpolationOrder,
    ResampleOptions, Tolerance,
};
pub use error::{Result, TransformError};
pub use filter::{resample, Resampler};
pub use image::Image;
pub use mapping::CoordinateMapper;
pub use spatial::{AffineMatrix, CoordinateSpace, ImageGrid};
pub use transform::{
    DisplacementFieldTransform, LinearTransform, SpatialTransform, Transform, TransformChain,
};
