//! Transform types and operations.
//!
//! This module provides the transform trait and the three variants
//! (linear, dense field, chain) for spatial coordinate transformations.

pub mod trait_;
pub mod linear;
pub mod displacement_field;
pub mod chain;
pub mod spatial;

pub use trait_::Transform;
pub use linear::LinearTransform;
pub use displacement_field::{DisplacementFieldTransform, FieldReport};
pub use chain::TransformChain;
pub use spatial::SpatialTransform;
