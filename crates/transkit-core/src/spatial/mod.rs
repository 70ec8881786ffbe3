//! Spatial types: affine matrices, voxel grids and coordinate spaces.
//!
//! Matrix algebra is delegated to nalgebra; point batches cross the API
//! boundary as burn tensors.

pub mod affine;
pub mod grid;
pub mod space;
pub mod points;

pub use affine::AffineMatrix;
pub use grid::ImageGrid;
pub use space::CoordinateSpace;
pub use points::{points_from_flat, points_from_tensor, points_to_tensor};

