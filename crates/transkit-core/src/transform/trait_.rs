//! Transform trait for spatial coordinate transformations.
//!
//! This module defines the core Transform trait that every transform variant
//! implements: linear, dense field and chain.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::Result;
use crate::spatial::{points_from_tensor, points_to_tensor, CoordinateSpace};

/// Transform trait for spatial coordinate transformations.
///
/// Maps world coordinates of the [`source`](Transform::source) space to world
/// coordinates of the [`target`](Transform::target) space.
///
/// # Type Parameters
/// * `D` - The spatial dimensionality (2 or 3)
pub trait Transform<const D: usize> {
    /// Space the transform maps from.
    fn source(&self) -> &CoordinateSpace<D>;

    /// Space the transform maps to.
    fn target(&self) -> &CoordinateSpace<D>;

    /// Map an ordered sequence of points.
    ///
    /// A batch is exactly equivalent to mapping each point on its own; the
    /// output keeps the input order.
    fn apply(&self, points: &[[f64; D]]) -> Result<Vec<[f64; D]>>;

    /// Apply transform to a batch of points.
    ///
    /// # Arguments
    /// * `points` - Tensor of shape `[Batch, D]` containing the input points
    ///
    /// # Returns
    /// Tensor of shape `[Batch, D]` containing the transformed points
    fn transform_points<B: Backend>(&self, points: Tensor<B, 2>) -> Result<Tensor<B, 2>>
    where
        Self: Sized,
    {
        let device = points.device();
        let host = points_from_tensor::<B, D>(points)?;
        let mapped = self.apply(&host)?;
        Ok(points_to_tensor::<B, D>(&mapped, &device))
    }
}
