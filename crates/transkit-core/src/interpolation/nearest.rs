//! Nearest neighbor interpolation implementation.
//!
//! This module provides nearest neighbor interpolation for N-D data.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::boundary::Boundary;
use super::trait_::{axis_column, strides, Interpolator};

/// Nearest Neighbor Interpolator.
///
/// Performs nearest neighbor interpolation (rounds to nearest integer coordinate).
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighborInterpolator {
    boundary: Boundary,
}

impl NearestNeighborInterpolator {
    /// Create a new nearest neighbor interpolator that clamps to the edges.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `boundary` for indices past the edges.
    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }
}

impl<B: Backend> Interpolator<B> for NearestNeighborInterpolator {
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let shape = data.dims();
        let strides = strides(&shape);
        let flat_data = data.clone().reshape([shape.iter().product::<usize>()]);

        let idx = shape
            .iter()
            .enumerate()
            .map(|(axis, &n)| {
                // Round to nearest integer, then fold onto the grid
                let x = self.boundary.fold(axis_column(&indices, axis), n);
                self.boundary.tap(x.round(), n).mul_scalar(strides[axis] as i64)
            })
            .reduce(|acc, offset| acc + offset);

        match idx {
            Some(idx) => flat_data.gather(0, idx),
            None => flat_data,
        }
    }
}
