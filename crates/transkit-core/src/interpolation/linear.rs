//! Linear interpolation implementation.
//!
//! This module provides multilinear interpolation (bilinear for 2D,
//! trilinear for 3D) over row-major tensors.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use super::boundary::Boundary;
use super::trait_::{axis_column, strides, weighted_gather, Interpolator, Tap};

/// Linear Interpolator.
///
/// Performs linear interpolation (bilinear for 2D, trilinear for 3D).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LinearInterpolator {
    boundary: Boundary,
}

impl LinearInterpolator {
    /// Create a new linear interpolator that clamps to the edges.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `boundary` for indices past the edges.
    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }
}

impl<B: Backend> Interpolator<B> for LinearInterpolator {
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let shape = data.dims();
        let batch_size = indices.dims()[0];
        let flat_data = data.clone().reshape([shape.iter().product::<usize>()]);

        let taps: Vec<Vec<Tap<B>>> = shape
            .iter()
            .enumerate()
            .map(|(axis, &n)| {
                let x = self.boundary.fold(axis_column(&indices, axis), n);
                let x0 = x.clone().floor();
                let w = x - x0.clone();
                vec![
                    Tap {
                        index: self.boundary.tap(x0.clone(), n),
                        weight: w.ones_like() - w.clone(),
                    },
                    // At the last voxel the upper tap folds back, its weight is zero there
                    Tap {
                        index: self.boundary.tap(x0.add_scalar(1.0), n),
                        weight: w,
                    },
                ]
            })
            .collect();

        weighted_gather(&flat_data, &strides(&shape), &taps, batch_size)
    }
}
