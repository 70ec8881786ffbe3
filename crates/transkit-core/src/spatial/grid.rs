//! Voxel grids with a voxel-to-world affine.
//!
//! Voxel index axis `i` is tensor dimension `i`; flat voxel numbering is
//! row-major (the last axis varies fastest).

use std::ops::Range;

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use crate::config::Tolerance;
use crate::error::{check_dimensionality, Result, TransformError};
use super::affine::AffineMatrix;

/// A gridded sampling of world space.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGrid<const D: usize> {
    shape: [usize; D],
    affine: AffineMatrix<D>,
    inverse: AffineMatrix<D>,
}

impl<const D: usize> ImageGrid<D> {
    /// Create a grid from its shape and voxel-to-world affine.
    ///
    /// # Errors
    /// `ConfigError` for an unsupported dimensionality, an empty axis or a
    /// singular affine.
    pub fn new(shape: [usize; D], affine: AffineMatrix<D>, tolerance: &Tolerance) -> Result<Self> {
        check_dimensionality::<D>()?;
        if shape.iter().any(|&s| s == 0) {
            return Err(TransformError::config(format!(
                "Grid shape {:?} has an empty axis",
                shape
            )));
        }
        let inverse = affine.try_inverse(tolerance).map_err(|e| {
            TransformError::config(format!("Grid affine must be non-singular: {e}"))
        })?;
        Ok(Self {
            shape,
            affine,
            inverse,
        })
    }

    /// Size of each axis.
    pub fn shape(&self) -> [usize; D] {
        self.shape
    }

    /// Voxel-to-world affine.
    pub fn affine(&self) -> &AffineMatrix<D> {
        &self.affine
    }

    /// World-to-voxel affine.
    pub fn inverse(&self) -> &AffineMatrix<D> {
        &self.inverse
    }

    /// Number of spatial dimensions.
    pub fn ndim(&self) -> usize {
        D
    }

    /// Total number of voxels.
    pub fn nvox(&self) -> usize {
        self.shape.iter().product()
    }

    /// Continuous voxel index of a world coordinate.
    pub fn index(&self, world: &[f64; D]) -> [f64; D] {
        self.inverse.apply(world)
    }

    /// World coordinate of a continuous voxel index.
    pub fn world(&self, index: &[f64; D]) -> [f64; D] {
        self.affine.apply(index)
    }

    /// Integer voxel index of a flat (row-major) voxel number.
    pub fn unravel(&self, flat: usize) -> [usize; D] {
        let mut rem = flat;
        let mut index = [0usize; D];
        for axis in (0..D).rev() {
            index[axis] = rem % self.shape[axis];
            rem /= self.shape[axis];
        }
        index
    }

    /// All voxel indices in flat order.
    pub fn ndindex(&self) -> Vec<[usize; D]> {
        (0..self.nvox()).map(|flat| self.unravel(flat)).collect()
    }

    /// World coordinates of every voxel in flat order.
    pub fn ndcoords(&self) -> Vec<[f64; D]> {
        self.coords_range(0..self.nvox())
    }

    /// World coordinates of the voxels in a flat range.
    pub fn coords_range(&self, range: Range<usize>) -> Vec<[f64; D]> {
        range
            .map(|flat| {
                let index = self.unravel(flat);
                self.world(&std::array::from_fn(|i| index[i] as f64))
            })
            .collect()
    }

    /// Voxel indices of a flat range as a `[N, D]` float tensor.
    pub fn index_tensor<B: Backend>(&self, range: Range<usize>, device: &B::Device) -> Tensor<B, 2> {
        let flat = Tensor::<B, 1, Int>::arange(range.start as i64..range.end as i64, device);

        // Unravel from the fastest axis outwards
        let mut stride = 1usize;
        let mut columns = Vec::with_capacity(D);
        for axis in (0..D).rev() {
            let n = self.shape[axis];
            let quotient = flat.clone().div_scalar(stride as i64);
            let index = quotient.clone() - quotient.div_scalar(n as i64).mul_scalar(n as i64);
            columns.push(index.float().unsqueeze_dim::<2>(1));
            stride *= n;
        }
        columns.reverse();
        Tensor::cat(columns, 1)
    }

    /// World coordinates of the voxels in a flat range as a `[N, D]` tensor.
    pub fn world_tensor<B: Backend>(&self, range: Range<usize>, device: &B::Device) -> Tensor<B, 2> {
        self.affine.apply_tensor(self.index_tensor::<B>(range, device))
    }

    /// Continuous voxel indices of a `[N, D]` batch of world points.
    pub fn world_to_index_tensor<B: Backend>(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        self.inverse.apply_tensor(points)
    }

    /// Same shape and affine within tolerance.
    pub fn approx_eq(&self, other: &Self, tolerance: &Tolerance) -> bool {
        self.shape == other.shape && self.affine.approx_eq(&other.affine, tolerance)
    }
}
