//! Interpolator trait for sampling values at continuous coordinates.
//!
//! This module defines the core Interpolator trait that all interpolation
//! methods implement, plus the separable gather helpers they share.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

/// Interpolator trait for sampling values at continuous coordinates.
///
/// Interpolators are used to sample image values at non-integer coordinates,
/// which is essential for resampling and dense field evaluation.
///
/// # Type Parameters
/// * `B` - The Burn backend
pub trait Interpolator<B: Backend> {
    /// Interpolate values from a tensor at given continuous indices.
    ///
    /// # Arguments
    /// * `data` - The source tensor (e.g., 3D volume `[I, J, K]` or 2D image `[I, J]`)
    /// * `indices` - The indices at which to interpolate `[Batch, Rank]`;
    ///   column `a` indexes tensor dimension `a`
    ///
    /// # Returns
    /// Tensor of sampled values `[Batch]`
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1>;
}

/// Row-major strides of `shape`.
pub(crate) fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}

/// Column `axis` of a `[Batch, Rank]` index tensor.
pub(crate) fn axis_column<B: Backend>(indices: &Tensor<B, 2>, axis: usize) -> Tensor<B, 1> {
    indices.clone().narrow(1, axis, 1).squeeze::<1>(1)
}

/// One sample of a separable neighborhood along a single axis.
#[derive(Debug, Clone)]
pub(crate) struct Tap<B: Backend> {
    /// Integer index into the axis, already folded onto the grid.
    pub index: Tensor<B, 1, Int>,
    /// Weight of the sample.
    pub weight: Tensor<B, 1>,
}

/// Sum of `flat[offset] * weight` over the tensor product of per-axis taps.
///
/// `flat` is the row-major flattening of the data and `taps[a]` lists the
/// neighborhood along axis `a`.
pub(crate) fn weighted_gather<B: Backend>(
    flat: &Tensor<B, 1>,
    strides: &[usize],
    taps: &[Vec<Tap<B>>],
    batch: usize,
) -> Tensor<B, 1> {
    fn recurse<B: Backend>(
        flat: &Tensor<B, 1>,
        strides: &[usize],
        taps: &[Vec<Tap<B>>],
        offset: Tensor<B, 1, Int>,
        weight: Tensor<B, 1>,
    ) -> Tensor<B, 1> {
        match taps.split_first() {
            None => flat.clone().gather(0, offset) * weight,
            Some((axis, rest)) => {
                let zeros = weight.zeros_like();
                axis.iter().fold(zeros, |sum, tap| {
                    let offset = offset.clone() + tap.index.clone().mul_scalar(strides[0] as i64);
                    let weight = weight.clone() * tap.weight.clone();
                    sum + recurse(flat, &strides[1..], rest, offset, weight)
                })
            }
        }
    }

    let device = flat.device();
    let offset = Tensor::<B, 1, Int>::zeros([batch], &device);
    let weight = Tensor::<B, 1>::ones([batch], &device);
    recurse(flat, strides, taps, offset, weight)
}
