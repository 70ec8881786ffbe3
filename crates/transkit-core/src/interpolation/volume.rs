//! Prepared scalar volumes for repeated sampling.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::boundary::Boundary;
use super::bspline::BSplineInterpolator;
use super::linear::LinearInterpolator;
use super::nearest::NearestNeighborInterpolator;
use super::trait_::{axis_column, Interpolator};
use crate::config::InterpolationOrder;
use crate::error::Result;

/// Slack allowed past the first and last voxel centers, in index units,
/// before an index counts as outside the grid.
///
/// Wide enough to absorb single precision round-off of index mapping.
pub const EDGE_EPSILON: f64 = 1e-3;

/// Interpolation kernel selected from an [`InterpolationOrder`].
#[derive(Debug, Clone, Copy)]
pub enum Kernel {
    Nearest(NearestNeighborInterpolator),
    Linear(LinearInterpolator),
    BSpline(BSplineInterpolator),
}

impl Kernel {
    /// Kernel for `order` with taps extended by `boundary`.
    pub fn for_order(order: InterpolationOrder, boundary: Boundary) -> Result<Self> {
        Ok(match order {
            InterpolationOrder::Nearest => {
                Kernel::Nearest(NearestNeighborInterpolator::new().with_boundary(boundary))
            }
            InterpolationOrder::Linear => Kernel::Linear(LinearInterpolator::new().with_boundary(boundary)),
            spline => Kernel::BSpline(BSplineInterpolator::with_degree(spline.degree())?.with_boundary(boundary)),
        })
    }
}

impl<B: Backend> Interpolator<B> for Kernel {
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        match self {
            Kernel::Nearest(kernel) => kernel.interpolate(data, indices),
            Kernel::Linear(kernel) => kernel.interpolate(data, indices),
            Kernel::BSpline(kernel) => kernel.interpolate(data, indices),
        }
    }
}

/// A scalar tensor over a grid, ready to be sampled at fractional indices.
///
/// Coefficients are computed once (spline prefiltering for spline orders) and
/// tensor clones share storage, so clones are cheap.
#[derive(Debug, Clone)]
pub struct SampledVolume<B: Backend, const D: usize> {
    coefficients: Tensor<B, D>,
    kernel: Kernel,
    order: InterpolationOrder,
}

impl<B: Backend, const D: usize> SampledVolume<B, D> {
    /// Prepare `data` for sampling with `order`.
    ///
    /// Spline orders prefilter the samples unless `prefilter` is false, in
    /// which case the raw samples serve as coefficients.
    pub fn new(
        data: Tensor<B, D>,
        order: InterpolationOrder,
        boundary: Boundary,
        prefilter: bool,
    ) -> Result<Self> {
        let kernel = Kernel::for_order(order, boundary)?;
        let coefficients = match kernel {
            Kernel::BSpline(spline) if prefilter => spline.prefilter(data)?,
            _ => data,
        };
        Ok(Self {
            coefficients,
            kernel,
            order,
        })
    }

    /// Grid shape.
    pub fn shape(&self) -> [usize; D] {
        self.coefficients.dims()
    }

    /// Interpolation order.
    pub fn order(&self) -> InterpolationOrder {
        self.order
    }

    /// Interpolated values at `indices` (`[Batch, D]`), extended past the
    /// edges by the volume's boundary.
    pub fn sample(&self, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        self.kernel.interpolate(&self.coefficients, indices)
    }
}

/// 1.0 where a row of `indices` lies within the grid of `shape`, 0.0 elsewhere.
pub fn inside_mask<B: Backend>(indices: &Tensor<B, 2>, shape: &[usize]) -> Tensor<B, 1> {
    let batch_size = indices.dims()[0];
    let device = indices.device();
    shape
        .iter()
        .enumerate()
        .fold(Tensor::<B, 1>::ones([batch_size], &device), |mask, (axis, &n)| {
            let x = axis_column(indices, axis);
            let above = x.clone().greater_equal_elem(-EDGE_EPSILON).float();
            let below = x.lower_equal_elem((n - 1) as f64 + EDGE_EPSILON).float();
            mask * above * below
        })
}
