//! Resample image filter.
//!
//! This module provides the Resampler which resamples an image onto a target
//! grid space through a transform and an interpolation order. Target voxels
//! are processed in independent blocks; each block runs the tensor pipeline
//! grid indices -> world points -> transform -> source indices -> interpolation.

use std::ops::Range;

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use rayon::prelude::*;

use crate::config::{FillMode, ResampleOptions, Tolerance};
use crate::error::{Result, TransformError};
use crate::image::Image;
use crate::interpolation::{inside_mask, SampledVolume};
use crate::spatial::{CoordinateSpace, ImageGrid};
use crate::transform::Transform;

/// Resample filter.
///
/// The transform maps target world coordinates to image world coordinates:
/// every target voxel is pulled from the input image. This is the direction
/// of the registration transform (Fixed -> Moving).
#[derive(Debug, Clone, Copy, Default)]
pub struct Resampler {
    options: ResampleOptions,
    tolerance: Tolerance,
}

impl Resampler {
    /// Create a new resampler.
    pub fn new(options: ResampleOptions) -> Self {
        Self {
            options,
            tolerance: Tolerance::default(),
        }
    }

    /// Replace the tolerances used for space checks.
    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn options(&self) -> &ResampleOptions {
        &self.options
    }

    /// Resample `image` onto `target_space` through `transform`.
    ///
    /// The output has the target grid's shape and affine, one channel per
    /// input channel. The input image is never modified.
    ///
    /// # Errors
    /// * `ConfigError` when `target_space` is not a grid or `block_size` is 0.
    /// * `IncompatibleSpaceError` when the transform source does not match
    ///   `target_space` or its target does not match the image space.
    /// * Any error raised by the transform while mapping voxels.
    pub fn resample<B, T, const D: usize>(
        &self,
        image: &Image<B, D>,
        transform: &T,
        target_space: &CoordinateSpace<D>,
    ) -> Result<Image<B, D>>
    where
        B: Backend,
        T: Transform<D> + Sync,
    {
        let target_grid = target_space.image_grid().ok_or_else(|| {
            TransformError::config(format!("Resampling target {} must be a grid space", target_space))
        })?;
        let source_grid = image.grid().ok_or_else(|| {
            TransformError::config(format!("Image space {} must be a grid space", image.space()))
        })?;
        if self.options.block_size == 0 {
            return Err(TransformError::config("Resampling block size must be positive"));
        }
        if !transform.source().compatible_within(target_space, &self.tolerance) {
            return Err(TransformError::incompatible(format!(
                "Transform maps from {} but the resampling target is {}",
                transform.source(),
                target_space
            )));
        }
        if !transform.target().compatible_within(image.space(), &self.tolerance) {
            return Err(TransformError::incompatible(format!(
                "Transform maps to {} but the image lives in {}",
                transform.target(),
                image.space()
            )));
        }

        let nvox = target_grid.nvox();
        tracing::info!(
            "Resampling {} channel(s) {:?} -> {:?} ({:?}, {} voxels)",
            image.channel_count(),
            image.shape(),
            target_grid.shape(),
            self.options.order,
            nvox
        );

        let boundary = self.options.fill.boundary();
        let volumes = image
            .channels()
            .iter()
            .map(|channel| {
                SampledVolume::new(channel.clone(), self.options.order, boundary, self.options.prefilter)
            })
            .collect::<Result<Vec<_>>>()?;

        let ranges = block_ranges(nvox, self.options.block_size);
        tracing::debug!(
            "Scheduling {} block(s) of up to {} voxels (parallel: {})",
            ranges.len(),
            self.options.block_size.min(nvox),
            self.options.parallel
        );
        let device = image.data().device();
        let blocks = Blocks {
            target: target_grid,
            source: source_grid,
            volumes: &volumes,
            fill: self.options.fill,
            device: &device,
        };
        let filled: Vec<(Vec<Tensor<B, 1>>, usize)> = if self.options.parallel {
            ranges
                .into_par_iter()
                .map(|range| blocks.fill(range, transform))
                .collect::<Result<Vec<_>>>()?
        } else {
            ranges
                .into_iter()
                .map(|range| blocks.fill(range, transform))
                .collect::<Result<Vec<_>>>()?
        };
        let outside: usize = filled.iter().map(|(_, outside)| outside).sum();

        let target_shape = target_grid.shape();
        let resampled: Vec<Tensor<B, D>> = (0..volumes.len())
            .map(|c| {
                let pieces: Vec<Tensor<B, 1>> = filled.iter().map(|(values, _)| values[c].clone()).collect();
                Tensor::cat(pieces, 0).reshape(target_shape)
            })
            .collect();

        tracing::info!(
            "Resampled {} voxels, {} outside the input grid",
            nvox,
            outside
        );
        Image::from_channels(resampled, target_space.clone())
    }
}

/// Resample `image` onto `target_space` with `options`.
///
/// Shorthand for `Resampler::new(options).resample(..)`.
pub fn resample<B, T, const D: usize>(
    image: &Image<B, D>,
    transform: &T,
    target_space: &CoordinateSpace<D>,
    options: ResampleOptions,
) -> Result<Image<B, D>>
where
    B: Backend,
    T: Transform<D> + Sync,
{
    Resampler::new(options).resample(image, transform, target_space)
}

/// Flat voxel ranges of at most `block_size` voxels covering `0..nvox`.
fn block_ranges(nvox: usize, block_size: usize) -> Vec<Range<usize>> {
    (0..nvox)
        .step_by(block_size)
        .map(|start| start..start.saturating_add(block_size).min(nvox))
        .collect()
}

/// Shared state for filling independent voxel blocks.
struct Blocks<'a, B: Backend, const D: usize> {
    target: &'a ImageGrid<D>,
    source: &'a ImageGrid<D>,
    volumes: &'a [SampledVolume<B, D>],
    fill: FillMode,
    device: &'a B::Device,
}

impl<B: Backend, const D: usize> Blocks<'_, B, D> {
    /// Sample every channel over the target voxels in `range`, returning one
    /// `[range.len()]` tensor per channel and how many voxels fell outside
    /// the input grid.
    fn fill<T: Transform<D>>(&self, range: Range<usize>, transform: &T) -> Result<(Vec<Tensor<B, 1>>, usize)> {
        let count = range.len();
        let points = self.target.world_tensor::<B>(range, self.device);
        let mapped = transform.transform_points(points)?;
        let indices = self.source.world_to_index_tensor(mapped);

        let inside = inside_mask(&indices, &self.source.shape());
        let hits = inside.clone().sum().into_scalar().elem::<f64>().round() as usize;
        let outside = inside.lower_elem(0.5);

        let values = self
            .volumes
            .iter()
            .map(|volume| {
                let sampled = volume.sample(indices.clone());
                match self.fill {
                    FillMode::Constant(fill) => sampled.mask_fill(outside.clone(), fill),
                    _ => sampled,
                }
            })
            .collect();
        Ok((values, count.saturating_sub(hits)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterpolationOrder;
    use crate::spatial::AffineMatrix;
    use crate::transform::LinearTransform;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f64>;

    fn grid(shape: [usize; 2]) -> CoordinateSpace<2> {
        CoordinateSpace::grid("scanner", shape, AffineMatrix::identity()).unwrap()
    }

    fn ramp(shape: [usize; 2]) -> Image<TestBackend, 2> {
        let device = Default::default();
        let n = shape[0] * shape[1];
        let values: Vec<f64> = (0..n).map(|v| v as f64).collect();
        let data = Tensor::<TestBackend, 2>::from_data(TensorData::new(values, shape), &device);
        Image::new(data, grid(shape)).unwrap()
    }

    fn values(image: &Image<TestBackend, 2>, channel: usize) -> Vec<f64> {
        image
            .channel(channel)
            .unwrap()
            .clone()
            .into_data()
            .to_vec::<f64>()
            .unwrap()
    }

    #[test]
    fn test_identity_nearest_is_exact() {
        let image = ramp([4, 5]);
        let identity = LinearTransform::identity(grid([4, 5]));
        let options = ResampleOptions::new().with_order(InterpolationOrder::Nearest);
        let out = resample(&image, &identity, &grid([4, 5]), options).unwrap();
        assert_eq!(values(&out, 0), values(&image, 0));
        assert_eq!(out.space(), &grid([4, 5]));
    }

    #[test]
    fn test_shift_with_constant_fill() {
        let image = ramp([4, 4]);
        let shift = LinearTransform::translation([0.0, 1.0], grid([4, 4]), grid([4, 4])).unwrap();
        let options = ResampleOptions::new()
            .with_order(InterpolationOrder::Linear)
            .with_fill_value(-1.0);
        let out = resample(&image, &shift, &grid([4, 4]), options).unwrap();
        let out = values(&out, 0);
        // Row 0 is [1, 2, 3, fill]
        assert_eq!(&out[0..4], &[1.0, 2.0, 3.0, -1.0]);
    }

    #[test]
    fn test_nearest_fill_mode() {
        let image = ramp([4, 4]);
        let shift = LinearTransform::translation([0.0, 1.0], grid([4, 4]), grid([4, 4])).unwrap();
        let options = ResampleOptions::new()
            .with_order(InterpolationOrder::Linear)
            .with_fill(FillMode::Nearest);
        let out = resample(&image, &shift, &grid([4, 4]), options).unwrap();
        assert_eq!(&values(&out, 0)[0..4], &[1.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn test_blocks_and_sequential_agree() {
        let image = ramp([7, 6]);
        let scale = LinearTransform::scaling([0.5, 0.75], grid([7, 6]), grid([7, 6])).unwrap();
        let base = ResampleOptions::new().with_order(InterpolationOrder::Cubic);
        let whole = resample(&image, &scale, &grid([7, 6]), base).unwrap();
        let blocked = resample(
            &image,
            &scale,
            &grid([7, 6]),
            base.with_block_size(5).sequential(),
        )
        .unwrap();
        for (a, b) in values(&whole, 0).iter().zip(values(&blocked, 0)) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_block_ranges() {
        assert_eq!(block_ranges(10, 4), vec![0..4, 4..8, 8..10]);
        assert_eq!(block_ranges(3, usize::MAX), vec![0..3]);
    }

    #[test]
    fn test_unbounded_block_size_with_channels() {
        let first = ramp([4, 4]).data().clone();
        let second = first.clone().mul_scalar(-2.0);
        let image = Image::from_channels(vec![first, second], grid([4, 4])).unwrap();
        let shift = LinearTransform::translation([1.0, 0.0], grid([4, 4]), grid([4, 4])).unwrap();

        let options = ResampleOptions::new().with_fill_value(0.0);
        let unbounded = resample(&image, &shift, &grid([4, 4]), options.with_block_size(usize::MAX)).unwrap();
        let blocked = resample(&image, &shift, &grid([4, 4]), options.with_block_size(3)).unwrap();
        assert_eq!(unbounded.channel_count(), 2);
        for c in 0..2 {
            assert_eq!(values(&unbounded, c), values(&blocked, c));
        }
        // Rows shift up by one, the last row is filled
        let second = values(&unbounded, 1);
        assert_eq!(&second[0..4], &[-8.0, -10.0, -12.0, -14.0]);
        assert_eq!(&second[12..16], &[0.0; 4]);
    }

    #[test]
    fn test_boundary_fill_modes() {
        // Row 0 of the ramp is [0, 1, 2, 3]; shifting by 2 samples columns 2..=5
        let image = ramp([4, 4]);
        let shift = LinearTransform::translation([0.0, 2.0], grid([4, 4]), grid([4, 4])).unwrap();
        let cases = [
            (FillMode::Nearest, [2.0, 3.0, 3.0, 3.0]),
            (FillMode::Mirror, [2.0, 3.0, 2.0, 1.0]),
            (FillMode::Reflect, [2.0, 3.0, 3.0, 2.0]),
            (FillMode::Wrap, [2.0, 3.0, 0.0, 1.0]),
        ];
        for (fill, expected) in cases {
            let options = ResampleOptions::new()
                .with_order(InterpolationOrder::Linear)
                .with_fill(fill);
            let out = resample(&image, &shift, &grid([4, 4]), options).unwrap();
            let row = values(&out, 0);
            for (value, e) in row[0..4].iter().zip(expected) {
                assert!((value - e).abs() < 1e-9, "{fill:?}: {:?}", &row[0..4]);
            }
        }
    }

    #[test]
    fn test_spline_orders_reproduce_identity() {
        let image = ramp([5, 6]);
        let identity = LinearTransform::identity(grid([5, 6]));
        for order in [
            InterpolationOrder::Quadratic,
            InterpolationOrder::Cubic,
            InterpolationOrder::Quartic,
            InterpolationOrder::Quintic,
        ] {
            let options = ResampleOptions::new().with_order(order);
            let out = resample(&image, &identity, &grid([5, 6]), options).unwrap();
            for (a, b) in values(&out, 0).iter().zip(values(&image, 0)) {
                assert!((a - b).abs() < 1e-9, "{order:?}");
            }
        }
    }

    #[test]
    fn test_validation() {
        let image = ramp([4, 4]);
        let identity = LinearTransform::identity(grid([4, 4]));
        let world = CoordinateSpace::world("scanner").unwrap();
        let err = resample(&image, &identity, &world, ResampleOptions::new()).unwrap_err();
        assert!(matches!(err, TransformError::ConfigError(_)));

        let err = resample(&image, &identity, &grid([3, 3]), ResampleOptions::new()).unwrap_err();
        assert!(matches!(err, TransformError::IncompatibleSpaceError(_)));

        let err = resample(
            &image,
            &identity,
            &grid([4, 4]),
            ResampleOptions::new().with_block_size(0),
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::ConfigError(_)));
    }
}
