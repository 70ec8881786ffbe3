//! Coordinate mapping front end.
//!
//! Maps point batches through any [`Transform`], accepting burn tensors,
//! host point lists, or interleaved coordinate buffers.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::config::Tolerance;
use crate::error::{Result, TransformError};
use crate::spatial::{points_from_flat, CoordinateSpace};
use crate::transform::Transform;

/// Maps world coordinates through a transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateMapper {
    tolerance: Tolerance,
}

impl CoordinateMapper {
    /// Create a mapper with default tolerances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tolerances used when checking declared point spaces.
    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Map a `[N, D]` tensor of points.
    ///
    /// # Errors
    /// `IncompatibleSpaceError` when the second tensor dimension is not `D`.
    pub fn map<B, T, const D: usize>(&self, transform: &T, points: Tensor<B, 2>) -> Result<Tensor<B, 2>>
    where
        B: Backend,
        T: Transform<D>,
    {
        let [n, d] = points.dims();
        if d != D {
            return Err(TransformError::incompatible(format!(
                "Point dimensionality {} does not match {}-D space",
                d, D
            )));
        }
        if n == 0 {
            return Ok(points);
        }
        tracing::debug!("Mapping {} points from {}", n, transform.source());
        transform.transform_points(points)
    }

    /// Map host points, preserving order.
    pub fn map_points<T, const D: usize>(&self, transform: &T, points: &[[f64; D]]) -> Result<Vec<[f64; D]>>
    where
        T: Transform<D>,
    {
        if points.is_empty() {
            return Ok(Vec::new());
        }
        transform.apply(points)
    }

    /// Map an interleaved coordinate buffer `[x0, y0, (z0,) x1, …]`.
    ///
    /// # Errors
    /// `IncompatibleSpaceError` when the buffer length is not a multiple of `D`.
    pub fn map_flat<T, const D: usize>(&self, transform: &T, coordinates: &[f64]) -> Result<Vec<f64>>
    where
        T: Transform<D>,
    {
        let points = points_from_flat::<D>(coordinates)?;
        let mapped = self.map_points(transform, &points)?;
        Ok(mapped.into_iter().flatten().collect())
    }

    /// Map points declared to live in `space`.
    ///
    /// # Errors
    /// `IncompatibleSpaceError` when `space` does not match the transform source.
    pub fn map_in_space<T, const D: usize>(
        &self,
        transform: &T,
        points: &[[f64; D]],
        space: &CoordinateSpace<D>,
    ) -> Result<Vec<[f64; D]>>
    where
        T: Transform<D>,
    {
        if !transform.source().compatible_within(space, &self.tolerance) {
            return Err(TransformError::incompatible(format!(
                "Points in {} cannot be mapped by a transform from {}",
                space,
                transform.source()
            )));
        }
        self.map_points(transform, points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::AffineMatrix;
    use crate::transform::LinearTransform;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn doubling() -> LinearTransform<3> {
        LinearTransform::scaling(
            [2.0, 2.0, 2.0],
            CoordinateSpace::world("a").unwrap(),
            CoordinateSpace::world("b").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_map_tensor() {
        let device = Default::default();
        let points = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0, 3.0]], &device);
        let mapped = CoordinateMapper::new().map(&doubling(), points).unwrap();
        let data = mapped.into_data();
        assert_eq!(data.as_slice::<f32>().unwrap(), &[2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_map_tensor_wrong_dimensionality() {
        let device = Default::default();
        let points = Tensor::<TestBackend, 2>::zeros([3, 2], &device);
        let err = CoordinateMapper::new().map(&doubling(), points).unwrap_err();
        assert!(matches!(err, TransformError::IncompatibleSpaceError(_)));
    }

    #[test]
    fn test_map_empty() {
        let device = Default::default();
        let mapper = CoordinateMapper::new();
        let points = Tensor::<TestBackend, 2>::zeros([0, 3], &device);
        assert_eq!(mapper.map(&doubling(), points).unwrap().dims(), [0, 3]);
        let empty: [[f64; 3]; 0] = [];
        assert!(mapper.map_points(&doubling(), &empty).unwrap().is_empty());
        assert!(mapper.map_flat(&doubling(), &[]).unwrap().is_empty());
    }

    #[test]
    fn test_map_flat() {
        let mapped = CoordinateMapper::new()
            .map_flat(&doubling(), &[1.0, 2.0, 3.0, -1.0, 0.0, 0.5])
            .unwrap();
        assert_eq!(mapped, vec![2.0, 4.0, 6.0, -2.0, 0.0, 1.0]);

        let err = CoordinateMapper::new()
            .map_flat(&doubling(), &[1.0, 2.0])
            .unwrap_err();
        assert!(matches!(err, TransformError::IncompatibleSpaceError(_)));
    }

    #[test]
    fn test_map_in_space() {
        let mapper = CoordinateMapper::new();
        let points = [[1.0, 1.0, 1.0]];
        let a = CoordinateSpace::world("a").unwrap();
        let other = CoordinateSpace::world("other").unwrap();
        assert_eq!(
            mapper.map_in_space(&doubling(), &points, &a).unwrap(),
            vec![[2.0, 2.0, 2.0]]
        );
        // World spaces agree on dimensionality alone unless labels must match
        assert!(mapper.map_in_space(&doubling(), &points, &other).is_ok());
        let strict = mapper.with_tolerance(Tolerance::new().with_label_matching(true));
        let err = strict.map_in_space(&doubling(), &points, &other).unwrap_err();
        assert!(matches!(err, TransformError::IncompatibleSpaceError(_)));

        let grid = CoordinateSpace::grid("a", [2, 2, 2], AffineMatrix::identity()).unwrap();
        let into_grid = LinearTransform::identity(grid);
        let other_grid = CoordinateSpace::grid("a", [3, 2, 2], AffineMatrix::identity()).unwrap();
        let err = mapper.map_in_space(&into_grid, &points, &other_grid).unwrap_err();
        assert!(matches!(err, TransformError::IncompatibleSpaceError(_)));
    }
}
