//! Linear (affine) transform implementation.
//!
//! This module provides an affine transform between two coordinate spaces,
//! stored as a homogeneous `(D+1)×(D+1)` matrix.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nalgebra::DMatrix;

use super::trait_::Transform;
use crate::config::Tolerance;
use crate::error::{Result, TransformError};
use crate::spatial::{AffineMatrix, CoordinateSpace};

/// Affine Transform (Linear transformation + Translation).
///
/// T(x) = A x + t
///
/// where:
/// * A is a D×D matrix (rotation, scale, shear; may be singular)
/// * t is a D-dimensional translation vector
///
/// Immutable: composition and inversion return new values.
#[derive(Debug, Clone)]
pub struct LinearTransform<const D: usize> {
    affine: AffineMatrix<D>,
    source: CoordinateSpace<D>,
    target: CoordinateSpace<D>,
    tolerance: Tolerance,
}

impl<const D: usize> LinearTransform<D> {
    /// Create a new linear transform.
    ///
    /// # Arguments
    /// * `affine` - The affine map from `source` to `target` world coordinates
    /// * `source` - Space the transform maps from
    /// * `target` - Space the transform maps to
    pub fn new(affine: AffineMatrix<D>, source: CoordinateSpace<D>, target: CoordinateSpace<D>) -> Self {
        Self {
            affine,
            source,
            target,
            tolerance: Tolerance::default(),
        }
    }

    /// Create from a `(D+1)×(D+1)` homogeneous matrix.
    pub fn from_matrix(
        matrix: &DMatrix<f64>,
        source: CoordinateSpace<D>,
        target: CoordinateSpace<D>,
    ) -> Result<Self> {
        Ok(Self::new(AffineMatrix::from_homogeneous(matrix)?, source, target))
    }

    /// Create from `(D+1)²` homogeneous matrix entries in row-major order.
    pub fn from_row_slice(
        values: &[f64],
        source: CoordinateSpace<D>,
        target: CoordinateSpace<D>,
    ) -> Result<Self> {
        Ok(Self::new(AffineMatrix::from_row_slice(values)?, source, target))
    }

    /// Create an identity transform on `space`.
    pub fn identity(space: CoordinateSpace<D>) -> Self {
        Self::new(AffineMatrix::identity(), space.clone(), space)
    }

    /// Create a pure translation.
    pub fn translation(
        offset: [f64; D],
        source: CoordinateSpace<D>,
        target: CoordinateSpace<D>,
    ) -> Result<Self> {
        Ok(Self::new(AffineMatrix::translation(offset)?, source, target))
    }

    /// Create an axis-aligned scaling about the origin.
    pub fn scaling(
        factors: [f64; D],
        source: CoordinateSpace<D>,
        target: CoordinateSpace<D>,
    ) -> Result<Self> {
        Ok(Self::new(AffineMatrix::scaling(factors)?, source, target))
    }

    /// Replace the tolerances used for inversion, composition and equality.
    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Get the affine map.
    pub fn affine(&self) -> &AffineMatrix<D> {
        &self.affine
    }

    /// Get the homogeneous matrix.
    pub fn matrix(&self) -> DMatrix<f64> {
        self.affine.to_homogeneous()
    }

    /// Get the tolerances.
    pub fn tolerance(&self) -> &Tolerance {
        &self.tolerance
    }

    /// Determinant of the linear block.
    pub fn determinant(&self) -> f64 {
        self.affine.determinant()
    }

    /// True when the linear block is (numerically) singular.
    pub fn is_degenerate(&self) -> bool {
        self.determinant().abs() < self.tolerance.singular
    }

    /// The inverse transform, with source and target swapped.
    ///
    /// # Errors
    /// `SingularTransformError` when `|det(A)|` is below the singular tolerance.
    pub fn inverse(&self) -> Result<Self> {
        Ok(Self {
            affine: self.affine.try_inverse(&self.tolerance)?,
            source: self.target.clone(),
            target: self.source.clone(),
            tolerance: self.tolerance,
        })
    }

    /// `self ∘ other`: `other` is applied first.
    ///
    /// # Errors
    /// `IncompatibleSpaceError` unless `self.source` matches `other.target`.
    pub fn compose(&self, other: &Self) -> Result<Self> {
        if !self.source.compatible_within(&other.target, &self.tolerance) {
            return Err(TransformError::incompatible(format!(
                "Cannot compose: {} does not match {}",
                other.target, self.source
            )));
        }
        Ok(Self {
            affine: self.affine.compose(&other.affine),
            source: other.source.clone(),
            target: self.target.clone(),
            tolerance: self.tolerance,
        })
    }

    /// Matrices within tolerance and matching spaces.
    pub fn approx_eq(&self, other: &Self) -> bool {
        self.affine.approx_eq(&other.affine, &self.tolerance)
            && self.source.compatible_within(&other.source, &self.tolerance)
            && self.target.compatible_within(&other.target, &self.tolerance)
    }
}

impl<const D: usize> PartialEq for LinearTransform<D> {
    fn eq(&self, other: &Self) -> bool {
        self.approx_eq(other)
    }
}

impl<const D: usize> Transform<D> for LinearTransform<D> {
    fn source(&self) -> &CoordinateSpace<D> {
        &self.source
    }

    fn target(&self) -> &CoordinateSpace<D> {
        &self.target
    }

    fn apply(&self, points: &[[f64; D]]) -> Result<Vec<[f64; D]>> {
        Ok(points.iter().map(|p| self.affine.apply(p)).collect())
    }

    fn transform_points<B: Backend>(&self, points: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
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
        Ok(self.affine.apply_tensor(points))
    }
}
