//! Homogeneous affine matrices.
//!
//! An [`AffineMatrix`] stores the upper-left `D×D` linear block and the
//! translation column separately, so the homogeneous last row
//! `[0, …, 0, 1]` holds by construction.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use nalgebra::{DMatrix, SMatrix, SVector};

use crate::config::Tolerance;
use crate::error::{check_dimensionality, Result, TransformError};

/// Affine map `y = A x + t` on `D`-dimensional points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMatrix<const D: usize> {
    linear: SMatrix<f64, D, D>,
    translation: SVector<f64, D>,
}

impl<const D: usize> AffineMatrix<D> {
    /// Create an affine matrix from its linear block and translation.
    pub fn new(linear: SMatrix<f64, D, D>, translation: SVector<f64, D>) -> Result<Self> {
        check_dimensionality::<D>()?;
        if linear.iter().chain(translation.iter()).any(|v| !v.is_finite()) {
            return Err(TransformError::config("Affine entries must be finite"));
        }
        Ok(Self { linear, translation })
    }

    /// The identity map.
    pub fn identity() -> Self {
        Self {
            linear: SMatrix::identity(),
            translation: SVector::zeros(),
        }
    }

    /// Build from a `(D+1)×(D+1)` homogeneous matrix.
    ///
    /// Fails if the matrix is not square of the right size or if its last
    /// row differs from `[0, …, 0, 1]`.
    pub fn from_homogeneous(matrix: &DMatrix<f64>) -> Result<Self> {
        check_dimensionality::<D>()?;
        let n = D + 1;
        if matrix.nrows() != n || matrix.ncols() != n {
            return Err(TransformError::config(format!(
                "Expected a {n}x{n} homogeneous matrix, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        for c in 0..n {
            let expected = if c == D { 1.0 } else { 0.0 };
            if matrix[(D, c)] != expected {
                return Err(TransformError::config(format!(
                    "Last row of a homogeneous matrix must be [0, ..., 0, 1], found {} at column {}",
                    matrix[(D, c)],
                    c
                )));
            }
        }
        let linear = SMatrix::<f64, D, D>::from_fn(|r, c| matrix[(r, c)]);
        let translation = SVector::<f64, D>::from_fn(|r, _| matrix[(r, D)]);
        Self::new(linear, translation)
    }

    /// Build from `(D+1)²` values in row-major order.
    pub fn from_row_slice(values: &[f64]) -> Result<Self> {
        check_dimensionality::<D>()?;
        let n = D + 1;
        if values.len() != n * n {
            return Err(TransformError::config(format!(
                "Expected {} matrix entries, got {}",
                n * n,
                values.len()
            )));
        }
        Self::from_homogeneous(&DMatrix::from_row_slice(n, n, values))
    }

    /// Pure translation by `offset`.
    pub fn translation(offset: [f64; D]) -> Result<Self> {
        Self::new(SMatrix::identity(), SVector::from(offset))
    }

    /// Axis-aligned scaling about the origin.
    pub fn scaling(factors: [f64; D]) -> Result<Self> {
        Self::new(
            SMatrix::from_diagonal(&SVector::from(factors)),
            SVector::zeros(),
        )
    }

    /// The linear block `A`.
    pub fn linear(&self) -> &SMatrix<f64, D, D> {
        &self.linear
    }

    /// The translation column `t`.
    pub fn translation_vector(&self) -> &SVector<f64, D> {
        &self.translation
    }

    /// The full homogeneous matrix.
    pub fn to_homogeneous(&self) -> DMatrix<f64> {
        let mut m = DMatrix::<f64>::identity(D + 1, D + 1);
        for r in 0..D {
            for c in 0..D {
                m[(r, c)] = self.linear[(r, c)];
            }
            m[(r, D)] = self.translation[r];
        }
        m
    }

    /// Determinant of the linear block.
    pub fn determinant(&self) -> f64 {
        DMatrix::from_fn(D, D, |r, c| self.linear[(r, c)]).determinant()
    }

    /// Map a single point.
    pub fn apply(&self, point: &[f64; D]) -> [f64; D] {
        let mapped = self.linear * SVector::<f64, D>::from(*point) + self.translation;
        std::array::from_fn(|i| mapped[i])
    }

    /// Map a `[N, D]` batch of row-vector points.
    pub fn apply_tensor<B: Backend>(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();

        // In row vector notation (inputs [N, D]):
        // y = x @ A^T + t
        let mut a_t = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                a_t.push(self.linear[(c, r)]);
            }
        }
        let a_t = Tensor::<B, 2>::from_data(TensorData::new(a_t, [D, D]), &device);
        let t: Vec<f64> = self.translation.iter().copied().collect();
        let t = Tensor::<B, 2>::from_data(TensorData::new(t, [1, D]), &device);

        points.matmul(a_t) + t
    }

    /// `self ∘ other`: the map that applies `other` first.
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            linear: self.linear * other.linear,
            translation: self.linear * other.translation + self.translation,
        }
    }

    /// Inverse map, or `SingularTransformError` when `|det| < tolerance.singular`.
    pub fn try_inverse(&self, tolerance: &Tolerance) -> Result<Self> {
        let determinant = self.determinant();
        if !determinant.is_finite() || determinant.abs() < tolerance.singular {
            return Err(TransformError::SingularTransformError {
                determinant,
                tolerance: tolerance.singular,
            });
        }
        let inv = self
            .linear
            .try_inverse()
            .ok_or(TransformError::SingularTransformError {
                determinant,
                tolerance: tolerance.singular,
            })?;
        Ok(Self {
            linear: inv,
            translation: -(inv * self.translation),
        })
    }

    /// Entry-wise comparison with a relative tolerance.
    pub fn approx_eq(&self, other: &Self, tolerance: &Tolerance) -> bool {
        self.linear
            .iter()
            .zip(other.linear.iter())
            .chain(self.translation.iter().zip(other.translation.iter()))
            .all(|(a, b)| tolerance.close(*a, *b))
    }
}
