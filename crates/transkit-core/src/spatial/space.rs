//! Coordinate space descriptors.
//!
//! A [`CoordinateSpace`] names the frame a transform maps from or to. World
//! spaces are continuous; grid spaces additionally carry an [`ImageGrid`].
//! Spaces are only used to validate that transforms are composed and applied
//! consistently.

use std::fmt;
use std::sync::Arc;

use nalgebra::{DMatrix, SMatrix, SVector};

use crate::config::Tolerance;
use crate::error::{check_dimensionality, Result};
use super::affine::AffineMatrix;
use super::grid::ImageGrid;

/// An immutable coordinate system descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateSpace<const D: usize> {
    label: Arc<str>,
    grid: Option<ImageGrid<D>>,
}

impl<const D: usize> CoordinateSpace<D> {
    /// A continuous world/physical space.
    pub fn world(label: impl AsRef<str>) -> Result<Self> {
        check_dimensionality::<D>()?;
        Ok(Self {
            label: Arc::from(label.as_ref()),
            grid: None,
        })
    }

    /// A grid space with the given shape and voxel-to-world affine.
    pub fn grid(label: impl AsRef<str>, shape: [usize; D], affine: AffineMatrix<D>) -> Result<Self> {
        Self::grid_with_tolerance(label, shape, affine, &Tolerance::default())
    }

    /// Like [`CoordinateSpace::grid`] with an explicit singularity tolerance.
    pub fn grid_with_tolerance(
        label: impl AsRef<str>,
        shape: [usize; D],
        affine: AffineMatrix<D>,
        tolerance: &Tolerance,
    ) -> Result<Self> {
        let grid = ImageGrid::new(shape, affine, tolerance)?;
        Ok(Self {
            label: Arc::from(label.as_ref()),
            grid: Some(grid),
        })
    }

    /// A grid space from a `(D+1)×(D+1)` homogeneous voxel-to-world matrix.
    pub fn from_homogeneous(
        label: impl AsRef<str>,
        shape: [usize; D],
        matrix: &DMatrix<f64>,
    ) -> Result<Self> {
        Self::grid(label, shape, AffineMatrix::from_homogeneous(matrix)?)
    }

    /// A grid space from ITK-style geometry.
    ///
    /// `world = origin + direction · (index ⊙ spacing)`, where column `i` of
    /// `direction` is the world direction of voxel axis `i`.
    pub fn from_geometry(
        label: impl AsRef<str>,
        shape: [usize; D],
        origin: [f64; D],
        spacing: [f64; D],
        direction: SMatrix<f64, D, D>,
    ) -> Result<Self> {
        let linear = direction * SMatrix::<f64, D, D>::from_diagonal(&SVector::from(spacing));
        Self::grid(label, shape, AffineMatrix::new(linear, SVector::from(origin))?)
    }

    /// Identifying label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The voxel grid of a grid space.
    pub fn image_grid(&self) -> Option<&ImageGrid<D>> {
        self.grid.as_ref()
    }

    /// True for grid spaces.
    pub fn is_grid(&self) -> bool {
        self.grid.is_some()
    }

    /// Number of spatial dimensions.
    pub fn ndim(&self) -> usize {
        D
    }

    /// Compatibility with the default tolerance.
    pub fn compatible_with(&self, other: &Self) -> bool {
        self.compatible_within(other, &Tolerance::default())
    }

    /// Compatibility check.
    ///
    /// Dimensionality always matches (it is part of the type). Two grid
    /// spaces must also have equal shapes and affines within `tolerance`.
    /// Labels are compared only when `tolerance.match_labels` is set.
    pub fn compatible_within(&self, other: &Self, tolerance: &Tolerance) -> bool {
        if tolerance.match_labels && self.label != other.label {
            return false;
        }
        match (&self.grid, &other.grid) {
            (Some(a), Some(b)) => a.approx_eq(b, tolerance),
            _ => true,
        }
    }
}

impl<const D: usize> fmt::Display for CoordinateSpace<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.grid {
            Some(grid) => write!(f, "{} (grid {:?})", self.label, grid.shape()),
            None => write!(f, "{} (world)", self.label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;

    #[test]
    fn test_world_space() {
        let space = CoordinateSpace::<3>::world("scanner").unwrap();
        assert_eq!(space.label(), "scanner");
        assert!(!space.is_grid());
        assert_eq!(space.to_string(), "scanner (world)");
    }

    #[test]
    fn test_unsupported_dimensionality() {
        let err = CoordinateSpace::<4>::world("4d").unwrap_err();
        assert!(matches!(err, TransformError::ConfigError(_)));
    }

    #[test]
    fn test_world_spaces_are_compatible() {
        let a = CoordinateSpace::<3>::world("mni").unwrap();
        let b = CoordinateSpace::<3>::world("native").unwrap();
        assert!(a.compatible_with(&b));
        assert!(a.compatible_with(&a.clone()));
    }

    #[test]
    fn test_label_matching_is_opt_in() {
        let strict = Tolerance::new().with_label_matching(true);
        let a = CoordinateSpace::<3>::world("mni").unwrap();
        let b = CoordinateSpace::<3>::world("native").unwrap();
        assert!(!a.compatible_within(&b, &strict));
        assert!(a.compatible_within(&a.clone(), &strict));

        let grid = CoordinateSpace::<3>::grid("mni", [2, 2, 2], AffineMatrix::identity()).unwrap();
        let renamed = CoordinateSpace::<3>::grid("other", [2, 2, 2], AffineMatrix::identity()).unwrap();
        assert!(grid.compatible_with(&renamed));
        assert!(!grid.compatible_within(&renamed, &strict));
    }

    #[test]
    fn test_grid_compatibility_uses_geometry() {
        let a = CoordinateSpace::<2>::grid("a", [4, 4], AffineMatrix::identity()).unwrap();
        let b = CoordinateSpace::<2>::grid("b", [4, 4], AffineMatrix::identity()).unwrap();
        let shifted = CoordinateSpace::<2>::grid(
            "a",
            [4, 4],
            AffineMatrix::translation([0.5, 0.0]).unwrap(),
        )
        .unwrap();
        let resized = CoordinateSpace::<2>::grid("a", [4, 5], AffineMatrix::identity()).unwrap();
        assert!(a.compatible_with(&b));
        assert!(!a.compatible_with(&shifted));
        assert!(!a.compatible_with(&resized));
    }

    #[test]
    fn test_grid_vs_world_is_compatible() {
        let grid = CoordinateSpace::<2>::grid("t1w", [4, 4], AffineMatrix::identity()).unwrap();
        assert!(grid.compatible_with(&CoordinateSpace::world("t1w").unwrap()));
        assert!(grid.compatible_with(&CoordinateSpace::world("bold").unwrap()));
        let strict = Tolerance::new().with_label_matching(true);
        assert!(!grid.compatible_within(&CoordinateSpace::world("bold").unwrap(), &strict));
    }

    #[test]
    fn test_from_geometry() {
        let space = CoordinateSpace::<2>::from_geometry(
            "img",
            [10, 10],
            [5.0, -5.0],
            [2.0, 0.5],
            SMatrix::<f64, 2, 2>::identity(),
        )
        .unwrap();
        let grid = space.image_grid().unwrap();
        assert_eq!(grid.world(&[1.0, 2.0]), [7.0, -4.0]);
    }

    #[test]
    fn test_from_homogeneous_singular_fails() {
        let m = DMatrix::<f64>::from_row_slice(3, 3, &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        let err = CoordinateSpace::<2>::from_homogeneous("bad", [2, 2], &m).unwrap_err();
        assert!(matches!(err, TransformError::ConfigError(_)));
    }
}
