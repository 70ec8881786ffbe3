//! The closed set of transform variants.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::chain::TransformChain;
use super::displacement_field::DisplacementFieldTransform;
use super::linear::LinearTransform;
use super::trait_::Transform;
use crate::config::Tolerance;
use crate::error::Result;
use crate::spatial::CoordinateSpace;

/// Any transform between two coordinate spaces.
#[derive(Debug, Clone)]
pub enum SpatialTransform<const D: usize> {
    /// Affine map stored as a homogeneous matrix.
    Linear(LinearTransform<D>),
    /// Per-voxel displacement or coordinate field.
    Field(DisplacementFieldTransform<D>),
    /// Ordered sequence of transforms.
    Chain(TransformChain<D>),
}

impl<const D: usize> SpatialTransform<D> {
    /// Tolerances carried by the variant.
    pub fn tolerance(&self) -> Tolerance {
        match self {
            Self::Linear(t) => *t.tolerance(),
            Self::Field(t) => *t.tolerance(),
            Self::Chain(t) => *t.tolerance(),
        }
    }

    /// True for linear transforms and all-linear chains.
    pub fn is_linear(&self) -> bool {
        match self {
            Self::Linear(_) => true,
            Self::Field(_) => false,
            Self::Chain(chain) => chain.is_linear(),
        }
    }

    /// The linear transform, if this is the `Linear` variant.
    pub fn as_linear(&self) -> Option<&LinearTransform<D>> {
        match self {
            Self::Linear(t) => Some(t),
            _ => None,
        }
    }

    /// The dense field, if this is the `Field` variant.
    pub fn as_field(&self) -> Option<&DisplacementFieldTransform<D>> {
        match self {
            Self::Field(t) => Some(t),
            _ => None,
        }
    }

    /// The chain, if this is the `Chain` variant.
    pub fn as_chain(&self) -> Option<&TransformChain<D>> {
        match self {
            Self::Chain(t) => Some(t),
            _ => None,
        }
    }

    /// `self ∘ other`: `other` is applied first.
    ///
    /// * Linear ∘ Linear multiplies the matrices.
    /// * Field ∘ anything is resampled on the field's grid and evaluated
    ///   exactly outside it.
    /// * Every other pairing becomes the chain `[other, self]`.
    ///
    /// # Errors
    /// `IncompatibleSpaceError` unless `self.source` matches `other.target`.
    pub fn compose(&self, other: &Self) -> Result<Self> {
        match (self, other) {
            (Self::Linear(outer), Self::Linear(inner)) => Ok(Self::Linear(outer.compose(inner)?)),
            (Self::Field(outer), _) => Ok(Self::Field(outer.compose(other)?)),
            _ => Ok(Self::Chain(TransformChain::with_tolerance(
                vec![other.clone(), self.clone()],
                self.tolerance(),
            )?)),
        }
    }

    /// The inverse transform, mapping `target` back to `source`.
    ///
    /// # Errors
    /// * `SingularTransformError` for singular linear maps.
    /// * `UnsupportedOperationError` or `NotConvergedError` for dense fields.
    pub fn inverse(&self) -> Result<Self> {
        match self {
            Self::Linear(t) => t.inverse().map(Self::Linear),
            Self::Field(t) => t.inverse().map(Self::Field),
            Self::Chain(t) => t.inverse().map(Self::Chain),
        }
    }
}

impl<const D: usize> Transform<D> for SpatialTransform<D> {
    fn source(&self) -> &CoordinateSpace<D> {
        match self {
            Self::Linear(t) => t.source(),
            Self::Field(t) => t.source(),
            Self::Chain(t) => t.source(),
        }
    }

    fn target(&self) -> &CoordinateSpace<D> {
        match self {
            Self::Linear(t) => t.target(),
            Self::Field(t) => t.target(),
            Self::Chain(t) => t.target(),
        }
    }

    fn apply(&self, points: &[[f64; D]]) -> Result<Vec<[f64; D]>> {
        match self {
            Self::Linear(t) => t.apply(points),
            Self::Field(t) => t.apply(points),
            Self::Chain(t) => t.apply(points),
        }
    }

    fn transform_points<B: Backend>(&self, points: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        match self {
            Self::Linear(t) => t.transform_points(points),
            Self::Field(t) => t.transform_points(points),
            Self::Chain(t) => t.transform_points(points),
        }
    }
}

impl<const D: usize> From<LinearTransform<D>> for SpatialTransform<D> {
    fn from(transform: LinearTransform<D>) -> Self {
        Self::Linear(transform)
    }
}

impl<const D: usize> From<DisplacementFieldTransform<D>> for SpatialTransform<D> {
    fn from(transform: DisplacementFieldTransform<D>) -> Self {
        Self::Field(transform)
    }
}

impl<const D: usize> From<TransformChain<D>> for SpatialTransform<D> {
    fn from(transform: TransformChain<D>) -> Self {
        Self::Chain(transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;
    use crate::spatial::AffineMatrix;

    fn world(label: &str) -> CoordinateSpace<2> {
        CoordinateSpace::world(label).unwrap()
    }

    fn scale(factor: f64, from: &str, to: &str) -> SpatialTransform<2> {
        LinearTransform::scaling([factor, factor], world(from), world(to))
            .unwrap()
            .into()
    }

    fn field(from: &str, to: &str) -> SpatialTransform<2> {
        let grid = CoordinateSpace::grid("ref", [5, 5], AffineMatrix::identity()).unwrap();
        let values: Vec<f64> = (0..25).flat_map(|_| [0.5, 0.0]).collect();
        DisplacementFieldTransform::from_values(grid, values, true)
            .unwrap()
            .with_spaces(world(from), world(to))
            .into()
    }

    #[test]
    fn test_linear_compose_stays_linear() {
        let composed = scale(3.0, "b", "c").compose(&scale(2.0, "a", "b")).unwrap();
        assert!(composed.as_linear().is_some());
        assert_eq!(composed.apply(&[[1.0, 1.0]]).unwrap(), vec![[6.0, 6.0]]);
    }

    #[test]
    fn test_field_compose_is_resampled() {
        let composed = field("b", "c").compose(&scale(1.0, "a", "b")).unwrap();
        let resampled = composed.as_field().unwrap();
        assert_eq!(resampled.source().label(), "a");
        assert_eq!(resampled.target().label(), "c");
        assert_eq!(composed.apply(&[[1.0, 2.0]]).unwrap(), vec![[1.5, 2.0]]);
    }

    #[test]
    fn test_linear_after_field_is_chain() {
        let composed = scale(2.0, "b", "c").compose(&field("a", "b")).unwrap();
        let chain = composed.as_chain().unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(composed.apply(&[[1.0, 2.0]]).unwrap(), vec![[3.0, 4.0]]);
    }

    #[test]
    fn test_compose_checks_spaces() {
        let strict = Tolerance::new().with_label_matching(true);
        let outer: SpatialTransform<2> = LinearTransform::scaling([2.0, 2.0], world("x"), world("c"))
            .unwrap()
            .with_tolerance(strict)
            .into();
        let err = outer.compose(&field("a", "b")).unwrap_err();
        assert!(matches!(err, TransformError::IncompatibleSpaceError(_)));

        let outer = field("x", "c").as_field().unwrap().clone().with_tolerance(strict);
        let err = SpatialTransform::from(outer).compose(&scale(2.0, "a", "b")).unwrap_err();
        assert!(matches!(err, TransformError::IncompatibleSpaceError(_)));

        // Mismatched labels alone are accepted by default
        assert!(field("x", "c").compose(&scale(2.0, "a", "b")).is_ok());
    }

    #[test]
    fn test_inverse_dispatch() {
        let inverse = scale(4.0, "a", "b").inverse().unwrap();
        assert_eq!(inverse.apply(&[[4.0, 8.0]]).unwrap(), vec![[1.0, 2.0]]);
        assert!(matches!(
            field("a", "b").inverse().unwrap_err(),
            TransformError::UnsupportedOperationError(_)
        ));
    }
}
