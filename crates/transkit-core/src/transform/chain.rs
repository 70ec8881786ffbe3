//! Transform chain implementation.
//!
//! A chain applies its members in order: T(x) = Tn(...T2(T1(x))).
//! Adjacent linear members are multiplied together when the chain is built;
//! dense fields are only collapsed on request via [`TransformChain::flatten`].

use std::sync::Arc;

use super::displacement_field::DisplacementFieldTransform;
use super::linear::LinearTransform;
use super::spatial::SpatialTransform;
use super::trait_::Transform;
use crate::config::Tolerance;
use crate::error::{Result, TransformError};
use crate::spatial::CoordinateSpace;

/// Ordered sequence of transforms, each mapping into the next one's source.
#[derive(Debug, Clone)]
pub struct TransformChain<const D: usize> {
    members: Vec<Arc<SpatialTransform<D>>>,
    source: CoordinateSpace<D>,
    target: CoordinateSpace<D>,
    tolerance: Tolerance,
}

impl<const D: usize> TransformChain<D> {
    /// Build a chain applied first to last.
    ///
    /// # Errors
    /// * `ConfigError` for an empty member list.
    /// * `IncompatibleSpaceError` when a member's source does not match the
    ///   previous member's target.
    pub fn new(members: Vec<SpatialTransform<D>>) -> Result<Self> {
        Self::with_tolerance(members, Tolerance::default())
    }

    /// Like [`TransformChain::new`] with explicit tolerances.
    pub fn with_tolerance(members: Vec<SpatialTransform<D>>, tolerance: Tolerance) -> Result<Self> {
        Self::from_shared(members.into_iter().map(Arc::new).collect(), tolerance)
    }

    /// Build a chain from shared members.
    pub fn from_shared(members: Vec<Arc<SpatialTransform<D>>>, tolerance: Tolerance) -> Result<Self> {
        let requested = members.len();
        let mut collapsed: Vec<Arc<SpatialTransform<D>>> = Vec::with_capacity(requested);

        for member in members {
            if let Some(previous) = collapsed.last_mut() {
                if !member.source().compatible_within(previous.target(), &tolerance) {
                    return Err(TransformError::incompatible(format!(
                        "Chain member maps from {} but the previous member maps to {}",
                        member.source(),
                        previous.target()
                    )));
                }
                let merged = match (previous.as_ref(), member.as_ref()) {
                    (SpatialTransform::Linear(first), SpatialTransform::Linear(second)) => {
                        Some(second.compose(first)?)
                    }
                    _ => None,
                };
                if let Some(merged) = merged {
                    *previous = Arc::new(SpatialTransform::Linear(merged));
                    continue;
                }
            }
            collapsed.push(member);
        }

        let (source, target) = match (collapsed.first(), collapsed.last()) {
            (Some(first), Some(last)) => (first.source().clone(), last.target().clone()),
            _ => return Err(TransformError::config("A transform chain needs at least one member")),
        };
        if collapsed.len() < requested {
            tracing::debug!(
                "Collapsed {} chain members into {}",
                requested,
                collapsed.len()
            );
        }

        Ok(Self {
            members: collapsed,
            source,
            target,
            tolerance,
        })
    }

    /// Members in application order.
    pub fn members(&self) -> &[Arc<SpatialTransform<D>>] {
        &self.members
    }

    /// Number of members after linear collapse.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false`: chains hold at least one member.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Tolerances.
    pub fn tolerance(&self) -> &Tolerance {
        &self.tolerance
    }

    /// True when every member (recursively) is linear.
    pub fn is_linear(&self) -> bool {
        self.members.iter().all(|m| m.is_linear())
    }

    /// A new chain with `transform` applied after the current members.
    pub fn append(&self, transform: SpatialTransform<D>) -> Result<Self> {
        let mut members = self.members.clone();
        members.push(Arc::new(transform));
        Self::from_shared(members, self.tolerance)
    }

    /// A new chain with `transform` applied before the current members.
    pub fn prepend(&self, transform: SpatialTransform<D>) -> Result<Self> {
        let mut members = Vec::with_capacity(self.members.len() + 1);
        members.push(Arc::new(transform));
        members.extend(self.members.iter().cloned());
        Self::from_shared(members, self.tolerance)
    }

    /// Reversed chain of member inverses.
    ///
    /// # Errors
    /// Propagates the first member inversion failure.
    pub fn inverse(&self) -> Result<Self> {
        let inverted = self
            .members
            .iter()
            .rev()
            .map(|m| m.inverse().map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        Self::from_shared(inverted, self.tolerance)
    }

    /// Product of all members when every member is linear.
    fn linearize(&self) -> Result<Option<LinearTransform<D>>> {
        let mut product: Option<LinearTransform<D>> = None;
        for member in &self.members {
            let next = match member.as_ref() {
                SpatialTransform::Linear(linear) => linear.clone(),
                SpatialTransform::Chain(chain) => match chain.linearize()? {
                    Some(linear) => linear,
                    None => return Ok(None),
                },
                SpatialTransform::Field(_) => return Ok(None),
            };
            product = Some(match product {
                Some(previous) => next.compose(&previous)?,
                None => next,
            });
        }
        Ok(product)
    }

    /// Collapse the chain into a single transform.
    ///
    /// An all-linear chain becomes one linear transform and `reference` is
    /// ignored. Otherwise the chain is sampled on the voxels of `reference`
    /// into a displacement field, exact at the voxels and interpolated
    /// between them.
    ///
    /// # Errors
    /// `ConfigError` when dense members are present and `reference` is
    /// missing or not a grid space.
    pub fn flatten(&self, reference: Option<&CoordinateSpace<D>>) -> Result<SpatialTransform<D>> {
        if let Some(linear) = self.linearize()? {
            return Ok(SpatialTransform::Linear(linear));
        }
        let reference = reference.filter(|r| r.is_grid()).ok_or_else(|| {
            TransformError::config("Flattening a chain with dense members requires a grid reference space")
        })?;
        tracing::debug!("Flattening {} chain members onto {}", self.len(), reference);
        let field = DisplacementFieldTransform::from_transform(reference.clone(), self)?
            .with_tolerance(self.tolerance);
        Ok(SpatialTransform::Field(field))
    }
}

impl<const D: usize> Transform<D> for TransformChain<D> {
    fn source(&self) -> &CoordinateSpace<D> {
        &self.source
    }

    fn target(&self) -> &CoordinateSpace<D> {
        &self.target
    }

    fn apply(&self, points: &[[f64; D]]) -> Result<Vec<[f64; D]>> {
        let mut current = points.to_vec();
        for member in &self.members {
            current = member.apply(&current)?;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::AffineMatrix;

    fn world(label: &str) -> CoordinateSpace<3> {
        CoordinateSpace::world(label).unwrap()
    }

    fn shift(offset: [f64; 3], from: &str, to: &str) -> SpatialTransform<3> {
        LinearTransform::translation(offset, world(from), world(to))
            .unwrap()
            .into()
    }

    fn grid(label: &str) -> CoordinateSpace<3> {
        CoordinateSpace::grid(label, [4, 4, 4], AffineMatrix::identity()).unwrap()
    }

    fn field(offset: [f64; 3]) -> SpatialTransform<3> {
        let values: Vec<f64> = (0..64).flat_map(|_| offset).collect();
        DisplacementFieldTransform::from_values(grid("scanner"), values, true)
            .unwrap()
            .with_spaces(world("scanner"), world("scanner"))
            .into()
    }

    #[test]
    fn test_linear_members_collapse() {
        let chain = TransformChain::new(vec![
            shift([1.0, 0.0, 0.0], "a", "b"),
            shift([0.0, 1.0, 0.0], "b", "c"),
        ])
        .unwrap();
        assert_eq!(chain.len(), 1);
        assert!(chain.is_linear());
        assert_eq!(chain.source().label(), "a");
        assert_eq!(chain.target().label(), "c");
        assert_eq!(chain.apply(&[[0.0, 0.0, 0.0]]).unwrap(), vec![[1.0, 1.0, 0.0]]);
    }

    #[test]
    fn test_fields_are_not_collapsed() {
        let chain = TransformChain::new(vec![
            shift([1.0, 0.0, 0.0], "a", "scanner"),
            field([0.0, 0.5, 0.0]),
            shift([0.0, 0.0, 1.0], "scanner", "c"),
        ])
        .unwrap();
        assert_eq!(chain.len(), 3);
        assert!(!chain.is_linear());
        assert_eq!(chain.apply(&[[1.0, 1.0, 1.0]]).unwrap(), vec![[2.0, 1.5, 2.0]]);
    }

    #[test]
    fn test_empty_chain_is_config_error() {
        let err = TransformChain::<3>::new(Vec::new()).unwrap_err();
        assert!(matches!(err, TransformError::ConfigError(_)));
    }

    #[test]
    fn test_adjacency_is_checked() {
        let moved = |shape: [usize; 3]| -> SpatialTransform<3> {
            let space = CoordinateSpace::grid("g", shape, AffineMatrix::identity()).unwrap();
            LinearTransform::translation([1.0, 0.0, 0.0], space.clone(), space)
                .unwrap()
                .into()
        };
        let err = TransformChain::new(vec![moved([4, 4, 4]), moved([5, 4, 4])]).unwrap_err();
        assert!(matches!(err, TransformError::IncompatibleSpaceError(_)));

        // World labels only have to agree when asked for
        let members = vec![
            shift([1.0, 0.0, 0.0], "a", "b"),
            shift([0.0, 1.0, 0.0], "x", "c"),
        ];
        assert!(TransformChain::new(members.clone()).is_ok());
        let strict = Tolerance::new().with_label_matching(true);
        let err = TransformChain::with_tolerance(members, strict).unwrap_err();
        assert!(matches!(err, TransformError::IncompatibleSpaceError(_)));
    }

    #[test]
    fn test_append_prepend() {
        let strict = Tolerance::new().with_label_matching(true);
        let chain = TransformChain::with_tolerance(vec![field([0.0, 0.5, 0.0])], strict).unwrap();
        let chain = chain.append(shift([1.0, 0.0, 0.0], "scanner", "out")).unwrap();
        let chain = chain.prepend(shift([0.0, 0.0, 1.0], "in", "scanner")).unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.source().label(), "in");
        assert_eq!(chain.target().label(), "out");
        assert!(chain.append(shift([1.0, 0.0, 0.0], "nowhere", "out")).is_err());
    }

    #[test]
    fn test_inverse_reverses_members() {
        let chain = TransformChain::new(vec![
            shift([1.0, 0.0, 0.0], "a", "b"),
            SpatialTransform::Chain(
                TransformChain::new(vec![shift([0.0, 2.0, 0.0], "b", "c")]).unwrap(),
            ),
        ])
        .unwrap();
        let inverse = chain.inverse().unwrap();
        assert_eq!(inverse.source().label(), "c");
        assert_eq!(inverse.target().label(), "a");
        let p = [[0.5, 0.5, 0.5]];
        let back = inverse.apply(&chain.apply(&p).unwrap()).unwrap();
        assert_eq!(back, p.to_vec());
    }

    #[test]
    fn test_flatten_linear() {
        let inner = TransformChain::new(vec![shift([0.0, 2.0, 0.0], "b", "c")]).unwrap();
        let chain = TransformChain::new(vec![
            shift([1.0, 0.0, 0.0], "a", "b"),
            SpatialTransform::Chain(inner),
        ])
        .unwrap();
        let flat = chain.flatten(None).unwrap();
        assert!(flat.is_linear());
        assert_eq!(flat.apply(&[[0.0, 0.0, 0.0]]).unwrap(), vec![[1.0, 2.0, 0.0]]);
    }

    #[test]
    fn test_flatten_field_requires_grid() {
        let chain = TransformChain::new(vec![field([0.0, 0.5, 0.0])]).unwrap();
        assert!(matches!(
            chain.flatten(None).unwrap_err(),
            TransformError::ConfigError(_)
        ));
        assert!(matches!(
            chain.flatten(Some(&world("scanner"))).unwrap_err(),
            TransformError::ConfigError(_)
        ));

        let flat = chain.flatten(Some(&grid("scanner"))).unwrap();
        let points = [[1.0, 2.0, 3.0], [0.0, 0.0, 0.0]];
        assert_eq!(flat.apply(&points).unwrap(), chain.apply(&points).unwrap());
    }

    #[test]
    fn test_flattened_field_is_exact_outside_the_grid() {
        let chain = TransformChain::new(vec![
            shift([1.0, 0.0, 0.0], "a", "scanner"),
            field([0.0, 0.5, 0.0]),
        ])
        .unwrap();
        let flat = chain.flatten(Some(&grid("scanner"))).unwrap();
        let flat = flat.as_field().unwrap();
        assert!(flat.fallback().is_some());

        // (10, 0, 0) lies outside the 4x4x4 reference grid
        let points = [[10.0, 0.0, 0.0]];
        assert_eq!(flat.apply(&points).unwrap(), chain.apply(&points).unwrap());
        assert_eq!(flat.apply(&points).unwrap(), vec![[11.0, 0.0, 0.0]]);
    }
}
