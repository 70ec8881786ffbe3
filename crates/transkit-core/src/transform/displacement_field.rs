//! Displacement field transform implementation.
//!
//! This module provides a dense, non-linear transform stored per voxel of a
//! reference grid. Each voxel holds either a displacement (added to the input
//! world coordinate) or an absolute destination world coordinate. Between
//! voxels the field is interpolated with the tensor kernels of
//! [`crate::interpolation`], evaluated in double precision on [`HostBackend`].

use std::sync::Arc;

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

use super::chain::TransformChain;
use super::spatial::SpatialTransform;
use super::trait_::Transform;
use crate::config::{ExtrapolationPolicy, FieldOptions, Tolerance};
use crate::error::{Result, TransformError};
use crate::interpolation::{inside_mask, Boundary, SampledVolume};
use crate::spatial::{points_from_tensor, points_to_tensor, CoordinateSpace, ImageGrid};

/// Backend dense fields are stored and evaluated on.
pub type HostBackend = burn_ndarray::NdArray<f64>;

/// Out-of-domain bookkeeping for one field evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldReport {
    /// Points outside the reference grid that the extrapolation policy handled.
    pub out_of_domain: usize,
}

/// Dense displacement (or coordinate) field transform.
///
/// The field array has shape `grid_shape × D`, row-major with the component
/// axis last. Component `c` is the `c`-th world axis.
///
/// A field sampled from another transform ([`from_transform`], [`compose`])
/// keeps that transform and evaluates it exactly for points outside the
/// reference grid, ahead of the extrapolation policy.
///
/// [`from_transform`]: DisplacementFieldTransform::from_transform
/// [`compose`]: DisplacementFieldTransform::compose
#[derive(Debug, Clone)]
pub struct DisplacementFieldTransform<const D: usize> {
    reference: CoordinateSpace<D>,
    grid: ImageGrid<D>,
    values: Arc<[f64]>,
    components: Vec<SampledVolume<HostBackend, D>>,
    displacement: bool,
    source: CoordinateSpace<D>,
    target: CoordinateSpace<D>,
    options: FieldOptions,
    tolerance: Tolerance,
    fallback: Option<Arc<SpatialTransform<D>>>,
}

impl<const D: usize> DisplacementFieldTransform<D> {
    /// Create a field transform from tensor data of shape `grid_shape × D`.
    ///
    /// # Arguments
    /// * `reference` - Grid space the field is sampled on
    /// * `field` - Field values, component axis last
    /// * `is_displacement` - `true` for displacements, `false` for absolute coordinates
    ///
    /// # Errors
    /// `ConfigError` if `reference` is not a grid space or the data shape does
    /// not match exactly.
    pub fn new(reference: CoordinateSpace<D>, field: TensorData, is_displacement: bool) -> Result<Self> {
        let grid = reference_grid(&reference)?;
        let mut expected = grid.shape().to_vec();
        expected.push(D);
        if field.shape != expected {
            return Err(TransformError::config(format!(
                "Field shape {:?} does not match grid shape x components {:?}",
                field.shape, expected
            )));
        }
        let values = field
            .convert::<f64>()
            .to_vec::<f64>()
            .map_err(|e| TransformError::tensor_data(format!("{e:?}")))?;
        Self::from_values(reference, values, is_displacement)
    }

    /// Create a field transform from a tensor of rank `D + 1`.
    pub fn from_tensor<B: Backend, const R: usize>(
        reference: CoordinateSpace<D>,
        field: Tensor<B, R>,
        is_displacement: bool,
    ) -> Result<Self> {
        Self::new(reference, field.into_data(), is_displacement)
    }

    /// Create a field transform from interleaved host values
    /// (`nvox × D`, voxel-major).
    pub fn from_values(
        reference: CoordinateSpace<D>,
        values: Vec<f64>,
        is_displacement: bool,
    ) -> Result<Self> {
        let grid = reference_grid(&reference)?;
        if values.len() != grid.nvox() * D {
            return Err(TransformError::config(format!(
                "Expected {} field values for grid {:?}, got {}",
                grid.nvox() * D,
                grid.shape(),
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(TransformError::config("Field values must be finite"));
        }
        let options = FieldOptions::default();
        let components = build_components(&values, &grid, &options)?;
        Ok(Self {
            source: reference.clone(),
            target: reference.clone(),
            reference,
            grid,
            values: values.into(),
            components,
            displacement: is_displacement,
            options,
            tolerance: Tolerance::default(),
            fallback: None,
        })
    }

    /// Create a zero displacement field (the identity) on `reference`.
    pub fn zeros(reference: CoordinateSpace<D>) -> Result<Self> {
        let nvox = reference_grid(&reference)?.nvox();
        Self::from_values(reference, vec![0.0; nvox * D], true)
    }

    /// Sample any transform over the voxels of `reference` and store the
    /// result as a displacement field.
    ///
    /// Exact at grid voxels and outside the grid, where `transform` itself is
    /// evaluated; between voxels the result is interpolated, so it only
    /// approximates the sampled transform.
    pub fn from_transform<T>(reference: CoordinateSpace<D>, transform: &T) -> Result<Self>
    where
        T: Transform<D> + Clone + Into<SpatialTransform<D>>,
    {
        let grid = reference_grid(&reference)?;
        let device = Default::default();
        let coords = grid.world_tensor::<HostBackend>(0..grid.nvox(), &device);
        let mapped = transform.transform_points(coords.clone())?;
        let values = (mapped - coords)
            .into_data()
            .to_vec::<f64>()
            .map_err(|e| TransformError::tensor_data(format!("{e:?}")))?;

        let mut field = Self::from_values(reference, values, true)?
            .with_spaces(transform.source().clone(), transform.target().clone());
        field.fallback = Some(Arc::new(transform.clone().into()));
        Ok(field)
    }

    /// Replace the evaluation options.
    ///
    /// # Errors
    /// `TensorDataError` when re-preparing the components for a new order fails.
    pub fn with_options(mut self, options: FieldOptions) -> Result<Self> {
        if options.order != self.options.order {
            self.components = build_components(&self.values, &self.grid, &options)?;
        }
        self.options = options;
        Ok(self)
    }

    /// Declare the source and target spaces (both default to the reference).
    pub fn with_spaces(mut self, source: CoordinateSpace<D>, target: CoordinateSpace<D>) -> Self {
        self.source = source;
        self.target = target;
        self
    }

    /// Replace the tolerances used for space checks.
    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// The reference grid space.
    pub fn reference(&self) -> &CoordinateSpace<D> {
        &self.reference
    }

    /// The reference voxel grid.
    pub fn grid(&self) -> &ImageGrid<D> {
        &self.grid
    }

    /// `true` when values are displacements, `false` for absolute coordinates.
    pub fn is_displacement(&self) -> bool {
        self.displacement
    }

    /// Evaluation options.
    pub fn options(&self) -> &FieldOptions {
        &self.options
    }

    /// Tolerances.
    pub fn tolerance(&self) -> &Tolerance {
        &self.tolerance
    }

    /// The exact transform evaluated outside the grid, if this field was
    /// sampled from one.
    pub fn fallback(&self) -> Option<&SpatialTransform<D>> {
        self.fallback.as_deref()
    }

    /// Field values as tensor data of shape `grid_shape × D`.
    pub fn field_data(&self) -> TensorData {
        let mut shape = self.grid.shape().to_vec();
        shape.push(D);
        TensorData::new(self.values.to_vec(), shape)
    }

    /// Field values as a tensor of rank `R = D + 1`.
    pub fn to_tensor<B: Backend, const R: usize>(&self, device: &B::Device) -> Result<Tensor<B, R>> {
        if R != D + 1 {
            return Err(TransformError::config(format!(
                "A {}-D field is a rank {} tensor, not rank {}",
                D,
                D + 1,
                R
            )));
        }
        Ok(Tensor::<B, R>::from_data(self.field_data(), device))
    }

    /// Map points and report how many fell outside the reference grid.
    ///
    /// # Errors
    /// `OutOfDomainError` under [`ExtrapolationPolicy::Error`] when any point
    /// is outside the grid and the field has no exact fallback.
    pub fn apply_with_report(&self, points: &[[f64; D]]) -> Result<(Vec<[f64; D]>, FieldReport)> {
        let mut report = FieldReport::default();
        if points.is_empty() {
            return Ok((Vec::new(), report));
        }

        let device = Default::default();
        let world = points_to_tensor::<HostBackend, D>(points, &device);
        let indices = self.grid.world_to_index_tensor(world.clone());
        let inside = inside_mask(&indices, &self.grid.shape())
            .into_data()
            .to_vec::<f64>()
            .map_err(|e| TransformError::tensor_data(format!("{e:?}")))?;
        let mapped = points_from_tensor::<HostBackend, D>(self.evaluate(world, indices))?;

        let policy = self.options.extrapolation;
        let mut outside = Vec::new();
        let mapped: Vec<[f64; D]> = mapped
            .into_iter()
            .zip(points)
            .enumerate()
            .map(|(k, (value, point))| {
                let clamps = policy == ExtrapolationPolicy::Clamp && self.fallback.is_none();
                if inside[k] > 0.5 || clamps {
                    value
                } else {
                    outside.push(k);
                    *point
                }
            })
            .collect();
        if outside.is_empty() {
            return Ok((mapped, report));
        }

        if let Some(fallback) = &self.fallback {
            let strays: Vec<[f64; D]> = outside.iter().map(|&k| points[k]).collect();
            let exact = fallback.apply(&strays)?;
            tracing::debug!(
                "{} point(s) outside the field grid of {} evaluated exactly",
                outside.len(),
                self.reference
            );
            let mut mapped = mapped;
            for (k, q) in outside.into_iter().zip(exact) {
                mapped[k] = q;
            }
            return Ok((mapped, report));
        }

        report.out_of_domain = outside.len();
        if policy == ExtrapolationPolicy::Error {
            return Err(TransformError::OutOfDomainError {
                count: report.out_of_domain,
            });
        }
        tracing::warn!(
            "{} of {} point(s) outside the field grid of {} were passed through unchanged",
            report.out_of_domain,
            points.len(),
            self.reference
        );
        Ok((mapped, report))
    }

    /// Field values at `indices`, clamped to the grid edge.
    fn sample(&self, indices: Tensor<HostBackend, 2>) -> Tensor<HostBackend, 2> {
        let columns: Vec<Tensor<HostBackend, 2>> = self
            .components
            .iter()
            .map(|component| component.sample(indices.clone()).unsqueeze_dim::<2>(1))
            .collect();
        Tensor::cat(columns, 1)
    }

    /// Mapped positions of `world`, whose grid indices are `indices`.
    fn evaluate(&self, world: Tensor<HostBackend, 2>, indices: Tensor<HostBackend, 2>) -> Tensor<HostBackend, 2> {
        let value = self.sample(indices);
        if self.displacement {
            world + value
        } else {
            value
        }
    }

    /// Displacement `f(x) - x` at `world`, clamped to the grid edge.
    fn displacement_at(&self, world: Tensor<HostBackend, 2>) -> Tensor<HostBackend, 2> {
        let indices = self.grid.world_to_index_tensor(world.clone());
        let value = self.sample(indices);
        if self.displacement {
            value
        } else {
            value - world
        }
    }

    /// Approximate inverse on the same reference grid.
    ///
    /// For every grid voxel `y` the fixed point of `x ← y − u(x)` is found,
    /// where `u` is the displacement; all voxels iterate together. The
    /// iteration converges when the field is a contraction (`|∇u| < 1`),
    /// which holds for the smooth, diffeomorphic warps registration tools
    /// produce.
    ///
    /// # Errors
    /// * `UnsupportedOperationError` when no [`FieldInversion`](crate::config::FieldInversion)
    ///   is configured.
    /// * `NotConvergedError` when the voxels have not converged after `max_iterations`.
    pub fn inverse(&self) -> Result<Self> {
        let solver = self.options.inversion.ok_or_else(|| {
            TransformError::unsupported(
                "Dense field inversion has no closed form; configure FieldOptions::inversion \
                 to use the iterative solver",
            )
        })?;

        let device = Default::default();
        let y = self.grid.world_tensor::<HostBackend>(0..self.grid.nvox(), &device);
        let mut x = y.clone();
        let mut residual = f64::INFINITY;
        let mut iterations = 0;
        while residual > solver.tolerance {
            if iterations == solver.max_iterations {
                tracing::warn!(
                    "Field inversion stopped after {} iterations with residual {:e}",
                    iterations,
                    residual
                );
                return Err(TransformError::NotConvergedError {
                    iterations,
                    residual,
                });
            }
            let next = y.clone() - self.displacement_at(x.clone());
            residual = (next.clone() - x).abs().max().into_scalar();
            x = next;
            iterations += 1;
        }
        tracing::debug!(
            "Inverted field on {:?} in {} iterations, residual {:e}",
            self.grid.shape(),
            iterations,
            residual
        );

        let values = (x - y)
            .into_data()
            .to_vec::<f64>()
            .map_err(|e| TransformError::tensor_data(format!("{e:?}")))?;
        Ok(Self::from_values(self.reference.clone(), values, true)?
            .with_options(self.options)?
            .with_tolerance(self.tolerance)
            .with_spaces(self.target.clone(), self.source.clone()))
    }

    /// `self ∘ other` resampled on this field's reference grid.
    ///
    /// The result is exact at the grid voxels and outside the grid, and
    /// interpolated between voxels, so it carries resampling error.
    ///
    /// # Errors
    /// `IncompatibleSpaceError` unless `self.source` matches `other.target`.
    pub fn compose<T>(&self, other: &T) -> Result<Self>
    where
        T: Transform<D> + Clone + Into<SpatialTransform<D>>,
    {
        let exact = TransformChain::with_tolerance(
            vec![other.clone().into(), self.clone().into()],
            self.tolerance,
        )?;
        Self::from_transform(self.reference.clone(), &exact)?
            .with_options(self.options)
            .map(|field| field.with_tolerance(self.tolerance))
    }
}

impl<const D: usize> Transform<D> for DisplacementFieldTransform<D> {
    fn source(&self) -> &CoordinateSpace<D> {
        &self.source
    }

    fn target(&self) -> &CoordinateSpace<D> {
        &self.target
    }

    fn apply(&self, points: &[[f64; D]]) -> Result<Vec<[f64; D]>> {
        self.apply_with_report(points).map(|(mapped, _)| mapped)
    }
}

fn reference_grid<const D: usize>(reference: &CoordinateSpace<D>) -> Result<ImageGrid<D>> {
    reference.image_grid().cloned().ok_or_else(|| {
        TransformError::config(format!(
            "Dense field reference {} must be a grid space",
            reference
        ))
    })
}

fn build_components<const D: usize>(
    values: &[f64],
    grid: &ImageGrid<D>,
    options: &FieldOptions,
) -> Result<Vec<SampledVolume<HostBackend, D>>> {
    let device = Default::default();
    let interleaved =
        Tensor::<HostBackend, 2>::from_data(TensorData::new(values.to_vec(), [grid.nvox(), D]), &device);
    (0..D)
        .map(|c| {
            let component = interleaved.clone().narrow(1, c, 1).reshape(grid.shape());
            SampledVolume::new(component, options.order, Boundary::Nearest, true)
        })
        .collect()
}
