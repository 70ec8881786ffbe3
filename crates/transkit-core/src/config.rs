//! Numeric tolerances and evaluation options.
//!
//! All values here are passed explicitly to the constructors that use them.
//! Nothing in the crate reads process-wide tolerance state.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransformError};
use crate::interpolation::Boundary;

/// Numeric tolerances used for singularity and equality checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// A linear block with `|det| < singular` is treated as non-invertible.
    pub singular: f64,
    /// Relative tolerance for matrix and grid equality.
    pub equality: f64,
    /// Also require equal labels when comparing spaces. Off by default:
    /// only grid geometry is compared.
    #[serde(default)]
    pub match_labels: bool,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            singular: 1e-10,
            equality: 1e-5,
            match_labels: false,
        }
    }
}

impl Tolerance {
    /// Create a tolerance set with the default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the determinant threshold for singular matrices.
    pub fn with_singular(mut self, singular: f64) -> Self {
        self.singular = singular;
        self
    }

    /// Set the relative equality tolerance.
    pub fn with_equality(mut self, equality: f64) -> Self {
        self.equality = equality;
        self
    }

    /// Require equal labels in space compatibility checks.
    pub fn with_label_matching(mut self, match_labels: bool) -> Self {
        self.match_labels = match_labels;
        self
    }

    /// Relative closeness test used for matrix entries.
    pub fn close(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.equality * (1.0 + a.abs().max(b.abs()))
    }
}

/// Interpolation order used to sample gridded data at fractional indices.
///
/// Orders 2 to 5 are B-splines of that degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationOrder {
    /// Order 0.
    Nearest,
    /// Order 1 (bilinear / trilinear).
    #[default]
    Linear,
    Quadratic,
    Cubic,
    Quartic,
    Quintic,
}

impl InterpolationOrder {
    /// Polynomial degree of the interpolating kernel.
    pub fn degree(&self) -> usize {
        match self {
            Self::Nearest => 0,
            Self::Linear => 1,
            Self::Quadratic => 2,
            Self::Cubic => 3,
            Self::Quartic => 4,
            Self::Quintic => 5,
        }
    }

    /// The order with the given degree.
    ///
    /// # Errors
    /// `ConfigError` for degrees above 5.
    pub fn from_degree(degree: usize) -> Result<Self> {
        match degree {
            0 => Ok(Self::Nearest),
            1 => Ok(Self::Linear),
            2 => Ok(Self::Quadratic),
            3 => Ok(Self::Cubic),
            4 => Ok(Self::Quartic),
            5 => Ok(Self::Quintic),
            _ => Err(TransformError::config(format!(
                "Spline order must be between 0 and 5, got {}",
                degree
            ))),
        }
    }

    /// True for orders that sample prefiltered spline coefficients.
    pub fn is_spline(&self) -> bool {
        self.degree() >= 2
    }
}

/// What a dense field does with points outside its reference grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtrapolationPolicy {
    /// Return the input point unchanged and log a warning.
    #[default]
    Identity,
    /// Evaluate the field at the nearest grid edge.
    Clamp,
    /// Fail with `OutOfDomainError`.
    Error,
}

/// Fixed-point solver settings for approximate dense-field inversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldInversion {
    /// Maximum coordinate change (world units) accepted as converged.
    pub tolerance: f64,
    /// Iteration cap for the whole grid.
    pub max_iterations: usize,
}

impl Default for FieldInversion {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 200,
        }
    }
}

/// Evaluation options carried by a dense field transform.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldOptions {
    pub order: InterpolationOrder,
    pub extrapolation: ExtrapolationPolicy,
    /// `None` makes `inverse()` fail with `UnsupportedOperationError`.
    pub inversion: Option<FieldInversion>,
}

impl FieldOptions {
    /// Create field options with the default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interpolation order.
    pub fn with_order(mut self, order: InterpolationOrder) -> Self {
        self.order = order;
        self
    }

    /// Set the extrapolation policy.
    pub fn with_extrapolation(mut self, extrapolation: ExtrapolationPolicy) -> Self {
        self.extrapolation = extrapolation;
        self
    }

    /// Enable approximate inversion with the given solver settings.
    pub fn with_inversion(mut self, inversion: FieldInversion) -> Self {
        self.inversion = Some(inversion);
        self
    }
}

/// Value assigned to output voxels that map outside the source image.
///
/// Every mode except `Constant` folds the sample index back onto the grid.
/// With samples `a b c d`:
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FillMode {
    /// A constant value.
    Constant(f64),
    /// The value at the nearest source voxel (`a a | a b c d | d d`).
    Nearest,
    /// Whole-sample symmetric extension (`c b | a b c d | c b`).
    Mirror,
    /// Half-sample symmetric extension (`b a | a b c d | d c`).
    Reflect,
    /// Periodic extension (`c d | a b c d | a b`).
    Wrap,
}

impl FillMode {
    /// How sample indices are folded onto the grid under this mode.
    pub fn boundary(&self) -> Boundary {
        match self {
            Self::Constant(_) | Self::Nearest => Boundary::Nearest,
            Self::Mirror => Boundary::Mirror,
            Self::Reflect => Boundary::Reflect,
            Self::Wrap => Boundary::Wrap,
        }
    }
}

impl Default for FillMode {
    fn default() -> Self {
        Self::Constant(0.0)
    }
}

/// Resampling options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResampleOptions {
    pub order: InterpolationOrder,
    /// Run the spline prefilter before spline interpolation.
    pub prefilter: bool,
    pub fill: FillMode,
    /// Number of output voxels evaluated per block.
    pub block_size: usize,
    /// Distribute blocks over the rayon thread pool.
    pub parallel: bool,
}

impl Default for ResampleOptions {
    fn default() -> Self {
        Self {
            order: InterpolationOrder::Cubic,
            prefilter: true,
            fill: FillMode::default(),
            block_size: 65_536,
            parallel: true,
        }
    }
}

impl ResampleOptions {
    /// Create resampling options with the default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interpolation order.
    pub fn with_order(mut self, order: InterpolationOrder) -> Self {
        self.order = order;
        self
    }

    /// Enable or disable the spline prefilter.
    pub fn with_prefilter(mut self, prefilter: bool) -> Self {
        self.prefilter = prefilter;
        self
    }

    /// Set a constant fill value for out-of-bounds voxels.
    pub fn with_fill_value(mut self, value: f64) -> Self {
        self.fill = FillMode::Constant(value);
        self
    }

    /// Set the out-of-bounds fill mode.
    pub fn with_fill(mut self, fill: FillMode) -> Self {
        self.fill = fill;
        self
    }

    /// Set the number of voxels per block.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Evaluate blocks sequentially on the calling thread.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}
