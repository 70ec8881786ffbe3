//! Error types for transform construction, composition and application.
//!
//! Every error is raised where it is detected and handed back to the caller
//! unchanged. Out-of-bounds samples are not errors unless a field was
//! configured with [`ExtrapolationPolicy::Error`](crate::config::ExtrapolationPolicy::Error).

use thiserror::Error;

/// Main error type for transform operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// Malformed space or transform construction.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Composition or application across mismatched spaces.
    #[error("Incompatible spaces: {0}")]
    IncompatibleSpaceError(String),

    /// A linear transform whose linear block cannot be inverted.
    #[error("Singular transform: |det| = {determinant:e} is below tolerance {tolerance:e}")]
    SingularTransformError { determinant: f64, tolerance: f64 },

    /// Operation with no exact implementation for this transform.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperationError(String),

    /// Points outside a dense field domain under the `Error` policy.
    #[error("{count} point(s) fall outside the field domain")]
    OutOfDomainError { count: usize },

    /// Iterative field inversion did not reach its tolerance.
    #[error("Field inversion did not converge after {iterations} iterations (residual {residual:e})")]
    NotConvergedError { iterations: usize, residual: f64 },

    /// Tensor data that cannot be read back as host values.
    #[error("Tensor data error: {0}")]
    TensorDataError(String),
}

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;

impl TransformError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create an incompatible space error.
    pub fn incompatible(msg: impl Into<String>) -> Self {
        Self::IncompatibleSpaceError(msg.into())
    }

    /// Create an unsupported operation error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperationError(msg.into())
    }

    /// Create a tensor data error.
    pub fn tensor_data(msg: impl Into<String>) -> Self {
        Self::TensorDataError(msg.into())
    }
}

/// Fail with [`TransformError::ConfigError`] unless `D` is 2 or 3.
pub(crate) fn check_dimensionality<const D: usize>() -> Result<()> {
    if D == 2 || D == 3 {
        Ok(())
    } else {
        Err(TransformError::config(format!(
            "Only 2-D and 3-D spaces are supported, got {}-D",
            D
        )))
    }
}
