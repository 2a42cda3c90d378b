//! Factors: residual functions over a subset of keys, with their local linearization.
//!
//! A factor reads the variables named by its [`Factor::keys`] from a [`Values`] store and
//! produces a residual vector `r` and its Jacobian `J` with respect to the concatenated tangent
//! spaces of those variables (in key order). From these the Gauss-Newton quantities are built:
//!
//! ```text
//! H = Jᵀ·J     (only the lower triangle is kept)
//! rhs = Jᵀ·r
//! ```
//!
//! # Construction variants
//!
//! - [`HessianFactor`]: the user function returns `(r, J, H, rhs)` directly, e.g. from generated
//!   code that already computes the Gauss-Newton terms.
//! - [`JacobianFactor`]: the user function returns `(r, J)` and `H`/`rhs` are derived.
//!   [`JacobianFactor::from_residual`] additionally derives `J` by central differences.
//!
//! Both implement the same [`Factor`] trait, so the optimizer never needs to know which
//! variant it is holding.
//!
//! # Example
//!
//! ```
//! use nalgebra::{DMatrix, DVector};
//! use symopt::core::key::Key;
//! use symopt::core::values::Values;
//! use symopt::factors::{Factor, JacobianFactor};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let x = Key::new('x');
//! // r(x) = cos(x / 2), minimized at x = pi
//! let factor = JacobianFactor::new(vec![x], |values, index| {
//!     let x: f64 = values.at_entry(&index.entries[0])?;
//!     Ok((
//!         DVector::from_element(1, (x / 2.0).cos()),
//!         DMatrix::from_element(1, 1, -0.5 * (x / 2.0).sin()),
//!     ))
//! })?;
//!
//! let mut values = Values::new();
//! values.set(x, 3.0);
//! let linearized = factor.linearized_factor(&values)?;
//! assert_eq!(linearized.residual.len(), 1);
//! # Ok(())
//! # }
//! ```

use nalgebra::{DMatrix, DVector};
use thiserror::Error;
use tracing::error;

use crate::core::CoreError;
use crate::core::index::Index;
use crate::core::key::Key;
use crate::core::values::Values;

pub mod hessian_factor;
pub mod jacobian_factor;
pub mod numerical;
pub mod reprojection;

pub use hessian_factor::HessianFactor;
pub use jacobian_factor::JacobianFactor;

/// Factor-specific error types
#[derive(Debug, Clone, Error)]
pub enum FactorError {
    /// Factor output has an unexpected shape
    #[error("Invalid {what} dimension: expected {expected}, got {actual}")]
    InvalidDimension {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// User residual function failed
    #[error("Factor evaluation failed: {0}")]
    Evaluation(String),

    /// Analytic Jacobian disagrees with the numerical one
    #[error("Jacobian mismatch for factor on [{keys}]: max abs difference {max_difference:.3e}")]
    DerivativeMismatch { keys: String, max_difference: f64 },

    /// The same key appears twice in one factor
    #[error("Duplicate key {0} in factor")]
    DuplicateKey(Key),

    /// Reading variables from the store failed
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl FactorError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// check_shape(&jacobian)
    ///     .map_err(|e| e.log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error with the original source error for debugging context
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for factor operations
pub type FactorResult<T> = Result<T, FactorError>;

/// Local linearization of one factor at a given point.
///
/// `jacobian` has one row per residual and one column per tangent dimension of the factor's
/// keys (in key order). `hessian` only carries meaningful values in its lower triangle.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearizedFactor {
    pub residual: DVector<f64>,
    pub jacobian: DMatrix<f64>,
    pub hessian: DMatrix<f64>,
    pub rhs: DVector<f64>,
    /// Layout of the factor's keys in the `Values` it was evaluated on
    pub index: Index,
}

impl LinearizedFactor {
    /// `½‖r‖²`
    pub fn error(&self) -> f64 {
        0.5 * self.residual.norm_squared()
    }

    /// Check that all blocks agree with the residual and tangent dimensions.
    pub fn validate(&self) -> FactorResult<()> {
        let rows = self.residual.len();
        let cols = self.index.tangent_dim;
        check_dim("jacobian rows", rows, self.jacobian.nrows())?;
        check_dim("jacobian cols", cols, self.jacobian.ncols())?;
        check_dim("hessian rows", cols, self.hessian.nrows())?;
        check_dim("hessian cols", cols, self.hessian.ncols())?;
        check_dim("rhs", cols, self.rhs.len())
    }
}

pub(crate) fn check_dim(what: &'static str, expected: usize, actual: usize) -> FactorResult<()> {
    if expected != actual {
        return Err(FactorError::InvalidDimension {
            what,
            expected,
            actual,
        }
        .log());
    }
    Ok(())
}

/// Capability shared by every factor: produce a local linearization at given values.
///
/// # Thread Safety
///
/// Factors must be `Send + Sync`; the optimizer may linearize them in parallel.
pub trait Factor: Send + Sync {
    /// Keys this factor reads, defining its Jacobian column order.
    fn keys(&self) -> &[Key];

    /// Residual and Jacobian at `values`.
    fn linearize(&self, values: &Values) -> FactorResult<(DVector<f64>, DMatrix<f64>)>;

    /// Full local linearization record at `values`.
    fn linearized_factor(&self, values: &Values) -> FactorResult<LinearizedFactor>;
}

/// Reject factors that list the same key twice.
pub(crate) fn check_unique_keys(keys: &[Key]) -> FactorResult<()> {
    for (i, key) in keys.iter().enumerate() {
        if keys[..i].contains(key) {
            return Err(FactorError::DuplicateKey(*key).log());
        }
    }
    Ok(())
}

/// Comma separated key list, used in log and error messages.
pub(crate) fn format_keys(keys: &[Key]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
