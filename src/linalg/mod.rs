//! Sparse linear algebra for the damped normal equations.
//!
//! The optimizer only ever hands the solver the lower triangle of the Gauss-Newton Hessian
//! `H = JᵀJ` together with `rhs = Jᵀr`. Each step solves
//!
//! ```text
//! (H + λ·D)·dx = -rhs,    D = diag(max(H_ii, diagonal_min))
//! ```
//!
//! and marginal covariances come from solving `H·X = E` against the undamped factorization for
//! only the requested columns of the identity.

pub mod cholesky;
pub mod covariance;

use faer::{Mat, sparse::SparseColMat};
use thiserror::Error;
use tracing::error;

pub use cholesky::SparseCholeskySolver;
pub use covariance::{CovarianceBlock, compute_covariance_blocks};

/// Linear algebra specific error types
#[derive(Debug, Clone, Error)]
pub enum LinAlgError {
    /// Matrix factorization failed (symbolic or numeric)
    #[error("Matrix factorization failed: {0}")]
    FactorizationFailed(String),

    /// Matrix is not positive definite
    #[error("Singular or indefinite matrix detected (Cholesky factorization failed)")]
    SingularMatrix,

    /// Failed to create sparse matrix from triplets
    #[error("Failed to create sparse matrix: {0}")]
    SparseMatrixCreation(String),

    /// Operation called with inconsistent inputs or before a factorization exists
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl LinAlgError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// operation()
    ///     .map_err(|e| LinAlgError::from(e).log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error with the original source error from a third-party library
    ///
    /// This method logs both the LinAlgError and the underlying error
    /// from external libraries (e.g., faer's FaerError, LltError, CreationError).
    ///
    /// # Example
    /// ```ignore
    /// SymbolicLlt::try_new(matrix.symbolic(), Side::Lower)
    ///     .map_err(|e| {
    ///         LinAlgError::FactorizationFailed(
    ///             "Symbolic Cholesky decomposition failed".to_string()
    ///         )
    ///         .log_with_source(e)
    ///     })?;
    /// ```
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for linear algebra operations
pub type LinAlgResult<T> = Result<T, LinAlgError>;

/// Solver for symmetric positive definite systems given by their lower triangle.
pub trait SparseLinearSolver {
    /// Solve `(H + λ·D)·dx = -rhs` with `D = diag(max(H_ii, diagonal_min))`.
    ///
    /// # Errors
    /// Returns `LinAlgError` if the damped matrix cannot be factorized.
    fn solve_damped(
        &mut self,
        hessian_lower: &SparseColMat<usize, f64>,
        rhs: &Mat<f64>,
        lambda: f64,
        diagonal_min: f64,
    ) -> LinAlgResult<Mat<f64>>;

    /// Factorize the undamped `H` and keep the factorization for [`solve_factorized`].
    ///
    /// [`solve_factorized`]: SparseLinearSolver::solve_factorized
    fn factorize(&mut self, hessian_lower: &SparseColMat<usize, f64>) -> LinAlgResult<()>;

    /// Solve `A·X = B` with the most recent factorization.
    fn solve_factorized(&self, b: &Mat<f64>) -> LinAlgResult<Mat<f64>>;

    /// Drop cached factorizations, e.g. after the sparsity pattern changed.
    fn reset(&mut self);
}
