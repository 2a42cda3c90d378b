//! Error types for the symopt library
//!
//! # Error Hierarchy
//!
//! - **`SymOptError`** is the top-level error returned by public APIs
//! - **Module errors** (`CoreError`, `FactorError`, `OptimizerError`, ...) are wrapped inside it
//! - **Error sources** are preserved, so the full chain can be inspected
//!
//! Example error chain:
//! ```text
//! SymOptError::Factor(
//!     FactorError::Core(
//!         CoreError::NotFound(x_1)
//!     )
//! )
//! ```
//!
//! Non-convergence is not an error: it is reported through
//! [`OptimizationStatus`](crate::optimizer::OptimizationStatus).

use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    core::CoreError, factors::FactorError, linalg::LinAlgError, manifold::ManifoldError,
    optimizer::OptimizerError,
};

/// Main result type used throughout the symopt library
pub type SymOptResult<T> = Result<T, SymOptError>;

/// Main error type for the symopt library
///
/// ```rust,ignore
/// if let Err(e) = optimizer.optimize(&mut values) {
///     warn!("Full chain: {}", e.chain());
/// }
/// ```
#[derive(Debug, Error)]
pub enum SymOptError {
    /// Variable storage, indexing and linearization errors
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Factor evaluation errors
    #[error(transparent)]
    Factor(#[from] FactorError),

    /// Optimizer configuration and state errors
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),

    /// Linear algebra errors
    #[error(transparent)]
    LinearAlgebra(#[from] LinAlgError),

    /// Manifold operation errors
    #[error(transparent)]
    Manifold(#[from] ManifoldError),
}

impl SymOptError {
    /// Full error chain, one cause per line.
    pub fn chain(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(format!("  → {}", err));
            source = err.source();
        }

        chain.join("\n")
    }

    /// Single-line error chain for logging.
    ///
    /// ```rust,ignore
    /// error!("Optimization failed: {}", err.chain_compact());
    /// ```
    pub fn chain_compact(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }

        chain.join(" → ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::Key;

    #[test]
    fn test_error_display() {
        let error = SymOptError::from(LinAlgError::SingularMatrix);
        assert!(error.to_string().contains("Singular"));
    }

    #[test]
    fn test_error_chain() {
        let error = SymOptError::from(LinAlgError::FactorizationFailed(
            "Symbolic Cholesky decomposition failed".to_string(),
        ));
        let chain = error.chain();
        assert!(chain.contains("factorization"));
        assert!(chain.contains("Cholesky"));
    }

    #[test]
    fn test_nested_chain_compact() {
        let factor_error = FactorError::from(CoreError::NotFound(Key::with_sub('x', 1)));
        let error = SymOptError::from(factor_error);
        let chain = error.chain_compact();
        assert!(chain.contains("Key not found: x_1"));
    }

    #[test]
    fn test_transparent_error_conversion() {
        let manifold_error = ManifoldError::DimensionMismatch {
            expected: 3,
            actual: 2,
        };
        let error: SymOptError = manifold_error.into();
        assert!(matches!(error, SymOptError::Manifold(_)));

        let error: SymOptError = OptimizerError::EmptyProblem.into();
        assert!(matches!(error, SymOptError::Optimizer(OptimizerError::EmptyProblem)));
    }
}
