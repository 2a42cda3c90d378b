//! Core building blocks of the factor graph:
//! - Structured keys
//! - The typed, key-addressed variable store and its storage layout indices
//! - Global linearization assembly

pub mod index;
pub mod key;
pub mod linearization;
pub mod values;

use thiserror::Error;
use tracing::error;

use crate::core::key::Key;
use crate::manifold::{ManifoldError, TypeTag};

/// Core module error types for variable storage and linearization
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Key is absent from the store
    #[error("Key not found: {0}")]
    NotFound(Key),

    /// Stored type differs from the requested one
    #[error("Type mismatch for key {key}: stored {stored}, requested {requested}")]
    TypeMismatch {
        key: Key,
        stored: TypeTag,
        requested: TypeTag,
    },

    /// Operation is not valid in the current state (e.g. uninitialized linearization)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Dimension mismatch between indices, steps or factor outputs
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Invalid input parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Symbolic structure construction failed
    #[error("Symbolic structure error: {0}")]
    SymbolicStructure(String),

    /// Manifold operation on stored data failed
    #[error("Manifold operation failed: {0}")]
    Manifold(#[from] ManifoldError),
}

impl CoreError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// values.at::<f64>(&key)
    ///     .map_err(|e| e.log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error with the original source error from a third-party library
    ///
    /// # Example
    /// ```ignore
    /// SymbolicSparseColMat::try_new_from_indices(rows, cols, &indices)
    ///     .map_err(|e| {
    ///         CoreError::SymbolicStructure("Failed to build Jacobian pattern".to_string())
    ///             .log_with_source(e)
    ///     })?;
    /// ```
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for core module operations
pub type CoreResult<T> = Result<T, CoreError>;
