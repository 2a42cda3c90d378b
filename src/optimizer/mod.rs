//! Nonlinear least squares optimization over [`Values`].
//!
//! The [`Optimizer`] minimizes `½Σ‖rᵢ(x)‖²` over the factors it was built with using
//! Levenberg-Marquardt, mutating the caller's [`Values`] in place. Every run reports an
//! [`OptimizationStats`] record: non-convergence is data (`status`, `early_exited`), not an
//! error.

pub mod levenberg_marquardt;
pub mod params;

use std::{
    fmt,
    fmt::{Display, Formatter},
};

use thiserror::Error;
use tracing::error;
use web_time::Duration;

use crate::core::linearization::Linearization;
use crate::core::values::Values;
use crate::error::SymOptResult;
use crate::factors::Factor;
use crate::linalg;

pub use levenberg_marquardt::{IterationStats, Optimizer};
pub use params::{OptimizerParams, default_optimizer_params};

/// Default epsilon guarding singularities in retraction and residual functions
pub const DEFAULT_EPSILON: f64 = 10.0 * f64::EPSILON;

/// Optimizer-specific error types
#[derive(Debug, Clone, Error)]
pub enum OptimizerError {
    /// Invalid optimization parameters provided
    #[error("Invalid optimizer configuration: {0}")]
    Configuration(String),

    /// Operation requires state the optimizer does not have yet
    #[error("Invalid optimizer state: {0}")]
    InvalidState(String),

    /// Problem has no variables to optimize
    #[error("Problem has no variables to optimize")]
    EmptyProblem,

    /// Linear algebra operation failed
    #[error("Linear algebra error: {0}")]
    LinAlg(#[from] linalg::LinAlgError),
}

impl OptimizerError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// params.validate()
    ///     .map_err(|e| e.log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error with the original source error from a third-party library
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for optimizer operations
pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// State of an optimization run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OptimizationStatus {
    /// No run has been recorded yet
    #[default]
    Initializing,
    /// Error reduction fell below the convergence epsilon
    Converged,
    /// Iteration limit reached
    MaxIterationsReached,
    /// Damping grew past its upper bound without finding a better point
    NonImproving,
    /// Wall-clock limit reached
    Timeout,
    /// Factorization kept failing, or the error is not finite
    Failed(String),
}

impl Display for OptimizationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationStatus::Initializing => write!(f, "Initializing"),
            OptimizationStatus::Converged => write!(f, "Converged"),
            OptimizationStatus::MaxIterationsReached => write!(f, "Maximum iterations reached"),
            OptimizationStatus::NonImproving => write!(f, "Non-improving"),
            OptimizationStatus::Timeout => write!(f, "Timeout"),
            OptimizationStatus::Failed(msg) => write!(f, "Failed: {msg}"),
        }
    }
}

/// Record of one solve attempt. Iteration 0 is the initial point.
#[derive(Debug, Clone)]
pub struct OptimizationIteration {
    pub iteration: usize,
    /// Error at the evaluated point (the candidate for iterations > 0)
    pub error: f64,
    /// Damping used to compute the step
    pub lambda: f64,
    /// `(current - new) / current`
    pub relative_reduction: f64,
    pub accepted: bool,
    /// Linearization at the evaluated point, kept when debug stats are enabled
    pub linearization: Option<Linearization>,
}

/// Statistics of one `optimize` call.
#[derive(Debug, Clone, Default)]
pub struct OptimizationStats {
    pub iterations: Vec<OptimizationIteration>,
    /// Index into `iterations` of the lowest-error accepted point
    pub best_index: usize,
    /// Stopped because of convergence or non-improvement rather than the iteration cap
    pub early_exited: bool,
    /// Linearization at the best point, when requested
    pub best_linearization: Option<Linearization>,
    pub status: OptimizationStatus,
    pub initial_error: f64,
    pub final_error: f64,
    pub elapsed: Duration,
}

impl OptimizationStats {
    /// Clear all recorded data.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn num_iterations(&self) -> usize {
        self.iterations.len().saturating_sub(1)
    }

    pub fn num_accepted(&self) -> usize {
        self.iterations
            .iter()
            .skip(1)
            .filter(|it| it.accepted)
            .count()
    }

    pub fn best_iteration(&self) -> Option<&OptimizationIteration> {
        self.iterations.get(self.best_index)
    }
}

impl Display for OptimizationStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let converged = matches!(self.status, OptimizationStatus::Converged);
        writeln!(f, "Levenberg-Marquardt Final Result")?;
        if converged {
            writeln!(f, "CONVERGED ({})", self.status)?;
        } else {
            writeln!(f, "NOT CONVERGED ({})", self.status)?;
        }
        writeln!(f)?;
        writeln!(f, "Error:")?;
        writeln!(f, "  Initial:   {:.6e}", self.initial_error)?;
        writeln!(f, "  Final:     {:.6e}", self.final_error)?;
        writeln!(
            f,
            "  Reduction: {:.6e} ({:.2}%)",
            self.initial_error - self.final_error,
            100.0 * (self.initial_error - self.final_error) / self.initial_error.max(1e-12)
        )?;
        writeln!(f)?;
        let total = self.num_iterations();
        let accepted = self.num_accepted();
        writeln!(f, "Iterations:")?;
        writeln!(f, "  Total:              {total}")?;
        writeln!(
            f,
            "  Successful steps:   {} ({:.1}%)",
            accepted,
            100.0 * accepted as f64 / total.max(1) as f64
        )?;
        writeln!(f, "  Best iteration:     {}", self.best_index)?;
        writeln!(f, "  Early exit:         {}", self.early_exited)?;
        writeln!(f)?;
        writeln!(f, "Performance:")?;
        writeln!(
            f,
            "  Total time:             {:.2}ms",
            self.elapsed.as_secs_f64() * 1000.0
        )?;
        writeln!(
            f,
            "  Average per iteration:  {:.2}ms",
            self.elapsed.as_secs_f64() * 1000.0 / total.max(1) as f64
        )
    }
}

/// One-shot optimization: build an [`Optimizer`] over all keys of `factors` and run it once,
/// updating `values` in place.
///
/// # Example
///
/// ```
/// use nalgebra::{DMatrix, DVector};
/// use symopt::core::key::Key;
/// use symopt::core::values::Values;
/// use symopt::factors::{Factor, JacobianFactor};
/// use symopt::optimizer::{self, DEFAULT_EPSILON, OptimizationStatus, OptimizerParams};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let x = Key::new('x');
/// let factor = JacobianFactor::new(vec![x], |values, index| {
///     let x: f64 = values.at_entry(&index.entries[0])?;
///     Ok((DVector::from_element(1, x - 2.0), DMatrix::from_element(1, 1, 1.0)))
/// })?;
/// let factors: Vec<Box<dyn Factor>> = vec![Box::new(factor)];
///
/// let mut values = Values::new();
/// values.set(x, 10.0);
/// let stats = optimizer::optimize(OptimizerParams::default(), factors, &mut values, DEFAULT_EPSILON)?;
/// assert_eq!(stats.status, OptimizationStatus::Converged);
/// assert!((values.at::<f64>(&x)? - 2.0).abs() < 1e-6);
/// # Ok(())
/// # }
/// ```
pub fn optimize(
    params: OptimizerParams,
    factors: Vec<Box<dyn Factor>>,
    values: &mut Values,
    epsilon: f64,
) -> SymOptResult<OptimizationStats> {
    let mut optimizer = Optimizer::new(params, factors)?.with_epsilon(epsilon);
    optimizer.optimize(values)
}
