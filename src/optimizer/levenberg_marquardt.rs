//! Levenberg-Marquardt optimizer over a set of factors.
//!
//! # Algorithm
//!
//! At each iteration the optimizer holds the linearization of the current point and solves the
//! damped normal equations
//!
//! ```text
//! (H + λ·D)·dx = -Jᵀr,    H = JᵀJ,    D = diag(max(H_ii, diagonal_damping_min))
//! ```
//!
//! The step is retracted into a scratch copy of the values and the factors are relinearized
//! there. The step is accepted iff the new error is finite and strictly smaller:
//!
//! - **accepted**: the scratch values are committed, `λ ← max(λ·down, lower_bound)`
//! - **rejected**: the scratch values are discarded, `λ ← λ·up`
//!
//! A factorization failure (indefinite or singular damped system) counts as a rejected step.
//!
//! # Termination
//!
//! The run stops as [`Converged`](OptimizationStatus::Converged) once a step changes the error by
//! a relative amount `rr` with `-ε/10 < rr < ε` (`ε = convergence_epsilon`) or the error reaches
//! zero, as [`NonImproving`](OptimizationStatus::NonImproving) once λ exceeds its upper bound, and
//! as [`Failed`](OptimizationStatus::Failed) after too many consecutive factorization failures.
//! None of these are errors: they are reported in [`OptimizationStats`].
//!
//! # Example
//!
//! ```
//! use nalgebra::{DMatrix, DVector};
//! use symopt::core::key::Key;
//! use symopt::core::values::Values;
//! use symopt::factors::{Factor, HessianFactor};
//! use symopt::optimizer::{Optimizer, OptimizerParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let x = Key::new('x');
//! // r(x) = cos(x / 2), with a minimum at x = π
//! let factor = HessianFactor::new(vec![x], |values, index| {
//!     let x: f64 = values.at_entry(&index.entries[0])?;
//!     let (r, j) = ((x / 2.0).cos(), -(x / 2.0).sin() / 2.0);
//!     Ok((
//!         DVector::from_element(1, r),
//!         DMatrix::from_element(1, 1, j),
//!         DMatrix::from_element(1, 1, j * j),
//!         DVector::from_element(1, j * r),
//!     ))
//! })?;
//! let factors: Vec<Box<dyn Factor>> = vec![Box::new(factor)];
//!
//! let mut values = Values::new();
//! values.set(x, 3.0);
//! let mut optimizer = Optimizer::new(OptimizerParams::default(), factors)?;
//! let stats = optimizer.optimize(&mut values)?;
//! assert!(stats.early_exited);
//! assert!((values.at::<f64>(&x)? - std::f64::consts::PI).abs() < 1e-7);
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};

use faer::Mat;
use tracing::{Level, debug, info, warn};
use web_time::Instant;

use crate::core::{CoreError, key::Key, linearization::Linearization, linearization::Linearizer};
use crate::core::values::Values;
use crate::error::SymOptResult;
use crate::factors::{
    Factor,
    numerical::{DEFAULT_DERIVATIVE_TOLERANCE, check_jacobian},
};
use crate::linalg::{SparseCholeskySolver, SparseLinearSolver, compute_covariance_blocks};
use crate::optimizer::{
    DEFAULT_EPSILON, OptimizationIteration, OptimizationStats, OptimizationStatus, OptimizerError,
    OptimizerParams,
};

/// Per-iteration statistics for detailed logging (Ceres-style output).
#[derive(Debug, Clone)]
pub struct IterationStats {
    /// Iteration number (0 is the initial point)
    pub iteration: usize,
    /// Error at the evaluated point
    pub error: f64,
    /// Change from the current error
    pub error_change: f64,
    /// L2 norm of the gradient (||J^T·r||)
    pub gradient_norm: f64,
    /// L2 norm of the step (||Δx||)
    pub step_norm: f64,
    /// Damping used for this step
    pub lambda: f64,
    /// Time taken for this iteration in milliseconds
    pub iter_time_ms: f64,
    /// Total elapsed time since optimization started in milliseconds
    pub total_time_ms: f64,
    pub accepted: bool,
}

impl IterationStats {
    /// Print table header in Ceres-style format
    pub fn print_header() {
        debug!(
            "{:>4}  {:>13}  {:>13}  {:>13}  {:>13}  {:>11}  {:>11}  {:>13}  {:>6}",
            "iter",
            "error",
            "error_change",
            "|gradient|",
            "|step|",
            "lambda",
            "iter_time",
            "total_time",
            "status"
        );
    }

    /// Print single iteration line in Ceres-style format with scientific notation
    pub fn print_line(&self) {
        let status = if self.iteration == 0 {
            "-"
        } else if self.accepted {
            "✓"
        } else {
            "✗"
        };

        debug!(
            "{:>4}  {:>13.6e}  {:>13.2e}  {:>13.2e}  {:>13.2e}  {:>11.2e}  {:>9.2}ms  {:>11.2}ms  {:>6}",
            self.iteration,
            self.error,
            self.error_change,
            self.gradient_norm,
            self.step_norm,
            self.lambda,
            self.iter_time_ms,
            self.total_time_ms,
            status
        );
    }
}

/// Levenberg-Marquardt optimizer over a fixed set of factors and optimized keys.
///
/// Factor keys that are not optimized are held constant. The sparsity structure of the problem
/// and the symbolic Cholesky analysis are computed on first use and reused across iterations
/// and across `optimize` calls while the layout of the problem stays the same.
pub struct Optimizer {
    params: OptimizerParams,
    factors: Vec<Box<dyn Factor>>,
    epsilon: f64,
    name: String,
    linearizer: Linearizer,
    solver: SparseCholeskySolver,
}

impl Optimizer {
    /// Create an optimizer over every key the factors touch, in first-seen order.
    pub fn new(params: OptimizerParams, factors: Vec<Box<dyn Factor>>) -> SymOptResult<Self> {
        params.validate()?;
        if factors.is_empty() {
            return Err(OptimizerError::EmptyProblem.log().into());
        }
        let keys = keys_from_factors(&factors);
        Ok(Self {
            params,
            factors,
            epsilon: DEFAULT_EPSILON,
            name: "Optimizer".to_string(),
            linearizer: Linearizer::new(keys),
            solver: SparseCholeskySolver::new(),
        })
    }

    /// Set the epsilon forwarded to retraction.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the name used in log messages.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Restrict optimization to `keys` in this order. An empty list selects every factor key.
    pub fn with_keys(mut self, keys: Vec<Key>) -> Self {
        let keys = if keys.is_empty() {
            keys_from_factors(&self.factors)
        } else {
            keys
        };
        self.linearizer = Linearizer::new(keys);
        self.solver.reset();
        self
    }

    pub fn with_debug_stats(mut self, debug_stats: bool) -> Self {
        self.params.debug_stats = debug_stats;
        self
    }

    pub fn with_check_derivatives(mut self, check_derivatives: bool) -> Self {
        self.params.check_derivatives = check_derivatives;
        self
    }

    /// The optimized keys, in column order.
    pub fn keys(&self) -> &[Key] {
        self.linearizer.keys()
    }

    pub fn factors(&self) -> &[Box<dyn Factor>] {
        &self.factors
    }

    pub fn params(&self) -> &OptimizerParams {
        &self.params
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the configuration. Cached structure is kept.
    pub fn update_params(&mut self, params: OptimizerParams) -> SymOptResult<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    /// Optimize `values` in place with the configured iteration limit.
    pub fn optimize(&mut self, values: &mut Values) -> SymOptResult<OptimizationStats> {
        self.optimize_with(values, None, false)
    }

    /// Optimize with an explicit iteration limit and optionally keep the best linearization.
    pub fn optimize_with(
        &mut self,
        values: &mut Values,
        num_iterations: Option<usize>,
        populate_best_linearization: bool,
    ) -> SymOptResult<OptimizationStats> {
        let mut stats = OptimizationStats::default();
        self.optimize_into(values, num_iterations, populate_best_linearization, &mut stats)?;
        Ok(stats)
    }

    /// Optimize and write the statistics into `stats`, replacing its previous contents.
    pub fn optimize_into(
        &mut self,
        values: &mut Values,
        num_iterations: Option<usize>,
        populate_best_linearization: bool,
        stats: &mut OptimizationStats,
    ) -> SymOptResult<()> {
        let start = Instant::now();
        stats.reset();

        if self.keys().is_empty() {
            return Err(OptimizerError::EmptyProblem.log().into());
        }
        if num_iterations == Some(0) {
            return Err(OptimizerError::Configuration(
                "num_iterations must be positive".to_string(),
            )
            .log()
            .into());
        }
        let max_iterations = num_iterations.unwrap_or(self.params.max_iterations);
        let tables = tracing::enabled!(Level::DEBUG);

        if tables {
            self.params.print_configuration();
        }
        if self.params.check_derivatives {
            for factor in &self.factors {
                check_jacobian(
                    factor.as_ref(),
                    values,
                    self.epsilon,
                    DEFAULT_DERIVATIVE_TOLERANCE,
                )?;
            }
        }

        let state_index = values.create_index(self.linearizer.keys())?;
        let mut current = self.linearizer.relinearize(&self.factors, values)?;
        let mut current_error = current.error();
        let mut lambda = self.params.initial_lambda;

        stats.initial_error = current_error;
        stats.iterations.push(OptimizationIteration {
            iteration: 0,
            error: current_error,
            lambda,
            relative_reduction: 0.0,
            accepted: true,
            linearization: self.params.debug_stats.then(|| current.clone()),
        });
        if tables {
            IterationStats::print_header();
            IterationStats {
                iteration: 0,
                error: current_error,
                error_change: 0.0,
                gradient_norm: current.rhs.norm_l2(),
                step_norm: 0.0,
                lambda,
                iter_time_ms: 0.0,
                total_time_ms: start.elapsed().as_secs_f64() * 1000.0,
                accepted: true,
            }
            .print_line();
        }

        let mut consecutive_failures = 0;
        let status = if !current_error.is_finite() {
            OptimizationStatus::Failed(format!("Initial error is not finite: {current_error}"))
        } else if current_error == 0.0 {
            OptimizationStatus::Converged
        } else {
            let mut status = OptimizationStatus::MaxIterationsReached;
            for iteration in 1..=max_iterations {
                if let Some(timeout) = self.params.timeout
                    && start.elapsed() >= timeout
                {
                    status = OptimizationStatus::Timeout;
                    break;
                }
                let iter_start = Instant::now();

                let step = match self.solver.solve_damped(
                    &current.hessian_lower,
                    &current.rhs,
                    lambda,
                    self.params.diagonal_damping_min,
                ) {
                    Ok(step) => step,
                    Err(e) => {
                        consecutive_failures += 1;
                        warn!(
                            "[{}] Iteration {}: factorization failed at lambda {:.3e} ({}/{})",
                            self.name,
                            iteration,
                            lambda,
                            consecutive_failures,
                            self.params.max_factorization_retries
                        );
                        stats.iterations.push(OptimizationIteration {
                            iteration,
                            error: current_error,
                            lambda,
                            relative_reduction: 0.0,
                            accepted: false,
                            linearization: None,
                        });
                        lambda *= self.params.lambda_up_factor;
                        if consecutive_failures > self.params.max_factorization_retries {
                            status = OptimizationStatus::Failed(e.to_string());
                            break;
                        }
                        continue;
                    }
                };
                consecutive_failures = 0;

                let delta: Vec<f64> = (0..step.nrows()).map(|i| step[(i, 0)]).collect();
                let mut candidate = values.clone();
                candidate.retract(&state_index, &delta, self.epsilon)?;
                let linearization = self.linearizer.relinearize(&self.factors, &candidate)?;
                let new_error = linearization.error();

                let relative_reduction = (current_error - new_error) / current_error;
                let accepted = new_error.is_finite() && new_error < current_error;
                let step_lambda = lambda;

                if tables {
                    IterationStats {
                        iteration,
                        error: new_error,
                        error_change: current_error - new_error,
                        gradient_norm: current.rhs.norm_l2(),
                        step_norm: step.norm_l2(),
                        lambda: step_lambda,
                        iter_time_ms: iter_start.elapsed().as_secs_f64() * 1000.0,
                        total_time_ms: start.elapsed().as_secs_f64() * 1000.0,
                        accepted,
                    }
                    .print_line();
                }
                stats.iterations.push(OptimizationIteration {
                    iteration,
                    error: new_error,
                    lambda: step_lambda,
                    relative_reduction,
                    accepted,
                    linearization: self.params.debug_stats.then(|| linearization.clone()),
                });

                let epsilon = self.params.convergence_epsilon;
                let negligible = relative_reduction > -epsilon / 10.0 && relative_reduction < epsilon;

                if accepted {
                    *values = candidate;
                    current = linearization;
                    current_error = new_error;
                    stats.best_index = stats.iterations.len() - 1;
                    lambda = (lambda * self.params.lambda_down_factor)
                        .max(self.params.lambda_lower_bound);
                    if new_error == 0.0 || negligible {
                        status = OptimizationStatus::Converged;
                        break;
                    }
                } else {
                    if negligible {
                        status = OptimizationStatus::Converged;
                        break;
                    }
                    lambda *= self.params.lambda_up_factor;
                    if lambda > self.params.lambda_upper_bound {
                        status = OptimizationStatus::NonImproving;
                        break;
                    }
                }
            }
            status
        };

        stats.early_exited = matches!(
            status,
            OptimizationStatus::Converged | OptimizationStatus::NonImproving
        );
        stats.status = status;
        stats.final_error = current_error;
        if populate_best_linearization {
            stats.best_linearization = Some(current);
        }
        stats.elapsed = start.elapsed();

        if self.params.verbose {
            info!("[{}] {}", self.name, stats);
        } else {
            debug!("[{}] {}", self.name, stats);
        }
        Ok(())
    }

    /// Linearize all factors at `values` without optimizing.
    pub fn linearize(&mut self, values: &Values) -> SymOptResult<Linearization> {
        self.linearizer.relinearize(&self.factors, values)
    }

    /// Marginal covariance of every optimized key.
    pub fn compute_all_covariances(
        &mut self,
        linearization: &Linearization,
    ) -> SymOptResult<HashMap<Key, Mat<f64>>> {
        let keys = self.linearizer.keys().to_vec();
        self.compute_covariances(linearization, &keys)
    }

    /// Marginal covariance blocks of `keys` from the Hessian of `linearization`.
    pub fn compute_covariances(
        &mut self,
        linearization: &Linearization,
        keys: &[Key],
    ) -> SymOptResult<HashMap<Key, Mat<f64>>> {
        if !linearization.is_initialized() {
            return Err(CoreError::InvalidState(
                "Covariance requested from an uninitialized linearization".to_string(),
            )
            .log()
            .into());
        }
        let blocks = self.linearizer.covariance_blocks(keys)?;
        let columns = linearization.hessian_lower.ncols();
        if self.linearizer.num_columns() != Some(columns) {
            return Err(CoreError::InvalidState(format!(
                "Linearization has {} columns, optimizer expects {:?}",
                columns,
                self.linearizer.num_columns()
            ))
            .log()
            .into());
        }
        compute_covariance_blocks(&mut self.solver, &linearization.hessian_lower, &blocks)
            .map_err(|e| {
                CoreError::InvalidState(format!("Hessian is not factorizable: {e}"))
                    .log_with_source(e)
                    .into()
            })
    }
}

fn keys_from_factors(factors: &[Box<dyn Factor>]) -> Vec<Key> {
    let mut seen = HashSet::new();
    factors
        .iter()
        .flat_map(|factor| factor.keys().iter().copied())
        .filter(|key| seen.insert(*key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::{FactorResult, HessianFactor, JacobianFactor};
    use crate::manifold::{LieGroupOps, Pose2};
    use nalgebra::{DMatrix, DVector};
    use std::f64::consts::PI;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn pi_key() -> Key {
        Key::with_sub_super('3', 1, 4)
    }

    /// r(x) = cos(x / 2) with its closed-form Gauss-Newton linearization
    fn pi_factor() -> FactorResult<HessianFactor> {
        HessianFactor::new(vec![pi_key()], |values, index| {
            let x: f64 = values.at_entry(&index.entries[0])?;
            let r = (x / 2.0).cos();
            let j = -(x / 2.0).sin() / 2.0;
            Ok((
                DVector::from_element(1, r),
                DMatrix::from_element(1, 1, j),
                DMatrix::from_element(1, 1, j * j),
                DVector::from_element(1, j * r),
            ))
        })
    }

    fn pi_problem() -> Result<(Optimizer, Values), Box<dyn std::error::Error>> {
        let factors: Vec<Box<dyn Factor>> = vec![Box::new(pi_factor()?)];
        let optimizer = Optimizer::new(OptimizerParams::default(), factors)?;
        let mut values = Values::new();
        values.set(pi_key(), 3.0);
        Ok((optimizer, values))
    }

    /// Prior on a Pose2 pulling it to `target` (residual in tangent space)
    fn pose_prior(key: Key, target: Pose2) -> FactorResult<JacobianFactor> {
        JacobianFactor::from_residual(
            vec![key],
            move |values, index| {
                let pose: Pose2 = values.at_entry(&index.entries[0])?;
                Ok(DVector::from_vec(
                    target.local_coordinates(&pose, DEFAULT_EPSILON),
                ))
            },
            DEFAULT_EPSILON,
        )
    }

    #[test]
    fn test_optimize_converges_to_pi() -> TestResult {
        let (mut optimizer, mut values) = pi_problem()?;
        let stats = optimizer.optimize(&mut values)?;

        let x: f64 = values.at(&pi_key())?;
        assert!((x - PI).abs() < 1e-7, "x = {x}");
        assert_eq!(stats.status, OptimizationStatus::Converged);
        assert!(stats.early_exited);
        assert!(stats.final_error < stats.initial_error);
        assert!(stats.final_error < 1e-12);
        Ok(())
    }

    #[test]
    fn test_stats_record_every_attempt() -> TestResult {
        let (mut optimizer, mut values) = pi_problem()?;
        let stats = optimizer.optimize(&mut values)?;

        assert_eq!(stats.iterations[0].iteration, 0);
        assert!((stats.iterations[0].error - 0.5 * 1.5f64.cos().powi(2)).abs() < 1e-12);
        assert_eq!(stats.iterations[0].lambda, 1.0);
        for (i, it) in stats.iterations.iter().enumerate() {
            assert_eq!(it.iteration, i);
            assert!(it.linearization.is_none());
        }
        // First step is accepted and reduces the damping.
        assert!(stats.iterations[1].accepted);
        assert_eq!(stats.iterations[2].lambda, 0.25);

        let best = stats.best_iteration().ok_or("missing best iteration")?;
        assert!(best.accepted);
        assert_eq!(best.error, stats.final_error);
        assert!(stats.best_linearization.is_none());
        assert!(stats.num_iterations() <= OptimizerParams::default().max_iterations);
        Ok(())
    }

    #[test]
    fn test_iteration_limit_and_best_linearization() -> TestResult {
        let (mut optimizer, mut values) = pi_problem()?;
        let stats = optimizer.optimize_with(&mut values, Some(2), true)?;

        assert_eq!(stats.status, OptimizationStatus::MaxIterationsReached);
        assert!(!stats.early_exited);
        assert_eq!(stats.num_iterations(), 2);
        let best = stats.best_linearization.as_ref().ok_or("missing best linearization")?;
        assert!(best.is_initialized());
        assert!((best.error() - stats.final_error).abs() < 1e-15);
        assert!(matches!(
            optimizer.optimize_with(&mut values, Some(0), false),
            Err(crate::error::SymOptError::Optimizer(OptimizerError::Configuration(_)))
        ));
        Ok(())
    }

    #[test]
    fn test_optimize_into_reuses_stats() -> TestResult {
        let (mut optimizer, mut values) = pi_problem()?;
        let mut stats = OptimizationStats::default();
        optimizer.optimize_into(&mut values, Some(3), false, &mut stats)?;
        assert_eq!(stats.num_iterations(), 3);

        // A second run continues from the improved point and replaces the old record.
        optimizer.optimize_into(&mut values, None, true, &mut stats)?;
        assert_eq!(stats.status, OptimizationStatus::Converged);
        assert!(stats.best_linearization.is_some());
        assert!((values.at::<f64>(&pi_key())? - PI).abs() < 1e-7);
        Ok(())
    }

    #[test]
    fn test_debug_stats_keep_linearizations() -> TestResult {
        let (optimizer, mut values) = pi_problem()?;
        let mut optimizer = optimizer.with_debug_stats(true).with_name("pi");
        assert_eq!(optimizer.name(), "pi");
        let stats = optimizer.optimize(&mut values)?;
        assert!(stats.iterations.iter().all(|it| it.linearization.is_some()));
        Ok(())
    }

    #[test]
    fn test_linearize_and_keys() -> TestResult {
        let (mut optimizer, values) = pi_problem()?;
        assert_eq!(optimizer.keys(), &[pi_key()]);
        assert_eq!(optimizer.factors().len(), 1);

        let lin = optimizer.linearize(&values)?;
        assert!(lin.is_initialized());
        assert!((lin.residual[(0, 0)] - 1.5f64.cos()).abs() < 1e-15);
        assert!((lin.rhs[(0, 0)] + 1.5f64.cos() * 1.5f64.sin() / 2.0).abs() < 1e-15);
        Ok(())
    }

    #[test]
    fn test_covariances() -> TestResult {
        let (mut optimizer, mut values) = pi_problem()?;
        let stats = optimizer.optimize_with(&mut values, None, true)?;
        let best = stats.best_linearization.ok_or("missing best linearization")?;

        // At x = π, H = sin²(π/2) / 4 = 1/4
        let all = optimizer.compute_all_covariances(&best)?;
        assert_eq!(all.len(), 1);
        assert!((all[&pi_key()][(0, 0)] - 4.0).abs() < 1e-6);

        values.set(pi_key(), 2.0);
        let lin = optimizer.linearize(&values)?;
        let some = optimizer.compute_covariances(&lin, &[pi_key()])?;
        let expected = 4.0 / 1.0f64.sin().powi(2);
        assert!((some[&pi_key()][(0, 0)] - expected).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_covariance_errors() -> TestResult {
        let (mut optimizer, values) = pi_problem()?;
        let uninitialized = Linearization::default();
        assert!(matches!(
            optimizer.compute_all_covariances(&uninitialized),
            Err(crate::error::SymOptError::Core(CoreError::InvalidState(_)))
        ));

        let lin = optimizer.linearize(&values)?;
        assert!(matches!(
            optimizer.compute_covariances(&lin, &[Key::new('q')]),
            Err(crate::error::SymOptError::Core(CoreError::NotFound(_)))
        ));
        Ok(())
    }

    #[test]
    fn test_covariance_of_singular_hessian_is_invalid_state() -> TestResult {
        // At x = 0 the Jacobian of cos(x / 2) vanishes, so H = [[0]].
        let (mut optimizer, mut values) = pi_problem()?;
        values.set(pi_key(), 0.0);
        let lin = optimizer.linearize(&values)?;
        assert!(lin.is_initialized());
        assert!(matches!(
            optimizer.compute_covariances(&lin, &[pi_key()]),
            Err(crate::error::SymOptError::Core(CoreError::InvalidState(_)))
        ));
        assert!(matches!(
            optimizer.compute_all_covariances(&lin),
            Err(crate::error::SymOptError::Core(CoreError::InvalidState(_)))
        ));
        Ok(())
    }

    #[test]
    fn test_update_params() -> TestResult {
        let (mut optimizer, mut values) = pi_problem()?;
        assert!(
            optimizer
                .update_params(OptimizerParams::new().with_max_iterations(0))
                .is_err()
        );
        assert_eq!(optimizer.params().max_iterations, 50);

        optimizer.update_params(OptimizerParams::new().with_max_iterations(1))?;
        let stats = optimizer.optimize(&mut values)?;
        assert_eq!(stats.num_iterations(), 1);
        Ok(())
    }

    #[test]
    fn test_non_improving_stops_early() -> TestResult {
        // Hessian claims the wrong descent direction, so every step increases the error.
        let x = Key::new('x');
        let factor = HessianFactor::new(vec![x], |values, index| {
            let v: f64 = values.at_entry(&index.entries[0])?;
            Ok((
                DVector::from_element(1, v),
                DMatrix::from_element(1, 1, 1.0),
                DMatrix::from_element(1, 1, 1.0),
                DVector::from_element(1, -v),
            ))
        })?;
        let factors: Vec<Box<dyn Factor>> = vec![Box::new(factor)];
        let params = OptimizerParams::new().with_lambda_bounds(0.0, 1e3);
        let mut optimizer = Optimizer::new(params, factors)?;
        let mut values = Values::new();
        values.set(x, 1.0);

        let stats = optimizer.optimize(&mut values)?;
        assert_eq!(stats.status, OptimizationStatus::NonImproving);
        assert!(stats.early_exited);
        assert_eq!(stats.best_index, 0);
        assert_eq!(values.at::<f64>(&x)?, 1.0);
        assert!(stats.iterations.iter().skip(1).all(|it| !it.accepted));
        Ok(())
    }

    #[test]
    fn test_factorization_failure_is_reported_as_failed() -> TestResult {
        // Negative definite Hessian stays indefinite for any damping.
        let x = Key::new('x');
        let factor = HessianFactor::new(vec![x], |_, _| {
            Ok((
                DVector::from_element(1, 1.0),
                DMatrix::from_element(1, 1, 1.0),
                DMatrix::from_element(1, 1, -1.0),
                DVector::from_element(1, 1.0),
            ))
        })?;
        let factors: Vec<Box<dyn Factor>> = vec![Box::new(factor)];
        let params = OptimizerParams::new().with_max_factorization_retries(2);
        let mut optimizer = Optimizer::new(params, factors)?;
        let mut values = Values::new();
        values.set(x, 0.0);

        let stats = optimizer.optimize(&mut values)?;
        assert!(matches!(stats.status, OptimizationStatus::Failed(_)));
        assert!(!stats.early_exited);
        assert_eq!(stats.num_iterations(), 3);
        Ok(())
    }

    #[test]
    fn test_held_constant_keys() -> TestResult {
        // r = [a - b, b - 5]; only `a` is optimized, `b` stays at 1.
        let (a, b) = (Key::new('a'), Key::new('b'));
        let factor = JacobianFactor::new(vec![a, b], |values, index| {
            let a: f64 = values.at_entry(&index.entries[0])?;
            let b: f64 = values.at_entry(&index.entries[1])?;
            Ok((
                DVector::from_vec(vec![a - b, b - 5.0]),
                DMatrix::from_row_slice(2, 2, &[1.0, -1.0, 0.0, 1.0]),
            ))
        })?;
        let factors: Vec<Box<dyn Factor>> = vec![Box::new(factor)];
        let mut optimizer =
            Optimizer::new(OptimizerParams::default(), factors)?.with_keys(vec![a]);
        assert_eq!(optimizer.keys(), &[a]);

        let mut values = Values::new();
        values.set(a, 10.0);
        values.set(b, 1.0);
        let stats = optimizer.optimize(&mut values)?;
        assert_eq!(stats.status, OptimizationStatus::Converged);
        // The held residual keeps the error at 8, so convergence is relative to that floor.
        assert!((values.at::<f64>(&a)? - 1.0).abs() < 1e-3);
        assert!((stats.final_error - 8.0).abs() < 1e-6);
        assert_eq!(values.at::<f64>(&b)?, 1.0);
        Ok(())
    }

    #[test]
    fn test_pose_prior_with_numerical_jacobian() -> TestResult {
        let key = Key::with_sub('x', 0);
        let target = Pose2::from_xy_angle(1.0, -2.0, 0.7);
        let factors: Vec<Box<dyn Factor>> = vec![Box::new(pose_prior(key, target)?)];
        let mut optimizer =
            Optimizer::new(OptimizerParams::default(), factors)?.with_check_derivatives(true);

        let mut values = Values::new();
        values.set(key, Pose2::identity());
        let stats = optimizer.optimize(&mut values)?;
        assert!(!matches!(stats.status, OptimizationStatus::Failed(_)));
        assert!(stats.final_error < 1e-12);

        let pose: Pose2 = values.at(&key)?;
        assert!((pose.x() - 1.0).abs() < 1e-6);
        assert!((pose.y() + 2.0).abs() < 1e-6);
        assert!((pose.angle() - 0.7).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_construction_errors() {
        assert!(matches!(
            Optimizer::new(OptimizerParams::default(), Vec::new()),
            Err(crate::error::SymOptError::Optimizer(OptimizerError::EmptyProblem))
        ));
        assert!(Optimizer::new(OptimizerParams::new().with_lambda_factors(0.5, 0.5), Vec::new())
            .is_err());
    }
}
