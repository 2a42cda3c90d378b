//! Levenberg-Marquardt configuration.

use tracing::debug;
use web_time::Duration;

use crate::optimizer::{OptimizerError, OptimizerResult};

/// Configuration parameters for the Levenberg-Marquardt [`Optimizer`](crate::optimizer::Optimizer).
///
/// # Builder Pattern
///
/// ```
/// use symopt::optimizer::OptimizerParams;
///
/// let params = OptimizerParams::new()
///     .with_max_iterations(100)
///     .with_initial_lambda(1e-2)
///     .with_lambda_factors(10.0, 0.1)
///     .with_convergence_epsilon(1e-8);
/// assert!(params.validate().is_ok());
/// ```
///
/// # Damping
///
/// Each step solves `(H + λ·D)·dx = -Jᵀr` with `D = diag(max(H_ii, diagonal_damping_min))`.
/// λ is multiplied by `lambda_down_factor` after an accepted step (never going below
/// `lambda_lower_bound`) and by `lambda_up_factor` after a rejected one. Once λ exceeds
/// `lambda_upper_bound` the optimizer stops as non-improving.
///
/// # Termination
///
/// - **Converged**: the relative error reduction of a step is below `convergence_epsilon`, or the
///   error reaches zero
/// - **NonImproving**: λ grew past `lambda_upper_bound`
/// - **MaxIterationsReached**: `max_iterations` solve attempts were made
/// - **Failed**: more than `max_factorization_retries` consecutive factorizations failed
/// - **Timeout**: `timeout` elapsed
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptimizerParams {
    /// Initial damping parameter
    pub initial_lambda: f64,
    /// Damping multiplier applied after a rejected step
    pub lambda_up_factor: f64,
    /// Damping multiplier applied after an accepted step
    pub lambda_down_factor: f64,
    /// Minimum damping
    pub lambda_lower_bound: f64,
    /// Damping above which the optimizer gives up
    pub lambda_upper_bound: f64,
    /// Floor for the diagonal entries used to scale the damping
    pub diagonal_damping_min: f64,
    /// Maximum number of solve attempts per `optimize` call
    pub max_iterations: usize,
    /// Relative error reduction below which the optimizer has converged
    pub convergence_epsilon: f64,
    /// Consecutive factorization failures tolerated before failing
    pub max_factorization_retries: usize,
    /// Keep the linearization of every iteration in the statistics
    pub debug_stats: bool,
    /// Compare factor Jacobians against numerical derivatives before optimizing
    pub check_derivatives: bool,
    /// Log the final summary at INFO instead of DEBUG
    pub verbose: bool,
    /// Wall-clock limit for one `optimize` call
    pub timeout: Option<Duration>,
}

impl Default for OptimizerParams {
    fn default() -> Self {
        Self {
            initial_lambda: 1.0,
            lambda_up_factor: 4.0,
            lambda_down_factor: 0.25,
            lambda_lower_bound: 0.0,
            lambda_upper_bound: 1e6,
            diagonal_damping_min: 1e-6,
            max_iterations: 50,
            convergence_epsilon: 1e-6,
            max_factorization_retries: 5,
            debug_stats: false,
            check_derivatives: false,
            verbose: false,
            timeout: None,
        }
    }
}

/// The documented default parameter set.
pub fn default_optimizer_params() -> OptimizerParams {
    OptimizerParams::default()
}

impl OptimizerParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial damping parameter.
    pub fn with_initial_lambda(mut self, initial_lambda: f64) -> Self {
        self.initial_lambda = initial_lambda;
        self
    }

    /// Set the damping adjustment factors.
    pub fn with_lambda_factors(mut self, up: f64, down: f64) -> Self {
        self.lambda_up_factor = up;
        self.lambda_down_factor = down;
        self
    }

    /// Set the damping parameter bounds.
    pub fn with_lambda_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lambda_lower_bound = lower;
        self.lambda_upper_bound = upper;
        self
    }

    pub fn with_diagonal_damping_min(mut self, diagonal_damping_min: f64) -> Self {
        self.diagonal_damping_min = diagonal_damping_min;
        self
    }

    /// Set the maximum number of iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_convergence_epsilon(mut self, convergence_epsilon: f64) -> Self {
        self.convergence_epsilon = convergence_epsilon;
        self
    }

    pub fn with_max_factorization_retries(mut self, retries: usize) -> Self {
        self.max_factorization_retries = retries;
        self
    }

    pub fn with_debug_stats(mut self, debug_stats: bool) -> Self {
        self.debug_stats = debug_stats;
        self
    }

    pub fn with_check_derivatives(mut self, check_derivatives: bool) -> Self {
        self.check_derivatives = check_derivatives;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the timeout duration
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reject malformed configurations.
    pub fn validate(&self) -> OptimizerResult<()> {
        let fail = |msg: String| Err(OptimizerError::Configuration(msg).log());

        if self.max_iterations == 0 {
            return fail("max_iterations must be positive".to_string());
        }
        if !(self.initial_lambda.is_finite() && self.initial_lambda >= 0.0) {
            return fail(format!(
                "initial_lambda must be finite and non-negative, got {}",
                self.initial_lambda
            ));
        }
        if !(self.lambda_up_factor > 1.0) {
            return fail(format!(
                "lambda_up_factor must be greater than 1, got {}",
                self.lambda_up_factor
            ));
        }
        if !(self.lambda_down_factor > 0.0 && self.lambda_down_factor < 1.0) {
            return fail(format!(
                "lambda_down_factor must be in (0, 1), got {}",
                self.lambda_down_factor
            ));
        }
        if !(self.lambda_lower_bound >= 0.0 && self.lambda_lower_bound <= self.lambda_upper_bound)
        {
            return fail(format!(
                "lambda bounds must satisfy 0 <= lower <= upper, got [{}, {}]",
                self.lambda_lower_bound, self.lambda_upper_bound
            ));
        }
        if !(self.diagonal_damping_min >= 0.0) {
            return fail(format!(
                "diagonal_damping_min must be non-negative, got {}",
                self.diagonal_damping_min
            ));
        }
        if !(self.convergence_epsilon >= 0.0) {
            return fail(format!(
                "convergence_epsilon must be non-negative, got {}",
                self.convergence_epsilon
            ));
        }
        Ok(())
    }

    /// Print configuration parameters
    pub fn print_configuration(&self) {
        debug!(
            "Configuration:\n  Solver:              Levenberg-Marquardt\n  Max iterations:      {}\n  Convergence epsilon: {:.2e}\n  Timeout:             {:?}\n  Damping Parameters:\n  Initial lambda:      {:.2e}\n  Lambda range:        [{:.2e}, {:.2e}]\n  Up factor:           {:.2}\n  Down factor:         {:.2}\n  Diagonal minimum:    {:.2e}\n  Factorization retries: {}\n  Debug stats:         {}\n  Check derivatives:   {}",
            self.max_iterations,
            self.convergence_epsilon,
            self.timeout,
            self.initial_lambda,
            self.lambda_lower_bound,
            self.lambda_upper_bound,
            self.lambda_up_factor,
            self.lambda_down_factor,
            self.diagonal_damping_min,
            self.max_factorization_retries,
            if self.debug_stats { "enabled" } else { "disabled" },
            if self.check_derivatives {
                "enabled"
            } else {
                "disabled"
            },
        );
    }
}
