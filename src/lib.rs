//! # symopt
//!
//! Factor-graph nonlinear least squares over typed, key-addressed variables.
//!
//! - **[`Values`]**: a heterogeneous store of scalars, rotations, poses and small matrices in
//!   one flat buffer, addressed by [`Key`]
//! - **[`Factor`]**: a residual over a few keys, supplied either with its full Gauss-Newton
//!   linearization ([`HessianFactor`]) or with residual and Jacobian ([`JacobianFactor`])
//! - **[`Optimizer`]**: Levenberg-Marquardt on the sparse normal equations, built on faer's
//!   sparse Cholesky, with marginal covariance extraction
//!
//! ```
//! use nalgebra::{DMatrix, DVector};
//! use symopt::{Factor, HessianFactor, Key, OptimizerParams, Values, optimize};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let x = Key::new('x');
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
//! optimize(OptimizerParams::default(), factors, &mut values, symopt::DEFAULT_EPSILON)?;
//! assert!((values.at::<f64>(&x)? - std::f64::consts::PI).abs() < 1e-7);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `logging` (default): [`init_logger`] with a bracketed, timestamped format
//! - `parallel` (default): per-factor linearization on the rayon thread pool
//! - `serde`: serialization of keys, value snapshots and optimizer parameters

pub mod core;
pub mod error;
pub mod factors;
pub mod linalg;
#[cfg(feature = "logging")]
pub mod logger;
pub mod manifold;
pub mod optimizer;

pub use core::index::{Index, IndexEntry};
pub use core::key::Key;
pub use core::linearization::Linearization;
pub use core::values::{Values, ValuesSnapshot};
pub use error::{SymOptError, SymOptResult};

pub use factors::{Factor, HessianFactor, JacobianFactor, LinearizedFactor};

pub use linalg::{SparseCholeskySolver, SparseLinearSolver};
#[cfg(feature = "logging")]
pub use logger::{init_logger, init_logger_with_level};
pub use manifold::{LieGroupOps, Pose2, Pose3, Rot2, Rot3, TypeTag};
pub use optimizer::{
    DEFAULT_EPSILON, OptimizationIteration, OptimizationStats, OptimizationStatus, Optimizer,
    OptimizerParams, default_optimizer_params, optimize,
};
