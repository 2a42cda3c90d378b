//! Central-difference Jacobians taken in the tangent space of the stored variables.
//!
//! Column `j` of the Jacobian is `(r(x ⊞ h·e_j) - r(x ⊞ -h·e_j)) / 2h`, where `⊞` is
//! [`Values::retract`]. This makes the result directly comparable with analytic Jacobians of
//! factors on manifold types.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use super::{Factor, FactorError, FactorResult, check_dim, format_keys};
use crate::core::index::Index;
use crate::core::values::Values;

/// Default finite-difference step in tangent space.
pub const DEFAULT_STEP: f64 = 1e-6;

/// Default tolerance used when comparing analytic and numerical Jacobians.
pub const DEFAULT_DERIVATIVE_TOLERANCE: f64 = 1e-4;

/// Numerical Jacobian of `residual_func` with respect to every key in `index`.
pub fn numerical_jacobian<F>(
    values: &Values,
    index: &Index,
    residual_func: F,
    step: f64,
    epsilon: f64,
) -> FactorResult<DMatrix<f64>>
where
    F: Fn(&Values, &Index) -> FactorResult<DVector<f64>>,
{
    let rows = residual_func(values, index)?.len();
    let cols = index.tangent_dim;
    let mut jacobian = DMatrix::zeros(rows, cols);

    let mut perturbed = values.clone();
    let mut delta = vec![0.0; cols];
    for j in 0..cols {
        delta[j] = step;
        perturbed.update(index, values)?;
        perturbed.retract(index, &delta, epsilon)?;
        let plus = residual_func(&perturbed, index)?;

        delta[j] = -step;
        perturbed.update(index, values)?;
        perturbed.retract(index, &delta, epsilon)?;
        let minus = residual_func(&perturbed, index)?;
        delta[j] = 0.0;

        check_dim("perturbed residual", rows, plus.len())?;
        check_dim("perturbed residual", rows, minus.len())?;
        jacobian.set_column(j, &((plus - minus) / (2.0 * step)));
    }

    Ok(jacobian)
}

/// Compare a factor's Jacobian against central differences of its residual.
///
/// Returns the largest absolute difference, or [`FactorError::DerivativeMismatch`] if it
/// exceeds `tolerance`.
pub fn check_jacobian(
    factor: &dyn Factor,
    values: &Values,
    epsilon: f64,
    tolerance: f64,
) -> FactorResult<f64> {
    let (residual, analytic) = factor.linearize(values)?;
    let index = values.create_index(factor.keys())?;
    check_dim("jacobian rows", residual.len(), analytic.nrows())?;
    check_dim("jacobian cols", index.tangent_dim, analytic.ncols())?;

    let numeric = numerical_jacobian(
        values,
        &index,
        |v, _| factor.linearize(v).map(|(r, _)| r),
        DEFAULT_STEP,
        epsilon,
    )?;

    let max_difference = (analytic - numeric).abs().max();
    debug!(
        "Jacobian check on [{}]: max abs difference {:.3e}",
        format_keys(factor.keys()),
        max_difference
    );
    if !(max_difference <= tolerance) {
        return Err(FactorError::DerivativeMismatch {
            keys: format_keys(factor.keys()),
            max_difference,
        }
        .log());
    }
    Ok(max_difference)
}
