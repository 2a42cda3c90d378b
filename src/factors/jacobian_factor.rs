//! Factor built from a residual/Jacobian function, with derived Gauss-Newton terms.

use std::fmt;

use nalgebra::{DMatrix, DVector};

use super::numerical::{DEFAULT_STEP, numerical_jacobian};
use super::{Factor, FactorResult, LinearizedFactor, check_dim, check_unique_keys, format_keys};
use crate::core::index::Index;
use crate::core::key::Key;
use crate::core::values::Values;

/// Signature of a jacobian function: `(residual, jacobian)` at the given values.
pub type JacobianFunc =
    dyn Fn(&Values, &Index) -> FactorResult<(DVector<f64>, DMatrix<f64>)> + Send + Sync;

/// Factor whose user function returns `(r, J)`; `H = JᵀJ` (lower) and `rhs = Jᵀr` are derived.
pub struct JacobianFactor {
    keys: Vec<Key>,
    jacobian_func: Box<JacobianFunc>,
}

impl JacobianFactor {
    pub fn new<F>(keys: Vec<Key>, jacobian_func: F) -> FactorResult<Self>
    where
        F: Fn(&Values, &Index) -> FactorResult<(DVector<f64>, DMatrix<f64>)>
            + Send
            + Sync
            + 'static,
    {
        check_unique_keys(&keys)?;
        Ok(Self {
            keys,
            jacobian_func: Box::new(jacobian_func),
        })
    }

    /// Build a factor from a residual function alone. The Jacobian is taken by central
    /// differences in tangent space, retracting with `epsilon`.
    pub fn from_residual<F>(keys: Vec<Key>, residual_func: F, epsilon: f64) -> FactorResult<Self>
    where
        F: Fn(&Values, &Index) -> FactorResult<DVector<f64>> + Send + Sync + 'static,
    {
        Self::new(keys, move |values, index| {
            let residual = residual_func(values, index)?;
            let jacobian =
                numerical_jacobian(values, index, &residual_func, DEFAULT_STEP, epsilon)?;
            Ok((residual, jacobian))
        })
    }

    fn evaluate(&self, values: &Values) -> FactorResult<(Index, DVector<f64>, DMatrix<f64>)> {
        let index = values.create_index(&self.keys)?;
        let (residual, jacobian) = (self.jacobian_func)(values, &index)?;
        check_dim("jacobian rows", residual.len(), jacobian.nrows())?;
        check_dim("jacobian cols", index.tangent_dim, jacobian.ncols())?;
        Ok((index, residual, jacobian))
    }
}

impl fmt::Debug for JacobianFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JacobianFactor([{}])", format_keys(&self.keys))
    }
}

impl Factor for JacobianFactor {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn linearize(&self, values: &Values) -> FactorResult<(DVector<f64>, DMatrix<f64>)> {
        let (_, residual, jacobian) = self.evaluate(values)?;
        Ok((residual, jacobian))
    }

    fn linearized_factor(&self, values: &Values) -> FactorResult<LinearizedFactor> {
        let (index, residual, jacobian) = self.evaluate(values)?;
        let hessian = jacobian.tr_mul(&jacobian).lower_triangle();
        let rhs = jacobian.tr_mul(&residual);
        Ok(LinearizedFactor {
            residual,
            jacobian,
            hessian,
            rhs,
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::FactorError;
    use crate::manifold::{LieGroupOps, Pose2};

    const TOLERANCE: f64 = 1e-12;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_derived_hessian_and_rhs() -> TestResult {
        let (a, b) = (Key::new('a'), Key::new('b'));
        let factor = JacobianFactor::new(vec![a, b], |values, index| {
            let a: f64 = values.at_entry(&index.entries[0])?;
            let b: f64 = values.at_entry(&index.entries[1])?;
            Ok((
                DVector::from_vec(vec![a - 1.0, a + 2.0 * b]),
                DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 2.0]),
            ))
        })?;

        let mut values = Values::new();
        values.set(a, 2.0);
        values.set(b, 1.0);
        let linearized = factor.linearized_factor(&values)?;

        // JᵀJ = [[2, 2], [2, 4]], Jᵀr with r = [1, 4] is [5, 8]
        assert_eq!(linearized.hessian, DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 2.0, 4.0]));
        assert_eq!(linearized.rhs, DVector::from_vec(vec![5.0, 8.0]));
        assert!((linearized.error() - 8.5).abs() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_wrong_jacobian_shape() -> TestResult {
        let key = Key::new('p');
        let factor = JacobianFactor::new(vec![key], |_, _| {
            Ok((DVector::zeros(3), DMatrix::zeros(3, 4)))
        })?;
        let mut values = Values::new();
        values.set(key, Pose2::identity());
        assert!(matches!(
            factor.linearize(&values),
            Err(FactorError::InvalidDimension {
                expected: 3,
                actual: 4,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn test_from_residual_matches_analytic() -> TestResult {
        let key = Key::new('x');
        let factor = JacobianFactor::from_residual(
            vec![key],
            |values, index| {
                let x: f64 = values.at_entry(&index.entries[0])?;
                Ok(DVector::from_element(1, (x / 2.0).cos()))
            },
            1e-9,
        )?;

        let mut values = Values::new();
        values.set(key, 3.0);
        let (residual, jacobian) = factor.linearize(&values)?;
        assert!((residual[0] - 1.5f64.cos()).abs() < TOLERANCE);
        assert!((jacobian[(0, 0)] + 0.5 * 1.5f64.sin()).abs() < 1e-8);
        Ok(())
    }

    #[test]
    fn test_pose2_prior_from_residual() -> TestResult {
        let key = Key::with_sub('x', 0);
        let target = Pose2::from_xy_angle(1.0, -1.0, 0.3);
        let factor = JacobianFactor::from_residual(
            vec![key],
            move |values, index| {
                let pose: Pose2 = values.at_entry(&index.entries[0])?;
                Ok(DVector::from_vec(target.local_coordinates(&pose, 1e-9)))
            },
            1e-9,
        )?;

        let mut values = Values::new();
        values.set(key, Pose2::from_xy_angle(1.2, -0.8, 0.1));
        let linearized = factor.linearized_factor(&values)?;
        // Residual is the tangent offset, so its Jacobian is the identity.
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((linearized.jacobian[(i, j)] - expected).abs() < 1e-6);
            }
        }
        Ok(())
    }
}
