//! Factor built from a function that returns the full Gauss-Newton linearization.

use std::fmt;

use nalgebra::{DMatrix, DVector};

use super::{Factor, FactorResult, LinearizedFactor, check_unique_keys, format_keys};
use crate::core::index::Index;
use crate::core::key::Key;
use crate::core::values::Values;

/// Output of a hessian function: `(residual, jacobian, hessian, rhs)`.
pub type HessianOutput = (DVector<f64>, DMatrix<f64>, DMatrix<f64>, DVector<f64>);

/// Signature of a hessian function. It receives the values and the layout of the factor's keys
/// inside them, so it can read its inputs with [`Values::at_entry`].
pub type HessianFunc = dyn Fn(&Values, &Index) -> FactorResult<HessianOutput> + Send + Sync;

/// Factor whose user function computes `(r, J, H, rhs)` itself.
///
/// The Hessian is symmetric; only its lower triangle is read, and the upper triangle is zeroed
/// in the resulting [`LinearizedFactor`].
///
/// # Example
///
/// ```
/// use nalgebra::{DMatrix, DVector};
/// use symopt::core::key::Key;
/// use symopt::factors::{Factor, HessianFactor};
///
/// let key = Key::with_sub_super('3', 1, 4);
/// let factor = HessianFactor::new(vec![key], |values, index| {
///     let x: f64 = values.at_entry(&index.entries[0])?;
///     let (sin, cos) = (x / 2.0).sin_cos();
///     Ok((
///         DVector::from_element(1, cos),
///         DMatrix::from_element(1, 1, -0.5 * sin),
///         DMatrix::from_element(1, 1, 0.25 * sin * sin),
///         DVector::from_element(1, -0.5 * cos * sin),
///     ))
/// })
/// .unwrap();
/// assert_eq!(factor.keys(), &[key]);
/// ```
pub struct HessianFactor {
    keys: Vec<Key>,
    hessian_func: Box<HessianFunc>,
}

impl HessianFactor {
    pub fn new<F>(keys: Vec<Key>, hessian_func: F) -> FactorResult<Self>
    where
        F: Fn(&Values, &Index) -> FactorResult<HessianOutput> + Send + Sync + 'static,
    {
        check_unique_keys(&keys)?;
        Ok(Self {
            keys,
            hessian_func: Box::new(hessian_func),
        })
    }

    fn evaluate(&self, values: &Values) -> FactorResult<(Index, HessianOutput)> {
        let index = values.create_index(&self.keys)?;
        let output = (self.hessian_func)(values, &index)?;
        Ok((index, output))
    }
}

impl fmt::Debug for HessianFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HessianFactor([{}])", format_keys(&self.keys))
    }
}

impl Factor for HessianFactor {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn linearize(&self, values: &Values) -> FactorResult<(DVector<f64>, DMatrix<f64>)> {
        let linearized = self.linearized_factor(values)?;
        Ok((linearized.residual, linearized.jacobian))
    }

    fn linearized_factor(&self, values: &Values) -> FactorResult<LinearizedFactor> {
        let (index, (residual, jacobian, hessian, rhs)) = self.evaluate(values)?;
        let linearized = LinearizedFactor {
            residual,
            jacobian,
            hessian: hessian.lower_triangle(),
            rhs,
            index,
        };
        linearized.validate()?;
        Ok(linearized)
    }
}
