//! Global linearization of a factor graph at a point.
//!
//! [`Linearizer`] evaluates every factor, then scatters the local blocks into one sparse system:
//!
//! - `residual`: all factor residuals stacked in factor order (`N x 1`)
//! - `jacobian`: `N x M`, one column per tangent dimension of the optimized keys
//! - `hessian_lower`: lower triangle (with diagonal) of `JᵀJ`, `M x M`
//! - `rhs`: `Jᵀr`, `M x 1`
//!
//! Factor keys that are not among the optimized keys are held constant: their Jacobian columns
//! are dropped.
//!
//! The sparsity patterns only depend on which keys each factor touches and on their types, so
//! they are computed once and reused while those stay the same. Numeric values are filled in
//! the exact order used to build the patterns and mapped with the cached argsort.

use std::collections::HashMap;

use faer::{
    Mat,
    sparse::{Argsort, Pair, SparseColMat, SymbolicSparseColMat},
};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

use crate::{
    core::{CoreError, CoreResult, index::Index, key::Key, values::Values},
    error::SymOptResult,
    factors::{Factor, FactorResult, LinearizedFactor},
    linalg::CovarianceBlock,
    manifold::TypeTag,
};

/// Assembled linear system at one linearization point.
#[derive(Debug, Clone)]
pub struct Linearization {
    pub residual: Mat<f64>,
    pub jacobian: SparseColMat<usize, f64>,
    pub hessian_lower: SparseColMat<usize, f64>,
    pub rhs: Mat<f64>,
    initialized: bool,
}

impl Default for Linearization {
    fn default() -> Self {
        Self {
            residual: Mat::zeros(0, 1),
            jacobian: empty_sparse(0, 0),
            hessian_lower: empty_sparse(0, 0),
            rhs: Mat::zeros(0, 1),
            initialized: false,
        }
    }
}

fn empty_sparse(nrows: usize, ncols: usize) -> SparseColMat<usize, f64> {
    let symbolic = SymbolicSparseColMat::new_checked(nrows, ncols, vec![0; ncols + 1], None, vec![]);
    SparseColMat::new(symbolic, vec![])
}

impl Linearization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn set_initialized(&mut self, initialized: bool) {
        self.initialized = initialized;
    }

    /// Clear all blocks and mark the linearization uninitialized.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn num_residuals(&self) -> usize {
        self.residual.nrows()
    }

    pub fn num_variables(&self) -> usize {
        self.rhs.nrows()
    }

    /// `½‖r‖²`
    pub fn error(&self) -> f64 {
        let norm = self.residual.norm_l2();
        0.5 * norm * norm
    }

    /// Error predicted by the linear model after a step: `½‖r + J·step‖²`.
    pub fn linear_error(&self, step: &Mat<f64>) -> CoreResult<f64> {
        if step.nrows() != self.jacobian.ncols() || step.ncols() != 1 {
            return Err(CoreError::DimensionMismatch(format!(
                "Step is {}x{}, expected {}x1",
                step.nrows(),
                step.ncols(),
                self.jacobian.ncols()
            ))
            .log());
        }
        let jacobian_step: Mat<f64> = &self.jacobian * step;
        let predicted = &self.residual + &jacobian_step;
        let norm = predicted.norm_l2();
        Ok(0.5 * norm * norm)
    }
}

/// Symbolic structure for sparse matrix operations.
///
/// Contains the sparsity pattern and the argsort mapping values, given in emission order, onto
/// the column-major storage of the pattern.
#[derive(Debug, Clone)]
pub struct SymbolicStructure {
    pub pattern: SymbolicSparseColMat<usize>,
    pub order: Argsort<usize>,
}

/// Columns of one optimized key within one factor's local Jacobian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnBlock {
    local: usize,
    global: usize,
    dim: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FactorLayout {
    row_offset: usize,
    residual_dim: usize,
    /// Key and type of every factor input, optimized or not
    inputs: Vec<(Key, TypeTag)>,
    blocks: Vec<ColumnBlock>,
}

#[derive(Debug, Clone)]
struct Layout {
    /// Key and type of every optimized key, in column order
    state: Vec<(Key, TypeTag)>,
    factors: Vec<FactorLayout>,
    columns: Vec<CovarianceBlock>,
    num_residuals: usize,
    num_columns: usize,
    jacobian: SymbolicStructure,
    hessian: SymbolicStructure,
}

/// Builds [`Linearization`]s for a fixed, ordered set of optimized keys.
#[derive(Debug, Clone)]
pub struct Linearizer {
    keys: Vec<Key>,
    layout: Option<Layout>,
}

impl Linearizer {
    pub fn new(keys: Vec<Key>) -> Self {
        Self { keys, layout: None }
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Whether the sparsity structure has been computed.
    pub fn is_initialized(&self) -> bool {
        self.layout.is_some()
    }

    /// Evaluate all factors at `values` and assemble the global system.
    pub fn relinearize(
        &mut self,
        factors: &[Box<dyn Factor>],
        values: &Values,
    ) -> SymOptResult<Linearization> {
        let linearized = linearize_factors(factors, values)?;
        let state_index = values.create_index(&self.keys)?;

        let needs_layout = match &self.layout {
            Some(layout) => !layout_matches(layout, &state_index, &linearized),
            None => true,
        };
        if needs_layout {
            self.layout = Some(build_layout(&state_index, &linearized)?);
        }
        let layout = self.layout.as_ref().ok_or_else(|| {
            CoreError::InvalidState("Linearizer layout missing after build".to_string()).log()
        })?;

        Ok(assemble(layout, &linearized)?)
    }

    /// Column ranges of `keys` in the Hessian, for covariance extraction.
    pub fn covariance_blocks(&self, keys: &[Key]) -> CoreResult<Vec<CovarianceBlock>> {
        let layout = self.layout.as_ref().ok_or_else(|| {
            CoreError::InvalidState("Linearizer has not been run yet".to_string()).log()
        })?;
        keys.iter()
            .map(|key| {
                layout
                    .columns
                    .iter()
                    .find(|block| block.key == *key)
                    .copied()
                    .ok_or(CoreError::NotFound(*key))
            })
            .collect()
    }

    /// Total tangent dimension of the optimized keys, once known.
    pub fn num_columns(&self) -> Option<usize> {
        self.layout.as_ref().map(|l| l.num_columns)
    }
}

fn linearize_factors(
    factors: &[Box<dyn Factor>],
    values: &Values,
) -> FactorResult<Vec<LinearizedFactor>> {
    #[cfg(feature = "parallel")]
    let linearized: FactorResult<Vec<LinearizedFactor>> = factors
        .par_iter()
        .map(|factor| factor.linearized_factor(values))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let linearized: FactorResult<Vec<LinearizedFactor>> = factors
        .iter()
        .map(|factor| factor.linearized_factor(values))
        .collect();

    linearized
}

fn same_inputs(expected: &[(Key, TypeTag)], index: &Index) -> bool {
    expected.len() == index.len()
        && expected
            .iter()
            .zip(&index.entries)
            .all(|(&(key, tag), entry)| key == entry.key && tag == entry.type_tag)
}

fn layout_matches(layout: &Layout, state_index: &Index, linearized: &[LinearizedFactor]) -> bool {
    same_inputs(&layout.state, state_index)
        && layout.factors.len() == linearized.len()
        && layout.factors.iter().zip(linearized).all(|(fl, lf)| {
            fl.residual_dim == lf.residual.len() && same_inputs(&fl.inputs, &lf.index)
        })
}

fn build_layout(state_index: &Index, linearized: &[LinearizedFactor]) -> CoreResult<Layout> {
    let mut columns = Vec::with_capacity(state_index.len());
    let mut key_columns = HashMap::with_capacity(state_index.len());
    for (entry, column) in state_index.entries.iter().zip(state_index.tangent_offsets()) {
        columns.push(CovarianceBlock {
            key: entry.key,
            column,
            dim: entry.tangent_dim,
        });
        key_columns.insert(entry.key, (column, entry.tangent_dim));
    }

    let mut factors = Vec::with_capacity(linearized.len());
    let mut row_offset = 0;
    for lf in linearized {
        let mut blocks = Vec::new();
        let mut inputs = Vec::with_capacity(lf.index.len());
        for (entry, local) in lf.index.entries.iter().zip(lf.index.tangent_offsets()) {
            inputs.push((entry.key, entry.type_tag));
            if let Some(&(global, dim)) = key_columns.get(&entry.key) {
                if dim != entry.tangent_dim {
                    return Err(CoreError::DimensionMismatch(format!(
                        "Key {} has tangent dimension {} in the factor and {} in the state",
                        entry.key, entry.tangent_dim, dim
                    ))
                    .log());
                }
                blocks.push(ColumnBlock { local, global, dim });
            }
        }
        factors.push(FactorLayout {
            row_offset,
            residual_dim: lf.residual.len(),
            inputs,
            blocks,
        });
        row_offset += lf.residual.len();
    }

    let num_residuals = row_offset;
    let num_columns = state_index.tangent_dim;

    let mut jacobian_indices = Vec::<Pair<usize, usize>>::new();
    for_each_jacobian_entry(&factors, |_, row, col, _, _| {
        jacobian_indices.push(Pair::new(row, col));
    });
    let (pattern, order) =
        SymbolicSparseColMat::try_new_from_indices(num_residuals, num_columns, &jacobian_indices)
            .map_err(|e| {
                CoreError::SymbolicStructure("Failed to build Jacobian pattern".to_string())
                    .log_with_source(e)
            })?;
    let jacobian = SymbolicStructure { pattern, order };

    let mut hessian_indices = Vec::<Pair<usize, usize>>::new();
    for_each_hessian_entry(&factors, num_columns, |_, row, col, _, _| {
        hessian_indices.push(Pair::new(row, col));
    });
    let (pattern, order) =
        SymbolicSparseColMat::try_new_from_indices(num_columns, num_columns, &hessian_indices)
            .map_err(|e| {
                CoreError::SymbolicStructure("Failed to build Hessian pattern".to_string())
                    .log_with_source(e)
            })?;
    let hessian = SymbolicStructure { pattern, order };

    debug!(
        "Linearization layout: {} factors, {} residuals, {} columns, {} Jacobian / {} Hessian entries",
        factors.len(),
        num_residuals,
        num_columns,
        jacobian_indices.len(),
        hessian_indices.len()
    );

    Ok(Layout {
        state: state_index
            .entries
            .iter()
            .map(|entry| (entry.key, entry.type_tag))
            .collect(),
        factors,
        columns,
        num_residuals,
        num_columns,
        jacobian,
        hessian,
    })
}

/// Visit Jacobian entries as `(factor, row, col, local_row, local_col)`.
fn for_each_jacobian_entry<F>(factors: &[FactorLayout], mut visit: F)
where
    F: FnMut(usize, usize, usize, usize, usize),
{
    for (factor_idx, fl) in factors.iter().enumerate() {
        for block in &fl.blocks {
            for r in 0..fl.residual_dim {
                for c in 0..block.dim {
                    visit(factor_idx, fl.row_offset + r, block.global + c, r, block.local + c);
                }
            }
        }
    }
}

/// Visit lower-triangle Hessian entries as `(factor, row, col, local_row, local_col)`, followed
/// by one structural entry per diagonal element (`factor == None`) so that damping never
/// changes the pattern.
fn for_each_hessian_entry<F>(factors: &[FactorLayout], num_columns: usize, mut visit: F)
where
    F: FnMut(Option<usize>, usize, usize, usize, usize),
{
    for (factor_idx, fl) in factors.iter().enumerate() {
        for a in &fl.blocks {
            for b in &fl.blocks {
                for i in 0..a.dim {
                    for j in 0..b.dim {
                        let (row, col) = (a.global + i, b.global + j);
                        if row >= col {
                            visit(Some(factor_idx), row, col, a.local + i, b.local + j);
                        }
                    }
                }
            }
        }
    }
    for i in 0..num_columns {
        visit(None, i, i, 0, 0);
    }
}

fn assemble(layout: &Layout, linearized: &[LinearizedFactor]) -> CoreResult<Linearization> {
    let mut residual = Mat::<f64>::zeros(layout.num_residuals, 1);
    let mut rhs = Mat::<f64>::zeros(layout.num_columns, 1);
    for (fl, lf) in layout.factors.iter().zip(linearized) {
        for r in 0..fl.residual_dim {
            residual[(fl.row_offset + r, 0)] = lf.residual[r];
        }
        for block in &fl.blocks {
            for c in 0..block.dim {
                rhs[(block.global + c, 0)] += lf.rhs[block.local + c];
            }
        }
    }

    let mut jacobian_values = Vec::with_capacity(layout.jacobian.pattern.compute_nnz());
    for_each_jacobian_entry(&layout.factors, |factor_idx, _, _, lr, lc| {
        jacobian_values.push(linearized[factor_idx].jacobian[(lr, lc)]);
    });
    let jacobian = SparseColMat::new_from_argsort(
        layout.jacobian.pattern.clone(),
        &layout.jacobian.order,
        jacobian_values.as_slice(),
    )
    .map_err(|e| {
        CoreError::SymbolicStructure("Failed to create sparse Jacobian from argsort".to_string())
            .log_with_source(e)
    })?;

    let mut hessian_values = Vec::with_capacity(layout.hessian.pattern.compute_nnz());
    for_each_hessian_entry(
        &layout.factors,
        layout.num_columns,
        |factor_idx, _, _, lr, lc| {
            let value = factor_idx.map_or(0.0, |idx| {
                // Local Hessians only carry their lower triangle
                let (p, q) = if lr >= lc { (lr, lc) } else { (lc, lr) };
                linearized[idx].hessian[(p, q)]
            });
            hessian_values.push(value);
        },
    );
    let hessian_lower = SparseColMat::new_from_argsort(
        layout.hessian.pattern.clone(),
        &layout.hessian.order,
        hessian_values.as_slice(),
    )
    .map_err(|e| {
        CoreError::SymbolicStructure("Failed to create sparse Hessian from argsort".to_string())
            .log_with_source(e)
    })?;

    Ok(Linearization {
        residual,
        jacobian,
        hessian_lower,
        rhs,
        initialized: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::{HessianFactor, JacobianFactor};
    use crate::manifold::{LieGroupOps, Pose2, Rot2};
    use nalgebra::{DMatrix, DVector};

    const TOLERANCE: f64 = 1e-12;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    /// r = [a - 1, a + 2b] with J = [[1, 0], [1, 2]]
    fn linear_factor(a: Key, b: Key) -> FactorResult<JacobianFactor> {
        JacobianFactor::new(vec![a, b], |values, index| {
            let a: f64 = values.at_entry(&index.entries[0])?;
            let b: f64 = values.at_entry(&index.entries[1])?;
            Ok((
                DVector::from_vec(vec![a - 1.0, a + 2.0 * b]),
                DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 2.0]),
            ))
        })
    }

    fn prior_factor(key: Key, target: f64) -> FactorResult<JacobianFactor> {
        JacobianFactor::new(vec![key], move |values, index| {
            let x: f64 = values.at_entry(&index.entries[0])?;
            Ok((
                DVector::from_element(1, x - target),
                DMatrix::from_element(1, 1, 1.0),
            ))
        })
    }

    fn dense(matrix: &SparseColMat<usize, f64>) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(matrix.nrows(), matrix.ncols());
        let symbolic = matrix.symbolic();
        for col in 0..matrix.ncols() {
            let rows = symbolic.row_idx_of_col_raw(col);
            let vals = matrix.val_of_col(col);
            for (idx, &row) in rows.iter().enumerate() {
                out[(row, col)] += vals[idx];
            }
        }
        out
    }

    #[test]
    fn test_default_is_uninitialized() {
        let mut lin = Linearization::default();
        assert!(!lin.is_initialized());
        lin.set_initialized(true);
        assert!(lin.is_initialized());
        lin.reset();
        assert!(!lin.is_initialized());
        lin.set_initialized(true);
        lin.set_initialized(false);
        assert!(!lin.is_initialized());
        assert_eq!(lin.error(), 0.0);
    }

    #[test]
    fn test_assembly_sums_shared_blocks() -> TestResult {
        let (a, b) = (Key::new('a'), Key::new('b'));
        let factors: Vec<Box<dyn Factor>> = vec![
            Box::new(linear_factor(a, b)?),
            Box::new(prior_factor(b, 3.0)?),
        ];
        let mut values = Values::new();
        values.set(a, 2.0);
        values.set(b, 1.0);

        let mut linearizer = Linearizer::new(vec![a, b]);
        let lin = linearizer.relinearize(&factors, &values)?;

        assert!(lin.is_initialized());
        assert_eq!(lin.num_residuals(), 3);
        assert_eq!(lin.num_variables(), 2);

        // r = [1, 4, -2], J = [[1, 0], [1, 2], [0, 1]]
        assert_eq!(lin.residual[(2, 0)], -2.0);
        assert!((lin.error() - 10.5).abs() < TOLERANCE);
        let j = dense(&lin.jacobian);
        assert_eq!(j, DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 2.0, 0.0, 1.0]));

        // JᵀJ = [[2, 2], [2, 5]] (lower stored), Jᵀr = [5, 6]
        let h = dense(&lin.hessian_lower);
        assert_eq!(h, DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 2.0, 5.0]));
        assert_eq!(lin.rhs[(0, 0)], 5.0);
        assert_eq!(lin.rhs[(1, 0)], 6.0);
        Ok(())
    }

    #[test]
    fn test_key_order_determines_columns() -> TestResult {
        let (a, b) = (Key::new('a'), Key::new('b'));
        let factors: Vec<Box<dyn Factor>> = vec![Box::new(linear_factor(a, b)?)];
        let mut values = Values::new();
        values.set(a, 2.0);
        values.set(b, 1.0);

        // b first: JᵀJ in (b, a) order is [[4, 2], [2, 2]]
        let mut linearizer = Linearizer::new(vec![b, a]);
        let lin = linearizer.relinearize(&factors, &values)?;
        let h = dense(&lin.hessian_lower);
        assert_eq!(h, DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 2.0, 2.0]));
        assert_eq!(linearizer.covariance_blocks(&[a])?[0].column, 1);
        Ok(())
    }

    #[test]
    fn test_unoptimized_keys_are_held_constant() -> TestResult {
        let (a, b) = (Key::new('a'), Key::new('b'));
        let factors: Vec<Box<dyn Factor>> = vec![Box::new(linear_factor(a, b)?)];
        let mut values = Values::new();
        values.set(a, 2.0);
        values.set(b, 1.0);

        let mut linearizer = Linearizer::new(vec![b]);
        let lin = linearizer.relinearize(&factors, &values)?;
        assert_eq!(lin.jacobian.ncols(), 1);
        assert_eq!(dense(&lin.jacobian), DMatrix::from_row_slice(2, 1, &[0.0, 2.0]));
        assert_eq!(lin.rhs[(0, 0)], 8.0);
        assert!(matches!(
            linearizer.covariance_blocks(&[a]),
            Err(CoreError::NotFound(k)) if k == a
        ));
        Ok(())
    }

    #[test]
    fn test_hessian_factor_upper_blocks_are_mirrored() -> TestResult {
        // Factor key order (a, b) but state order (b, a): the Hessian block read for
        // (row b, col a) comes from the factor's lower triangle at (b, a).
        let (a, b) = (Key::new('a'), Key::new('b'));
        let factor = HessianFactor::new(vec![a, b], |_, _| {
            Ok((
                DVector::zeros(1),
                DMatrix::zeros(1, 2),
                DMatrix::from_row_slice(2, 2, &[3.0, 1.0, 1.0, 5.0]),
                DVector::from_vec(vec![0.5, -0.5]),
            ))
        })?;
        let factors: Vec<Box<dyn Factor>> = vec![Box::new(factor)];
        let mut values = Values::new();
        values.set(a, 0.0);
        values.set(b, 0.0);

        let mut linearizer = Linearizer::new(vec![b, a]);
        let lin = linearizer.relinearize(&factors, &values)?;
        let h = dense(&lin.hessian_lower);
        assert_eq!(h, DMatrix::from_row_slice(2, 2, &[5.0, 0.0, 1.0, 3.0]));
        assert_eq!(lin.rhs[(0, 0)], -0.5);
        Ok(())
    }

    #[test]
    fn test_structure_is_reused_and_rebuilt() -> TestResult {
        let (a, p) = (Key::new('a'), Key::new('p'));
        let factors: Vec<Box<dyn Factor>> = vec![Box::new(prior_factor(a, 1.0)?)];
        let mut values = Values::new();
        values.set(a, 0.0);
        values.set(p, Pose2::identity());

        let mut linearizer = Linearizer::new(vec![a]);
        assert!(!linearizer.is_initialized());
        let first = linearizer.relinearize(&factors, &values)?;
        assert!(linearizer.is_initialized());
        values.set(a, 4.0);
        let second = linearizer.relinearize(&factors, &values)?;
        assert_eq!(first.residual[(0, 0)], -1.0);
        assert_eq!(second.residual[(0, 0)], 3.0);
        assert_eq!(linearizer.num_columns(), Some(1));
        Ok(())
    }

    #[test]
    fn test_type_change_with_same_dimension_rebuilds_layout() -> TestResult {
        let p = Key::new('p');
        let factor = HessianFactor::new(vec![p], |_, _| {
            Ok((
                DVector::from_element(1, 1.0),
                DMatrix::from_element(1, 1, 2.0),
                DMatrix::from_element(1, 1, 4.0),
                DVector::from_element(1, 2.0),
            ))
        })?;
        let factors: Vec<Box<dyn Factor>> = vec![Box::new(factor)];
        let mut values = Values::new();
        values.set(p, 0.0);

        let state = |linearizer: &Linearizer| {
            linearizer
                .layout
                .as_ref()
                .map(|layout| (layout.state.clone(), layout.factors[0].inputs.clone()))
        };

        let mut linearizer = Linearizer::new(vec![p]);
        linearizer.relinearize(&factors, &values)?;
        let scalar = vec![(p, TypeTag::Scalar)];
        assert_eq!(state(&linearizer), Some((scalar.clone(), scalar)));

        // Rot2 has the same tangent dimension as a scalar.
        values.set(p, Rot2::from_angle(0.1));
        let lin = linearizer.relinearize(&factors, &values)?;
        let rotation = vec![(p, TypeTag::Rot2)];
        assert_eq!(state(&linearizer), Some((rotation.clone(), rotation)));
        assert_eq!(dense(&lin.hessian_lower), DMatrix::from_element(1, 1, 4.0));
        Ok(())
    }

    #[test]
    fn test_linear_error_matches_quadratic_model() -> TestResult {
        let (a, b) = (Key::new('a'), Key::new('b'));
        let factors: Vec<Box<dyn Factor>> = vec![Box::new(linear_factor(a, b)?)];
        let mut values = Values::new();
        values.set(a, 2.0);
        values.set(b, 1.0);

        let mut linearizer = Linearizer::new(vec![a, b]);
        let lin = linearizer.relinearize(&factors, &values)?;

        let zero = Mat::<f64>::zeros(2, 1);
        assert!((lin.linear_error(&zero)? - lin.error()).abs() < TOLERANCE);

        // The model is exact for a linear residual: step to the solution a = 1, b = -0.5.
        let step = Mat::from_fn(2, 1, |i, _| [-1.0, -1.5][i]);
        assert!(lin.linear_error(&step)?.abs() < TOLERANCE);

        assert!(lin.linear_error(&Mat::zeros(3, 1)).is_err());
        Ok(())
    }

    #[test]
    fn test_missing_state_key_fails() -> TestResult {
        let a = Key::new('a');
        let factors: Vec<Box<dyn Factor>> = vec![Box::new(prior_factor(a, 1.0)?)];
        let mut values = Values::new();
        values.set(a, 0.0);

        let mut linearizer = Linearizer::new(vec![a, Key::new('z')]);
        assert!(linearizer.relinearize(&factors, &values).is_err());
        Ok(())
    }
}
