//! Marginal covariance blocks from a factorized Hessian.
//!
//! The marginal covariance of a variable is its diagonal block of `H⁻¹`. Instead of inverting
//! `H` entirely, only the columns of the identity belonging to the requested variables are
//! solved for, so the cost grows with the number of requested tangent dimensions rather than
//! with the full problem size.

use std::collections::HashMap;

use faer::{Mat, sparse::SparseColMat};

use crate::core::key::Key;
use crate::linalg::{LinAlgResult, SparseLinearSolver};

/// Location of one variable's block in the Hessian: first column and tangent dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CovarianceBlock {
    pub key: Key,
    pub column: usize,
    pub dim: usize,
}

/// Factorize `hessian_lower` and return the symmetric covariance block of each requested key.
pub fn compute_covariance_blocks<S: SparseLinearSolver>(
    solver: &mut S,
    hessian_lower: &SparseColMat<usize, f64>,
    blocks: &[CovarianceBlock],
) -> LinAlgResult<HashMap<Key, Mat<f64>>> {
    solver.factorize(hessian_lower)?;

    let n = hessian_lower.ncols();
    let total: usize = blocks.iter().map(|b| b.dim).sum();

    // Selected identity columns, one group per block in request order
    let mut selector = Mat::<f64>::zeros(n, total);
    let mut rhs_col = 0;
    for block in blocks {
        for i in 0..block.dim {
            selector[(block.column + i, rhs_col + i)] = 1.0;
        }
        rhs_col += block.dim;
    }

    let solution = solver.solve_factorized(&selector)?;

    let mut covariances = HashMap::with_capacity(blocks.len());
    let mut rhs_col = 0;
    for block in blocks {
        let cov = Mat::from_fn(block.dim, block.dim, |i, j| {
            let upper = solution[(block.column + i, rhs_col + j)];
            let lower = solution[(block.column + j, rhs_col + i)];
            0.5 * (upper + lower)
        });
        covariances.insert(block.key, cov);
        rhs_col += block.dim;
    }

    Ok(covariances)
}
