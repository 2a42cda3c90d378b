use faer::{
    Mat, Side,
    linalg::solvers::Solve,
    sparse::linalg::solvers::{Llt, SymbolicLlt},
    sparse::{SparseColMat, Triplet},
};
use tracing::debug;

use crate::linalg::{LinAlgError, LinAlgResult, SparseLinearSolver};

/// Sparse LLT solver working on the lower triangle of `H`.
#[derive(Debug, Clone, Default)]
pub struct SparseCholeskySolver {
    factorizer: Option<Llt<usize, f64>>,

    /// Cached symbolic factorization, keyed by the column pointers and row indices of the
    /// pattern it was computed for.
    ///
    /// Damping only touches the diagonal, so while the Hessian pattern stays the same the
    /// symbolic analysis is reused across iterations and lambda updates.
    symbolic_factorization: Option<CachedSymbolic>,
}

#[derive(Debug, Clone)]
struct CachedSymbolic {
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
    symbolic: SymbolicLlt<usize>,
}

impl SparseCholeskySolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_factorized(&self) -> bool {
        self.factorizer.is_some()
    }

    fn symbolic_for(
        &mut self,
        matrix: &SparseColMat<usize, f64>,
    ) -> LinAlgResult<SymbolicLlt<usize>> {
        let pattern = matrix.symbolic();
        if let Some(cached) = &self.symbolic_factorization
            && cached.col_ptr == pattern.col_ptr()
            && cached.row_idx == pattern.row_idx()
        {
            // SymbolicLlt is reference-counted, so clone() is cheap
            return Ok(cached.symbolic.clone());
        }

        debug!("Computing symbolic Cholesky for {}x{} system", matrix.nrows(), matrix.ncols());
        let sym = SymbolicLlt::try_new(pattern, Side::Lower).map_err(|e| {
            LinAlgError::FactorizationFailed("Symbolic Cholesky decomposition failed".to_string())
                .log_with_source(e)
        })?;
        self.symbolic_factorization = Some(CachedSymbolic {
            col_ptr: pattern.col_ptr().to_vec(),
            row_idx: pattern.row_idx().to_vec(),
            symbolic: sym.clone(),
        });
        Ok(sym)
    }

    fn factorize_matrix(&mut self, matrix: &SparseColMat<usize, f64>) -> LinAlgResult<()> {
        self.factorizer = None;
        let sym = self.symbolic_for(matrix)?;
        let cholesky = Llt::try_new_with_symbolic(sym, matrix.as_ref(), Side::Lower)
            .map_err(|e| LinAlgError::SingularMatrix.log_with_source(e))?;
        self.factorizer = Some(cholesky);
        Ok(())
    }
}

/// Diagonal entries of a lower-triangular sparse matrix (zero where not stored).
pub(crate) fn diagonal(matrix: &SparseColMat<usize, f64>) -> Vec<f64> {
    let symbolic = matrix.symbolic();
    (0..matrix.ncols())
        .map(|col| {
            let row_indices = symbolic.row_idx_of_col_raw(col);
            let col_values = matrix.val_of_col(col);
            row_indices
                .iter()
                .position(|&row| row == col)
                .map_or(0.0, |idx| col_values[idx])
        })
        .collect()
}

impl SparseLinearSolver for SparseCholeskySolver {
    fn solve_damped(
        &mut self,
        hessian_lower: &SparseColMat<usize, f64>,
        rhs: &Mat<f64>,
        lambda: f64,
        diagonal_min: f64,
    ) -> LinAlgResult<Mat<f64>> {
        let n = hessian_lower.ncols();
        if hessian_lower.nrows() != n || rhs.nrows() != n {
            return Err(LinAlgError::InvalidInput(format!(
                "Hessian is {}x{} but rhs has {} rows",
                hessian_lower.nrows(),
                n,
                rhs.nrows()
            ))
            .log());
        }

        // H_damped = H + lambda * diag(max(H_ii, diagonal_min))
        let damping_triplets: Vec<Triplet<usize, usize, f64>> = diagonal(hessian_lower)
            .into_iter()
            .enumerate()
            .map(|(i, h_ii)| Triplet::new(i, i, lambda * h_ii.max(diagonal_min)))
            .collect();
        let damping = SparseColMat::try_new_from_triplets(n, n, &damping_triplets).map_err(|e| {
            LinAlgError::SparseMatrixCreation("Failed to create damping matrix".to_string())
                .log_with_source(e)
        })?;
        let damped = hessian_lower + damping;

        self.factorize_matrix(&damped)?;
        let factorizer = self.factorizer.as_ref().ok_or_else(|| {
            LinAlgError::InvalidInput("Factorization missing after solve".to_string()).log()
        })?;
        Ok(factorizer.solve(-rhs))
    }

    fn factorize(&mut self, hessian_lower: &SparseColMat<usize, f64>) -> LinAlgResult<()> {
        self.factorize_matrix(hessian_lower)
    }

    fn solve_factorized(&self, b: &Mat<f64>) -> LinAlgResult<Mat<f64>> {
        let factorizer = self.factorizer.as_ref().ok_or_else(|| {
            LinAlgError::InvalidInput("No factorization available".to_string()).log()
        })?;
        Ok(factorizer.solve(b))
    }

    fn reset(&mut self) {
        self.factorizer = None;
        self.symbolic_factorization = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-10;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    /// Lower triangle of [[4, 1, 0], [1, 3, 1], [0, 1, 2]]
    fn create_test_data()
    -> Result<(SparseColMat<usize, f64>, Mat<f64>), faer::sparse::CreationError> {
        let triplets = vec![
            Triplet::new(0, 0, 4.0),
            Triplet::new(1, 0, 1.0),
            Triplet::new(1, 1, 3.0),
            Triplet::new(2, 1, 1.0),
            Triplet::new(2, 2, 2.0),
        ];
        let hessian = SparseColMat::try_new_from_triplets(3, 3, &triplets)?;
        let rhs = Mat::from_fn(3, 1, |i, _| [1.0, -2.0, 0.5][i]);
        Ok((hessian, rhs))
    }

    fn full_matrix() -> [[f64; 3]; 3] {
        [[4.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 2.0]]
    }

    #[test]
    fn test_solver_creation() {
        let solver = SparseCholeskySolver::new();
        assert!(!solver.is_factorized());
        assert!(solver.symbolic_factorization.is_none());
    }

    #[test]
    fn test_undamped_solve_satisfies_system() -> TestResult {
        let mut solver = SparseCholeskySolver::new();
        let (hessian, rhs) = create_test_data()?;

        let dx = solver.solve_damped(&hessian, &rhs, 0.0, 0.0)?;
        let h = full_matrix();
        for i in 0..3 {
            let row: f64 = (0..3).map(|j| h[i][j] * dx[(j, 0)]).sum();
            assert!((row + rhs[(i, 0)]).abs() < TOLERANCE);
        }
        Ok(())
    }

    #[test]
    fn test_damping_scales_diagonal() -> TestResult {
        let mut solver = SparseCholeskySolver::new();
        let (hessian, rhs) = create_test_data()?;
        let lambda = 0.5;

        let dx = solver.solve_damped(&hessian, &rhs, lambda, 1e-6)?;
        let h = full_matrix();
        for i in 0..3 {
            let row: f64 = (0..3)
                .map(|j| {
                    let damping = if i == j { lambda * h[i][i] } else { 0.0 };
                    (h[i][j] + damping) * dx[(j, 0)]
                })
                .sum();
            assert!((row + rhs[(i, 0)]).abs() < TOLERANCE);
        }
        Ok(())
    }

    #[test]
    fn test_larger_lambda_gives_shorter_step() -> TestResult {
        let mut solver = SparseCholeskySolver::new();
        let (hessian, rhs) = create_test_data()?;

        let small = solver.solve_damped(&hessian, &rhs, 1e-3, 1e-6)?;
        let large = solver.solve_damped(&hessian, &rhs, 1e3, 1e-6)?;
        assert!(large.norm_l2() < small.norm_l2());
        Ok(())
    }

    #[test]
    fn test_symbolic_pattern_caching() -> TestResult {
        let mut solver = SparseCholeskySolver::new();
        let (hessian, rhs) = create_test_data()?;

        let sol1 = solver.solve_damped(&hessian, &rhs, 0.1, 1e-6)?;
        assert!(solver.symbolic_factorization.is_some());
        let sol2 = solver.solve_damped(&hessian, &rhs, 0.1, 1e-6)?;
        for i in 0..sol1.nrows() {
            assert!((sol1[(i, 0)] - sol2[(i, 0)]).abs() < TOLERANCE);
        }

        solver.reset();
        assert!(solver.symbolic_factorization.is_none());
        assert!(!solver.is_factorized());
        Ok(())
    }

    #[test]
    fn test_indefinite_matrix_fails() -> TestResult {
        let mut solver = SparseCholeskySolver::new();
        let triplets = vec![
            Triplet::new(0, 0, 1.0),
            Triplet::new(1, 0, 2.0),
            Triplet::new(1, 1, 1.0),
        ];
        let hessian = SparseColMat::try_new_from_triplets(2, 2, &triplets)?;
        let rhs = Mat::from_fn(2, 1, |_, _| 1.0);

        let result = solver.solve_damped(&hessian, &rhs, 0.0, 0.0);
        assert!(matches!(result, Err(LinAlgError::SingularMatrix)));
        assert!(!solver.is_factorized());
        Ok(())
    }

    #[test]
    fn test_zero_diagonal_is_floored() -> TestResult {
        // H has a zero diagonal entry; damping with diagonal_min makes it solvable.
        let mut solver = SparseCholeskySolver::new();
        let triplets = vec![Triplet::new(0, 0, 2.0), Triplet::new(1, 1, 0.0)];
        let hessian = SparseColMat::try_new_from_triplets(2, 2, &triplets)?;
        let rhs = Mat::from_fn(2, 1, |i, _| [2.0, 0.0][i]);

        let dx = solver.solve_damped(&hessian, &rhs, 1.0, 1e-3)?;
        assert!((dx[(0, 0)] + 0.5).abs() < TOLERANCE);
        assert!(dx[(1, 0)].abs() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_solve_factorized_requires_factorization() -> TestResult {
        let mut solver = SparseCholeskySolver::new();
        let (hessian, _) = create_test_data()?;
        let identity = Mat::<f64>::identity(3, 3);
        assert!(solver.solve_factorized(&identity).is_err());

        solver.factorize(&hessian)?;
        let inverse = solver.solve_factorized(&identity)?;
        let h = full_matrix();
        for i in 0..3 {
            for j in 0..3 {
                let product: f64 = (0..3).map(|k| h[i][k] * inverse[(k, j)]).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((product - expected).abs() < TOLERANCE);
            }
        }
        Ok(())
    }

    #[test]
    fn test_diagonal_extraction() -> TestResult {
        let (hessian, _) = create_test_data()?;
        assert_eq!(diagonal(&hessian), vec![4.0, 3.0, 2.0]);
        Ok(())
    }
}
