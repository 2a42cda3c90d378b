//! Dense matrices as optimization variables.
//!
//! `SMatrix<f64, R, C>` for every `1 <= R, C <= 9` is a supported value type. Matrices form a
//! vector space, so the tangent space equals the storage (column-major) and retraction is
//! plain addition.

use nalgebra::SMatrix;

use crate::manifold::{LieGroupOps, ManifoldResult, TypeTag, check_len};

macro_rules! impl_matrix_ops {
    ($($rows:literal),*) => {
        $( impl_matrix_ops!(@row $rows; 1, 2, 3, 4, 5, 6, 7, 8, 9); )*
    };
    (@row $rows:literal; $($cols:literal),*) => {
        $(
            impl LieGroupOps for SMatrix<f64, $rows, $cols> {
                const STORAGE_DIM: usize = $rows * $cols;
                const TANGENT_DIM: usize = $rows * $cols;

                fn type_tag() -> TypeTag {
                    TypeTag::Matrix { rows: $rows, cols: $cols }
                }

                fn identity() -> Self {
                    Self::zeros()
                }

                fn to_storage(&self, out: &mut [f64]) {
                    out.copy_from_slice(self.as_slice());
                }

                fn from_storage(data: &[f64]) -> ManifoldResult<Self> {
                    check_len(data, Self::STORAGE_DIM)?;
                    Ok(Self::from_column_slice(data))
                }

                fn retract(&self, delta: &[f64], _epsilon: f64) -> ManifoldResult<Self> {
                    check_len(delta, Self::TANGENT_DIM)?;
                    Ok(self + Self::from_column_slice(delta))
                }

                fn local_coordinates(&self, other: &Self, _epsilon: f64) -> Vec<f64> {
                    (other - self).as_slice().to_vec()
                }
            }
        )*
    };
}

impl_matrix_ops!(1, 2, 3, 4, 5, 6, 7, 8, 9);
