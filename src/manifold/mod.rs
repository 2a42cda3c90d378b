//! Variable types that can live in a [`Values`](crate::core::values::Values) store.
//!
//! Every supported type has a flat *storage* representation (what is written into the
//! contiguous `Values` buffer) and a *tangent* space in which the optimizer takes steps:
//!
//! Type                  | storage                          | tangent
//! --------------------- | -------------------------------- | -----------------------
//! `f64`                 | `[x]`                            | `[dx]`
//! [`Rot2`]              | `[re, im]`                       | `[theta]`
//! [`Rot3`]              | `[qx, qy, qz, qw]`               | `[wx, wy, wz]`
//! [`Pose2`]             | `[re, im, x, y]`                 | `[theta, dx, dy]`
//! [`Pose3`]             | `[qx, qy, qz, qw, x, y, z]`      | `[wx, wy, wz, dx, dy, dz]`
//! `SMatrix<f64, R, C>`  | column-major, `R * C` entries    | same as storage
//!
//! `retract` moves an element along a tangent vector and `local_coordinates` is its inverse:
//! `a.retract(a.local_coordinates(b)) == b`. Rotations take an `epsilon` that keeps the
//! exponential and logarithm maps well defined near the identity.
//!
//! Because a `Values` buffer mixes types, reading and writing goes through [`TypeTag`], a small
//! dispatch table keyed by the stored type rather than runtime type inspection.

use std::fmt;

use thiserror::Error;
use tracing::error;

pub mod matrix;
pub mod pose2;
pub mod pose3;
pub mod rot2;
pub mod rot3;

pub use pose2::Pose2;
pub use pose3::Pose3;
pub use rot2::Rot2;
pub use rot3::Rot3;

/// Manifold specific error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManifoldError {
    /// Storage or tangent slice has the wrong length
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Storage does not describe a valid element (e.g. zero-norm quaternion)
    #[error("Invalid manifold element: {0}")]
    InvalidElement(String),

    /// Operation requested between two different stored types
    #[error("Type mismatch: {expected} vs {actual}")]
    TypeMismatch { expected: TypeTag, actual: TypeTag },
}

impl ManifoldError {
    /// Log the error with tracing::error and return self for chaining
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }
}

pub type ManifoldResult<T> = Result<T, ManifoldError>;

/// Largest supported matrix dimension (rows and columns).
pub const MAX_MATRIX_DIM: usize = 9;

/// Storage and tangent-space operations shared by every variable type.
pub trait LieGroupOps: Clone + fmt::Debug + Send + Sync + 'static {
    /// Number of scalars in the storage representation
    const STORAGE_DIM: usize;
    /// Dimension of the tangent space
    const TANGENT_DIM: usize;

    /// Tag written next to the storage so heterogeneous buffers can be decoded.
    fn type_tag() -> TypeTag;

    fn identity() -> Self;

    /// Write the storage representation into `out` (`out.len() == STORAGE_DIM`).
    fn to_storage(&self, out: &mut [f64]);

    /// Decode an element from its storage representation.
    fn from_storage(data: &[f64]) -> ManifoldResult<Self>;

    /// Apply a tangent-space step: `self ⊞ delta`.
    fn retract(&self, delta: &[f64], epsilon: f64) -> ManifoldResult<Self>;

    /// Tangent vector `v` such that `self.retract(v) == other`.
    fn local_coordinates(&self, other: &Self, epsilon: f64) -> Vec<f64>;

    /// Convenience: storage as an owned vector.
    fn storage(&self) -> Vec<f64> {
        let mut out = vec![0.0; Self::STORAGE_DIM];
        self.to_storage(&mut out);
        out
    }
}

/// Check a slice length, used by every `from_storage`/`retract` implementation.
pub(crate) fn check_len(slice: &[f64], expected: usize) -> ManifoldResult<()> {
    if slice.len() != expected {
        return Err(ManifoldError::DimensionMismatch {
            expected,
            actual: slice.len(),
        });
    }
    Ok(())
}

impl LieGroupOps for f64 {
    const STORAGE_DIM: usize = 1;
    const TANGENT_DIM: usize = 1;

    fn type_tag() -> TypeTag {
        TypeTag::Scalar
    }

    fn identity() -> Self {
        0.0
    }

    fn to_storage(&self, out: &mut [f64]) {
        out[0] = *self;
    }

    fn from_storage(data: &[f64]) -> ManifoldResult<Self> {
        check_len(data, 1)?;
        Ok(data[0])
    }

    fn retract(&self, delta: &[f64], _epsilon: f64) -> ManifoldResult<Self> {
        check_len(delta, 1)?;
        Ok(self + delta[0])
    }

    fn local_coordinates(&self, other: &Self, _epsilon: f64) -> Vec<f64> {
        vec![other - self]
    }
}

/// Type of a value stored in a `Values` buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeTag {
    Scalar,
    Rot2,
    Rot3,
    Pose2,
    Pose3,
    /// Dense matrix with `1..=9` rows and columns
    Matrix { rows: usize, cols: usize },
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Scalar => write!(f, "Scalar"),
            TypeTag::Rot2 => write!(f, "Rot2"),
            TypeTag::Rot3 => write!(f, "Rot3"),
            TypeTag::Pose2 => write!(f, "Pose2"),
            TypeTag::Pose3 => write!(f, "Pose3"),
            TypeTag::Matrix { rows, cols } => write!(f, "Matrix{rows}x{cols}"),
        }
    }
}

impl TypeTag {
    pub fn storage_dim(&self) -> usize {
        match self {
            TypeTag::Scalar => f64::STORAGE_DIM,
            TypeTag::Rot2 => Rot2::STORAGE_DIM,
            TypeTag::Rot3 => Rot3::STORAGE_DIM,
            TypeTag::Pose2 => Pose2::STORAGE_DIM,
            TypeTag::Pose3 => Pose3::STORAGE_DIM,
            TypeTag::Matrix { rows, cols } => rows * cols,
        }
    }

    pub fn tangent_dim(&self) -> usize {
        match self {
            TypeTag::Scalar => f64::TANGENT_DIM,
            TypeTag::Rot2 => Rot2::TANGENT_DIM,
            TypeTag::Rot3 => Rot3::TANGENT_DIM,
            TypeTag::Pose2 => Pose2::TANGENT_DIM,
            TypeTag::Pose3 => Pose3::TANGENT_DIM,
            TypeTag::Matrix { rows, cols } => rows * cols,
        }
    }

    /// Whether this tag names a type that a `Values` store accepts.
    pub fn is_supported(&self) -> bool {
        match self {
            TypeTag::Matrix { rows, cols } => {
                (1..=MAX_MATRIX_DIM).contains(rows) && (1..=MAX_MATRIX_DIM).contains(cols)
            }
            _ => true,
        }
    }

    /// Retract raw storage `current` by `delta`, writing the result into `out`.
    pub fn retract_storage(
        &self,
        current: &[f64],
        delta: &[f64],
        epsilon: f64,
        out: &mut [f64],
    ) -> ManifoldResult<()> {
        check_len(current, self.storage_dim())?;
        check_len(delta, self.tangent_dim())?;
        check_len(out, self.storage_dim())?;
        match self {
            TypeTag::Scalar | TypeTag::Matrix { .. } => {
                for ((o, c), d) in out.iter_mut().zip(current).zip(delta) {
                    *o = c + d;
                }
                Ok(())
            }
            TypeTag::Rot2 => retract_as::<Rot2>(current, delta, epsilon, out),
            TypeTag::Rot3 => retract_as::<Rot3>(current, delta, epsilon, out),
            TypeTag::Pose2 => retract_as::<Pose2>(current, delta, epsilon, out),
            TypeTag::Pose3 => retract_as::<Pose3>(current, delta, epsilon, out),
        }
    }

    /// Tangent vector from storage `a` to storage `b`, written into `out`.
    pub fn local_coordinates_storage(
        &self,
        a: &[f64],
        b: &[f64],
        epsilon: f64,
        out: &mut [f64],
    ) -> ManifoldResult<()> {
        check_len(a, self.storage_dim())?;
        check_len(b, self.storage_dim())?;
        check_len(out, self.tangent_dim())?;
        match self {
            TypeTag::Scalar | TypeTag::Matrix { .. } => {
                for ((o, x), y) in out.iter_mut().zip(a).zip(b) {
                    *o = y - x;
                }
                Ok(())
            }
            TypeTag::Rot2 => local_coordinates_as::<Rot2>(a, b, epsilon, out),
            TypeTag::Rot3 => local_coordinates_as::<Rot3>(a, b, epsilon, out),
            TypeTag::Pose2 => local_coordinates_as::<Pose2>(a, b, epsilon, out),
            TypeTag::Pose3 => local_coordinates_as::<Pose3>(a, b, epsilon, out),
        }
    }
}

fn retract_as<T: LieGroupOps>(
    current: &[f64],
    delta: &[f64],
    epsilon: f64,
    out: &mut [f64],
) -> ManifoldResult<()> {
    T::from_storage(current)?
        .retract(delta, epsilon)?
        .to_storage(out);
    Ok(())
}

fn local_coordinates_as<T: LieGroupOps>(
    a: &[f64],
    b: &[f64],
    epsilon: f64,
    out: &mut [f64],
) -> ManifoldResult<()> {
    let a = T::from_storage(a)?;
    let b = T::from_storage(b)?;
    out.copy_from_slice(&a.local_coordinates(&b, epsilon));
    Ok(())
}
