//! Rot2 - rotations in the plane.
//!
//! Stored as a unit complex number `[re, im]`; the tangent space is the rotation angle.

use std::{
    fmt,
    fmt::{Display, Formatter},
    ops::Mul,
};

use nalgebra::{Complex, Matrix2, UnitComplex, Vector2};

use crate::manifold::{LieGroupOps, ManifoldError, ManifoldResult, TypeTag, check_len};

/// 2D rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rot2 {
    complex: UnitComplex<f64>,
}

impl Display for Rot2 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Rot2(angle: {:.4})", self.angle())
    }
}

impl Rot2 {
    pub fn new(complex: UnitComplex<f64>) -> Self {
        Self { complex }
    }

    /// Rotation by `angle` radians.
    pub fn from_angle(angle: f64) -> Self {
        Self::new(UnitComplex::new(angle))
    }

    pub fn angle(&self) -> f64 {
        self.complex.angle()
    }

    pub fn complex(&self) -> UnitComplex<f64> {
        self.complex
    }

    pub fn inverse(&self) -> Self {
        Self::new(self.complex.inverse())
    }

    pub fn rotation_matrix(&self) -> Matrix2<f64> {
        self.complex.to_rotation_matrix().into_inner()
    }

    pub fn rotate(&self, v: &Vector2<f64>) -> Vector2<f64> {
        self.complex * v
    }

    /// Uniformly distributed random rotation.
    pub fn random() -> Self {
        Self::from_angle((rand::random::<f64>() * 2.0 - 1.0) * std::f64::consts::PI)
    }

    /// Approximate equality on the tangent space.
    pub fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        self.local_coordinates(other, 0.0)[0].abs() < tolerance
    }
}

impl Mul for Rot2 {
    type Output = Rot2;

    fn mul(self, rhs: Rot2) -> Rot2 {
        Rot2::new(self.complex * rhs.complex)
    }
}

impl LieGroupOps for Rot2 {
    const STORAGE_DIM: usize = 2;
    const TANGENT_DIM: usize = 1;

    fn type_tag() -> TypeTag {
        TypeTag::Rot2
    }

    fn identity() -> Self {
        Self::new(UnitComplex::identity())
    }

    fn to_storage(&self, out: &mut [f64]) {
        out[0] = self.complex.re;
        out[1] = self.complex.im;
    }

    fn from_storage(data: &[f64]) -> ManifoldResult<Self> {
        check_len(data, Self::STORAGE_DIM)?;
        let complex = Complex::new(data[0], data[1]);
        if complex.norm_sqr() <= f64::EPSILON {
            return Err(ManifoldError::InvalidElement(
                "Rot2 storage has zero norm".to_string(),
            ));
        }
        Ok(Self::new(UnitComplex::from_complex(complex)))
    }

    fn retract(&self, delta: &[f64], _epsilon: f64) -> ManifoldResult<Self> {
        check_len(delta, Self::TANGENT_DIM)?;
        Ok(*self * Self::from_angle(delta[0]))
    }

    fn local_coordinates(&self, other: &Self, _epsilon: f64) -> Vec<f64> {
        vec![(self.inverse() * *other).angle()]
    }
}
