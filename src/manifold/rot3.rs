//! Rot3 - rotations in 3D.
//!
//! Rot3 elements are represented with nalgebra's `UnitQuaternion` and stored as `[x, y, z, w]`.
//! Tangent vectors are axis-angle vectors in R³ (direction is the axis, norm the angle).
//!
//! The exponential map is regularized by `epsilon`:
//!
//! ```text
//! θ = sqrt(|v|² + ε²)
//! q = [v · sin(θ/2) / θ, cos(θ/2)]
//! ```
//!
//! so it stays smooth at the identity, and the logarithm falls back to its small-angle
//! expansion when the vector part of the quaternion is below `epsilon`.

use std::{
    fmt,
    fmt::{Display, Formatter},
    ops::Mul,
};

use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};

use crate::manifold::{LieGroupOps, ManifoldError, ManifoldResult, TypeTag, check_len};

/// 3D rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rot3 {
    quaternion: UnitQuaternion<f64>,
}

impl Display for Rot3 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let q = self.quaternion.quaternion();
        write!(
            f,
            "Rot3(quaternion: [x: {:.4}, y: {:.4}, z: {:.4}, w: {:.4}])",
            q.i, q.j, q.k, q.w
        )
    }
}

impl Rot3 {
    pub fn new(quaternion: UnitQuaternion<f64>) -> Self {
        Self { quaternion }
    }

    /// Create from (possibly unnormalized) quaternion coefficients.
    pub fn from_quaternion_coeffs(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self::new(UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)))
    }

    pub fn from_axis_angle(axis: &Vector3<f64>, angle: f64) -> Self {
        Self::from_scaled_axis(axis.normalize() * angle)
    }

    pub fn from_scaled_axis(axis_angle: Vector3<f64>) -> Self {
        Self::new(UnitQuaternion::from_scaled_axis(axis_angle))
    }

    pub fn from_euler_angles(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::new(UnitQuaternion::from_euler_angles(roll, pitch, yaw))
    }

    /// Exponential map with epsilon regularization.
    pub fn from_tangent(tangent: &Vector3<f64>, epsilon: f64) -> Self {
        let theta = (tangent.norm_squared() + epsilon * epsilon).sqrt();
        if theta == 0.0 {
            return Self::new(UnitQuaternion::identity());
        }
        let half = 0.5 * theta;
        let scale = half.sin() / theta;
        Self::new(UnitQuaternion::from_quaternion(Quaternion::new(
            half.cos(),
            tangent.x * scale,
            tangent.y * scale,
            tangent.z * scale,
        )))
    }

    /// Logarithm map with small-angle fallback below `epsilon`.
    pub fn to_tangent(&self, epsilon: f64) -> Vector3<f64> {
        let mut q = *self.quaternion.quaternion();
        // q and -q are the same rotation; pick the short way around.
        if q.w < 0.0 {
            q = -q;
        }
        let vector = Vector3::new(q.i, q.j, q.k);
        let sin_half = vector.norm();

        let log_coeff = if sin_half > epsilon.max(f64::EPSILON) {
            2.0 * f64::atan2(sin_half, q.w) / sin_half
        } else {
            // Small-angle approximation
            2.0 / q.w
        };

        vector * log_coeff
    }

    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.quaternion
    }

    pub fn inverse(&self) -> Self {
        Self::new(self.quaternion.inverse())
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.quaternion.to_rotation_matrix().into_inner()
    }

    pub fn rotate(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.quaternion * v
    }

    pub fn random() -> Self {
        Self::from_scaled_axis(Vector3::new(
            rand::random::<f64>() * 2.0 - 1.0,
            rand::random::<f64>() * 2.0 - 1.0,
            rand::random::<f64>() * 2.0 - 1.0,
        ))
    }

    pub fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        self.local_coordinates(other, 0.0)
            .iter()
            .all(|v| v.abs() < tolerance)
    }
}

impl Mul for Rot3 {
    type Output = Rot3;

    fn mul(self, rhs: Rot3) -> Rot3 {
        Rot3::new(self.quaternion * rhs.quaternion)
    }
}

impl LieGroupOps for Rot3 {
    const STORAGE_DIM: usize = 4;
    const TANGENT_DIM: usize = 3;

    fn type_tag() -> TypeTag {
        TypeTag::Rot3
    }

    fn identity() -> Self {
        Self::new(UnitQuaternion::identity())
    }

    fn to_storage(&self, out: &mut [f64]) {
        let q = self.quaternion.quaternion();
        out[0] = q.i;
        out[1] = q.j;
        out[2] = q.k;
        out[3] = q.w;
    }

    fn from_storage(data: &[f64]) -> ManifoldResult<Self> {
        check_len(data, Self::STORAGE_DIM)?;
        let q = Quaternion::new(data[3], data[0], data[1], data[2]);
        if q.norm_squared() <= f64::EPSILON {
            return Err(ManifoldError::InvalidElement(
                "Rot3 storage has zero norm".to_string(),
            ));
        }
        Ok(Self::new(UnitQuaternion::from_quaternion(q)))
    }

    fn retract(&self, delta: &[f64], epsilon: f64) -> ManifoldResult<Self> {
        check_len(delta, Self::TANGENT_DIM)?;
        let tangent = Vector3::new(delta[0], delta[1], delta[2]);
        Ok(*self * Self::from_tangent(&tangent, epsilon))
    }

    fn local_coordinates(&self, other: &Self, epsilon: f64) -> Vec<f64> {
        let tangent = (self.inverse() * *other).to_tangent(epsilon);
        vec![tangent.x, tangent.y, tangent.z]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const TOLERANCE: f64 = 1e-12;
    const EPSILON: f64 = 1e-9;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_storage_layout_is_xyzw() {
        let rot = Rot3::identity();
        assert_eq!(rot.storage(), vec![0.0, 0.0, 0.0, 1.0]);

        let rot = Rot3::from_axis_angle(&Vector3::z(), PI);
        let storage = rot.storage();
        assert!((storage[2].abs() - 1.0).abs() < TOLERANCE);
        assert!(storage[3].abs() < TOLERANCE);
    }

    #[test]
    fn test_from_storage_round_trip() -> TestResult {
        let rot = Rot3::from_euler_angles(0.1, -0.2, 0.3);
        let decoded = Rot3::from_storage(&rot.storage())?;
        assert!(rot.is_approx(&decoded, 1e-12));
        Ok(())
    }

    #[test]
    fn test_zero_quaternion_rejected() {
        assert!(Rot3::from_storage(&[0.0, 0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_exp_log_consistency() {
        let tangents = [
            Vector3::new(0.1, 0.2, -0.3),
            Vector3::new(1e-12, 0.0, 0.0),
            Vector3::new(0.0, 3.0, 0.0),
        ];
        for tangent in tangents {
            let rot = Rot3::from_tangent(&tangent, EPSILON);
            let recovered = rot.to_tangent(EPSILON);
            assert!(
                (recovered - tangent).norm() < 1e-8,
                "expected {tangent:?}, got {recovered:?}"
            );
        }
    }

    #[test]
    fn test_exp_of_zero_with_epsilon_is_identity() {
        let rot = Rot3::from_tangent(&Vector3::zeros(), EPSILON);
        assert!(rot.is_approx(&Rot3::identity(), 1e-12));
    }

    #[test]
    fn test_retract_local_coordinates_inverse() -> TestResult {
        let a = Rot3::from_euler_angles(0.5, 0.1, -0.7);
        let delta = [0.2, -0.1, 0.05];
        let b = a.retract(&delta, EPSILON)?;
        let v = a.local_coordinates(&b, EPSILON);
        for (x, y) in v.iter().zip(delta.iter()) {
            assert!((x - y).abs() < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_rotate_matches_matrix() {
        let rot = Rot3::random();
        let v = Vector3::new(1.0, -2.0, 0.5);
        let lhs = rot.rotate(&v);
        let rhs = rot.rotation_matrix() * v;
        assert!((lhs - rhs).norm() < 1e-12);
    }
}
