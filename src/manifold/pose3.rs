//! Pose3 - rigid transforms in 3D.
//!
//! Storage is `[qx, qy, qz, qw, x, y, z]` and the tangent vector is `[wx, wy, wz, dx, dy, dz]`
//! (rotation first). Rotation and translation are retracted separately.

use std::{
    fmt,
    fmt::{Display, Formatter},
    ops::Mul,
};

use nalgebra::Vector3;

use crate::manifold::{LieGroupOps, ManifoldResult, Rot3, TypeTag, check_len};

/// 3D rigid transform (rotation + position).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose3 {
    rotation: Rot3,
    position: Vector3<f64>,
}

impl Display for Pose3 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pose3(rotation: {}, position: [{:.4}, {:.4}, {:.4}])",
            self.rotation, self.position.x, self.position.y, self.position.z
        )
    }
}

impl Pose3 {
    pub fn from_rotation_translation(rotation: Rot3, position: Vector3<f64>) -> Self {
        Self { rotation, position }
    }

    pub fn rotation(&self) -> Rot3 {
        self.rotation
    }

    pub fn position(&self) -> Vector3<f64> {
        self.position
    }

    pub fn inverse(&self) -> Self {
        let inv_rot = self.rotation.inverse();
        Self::from_rotation_translation(inv_rot, -inv_rot.rotate(&self.position))
    }

    /// Map a point from this frame into the parent frame.
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.rotate(p) + self.position
    }

    /// Map a point from the parent frame into this frame.
    pub fn inverse_transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse().rotate(&(p - self.position))
    }

    pub fn random() -> Self {
        Self::from_rotation_translation(
            Rot3::random(),
            Vector3::new(
                rand::random::<f64>() * 2.0 - 1.0,
                rand::random::<f64>() * 2.0 - 1.0,
                rand::random::<f64>() * 2.0 - 1.0,
            ),
        )
    }

    pub fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        self.rotation.is_approx(&other.rotation, tolerance)
            && (self.position - other.position).norm() < tolerance
    }
}

impl Mul for Pose3 {
    type Output = Pose3;

    fn mul(self, rhs: Pose3) -> Pose3 {
        Pose3::from_rotation_translation(
            self.rotation * rhs.rotation,
            self.transform_point(&rhs.position),
        )
    }
}

impl LieGroupOps for Pose3 {
    const STORAGE_DIM: usize = 7;
    const TANGENT_DIM: usize = 6;

    fn type_tag() -> TypeTag {
        TypeTag::Pose3
    }

    fn identity() -> Self {
        Self::from_rotation_translation(Rot3::identity(), Vector3::zeros())
    }

    fn to_storage(&self, out: &mut [f64]) {
        self.rotation.to_storage(&mut out[0..4]);
        out[4] = self.position.x;
        out[5] = self.position.y;
        out[6] = self.position.z;
    }

    fn from_storage(data: &[f64]) -> ManifoldResult<Self> {
        check_len(data, Self::STORAGE_DIM)?;
        Ok(Self::from_rotation_translation(
            Rot3::from_storage(&data[0..4])?,
            Vector3::new(data[4], data[5], data[6]),
        ))
    }

    fn retract(&self, delta: &[f64], epsilon: f64) -> ManifoldResult<Self> {
        check_len(delta, Self::TANGENT_DIM)?;
        Ok(Self::from_rotation_translation(
            self.rotation.retract(&delta[0..3], epsilon)?,
            self.position + Vector3::new(delta[3], delta[4], delta[5]),
        ))
    }

    fn local_coordinates(&self, other: &Self, epsilon: f64) -> Vec<f64> {
        let mut out = self.rotation.local_coordinates(&other.rotation, epsilon);
        out.extend((other.position - self.position).iter());
        out
    }
}
