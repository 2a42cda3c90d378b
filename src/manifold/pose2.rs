//! Pose2 - rigid transforms in the plane.
//!
//! Storage is `[re, im, x, y]` (rotation first, then position) and the tangent vector is
//! `[theta, dx, dy]`. Retraction updates rotation and position independently, so
//! `retract` is not the SE(2) exponential but it is cheaper and its local coordinates are a
//! plain difference in position.

use std::{
    fmt,
    fmt::{Display, Formatter},
    ops::Mul,
};

use nalgebra::Vector2;

use crate::manifold::{LieGroupOps, ManifoldResult, Rot2, TypeTag, check_len};

/// 2D rigid transform (rotation + position).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose2 {
    rotation: Rot2,
    position: Vector2<f64>,
}

impl Display for Pose2 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pose2(x: {:.4}, y: {:.4}, theta: {:.4})",
            self.position.x,
            self.position.y,
            self.rotation.angle()
        )
    }
}

impl Pose2 {
    pub fn new(rotation: Rot2, position: Vector2<f64>) -> Self {
        Self { rotation, position }
    }

    pub fn from_xy_angle(x: f64, y: f64, theta: f64) -> Self {
        Self::new(Rot2::from_angle(theta), Vector2::new(x, y))
    }

    pub fn rotation(&self) -> Rot2 {
        self.rotation
    }

    pub fn position(&self) -> Vector2<f64> {
        self.position
    }

    pub fn x(&self) -> f64 {
        self.position.x
    }

    pub fn y(&self) -> f64 {
        self.position.y
    }

    pub fn angle(&self) -> f64 {
        self.rotation.angle()
    }

    pub fn inverse(&self) -> Self {
        let inv_rot = self.rotation.inverse();
        Self::new(inv_rot, -inv_rot.rotate(&self.position))
    }

    /// Relative transform `self⁻¹ · other`.
    pub fn between(&self, other: &Self) -> Self {
        self.inverse() * *other
    }

    pub fn transform_point(&self, p: &Vector2<f64>) -> Vector2<f64> {
        self.rotation.rotate(p) + self.position
    }

    pub fn random() -> Self {
        Self::new(
            Rot2::random(),
            Vector2::new(
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

impl Mul for Pose2 {
    type Output = Pose2;

    fn mul(self, rhs: Pose2) -> Pose2 {
        Pose2::new(
            self.rotation * rhs.rotation,
            self.rotation.rotate(&rhs.position) + self.position,
        )
    }
}

impl LieGroupOps for Pose2 {
    const STORAGE_DIM: usize = 4;
    const TANGENT_DIM: usize = 3;

    fn type_tag() -> TypeTag {
        TypeTag::Pose2
    }

    fn identity() -> Self {
        Self::new(Rot2::identity(), Vector2::zeros())
    }

    fn to_storage(&self, out: &mut [f64]) {
        self.rotation.to_storage(&mut out[0..2]);
        out[2] = self.position.x;
        out[3] = self.position.y;
    }

    fn from_storage(data: &[f64]) -> ManifoldResult<Self> {
        check_len(data, Self::STORAGE_DIM)?;
        Ok(Self::new(
            Rot2::from_storage(&data[0..2])?,
            Vector2::new(data[2], data[3]),
        ))
    }

    fn retract(&self, delta: &[f64], epsilon: f64) -> ManifoldResult<Self> {
        check_len(delta, Self::TANGENT_DIM)?;
        Ok(Self::new(
            self.rotation.retract(&delta[0..1], epsilon)?,
            self.position + Vector2::new(delta[1], delta[2]),
        ))
    }

    fn local_coordinates(&self, other: &Self, epsilon: f64) -> Vec<f64> {
        let d_rot = self.rotation.local_coordinates(&other.rotation, epsilon);
        let d_pos = other.position - self.position;
        vec![d_rot[0], d_pos.x, d_pos.y]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const TOLERANCE: f64 = 1e-12;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_storage_layout() {
        let pose = Pose2::from_xy_angle(1.0, 2.0, 0.0);
        assert_eq!(pose.storage(), vec![1.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_compose_and_inverse() {
        let a = Pose2::from_xy_angle(1.0, 0.0, FRAC_PI_2);
        let b = Pose2::from_xy_angle(1.0, 0.0, 0.0);
        let c = a * b;
        assert!((c.x() - 1.0).abs() < TOLERANCE);
        assert!((c.y() - 1.0).abs() < TOLERANCE);
        assert!((c.angle() - FRAC_PI_2).abs() < TOLERANCE);

        let identity = a * a.inverse();
        assert!(identity.is_approx(&Pose2::identity(), TOLERANCE));
        assert!(a.between(&c).is_approx(&b, TOLERANCE));
    }

    #[test]
    fn test_retract_local_coordinates_inverse() -> TestResult {
        let a = Pose2::from_xy_angle(-1.0, 3.0, 0.2);
        let delta = [0.3, 0.5, -0.25];
        let b = a.retract(&delta, 1e-9)?;
        assert!((b.x() + 0.5).abs() < TOLERANCE);
        assert!((b.y() - 2.75).abs() < TOLERANCE);
        assert!((b.angle() - 0.5).abs() < TOLERANCE);

        let v = a.local_coordinates(&b, 1e-9);
        for (x, y) in v.iter().zip(delta.iter()) {
            assert!((x - y).abs() < TOLERANCE);
        }
        Ok(())
    }
}
