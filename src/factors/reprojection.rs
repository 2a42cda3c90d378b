//! Reprojection-delta residuals between two posed cameras.
//!
//! A landmark is parameterized by a pixel in a *source* camera plus an inverse range along that
//! pixel's bearing. It is transported into a *target* camera and reprojected; the residual is the
//! pixel offset from the observed correspondence in the target image. The landmark always has
//! zero residual in the source camera, so only the target residual is produced.
//!
//! Calibrations are given as `[fx, fy, cx, cy]`.
//!
//! - [`CameraModel::Linear`]: pinhole camera. The projection is valid only in front of the
//!   target camera.
//! - [`CameraModel::Equirectangular`]: pixel coordinates map linearly to longitude / latitude.
//!   The projection is valid for any non-degenerate point whose source pixel lies within
//!   `|lon| < π` and `|lat| < π/2`.
//!
//! Using the inverse range as a homogeneous scale keeps points at infinity (`inverse_range = 0`)
//! well defined: the target bearing is then the rotated source bearing.

use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::{DVector, Vector2, Vector3, Vector4};

use super::{FactorResult, JacobianFactor};
use crate::core::key::Key;
use crate::manifold::Pose3;

/// Camera projection model used for both source and target cameras.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraModel {
    Linear,
    Equirectangular,
}

/// Fixed measurement data of one source/target pixel correspondence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReprojectionMeasurement {
    /// Source camera calibration `[fx, fy, cx, cy]`
    pub source_calibration: Vector4<f64>,
    /// Target camera calibration `[fx, fy, cx, cy]`
    pub target_calibration: Vector4<f64>,
    pub source_pixel: Vector2<f64>,
    pub target_pixel: Vector2<f64>,
}

impl CameraModel {
    /// Unit bearing of `pixel` in the camera frame, and whether the pixel is inside the model's
    /// valid domain.
    fn unproject(&self, calibration: &Vector4<f64>, pixel: &Vector2<f64>) -> (Vector3<f64>, bool) {
        let x = (pixel.x - calibration[2]) / calibration[0];
        let y = (pixel.y - calibration[3]) / calibration[1];
        match self {
            CameraModel::Linear => (Vector3::new(x, y, 1.0).normalize(), true),
            CameraModel::Equirectangular => {
                let (longitude, latitude) = (x, y);
                let bearing = Vector3::new(
                    latitude.cos() * longitude.sin(),
                    latitude.sin(),
                    latitude.cos() * longitude.cos(),
                );
                let in_domain = longitude.abs() < PI && latitude.abs() < FRAC_PI_2;
                (bearing.normalize(), in_domain)
            }
        }
    }

    /// Pixel of the camera-frame point `p`, and whether the projection is valid.
    fn project(
        &self,
        calibration: &Vector4<f64>,
        p: &Vector3<f64>,
        epsilon: f64,
    ) -> (Vector2<f64>, bool) {
        match self {
            CameraModel::Linear => {
                let inv_depth = 1.0 / epsilon.max(p.z.abs());
                let pixel = Vector2::new(
                    calibration[0] * p.x * inv_depth + calibration[2],
                    calibration[1] * p.y * inv_depth + calibration[3],
                );
                (pixel, p.z > 0.0)
            }
            CameraModel::Equirectangular => {
                let z_safe = p.z + epsilon * (sign(p.z) + 0.5);
                let longitude = p.x.atan2(z_safe);
                let latitude = p.y.atan2((p.x * p.x + p.z * p.z + epsilon).sqrt());
                let pixel = Vector2::new(
                    calibration[0] * longitude + calibration[2],
                    calibration[1] * latitude + calibration[3],
                );
                (pixel, p.norm_squared() > 0.0)
            }
        }
    }

    /// Reproject the landmark into the target camera and return `(delta, is_valid)`, where
    /// `delta` is the reprojection minus `target_pixel`.
    pub fn reprojection_delta(
        &self,
        source_pose: &Pose3,
        target_pose: &Pose3,
        source_inverse_range: f64,
        measurement: &ReprojectionMeasurement,
        epsilon: f64,
    ) -> (Vector2<f64>, bool) {
        let (bearing, in_domain) =
            self.unproject(&measurement.source_calibration, &measurement.source_pixel);

        // Homogeneous point in the world frame scaled by the inverse range, expressed relative
        // to the target camera center.
        let p_world = source_pose.rotation().rotate(&bearing)
            + source_inverse_range * (source_pose.position() - target_pose.position());
        let p_target = target_pose.rotation().inverse().rotate(&p_world);

        let (pixel, projects) = self.project(&measurement.target_calibration, &p_target, epsilon);
        (pixel - measurement.target_pixel, in_domain && projects)
    }
}

/// `sign(0) == 0`, unlike `f64::signum`.
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Pinhole reprojection delta. See [`CameraModel::reprojection_delta`].
pub fn linear_reprojection_delta(
    source_pose: &Pose3,
    target_pose: &Pose3,
    source_inverse_range: f64,
    measurement: &ReprojectionMeasurement,
    epsilon: f64,
) -> (Vector2<f64>, bool) {
    CameraModel::Linear.reprojection_delta(
        source_pose,
        target_pose,
        source_inverse_range,
        measurement,
        epsilon,
    )
}

/// Equirectangular reprojection delta. See [`CameraModel::reprojection_delta`].
pub fn equirectangular_reprojection_delta(
    source_pose: &Pose3,
    target_pose: &Pose3,
    source_inverse_range: f64,
    measurement: &ReprojectionMeasurement,
    epsilon: f64,
) -> (Vector2<f64>, bool) {
    CameraModel::Equirectangular.reprojection_delta(
        source_pose,
        target_pose,
        source_inverse_range,
        measurement,
        epsilon,
    )
}

/// Factor on `[source_pose, target_pose, inverse_range]` (`Pose3`, `Pose3`, `f64`) whose
/// residual is the reprojection delta, or zero when the projection is invalid.
///
/// The Jacobian is computed numerically.
pub fn reprojection_factor(
    model: CameraModel,
    source_pose: Key,
    target_pose: Key,
    inverse_range: Key,
    measurement: ReprojectionMeasurement,
    epsilon: f64,
) -> FactorResult<JacobianFactor> {
    JacobianFactor::from_residual(
        vec![source_pose, target_pose, inverse_range],
        move |values, index| {
            let source: Pose3 = values.at_entry(&index.entries[0])?;
            let target: Pose3 = values.at_entry(&index.entries[1])?;
            let rho: f64 = values.at_entry(&index.entries[2])?;
            let (delta, valid) =
                model.reprojection_delta(&source, &target, rho, &measurement, epsilon);
            Ok(if valid {
                DVector::from_column_slice(delta.as_slice())
            } else {
                DVector::zeros(2)
            })
        },
        epsilon,
    )
}
