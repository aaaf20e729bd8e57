//! Odometry → sensor frame resolution from a recorded IMU pose.
//!
//! Frame subscripts follow the `T_ab` convention: `T_ab` maps homogeneous
//! coordinates expressed in frame `b` into frame `a`. `o` is the odometry
//! frame, `i` the IMU and `v` the sensor (lidar) frame.

use log::debug;
use nalgebra::{Matrix3, Matrix4, Quaternion, UnitQuaternion, Vector3};
use thiserror::Error;

use super::rotation::is_orthonormal;
use crate::config::ExtrinsicConfig;
use crate::core::records::RawPose;

/// Maximum deviation from orthonormality tolerated in derived rotations.
pub const ORTHONORMAL_TOLERANCE: f64 = 1e-6;

/// Rotation taking sensor-frame vectors into the IMU frame on the default rig
/// (a quarter turn about z).
pub const DEFAULT_IMU_FROM_SENSOR_ROTATION: [[f64; 3]; 3] = [
    [0.0, -1.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0],
];

/// Height of the sensor origin above the IMU origin on the default rig.
pub const DEFAULT_SENSOR_HEIGHT_ABOVE_IMU: f64 = 0.45;

/// Errors raised while resolving a sensor pose.
#[derive(Debug, Error)]
pub enum PoseError {
    #[error("heading quaternion has zero norm")]
    DegenerateQuaternion,

    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("{what} is not orthonormal within {tolerance}")]
    NonOrthonormal { what: &'static str, tolerance: f64 },

    #[error("extrinsic bottom row must be [0, 0, 0, 1], got {0:?}")]
    NotRigid([f64; 4]),
}

/// Result type for pose operations.
pub type Result<T> = std::result::Result<T, PoseError>;

/// Rigid transform from the sensor frame to the IMU frame (`T_iv`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuExtrinsic {
    /// `C_iv`
    pub rotation: Matrix3<f64>,
    /// Sensor origin expressed in the IMU frame.
    pub translation: Vector3<f64>,
}

impl ImuExtrinsic {
    /// Build an extrinsic from a 4×4 sensor→IMU matrix.
    ///
    /// The matrix must be rigid: an orthonormal rotation block and a bottom
    /// row of exactly `[0, 0, 0, 1]`.
    pub fn from_matrix(m: &Matrix4<f64>) -> Result<Self> {
        if m.iter().any(|v| !v.is_finite()) {
            return Err(PoseError::NonFinite("extrinsic"));
        }

        let bottom = [m[(3, 0)], m[(3, 1)], m[(3, 2)], m[(3, 3)]];
        if bottom != [0.0, 0.0, 0.0, 1.0] {
            return Err(PoseError::NotRigid(bottom));
        }

        let rotation: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
        if !is_orthonormal(&rotation, ORTHONORMAL_TOLERANCE) {
            return Err(PoseError::NonOrthonormal {
                what: "extrinsic rotation",
                tolerance: ORTHONORMAL_TOLERANCE,
            });
        }

        Ok(Self {
            rotation,
            translation: m.fixed_view::<3, 1>(0, 3).into_owned(),
        })
    }

    /// Build an extrinsic from a configuration block.
    pub fn from_config(config: &ExtrinsicConfig) -> Result<Self> {
        let rows = &config.imu_from_sensor;
        let m = Matrix4::from_fn(|r, c| rows[r][c]);
        Self::from_matrix(&m)
    }

    /// The 4×4 matrix `T_iv`.
    pub fn to_matrix(&self) -> Matrix4<f64> {
        to_transform(&self.rotation, &self.translation)
    }

    /// The inverse transform `T_vi` as `(C_vi, r)`.
    pub fn inverse(&self) -> (Matrix3<f64>, Vector3<f64>) {
        let c_vi = self.rotation.transpose();
        let r = -(c_vi * self.translation);
        (c_vi, r)
    }
}

impl Default for ImuExtrinsic {
    fn default() -> Self {
        let rows = DEFAULT_IMU_FROM_SENSOR_ROTATION;
        Self {
            rotation: Matrix3::from_fn(|r, c| rows[r][c]),
            translation: Vector3::new(0.0, 0.0, DEFAULT_SENSOR_HEIGHT_ABOVE_IMU),
        }
    }
}

/// Transforms derived from one recorded pose sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorPose {
    /// `T_vo`: odometry → sensor.
    pub transform: Matrix4<f64>,
    /// `C_vo` restricted to the heading's yaw, used to orient boxes.
    pub yaw_rotation: Matrix3<f64>,
}

/// Assemble `[[C, r], [0, 0, 0, 1]]`.
pub fn to_transform(c: &Matrix3<f64>, r: &Vector3<f64>) -> Matrix4<f64> {
    let mut t = Matrix4::identity();
    t.fixed_view_mut::<3, 3>(0, 0).copy_from(c);
    t.fixed_view_mut::<3, 1>(0, 3).copy_from(r);
    t
}

/// Reorder an on-disk heading quaternion to scalar-last `(x, y, z, w)`.
///
/// The recorder stores `[a, b, c, d]`; the rotation it describes is
/// `(b, c, d, -a)` in scalar-last order. This is specific to the recording
/// format and is not a general quaternion convention.
pub fn reorder_heading(raw: &[f64; 4]) -> [f64; 4] {
    [raw[1], raw[2], raw[3], -raw[0]]
}

/// Normalize a scalar-last quaternion and convert it to a rotation matrix.
fn xyzw_to_rotation(q: &[f64; 4]) -> Result<Matrix3<f64>> {
    let quat = Quaternion::new(q[3], q[0], q[1], q[2]);
    if quat.norm() == 0.0 {
        return Err(PoseError::DegenerateQuaternion);
    }
    Ok(UnitQuaternion::from_quaternion(quat)
        .to_rotation_matrix()
        .into_inner())
}

/// Resolves recorded poses against a fixed IMU extrinsic.
#[derive(Debug, Clone, Default)]
pub struct PoseResolver {
    extrinsic: ImuExtrinsic,
}

impl PoseResolver {
    pub fn new(extrinsic: ImuExtrinsic) -> Self {
        Self { extrinsic }
    }

    pub fn extrinsic(&self) -> &ImuExtrinsic {
        &self.extrinsic
    }

    /// Compute `T_vo` and the yaw-only `C_vo` for one pose sample.
    pub fn resolve(&self, pose: &RawPose) -> Result<SensorPose> {
        resolve_sensor_pose(&pose.heading, &pose.position, &self.extrinsic)
    }
}

/// Compute `T_vo` and the yaw-only `C_vo` from a raw heading and IMU origin.
///
/// * `raw_heading` - heading quaternion in on-disk order
/// * `r_io` - IMU origin expressed in the odometry frame
/// * `extrinsic` - sensor → IMU transform
pub fn resolve_sensor_pose(
    raw_heading: &[f64; 4],
    r_io: &[f64; 3],
    extrinsic: &ImuExtrinsic,
) -> Result<SensorPose> {
    if raw_heading.iter().any(|v| !v.is_finite()) {
        return Err(PoseError::NonFinite("heading"));
    }
    if r_io.iter().any(|v| !v.is_finite()) {
        return Err(PoseError::NonFinite("position"));
    }

    // Odometry to IMU
    let mut heading = reorder_heading(raw_heading);
    let c_io = xyzw_to_rotation(&heading)?;
    let r_io = Vector3::from(*r_io);
    let t_io = to_transform(&c_io, &-(c_io * r_io));

    // IMU to sensor
    let (c_vi, r_vi) = extrinsic.inverse();
    let t_vi = to_transform(&c_vi, &r_vi);

    let t_vo = t_vi * t_io;

    // Boxes only follow the heading's yaw
    heading[0] = 0.0;
    heading[1] = 0.0;
    let c_io_yaw = xyzw_to_rotation(&heading)?;
    let c_vo_yaw = c_vi * c_io_yaw;

    let c_vo: Matrix3<f64> = t_vo.fixed_view::<3, 3>(0, 0).into_owned();
    if !is_orthonormal(&c_vo, ORTHONORMAL_TOLERANCE) {
        return Err(PoseError::NonOrthonormal {
            what: "odometry to sensor rotation",
            tolerance: ORTHONORMAL_TOLERANCE,
        });
    }
    if !is_orthonormal(&c_vo_yaw, ORTHONORMAL_TOLERANCE) {
        return Err(PoseError::NonOrthonormal {
            what: "yaw rotation",
            tolerance: ORTHONORMAL_TOLERANCE,
        });
    }

    debug!(
        "resolved sensor pose: translation=({:.3}, {:.3}, {:.3})",
        t_vo[(0, 3)],
        t_vo[(1, 3)],
        t_vo[(2, 3)]
    );

    Ok(SensorPose {
        transform: t_vo,
        yaw_rotation: c_vo_yaw,
    })
}
