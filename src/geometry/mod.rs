//! Rotation algebra and pose resolution.

pub mod pose;
pub mod rotation;

pub use pose::{
    resolve_sensor_pose, to_transform, ImuExtrinsic, PoseError, PoseResolver, SensorPose,
};
pub use rotation::{
    is_orthonormal, rot_x, rot_y, rot_z, rotation_to_yaw_pitch_roll,
    rotation_to_yaw_pitch_roll_with_eps, YawPitchRoll,
};
