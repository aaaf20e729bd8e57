//! Elementary rotations and Euler-angle recovery.
//!
//! All matrices follow the right-handed convention: a positive angle rotates
//! counter-clockwise when looking down the positive axis toward the origin.

use nalgebra::Matrix3;

/// Threshold on the pitch cosine below which a rotation is treated as being
/// in gimbal lock.
pub const GIMBAL_LOCK_EPS: f64 = 1e-15;

/// Yaw, pitch and roll angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YawPitchRoll {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl YawPitchRoll {
    /// Returns the angles as a `(yaw, pitch, roll)` tuple.
    #[inline]
    pub fn as_tuple(&self) -> (f64, f64, f64) {
        (self.yaw, self.pitch, self.roll)
    }
}

/// Rotation about the x axis.
pub fn rot_x(alpha: f64) -> Matrix3<f64> {
    let (s, c) = alpha.sin_cos();
    Matrix3::new(
        1.0, 0.0, 0.0, //
        0.0, c, -s, //
        0.0, s, c,
    )
}

/// Rotation about the y axis.
pub fn rot_y(beta: f64) -> Matrix3<f64> {
    let (s, c) = beta.sin_cos();
    Matrix3::new(
        c, 0.0, s, //
        0.0, 1.0, 0.0, //
        -s, 0.0, c,
    )
}

/// Rotation about the z axis.
pub fn rot_z(gamma: f64) -> Matrix3<f64> {
    let (s, c) = gamma.sin_cos();
    Matrix3::new(
        c, -s, 0.0, //
        s, c, 0.0, //
        0.0, 0.0, 1.0,
    )
}

/// Decompose a rotation matrix into yaw, pitch and roll.
///
/// Uses [`GIMBAL_LOCK_EPS`] as the degeneracy threshold. See
/// [`rotation_to_yaw_pitch_roll_with_eps`].
pub fn rotation_to_yaw_pitch_roll(c: &Matrix3<f64>) -> YawPitchRoll {
    rotation_to_yaw_pitch_roll_with_eps(c, GIMBAL_LOCK_EPS)
}

/// Decompose a rotation matrix into yaw, pitch and roll.
///
/// The decomposition reads the matrix as a frame rotation `C_ab`: for
/// `C = (rot_z(yaw) * rot_y(pitch) * rot_x(roll))ᵀ` it returns the original
/// triple. When the pitch cosine `c_y` is at or below `eps` the rotation is in
/// gimbal lock; roll is then pinned to zero and the remaining freedom is
/// reported as yaw.
pub fn rotation_to_yaw_pitch_roll_with_eps(c: &Matrix3<f64>, eps: f64) -> YawPitchRoll {
    let (i, j, k) = (2, 1, 0);

    let c_y = (c[(i, i)].powi(2) + c[(j, i)].powi(2)).sqrt();

    if c_y > eps {
        YawPitchRoll {
            yaw: c[(k, j)].atan2(c[(k, k)]),
            pitch: (-c[(k, i)]).atan2(c_y),
            roll: c[(j, i)].atan2(c[(i, i)]),
        }
    } else {
        YawPitchRoll {
            yaw: (-c[(j, k)]).atan2(c[(j, j)]),
            pitch: (-c[(k, i)]).atan2(c_y),
            roll: 0.0,
        }
    }
}

/// Check that `c` is a proper rotation within `tolerance`.
///
/// Both `C·Cᵀ = I` (max-abs deviation) and `det(C) = 1` must hold.
pub fn is_orthonormal(c: &Matrix3<f64>, tolerance: f64) -> bool {
    if c.iter().any(|v| !v.is_finite()) {
        return false;
    }
    let deviation = (c * c.transpose() - Matrix3::identity()).amax();
    deviation <= tolerance && (c.determinant() - 1.0).abs() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    const TOL: f64 = 1e-12;

    #[test]
    fn test_elementary_rotations_are_orthonormal() {
        for &angle in &[-PI, -1.3, -0.2, 0.0, 0.4, FRAC_PI_2, 2.9, 7.5] {
            for c in [rot_x(angle), rot_y(angle), rot_z(angle)] {
                assert!(is_orthonormal(&c, 1e-12), "angle {angle}");
                assert!((c.determinant() - 1.0).abs() < TOL);
            }
        }
    }

    #[test]
    fn test_rot_z_quarter_turn() {
        let c = rot_z(FRAC_PI_2);
        let v = c * nalgebra::Vector3::new(1.0, 0.0, 0.0);

        // x axis rotates onto y axis
        assert!(v.x.abs() < TOL);
        assert!((v.y - 1.0).abs() < TOL);
        assert!(v.z.abs() < TOL);
    }

    #[test]
    fn test_rotations_are_periodic() {
        let a = rot_y(0.7);
        let b = rot_y(0.7 + 2.0 * PI);
        assert!((a - b).amax() < 1e-12);
    }

    #[test]
    fn test_round_trip_away_from_gimbal_lock() {
        let triples = [
            (0.3, 0.2, -0.1),
            (-2.5, 1.1, 0.9),
            (1.4, -0.7, 2.8),
            (3.0, 0.05, -3.0),
            (-0.01, -1.5, 0.4),
        ];

        for &(yaw, pitch, roll) in &triples {
            let c = (rot_z(yaw) * rot_y(pitch) * rot_x(roll)).transpose();
            let ypr = rotation_to_yaw_pitch_roll(&c);

            assert!((ypr.yaw - yaw).abs() < 1e-9, "yaw {} vs {}", ypr.yaw, yaw);
            assert!((ypr.pitch - pitch).abs() < 1e-9, "pitch {} vs {}", ypr.pitch, pitch);
            assert!((ypr.roll - roll).abs() < 1e-9, "roll {} vs {}", ypr.roll, roll);
        }
    }

    #[test]
    fn test_pure_z_rotation_reports_negated_yaw() {
        // rot_z builds the active rotation; the frame rotation is its transpose
        let ypr = rotation_to_yaw_pitch_roll(&rot_z(0.6));
        assert!((ypr.yaw + 0.6).abs() < TOL);
        assert!(ypr.pitch.abs() < TOL);
        assert!(ypr.roll.abs() < TOL);
    }

    #[test]
    fn test_gimbal_lock_branch_zeroes_roll() {
        let c = (rot_z(0.5) * rot_y(FRAC_PI_2) * rot_x(0.3)).transpose();

        let c_y = (c[(2, 2)].powi(2) + c[(1, 2)].powi(2)).sqrt();
        assert!(c_y <= GIMBAL_LOCK_EPS);

        let ypr = rotation_to_yaw_pitch_roll(&c);
        assert_eq!(ypr.roll, 0.0);
        assert!((ypr.pitch - FRAC_PI_2).abs() < 1e-9);
        assert!(ypr.yaw.is_finite());
    }

    #[test]
    fn test_custom_eps_forces_degenerate_branch() {
        let c = (rot_z(0.2) * rot_y(1.2) * rot_x(0.4)).transpose();
        let ypr = rotation_to_yaw_pitch_roll_with_eps(&c, 1.0);
        assert_eq!(ypr.roll, 0.0);
    }

    #[test]
    fn test_is_orthonormal_rejects_scaled_and_reflected() {
        let scaled = rot_x(0.3) * 1.01;
        assert!(!is_orthonormal(&scaled, 1e-6));

        let reflection = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0);
        assert!(!is_orthonormal(&reflection, 1e-6));

        let mut nan = Matrix3::identity();
        nan[(0, 0)] = f64::NAN;
        assert!(!is_orthonormal(&nan, 1e-6));
    }
}
