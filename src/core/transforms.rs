//! Rigid transforms applied to point clouds and labeled boxes.
//!
//! This module takes the transforms produced by the pose resolver and applies
//! them to raw lidar returns and raw object labels, producing sensor-frame
//! primitives. The per-point transform is parallelized using Rayon.

use log::debug;
use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};
use rand::Rng;
use rayon::prelude::*;
use thiserror::Error;

use super::records::{PointChannels, RawFrame, RawLabel, RawPoint, RecordError};
use crate::geometry::pose::{PoseError, PoseResolver, SensorPose};
use crate::geometry::rotation::{rot_z, rotation_to_yaw_pitch_roll, YawPitchRoll};

/// Errors that can occur while transforming frame data.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("pose resolution failed: {0}")]
    Pose(#[from] PoseError),

    #[error("keep probability must lie in [0, 1], got {0}")]
    InvalidKeepProbability(f64),

    #[error("label {index} is malformed: {source}")]
    InvalidLabel {
        index: usize,
        #[source]
        source: RecordError,
    },
}

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;

/// Container for transformed 3D points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    /// X coordinates of all points.
    pub x: Vec<f64>,
    /// Y coordinates of all points.
    pub y: Vec<f64>,
    /// Z coordinates of all points.
    pub z: Vec<f64>,
    /// Auxiliary channels of each point, copied from the raw returns.
    pub channels: Vec<PointChannels>,
}

impl PointCloud {
    /// Creates a new empty point cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new point cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            channels: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of points in the cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Adds a point to the cloud.
    #[inline]
    pub fn push(&mut self, point: [f64; 3], channels: PointChannels) {
        self.x.push(point[0]);
        self.y.push(point[1]);
        self.z.push(point[2]);
        self.channels.push(channels);
    }

    /// Converts point cloud to a vector of [x, y, z] coordinate arrays.
    pub fn to_coords(&self) -> Vec<[f64; 3]> {
        (0..self.len())
            .map(|i| [self.x[i], self.y[i], self.z[i]])
            .collect()
    }
}

/// An oriented 3D box in the sensor frame.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub position: Vector3<f64>,
    pub rotation: Matrix3<f64>,
    /// Length, width, height.
    pub extent: Vector3<f64>,
    pub label: String,
}

impl BoundingBox {
    /// Euler angles of the box rotation.
    ///
    /// `rotation` maps box coordinates into the sensor frame, so it is
    /// transposed into a frame rotation before decomposing. A box built from
    /// `rot_z(yaw)` reports `yaw`.
    pub fn yaw_pitch_roll(&self) -> YawPitchRoll {
        rotation_to_yaw_pitch_roll(&self.rotation.transpose())
    }
}

/// Everything derived from one frame.
#[derive(Debug, Clone)]
pub struct SensorFrame {
    pub pose: SensorPose,
    pub points: PointCloud,
    pub boxes: Vec<BoundingBox>,
}

/// Transform raw returns by `t`, keeping a random subset.
///
/// Uses the thread-local random source. See [`transform_points_with_rng`].
pub fn transform_points(
    t: &Matrix4<f64>,
    raw_points: &[RawPoint],
    keep_probability: f64,
) -> Result<PointCloud> {
    let mut rng = rand::rng();
    transform_points_with_rng(t, raw_points, keep_probability, &mut rng)
}

/// Transform raw returns by `t`, keeping a random subset.
///
/// `floor(keep_probability * N)` points are drawn uniformly without
/// replacement. At exactly `1.0` no draw happens and input order is
/// preserved; below that the retained points are returned in ascending input
/// order.
///
/// # Arguments
///
/// * `t` - Homogeneous transform to apply
/// * `raw_points` - Raw returns; never modified
/// * `keep_probability` - Fraction of points to keep, in `[0, 1]`
/// * `rng` - Random source for the subsampling draw
pub fn transform_points_with_rng<R: Rng + ?Sized>(
    t: &Matrix4<f64>,
    raw_points: &[RawPoint],
    keep_probability: f64,
    rng: &mut R,
) -> Result<PointCloud> {
    let indices = subsample_indices(raw_points.len(), keep_probability, rng)?;

    let apply = |p: &RawPoint| -> ([f64; 3], PointChannels) {
        let q = t * Vector4::new(p.x, p.y, p.z, 1.0);
        ([q.x, q.y, q.z], p.channels())
    };

    let transformed: Vec<([f64; 3], PointChannels)> = match indices {
        None => raw_points.par_iter().map(apply).collect(),
        Some(indices) => indices.par_iter().map(|&i| apply(&raw_points[i])).collect(),
    };

    let mut cloud = PointCloud::with_capacity(transformed.len());
    for (point, channels) in transformed {
        cloud.push(point, channels);
    }

    debug!(
        "transformed {} of {} points (keep probability {})",
        cloud.len(),
        raw_points.len(),
        keep_probability
    );

    Ok(cloud)
}

/// Pick the indices to keep, or `None` when every point is kept.
fn subsample_indices<R: Rng + ?Sized>(
    n: usize,
    keep_probability: f64,
    rng: &mut R,
) -> Result<Option<Vec<usize>>> {
    if !(0.0..=1.0).contains(&keep_probability) {
        return Err(TransformError::InvalidKeepProbability(keep_probability));
    }
    if keep_probability == 1.0 {
        return Ok(None);
    }

    let amount = (keep_probability * n as f64).floor() as usize;
    let mut indices = rand::seq::index::sample(rng, n, amount).into_vec();

    // Sort indices for cache-friendly access
    indices.sort_unstable();

    Ok(Some(indices))
}

/// Build sensor-frame boxes from raw labels.
///
/// Positions are transformed by `t`; each box is oriented by
/// `c_yaw * rot_z(label.yaw)` so that it stays upright regardless of the
/// recorded pitch and roll. Output order matches input order.
///
/// # Errors
///
/// A malformed label (non-finite value or negative extent) fails the whole
/// batch with [`TransformError::InvalidLabel`]; no label is silently dropped.
pub fn transform_bounding_boxes(
    t: &Matrix4<f64>,
    c_yaw: &Matrix3<f64>,
    raw_labels: &[RawLabel],
) -> Result<Vec<BoundingBox>> {
    raw_labels
        .iter()
        .enumerate()
        .map(|(index, label)| -> Result<BoundingBox> {
            label
                .validate()
                .map_err(|source| TransformError::InvalidLabel { index, source })?;

            let [px, py, pz] = label.position;
            let position = (t * Vector4::new(px, py, pz, 1.0)).xyz();

            Ok(BoundingBox {
                position,
                rotation: c_yaw * rot_z(label.yaw),
                extent: Vector3::from(label.dimensions),
                label: label.label.clone(),
            })
        })
        .collect()
}

/// Express a recorded frame and its labels in the sensor frame.
///
/// Resolves the frame's pose, then transforms its points and, when given,
/// its labels. Absent labels yield an empty box list.
pub fn transform_data_to_sensor_frame(
    frame: &RawFrame,
    raw_labels: Option<&[RawLabel]>,
    keep_probability: f64,
    resolver: &PoseResolver,
) -> Result<SensorFrame> {
    let mut rng = rand::rng();
    transform_data_to_sensor_frame_with_rng(frame, raw_labels, keep_probability, resolver, &mut rng)
}

/// [`transform_data_to_sensor_frame`] with an explicit random source.
pub fn transform_data_to_sensor_frame_with_rng<R: Rng + ?Sized>(
    frame: &RawFrame,
    raw_labels: Option<&[RawLabel]>,
    keep_probability: f64,
    resolver: &PoseResolver,
    rng: &mut R,
) -> Result<SensorFrame> {
    let pose = resolver.resolve(&frame.pose)?;

    let points = transform_points_with_rng(&pose.transform, &frame.points, keep_probability, rng)?;

    let boxes = match raw_labels {
        Some(labels) => transform_bounding_boxes(&pose.transform, &pose.yaw_rotation, labels)?,
        None => Vec::new(),
    };

    Ok(SensorFrame {
        pose,
        points,
        boxes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::records::RawPose;
    use crate::geometry::pose::ImuExtrinsic;
    use crate::geometry::rotation::{rot_x, rot_y};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    const TOL: f64 = 1e-12;

    fn sample_transform() -> Matrix4<f64> {
        let c = rot_z(0.7) * rot_y(-0.2) * rot_x(0.1);
        crate::geometry::pose::to_transform(&c, &Vector3::new(1.5, -3.0, 0.25))
    }

    fn grid_points(n: usize) -> Vec<RawPoint> {
        (0..n)
            .map(|i| {
                let mut p = RawPoint::new(i as f64, (i * 2) as f64 - 7.0, (i % 5) as f64);
                p.intensity = Some(i as f64);
                p
            })
            .collect()
    }

    fn expected(t: &Matrix4<f64>, p: &RawPoint) -> Vector3<f64> {
        (t * Vector4::new(p.x, p.y, p.z, 1.0)).xyz()
    }

    fn label(yaw: f64, name: &str) -> RawLabel {
        RawLabel {
            position: [3.0, -1.0, 0.5],
            dimensions: [4.2, 1.8, 1.5],
            yaw,
            label: name.to_string(),
        }
    }

    #[test]
    fn test_transform_points_full_keeps_order() {
        let t = sample_transform();
        let raw = grid_points(37);

        let cloud = transform_points(&t, &raw, 1.0).unwrap();

        assert_eq!(cloud.len(), raw.len());
        for (i, p) in raw.iter().enumerate() {
            let e = expected(&t, p);
            assert!((cloud.x[i] - e.x).abs() < TOL);
            assert!((cloud.y[i] - e.y).abs() < TOL);
            assert!((cloud.z[i] - e.z).abs() < TOL);
            assert_eq!(cloud.channels[i].intensity, Some(i as f64));
        }
    }

    #[test]
    fn test_transform_points_half_draws_distinct_points() {
        let t = sample_transform();
        let raw = grid_points(100);
        let mut rng = StdRng::seed_from_u64(7);

        let cloud = transform_points_with_rng(&t, &raw, 0.5, &mut rng).unwrap();
        assert_eq!(cloud.len(), 50);

        // intensity carries the source index
        let mut seen = HashSet::new();
        for i in 0..cloud.len() {
            let src = cloud.channels[i].intensity.unwrap() as usize;
            assert!(seen.insert(src), "duplicate point {src}");

            let e = expected(&t, &raw[src]);
            assert!((cloud.x[i] - e.x).abs() < TOL);
            assert!((cloud.y[i] - e.y).abs() < TOL);
            assert!((cloud.z[i] - e.z).abs() < TOL);
        }
    }

    #[test]
    fn test_transform_points_is_reproducible_with_seed() {
        let t = sample_transform();
        let raw = grid_points(64);

        let a = transform_points_with_rng(&t, &raw, 0.3, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = transform_points_with_rng(&t, &raw, 0.3, &mut StdRng::seed_from_u64(3)).unwrap();

        assert_eq!(a.len(), 19);
        assert_eq!(a, b);
    }

    #[test]
    fn test_transform_points_zero_probability() {
        let cloud = transform_points(&sample_transform(), &grid_points(10), 0.0).unwrap();
        assert!(cloud.is_empty());
    }

    #[test]
    fn test_transform_points_rejects_bad_probability() {
        for p in [-0.1, 1.5, f64::NAN] {
            let err = transform_points(&sample_transform(), &grid_points(4), p).unwrap_err();
            assert!(matches!(err, TransformError::InvalidKeepProbability(_)));
        }
    }

    #[test]
    fn test_transform_points_does_not_mutate_input() {
        let raw = grid_points(5);
        let copy = raw.clone();
        let _ = transform_points(&sample_transform(), &raw, 0.6).unwrap();
        assert_eq!(raw, copy);
    }

    #[test]
    fn test_transform_bounding_boxes() {
        let t = sample_transform();
        let c_yaw = rot_z(0.4);
        let labels = vec![label(0.0, "Car"), label(1.2, "Pedestrian"), label(-2.0, "Cyclist")];

        let boxes = transform_bounding_boxes(&t, &c_yaw, &labels).unwrap();

        assert_eq!(boxes.len(), labels.len());
        for (b, l) in boxes.iter().zip(&labels) {
            assert_eq!(b.label, l.label);
            assert!((b.rotation - c_yaw * rot_z(l.yaw)).amax() < TOL);
            assert_eq!(b.extent, Vector3::new(4.2, 1.8, 1.5));

            let [px, py, pz] = l.position;
            let e = expected(&t, &RawPoint::new(px, py, pz));
            assert!((b.position - e).norm() < TOL);
        }
    }

    #[test]
    fn test_box_yaw_pitch_roll_stays_upright() {
        let labels = vec![label(0.5, "Car")];
        let boxes = transform_bounding_boxes(&Matrix4::identity(), &rot_z(0.25), &labels).unwrap();

        let ypr = boxes[0].yaw_pitch_roll();
        assert!(ypr.pitch.abs() < TOL);
        assert!(ypr.roll.abs() < TOL);
        assert!((ypr.yaw - 0.75).abs() < TOL);
    }

    #[test]
    fn test_box_yaw_pitch_roll_recovers_tilted_rotation() {
        let rotation = rot_z(-1.1) * rot_y(0.3) * rot_x(0.2);
        let b = BoundingBox {
            position: Vector3::zeros(),
            rotation,
            extent: Vector3::new(1.0, 1.0, 1.0),
            label: "Car".to_string(),
        };

        let ypr = b.yaw_pitch_roll();
        assert!((ypr.yaw + 1.1).abs() < 1e-9);
        assert!((ypr.pitch - 0.3).abs() < 1e-9);
        assert!((ypr.roll - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_label_fails_batch() {
        let mut bad = label(0.0, "Car");
        bad.dimensions[2] = -1.0;
        let labels = vec![label(0.0, "Car"), bad];

        let err = transform_bounding_boxes(&Matrix4::identity(), &Matrix3::identity(), &labels)
            .unwrap_err();
        assert!(matches!(err, TransformError::InvalidLabel { index: 1, .. }));
    }

    #[test]
    fn test_transform_data_to_sensor_frame() {
        let frame = RawFrame {
            timestamp: 0,
            pose: RawPose {
                heading: [1.0, 0.0, 0.0, 0.0],
                position: [10.0, 0.0, 0.0],
            },
            points: vec![RawPoint::new(10.0, 0.0, 0.0), RawPoint::new(11.0, 0.0, 0.0)],
        };
        let resolver = PoseResolver::new(ImuExtrinsic::default());
        let labels = vec![label(0.0, "Car")];

        let out = transform_data_to_sensor_frame(&frame, Some(labels.as_slice()), 1.0, &resolver).unwrap();

        assert_eq!(out.points.len(), 2);
        // IMU origin sits 0.45 below the sensor
        assert!(out.points.x[0].abs() < TOL);
        assert!(out.points.y[0].abs() < TOL);
        assert!((out.points.z[0] + 0.45).abs() < TOL);
        // odometry +x is sensor -y
        assert!((out.points.y[1] + 1.0).abs() < TOL);
        assert_eq!(out.boxes.len(), 1);
    }

    #[test]
    fn test_transform_data_without_labels() {
        let frame = RawFrame {
            timestamp: 0,
            pose: RawPose {
                heading: [1.0, 0.0, 0.0, 0.0],
                position: [0.0; 3],
            },
            points: grid_points(3),
        };
        let out = transform_data_to_sensor_frame(&frame, None, 1.0, &PoseResolver::default()).unwrap();
        assert!(out.boxes.is_empty());
        assert_eq!(out.points.len(), 3);
    }

    #[test]
    fn test_transform_data_propagates_pose_errors() {
        let frame = RawFrame {
            timestamp: 0,
            pose: RawPose {
                heading: [0.0; 4],
                position: [0.0; 3],
            },
            points: Vec::new(),
        };
        let err = transform_data_to_sensor_frame(&frame, None, 1.0, &PoseResolver::default())
            .unwrap_err();
        assert!(matches!(err, TransformError::Pose(PoseError::DegenerateQuaternion)));
    }
}
