//! Lidar/camera timestamp alignment.
//!
//! Two policies exist and are chosen by the caller: a fixed offset per
//! dataset, or a linear clock-drift correction fitted on recorded data.
//! All timestamps are nanoseconds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera lag behind lidar on the Scale recordings.
pub const SCALE_CAMERA_OFFSET_NS: i64 = 6_300_000_000;

/// Camera lag behind lidar on the Boreas recordings.
pub const BOREAS_CAMERA_OFFSET_NS: i64 = 0;

/// Slope and intercept of the fitted clock-drift correction.
pub const CLOCK_DRIFT_SLOPE: f64 = -1.634e-7;
pub const CLOCK_DRIFT_INTERCEPT_NS: f64 = 2.675e11;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),
}

/// Datasets with a known fixed camera offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    Boreas,
    Scale,
}

impl Dataset {
    /// Fixed camera offset for this dataset.
    pub fn camera_offset(self) -> i64 {
        match self {
            Dataset::Boreas => BOREAS_CAMERA_OFFSET_NS,
            Dataset::Scale => SCALE_CAMERA_OFFSET_NS,
        }
    }
}

impl FromStr for Dataset {
    type Err = TimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boreas" => Ok(Dataset::Boreas),
            "scale" => Ok(Dataset::Scale),
            other => Err(TimestampError::UnknownDataset(other.to_string())),
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dataset::Boreas => write!(f, "boreas"),
            Dataset::Scale => write!(f, "scale"),
        }
    }
}

/// Fixed camera offset for a dataset identifier.
pub fn dataset_offset(name: &str) -> Result<i64, TimestampError> {
    name.parse::<Dataset>().map(Dataset::camera_offset)
}

/// Camera timestamp for `lidar_ts` under the fitted clock-drift model.
///
/// Computes `trunc(-1.634e-7 * t + 2.675e11 + t)` in double precision.
pub fn clock_drift_camera_timestamp(lidar_ts: i64) -> i64 {
    let t = lidar_ts as f64;
    (CLOCK_DRIFT_SLOPE * t + CLOCK_DRIFT_INTERCEPT_NS + t) as i64
}

/// How the camera timestamp is derived from the lidar timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraOffset {
    Fixed(i64),
    ClockDrift,
}

impl From<Dataset> for CameraOffset {
    fn from(dataset: Dataset) -> Self {
        CameraOffset::Fixed(dataset.camera_offset())
    }
}

/// Matching lidar and camera timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampPair {
    pub lidar: i64,
    pub camera: i64,
}

/// Pair a lidar timestamp with the camera timestamp given by `policy`.
pub fn camera_timestamp_pair(lidar_ts: i64, policy: CameraOffset) -> TimestampPair {
    let camera = match policy {
        CameraOffset::Fixed(offset) => lidar_ts.saturating_add(offset),
        CameraOffset::ClockDrift => clock_drift_camera_timestamp(lidar_ts),
    };
    TimestampPair {
        lidar: lidar_ts,
        camera,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_offsets() {
        assert_eq!(dataset_offset("boreas"), Ok(0));
        assert_eq!(dataset_offset("scale"), Ok(6_300_000_000));
    }

    #[test]
    fn test_unknown_dataset() {
        assert_eq!(
            dataset_offset("kitti"),
            Err(TimestampError::UnknownDataset("kitti".to_string()))
        );
        // identifiers are case sensitive
        assert!(dataset_offset("Boreas").is_err());
        assert!(dataset_offset("").is_err());
    }

    #[test]
    fn test_dataset_display_round_trip() {
        for d in [Dataset::Boreas, Dataset::Scale] {
            assert_eq!(d.to_string().parse::<Dataset>(), Ok(d));
        }
    }

    #[test]
    fn test_clock_drift_at_zero() {
        assert_eq!(clock_drift_camera_timestamp(0), 267_500_000_000);
    }

    #[test]
    fn test_clock_drift_matches_formula() {
        let t: i64 = 1_000_000_000_000;
        let expected = (-1.634e-7 * t as f64 + 2.675e11 + t as f64) as i64;
        assert_eq!(clock_drift_camera_timestamp(t), expected);
        assert!((expected - 1_267_499_836_600).abs() <= 1);
    }

    #[test]
    fn test_camera_timestamp_pair() {
        let pair = camera_timestamp_pair(1_000, CameraOffset::from(Dataset::Scale));
        assert_eq!(pair.lidar, 1_000);
        assert_eq!(pair.camera, 6_300_001_000);

        let pair = camera_timestamp_pair(0, CameraOffset::ClockDrift);
        assert_eq!(pair.camera, 267_500_000_000);
    }

    #[test]
    fn test_fixed_offset_saturates() {
        let pair = camera_timestamp_pair(i64::MAX - 10, CameraOffset::from(Dataset::Scale));
        assert_eq!(pair.camera, i64::MAX);

        let pair = camera_timestamp_pair(i64::MIN + 10, CameraOffset::Fixed(-100));
        assert_eq!(pair.camera, i64::MIN);
    }
}
