//! Configuration types for the sensor-frame pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::timestamps::{CameraOffset, Dataset};
use crate::geometry::pose::{DEFAULT_IMU_FROM_SENSOR_ROTATION, DEFAULT_SENSOR_HEIGHT_ABOVE_IMU};

/// Sensor → IMU extrinsic calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtrinsicConfig {
    /// Row-major 4×4 transform taking sensor-frame points into the IMU frame
    #[serde(default = "default_imu_from_sensor")]
    pub imu_from_sensor: [[f64; 4]; 4],
}

fn default_imu_from_sensor() -> [[f64; 4]; 4] {
    let c = DEFAULT_IMU_FROM_SENSOR_ROTATION;
    [
        [c[0][0], c[0][1], c[0][2], 0.0],
        [c[1][0], c[1][1], c[1][2], 0.0],
        [c[2][0], c[2][1], c[2][2], DEFAULT_SENSOR_HEIGHT_ABOVE_IMU],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

impl Default for ExtrinsicConfig {
    fn default() -> Self {
        Self {
            imu_from_sensor: default_imu_from_sensor(),
        }
    }
}

/// Configuration for point cloud and label transforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Fraction of lidar points kept when transforming
    #[serde(default = "default_keep_probability")]
    pub keep_probability: f64,

    /// Seed for the subsampling draw; thread-local randomness when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_keep_probability() -> f64 {
    1.0
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            keep_probability: default_keep_probability(),
            seed: None,
        }
    }
}

/// Configuration for radar sweep parsing and cartesian image generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarConfig {
    /// Scale factor converting the raw angle column to degrees
    #[serde(default = "default_angle_scale")]
    pub angle_scale: f64,

    /// Number of echo/intensity columns in radar CSV
    #[serde(default = "default_num_echo_columns")]
    pub num_echo_columns: usize,

    /// Width of each range bin in meters
    #[serde(default = "default_range_resolution")]
    pub range_resolution_m: f64,

    /// Size of a cartesian pixel in meters
    #[serde(default = "default_cart_resolution")]
    pub cart_resolution_m: f64,

    /// Width and height of the cartesian image in pixels
    #[serde(default = "default_cart_pixel_width")]
    pub cart_pixel_width: usize,
}

fn default_angle_scale() -> f64 {
    360.0 / 8196.0
}

fn default_num_echo_columns() -> usize {
    1024
}

fn default_range_resolution() -> f64 {
    0.0596
}

fn default_cart_resolution() -> f64 {
    0.2384
}

fn default_cart_pixel_width() -> usize {
    640
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            angle_scale: default_angle_scale(),
            num_echo_columns: default_num_echo_columns(),
            range_resolution_m: default_range_resolution(),
            cart_resolution_m: default_cart_resolution(),
            cart_pixel_width: default_cart_pixel_width(),
        }
    }
}

/// Configuration for lidar/camera timestamp alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampConfig {
    /// Dataset whose fixed camera offset applies
    #[serde(default = "default_dataset")]
    pub dataset: Dataset,

    /// Use the fitted clock-drift correction instead of the fixed offset
    #[serde(default)]
    pub clock_drift: bool,
}

fn default_dataset() -> Dataset {
    Dataset::Boreas
}

impl TimestampConfig {
    /// The offset policy selected by this configuration.
    pub fn policy(&self) -> CameraOffset {
        if self.clock_drift {
            CameraOffset::ClockDrift
        } else {
            CameraOffset::from(self.dataset)
        }
    }
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            clock_drift: false,
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub extrinsic: ExtrinsicConfig,

    #[serde(default)]
    pub transform: TransformConfig,

    #[serde(default)]
    pub radar: RadarConfig,

    #[serde(default)]
    pub timestamps: TimestampConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
