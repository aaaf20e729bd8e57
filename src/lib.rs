//! Sensor-frame transformation pipeline for multi-sensor driving recordings.
//!
//! This crate provides tools for:
//! - Resolving IMU heading and position into a sensor-frame rigid transform
//! - Transforming lidar returns and labeled 3D boxes into the sensor frame
//! - Recovering yaw/pitch/roll from rotation matrices
//! - Bilinear resampling and polar-to-cartesian radar image generation
//! - Aligning lidar and camera timestamps
//!
//! # Example
//!
//! ```no_run
//! use sensor_frames::core::loaders::{load_frame_json, load_labels_json};
//! use sensor_frames::core::transforms::transform_data_to_sensor_frame;
//! use sensor_frames::geometry::{ImuExtrinsic, PoseResolver};
//!
//! let frame = load_frame_json("frame.json").unwrap();
//! let labels = load_labels_json("labels.json").unwrap();
//! let resolver = PoseResolver::new(ImuExtrinsic::default());
//! let sensor = transform_data_to_sensor_frame(&frame, Some(labels.as_slice()), 1.0, &resolver).unwrap();
//! println!("{} points, {} boxes", sensor.points.len(), sensor.boxes.len());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod geometry;
pub mod processors;

pub use config::{ExtrinsicConfig, PipelineConfig, RadarConfig, TimestampConfig, TransformConfig};
pub use core::transforms::{BoundingBox, PointCloud, SensorFrame};
pub use geometry::{ImuExtrinsic, PoseResolver, SensorPose};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
