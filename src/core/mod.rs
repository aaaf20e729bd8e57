//! Core data types, frame transforms and I/O operations.

pub mod loaders;
pub mod records;
pub mod timestamps;
pub mod transforms;
pub mod writers;

pub use loaders::{load_frame_json, load_labels_json, load_radar_csv, LoaderError, RadarSweep};
pub use records::{PointChannels, RawFrame, RawLabel, RawPoint, RawPose, RecordError};
pub use timestamps::{camera_timestamp_pair, CameraOffset, Dataset, TimestampError, TimestampPair};
pub use transforms::{
    transform_bounding_boxes, transform_data_to_sensor_frame, transform_points, BoundingBox,
    PointCloud, SensorFrame, TransformError,
};
pub use writers::{write_boxes_csv, write_grid_csv, write_points_csv, WriteError};
