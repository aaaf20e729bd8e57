//! Grid resampling and radar image generation.

pub mod cartesian;
pub mod interpolation;

// Re-export key types for convenience
pub use cartesian::{convert_radar_csv, convert_radar_dir, polar_to_cart, CartesianError};
pub use interpolation::{bilinear_interp, Grid, ResampleError};
