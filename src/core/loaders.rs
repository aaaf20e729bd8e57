//! Data loaders for recorded frames, labels and radar sweeps.
//!
//! This module provides parsers for:
//! - Lidar frame JSON files (timestamp, IMU pose and raw returns)
//! - Label JSON files (one object per annotated box)
//! - Radar sweep CSV files (polar format with echo intensity data)

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use log::debug;
use serde_json::Value;
use thiserror::Error;

use super::records::{labels_from_json, RawFrame, RawLabel, RecordError};
use crate::config::RadarConfig;
use crate::processors::interpolation::{Grid, ResampleError};

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed record: {0}")]
    Record(#[from] RecordError),

    #[error("invalid sweep shape: {0}")]
    Shape(#[from] ResampleError),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Container for radar sweep data in polar coordinates.
#[derive(Debug, Clone)]
pub struct RadarSweep {
    /// Azimuth of each sweep line in radians.
    pub azimuths: Vec<f64>,
    /// Echo intensities, one row per azimuth and one column per range bin.
    pub intensities: Grid,
    /// Width of each range bin in meters.
    pub range_resolution: f64,
    /// Gain setting if uniform across the sweep.
    pub gain: Option<i32>,
    /// Source file path.
    pub source_path: Option<PathBuf>,
}

impl RadarSweep {
    /// Returns the number of azimuths (sweep lines) in this sweep.
    #[inline]
    pub fn num_azimuths(&self) -> usize {
        self.azimuths.len()
    }

    /// Returns the number of range bins per azimuth.
    #[inline]
    pub fn num_bins(&self) -> usize {
        self.intensities.cols()
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Load one lidar frame from its JSON record.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not JSON, or is missing
/// the timestamp, pose or point fields.
pub fn load_frame_json<P: AsRef<Path>>(path: P) -> Result<RawFrame> {
    let path = path.as_ref();
    let frame = RawFrame::from_json(&read_json(path)?)?;
    debug!(
        "loaded frame {} with {} points from {}",
        frame.timestamp,
        frame.points.len(),
        path.display()
    );
    Ok(frame)
}

/// Load the labels of one frame from a JSON array.
///
/// A single malformed label fails the whole file.
pub fn load_labels_json<P: AsRef<Path>>(path: P) -> Result<Vec<RawLabel>> {
    let path = path.as_ref();
    let labels = labels_from_json(&read_json(path)?)?;
    debug!("loaded {} labels from {}", labels.len(), path.display());
    Ok(labels)
}

/// Load radar sweep data from a CSV file.
///
/// The expected CSV format:
/// - Header row (skipped)
/// - Columns: Status, Scale, Range, Gain, Angle, Echo_0, Echo_1, ..., Echo_N
///
/// # Arguments
///
/// * `path` - Path to the radar CSV file
/// * `config` - Radar configuration (uses defaults if None)
///
/// # Returns
///
/// A `RadarSweep` containing azimuths, intensities, and metadata.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_radar_csv<P: AsRef<Path>>(path: P, config: Option<&RadarConfig>) -> Result<RadarSweep> {
    let path = path.as_ref();
    let default_config = RadarConfig::default();
    let config = config.unwrap_or(&default_config);

    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let num_echo_cols = config.num_echo_columns;

    let mut azimuths = Vec::new();
    let mut data = Vec::new();
    let mut gain_values = Vec::new();

    for result in reader.records() {
        let record = result?;

        // Fixed columns: Status(0), Scale(1), Range(2), Gain(3), Angle(4)
        if record.len() < 5 {
            continue;
        }

        let gain: i32 = record
            .get(3)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);

        let angle_raw: f64 = record
            .get(4)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0.0);

        azimuths.push((angle_raw * config.angle_scale).to_radians());
        gain_values.push(gain);

        // Echo columns start at index 5; missing values read as zero
        for i in 0..num_echo_cols {
            let val: f64 = record
                .get(5 + i)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0.0);
            data.push(val);
        }
    }

    if azimuths.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    // Determine uniform gain if all values are the same
    let gain = match gain_values.first() {
        Some(&first) if gain_values.iter().all(|&g| g == first) => Some(first),
        _ => None,
    };

    let intensities = Grid::new(azimuths.len(), num_echo_cols, 1, data)?;

    Ok(RadarSweep {
        azimuths,
        intensities,
        range_resolution: config.range_resolution_m,
        gain,
        source_path: Some(path.to_path_buf()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_frame_json() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"timestamp": 1000, "device_heading": {{"a": 1.0, "b": 0.0, "c": 0.0, "d": 0.0}},
                "device_position": {{"x": 0.0, "y": 1.0, "z": 2.0}},
                "points": [{{"x": 1.0, "y": 2.0, "z": 3.0, "intensity": 5.0}}]}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let frame = load_frame_json(file.path())?;
        assert_eq!(frame.timestamp, 1000);
        assert_eq!(frame.pose.position, [0.0, 1.0, 2.0]);
        assert_eq!(frame.points.len(), 1);

        Ok(())
    }

    #[test]
    fn test_load_frame_json_rejects_garbage() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        file.flush().unwrap();

        assert!(matches!(load_frame_json(file.path()), Err(LoaderError::Json(_))));
    }

    #[test]
    fn test_load_labels_json() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"[{{"position": [1, 2, 3], "dimensions": [4, 2, 1.5], "yaw": 0.1, "label": "Car"}}]"#
        )
        .unwrap();
        file.flush().unwrap();

        let labels = load_labels_json(file.path())?;
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].position, [1.0, 2.0, 3.0]);

        Ok(())
    }

    #[test]
    fn test_load_radar_csv() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Status,Scale,Range,Gain,Angle,Echo_0,Echo_1,Echo_2").unwrap();
        writeln!(file, "0,100,50,40,0,10,20,30").unwrap();
        writeln!(file, "0,100,50,40,2049,11,21").unwrap();
        file.flush().unwrap();

        let config = RadarConfig {
            num_echo_columns: 3,
            ..RadarConfig::default()
        };
        let sweep = load_radar_csv(file.path(), Some(&config))?;

        assert_eq!(sweep.num_azimuths(), 2);
        assert_eq!(sweep.num_bins(), 3);
        assert_eq!(sweep.gain, Some(40));
        assert_eq!(sweep.intensities.pixel(0, 2), &[30.0]);
        // short rows are zero-filled
        assert_eq!(sweep.intensities.pixel(1, 2), &[0.0]);
        // 2049 * 360 / 8196 degrees is a quarter turn
        assert!((sweep.azimuths[1] - std::f64::consts::FRAC_PI_2).abs() < 1e-3);

        Ok(())
    }

    #[test]
    fn test_load_radar_csv_empty() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Status,Scale,Range,Gain,Angle,Echo_0").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_radar_csv(file.path(), None),
            Err(LoaderError::EmptyFile(_))
        ));
    }
}
