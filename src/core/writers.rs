//! Data writers for transformed frames and cartesian radar images.
//!
//! All outputs are CSV:
//! - sensor-frame points with their auxiliary channels
//! - sensor-frame boxes with position, Euler angles and extent
//! - cartesian grids, one CSV row per image row

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use super::transforms::{BoundingBox, PointCloud};
use crate::processors::interpolation::Grid;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a CSV writer over a buffered file at `path`.
fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

fn write_row<I, T>(writer: &mut csv::Writer<BufWriter<File>>, path: &Path, row: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    writer.write_record(row).map_err(|e| WriteError::CsvError {
        path: path.display().to_string(),
        source: e,
    })
}

fn finish(mut writer: csv::Writer<BufWriter<File>>, path: &Path) -> Result<()> {
    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| format!("{:.6}", v)).unwrap_or_default()
}

/// Write sensor-frame points to CSV.
///
/// Columns are `x,y,z,intensity,ring,time`; absent channels are left empty.
///
/// # Example
///
/// ```no_run
/// use sensor_frames::core::transforms::PointCloud;
/// use sensor_frames::core::writers::write_points_csv;
/// use std::path::Path;
///
/// let cloud = PointCloud::default();
/// write_points_csv(Path::new("points.csv"), &cloud).unwrap();
/// ```
pub fn write_points_csv(path: &Path, cloud: &PointCloud) -> Result<()> {
    let mut writer = create_csv_writer(path)?;

    write_row(&mut writer, path, ["x", "y", "z", "intensity", "ring", "time"])?;

    for i in 0..cloud.len() {
        let ch = cloud.channels[i];
        write_row(
            &mut writer,
            path,
            [
                format!("{:.6}", cloud.x[i]),
                format!("{:.6}", cloud.y[i]),
                format!("{:.6}", cloud.z[i]),
                optional(ch.intensity),
                optional(ch.ring),
                optional(ch.time),
            ],
        )?;
    }

    finish(writer, path)
}

/// Write sensor-frame boxes to CSV.
///
/// Columns are `label,x,y,z,yaw,pitch,roll,length,width,height`, with the
/// angles taken from the box rotation.
pub fn write_boxes_csv(path: &Path, boxes: &[BoundingBox]) -> Result<()> {
    let mut writer = create_csv_writer(path)?;

    write_row(
        &mut writer,
        path,
        ["label", "x", "y", "z", "yaw", "pitch", "roll", "length", "width", "height"],
    )?;

    for b in boxes {
        let ypr = b.yaw_pitch_roll();
        write_row(
            &mut writer,
            path,
            [
                b.label.clone(),
                format!("{:.6}", b.position.x),
                format!("{:.6}", b.position.y),
                format!("{:.6}", b.position.z),
                format!("{:.6}", ypr.yaw),
                format!("{:.6}", ypr.pitch),
                format!("{:.6}", ypr.roll),
                format!("{:.6}", b.extent.x),
                format!("{:.6}", b.extent.y),
                format!("{:.6}", b.extent.z),
            ],
        )?;
    }

    finish(writer, path)
}

/// Write a grid to CSV, one record per grid row.
///
/// Multi-channel pixels are written as consecutive fields. No header row.
pub fn write_grid_csv(path: &Path, grid: &Grid) -> Result<()> {
    let mut writer = create_csv_writer(path)?;

    let row_len = grid.cols() * grid.channels();
    if row_len > 0 {
        for row in grid.as_slice().chunks(row_len) {
            write_row(&mut writer, path, row.iter().map(|v| format!("{:.6}", v)))?;
        }
    }

    finish(writer, path)
}
