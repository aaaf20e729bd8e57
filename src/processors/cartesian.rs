//! Polar radar sweep to cartesian image conversion.

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use rayon::prelude::*;
use thiserror::Error;

use super::interpolation::{bilinear_interp, Grid, ResampleError};
use crate::config::RadarConfig;
use crate::core::loaders::{load_radar_csv, RadarSweep};
use crate::core::writers::write_grid_csv;

/// Errors that can occur during cartesian conversion.
#[derive(Debug, Error)]
pub enum CartesianError {
    #[error("need at least two azimuths, got {0}")]
    TooFewAzimuths(usize),

    #[error("sweep has no range bins")]
    NoRangeBins,

    #[error("azimuths must increase, step is {0}")]
    NonIncreasingAzimuths(f64),

    #[error("{name} must be positive, got {value}")]
    InvalidResolution { name: &'static str, value: f64 },

    #[error("cartesian image width must be positive")]
    ZeroWidth,

    #[error("No CSV files found in {folder}")]
    NoFilesFound { folder: PathBuf },

    #[error(transparent)]
    Resample(#[from] ResampleError),
}

/// Half-extent of the cartesian image, measured to the outer pixel centres.
fn cart_min_range(cart_resolution: f64, cart_pixel_width: usize) -> f64 {
    if cart_pixel_width % 2 == 0 {
        (cart_pixel_width as f64 / 2.0 - 0.5) * cart_resolution
    } else {
        (cart_pixel_width / 2) as f64 * cart_resolution
    }
}

/// Evenly spaced samples over `[start, stop]`, endpoints included.
fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num)
                .map(|i| if i == num - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Resample a polar sweep onto a square cartesian grid centred on the sensor.
///
/// Image rows run from +x (forward) at the top to -x at the bottom; columns
/// run from -y to +y. Each pixel's range and azimuth are mapped to a
/// fractional (range bin, azimuth) position and sampled bilinearly. Pixels
/// past the last range bin are zero.
///
/// The sweep is treated as closed: pixels between the last azimuth line and
/// the first one (across 2π) blend those two lines. Azimuths further outside
/// a partial sweep clamp to the nearest wrapped line.
///
/// # Arguments
///
/// * `sweep` - Polar sweep with increasing, evenly spaced azimuths
/// * `cart_resolution` - Pixel size in meters
/// * `cart_pixel_width` - Image width and height in pixels
pub fn polar_to_cart(
    sweep: &RadarSweep,
    cart_resolution: f64,
    cart_pixel_width: usize,
) -> std::result::Result<Grid, CartesianError> {
    let num_azimuths = sweep.num_azimuths();
    let num_bins = sweep.num_bins();

    if num_azimuths < 2 {
        return Err(CartesianError::TooFewAzimuths(num_azimuths));
    }
    if num_bins == 0 {
        return Err(CartesianError::NoRangeBins);
    }
    if cart_pixel_width == 0 {
        return Err(CartesianError::ZeroWidth);
    }
    if !(cart_resolution.is_finite() && cart_resolution > 0.0) {
        return Err(CartesianError::InvalidResolution {
            name: "cart_resolution",
            value: cart_resolution,
        });
    }
    let range_resolution = sweep.range_resolution;
    if !(range_resolution.is_finite() && range_resolution > 0.0) {
        return Err(CartesianError::InvalidResolution {
            name: "range_resolution",
            value: range_resolution,
        });
    }

    let azimuth_start = sweep.azimuths[0];
    let azimuth_step = sweep.azimuths[1] - sweep.azimuths[0];
    if !(azimuth_step.is_finite() && azimuth_step > 0.0) {
        return Err(CartesianError::NonIncreasingAzimuths(azimuth_step));
    }

    let half = cart_min_range(cart_resolution, cart_pixel_width);
    let coords = linspace(-half, half, cart_pixel_width);

    let polar = wrap_azimuths(&sweep.intensities)?;

    let max_u = (num_bins - 1) as f64;
    // row 0 of `polar` is the last sweep line, row n+1 the first
    let max_v = (num_azimuths + 1) as f64;

    // (pixel index, u, v) for every pixel inside the sweep's range
    let queries: Vec<(usize, f64, f64)> = (0..cart_pixel_width * cart_pixel_width)
        .into_par_iter()
        .filter_map(|idx| {
            let (row, col) = (idx / cart_pixel_width, idx % cart_pixel_width);
            let x = -coords[row];
            let y = coords[col];

            let range = (x * x + y * y).sqrt();
            let mut angle = y.atan2(x);
            if angle < 0.0 {
                angle += 2.0 * PI;
            }

            let u = ((range - range_resolution / 2.0) / range_resolution).max(0.0);
            if u > max_u {
                return None;
            }
            let v = ((angle - azimuth_start) / azimuth_step + 1.0).clamp(0.0, max_v);

            Some((idx, u, v))
        })
        .collect();

    let us: Vec<f64> = queries.iter().map(|q| q.1).collect();
    let vs: Vec<f64> = queries.iter().map(|q| q.2).collect();
    let samples = bilinear_interp(&polar, &us, &vs)?;

    let channels = sweep.intensities.channels();
    let mut cart = Grid::zeros(cart_pixel_width, cart_pixel_width, channels);
    for (q, values) in queries.iter().zip(samples.chunks(channels.max(1))) {
        let (row, col) = (q.0 / cart_pixel_width, q.0 % cart_pixel_width);
        cart.pixel_mut(row, col).copy_from_slice(values);
    }

    Ok(cart)
}

/// Pad a polar grid with its last row in front and its first row behind so
/// interpolation crosses the 0/2π seam.
fn wrap_azimuths(polar: &Grid) -> std::result::Result<Grid, ResampleError> {
    let row_len = polar.cols() * polar.channels();
    let data = polar.as_slice();
    let (first, last) = (&data[..row_len], &data[data.len() - row_len..]);

    let mut padded = Vec::with_capacity(data.len() + 2 * row_len);
    padded.extend_from_slice(last);
    padded.extend_from_slice(data);
    padded.extend_from_slice(first);

    Grid::new(polar.rows() + 2, polar.cols(), polar.channels(), padded)
}

/// Convert a single radar CSV to a cartesian image CSV.
///
/// # Returns
///
/// The number of pixels in the written image.
pub fn convert_radar_csv(input: &Path, output: &Path, config: &RadarConfig) -> Result<usize> {
    let sweep = load_radar_csv(input, Some(config))
        .with_context(|| format!("Failed to load radar sweep: {}", input.display()))?;

    let cart = polar_to_cart(&sweep, config.cart_resolution_m, config.cart_pixel_width)
        .with_context(|| format!("Failed to resample {}", input.display()))?;

    write_grid_csv(output, &cart)
        .with_context(|| format!("Failed to write output file: {}", output.display()))?;

    Ok(cart.rows() * cart.cols())
}

/// Convert every radar CSV in `input_dir` into `output_dir`, in parallel.
///
/// Files are processed in sorted order; failures are logged and counted but
/// do not stop the batch.
///
/// # Returns
///
/// The number of files converted successfully.
pub fn convert_radar_dir(
    input_dir: &Path,
    output_dir: &Path,
    limit: Option<usize>,
    config: &RadarConfig,
) -> Result<usize> {
    let mut files: Vec<PathBuf> = fs::read_dir(input_dir)
        .map_err(|_| CartesianError::NoFilesFound {
            folder: input_dir.to_path_buf(),
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .collect();

    if files.is_empty() {
        return Err(CartesianError::NoFilesFound {
            folder: input_dir.to_path_buf(),
        }
        .into());
    }

    files.sort();
    files.truncate(limit.unwrap_or(usize::MAX));

    let converted = files
        .par_iter()
        .filter(|src| {
            let name = src.file_stem().unwrap_or_default().to_string_lossy();
            let dest = output_dir.join(format!("{}_cartesian.csv", name));
            match convert_radar_csv(src, &dest, config) {
                Ok(_) => {
                    info!("{} -> {}", src.display(), dest.display());
                    true
                }
                Err(e) => {
                    warn!("Failed to convert {}: {:#}", src.display(), e);
                    false
                }
            }
        })
        .count();

    Ok(converted)
}
