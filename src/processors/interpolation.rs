//! Bilinear resampling of sampled 2D grids.

use rayon::prelude::*;
use thiserror::Error;

/// Added to interpolation denominators so integer-aligned queries do not
/// divide by zero. Those queries are then overwritten with exact samples.
pub const INTERP_EPS: f64 = 1e-14;

/// Errors that can occur while building grids or resampling them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResampleError {
    #[error("query coordinate arrays differ in length: {xs} x values, {ys} y values")]
    LengthMismatch { xs: usize, ys: usize },

    #[error("grid of {rows}x{cols}x{channels} needs {expected} samples, got {found}")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        channels: usize,
        expected: usize,
        found: usize,
    },

    #[error("ragged rows: row {row} has {found} samples, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Result type for resampling operations.
pub type Result<T> = std::result::Result<T, ResampleError>;

/// A `rows × cols × channels` grid of samples stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    channels: usize,
    data: Vec<f64>,
}

impl Grid {
    /// Wrap row-major samples.
    pub fn new(rows: usize, cols: usize, channels: usize, data: Vec<f64>) -> Result<Self> {
        let expected = rows * cols * channels;
        if data.len() != expected {
            return Err(ResampleError::ShapeMismatch {
                rows,
                cols,
                channels,
                expected,
                found: data.len(),
            });
        }
        Ok(Self {
            rows,
            cols,
            channels,
            data,
        })
    }

    /// A zero-filled grid.
    pub fn zeros(rows: usize, cols: usize, channels: usize) -> Self {
        Self {
            rows,
            cols,
            channels,
            data: vec![0.0; rows * cols * channels],
        }
    }

    /// Build a single-channel grid from equal-length rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != cols {
                return Err(ResampleError::RaggedRows {
                    row,
                    expected: cols,
                    found: values.len(),
                });
            }
            data.extend_from_slice(values);
        }
        Self::new(rows.len(), cols, 1, data)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// All samples, row-major.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Channel values at `(row, col)`.
    ///
    /// # Panics
    ///
    /// Panics if the position lies outside the grid.
    #[inline]
    pub fn pixel(&self, row: usize, col: usize) -> &[f64] {
        assert!(
            row < self.rows && col < self.cols,
            "pixel ({row}, {col}) outside {}x{} grid",
            self.rows,
            self.cols
        );
        let start = (row * self.cols + col) * self.channels;
        &self.data[start..start + self.channels]
    }

    /// Mutable channel values at `(row, col)`.
    #[inline]
    pub fn pixel_mut(&mut self, row: usize, col: usize) -> &mut [f64] {
        assert!(
            row < self.rows && col < self.cols,
            "pixel ({row}, {col}) outside {}x{} grid",
            self.rows,
            self.cols
        );
        let start = (row * self.cols + col) * self.channels;
        &mut self.data[start..start + self.channels]
    }

    /// Samples at a floored/ceiled grid coordinate.
    fn corner(&self, row: f64, col: f64) -> &[f64] {
        assert!(
            row >= 0.0 && col >= 0.0 && row < self.rows as f64 && col < self.cols as f64,
            "query corner ({col}, {row}) outside {}x{} grid",
            self.rows,
            self.cols
        );
        self.pixel(row as usize, col as usize)
    }
}

/// Bilinearly interpolate `img` at the fractional positions `(xs[n], ys[n])`.
///
/// `x` indexes columns and `y` indexes rows. The result holds one sample per
/// query with `img.channels()` values each, flattened query-major.
///
/// Queries that fall exactly on an integer column (or row) return the raw
/// grid samples along that axis rather than the epsilon-weighted blend, so
/// grid-aligned queries are exact.
///
/// # Errors
///
/// Returns [`ResampleError::LengthMismatch`] if `xs` and `ys` differ in length.
///
/// # Panics
///
/// Out-of-grid queries are not an error class: callers must clip coordinates
/// to `[0, cols-1] × [0, rows-1]` beforehand. A query outside the grid, or a
/// NaN coordinate, panics.
pub fn bilinear_interp(img: &Grid, xs: &[f64], ys: &[f64]) -> Result<Vec<f64>> {
    if xs.len() != ys.len() {
        return Err(ResampleError::LengthMismatch {
            xs: xs.len(),
            ys: ys.len(),
        });
    }

    let channels = img.channels();
    let mut out = vec![0.0; xs.len() * channels];
    if channels == 0 {
        return Ok(out);
    }

    out.par_chunks_mut(channels)
        .zip(xs.par_iter().zip(ys.par_iter()))
        .for_each(|(dst, (&x, &y))| interpolate_one(img, x, y, dst));

    Ok(out)
}

fn interpolate_one(img: &Grid, x: f64, y: f64, dst: &mut [f64]) {
    let (x1, x2) = (x.floor(), x.ceil());
    let (y1, y2) = (y.floor(), y.ceil());

    let q11 = img.corner(y1, x1);
    let q12 = img.corner(y2, x1);
    let q21 = img.corner(y1, x2);
    let q22 = img.corner(y2, x2);

    let x_21 = x2 - x1 + INTERP_EPS;
    let wx2 = (x2 - x) / x_21;
    let wx1 = (x - x1) / x_21;

    let y_21 = y2 - y1 + INTERP_EPS;
    let wy2 = (y2 - y) / y_21;
    let wy1 = (y - y1) / y_21;

    let x_aligned = x1 == x2;
    let y_aligned = y1 == y2;

    for c in 0..dst.len() {
        let (f_y1, f_y2) = if x_aligned {
            (q11[c], q22[c])
        } else {
            (
                q11[c] * wx2 + q21[c] * wx1,
                q12[c] * wx2 + q22[c] * wx1,
            )
        };

        dst[c] = if y_aligned {
            f_y1
        } else {
            wy2 * f_y1 + wy1 * f_y2
        };
    }
}
