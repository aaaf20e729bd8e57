//! Typed raw records and the adapters that build them from JSON.
//!
//! The recording tools emit loosely-typed JSON objects. Each record shape has
//! exactly one adapter here; the rest of the crate only sees the typed
//! structs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while adapting raw records.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' must have {expected} components, found {found}")]
    Cardinality {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("field '{0}' must be numeric")]
    NotNumeric(&'static str),

    #[error("field '{0}' must be finite")]
    NonFinite(&'static str),

    #[error("field '{0}' has an unexpected type")]
    WrongType(&'static str),

    #[error("extent component {axis} is negative ({value})")]
    NegativeExtent { axis: usize, value: f64 },

    #[error("point {index}: {source}")]
    InvalidPoint {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("label {index}: {source}")]
    InvalidLabel {
        index: usize,
        #[source]
        source: Box<RecordError>,
    },
}

/// Result type for record adapters.
pub type Result<T> = std::result::Result<T, RecordError>;

/// One recorded pose sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPose {
    /// Heading quaternion in on-disk component order.
    pub heading: [f64; 4],
    /// IMU origin expressed in the odometry frame.
    pub position: [f64; 3],
}

/// A single raw lidar return.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub intensity: Option<f64>,
    #[serde(default)]
    pub ring: Option<f64>,
    #[serde(default)]
    pub time: Option<f64>,
}

impl RawPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            intensity: None,
            ring: None,
            time: None,
        }
    }

    /// The non-positional channels of this point.
    #[inline]
    pub fn channels(&self) -> PointChannels {
        PointChannels {
            intensity: self.intensity,
            ring: self.ring,
            time: self.time,
        }
    }
}

/// Auxiliary per-point channels, carried through transforms unmodified.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointChannels {
    pub intensity: Option<f64>,
    pub ring: Option<f64>,
    pub time: Option<f64>,
}

/// One raw 3D object label in the odometry frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLabel {
    pub position: [f64; 3],
    /// Length, width, height.
    pub dimensions: [f64; 3],
    /// Heading about z in radians.
    pub yaw: f64,
    pub label: String,
}

impl RawLabel {
    /// Check that every value is finite and the extent is non-negative.
    pub fn validate(&self) -> Result<()> {
        if self.position.iter().any(|v| !v.is_finite()) {
            return Err(RecordError::NonFinite("position"));
        }
        if self.dimensions.iter().any(|v| !v.is_finite()) {
            return Err(RecordError::NonFinite("dimensions"));
        }
        if !self.yaw.is_finite() {
            return Err(RecordError::NonFinite("yaw"));
        }
        if let Some((axis, &value)) = self.dimensions.iter().enumerate().find(|(_, v)| **v < 0.0) {
            return Err(RecordError::NegativeExtent { axis, value });
        }
        Ok(())
    }

    /// Adapt a single JSON label object.
    pub fn from_json(value: &Value) -> Result<Self> {
        let position = components::<3>(field(value, "position")?, "position")?;
        let dimensions = components::<3>(field(value, "dimensions")?, "dimensions")?;
        let yaw = field(value, "yaw")?
            .as_f64()
            .ok_or(RecordError::NotNumeric("yaw"))?;
        let label = match field(value, "label")? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return Err(RecordError::WrongType("label")),
        };

        let label = Self {
            position,
            dimensions,
            yaw,
            label,
        };
        label.validate()?;
        Ok(label)
    }
}

/// One lidar frame as recorded: timestamp, pose and raw returns.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    /// Lidar timestamp in nanoseconds.
    pub timestamp: i64,
    pub pose: RawPose,
    pub points: Vec<RawPoint>,
}

impl RawPose {
    /// Adapt the `device_heading` / `device_position` fields of a frame.
    pub fn from_json(value: &Value) -> Result<Self> {
        Ok(Self {
            heading: components::<4>(field(value, "device_heading")?, "device_heading")?,
            position: components::<3>(field(value, "device_position")?, "device_position")?,
        })
    }
}

impl RawFrame {
    /// Adapt a full frame record.
    pub fn from_json(value: &Value) -> Result<Self> {
        let timestamp = field(value, "timestamp")?
            .as_i64()
            .ok_or(RecordError::NotNumeric("timestamp"))?;
        let pose = RawPose::from_json(value)?;

        let points = field(value, "points")?
            .as_array()
            .ok_or(RecordError::WrongType("points"))?
            .iter()
            .enumerate()
            .map(|(index, p)| {
                RawPoint::deserialize(p).map_err(|source| RecordError::InvalidPoint { index, source })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            timestamp,
            pose,
            points,
        })
    }
}

/// Adapt a JSON array of labels.
///
/// A single malformed label fails the whole batch; the error carries the
/// offending index.
pub fn labels_from_json(value: &Value) -> Result<Vec<RawLabel>> {
    value
        .as_array()
        .ok_or(RecordError::WrongType("labels"))?
        .iter()
        .enumerate()
        .map(|(index, v)| {
            RawLabel::from_json(v).map_err(|e| RecordError::InvalidLabel {
                index,
                source: Box::new(e),
            })
        })
        .collect()
}

fn field<'a>(value: &'a Value, name: &'static str) -> Result<&'a Value> {
    value.get(name).ok_or(RecordError::MissingField(name))
}

/// Read exactly `N` numeric components from an object (key order) or array.
fn components<const N: usize>(value: &Value, name: &'static str) -> Result<[f64; N]> {
    let values: Vec<&Value> = match value {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        _ => return Err(RecordError::WrongType(name)),
    };

    if values.len() != N {
        return Err(RecordError::Cardinality {
            field: name,
            expected: N,
            found: values.len(),
        });
    }

    let mut out = [0.0; N];
    for (slot, v) in out.iter_mut().zip(values) {
        let n = v.as_f64().ok_or(RecordError::NotNumeric(name))?;
        if !n.is_finite() {
            return Err(RecordError::NonFinite(name));
        }
        *slot = n;
    }
    Ok(out)
}
