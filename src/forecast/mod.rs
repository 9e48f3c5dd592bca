//! Turning decoded payloads into per-variable forecast frames.
//!
//! Frames carry display units (°F, dBZ, inches, MPH). When a payload
//! cannot be turned into frames the caller switches to
//! [`placeholder`] output.

pub mod metadata;
pub mod placeholder;
pub mod tensor;
pub mod units;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::remote::DecodedPayload;

pub use tensor::{ChannelLayout, TensorShape};

/// Variables exported to the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Variable {
    #[serde(rename = "radar")]
    Radar,
    #[serde(rename = "t2m")]
    Temperature,
    #[serde(rename = "precip")]
    Precipitation,
    #[serde(rename = "wind")]
    Wind,
}

impl Variable {
    pub const ALL: [Variable; 4] = [
        Variable::Radar,
        Variable::Temperature,
        Variable::Precipitation,
        Variable::Wind,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Variable::Radar => "Simulated Radar",
            Variable::Temperature => "Temperature",
            Variable::Precipitation => "Precipitation",
            Variable::Wind => "Wind Speed",
        }
    }

    /// Stem used for output file names (`{file}_{hour}`).
    pub fn file_stem(self) -> &'static str {
        match self {
            Variable::Radar => "radar",
            Variable::Temperature => "t2m",
            Variable::Precipitation => "precip",
            Variable::Wind => "wind",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Variable::Radar => "dBZ",
            Variable::Temperature => "°F",
            Variable::Precipitation => "in",
            Variable::Wind => "MPH",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Where exported frames came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameSource {
    Remote,
    Placeholder,
}

/// One variable at one lead time, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub variable: Variable,
    /// Lead time in hours from the cycle start.
    pub hour: u32,
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

impl Frame {
    /// Min, max and mean over finite cells; all zero when there are none.
    pub fn stats(&self) -> FrameStats {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        let mut count = 0usize;
        for &v in self.values.iter().filter(|v| v.is_finite()) {
            min = min.min(v);
            max = max.max(v);
            sum += f64::from(v);
            count += 1;
        }
        if count == 0 {
            return FrameStats {
                min: 0.0,
                max: 0.0,
                mean: 0.0,
            };
        }
        FrameStats {
            min,
            max,
            mean: (sum / count as f64) as f32,
        }
    }

    fn check_dimensions(&self) -> Result<(), FrameError> {
        let cells = self.rows.checked_mul(self.cols);
        if self.rows == 0 || self.cols == 0 || cells != Some(self.values.len()) {
            return Err(FrameError::InvalidFrame(format!(
                "{} +{}h: {}x{} grid with {} values",
                self.variable.file_stem(),
                self.hour,
                self.rows,
                self.cols,
                self.values.len()
            )));
        }
        Ok(())
    }
}

/// Reasons a payload could not be turned into frames.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("payload of type {content_type:?} was not decoded")]
    Undecoded { content_type: String },

    #[error("record has no usable `frames` array: {0}")]
    MissingFrames(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("tensor has {actual} bytes, expected {expected} for shape {shape}")]
    ShapeMismatch {
        expected: usize,
        actual: usize,
        shape: TensorShape,
    },
}

/// Frames carried by a structured record: `{"frames": [{variable, hour, rows, cols, values}, ...]}`.
pub fn frames_from_record(record: &serde_json::Value) -> Result<Vec<Frame>, FrameError> {
    let raw = record
        .get("frames")
        .cloned()
        .ok_or_else(|| FrameError::MissingFrames("field absent".into()))?;
    let frames: Vec<Frame> =
        serde_json::from_value(raw).map_err(|e| FrameError::MissingFrames(e.to_string()))?;
    if frames.is_empty() {
        return Err(FrameError::MissingFrames("array is empty".into()));
    }
    for frame in &frames {
        frame.check_dimensions()?;
    }
    Ok(frames)
}

/// Frames for a decoded payload. `steps` is the number of forecast steps
/// requested; headerless tensors carry `steps + 1` time slices of
/// `rows x cols`. `.npy` bodies carry their own shape.
pub fn frames_from_payload(
    payload: &DecodedPayload,
    steps: u32,
    step_hours: u32,
    rows: usize,
    cols: usize,
) -> Result<Vec<Frame>, FrameError> {
    match payload {
        DecodedPayload::Record(record) => frames_from_record(record),
        DecodedPayload::Blob { bytes, .. } if tensor::is_npy(bytes) => {
            tensor::decode_npy(bytes, &ChannelLayout::assumed(), step_hours)
        }
        DecodedPayload::Blob { bytes, .. } => {
            let layout = ChannelLayout::assumed();
            let shape = TensorShape {
                times: steps as usize + 1,
                channels: layout.len(),
                rows,
                cols,
            };
            tensor::decode_tensor(bytes, shape, &layout, step_hours)
        }
        DecodedPayload::Undecoded { content_type, .. } => Err(FrameError::Undecoded {
            content_type: content_type.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn variable_catalogue() {
        assert_eq!(Variable::Radar.file_stem(), "radar");
        assert_eq!(Variable::Temperature.unit(), "°F");
        assert_eq!(Variable::Precipitation.title(), "Precipitation");
        assert_eq!(Variable::Wind.to_string(), "Wind Speed");
    }

    #[test]
    fn variable_serializes_as_file_stem() {
        assert_eq!(serde_json::to_value(Variable::Temperature).unwrap(), json!("t2m"));
        let v: Variable = serde_json::from_value(json!("precip")).unwrap();
        assert_eq!(v, Variable::Precipitation);
    }

    #[test]
    fn stats_ignore_non_finite_cells() {
        let frame = Frame {
            variable: Variable::Radar,
            hour: 0,
            rows: 2,
            cols: 2,
            values: vec![1.0, 3.0, f32::NAN, 5.0],
        };
        let stats = frame.stats();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
        assert_eq!(stats.mean, 3.0);
    }

    #[test]
    fn record_frames_are_parsed() {
        let record = json!({
            "frames": [
                {"variable": "t2m", "hour": 0, "rows": 1, "cols": 2, "values": [50.0, 52.0]},
                {"variable": "precip", "hour": 3, "rows": 1, "cols": 2, "values": [0.0, 0.1]}
            ]
        });
        let frames = frames_from_record(&record).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].variable, Variable::Precipitation);
        assert_eq!(frames[1].hour, 3);
    }

    #[test]
    fn record_without_frames_is_unusable() {
        let err = frames_from_record(&json!({"status": "done"})).unwrap_err();
        assert!(matches!(err, FrameError::MissingFrames(_)));
    }

    #[test]
    fn record_frame_with_wrong_size_is_rejected() {
        let record = json!({
            "frames": [{"variable": "wind", "hour": 0, "rows": 2, "cols": 2, "values": [1.0]}]
        });
        assert!(matches!(
            frames_from_record(&record),
            Err(FrameError::InvalidFrame(_))
        ));
    }

    #[test]
    fn record_frame_with_overflowing_size_is_rejected() {
        let record = json!({
            "frames": [{
                "variable": "radar",
                "hour": 0,
                "rows": 9223372036854775808u64,
                "cols": 2,
                "values": []
            }]
        });
        assert!(matches!(
            frames_from_record(&record),
            Err(FrameError::InvalidFrame(_))
        ));
    }

    #[test]
    fn undecoded_payload_yields_no_frames() {
        let payload = DecodedPayload::Undecoded {
            bytes: b"PK\x03\x04".to_vec(),
            content_type: "application/zip".into(),
        };
        let err = frames_from_payload(&payload, 12, 3, 2, 2).unwrap_err();
        assert!(matches!(err, FrameError::Undecoded { content_type } if content_type == "application/zip"));
    }

    #[test]
    fn blob_payload_is_decoded_as_tensor() {
        // One step -> two time slices, four channels, 1x1 grid.
        let values: [f32; 8] = [273.15, 10.0, 0.0254, 1.0, 283.15, 20.0, 0.0, 2.0];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let payload = DecodedPayload::Blob {
            bytes,
            content_type: "application/octet-stream".into(),
        };
        let frames = frames_from_payload(&payload, 1, 3, 1, 1).unwrap();
        assert_eq!(frames.len(), 8);
        assert_eq!(frames[4].hour, 3);
    }
}
