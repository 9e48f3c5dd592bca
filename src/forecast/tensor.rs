use std::fmt;

use super::units::{kelvin_to_fahrenheit, meters_to_inches, mps_to_mph};
use super::{Frame, FrameError, Variable};

const NPY_MAGIC: &[u8] = b"\x93NUMPY";

/// Dimensions of a raw forecast tensor: `[times, channels, rows, cols]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorShape {
    pub times: usize,
    pub channels: usize,
    pub rows: usize,
    pub cols: usize,
}

impl TensorShape {
    /// Cells per grid, or `None` when the dimensions overflow.
    pub fn cells(&self) -> Option<usize> {
        self.rows.checked_mul(self.cols)
    }

    pub fn byte_len(&self) -> Option<usize> {
        self.times
            .checked_mul(self.channels)?
            .checked_mul(self.cells()?)?
            .checked_mul(size_of::<f32>())
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.times, self.channels, self.rows, self.cols
        )
    }
}

/// Which variable each tensor channel holds.
///
/// The service does not publish its channel order. [`ChannelLayout::assumed`]
/// is what the dashboard expects: temperature (K), radar reflectivity (dBZ),
/// precipitation (m), wind speed (m/s). Change it here if the service says
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    channels: Vec<Variable>,
}

impl ChannelLayout {
    pub fn new(channels: Vec<Variable>) -> Self {
        Self { channels }
    }

    pub fn assumed() -> Self {
        Self::new(vec![
            Variable::Temperature,
            Variable::Radar,
            Variable::Precipitation,
            Variable::Wind,
        ])
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn variable(&self, channel: usize) -> Option<Variable> {
        self.channels.get(channel).copied()
    }
}

/// Converts a raw model value for `variable` to display units.
pub fn to_display_units(variable: Variable, raw: f32) -> f32 {
    match variable {
        Variable::Temperature => kelvin_to_fahrenheit(raw),
        Variable::Radar => raw,
        Variable::Precipitation => meters_to_inches(raw),
        Variable::Wind => mps_to_mph(raw),
    }
}

/// Cell count and byte length of `shape`, once it is known to fit `layout`.
fn check_layout(
    shape: TensorShape,
    layout: &ChannelLayout,
) -> Result<(usize, usize), FrameError> {
    let sizes = shape.cells().zip(shape.byte_len());
    match sizes {
        Some((cells, byte_len))
            if !layout.is_empty() && shape.channels == layout.len() && cells > 0 =>
        {
            Ok((cells, byte_len))
        }
        _ => Err(FrameError::InvalidFrame(format!(
            "shape {shape} does not match a {}-channel layout",
            layout.len()
        ))),
    }
}

fn split_frames(
    values: &[f32],
    shape: TensorShape,
    cells: usize,
    layout: &ChannelLayout,
    step_hours: u32,
) -> Vec<Frame> {
    let mut frames = Vec::with_capacity(shape.times.saturating_mul(shape.channels));
    for (index, grid) in values.chunks_exact(cells).enumerate() {
        let time = index / shape.channels;
        let channel = index % shape.channels;
        let Some(variable) = layout.variable(channel) else {
            continue;
        };
        frames.push(Frame {
            variable,
            hour: time as u32 * step_hours,
            rows: shape.rows,
            cols: shape.cols,
            values: grid.iter().map(|&v| to_display_units(variable, v)).collect(),
        });
    }
    frames
}

/// Splits a little-endian f32 tensor into frames, one per time slice and channel.
pub fn decode_tensor(
    bytes: &[u8],
    shape: TensorShape,
    layout: &ChannelLayout,
    step_hours: u32,
) -> Result<Vec<Frame>, FrameError> {
    let (cells, byte_len) = check_layout(shape, layout)?;
    if bytes.len() != byte_len {
        return Err(FrameError::ShapeMismatch {
            expected: byte_len,
            actual: bytes.len(),
            shape,
        });
    }

    let values: Vec<f32> = bytes
        .chunks_exact(size_of::<f32>())
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(split_frames(&values, shape, cells, layout, step_hours))
}

/// Whether `bytes` start with the `.npy` magic string.
pub fn is_npy(bytes: &[u8]) -> bool {
    bytes.starts_with(NPY_MAGIC)
}

/// Reads a 4-D float32 `.npy` array. The shape comes from the file header,
/// not from the request.
pub fn decode_npy(
    bytes: &[u8],
    layout: &ChannelLayout,
    step_hours: u32,
) -> Result<Vec<Frame>, FrameError> {
    let npy = npyz::NpyFile::new(bytes)
        .map_err(|e| FrameError::InvalidFrame(format!("unreadable npy header: {e}")))?;
    if matches!(npy.order(), npyz::Order::Fortran) {
        return Err(FrameError::InvalidFrame(
            "fortran-ordered npy arrays are not supported".into(),
        ));
    }

    let dim = |d: u64| {
        usize::try_from(d)
            .map_err(|_| FrameError::InvalidFrame(format!("npy dimension {d} is too large")))
    };
    let shape = match npy.shape() {
        &[times, channels, rows, cols] => TensorShape {
            times: dim(times)?,
            channels: dim(channels)?,
            rows: dim(rows)?,
            cols: dim(cols)?,
        },
        other => {
            return Err(FrameError::InvalidFrame(format!(
                "npy array has shape {other:?}, expected [times, channels, rows, cols]"
            )));
        }
    };

    let (cells, byte_len) = check_layout(shape, layout)?;
    // The header must not promise more data than the body holds.
    if byte_len > bytes.len() {
        return Err(FrameError::ShapeMismatch {
            expected: byte_len,
            actual: bytes.len(),
            shape,
        });
    }

    let values: Vec<f32> = npy
        .into_vec()
        .map_err(|e| FrameError::InvalidFrame(format!("npy data: {e}")))?;
    Ok(split_frames(&values, shape, cells, layout, step_hours))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn shape(times: usize) -> TensorShape {
        TensorShape {
            times,
            channels: 4,
            rows: 1,
            cols: 2,
        }
    }

    #[test]
    fn frames_follow_time_then_channel_order() {
        let raw = [
            273.15, 273.15, 30.0, 40.0, 0.0, 0.0254, 0.0, 10.0, // t = 0
            283.15, 283.15, 35.0, 45.0, 0.0254, 0.0508, 5.0, 0.0, // t = 1
        ];
        let frames = decode_tensor(&encode(&raw), shape(2), &ChannelLayout::assumed(), 3).unwrap();

        assert_eq!(frames.len(), 8);
        assert_eq!(frames[0].variable, Variable::Temperature);
        assert_eq!(frames[0].hour, 0);
        assert!((frames[0].values[0] - 32.0).abs() < 1e-3);
        assert_eq!(frames[1].variable, Variable::Radar);
        assert_eq!(frames[1].values, vec![30.0, 40.0]);
        assert!((frames[2].values[1] - 1.0).abs() < 1e-3);
        assert!((frames[3].values[1] - 22.3694).abs() < 1e-3);
        assert_eq!(frames[4].hour, 3);
        assert!((frames[6].values[1] - 2.0).abs() < 1e-3);
    }

    #[test]
    fn size_mismatch_is_reported() {
        let err = decode_tensor(&encode(&[1.0; 7]), shape(1), &ChannelLayout::assumed(), 3)
            .unwrap_err();
        match err {
            FrameError::ShapeMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, 32);
                assert_eq!(actual, 28);
            }
            other => panic!("expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn layout_must_cover_channels() {
        let layout = ChannelLayout::new(vec![Variable::Radar]);
        assert!(decode_tensor(&encode(&[0.0; 8]), shape(1), &layout, 3).is_err());
    }

    #[test]
    fn oversized_shape_is_invalid_not_a_panic() {
        let huge = TensorShape {
            times: 2,
            channels: 4,
            rows: usize::MAX / 2,
            cols: 3,
        };
        assert_eq!(huge.cells(), None);
        assert_eq!(huge.byte_len(), None);
        assert!(matches!(
            decode_tensor(&[], huge, &ChannelLayout::assumed(), 3),
            Err(FrameError::InvalidFrame(_))
        ));
    }

    /// Builds a version 1.0 `.npy` file the way numpy writes one.
    fn npy_bytes(descr: &str, shape: &str, data: &[u8]) -> Vec<u8> {
        let mut header =
            format!("{{'descr': '{descr}', 'fortran_order': False, 'shape': {shape}, }}");
        let unpadded = 10 + header.len() + 1;
        header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
        header.push('\n');

        let mut out = b"\x93NUMPY\x01\x00".to_vec();
        out.extend_from_slice(&(header.len() as u16).to_le_bytes());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn npy_file_is_read_with_its_own_shape() {
        let raw = [273.15, 30.0, 0.0254, 10.0, 283.15, 35.0, 0.0508, 0.0];
        let bytes = npy_bytes("<f4", "(2, 4, 1, 1)", &encode(&raw));
        assert!(is_npy(&bytes));

        let frames = decode_npy(&bytes, &ChannelLayout::assumed(), 3).unwrap();
        assert_eq!(frames.len(), 8);
        assert_eq!((frames[0].rows, frames[0].cols), (1, 1));
        assert!((frames[0].values[0] - 32.0).abs() < 1e-3);
        assert_eq!(frames[1].values, vec![30.0]);
        assert!((frames[2].values[0] - 1.0).abs() < 1e-3);
        assert_eq!(frames[4].hour, 3);
        assert!((frames[6].values[0] - 2.0).abs() < 1e-3);
    }

    #[test]
    fn npy_payload_reaches_frames_through_decode() {
        use crate::forecast::frames_from_payload;
        use crate::remote::{RawResult, decode};

        let bytes = npy_bytes("<f4", "(2, 4, 1, 1)", &encode(&[1.0; 8]));
        let payload = decode(RawResult::new(bytes, "application/x-npy"));
        // Configured grid and step count disagree with the file; the header wins.
        let frames = frames_from_payload(&payload, 12, 3, 721, 1440).unwrap();
        assert_eq!(frames.len(), 8);
        assert_eq!(frames[7].hour, 3);
    }

    #[test]
    fn npy_with_wrong_rank_or_dtype_is_rejected() {
        let flat = npy_bytes("<f4", "(8,)", &encode(&[0.0; 8]));
        assert!(matches!(
            decode_npy(&flat, &ChannelLayout::assumed(), 3),
            Err(FrameError::InvalidFrame(_))
        ));

        let doubles: Vec<u8> = [0.0f64; 4].iter().flat_map(|v| v.to_le_bytes()).collect();
        let wide = npy_bytes("<f8", "(1, 4, 1, 1)", &doubles);
        assert!(decode_npy(&wide, &ChannelLayout::assumed(), 3).is_err());
    }

    #[test]
    fn npy_header_larger_than_body_is_rejected() {
        let bytes = npy_bytes("<f4", "(1000000, 4, 1000, 1000)", &encode(&[0.0; 4]));
        assert!(matches!(
            decode_npy(&bytes, &ChannelLayout::assumed(), 3),
            Err(FrameError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn shape_display() {
        assert_eq!(shape(13).to_string(), "[13, 4, 1, 2]");
    }
}
