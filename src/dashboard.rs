//! Export stage: decoded payload in, dashboard files out.
//!
//! A payload that cannot be turned into frames does not abort the run.
//! The raw bytes are kept and placeholder frames are exported instead.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::config::ForecastConfig;
use crate::error::ForecastError;
use crate::forecast::metadata::{SiteMeta, save_payload, write_outputs};
use crate::forecast::{Frame, FrameSource, frames_from_payload, placeholder};
use crate::remote::DecodedPayload;

/// What an export wrote and why.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub source: FrameSource,
    pub frames: usize,
    pub files: Vec<PathBuf>,
    /// Set when placeholder frames replaced the remote payload.
    pub fallback_reason: Option<String>,
}

fn write(
    config: &ForecastConfig,
    frames: &[Frame],
    source: FrameSource,
    base_time: DateTime<Utc>,
) -> Result<Vec<PathBuf>, ForecastError> {
    let meta = SiteMeta::new(base_time, frames, source);
    write_outputs(&config.output_dir, &meta, frames)
}

/// Exports placeholder frames only.
pub fn export_placeholder<R: Rng + ?Sized>(
    config: &ForecastConfig,
    steps: u32,
    base_time: DateTime<Utc>,
    rng: &mut R,
    reason: Option<String>,
) -> Result<ExportReport, ForecastError> {
    let frames = placeholder::generate(config.extent, steps, config.step_hours, rng);
    let files = write(config, &frames, FrameSource::Placeholder, base_time)?;
    Ok(ExportReport {
        source: FrameSource::Placeholder,
        frames: frames.len(),
        files,
        fallback_reason: reason,
    })
}

/// Exports a remote payload, falling back to placeholder frames when it
/// holds nothing usable.
pub fn export_payload<R: Rng + ?Sized>(
    config: &ForecastConfig,
    payload: &DecodedPayload,
    steps: u32,
    base_time: DateTime<Utc>,
    rng: &mut R,
) -> Result<ExportReport, ForecastError> {
    let report = match frames_from_payload(
        payload,
        steps,
        config.step_hours,
        config.grid_rows,
        config.grid_cols,
    ) {
        Ok(frames) => {
            let files = write(config, &frames, FrameSource::Remote, base_time)?;
            ExportReport {
                source: FrameSource::Remote,
                frames: frames.len(),
                files,
                fallback_reason: None,
            }
        }
        Err(reason) => {
            log::warn!("using placeholder frames: {reason}");
            let payload_path = save_payload(&config.output_dir, payload)?;
            let mut report =
                export_placeholder(config, steps, base_time, rng, Some(reason.to_string()))?;
            report.files.insert(0, payload_path);
            report
        }
    };
    Ok(report)
}
