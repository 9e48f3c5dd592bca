//! Dashboard metadata written next to the rendered maps.
//!
//! `rain_data.json` holds the cycle time and cumulative rain per lead hour;
//! `frames.json` lists a summary of every exported frame.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::units::round2;
use super::{Frame, FrameSource, Variable};
use crate::error::ForecastError;
use crate::remote::DecodedPayload;
use crate::remote::decode::media_type;

pub const RAIN_DATA_FILE: &str = "rain_data.json";
pub const FRAMES_FILE: &str = "frames.json";

/// Contents of `rain_data.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteMeta {
    /// Cycle start, truncated to the hour (`2024-06-01T12:00:00Z`).
    pub cycle: String,
    /// Cumulative rain in inches keyed by lead hour.
    pub rain_totals: BTreeMap<u32, f64>,
    /// Human-readable generation time (`Jun 01, 2024 12:34 UTC`).
    pub generated: String,
    pub source: FrameSource,
}

impl SiteMeta {
    pub fn new(base_time: DateTime<Utc>, frames: &[Frame], source: FrameSource) -> Self {
        let cycle_start = base_time
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .unwrap_or(base_time);
        Self {
            cycle: cycle_start.format("%Y-%m-%dT%H:00:00Z").to_string(),
            rain_totals: rain_totals(frames),
            generated: base_time.format("%b %d, %Y %H:%M UTC").to_string(),
            source,
        }
    }
}

/// Running total of each step's peak precipitation, rounded per entry.
pub fn rain_totals(frames: &[Frame]) -> BTreeMap<u32, f64> {
    let mut precip: Vec<&Frame> = frames
        .iter()
        .filter(|f| f.variable == Variable::Precipitation)
        .collect();
    precip.sort_by_key(|f| f.hour);

    let mut cumulative = 0.0f64;
    precip
        .into_iter()
        .map(|frame| {
            cumulative += f64::from(frame.stats().max.max(0.0));
            (frame.hour, round2(cumulative))
        })
        .collect()
}

/// One entry of `frames.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSummary {
    pub variable: Variable,
    pub title: String,
    /// Output stem for this frame, `{file}_{hour}`.
    pub file: String,
    pub unit: String,
    pub hour: u32,
    pub rows: usize,
    pub cols: usize,
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

impl FrameSummary {
    pub fn from_frame(frame: &Frame) -> Self {
        let stats = frame.stats();
        Self {
            variable: frame.variable,
            title: frame.variable.title().to_string(),
            file: format!("{}_{}", frame.variable.file_stem(), frame.hour),
            unit: frame.variable.unit().to_string(),
            hour: frame.hour,
            rows: frame.rows,
            cols: frame.cols,
            min: stats.min,
            max: stats.max,
            mean: stats.mean,
        }
    }
}

/// Writes `rain_data.json` and `frames.json` into `dir`, creating it if needed.
pub fn write_outputs(
    dir: &Path,
    meta: &SiteMeta,
    frames: &[Frame],
) -> Result<Vec<PathBuf>, ForecastError> {
    fs::create_dir_all(dir)?;

    let meta_path = dir.join(RAIN_DATA_FILE);
    fs::write(&meta_path, serde_json::to_vec(meta)?)?;

    let summaries: Vec<FrameSummary> = frames.iter().map(FrameSummary::from_frame).collect();
    let frames_path = dir.join(FRAMES_FILE);
    fs::write(&frames_path, serde_json::to_vec_pretty(&summaries)?)?;

    log::info!(
        "wrote {} frame summaries and metadata for cycle {} to {}",
        summaries.len(),
        meta.cycle,
        dir.display()
    );
    Ok(vec![meta_path, frames_path])
}

fn payload_extension(content_type: &str) -> &'static str {
    match media_type(content_type).as_str() {
        "application/zip" | "application/x-zip-compressed" => "zip",
        "application/gzip" => "gz",
        "application/x-tar" => "tar",
        "application/json" | "text/json" => "json",
        "application/x-npy" => "npy",
        _ => "bin",
    }
}

/// Keeps the raw remote payload as `payload.<ext>` for later extraction.
pub fn save_payload(dir: &Path, payload: &DecodedPayload) -> Result<PathBuf, ForecastError> {
    fs::create_dir_all(dir)?;
    let (path, bytes) = match payload {
        DecodedPayload::Record(value) => (
            dir.join("payload.json"),
            serde_json::to_vec_pretty(value)?,
        ),
        DecodedPayload::Blob {
            bytes,
            content_type,
        }
        | DecodedPayload::Undecoded {
            bytes,
            content_type,
        } => (
            dir.join(format!("payload.{}", payload_extension(content_type))),
            bytes.clone(),
        ),
    };
    fs::write(&path, bytes)?;
    Ok(path)
}
