//! Synthetic frames used when the remote payload cannot be used.
//!
//! A single storm cell drifts east across the extent by half a degree per
//! step, so an animated dashboard is never blank.

use rand::Rng;

use super::{Frame, Variable};

/// Cells per side of the placeholder grid.
pub const GRID_SIZE: usize = 100;

const STORM_START_LON: f64 = -86.0;
const STORM_DRIFT_PER_STEP: f64 = 0.5;
const STORM_LAT: f64 = 36.0;
const STORM_SPREAD: f64 = 1.5;

/// Evenly spaced values from `start` to `end` inclusive.
fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![start; n];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Storm intensity in `[0, 1]` over the extent `[lon_min, lon_max, lat_min, lat_max]`.
fn storm_blob(extent: [f64; 4], step: u32) -> Vec<f32> {
    let lons = linspace(extent[0], extent[1], GRID_SIZE);
    let lats = linspace(extent[2], extent[3], GRID_SIZE);
    let center_lon = STORM_START_LON + f64::from(step) * STORM_DRIFT_PER_STEP;

    let mut blob = Vec::with_capacity(GRID_SIZE * GRID_SIZE);
    for lat in &lats {
        for lon in &lons {
            let d2 = (lon - center_lon).powi(2) + (lat - STORM_LAT).powi(2);
            blob.push((-d2 / STORM_SPREAD).exp() as f32);
        }
    }
    blob
}

/// Rain added during `step`, in inches. Nothing falls before the first step.
fn step_precip<R: Rng + ?Sized>(step: u32, rng: &mut R) -> f32 {
    if step == 0 {
        0.0
    } else {
        0.02 + rng.r#gen::<f32>() * 0.06
    }
}

/// Frames for every variable at steps `0..=steps`.
pub fn generate<R: Rng + ?Sized>(
    extent: [f64; 4],
    steps: u32,
    step_hours: u32,
    rng: &mut R,
) -> Vec<Frame> {
    let mut frames = Vec::with_capacity((steps as usize + 1) * Variable::ALL.len());
    for step in 0..=steps {
        let blob = storm_blob(extent, step);
        let precip = step_precip(step, rng);

        for variable in Variable::ALL {
            let values = blob
                .iter()
                .map(|&b| match variable {
                    Variable::Radar => b * 60.0,
                    Variable::Precipitation => b * precip,
                    Variable::Temperature | Variable::Wind => b * 20.0 + 50.0,
                })
                .collect();
            frames.push(Frame {
                variable,
                hour: step * step_hours,
                rows: GRID_SIZE,
                cols: GRID_SIZE,
                values,
            });
        }
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const EXTENT: [f64; 4] = [-89.0, -75.0, 33.0, 40.0];

    #[test]
    fn generates_every_variable_per_step() {
        let mut rng = StdRng::seed_from_u64(7);
        let frames = generate(EXTENT, 12, 3, &mut rng);
        assert_eq!(frames.len(), 13 * 4);
        assert_eq!(frames.last().unwrap().hour, 36);
        assert!(frames.iter().all(|f| f.values.len() == GRID_SIZE * GRID_SIZE));
    }

    #[test]
    fn no_rain_at_initial_step() {
        let mut rng = StdRng::seed_from_u64(1);
        let frames = generate(EXTENT, 2, 3, &mut rng);
        let initial = frames
            .iter()
            .find(|f| f.variable == Variable::Precipitation && f.hour == 0)
            .unwrap();
        assert_eq!(initial.stats().max, 0.0);
    }

    #[test]
    fn step_rain_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for step in 1..50 {
            let p = step_precip(step, &mut rng);
            assert!((0.02..=0.08).contains(&p), "{p} out of range");
        }
    }

    #[test]
    fn radar_peaks_near_storm_center() {
        let mut rng = StdRng::seed_from_u64(3);
        let frames = generate(EXTENT, 0, 3, &mut rng);
        let radar = frames.iter().find(|f| f.variable == Variable::Radar).unwrap();
        let stats = radar.stats();
        assert!(stats.max > 55.0 && stats.max <= 60.0);
        assert!(stats.min >= 0.0);
    }

    #[test]
    fn storm_drifts_east() {
        let peak_col = |step| {
            let blob = storm_blob(EXTENT, step);
            let (idx, _) = blob
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .unwrap();
            idx % GRID_SIZE
        };
        assert!(peak_col(6) > peak_col(0));
    }

    #[test]
    fn linspace_includes_endpoints() {
        let v = linspace(0.0, 1.0, 5);
        assert_eq!(v, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }
}
