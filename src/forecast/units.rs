//! Conversions from model (SI) units to dashboard units.

const METERS_TO_INCHES: f32 = 39.3701;
const MPS_TO_MPH: f32 = 2.236_94;

pub fn kelvin_to_fahrenheit(k: f32) -> f32 {
    (k - 273.15) * 9.0 / 5.0 + 32.0
}

pub fn meters_to_inches(m: f32) -> f32 {
    m * METERS_TO_INCHES
}

pub fn mps_to_mph(mps: f32) -> f32 {
    mps * MPS_TO_MPH
}

/// Rounds to two decimals, as shown on the dashboard.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn temperature() {
        assert!(close(kelvin_to_fahrenheit(273.15), 32.0));
        assert!(close(kelvin_to_fahrenheit(373.15), 212.0));
    }

    #[test]
    fn precipitation() {
        assert!(close(meters_to_inches(0.0254), 1.0));
    }

    #[test]
    fn wind() {
        assert!(close(mps_to_mph(10.0), 22.3694));
    }

    #[test]
    fn rounding() {
        assert_eq!(round2(0.126), 0.13);
        assert_eq!(round2(1.0), 1.0);
    }
}
