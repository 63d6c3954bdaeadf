//! Scalar type and unit conversions shared across the engine.
//!
//! Forcing arrives in SI-ish units (K, m/s, mm per sample) while the water
//! balance is carried in mm/day and reported in m³/s.

pub type FloatValue = f64;

/// Seconds in one day.
pub const SECONDS_PER_DAY: FloatValue = 86_400.0;

/// Offset between kelvin and degrees Celsius.
pub const KELVIN_OFFSET: FloatValue = 273.15;

/// Square metres per km² divided by mm per m.
const MM_KM2_TO_M3: FloatValue = 1_000.0;

pub fn kelvin_to_celsius(kelvin: FloatValue) -> FloatValue {
    kelvin - KELVIN_OFFSET
}

/// Convert a catchment-averaged rate in mm/day to a discharge in m³/s.
///
/// $$ Q = q \cdot A \cdot 10^3 / 86400 $$
pub fn mm_per_day_to_m3_per_s(rate: FloatValue, area_km2: FloatValue) -> FloatValue {
    rate * area_km2 * MM_KM2_TO_M3 / SECONDS_PER_DAY
}

/// Convert an amount accumulated over one timestep (mm) to a rate (mm/day).
pub fn amount_to_rate(amount: FloatValue, timestep_days: FloatValue) -> FloatValue {
    amount / timestep_days
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kelvin_to_celsius() {
        assert!((kelvin_to_celsius(273.15) - 0.0).abs() < 1e-12);
        assert!((kelvin_to_celsius(300.0) - 26.85).abs() < 1e-10);
    }

    #[test]
    fn test_one_mm_per_day_over_86_4_km2_is_one_cumec() {
        let q = mm_per_day_to_m3_per_s(1.0, 86.4);
        assert!((q - 1.0).abs() < 1e-12, "got {}", q);
    }

    #[test]
    fn test_amount_to_rate() {
        // 2 mm in a six-hour step is 8 mm/day
        assert!((amount_to_rate(2.0, 0.25) - 8.0).abs() < 1e-12);
    }
}
