//! FAO-56 reference evapotranspiration
//!
//! Implements the daily Penman-Monteith procedure of FAO Irrigation and Drainage
//! Paper 56, applied sample by sample to sub-daily arrays that carry the day's
//! temperature extremes.
//!
//! # What This Estimator Does
//!
//! 1. Orders the temperature extremes so that $T_{max} \geq T_{min}$
//! 2. Derives vapour pressures, the psychrometric constant and the slope of the
//!    saturation curve
//! 3. Builds the radiation balance from orbital geometry, estimating incoming
//!    shortwave radiation with the Hargreaves relation unless it was measured
//! 4. Combines both terms into reference crop evapotranspiration $ET_o$ and
//!    open-water evaporation $E_0$
//!
//! Soil heat flux is assumed to be zero.
//!
//! # Open-water Evaporation
//!
//! $E_0$ recomputes the net shortwave radiation with an albedo of 0.05 and drops
//! the surface resistance, but reuses the net longwave radiation and the
//! aerodynamic term of the crop calculation. This is a known simplification and
//! is kept as is.

use crate::config::CatchmentConstants;
use crate::errors::{FlowcastError, FlowcastResult};
use crate::forcing::PreparedForcing;
use crate::units::{FloatValue, KELVIN_OFFSET};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Albedo of the hypothetical grass reference crop.
pub const CROP_ALBEDO: FloatValue = 0.23;
/// Albedo of an open water surface.
pub const OPEN_WATER_ALBEDO: FloatValue = 0.05;
/// Wind speed assumed when none is supplied (m/s).
pub const DEFAULT_WIND_SPEED: FloatValue = 2.0;

/// Solar constant (MJ m⁻² min⁻¹).
const SOLAR_CONSTANT: FloatValue = 0.0820;
/// Stefan-Boltzmann constant (MJ K⁻⁴ m⁻² day⁻¹).
const STEFAN_BOLTZMANN: FloatValue = 4.903e-9;
/// Hargreaves radiation adjustment coefficient for interior locations (°C^-0.5).
const HARGREAVES_KRS: FloatValue = 0.16;
/// Latent heat of vaporisation (MJ/kg).
const LATENT_HEAT: FloatValue = 2.45;
/// Specific heat at constant pressure (MJ kg⁻¹ °C⁻¹).
const SPECIFIC_HEAT: FloatValue = 1.013e-3;
/// Ratio of molecular weights of water vapour and dry air.
const MOLECULAR_WEIGHT_RATIO: FloatValue = 0.622;

/// Saturation vapour pressure at `temp` °C (kPa), FAO-56 Eq. 11.
///
/// $$ e^\circ(T) = 0.6108 \exp\left(\frac{17.27 T}{T + 237.3}\right) $$
pub fn saturation_vapour_pressure(temp: FloatValue) -> FloatValue {
    0.6108 * ((17.27 * temp) / (temp + 237.3)).exp()
}

/// Slope of the saturation vapour pressure curve at `temp` °C (kPa/°C), Eq. 13.
pub fn saturation_slope(temp: FloatValue) -> FloatValue {
    4098.0 * saturation_vapour_pressure(temp) / (temp + 237.3).powi(2)
}

/// Atmospheric pressure at `altitude` m (kPa), Eq. 7.
pub fn atmospheric_pressure(altitude: FloatValue) -> FloatValue {
    101.3 * ((293.0 - 0.0065 * altitude) / 293.0).powf(5.26)
}

/// Psychrometric constant for a pressure in kPa (kPa/°C), Eq. 8.
pub fn psychrometric_constant(pressure: FloatValue) -> FloatValue {
    SPECIFIC_HEAT * pressure / (MOLECULAR_WEIGHT_RATIO * LATENT_HEAT)
}

/// Extraterrestrial radiation (MJ m⁻² day⁻¹) from Eqs. 21-25.
///
/// `latitude` is in radians and `day_of_year` may be fractional. The sunset hour
/// angle is clamped so that polar day and night give finite values.
pub fn extraterrestrial_radiation(latitude: FloatValue, day_of_year: FloatValue) -> FloatValue {
    let angle = 2.0 * PI / 365.0 * day_of_year;
    let inverse_distance = 1.0 + 0.033 * angle.cos();
    let declination = 0.409 * (angle - 1.39).sin();
    let sunset_angle = (-latitude.tan() * declination.tan())
        .clamp(-1.0, 1.0)
        .acos();

    (24.0 * 60.0 / PI)
        * SOLAR_CONSTANT
        * inverse_distance
        * (sunset_angle * latitude.sin() * declination.sin()
            + latitude.cos() * declination.cos() * sunset_angle.sin())
}

/// Day of the year of a UTC timestamp, 1 on the 1st of January.
pub fn day_of_year(date: &DateTime<Utc>) -> FloatValue {
    date.ordinal() as FloatValue
}

/// Inputs of one evapotranspiration run.
///
/// Optional series fall back to documented defaults when `None`:
/// - `temp_mean`: mean of the daily extremes
/// - `wind_speed_2m`: [`DEFAULT_WIND_SPEED`]
/// - `relative_humidity`: actual vapour pressure at a dew point equal to $T_{min}$
/// - `solar_radiation`: Hargreaves estimate from the temperature range
#[derive(Debug, Clone, Copy)]
pub struct EvapotranspirationInputs<'a> {
    /// Timestep (days)
    pub timestep_days: FloatValue,
    /// Time of the first sample
    pub start: DateTime<Utc>,
    /// Daily minimum temperature per sample (°C)
    pub temp_min: &'a [FloatValue],
    /// Daily maximum temperature per sample (°C)
    pub temp_max: &'a [FloatValue],
    /// Mean temperature (°C)
    pub temp_mean: Option<&'a [FloatValue]>,
    /// Wind speed at 2 m (m/s)
    pub wind_speed_2m: Option<&'a [FloatValue]>,
    /// Relative humidity (%)
    pub relative_humidity: Option<&'a [FloatValue]>,
    /// Measured solar radiation (MJ m⁻² day⁻¹)
    pub solar_radiation: Option<&'a [FloatValue]>,
}

impl<'a> EvapotranspirationInputs<'a> {
    /// Inputs with every optional series supplied by preprocessed forcing.
    pub fn from_forcing(
        forcing: &'a PreparedForcing,
        timestep_days: FloatValue,
        start: DateTime<Utc>,
    ) -> Self {
        Self {
            timestep_days,
            start,
            temp_min: &forcing.temp_min_daily,
            temp_max: &forcing.temp_max_daily,
            temp_mean: Some(&forcing.temp_mean),
            wind_speed_2m: Some(&forcing.wind_speed_2m),
            relative_humidity: Some(&forcing.relative_humidity),
            solar_radiation: forcing.solar_radiation.as_deref(),
        }
    }

    fn validate(&self) -> FlowcastResult<usize> {
        let n = self.temp_min.len();
        let optional = [
            ("temp_max", Some(self.temp_max)),
            ("temp_mean", self.temp_mean),
            ("wind_speed_2m", self.wind_speed_2m),
            ("relative_humidity", self.relative_humidity),
            ("solar_radiation", self.solar_radiation),
        ];
        for (name, series) in optional {
            if let Some(series) = series {
                if series.len() != n {
                    return Err(FlowcastError::ShapeMismatch(format!(
                        "{} has {} samples but temp_min has {}",
                        name,
                        series.len(),
                        n
                    )));
                }
            }
        }
        Ok(n)
    }
}

/// Evapotranspiration demand per sample, both in mm/day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvapotranspirationSeries {
    /// Reference crop evapotranspiration $ET_o$
    pub reference: Vec<FloatValue>,
    /// Open-water evaporation $E_0$
    pub open_water: Vec<FloatValue>,
}

/// FAO-56 estimator for a site at fixed latitude and altitude.
#[derive(Debug, Clone)]
pub struct ReferenceEvapotranspiration {
    /// Latitude (radians)
    latitude: FloatValue,
    /// Altitude (m)
    altitude: FloatValue,
}

impl ReferenceEvapotranspiration {
    /// `latitude` in degrees, `altitude` in m.
    pub fn new(latitude: FloatValue, altitude: FloatValue) -> Self {
        Self {
            latitude: latitude.to_radians(),
            altitude,
        }
    }

    pub fn from_catchment(catchment: &CatchmentConstants) -> Self {
        Self::new(catchment.latitude, catchment.altitude)
    }

    pub fn estimate(
        &self,
        inputs: &EvapotranspirationInputs,
    ) -> FlowcastResult<EvapotranspirationSeries> {
        let n = inputs.validate()?;

        let pressure = atmospheric_pressure(self.altitude);
        let gamma = psychrometric_constant(pressure);
        let clear_sky_factor = 0.75 + 2e-5 * self.altitude;
        let first_day = day_of_year(&inputs.start);

        let mut reference = Vec::with_capacity(n);
        let mut open_water = Vec::with_capacity(n);

        for i in 0..n {
            let (t_min, t_max) = {
                let (a, b) = (inputs.temp_min[i], inputs.temp_max[i]);
                (a.min(b), a.max(b))
            };
            let t_mean = inputs.temp_mean.map_or((t_min + t_max) / 2.0, |t| t[i]);
            let u2 = inputs.wind_speed_2m.map_or(DEFAULT_WIND_SPEED, |u| u[i]);

            let slope = saturation_slope(t_mean);

            // Mean saturation vapour pressure over the day, Eq. 12
            let es = (saturation_vapour_pressure(t_max) + saturation_vapour_pressure(t_min)) / 2.0;
            let ea = match inputs.relative_humidity {
                Some(rh) => rh[i] / 100.0 * es,
                None => saturation_vapour_pressure(t_min),
            };

            let doy = first_day + i as FloatValue * inputs.timestep_days;
            let ra = extraterrestrial_radiation(self.latitude, doy);
            let rs = match inputs.solar_radiation {
                Some(measured) => measured[i],
                None => HARGREAVES_KRS * (t_max - t_min).sqrt() * ra,
            };
            let rso = clear_sky_factor * ra;
            let relative_shortwave = if rso > 0.0 { (rs / rso).min(1.0) } else { 1.0 };

            // Net longwave radiation, Eq. 39
            let sigma_t4 = STEFAN_BOLTZMANN
                * ((t_max + KELVIN_OFFSET).powi(4) + (t_min + KELVIN_OFFSET).powi(4))
                / 2.0;
            let rnl = sigma_t4 * (0.34 - 0.14 * ea.sqrt()) * (1.35 * relative_shortwave - 0.35);

            let aerodynamic = gamma * 900.0 / (t_mean + 273.0) * u2 * (es - ea);

            let rn = (1.0 - CROP_ALBEDO) * rs - rnl;
            reference.push(
                (0.408 * slope * rn + aerodynamic) / (slope + gamma * (1.0 + 0.34 * u2)),
            );

            let rn_water = (1.0 - OPEN_WATER_ALBEDO) * rs - rnl;
            open_water.push((0.408 * slope * rn_water + aerodynamic) / (slope + gamma));
        }

        Ok(EvapotranspirationSeries {
            reference,
            open_water,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_saturation_vapour_pressure() {
        // FAO-56 Example 3
        let es = (saturation_vapour_pressure(24.5) + saturation_vapour_pressure(15.0)) / 2.0;
        assert!((es - 2.39).abs() < 0.01, "es = {}", es);
        assert!((saturation_vapour_pressure(24.5) - 3.075).abs() < 0.001);
    }

    #[test]
    fn test_saturation_slope() {
        // FAO-56 Annex 2, Table 2.4
        assert!((saturation_slope(20.0) - 0.145).abs() < 0.001);
        assert!((saturation_slope(30.0) - 0.243).abs() < 0.001);
    }

    #[test]
    fn test_pressure_and_psychrometric_constant() {
        // FAO-56 Example 2: 1800 m
        let p = atmospheric_pressure(1800.0);
        assert!((p - 81.8).abs() < 0.1, "P = {}", p);
        assert!((psychrometric_constant(p) - 0.054).abs() < 0.001);
        assert!((atmospheric_pressure(0.0) - 101.3).abs() < 1e-10);
    }

    #[test]
    fn test_extraterrestrial_radiation() {
        // FAO-56 Example 8: 20°S on 3 September
        let ra = extraterrestrial_radiation((-20.0_f64).to_radians(), 246.0);
        assert!((ra - 32.2).abs() < 0.1, "Ra = {}", ra);
    }

    #[test]
    fn test_polar_night_is_finite() {
        let ra = extraterrestrial_radiation(80.0_f64.to_radians(), 355.0);
        assert!(ra.is_finite());
        assert!(ra.abs() < 1e-9);
    }

    #[test]
    fn test_day_of_year() {
        assert_eq!(day_of_year(&Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()), 1.0);
        assert_eq!(day_of_year(&start()), 60.0);
        // Time of day is ignored
        assert_eq!(day_of_year(&Utc.with_ymd_and_hms(2022, 3, 1, 18, 0, 0).unwrap()), 60.0);
    }

    fn tropical_inputs<'a>(
        temp_min: &'a [FloatValue],
        temp_max: &'a [FloatValue],
        rh: &'a [FloatValue],
    ) -> EvapotranspirationInputs<'a> {
        EvapotranspirationInputs {
            timestep_days: 0.25,
            start: start(),
            temp_min,
            temp_max,
            temp_mean: None,
            wind_speed_2m: None,
            relative_humidity: Some(rh),
            solar_radiation: None,
        }
    }

    #[test]
    fn test_tropical_demand_is_plausible() {
        let estimator = ReferenceEvapotranspiration::new(-7.125, 1157.0);
        let t_min = [17.0; 8];
        let t_max = [28.0; 8];
        let rh = [75.0; 8];
        let et = estimator
            .estimate(&tropical_inputs(&t_min, &t_max, &rh))
            .unwrap();

        assert_eq!(et.reference.len(), 8);
        for (eto, e0) in et.reference.iter().zip(&et.open_water) {
            assert!(*eto > 2.0 && *eto < 8.0, "ETo = {}", eto);
            // More absorbed radiation and no surface resistance
            assert!(e0 > eto, "E0 = {} should exceed ETo = {}", e0, eto);
        }
    }

    #[test]
    fn test_swapped_extremes_give_same_result() {
        let estimator = ReferenceEvapotranspiration::new(-7.125, 1157.0);
        let low = [17.0; 4];
        let high = [28.0; 4];
        let rh = [75.0; 4];

        let ordered = estimator.estimate(&tropical_inputs(&low, &high, &rh)).unwrap();
        let swapped = estimator.estimate(&tropical_inputs(&high, &low, &rh)).unwrap();
        assert_eq!(ordered, swapped);
    }

    #[test]
    fn test_measured_radiation_replaces_hargreaves() {
        let estimator = ReferenceEvapotranspiration::new(-7.125, 1157.0);
        let t_min = [17.0; 4];
        let t_max = [28.0; 4];
        let rh = [75.0; 4];
        let dull = [5.0; 4];
        let bright = [25.0; 4];

        let mut inputs = tropical_inputs(&t_min, &t_max, &rh);
        inputs.solar_radiation = Some(&dull);
        let low = estimator.estimate(&inputs).unwrap();
        inputs.solar_radiation = Some(&bright);
        let high = estimator.estimate(&inputs).unwrap();

        assert!(high.reference[0] > low.reference[0]);
    }

    #[test]
    fn test_missing_humidity_uses_dew_point_at_minimum() {
        let estimator = ReferenceEvapotranspiration::new(-7.125, 1157.0);
        let t_min = [17.0; 4];
        let t_max = [28.0; 4];
        // RH that reproduces ea = e°(Tmin)
        let es = (saturation_vapour_pressure(28.0) + saturation_vapour_pressure(17.0)) / 2.0;
        let rh = [100.0 * saturation_vapour_pressure(17.0) / es; 4];

        let with_rh = estimator.estimate(&tropical_inputs(&t_min, &t_max, &rh)).unwrap();
        let mut inputs = tropical_inputs(&t_min, &t_max, &rh);
        inputs.relative_humidity = None;
        let without_rh = estimator.estimate(&inputs).unwrap();

        for (a, b) in with_rh.reference.iter().zip(&without_rh.reference) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_length_mismatch() {
        let estimator = ReferenceEvapotranspiration::new(0.0, 0.0);
        let t_min = [17.0; 4];
        let t_max = [28.0; 3];
        let rh = [75.0; 4];
        let result = estimator.estimate(&tropical_inputs(&t_min, &t_max, &rh));
        assert!(matches!(result, Err(FlowcastError::ShapeMismatch(_))));
    }
}
