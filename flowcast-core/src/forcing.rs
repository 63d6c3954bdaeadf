//! Weather forcing and its conversion to model inputs
//!
//! A [`ForcingSeries`] holds the raw per-sample weather records exactly as a
//! forecast or observation provider delivers them. [`ForcingPreprocessor`]
//! turns those into the quantities the water balance needs:
//!
//! 1. Temperatures in °C, with the daily minimum/maximum of each day broadcast
//!    back to every sample of that day
//! 2. Wind speed at 2 m from the measured components via the logarithmic wind profile
//! 3. Rainfall as a rate in mm/day

use crate::config::ForcingSettings;
use crate::errors::{FlowcastError, FlowcastResult};
use crate::units::{amount_to_rate, kelvin_to_celsius, FloatValue};
use serde::{Deserialize, Serialize};

/// Height of the FAO-56 wind speed reference (m).
const REFERENCE_WIND_HEIGHT: FloatValue = 2.0;

/// One weather sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForcingRecord {
    /// Relative humidity (%)
    pub relative_humidity: FloatValue,
    /// Maximum temperature over the sample (K)
    pub temp_max: FloatValue,
    /// Minimum temperature over the sample (K)
    pub temp_min: FloatValue,
    /// Eastward wind component at sensor height (m/s)
    pub wind_u: FloatValue,
    /// Northward wind component at sensor height (m/s)
    pub wind_v: FloatValue,
    /// Precipitation accumulated over the sample (mm)
    pub precipitation: FloatValue,
    /// Measured incoming solar radiation (MJ m⁻² day⁻¹), if the source provides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solar_radiation: Option<FloatValue>,
}

impl ForcingRecord {
    /// The first field holding NaN or an infinity, by name.
    pub fn non_finite_field(&self) -> Option<(&'static str, FloatValue)> {
        let values = [
            self.relative_humidity,
            self.temp_max,
            self.temp_min,
            self.wind_u,
            self.wind_v,
            self.precipitation,
        ];
        ForcingSeries::FIELDS
            .into_iter()
            .zip(values)
            .chain(
                self.solar_radiation
                    .map(|value| (ForcingSeries::SOLAR_RADIATION_FIELD, value)),
            )
            .find(|(_, value)| !value.is_finite())
    }
}

/// Ordered, immutable sequence of weather samples at a fixed timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForcingSeries {
    records: Vec<ForcingRecord>,
}

impl ForcingSeries {
    pub const FIELDS: [&'static str; 6] = [
        "relative_humidity",
        "temp_max",
        "temp_min",
        "wind_u",
        "wind_v",
        "precipitation",
    ];

    pub const SOLAR_RADIATION_FIELD: &'static str = "solar_radiation";

    pub fn new(records: Vec<ForcingRecord>) -> Self {
        Self { records }
    }

    /// Build a series from a table whose columns are identified by name.
    ///
    /// Column order is irrelevant and unknown columns are ignored. A missing
    /// required column fails with [`FlowcastError::MissingField`] rather than
    /// reading some other variable in its place.
    pub fn from_columns<S: AsRef<str>>(
        names: &[S],
        rows: &[Vec<FloatValue>],
    ) -> FlowcastResult<Self> {
        let position = |field: &str| names.iter().position(|n| n.as_ref().trim() == field);

        let mut index = [0usize; 6];
        for (slot, field) in index.iter_mut().zip(Self::FIELDS) {
            *slot = position(field).ok_or_else(|| FlowcastError::MissingField(field.to_string()))?;
        }
        let solar = position(Self::SOLAR_RADIATION_FIELD);

        let records = rows
            .iter()
            .enumerate()
            .map(|(row_number, row)| {
                let cell = |col: usize| {
                    row.get(col).copied().ok_or_else(|| {
                        FlowcastError::ShapeMismatch(format!(
                            "forcing row {} has {} values, expected at least {}",
                            row_number,
                            row.len(),
                            col + 1
                        ))
                    })
                };
                Ok(ForcingRecord {
                    relative_humidity: cell(index[0])?,
                    temp_max: cell(index[1])?,
                    temp_min: cell(index[2])?,
                    wind_u: cell(index[3])?,
                    wind_v: cell(index[4])?,
                    precipitation: cell(index[5])?,
                    solar_radiation: solar.map(cell).transpose()?,
                })
            })
            .collect::<FlowcastResult<Vec<_>>>()?;

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ForcingRecord] {
        &self.records
    }

    /// Join two series end to end.
    pub fn concat(&self, other: &ForcingSeries) -> ForcingSeries {
        let mut records = self.records.clone();
        records.extend_from_slice(&other.records);
        Self { records }
    }

    /// Measured solar radiation for every sample, or `None` when no sample carries it.
    ///
    /// A column present on only some samples is rejected.
    pub fn solar_radiation(&self) -> FlowcastResult<Option<Vec<FloatValue>>> {
        let present = self
            .records
            .iter()
            .filter(|r| r.solar_radiation.is_some())
            .count();
        if present == 0 {
            return Ok(None);
        }
        if present != self.records.len() {
            return Err(FlowcastError::MissingField(format!(
                "{} ({} of {} samples)",
                Self::SOLAR_RADIATION_FIELD,
                present,
                self.records.len()
            )));
        }
        Ok(Some(
            self.records
                .iter()
                .filter_map(|r| r.solar_radiation)
                .collect(),
        ))
    }
}

impl FromIterator<ForcingRecord> for ForcingSeries {
    fn from_iter<I: IntoIterator<Item = ForcingRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Model-ready forcing, one value per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedForcing {
    /// Mean of the sample's min/max temperature (°C)
    pub temp_mean: Vec<FloatValue>,
    /// Minimum temperature of the sample's day (°C)
    pub temp_min_daily: Vec<FloatValue>,
    /// Maximum temperature of the sample's day (°C)
    pub temp_max_daily: Vec<FloatValue>,
    /// Wind speed at 2 m (m/s)
    pub wind_speed_2m: Vec<FloatValue>,
    /// Relative humidity (%)
    pub relative_humidity: Vec<FloatValue>,
    /// Rainfall rate (mm/day)
    pub rainfall_rate: Vec<FloatValue>,
    /// Measured solar radiation (MJ m⁻² day⁻¹)
    pub solar_radiation: Option<Vec<FloatValue>>,
}

impl PreparedForcing {
    pub fn len(&self) -> usize {
        self.rainfall_rate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rainfall_rate.is_empty()
    }
}

/// Converts raw weather samples into model inputs.
#[derive(Debug, Clone)]
pub struct ForcingPreprocessor {
    samples_per_day: usize,
    timestep_days: FloatValue,
    settings: ForcingSettings,
}

impl ForcingPreprocessor {
    pub fn new(samples_per_day: usize, timestep_days: FloatValue, settings: ForcingSettings) -> Self {
        Self {
            samples_per_day,
            timestep_days,
            settings,
        }
    }

    /// Scale factor from sensor height to 2 m under a neutral log wind profile.
    ///
    /// $$ u_2 = u_z \frac{\ln(2 / z_0)}{\ln(z / z_0)} $$
    pub fn wind_height_factor(&self) -> FloatValue {
        let z0 = self.settings.surface_roughness;
        (REFERENCE_WIND_HEIGHT / z0).ln() / (self.settings.wind_sensor_height / z0).ln()
    }

    pub fn prepare(&self, series: &ForcingSeries) -> FlowcastResult<PreparedForcing> {
        let n = series.len();
        if n == 0 {
            return Err(FlowcastError::ShapeMismatch(
                "forcing series is empty".to_string(),
            ));
        }
        if self.samples_per_day == 0 || n % self.samples_per_day != 0 {
            return Err(FlowcastError::ShapeMismatch(format!(
                "forcing length {} is not a whole number of days at {} samples per day",
                n, self.samples_per_day
            )));
        }

        let records = series.records();
        for (sample, record) in records.iter().enumerate() {
            if let Some((field, value)) = record.non_finite_field() {
                return Err(FlowcastError::InvalidForcing {
                    sample,
                    field,
                    value,
                });
            }
        }

        let temp_max: Vec<FloatValue> = records.iter().map(|r| kelvin_to_celsius(r.temp_max)).collect();
        let temp_min: Vec<FloatValue> = records.iter().map(|r| kelvin_to_celsius(r.temp_min)).collect();

        let temp_mean = temp_min
            .iter()
            .zip(&temp_max)
            .map(|(lo, hi)| (lo + hi) / 2.0)
            .collect();

        let temp_min_daily = broadcast_daily(&temp_min, self.samples_per_day, FloatValue::min);
        let temp_max_daily = broadcast_daily(&temp_max, self.samples_per_day, FloatValue::max);

        let factor = self.wind_height_factor();
        let wind_speed_2m = records
            .iter()
            .map(|r| r.wind_u.hypot(r.wind_v) * factor)
            .collect();

        let rainfall_rate = records
            .iter()
            .map(|r| amount_to_rate(r.precipitation, self.timestep_days))
            .collect();

        Ok(PreparedForcing {
            temp_mean,
            temp_min_daily,
            temp_max_daily,
            wind_speed_2m,
            relative_humidity: records.iter().map(|r| r.relative_humidity).collect(),
            rainfall_rate,
            solar_radiation: series.solar_radiation()?,
        })
    }
}

/// Reduce each day's samples with `fold` and repeat the result for every sample of the day.
fn broadcast_daily(
    values: &[FloatValue],
    samples_per_day: usize,
    fold: fn(FloatValue, FloatValue) -> FloatValue,
) -> Vec<FloatValue> {
    values
        .chunks(samples_per_day)
        .flat_map(|day| {
            let extreme = day.iter().copied().reduce(fold).unwrap_or(FloatValue::NAN);
            std::iter::repeat(extreme).take(day.len())
        })
        .collect()
}
