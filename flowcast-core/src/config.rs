//! Simulation configuration
//!
//! Everything that is fixed for a physical catchment or a model deployment lives
//! here and is handed to [`CatchmentFlowSession`](crate::session::CatchmentFlowSession)
//! explicitly. There is no process-wide state.
//!
//! # Default Values
//!
//! Defaults describe the reference deployment: the Majalaya catchment driven by
//! four forecast samples per day.
//!
//! ```toml
//! model_version = "pdm-fao56"
//! timestep_days = 0.25
//! samples_per_day = 4
//!
//! [catchment]
//! name = "Majalaya"
//! latitude = -7.125
//! altitude = 1157.0
//! area_km2 = 212.264
//!
//! [model]
//! pareto_exponent = 0.1
//! ```

use crate::errors::{FlowcastError, FlowcastResult};
use crate::units::FloatValue;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Physical constants of a catchment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatchmentConstants {
    pub name: String,
    /// Mean latitude (degrees, negative in the southern hemisphere).
    /// Default: -7.125
    pub latitude: FloatValue,
    /// Mean altitude (m above sea level).
    /// Default: 1157.0
    pub altitude: FloatValue,
    /// Catchment area (km²).
    /// Default: 212.264
    pub area_km2: FloatValue,
}

impl Default for CatchmentConstants {
    fn default() -> Self {
        Self {
            name: "Majalaya".to_string(),
            latitude: -7.125,
            altitude: 1157.0,
            area_km2: 212.264,
        }
    }
}

/// Structural constants of the rainfall-runoff model, shared by every ensemble member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Exponent of the Pareto distribution of soil storage capacity.
    /// Default: 0.1
    pub pareto_exponent: FloatValue,
    /// Exponent `b` of the fast store rating $q = a v^b$. At least 1; exactly 1
    /// makes the fast store linear with residence time `qmax` days.
    /// Default: 5/3
    pub fast_store_exponent: FloatValue,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            pareto_exponent: 0.1,
            fast_store_exponent: 5.0 / 3.0,
        }
    }
}

/// How raw wind measurements are brought to the 2 m reference height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForcingSettings {
    /// Height of the wind measurement (m).
    /// Default: 10.0
    pub wind_sensor_height: FloatValue,
    /// Surface roughness length (m), equivalent to the FAO-56 reference crop.
    /// Default: 0.006247
    pub surface_roughness: FloatValue,
}

impl Default for ForcingSettings {
    fn default() -> Self {
        Self {
            wind_sensor_height: 10.0,
            surface_roughness: 0.006247,
        }
    }
}

/// Complete configuration of a forecast session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Free-form label carried into every output.
    pub model_version: String,
    /// Length of one timestep (days).
    /// Default: 0.25
    pub timestep_days: FloatValue,
    /// Number of forcing samples per day.
    /// Default: 4
    pub samples_per_day: usize,
    pub catchment: CatchmentConstants,
    pub model: ModelSettings,
    pub forcing: ForcingSettings,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            model_version: "pdm-fao56".to_string(),
            timestep_days: 0.25,
            samples_per_day: 4,
            catchment: CatchmentConstants::default(),
            model: ModelSettings::default(),
            forcing: ForcingSettings::default(),
        }
    }
}

fn require_positive(name: &str, value: FloatValue) -> FlowcastResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FlowcastError::InvalidConfig(format!(
            "`{}` must be positive and finite, got {}",
            name, value
        )))
    }
}

impl SimulationConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> FlowcastResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| FlowcastError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> FlowcastResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            FlowcastError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> FlowcastResult<String> {
        toml::to_string(self).map_err(|e| FlowcastError::InvalidConfig(e.to_string()))
    }

    /// Check the configuration is physically meaningful.
    ///
    /// The timestep must tile a day exactly with `samples_per_day` samples, since
    /// daily temperature extremes are aggregated over that many samples.
    pub fn validate(&self) -> FlowcastResult<()> {
        require_positive("timestep_days", self.timestep_days)?;
        if self.samples_per_day == 0 {
            return Err(FlowcastError::InvalidConfig(
                "`samples_per_day` must be at least 1".to_string(),
            ));
        }
        let day = self.timestep_days * self.samples_per_day as FloatValue;
        if (day - 1.0).abs() > 1e-9 {
            return Err(FlowcastError::InvalidConfig(format!(
                "{} samples of {} days do not make up one day",
                self.samples_per_day, self.timestep_days
            )));
        }
        require_positive("catchment.area_km2", self.catchment.area_km2)?;
        if !self.catchment.latitude.is_finite() || self.catchment.latitude.abs() > 90.0 {
            return Err(FlowcastError::InvalidConfig(format!(
                "`catchment.latitude` must lie in [-90, 90], got {}",
                self.catchment.latitude
            )));
        }
        if !self.catchment.altitude.is_finite() {
            return Err(FlowcastError::InvalidConfig(
                "`catchment.altitude` must be finite".to_string(),
            ));
        }
        require_positive("model.pareto_exponent", self.model.pareto_exponent)?;
        // Below 1 the stability limit is a floor rather than a ceiling
        if !(self.model.fast_store_exponent.is_finite() && self.model.fast_store_exponent >= 1.0) {
            return Err(FlowcastError::InvalidConfig(format!(
                "`model.fast_store_exponent` must be at least 1, got {}",
                self.model.fast_store_exponent
            )));
        }
        require_positive("forcing.wind_sensor_height", self.forcing.wind_sensor_height)?;
        require_positive("forcing.surface_roughness", self.forcing.surface_roughness)?;
        Ok(())
    }
}
