//! Catchment forecast session
//!
//! [`CatchmentFlowSession::simulate`] is the single entry point of the engine:
//! one forcing ensemble member, the calibration ensemble and yesterday's states
//! in; a flow ensemble, diagnostic series and today's states out.
//!
//! A session holds only its configuration. Feeding `next_states` of one call into
//! the next call continues the simulation exactly as if the forcing had been
//! supplied in one piece, which is what daily rolling forecasts rely on.

use crate::config::SimulationConfig;
use crate::ensemble::EnsembleFlowSimulator;
use crate::errors::{FlowcastError, FlowcastResult};
use crate::evapotranspiration::{EvapotranspirationInputs, ReferenceEvapotranspiration};
use crate::forcing::{ForcingPreprocessor, ForcingSeries};
use crate::parameters::ParameterTable;
use crate::state::StateTable;
use crate::summary::EnsembleSummary;
use crate::units::{FloatValue, SECONDS_PER_DAY};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Parse a simulation start time.
///
/// Only RFC 3339 timestamps with an explicit offset are accepted, e.g.
/// `2022-03-01T00:00:00Z` or `2022-03-01T07:00:00+07:00`. They are normalised to
/// UTC. A naive timestamp is rejected since its day of year is ambiguous.
pub fn parse_start_date(value: &str) -> FlowcastResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| FlowcastError::UndefinedDate(format!("`{}` ({})", value, e)))
}

/// What kind of run produced a set of states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// A one-day forecast step
    Daily,
    /// A run over `days` of observations used to initialise the states
    SpinUp { days: u32 },
}

impl RunMode {
    /// The date the states returned by a run starting at `start` apply to.
    pub fn next_state_date(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            RunMode::Daily => start + Duration::days(1),
            RunMode::SpinUp { days } => start + Duration::days(i64::from(*days)),
        }
    }
}

/// Results of one session run.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutput {
    pub model_version: String,
    pub start: DateTime<Utc>,
    pub timestep_days: FloatValue,
    /// River flow (m³/s), rows = timesteps, columns = ensemble members
    pub flow: Array2<FloatValue>,
    /// Rainfall (mm/day)
    pub rainfall: Vec<FloatValue>,
    /// Reference crop evapotranspiration (mm/day)
    pub potential_et: Vec<FloatValue>,
    /// Open-water evaporation (mm/day)
    pub open_water_evaporation: Vec<FloatValue>,
    /// States to pass to the next run
    pub next_states: StateTable,
}

impl SessionOutput {
    /// Number of timesteps.
    pub fn len(&self) -> usize {
        self.flow.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.flow.nrows() == 0
    }

    pub fn n_members(&self) -> usize {
        self.flow.ncols()
    }

    /// Time of each output row.
    pub fn forecast_times(&self) -> Vec<DateTime<Utc>> {
        let step_ms = self.timestep_days * SECONDS_PER_DAY * 1000.0;
        (0..self.len())
            .map(|i| self.start + Duration::milliseconds((i as FloatValue * step_ms).round() as i64))
            .collect()
    }

    pub fn summary(&self) -> EnsembleSummary {
        EnsembleSummary::from_flow(&self.flow)
    }
}

#[derive(Debug, Clone)]
pub struct CatchmentFlowSession {
    config: SimulationConfig,
}

impl CatchmentFlowSession {
    pub fn new(config: SimulationConfig) -> FlowcastResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run the whole chain for one forcing ensemble member.
    ///
    /// Shapes, parameters and states are all checked before anything is computed.
    pub fn simulate(
        &self,
        forcing: &ForcingSeries,
        initial_states: &StateTable,
        parameters: &ParameterTable,
        start: DateTime<Utc>,
    ) -> FlowcastResult<SessionOutput> {
        let config = &self.config;
        if initial_states.len() != parameters.len() {
            return Err(FlowcastError::ShapeMismatch(format!(
                "{} parameter sets but {} initial states",
                parameters.len(),
                initial_states.len()
            )));
        }
        parameters.validate_for_timestep(config.timestep_days)?;
        initial_states.validate()?;

        let prepared = ForcingPreprocessor::new(
            config.samples_per_day,
            config.timestep_days,
            config.forcing.clone(),
        )
        .prepare(forcing)?;
        debug!(
            "Prepared {} forcing samples starting {} for {}",
            prepared.len(),
            start,
            config.catchment.name
        );

        let evapotranspiration = ReferenceEvapotranspiration::from_catchment(&config.catchment)
            .estimate(&EvapotranspirationInputs::from_forcing(
                &prepared,
                config.timestep_days,
                start,
            ))?;

        let run = EnsembleFlowSimulator::new(
            config.model.clone(),
            config.catchment.area_km2,
            config.timestep_days,
        )
        .simulate(
            &prepared.rainfall_rate,
            &evapotranspiration.reference,
            parameters,
            initial_states,
        )?;

        info!(
            "Simulated {} members x {} timesteps for {} ({})",
            run.flow.ncols(),
            run.flow.nrows(),
            config.catchment.name,
            config.model_version
        );

        Ok(SessionOutput {
            model_version: config.model_version.clone(),
            start,
            timestep_days: config.timestep_days,
            flow: run.flow,
            rainfall: prepared.rainfall_rate,
            potential_et: evapotranspiration.reference,
            open_water_evaporation: evapotranspiration.open_water,
            next_states: run.next_states,
        })
    }
}
