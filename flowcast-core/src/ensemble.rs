//! Ensemble flow simulation
//!
//! Runs the soil store and both routing stores for every parameter set of the
//! calibration ensemble against shared rainfall and evapotranspiration series.
//!
//! For each member:
//!
//! 1. The PDM store turns rainfall and potential ET into runoff and drainage
//! 2. Drainage is routed through the linear slow store ($T_r$)
//! 3. Runoff is routed through the non-linear fast store ($q_{max}$)
//! 4. Slow and fast outflow are summed and converted to m³/s
//!
//! Members share nothing but the read-only forcing, so they are simulated in
//! parallel. Column `j` of the flow matrix always belongs to parameter row `j`.

use crate::config::ModelSettings;
use crate::errors::{FlowcastError, FlowcastResult};
use crate::parameters::{ParameterSet, ParameterTable};
use crate::pdm::{PdmOutput, SoilMoistureStore};
use crate::routing::{RoutingOutput, RoutingStore};
use crate::state::{InitialState, StateTable};
use crate::units::{mm_per_day_to_m3_per_s, FloatValue};
use log::{debug, warn};
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;

/// Everything produced for one ensemble member.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRun {
    /// River flow (m³/s)
    pub flow: Vec<FloatValue>,
    pub soil: PdmOutput,
    pub slow: RoutingOutput,
    pub fast: RoutingOutput,
    /// State to start the next run from
    pub next_state: InitialState,
}

/// Flow ensemble and the states that continue it.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleRun {
    /// River flow (m³/s), one row per timestep and one column per member
    pub flow: Array2<FloatValue>,
    pub next_states: StateTable,
    /// Fast or slow store steps forced onto the stability ceiling, over all members
    pub clamped_steps: usize,
}

#[derive(Debug, Clone)]
pub struct EnsembleFlowSimulator {
    settings: ModelSettings,
    area_km2: FloatValue,
    dt: FloatValue,
}

impl EnsembleFlowSimulator {
    pub fn new(settings: ModelSettings, area_km2: FloatValue, dt: FloatValue) -> Self {
        Self {
            settings,
            area_km2,
            dt,
        }
    }

    /// Simulate a single member.
    ///
    /// Only the forcing lengths are checked here; see [`EnsembleFlowSimulator::simulate`]
    /// for full validation.
    pub fn simulate_member(
        &self,
        parameters: &ParameterSet,
        state: &InitialState,
        rainfall: &[FloatValue],
        pet: &[FloatValue],
    ) -> FlowcastResult<MemberRun> {
        let soil = SoilMoistureStore::new(parameters.smax, parameters.k, self.settings.pareto_exponent)
            .run(state.storage, rainfall, pet, self.dt)?;

        let slow = RoutingStore::linear(parameters.tr, self.dt).run(&soil.drainage, state.slow_flow);
        // An exponent of one makes the fast store linear as well
        let fast = RoutingStore::new(parameters.qmax, self.settings.fast_store_exponent, self.dt)
            .run(&soil.runoff, state.fast_flow);

        let flow = slow
            .outflow
            .iter()
            .zip(&fast.outflow)
            .map(|(qs, qf)| mm_per_day_to_m3_per_s(qs + qf, self.area_km2))
            .collect();

        let next_state = InitialState::new(
            soil.final_storage().unwrap_or(state.storage),
            slow.terminal_outflow,
            fast.terminal_outflow,
        );

        Ok(MemberRun {
            flow,
            soil,
            slow,
            fast,
            next_state,
        })
    }

    /// Simulate every member of the ensemble.
    ///
    /// All inputs are validated before any member runs; an invalid parameter or
    /// state anywhere in the tables fails the whole run.
    pub fn simulate(
        &self,
        rainfall: &[FloatValue],
        pet: &[FloatValue],
        parameters: &ParameterTable,
        states: &StateTable,
    ) -> FlowcastResult<EnsembleRun> {
        if rainfall.len() != pet.len() {
            return Err(FlowcastError::ShapeMismatch(format!(
                "rainfall has {} samples but potential ET has {}",
                rainfall.len(),
                pet.len()
            )));
        }
        if parameters.len() != states.len() {
            return Err(FlowcastError::ShapeMismatch(format!(
                "{} parameter sets but {} initial states",
                parameters.len(),
                states.len()
            )));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(FlowcastError::InvalidConfig(format!(
                "timestep must be positive, got {}",
                self.dt
            )));
        }
        parameters.validate_for_timestep(self.dt)?;
        states.validate()?;

        debug!(
            "Simulating {} ensemble members over {} timesteps",
            parameters.len(),
            rainfall.len()
        );

        let members = parameters
            .as_slice()
            .par_iter()
            .zip(states.as_slice().par_iter())
            .map(|(p, s)| self.simulate_member(p, s, rainfall, pet))
            .collect::<FlowcastResult<Vec<MemberRun>>>()?;

        let mut flow = Array2::zeros((rainfall.len(), members.len()));
        for (mut column, member) in flow.columns_mut().into_iter().zip(&members) {
            column.assign(&ArrayView1::from(member.flow.as_slice()));
        }

        let clamped_steps = members
            .iter()
            .map(|m| m.slow.clamped_steps + m.fast.clamped_steps)
            .sum();
        if clamped_steps > 0 {
            warn!(
                "Routing stores hit their stability ceiling on {} steps",
                clamped_steps
            );
        }

        Ok(EnsembleRun {
            flow,
            next_states: members.iter().map(|m| m.next_state).collect(),
            clamped_steps,
        })
    }
}
