//! Carried model state
//!
//! The state of each ensemble member is handed back to the caller after every
//! run and fed into the next one. The engine never keeps it.

use crate::errors::{FlowcastError, FlowcastResult};
use crate::parameters::{ParameterSet, ParameterTable};
use crate::units::FloatValue;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Flow assumed in both routing stores on a cold start (mm/day).
const COLD_START_FLOW: FloatValue = 2.0;
/// Fraction of `Smax` assumed in the soil store on a cold start.
const COLD_START_STORAGE_FRACTION: FloatValue = 1.0 / 20.0;

/// State of one ensemble member between runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    /// Soil storage level (mm)
    pub storage: FloatValue,
    /// Slow store outflow (mm/day)
    pub slow_flow: FloatValue,
    /// Fast store outflow (mm/day)
    pub fast_flow: FloatValue,
}

impl InitialState {
    pub const N_COLUMNS: usize = 3;

    pub fn new(storage: FloatValue, slow_flow: FloatValue, fast_flow: FloatValue) -> Self {
        Self {
            storage,
            slow_flow,
            fast_flow,
        }
    }

    /// State used when no previous run exists.
    pub fn cold_start(parameters: &ParameterSet) -> Self {
        Self {
            storage: parameters.smax * COLD_START_STORAGE_FRACTION,
            slow_flow: COLD_START_FLOW,
            fast_flow: COLD_START_FLOW,
        }
    }

    pub fn validate(&self, member: usize) -> FlowcastResult<()> {
        let fields = [
            ("storage", self.storage),
            ("slow_flow", self.slow_flow),
            ("fast_flow", self.fast_flow),
        ];
        for (name, value) in fields {
            if !(value.is_finite() && value >= 0.0) {
                return Err(FlowcastError::InvalidState {
                    member,
                    name,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// States of all ensemble members, indexed like the [`ParameterTable`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateTable {
    states: Vec<InitialState>,
}

impl StateTable {
    pub fn new(states: Vec<InitialState>) -> Self {
        Self { states }
    }

    pub fn cold_start(parameters: &ParameterTable) -> Self {
        parameters.iter().map(InitialState::cold_start).collect()
    }

    /// Read a matrix with columns `storage, slow_flow, fast_flow`.
    pub fn from_array(values: ArrayView2<FloatValue>) -> FlowcastResult<Self> {
        if values.ncols() != InitialState::N_COLUMNS {
            return Err(FlowcastError::ShapeMismatch(format!(
                "state table has {} columns, expected {}",
                values.ncols(),
                InitialState::N_COLUMNS
            )));
        }
        let states = values
            .rows()
            .into_iter()
            .map(|row| InitialState::new(row[0], row[1], row[2]))
            .collect();
        Ok(Self { states })
    }

    pub fn to_array(&self) -> Array2<FloatValue> {
        let mut values = Array2::zeros((self.states.len(), InitialState::N_COLUMNS));
        for (mut row, state) in values.rows_mut().into_iter().zip(&self.states) {
            row[0] = state.storage;
            row[1] = state.slow_flow;
            row[2] = state.fast_flow;
        }
        values
    }

    pub fn validate(&self) -> FlowcastResult<()> {
        self.states
            .iter()
            .enumerate()
            .try_for_each(|(member, state)| state.validate(member))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InitialState> {
        self.states.iter()
    }

    pub fn as_slice(&self) -> &[InitialState] {
        &self.states
    }
}

impl FromIterator<InitialState> for StateTable {
    fn from_iter<I: IntoIterator<Item = InitialState>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
