//! Calibrated parameter sets
//!
//! Each row of a [`ParameterTable`] is one ensemble member. Row order is part of
//! the contract: output columns and carried states are aligned with it.

use crate::errors::{FlowcastError, FlowcastResult};
use crate::units::FloatValue;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Parameters of one ensemble member.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// Maximum soil storage (mm)
    pub smax: FloatValue,
    /// Reference rate of the fast store (mm/day)
    pub qmax: FloatValue,
    /// Drainage rate at full storage (mm/day)
    pub k: FloatValue,
    /// Residence time of the slow store (days)
    pub tr: FloatValue,
}

impl ParameterSet {
    pub const N_COLUMNS: usize = 4;

    pub fn new(smax: FloatValue, qmax: FloatValue, k: FloatValue, tr: FloatValue) -> Self {
        Self { smax, qmax, k, tr }
    }

    /// Check every parameter is positive and finite.
    ///
    /// `member` is only used to label the error.
    pub fn validate(&self, member: usize) -> FlowcastResult<()> {
        let fields = [
            ("smax", self.smax),
            ("qmax", self.qmax),
            ("k", self.k),
            ("tr", self.tr),
        ];
        for (name, value) in fields {
            if !(value.is_finite() && value > 0.0) {
                return Err(FlowcastError::InvalidParameter {
                    member,
                    name,
                    value,
                });
            }
        }
        Ok(())
    }

    /// [`ParameterSet::validate`] plus the stability limit of the slow store.
    ///
    /// The explicit linear store overshoots below zero once `dt / Tr > 1`, so `Tr`
    /// may not be shorter than the timestep.
    pub fn validate_for_timestep(&self, member: usize, timestep: FloatValue) -> FlowcastResult<()> {
        self.validate(member)?;
        if self.tr < timestep {
            return Err(FlowcastError::ResidenceTimeTooShort {
                member,
                tr: self.tr,
                timestep,
            });
        }
        Ok(())
    }
}

/// The calibration ensemble.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterTable {
    sets: Vec<ParameterSet>,
}

impl ParameterTable {
    pub fn new(sets: Vec<ParameterSet>) -> Self {
        Self { sets }
    }

    /// Read a matrix with columns `Smax, qmax, k, Tr`.
    ///
    /// Columns beyond the fourth are ignored.
    pub fn from_array(values: ArrayView2<FloatValue>) -> FlowcastResult<Self> {
        if values.ncols() < ParameterSet::N_COLUMNS {
            return Err(FlowcastError::ShapeMismatch(format!(
                "parameter table has {} columns, expected at least {}",
                values.ncols(),
                ParameterSet::N_COLUMNS
            )));
        }
        let sets = values
            .rows()
            .into_iter()
            .map(|row| ParameterSet::new(row[0], row[1], row[2], row[3]))
            .collect();
        Ok(Self { sets })
    }

    pub fn to_array(&self) -> Array2<FloatValue> {
        let mut values = Array2::zeros((self.sets.len(), ParameterSet::N_COLUMNS));
        for (mut row, set) in values.rows_mut().into_iter().zip(&self.sets) {
            row[0] = set.smax;
            row[1] = set.qmax;
            row[2] = set.k;
            row[3] = set.tr;
        }
        values
    }

    /// Validate every member, failing on the first invalid one.
    pub fn validate(&self) -> FlowcastResult<()> {
        self.sets
            .iter()
            .enumerate()
            .try_for_each(|(member, set)| set.validate(member))
    }

    /// Validate every member for a run at `timestep` days.
    pub fn validate_for_timestep(&self, timestep: FloatValue) -> FlowcastResult<()> {
        self.sets
            .iter()
            .enumerate()
            .try_for_each(|(member, set)| set.validate_for_timestep(member, timestep))
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParameterSet> {
        self.sets.iter()
    }

    pub fn as_slice(&self) -> &[ParameterSet] {
        &self.sets
    }
}

impl FromIterator<ParameterSet> for ParameterTable {
    fn from_iter<I: IntoIterator<Item = ParameterSet>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_from_array_ignores_extra_columns() {
        let values = array![[80.0, 50.0, 10.0, 5.0, 0.93], [120.0, 30.0, 4.0, 20.0, 0.88]];
        let table = ParameterTable::from_array(values.view()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.as_slice()[1], ParameterSet::new(120.0, 30.0, 4.0, 20.0));
        assert_eq!(table.to_array().ncols(), 4);
    }

    #[test]
    fn test_from_array_too_few_columns() {
        let values = array![[80.0, 50.0, 10.0]];
        assert!(matches!(
            ParameterTable::from_array(values.view()),
            Err(FlowcastError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_validate_reports_member_and_field() {
        let table: ParameterTable = [
            ParameterSet::new(80.0, 50.0, 10.0, 5.0),
            ParameterSet::new(80.0, 0.0, 10.0, 5.0),
        ]
        .into_iter()
        .collect();

        let err = table.validate().unwrap_err();
        assert_eq!(
            err,
            FlowcastError::InvalidParameter {
                member: 1,
                name: "qmax",
                value: 0.0
            }
        );
    }

    #[test]
    fn test_validate_rejects_nan() {
        let set = ParameterSet::new(FloatValue::NAN, 50.0, 10.0, 5.0);
        assert!(set.validate(0).is_err());
    }

    #[test]
    fn test_residence_time_shorter_than_timestep() {
        let table = ParameterTable::new(vec![
            ParameterSet::new(80.0, 50.0, 10.0, 5.0),
            ParameterSet::new(80.0, 50.0, 10.0, 0.2),
        ]);
        assert!(table.validate().is_ok());
        assert!(table.validate_for_timestep(0.1).is_ok());
        assert_eq!(
            table.validate_for_timestep(0.25).unwrap_err(),
            FlowcastError::ResidenceTimeTooShort {
                member: 1,
                tr: 0.2,
                timestep: 0.25
            }
        );
        // Equal to the timestep empties the store in one step but never overshoots
        assert!(ParameterSet::new(80.0, 50.0, 10.0, 0.25)
            .validate_for_timestep(0, 0.25)
            .is_ok());
    }

    #[test]
    fn test_serialization() {
        let table = ParameterTable::new(vec![ParameterSet::new(80.0, 50.0, 10.0, 5.0)]);
        let json = serde_json::to_string(&table).expect("Serialization failed");
        let parsed: ParameterTable = serde_json::from_str(&json).expect("Deserialization failed");
        assert_eq!(table, parsed);
    }
}
