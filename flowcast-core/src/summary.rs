//! Per-timestep summary statistics of a flow ensemble.

use crate::units::FloatValue;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Median and interquartile range of the ensemble at each timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleSummary {
    pub median: Vec<FloatValue>,
    pub p25: Vec<FloatValue>,
    pub p75: Vec<FloatValue>,
}

impl EnsembleSummary {
    /// Summarise a flow matrix with one row per timestep and one column per member.
    ///
    /// Rows without members yield `NaN`.
    pub fn from_flow(flow: &Array2<FloatValue>) -> Self {
        let n = flow.nrows();
        let mut summary = Self {
            median: Vec::with_capacity(n),
            p25: Vec::with_capacity(n),
            p75: Vec::with_capacity(n),
        };
        for row in flow.axis_iter(Axis(0)) {
            let mut sorted = row.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            summary.p25.push(percentile(&sorted, 25.0));
            summary.median.push(percentile(&sorted, 50.0));
            summary.p75.push(percentile(&sorted, 75.0));
        }
        summary
    }

    pub fn len(&self) -> usize {
        self.median.len()
    }

    pub fn is_empty(&self) -> bool {
        self.median.is_empty()
    }
}

/// Percentile `p` (0-100) of sorted values, interpolating linearly between ranks.
pub fn percentile(sorted: &[FloatValue], p: FloatValue) -> FloatValue {
    match sorted.len() {
        0 => FloatValue::NAN,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as FloatValue;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as FloatValue;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}
