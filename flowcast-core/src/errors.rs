use thiserror::Error;

use crate::units::FloatValue;

/// Error type for invalid simulation inputs.
///
/// Every variant is fatal: a run that fails validation produces no partial output.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowcastError {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("Invalid parameter `{name}` for ensemble member {member}: got {value}, expected a positive finite value")]
    InvalidParameter {
        member: usize,
        name: &'static str,
        value: FloatValue,
    },
    #[error("Residence time {tr} days of ensemble member {member} is shorter than the {timestep}-day timestep")]
    ResidenceTimeTooShort {
        member: usize,
        tr: FloatValue,
        timestep: FloatValue,
    },
    #[error("Invalid initial state `{name}` for ensemble member {member}: got {value}, expected a non-negative finite value")]
    InvalidState {
        member: usize,
        name: &'static str,
        value: FloatValue,
    },
    #[error("Forcing field not found: `{0}`")]
    MissingField(String),
    #[error("Invalid forcing value `{field}` at sample {sample}: got {value}")]
    InvalidForcing {
        sample: usize,
        field: &'static str,
        value: FloatValue,
    },
    #[error("Undefined date: {0}. Start dates must carry an explicit UTC offset")]
    UndefinedDate(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience type for `Result<T, FlowcastError>`.
pub type FlowcastResult<T> = Result<T, FlowcastError>;
