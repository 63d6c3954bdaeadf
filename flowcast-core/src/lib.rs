//! Ensemble river flow forecasting for a single catchment.
//!
//! The engine turns weather forcing into probabilistic river flow with a
//! rainfall-runoff model run once per calibrated parameter set:
//!
//! - `forcing`: raw weather samples and their conversion to model inputs
//! - `evapotranspiration`: FAO-56 reference and open-water evaporation
//! - `pdm`: Probability-Distributed Model soil moisture store
//! - `routing`: linear and non-linear reservoir routing
//! - `ensemble`: all parameter sets, in parallel
//! - `session`: the entry point tying the chain together
//!
//! It performs no I/O apart from reading a configuration file. States are owned
//! by the caller and threaded through each call explicitly.

pub mod config;
pub mod ensemble;
pub mod errors;
pub mod evapotranspiration;
pub mod forcing;
pub mod parameters;
pub mod pdm;
pub mod routing;
pub mod session;
pub mod state;
pub mod summary;
pub mod units;

pub use config::SimulationConfig;
pub use errors::{FlowcastError, FlowcastResult};
pub use session::{parse_start_date, CatchmentFlowSession, RunMode, SessionOutput};
