//! flowcast - ensemble river flow forecasts from the command line
//!
//! # Usage
//!
//! ```bash
//! flowcast run \
//!   --config catchment.toml \
//!   --forcing gefs_member_01.csv \
//!   --parameters parameters.csv \
//!   --state state_2022-03-01.csv \
//!   --start 2022-03-01T00:00:00Z \
//!   --output out/
//! ```
//!
//! Set `RUST_LOG=info` (or `debug`) for progress messages.

mod io;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use flowcast_core::parameters::{ParameterSet, ParameterTable};
use flowcast_core::state::{InitialState, StateTable};
use flowcast_core::{parse_start_date, CatchmentFlowSession, RunMode, SimulationConfig};
use log::{info, warn};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "flowcast",
    version,
    about = "Ensemble river flow forecasts for a single catchment"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// One-day forecast; states apply to the following day
    Daily,
    /// Initialisation over observations; states apply to the end of the period
    SpinUp,
}

#[derive(Subcommand)]
enum Command {
    /// Run one forcing series through the whole calibration ensemble
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Catchment and model settings (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Forcing CSV with a header naming each field
    #[arg(short, long)]
    forcing: PathBuf,

    /// Calibrated parameter sets: header-less CSV, columns smax, qmax, k, tr
    #[arg(short, long)]
    parameters: PathBuf,

    /// Initial states: header-less CSV, columns storage, slow_flow, fast_flow.
    /// Cold-start states are used when omitted.
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Time of the first forcing sample (RFC 3339 with offset)
    #[arg(long)]
    start: String,

    /// Directory for the output tables
    #[arg(short, long)]
    output: PathBuf,

    #[arg(long, value_enum, default_value_t = Mode::Daily)]
    mode: Mode,

    /// Length of a spin-up run in days. Defaults to the length of the forcing.
    #[arg(long)]
    spin_up_days: Option<u32>,
}

fn create(dir: &Path, name: &str) -> anyhow::Result<BufWriter<File>> {
    let path = dir.join(name);
    let file = File::create(&path).with_context(|| format!("cannot create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn open(path: &Path) -> anyhow::Result<File> {
    File::open(path).with_context(|| format!("cannot open {}", path.display()))
}

fn run(args: RunArgs) -> anyhow::Result<()> {
    let RunArgs {
        config,
        forcing,
        parameters,
        state,
        start,
        output,
        mode,
        spin_up_days,
    } = args;

    let config = match config {
        Some(path) => SimulationConfig::from_file(&path)?,
        None => {
            warn!("No configuration given, using the default catchment");
            SimulationConfig::default()
        }
    };
    let start = parse_start_date(&start)?;

    let forcing = io::read_forcing(open(&forcing)?)
        .with_context(|| format!("reading forcing {}", forcing.display()))?;
    let parameters = ParameterTable::from_array(
        io::read_matrix(open(&parameters)?, ParameterSet::N_COLUMNS)
            .with_context(|| format!("reading parameters {}", parameters.display()))?
            .view(),
    )?;
    let states = match state {
        Some(path) => StateTable::from_array(
            io::read_matrix(open(&path)?, InitialState::N_COLUMNS)
                .with_context(|| format!("reading states {}", path.display()))?
                .view(),
        )?,
        None => {
            info!("No initial states given, cold-starting {} members", parameters.len());
            StateTable::cold_start(&parameters)
        }
    };

    let mode = match mode {
        Mode::Daily => RunMode::Daily,
        Mode::SpinUp => RunMode::SpinUp {
            days: spin_up_days
                .unwrap_or((forcing.len() / config.samples_per_day.max(1)) as u32),
        },
    };

    let session = CatchmentFlowSession::new(config)?;
    let result = session.simulate(&forcing, &states, &parameters, start)?;

    fs::create_dir_all(&output)
        .with_context(|| format!("cannot create {}", output.display()))?;
    io::write_flow(create(&output, "flow.csv")?, &result)?;
    io::write_diagnostics(create(&output, "diagnostics.csv")?, &result)?;
    io::write_summary(create(&output, "summary.csv")?, &result)?;
    io::write_states(create(&output, "next_state.csv")?, &result.next_states)?;

    info!(
        "Wrote {} timesteps x {} members to {}",
        result.len(),
        result.n_members(),
        output.display()
    );
    info!(
        "Next states apply from {}",
        mode.next_state_date(start).to_rfc3339()
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args),
    }
}
