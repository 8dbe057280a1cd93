//! Command-line front end for the trafficbench harness
//!
//! This crate wires `trafficbench_core` to the outside world:
//! - Experiment files (YAML) describing a base configuration and sweep axes
//! - Logging to stderr and an optional rotating log file
//! - Export of sweep series as JSON and CSV

pub mod experiment;
pub mod logging;
pub mod output;
pub mod util;

pub use experiment::{
    Experiment, ExperimentAxis, FilterSpec, SchemaSpec, SimulatorSettings, SweepParameter,
};
pub use logging::init_logging;
pub use output::{SweepReport, render_csv, write_results};
