//! Experiment harness for cellular-automaton traffic simulators
//!
//! This crate drives an external simulator binary through its command-line
//! interface and turns its per-run output into averaged metrics across
//! parameter sweeps. It supports:
//! - Encoding a typed `SimulationConfig` into CLI flag/value tokens
//! - Running the simulator as a subprocess with optional timeout and cancellation
//! - Decoding the final output line into a `MetricsRecord` (versioned schemas)
//! - Averaging N repeated runs into an `AggregateResult`
//! - 1D/2D (and higher) parameter sweeps, sequential or on a worker pool
//!
//! # Example
//!
//! ```ignore
//! use trafficbench_core::analysis::{AxisRange, Sweep, SweepAxis, SweepConfig};
//! use trafficbench_core::{ProcessRunner, SimulationConfig};
//!
//! let runner = ProcessRunner::new("target/release/cellular-automaton-traffic-simulation");
//! let base = SimulationConfig {
//!     place_car_probability: Some(0.4),
//!     ..Default::default()
//! };
//! let config = SweepConfig::new(vec![SweepAxis::new(
//!     "Dilly Dally Probability",
//!     AxisRange::arange(0.0, 1.0, 0.05),
//! )])
//! .repeats(100);
//!
//! let results = Sweep::new(&config, |coords: &[f64]| SimulationConfig {
//!     dilly_dally_probability: Some(coords[0]),
//!     ..base.clone()
//! })
//! .run(&runner, None)?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod aggregate;
pub mod analysis;
pub mod error;
pub mod progress;
pub mod runner;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod config;
pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use aggregate::{Accumulator, AggregateResult, run_average, run_average_with_progress};
pub use config::{MonitorCell, SimulationConfig, VehicleClass, encode};
pub use error::{HarnessError, Result};
pub use model::{
    FieldKind, FieldSpec, MetricValue, MetricsRecord, MetricsSchema, Shape, decode_line,
};
pub use progress::RunProgress;
pub use runner::{ProcessRunner, Simulator};
