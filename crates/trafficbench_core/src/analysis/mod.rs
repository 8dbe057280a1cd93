//! Parameter sweeps over simulator configurations.
//!
//! A sweep walks the Cartesian product of one or more axes, turns every
//! coordinate vector into a simulator configuration and averages repeated
//! runs at each point:
//!
//! ```ignore
//! use trafficbench_core::analysis::{AxisRange, ExecutionMode, Sweep, SweepAxis, SweepConfig};
//!
//! let config = SweepConfig::new(vec![
//!     SweepAxis::new("Traffic Density", AxisRange::arange(0.0, 1.0, 0.02)),
//!     SweepAxis::new("Dilly Dally Probability", AxisRange::arange(0.0, 1.0, 0.02)),
//! ])
//! .repeats(10)
//! .execution(ExecutionMode::Parallel { workers: 6 });
//!
//! let results = Sweep::new(&config, |coords: &[f64]| SimulationConfig {
//!     traffic_density: Some(coords[0]),
//!     dilly_dally_probability: Some(coords[1]),
//!     ..base.clone()
//! })
//! .run(&runner, Some(&progress))?;
//! ```
//!
//! # Output
//!
//! `SweepResults` holds one `SweepPoint` per kept grid point, ordered with the
//! first axis varying slowest regardless of execution mode. `SweepResults::series`
//! flattens them into index-aligned columns for plotting or export.

mod config;
mod evaluator;
mod series;

pub use config::*;
pub use evaluator::*;
pub use series::*;
