//! Simulation configuration
//!
//! `SimulationConfig` mirrors the simulator's command-line flags. Every field is
//! optional; unset fields are left out of the encoded arguments so the
//! simulator falls back to its own defaults.
//!
//! The flag set differs between simulator revisions, so only set the fields
//! your binary understands.

mod encode;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use encode::encode;

/// One class of vehicles placed on the road: `(speed, count, density)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleClass {
    /// Max speed of this class in cells per round
    pub speed: u32,
    /// Relative weight of this class in the vehicle mix
    pub count: u32,
    /// Probability that a cell starts occupied by a vehicle of this class
    pub density: f64,
}

impl VehicleClass {
    pub fn new(speed: u32, count: u32, density: f64) -> Self {
        Self {
            speed,
            count,
            density,
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.speed, self.count, self.density)
    }
}

/// A road cell whose flow is reported individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MonitorCell {
    /// Cell index on a single-lane road
    Cell(u32),
    /// `(lane, cell)` on a multi-lane road
    Coordinate(u32, u32),
}

impl fmt::Display for MonitorCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorCell::Cell(cell) => write!(f, "{cell}"),
            MonitorCell::Coordinate(lane, cell) => write!(f, "{lane},{cell}"),
        }
    }
}

/// Complete set of simulator parameters.
///
/// Field order is the encoding order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of rounds to simulate
    pub rounds: Option<u32>,
    /// Number of cells making up the road
    pub length: Option<u32>,
    /// Maximum number of cells a vehicle can drive per round
    pub max_speed: Option<u32>,
    pub lanes: Option<u32>,
    /// Vehicle mix, encoded as `speed,count,density;...`
    pub vehicles: Option<Vec<VehicleClass>>,
    /// Probability with which the initial cars are placed
    pub place_car_probability: Option<f64>,
    pub traffic_density: Option<f64>,
    /// Per-round probability of an extra random deceleration
    pub dilly_dally_probability: Option<f64>,
    pub stay_in_lane_probability: Option<f64>,
    pub spawn_car_at_entrance_probability: Option<f64>,
    pub remove_car_on_exit_probability: Option<f64>,
    /// Cells whose flow is reported individually
    pub monitor: Option<Vec<MonitorCell>>,
    /// Encoded as `--verbose true` or `--verbose false`. Revisions that take
    /// `--verbose` as a bare switch reject the value token, so leave this unset
    /// for them.
    pub verbose: Option<bool>,
    /// Path of the rendered road image
    pub image: Option<PathBuf>,
    pub out_path: Option<PathBuf>,
}

impl SimulationConfig {
    /// Check if no parameter is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The encoded arguments joined by spaces, for diagnostics
    #[must_use]
    pub fn command_line(&self) -> String {
        encode(self).join(" ")
    }
}
