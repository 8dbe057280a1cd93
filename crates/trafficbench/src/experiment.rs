//! Experiment files: a base configuration, the axes to sweep over and what to
//! report.
//!
//! ```yaml
//! name: density_dilly_dally
//! repeats: 10
//! simulator:
//!   binary: target/release/cellular-automaton-traffic-simulation
//!   schema: exit-flow
//! base:
//!   rounds: 4096
//!   max_speed: 5
//! axes:
//!   - parameter: traffic_density
//!     range: { start: 0.0, stop: 1.0, step: 0.02 }
//!   - parameter: dilly_dally_probability
//!     range: { start: 0.0, stop: 1.0, step: 0.02 }
//! filter:
//!   metric: exit_cell_flow__cars_per_minute
//!   target: 31.0
//!   tolerance: 1.0
//! metrics:
//!   - exit_cell_flow__cars_per_minute
//! workers: 6
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use color_eyre::eyre::{WrapErr, eyre};
use serde::{Deserialize, Serialize};

use trafficbench_core::analysis::{
    AxisRange, ExecutionMode, MetricSelector, PointPlan, SweepAxis, SweepConfig, SweepPoint,
};
use trafficbench_core::{HarnessError, MetricsSchema, ProcessRunner, SimulationConfig};

use crate::util::common::{resolve_workers, timeout_from_secs};

pub const DEFAULT_BINARY: &str = "target/release/cellular-automaton-traffic-simulation";

fn default_binary() -> String {
    DEFAULT_BINARY.to_string()
}

fn default_repeats() -> usize {
    10
}

/// A built-in revision name or an inline schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaSpec {
    Builtin(String),
    Custom(MetricsSchema),
}

impl SchemaSpec {
    pub fn resolve(&self) -> color_eyre::Result<MetricsSchema> {
        match self {
            SchemaSpec::Builtin(revision) => {
                MetricsSchema::by_revision(revision).ok_or_else(|| {
                    let known: Vec<String> = MetricsSchema::builtin()
                        .into_iter()
                        .map(|s| s.revision)
                        .collect();
                    eyre!(
                        "unknown schema revision `{revision}` (built-in: {})",
                        known.join(", ")
                    )
                })
            }
            SchemaSpec::Custom(schema) => Ok(schema.clone()),
        }
    }
}

/// How to invoke the simulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatorSettings {
    /// Program, optionally followed by leading arguments (`cargo run --release --`)
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Expected output fields; inferred when absent
    #[serde(default)]
    pub schema: Option<SchemaSpec>,
    #[serde(default)]
    pub timeout_secs: Option<f64>,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            schema: None,
            timeout_secs: None,
        }
    }
}

impl SimulatorSettings {
    pub fn timeout(&self) -> Option<Duration> {
        timeout_from_secs(self.timeout_secs)
    }

    /// Build the process runner these settings describe
    pub fn runner(&self) -> color_eyre::Result<ProcessRunner> {
        let mut runner = ProcessRunner::from_command_line(&self.binary)?;
        if let Some(spec) = &self.schema {
            runner = runner.with_schema(spec.resolve()?);
        }
        if let Some(timeout) = self.timeout() {
            runner = runner.with_timeout(timeout);
        }
        Ok(runner)
    }
}

/// Simulator parameter driven by a sweep axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepParameter {
    Rounds,
    Length,
    MaxSpeed,
    Lanes,
    PlaceCarProbability,
    TrafficDensity,
    DillyDallyProbability,
    StayInLaneProbability,
    SpawnCarAtEntranceProbability,
    RemoveCarOnExitProbability,
    VehicleSpeed,
    VehicleCount,
    VehicleDensity,
    /// Number of averaged runs at the point
    Repeats,
}

impl SweepParameter {
    /// Human-readable label for axis columns
    pub fn label(self) -> &'static str {
        match self {
            Self::Rounds => "Rounds",
            Self::Length => "Length",
            Self::MaxSpeed => "Max Speed",
            Self::Lanes => "Lanes",
            Self::PlaceCarProbability => "Place Car Probability",
            Self::TrafficDensity => "Traffic Density",
            Self::DillyDallyProbability => "Dilly Dally Probability",
            Self::StayInLaneProbability => "Stay In Lane Probability",
            Self::SpawnCarAtEntranceProbability => "Spawn Car At Entrance Probability",
            Self::RemoveCarOnExitProbability => "Remove Car On Exit Probability",
            Self::VehicleSpeed => "Vehicle Speed",
            Self::VehicleCount => "Vehicle Count",
            Self::VehicleDensity => "Vehicle Density",
            Self::Repeats => "Simulations",
        }
    }

    fn uses_vehicle_class(self) -> bool {
        matches!(
            self,
            Self::VehicleSpeed | Self::VehicleCount | Self::VehicleDensity
        )
    }

    /// Set this parameter to `value` in `plan`. Integer parameters are rounded.
    pub fn apply(
        self,
        value: f64,
        vehicle_class: Option<usize>,
        plan: &mut PointPlan,
    ) -> trafficbench_core::Result<()> {
        let config = &mut plan.config;
        match self {
            Self::Rounds => config.rounds = Some(self.count(value)?),
            Self::Length => config.length = Some(self.count(value)?),
            Self::MaxSpeed => config.max_speed = Some(self.count(value)?),
            Self::Lanes => config.lanes = Some(self.count(value)?),
            Self::PlaceCarProbability => config.place_car_probability = Some(value),
            Self::TrafficDensity => config.traffic_density = Some(value),
            Self::DillyDallyProbability => config.dilly_dally_probability = Some(value),
            Self::StayInLaneProbability => config.stay_in_lane_probability = Some(value),
            Self::SpawnCarAtEntranceProbability => {
                config.spawn_car_at_entrance_probability = Some(value)
            }
            Self::RemoveCarOnExitProbability => {
                config.remove_car_on_exit_probability = Some(value)
            }
            Self::VehicleSpeed | Self::VehicleCount | Self::VehicleDensity => {
                let index = vehicle_class.unwrap_or(0);
                let count = match self {
                    Self::VehicleDensity => None,
                    _ => Some(self.count(value)?),
                };
                let class = config
                    .vehicles
                    .as_mut()
                    .and_then(|classes| classes.get_mut(index))
                    .ok_or_else(|| {
                        HarnessError::InvalidSweep(format!(
                            "{} sweeps vehicle class {index}, which the base config does not define",
                            self.label()
                        ))
                    })?;
                match (self, count) {
                    (Self::VehicleSpeed, Some(speed)) => class.speed = speed,
                    (Self::VehicleCount, Some(count)) => class.count = count,
                    _ => class.density = value,
                }
            }
            Self::Repeats => {
                let repeats = self.count(value)?;
                if repeats == 0 {
                    return Err(HarnessError::InvalidSweep(
                        "repeat count must be at least 1".to_string(),
                    ));
                }
                plan.repeats = repeats as usize;
            }
        }
        Ok(())
    }

    fn count(self, value: f64) -> trafficbench_core::Result<u32> {
        let rounded = value.round();
        if !rounded.is_finite() || rounded < 0.0 || rounded > f64::from(u32::MAX) {
            return Err(HarnessError::InvalidSweep(format!(
                "{} must be a non-negative integer, got {value}",
                self.label()
            )));
        }
        Ok(rounded as u32)
    }
}

/// One axis of an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentAxis {
    pub parameter: SweepParameter,
    /// Vehicle class index for `vehicle_*` parameters (default 0)
    #[serde(default)]
    pub vehicle_class: Option<usize>,
    #[serde(default)]
    pub label: Option<String>,
    pub range: AxisRange,
}

impl ExperimentAxis {
    pub fn label(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        match self.vehicle_class {
            Some(index) if self.parameter.uses_vehicle_class() => {
                format!("{} (class {index})", self.parameter.label())
            }
            _ => self.parameter.label().to_string(),
        }
    }
}

/// Keep points whose metric lies strictly within `target ± tolerance`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSpec {
    pub metric: String,
    pub target: f64,
    pub tolerance: f64,
}

impl FilterSpec {
    /// Build the point predicate. Points whose metric cannot be resolved are dropped.
    pub fn predicate(&self) -> trafficbench_core::Result<impl Fn(&SweepPoint) -> bool + Sync> {
        let selector: MetricSelector = self.metric.parse()?;
        let (target, tolerance) = (self.target, self.tolerance);
        Ok(move |point: &SweepPoint| match selector.value(point) {
            Ok(value) => (value - target).abs() < tolerance,
            Err(e) => {
                tracing::warn!(coordinates = ?point.coordinates, error = %e, "dropping point");
                false
            }
        })
    }
}

/// A sweep experiment loaded from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Experiment {
    pub name: String,
    #[serde(default)]
    pub simulator: SimulatorSettings,
    /// Runs averaged per point unless a `repeats` axis overrides it
    #[serde(default = "default_repeats")]
    pub repeats: usize,
    #[serde(default)]
    pub base: SimulationConfig,
    pub axes: Vec<ExperimentAxis>,
    #[serde(default)]
    pub filter: Option<FilterSpec>,
    /// Metric selectors to export: `name`, `name[i]`, `@batch_time`, `@runs`
    #[serde(default)]
    pub metrics: Vec<String>,
    /// Worker pool size; absent or 1 runs sequentially, 0 uses one per CPU
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Experiment {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_saphyr::Error> {
        serde_saphyr::from_str(yaml)
    }

    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let yaml = fs::read_to_string(path)
            .wrap_err_with(|| format!("cannot read experiment {}", path.display()))?;
        let experiment = Self::from_yaml(&yaml)
            .wrap_err_with(|| format!("invalid experiment {}", path.display()))?;
        experiment.validate()?;
        Ok(experiment)
    }

    /// Check what can be checked without running anything
    pub fn validate(&self) -> color_eyre::Result<()> {
        if self.name.trim().is_empty() || self.name.contains(['/', '\\']) {
            return Err(eyre!("experiment name `{}` is not a valid file stem", self.name));
        }
        if self.axes.is_empty() {
            return Err(eyre!("experiment `{}` has no axes", self.name));
        }
        if self.repeats == 0 {
            return Err(eyre!("experiment `{}` has repeats: 0", self.name));
        }
        self.sweep_config().all_axis_values()?;
        self.selectors()?;
        if let Some(filter) = &self.filter {
            filter.predicate()?;
        }
        if let Some(schema) = &self.simulator.schema {
            schema.resolve()?;
        }
        Ok(())
    }

    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig::new(
            self.axes
                .iter()
                .map(|axis| SweepAxis::new(axis.label(), axis.range.clone()))
                .collect(),
        )
        .repeats(self.repeats)
        .execution(ExecutionMode::from_workers(resolve_workers(self.workers)))
    }

    /// Configuration and repeat count at one grid point
    pub fn plan_point(&self, coordinates: &[f64]) -> trafficbench_core::Result<PointPlan> {
        let mut plan = PointPlan {
            config: self.base.clone(),
            repeats: self.repeats,
        };
        for (axis, &value) in self.axes.iter().zip(coordinates) {
            axis.parameter.apply(value, axis.vehicle_class, &mut plan)?;
        }
        Ok(plan)
    }

    pub fn selectors(&self) -> trafficbench_core::Result<Vec<MetricSelector>> {
        self.metrics.iter().map(|m| m.parse()).collect()
    }
}
