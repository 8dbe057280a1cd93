//! Configuration types for parameter sweeps.

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

/// Most values a single axis may generate
pub const MAX_AXIS_VALUES: usize = 1_000_000;

/// Values taken by one sweep axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisRange {
    /// Explicit values, in sweep order
    Values { values: Vec<f64> },
    /// Half-open `[start, stop)` stepping by `step`
    Arange { start: f64, stop: f64, step: f64 },
    /// `steps` evenly spaced values from `min` to `max` inclusive
    Linspace { min: f64, max: f64, steps: usize },
}

impl AxisRange {
    pub fn arange(start: f64, stop: f64, step: f64) -> Self {
        Self::Arange { start, stop, step }
    }

    pub fn linspace(min: f64, max: f64, steps: usize) -> Self {
        Self::Linspace { min, max, steps }
    }

    pub fn values(values: impl Into<Vec<f64>>) -> Self {
        Self::Values {
            values: values.into(),
        }
    }

    /// Generate the axis values. An axis must have at least one value.
    pub fn sweep_values(&self) -> Result<Vec<f64>> {
        let values = match *self {
            Self::Values { ref values } => values.clone(),
            Self::Arange { start, stop, step } => {
                if step == 0.0 || !(start.is_finite() && stop.is_finite() && step.is_finite()) {
                    return Err(HarnessError::InvalidSweep(format!(
                        "arange({start}, {stop}, {step}) is not a finite range"
                    )));
                }
                let count = ((stop - start) / step).ceil().max(0.0);
                if count > MAX_AXIS_VALUES as f64 {
                    return Err(too_many_values(count));
                }
                (0..count as usize).map(|i| start + step * i as f64).collect()
            }
            Self::Linspace { min, max, steps } => {
                if steps > MAX_AXIS_VALUES {
                    return Err(too_many_values(steps as f64));
                }
                if steps <= 1 {
                    vec![min; steps]
                } else {
                    let step_size = (max - min) / (steps - 1) as f64;
                    (0..steps).map(|i| min + step_size * i as f64).collect()
                }
            }
        };

        if values.is_empty() {
            return Err(HarnessError::InvalidSweep(format!("{self:?} has no values")));
        }
        Ok(values)
    }
}

fn too_many_values(count: f64) -> HarnessError {
    HarnessError::InvalidSweep(format!(
        "{count} values exceed the limit of {MAX_AXIS_VALUES} per axis"
    ))
}

/// One labelled dimension of a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepAxis {
    pub label: String,
    pub range: AxisRange,
}

impl SweepAxis {
    pub fn new(label: impl Into<String>, range: AxisRange) -> Self {
        Self {
            label: label.into(),
            range,
        }
    }
}

/// How grid points are scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One point after another on the calling thread
    #[default]
    Sequential,
    /// Whole grid points dispatched to a pool of `workers` threads
    Parallel { workers: usize },
}

impl ExecutionMode {
    /// Parallel for more than one worker, sequential otherwise
    pub fn from_workers(workers: Option<usize>) -> Self {
        match workers {
            Some(workers) if workers > 1 => Self::Parallel { workers },
            _ => Self::Sequential,
        }
    }
}

/// Configuration for a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Axes to sweep; the first varies slowest
    pub axes: Vec<SweepAxis>,
    /// Simulator runs averaged at each point
    #[serde(default = "default_repeats")]
    pub repeats: usize,
    #[serde(default)]
    pub execution: ExecutionMode,
}

fn default_repeats() -> usize {
    10
}

impl SweepConfig {
    pub fn new(axes: Vec<SweepAxis>) -> Self {
        Self {
            axes,
            repeats: default_repeats(),
            execution: ExecutionMode::default(),
        }
    }

    #[must_use]
    pub fn repeats(mut self, repeats: usize) -> Self {
        self.repeats = repeats;
        self
    }

    #[must_use]
    pub fn execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    /// Get the number of dimensions in the sweep
    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    /// Get sweep values for all axes
    pub fn all_axis_values(&self) -> Result<Vec<Vec<f64>>> {
        if self.axes.is_empty() {
            return Err(HarnessError::InvalidSweep(
                "at least one sweep axis required".to_string(),
            ));
        }
        self.axes
            .iter()
            .map(|axis| {
                axis.range.sweep_values().map_err(|e| match e {
                    HarnessError::InvalidSweep(reason) => {
                        HarnessError::InvalidSweep(format!("axis `{}`: {reason}", axis.label))
                    }
                    other => other,
                })
            })
            .collect()
    }

    /// Get the shape of the sweep grid (value counts for each axis)
    pub fn grid_shape(&self) -> Result<Vec<usize>> {
        Ok(self.all_axis_values()?.iter().map(Vec::len).collect())
    }

    /// Get total number of sweep points
    pub fn total_points(&self) -> Result<usize> {
        self.grid_shape()?
            .iter()
            .try_fold(1usize, |total, &len| total.checked_mul(len))
            .ok_or_else(|| HarnessError::InvalidSweep("grid has too many points".to_string()))
    }

    /// Get labels for all axes
    pub fn labels(&self) -> Vec<String> {
        self.axes.iter().map(|axis| axis.label.clone()).collect()
    }
}

/// Iterator over all indices of a grid in row-major order
pub struct GridIndices {
    shape: Vec<usize>,
    current: Vec<usize>,
    done: bool,
}

impl GridIndices {
    pub fn new(shape: Vec<usize>) -> Self {
        let done = shape.is_empty() || shape.contains(&0);
        Self {
            current: vec![0; shape.len()],
            shape,
            done,
        }
    }
}

impl Iterator for GridIndices {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current.clone();

        // Increment indices (row-major: last dimension varies fastest)
        for i in (0..self.shape.len()).rev() {
            self.current[i] += 1;
            if self.current[i] < self.shape[i] {
                break;
            }
            self.current[i] = 0;
            if i == 0 {
                self.done = true;
            }
        }

        Some(result)
    }
}
