//! Sweep evaluator - plans every grid point, then averages runs at each one.

use std::time::{Duration, Instant};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::info;

use crate::aggregate::{AggregateResult, run_average_with_progress};
use crate::config::SimulationConfig;
use crate::error::{HarnessError, Result};
use crate::progress::RunProgress;
use crate::runner::Simulator;

use super::{ExecutionMode, GridIndices, SweepConfig};

/// What to run at one grid point
#[derive(Debug, Clone, PartialEq)]
pub struct PointPlan {
    pub config: SimulationConfig,
    pub repeats: usize,
}

/// One evaluated grid point
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPoint {
    /// Index into each axis
    pub indices: Vec<usize>,
    /// Axis values at this point
    pub coordinates: Vec<f64>,
    pub result: AggregateResult,
    /// Wall-clock time spent on all repeats of this point
    pub elapsed: Duration,
}

/// Evaluated sweep, ordered by grid index with the first axis slowest
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResults {
    pub labels: Vec<String>,
    pub axis_values: Vec<Vec<f64>>,
    /// Points kept by the filter
    pub points: Vec<SweepPoint>,
    /// Number of points evaluated before filtering
    pub evaluated: usize,
}

impl SweepResults {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Look up a kept point by its grid indices
    pub fn get(&self, indices: &[usize]) -> Option<&SweepPoint> {
        self.points
            .binary_search_by(|point| point.indices.as_slice().cmp(indices))
            .ok()
            .map(|i| &self.points[i])
    }

    /// Total simulator runs behind the kept points
    pub fn total_runs(&self) -> usize {
        self.points.iter().map(|point| point.result.runs()).sum()
    }
}

type Planner<'a> = Box<dyn Fn(&[f64]) -> Result<PointPlan> + Sync + 'a>;
type PointFilter<'a> = Box<dyn Fn(&SweepPoint) -> bool + Sync + 'a>;

struct PointTask {
    indices: Vec<usize>,
    coordinates: Vec<f64>,
    plan: PointPlan,
}

/// A sweep ready to run: axes, a planner from coordinates to configuration and
/// an optional filter over evaluated points.
pub struct Sweep<'a> {
    config: &'a SweepConfig,
    planner: Planner<'a>,
    filter: Option<PointFilter<'a>>,
}

impl<'a> Sweep<'a> {
    /// Sweep with `config.repeats` runs at every point
    pub fn new<F>(config: &'a SweepConfig, build: F) -> Self
    where
        F: Fn(&[f64]) -> SimulationConfig + Sync + 'a,
    {
        let repeats = config.repeats;
        Self::with_planner(config, move |coordinates| {
            Ok(PointPlan {
                config: build(coordinates),
                repeats,
            })
        })
    }

    /// Sweep where the planner also chooses the repeat count per point
    pub fn with_planner<F>(config: &'a SweepConfig, planner: F) -> Self
    where
        F: Fn(&[f64]) -> Result<PointPlan> + Sync + 'a,
    {
        Self {
            config,
            planner: Box::new(planner),
            filter: None,
        }
    }

    /// Keep only evaluated points for which `filter` returns true
    #[must_use]
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&SweepPoint) -> bool + Sync + 'a,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Plan every point, then evaluate them.
    ///
    /// `progress` is reset to the total number of simulator runs and counts
    /// each finished run. Any failing point aborts the sweep; cancellation is
    /// reported as a bare `Cancelled`.
    pub fn run<S>(&self, simulator: &S, progress: Option<&RunProgress>) -> Result<SweepResults>
    where
        S: Simulator + ?Sized,
    {
        let axis_values = self.config.all_axis_values()?;
        let labels = self.config.labels();
        let tasks = self.plan(&axis_values)?;

        let total_runs: usize = tasks.iter().map(|task| task.plan.repeats).sum();
        let total_rounds: u64 = tasks
            .iter()
            .map(|task| u64::from(task.plan.config.rounds.unwrap_or(0)) * task.plan.repeats as u64)
            .sum();
        if let Some(p) = progress {
            p.reset(total_runs);
        }
        info!(
            points = tasks.len(),
            simulations = total_runs,
            rounds = total_rounds,
            "starting sweep over {}",
            labels.join(" x ")
        );

        let evaluate = |task: PointTask| evaluate_point(simulator, task, progress);
        let points = match self.config.execution {
            ExecutionMode::Sequential => tasks.into_iter().map(evaluate).collect(),
            ExecutionMode::Parallel { workers } => evaluate_parallel(tasks, &evaluate, workers),
        };
        let mut points = points.map_err(|e| {
            if e.is_cancelled() {
                HarnessError::Cancelled
            } else {
                e
            }
        })?;

        let evaluated = points.len();
        if let Some(filter) = &self.filter {
            points.retain(|point| filter(point));
        }

        Ok(SweepResults {
            labels,
            axis_values,
            points,
            evaluated,
        })
    }

    fn plan(&self, axis_values: &[Vec<f64>]) -> Result<Vec<PointTask>> {
        let shape = axis_values.iter().map(Vec::len).collect();
        GridIndices::new(shape)
            .map(|indices| {
                let coordinates: Vec<f64> = indices
                    .iter()
                    .enumerate()
                    .map(|(dim, &idx)| axis_values[dim][idx])
                    .collect();
                let plan = (self.planner)(&coordinates)
                    .and_then(|plan| {
                        if plan.repeats == 0 {
                            Err(HarnessError::InvalidDivisor(0))
                        } else {
                            Ok(plan)
                        }
                    })
                    .map_err(|e| grid_point_error(&coordinates, e))?;
                Ok(PointTask {
                    indices,
                    coordinates,
                    plan,
                })
            })
            .collect()
    }
}

fn evaluate_point<S>(
    simulator: &S,
    task: PointTask,
    progress: Option<&RunProgress>,
) -> Result<SweepPoint>
where
    S: Simulator + ?Sized,
{
    let started = Instant::now();
    let result = run_average_with_progress(simulator, &task.plan.config, task.plan.repeats, progress)
        .map_err(|e| grid_point_error(&task.coordinates, e))?;
    let elapsed = started.elapsed();

    info!(
        coordinates = ?task.coordinates,
        runs = result.runs(),
        batch_time = ?elapsed,
        "grid point finished"
    );

    Ok(SweepPoint {
        indices: task.indices,
        coordinates: task.coordinates,
        result,
        elapsed,
    })
}

#[cfg(feature = "parallel")]
fn evaluate_parallel<F>(tasks: Vec<PointTask>, evaluate: &F, workers: usize) -> Result<Vec<SweepPoint>>
where
    F: Fn(PointTask) -> Result<SweepPoint> + Sync,
{
    if workers == 0 {
        return Err(HarnessError::InvalidSweep(
            "parallel execution needs at least one worker".to_string(),
        ));
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| HarnessError::InvalidSweep(format!("cannot build worker pool: {e}")))?;

    let mut points = pool.install(|| {
        tasks
            .into_par_iter()
            .map(evaluate)
            .collect::<Result<Vec<_>>>()
    })?;

    // Completion order is irrelevant; keep grid order
    points.sort_by(|a, b| a.indices.cmp(&b.indices));
    Ok(points)
}

#[cfg(not(feature = "parallel"))]
fn evaluate_parallel<F>(tasks: Vec<PointTask>, evaluate: &F, workers: usize) -> Result<Vec<SweepPoint>>
where
    F: Fn(PointTask) -> Result<SweepPoint> + Sync,
{
    tracing::warn!(
        workers,
        "built without the `parallel` feature, running sweep sequentially"
    );
    tasks.into_iter().map(evaluate).collect()
}

fn grid_point_error(coordinates: &[f64], source: HarnessError) -> HarnessError {
    HarnessError::GridPoint {
        coordinates: coordinates.to_vec(),
        source: Box::new(source),
    }
}
