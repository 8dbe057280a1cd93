//! Scripted simulators for tests

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::SimulationConfig;
use crate::error::Result;
use crate::model::{MetricValue, MetricsRecord};
use crate::runner::Simulator;

/// Simulator backed by a closure receiving the configuration and a 0-based
/// call counter.
pub(super) struct FnSimulator<F> {
    f: F,
    calls: AtomicUsize,
}

impl<F> FnSimulator<F>
where
    F: Fn(&SimulationConfig, usize) -> Result<MetricsRecord> + Sync,
{
    pub(super) fn new(f: F) -> Self {
        Self {
            f,
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F> Simulator for FnSimulator<F>
where
    F: Fn(&SimulationConfig, usize) -> Result<MetricsRecord> + Sync,
{
    fn run(&self, config: &SimulationConfig) -> Result<MetricsRecord> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.f)(config, call)
    }
}

/// Reports the swept probabilities back as metrics, plus a two-cell flow vector
pub(super) fn echo_record(config: &SimulationConfig) -> MetricsRecord {
    let density = config.traffic_density.unwrap_or(0.0);
    let dilly_dally = config.dilly_dally_probability.unwrap_or(0.0);
    MetricsRecord::from_iter([
        ("traffic_density", MetricValue::Scalar(density)),
        ("dilly_dally_probability", MetricValue::Scalar(dilly_dally)),
        (
            "average_speed_kilometers_per_hour",
            MetricValue::Scalar(100.0 * (1.0 - dilly_dally)),
        ),
        (
            "monitor_cells_flow_cars_per_minute",
            MetricValue::Vector(vec![60.0 * density, 30.0 * density]),
        ),
    ])
}

pub(super) fn echo_simulator()
-> FnSimulator<impl Fn(&SimulationConfig, usize) -> Result<MetricsRecord> + Sync> {
    FnSimulator::new(|config: &SimulationConfig, _| Ok(echo_record(config)))
}
