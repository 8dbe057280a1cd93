//! Tests for averaging repeated runs
//!
//! These tests verify:
//! - A single-run average equals the run itself
//! - Averaging is linear in the inputs
//! - Failures carry repeat and configuration context
//! - Progress counting and cancellation between repeats

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::aggregate::{run_average, run_average_with_progress};
use crate::config::{SimulationConfig, VehicleClass};
use crate::error::HarnessError;
use crate::model::{MetricValue, MetricsRecord};
use crate::progress::RunProgress;
use crate::runner::Simulator;

use super::support::{FnSimulator, echo_record, echo_simulator};

fn sample_config() -> SimulationConfig {
    SimulationConfig {
        rounds: Some(4096),
        traffic_density: Some(0.3),
        dilly_dally_probability: Some(0.2),
        vehicles: Some(vec![VehicleClass::new(5, 80, 0.5)]),
        ..Default::default()
    }
}

fn random_record(rng: &mut SmallRng) -> MetricsRecord {
    MetricsRecord::from_iter([
        ("runtime", MetricValue::Scalar(rng.random_range(0.0..2.0))),
        (
            "average_speed",
            MetricValue::Scalar(rng.random_range(0.0..130.0)),
        ),
        (
            "flows",
            MetricValue::Vector((0..4).map(|_| rng.random_range(0.0..60.0)).collect()),
        ),
    ])
}

fn scaled(record: &MetricsRecord, k: f64) -> MetricsRecord {
    record
        .iter()
        .map(|(name, value)| {
            let value = match value {
                MetricValue::Scalar(v) => MetricValue::Scalar(v * k),
                MetricValue::Vector(vs) => MetricValue::Vector(vs.iter().map(|v| v * k).collect()),
            };
            (name.to_string(), value)
        })
        .collect()
}

#[test]
fn test_average_of_one_run_equals_the_run() {
    let simulator = echo_simulator();
    let config = sample_config();

    let single = simulator.run(&config).unwrap();
    let average = run_average(&simulator, &config, 1).unwrap();

    assert_eq!(average.runs(), 1);
    assert_eq!(average.mean(), &single);
}

#[test]
fn test_average_is_linear() {
    let mut rng = SmallRng::seed_from_u64(42);
    let runs: Vec<MetricsRecord> = (0..7).map(|_| random_record(&mut rng)).collect();
    let k = 3.5;

    let plain = FnSimulator::new(|_: &SimulationConfig, call| Ok(runs[call].clone()));
    let scaled_sim = FnSimulator::new(|_: &SimulationConfig, call| Ok(scaled(&runs[call], k)));

    let config = sample_config();
    let mean = run_average(&plain, &config, runs.len()).unwrap();
    let scaled_mean = run_average(&scaled_sim, &config, runs.len()).unwrap();

    for (name, value) in mean.mean().iter() {
        match (value, scaled_mean.mean().get(name).unwrap()) {
            (MetricValue::Scalar(a), MetricValue::Scalar(b)) => {
                assert!((a * k - b).abs() < 1e-9, "{name}: {a} * {k} != {b}");
            }
            (MetricValue::Vector(a), MetricValue::Vector(b)) => {
                for (a, b) in a.iter().zip(b) {
                    assert!((a * k - b).abs() < 1e-9, "{name}: {a} * {k} != {b}");
                }
            }
            other => panic!("shape changed for {name}: {other:?}"),
        }
    }
}

#[test]
fn test_average_runs_identical_config_n_times() {
    let simulator = FnSimulator::new(|config: &SimulationConfig, call| {
        assert_eq!(config, &sample_config());
        Ok(MetricsRecord::from_iter([(
            "call",
            MetricValue::Scalar(call as f64),
        )]))
    });

    let result = run_average(&simulator, &sample_config(), 4).unwrap();
    assert_eq!(simulator.calls(), 4);
    assert_eq!(result.mean().scalar("call"), Some(1.5));
}

#[test]
fn test_zero_repeats_is_invalid() {
    let simulator = echo_simulator();
    assert!(matches!(
        run_average(&simulator, &sample_config(), 0),
        Err(HarnessError::InvalidDivisor(0))
    ));
    assert_eq!(simulator.calls(), 0);
}

#[test]
fn test_failure_carries_repeat_context() {
    let simulator = FnSimulator::new(|config: &SimulationConfig, call| {
        if call == 2 {
            Err(HarnessError::ParseFailure {
                reason: "no output".to_string(),
                line: String::new(),
            })
        } else {
            Ok(echo_record(config))
        }
    });

    let err = run_average(&simulator, &sample_config(), 5).unwrap_err();
    match &err {
        HarnessError::Repeat {
            repeat,
            repeats,
            config,
            ..
        } => {
            assert_eq!((*repeat, *repeats), (3, 5));
            assert!(config.contains("--dilly-dally-probability 0.2"), "{config}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(err.root(), HarnessError::ParseFailure { .. }));
    // No retry after the failure
    assert_eq!(simulator.calls(), 3);
}

#[test]
fn test_shape_change_between_runs_fails() {
    let simulator = FnSimulator::new(|_: &SimulationConfig, call| {
        Ok(MetricsRecord::from_iter([(
            "flows",
            MetricValue::Vector(vec![1.0; 2 + call]),
        )]))
    });

    let err = run_average(&simulator, &sample_config(), 3).unwrap_err();
    assert!(matches!(err.root(), HarnessError::ShapeMismatch { .. }));
}

#[test]
fn test_progress_counts_runs() {
    let simulator = echo_simulator();
    let progress = RunProgress::new(6);

    run_average_with_progress(&simulator, &sample_config(), 6, Some(&progress)).unwrap();
    assert_eq!(progress.completed(), 6);
}

#[test]
fn test_cancellation_stops_before_next_repeat() {
    let progress = RunProgress::new(10);
    let simulator = FnSimulator::new(|config: &SimulationConfig, call| {
        if call == 1 {
            progress.cancel();
        }
        Ok(echo_record(config))
    });

    let err =
        run_average_with_progress(&simulator, &sample_config(), 10, Some(&progress)).unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(simulator.calls(), 2);
    assert_eq!(progress.completed(), 2);
}
