//! Averaging repeated runs under one configuration.

use serde::Serialize;
use tracing::debug;

use crate::config::SimulationConfig;
use crate::error::{HarnessError, Result};
use crate::model::MetricsRecord;
use crate::progress::RunProgress;
use crate::runner::Simulator;

/// Running sum of metrics records.
///
/// The first pushed record seeds the sum; later ones are added into it.
/// `finish` consumes the accumulator, so the division by the run count
/// happens exactly once.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    sum: Option<MetricsRecord>,
    runs: usize,
}

impl Accumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one run. On `ShapeMismatch` the accumulator is unchanged.
    pub fn push(&mut self, record: MetricsRecord) -> Result<()> {
        match &mut self.sum {
            Some(sum) => sum.add(&record)?,
            None => self.sum = Some(record),
        }
        self.runs += 1;
        Ok(())
    }

    /// Combine with a partial sum accumulated elsewhere
    pub fn merge(&mut self, other: Accumulator) -> Result<()> {
        let Some(partial) = other.sum else {
            return Ok(());
        };
        match &mut self.sum {
            Some(sum) => sum.add(&partial)?,
            None => self.sum = Some(partial),
        }
        self.runs += other.runs;
        Ok(())
    }

    #[must_use]
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Divide the sum by the number of runs
    pub fn finish(self) -> Result<AggregateResult> {
        let Some(mut mean) = self.sum else {
            return Err(HarnessError::InvalidDivisor(0));
        };
        mean.divide_all(self.runs as i64)?;
        Ok(AggregateResult {
            mean,
            runs: self.runs,
        })
    }
}

/// Field-by-field mean of `runs` simulator runs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    mean: MetricsRecord,
    runs: usize,
}

impl AggregateResult {
    #[must_use]
    pub fn mean(&self) -> &MetricsRecord {
        &self.mean
    }

    #[must_use]
    pub fn runs(&self) -> usize {
        self.runs
    }

    #[must_use]
    pub fn into_record(self) -> MetricsRecord {
        self.mean
    }
}

/// Run `simulator` `repeats` times under `config` and average the results
pub fn run_average<S>(
    simulator: &S,
    config: &SimulationConfig,
    repeats: usize,
) -> Result<AggregateResult>
where
    S: Simulator + ?Sized,
{
    run_average_with_progress(simulator, config, repeats, None)
}

/// Like `run_average`, counting each finished run in `progress` and stopping
/// with `Cancelled` before the next run once it is cancelled.
pub fn run_average_with_progress<S>(
    simulator: &S,
    config: &SimulationConfig,
    repeats: usize,
    progress: Option<&RunProgress>,
) -> Result<AggregateResult>
where
    S: Simulator + ?Sized,
{
    if repeats == 0 {
        return Err(HarnessError::InvalidDivisor(0));
    }

    let mut acc = Accumulator::new();
    for repeat in 1..=repeats {
        let outcome = if progress.is_some_and(RunProgress::is_cancelled) {
            Err(HarnessError::Cancelled)
        } else {
            simulator.run(config).and_then(|record| acc.push(record))
        };

        if let Err(source) = outcome {
            return Err(HarnessError::Repeat {
                repeat,
                repeats,
                config: config.command_line(),
                source: Box::new(source),
            });
        }

        if let Some(p) = progress {
            p.increment();
        }
        debug!(repeat, repeats, "repeat finished");
    }

    acc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MetricValue;

    fn record(speed: f64, flows: &[f64]) -> MetricsRecord {
        MetricsRecord::from_iter([
            ("average_speed", MetricValue::Scalar(speed)),
            ("flows", MetricValue::Vector(flows.to_vec())),
        ])
    }

    #[test]
    fn test_accumulator_mean() {
        let mut acc = Accumulator::new();
        acc.push(record(10.0, &[1.0, 2.0])).unwrap();
        acc.push(record(20.0, &[3.0, 4.0])).unwrap();
        acc.push(record(30.0, &[5.0, 6.0])).unwrap();

        let result = acc.finish().unwrap();
        assert_eq!(result.runs(), 3);
        assert_eq!(result.mean().scalar("average_speed"), Some(20.0));
        assert_eq!(result.mean().vector("flows"), Some(&[3.0, 4.0][..]));
    }

    #[test]
    fn test_mismatch_leaves_accumulator_unchanged() {
        let mut acc = Accumulator::new();
        acc.push(record(10.0, &[1.0, 2.0])).unwrap();

        let err = acc.push(record(20.0, &[3.0])).unwrap_err();
        assert!(matches!(err, HarnessError::ShapeMismatch { .. }));
        assert_eq!(acc.runs(), 1);

        let result = acc.finish().unwrap();
        assert_eq!(result.mean(), &record(10.0, &[1.0, 2.0]));
    }

    #[test]
    fn test_empty_accumulator_cannot_finish() {
        assert!(matches!(
            Accumulator::new().finish(),
            Err(HarnessError::InvalidDivisor(0))
        ));
    }

    #[test]
    fn test_merge_partial_sums() {
        let mut left = Accumulator::new();
        left.push(record(10.0, &[1.0])).unwrap();
        left.push(record(20.0, &[2.0])).unwrap();

        let mut right = Accumulator::new();
        right.push(record(60.0, &[9.0])).unwrap();

        left.merge(right).unwrap();
        left.merge(Accumulator::new()).unwrap();

        let result = left.finish().unwrap();
        assert_eq!(result.runs(), 3);
        assert_eq!(result.mean().scalar("average_speed"), Some(30.0));
        assert_eq!(result.mean().vector("flows"), Some(&[4.0][..]));

        let mut empty = Accumulator::new();
        let mut seeded = Accumulator::new();
        seeded.push(record(5.0, &[1.0])).unwrap();
        empty.merge(seeded).unwrap();
        assert_eq!(empty.runs(), 1);
    }
}
