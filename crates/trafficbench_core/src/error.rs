//! Error taxonomy for the harness.

use std::time::Duration;

use thiserror::Error;

use crate::model::Shape;

/// Errors raised while running, decoding, averaging or sweeping simulations.
///
/// Nothing here is recovered internally: a failing repeat aborts its grid
/// point, and a failing grid point aborts the sweep.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The simulator could not be spawned or exited with a non-zero status
    #[error("simulator `{program}` failed: {detail}")]
    ProcessFailure { program: String, detail: String },

    /// The final output line is missing or does not match the expected fields
    #[error("cannot decode simulator output ({reason}): {line:?}")]
    ParseFailure { reason: String, line: String },

    /// Two records disagree on a field's presence or vector length
    #[error("metric `{field}` has shape {found}, expected {expected}")]
    ShapeMismatch {
        field: String,
        expected: Shape,
        found: Shape,
    },

    /// An average was requested over a non-positive number of runs
    #[error("cannot average over {0} runs")]
    InvalidDivisor(i64),

    /// The simulator did not finish within the configured timeout
    #[error("simulator `{program}` did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    /// The run was cancelled before it completed
    #[error("run cancelled")]
    Cancelled,

    /// Sweep axes, parameters or worker pool are misconfigured
    #[error("invalid sweep: {0}")]
    InvalidSweep(String),

    /// A series selector names a metric the results do not have
    #[error("unknown metric `{selector}`: {reason}")]
    UnknownMetric { selector: String, reason: String },

    #[error("repeat {repeat} of {repeats} failed for `{config}`")]
    Repeat {
        repeat: usize,
        repeats: usize,
        config: String,
        #[source]
        source: Box<HarnessError>,
    },

    #[error("grid point {coordinates:?} failed")]
    GridPoint {
        coordinates: Vec<f64>,
        #[source]
        source: Box<HarnessError>,
    },
}

impl HarnessError {
    /// The underlying error with `Repeat`/`GridPoint` context stripped.
    #[must_use]
    pub fn root(&self) -> &HarnessError {
        match self {
            HarnessError::Repeat { source, .. } | HarnessError::GridPoint { source, .. } => {
                source.root()
            }
            other => other,
        }
    }

    /// Whether this error (under any context) is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), HarnessError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
