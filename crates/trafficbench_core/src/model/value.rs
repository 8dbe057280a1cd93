use std::fmt;

use serde::{Deserialize, Serialize};

/// A single reported metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    /// Per-element values, e.g. flow per monitored cell
    Vector(Vec<f64>),
}

impl MetricValue {
    #[must_use]
    pub fn shape(&self) -> Shape {
        match self {
            MetricValue::Scalar(_) => Shape::Scalar,
            MetricValue::Vector(values) => Shape::Vector(values.len()),
        }
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar(value) => Some(*value),
            MetricValue::Vector(_) => None,
        }
    }

    #[must_use]
    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            MetricValue::Scalar(_) => None,
            MetricValue::Vector(values) => Some(values),
        }
    }

    /// Element-wise sum. Callers must have checked that shapes agree.
    pub(crate) fn add_assign(&mut self, other: &MetricValue) {
        match (self, other) {
            (MetricValue::Scalar(a), MetricValue::Scalar(b)) => *a += b,
            (MetricValue::Vector(a), MetricValue::Vector(b)) => {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
            }
            _ => unreachable!("shape checked before accumulation"),
        }
    }

    pub(crate) fn divide(&mut self, by: f64) {
        match self {
            MetricValue::Scalar(value) => *value /= by,
            MetricValue::Vector(values) => values.iter_mut().for_each(|v| *v /= by),
        }
    }
}

/// Shape of a field within a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// The field does not exist in the record
    Absent,
    Scalar,
    Vector(usize),
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Absent => write!(f, "absent"),
            Shape::Scalar => write!(f, "scalar"),
            Shape::Vector(len) => write!(f, "vector[{len}]"),
        }
    }
}
