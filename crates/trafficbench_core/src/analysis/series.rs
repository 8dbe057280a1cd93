//! Flattening sweep results into index-aligned columns.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{HarnessError, Result};
use crate::model::MetricValue;

use super::{SweepPoint, SweepResults};

/// Which value to extract from each sweep point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricSelector {
    /// A scalar field of the mean record
    Field(String),
    /// One element of a vector field
    Element { field: String, index: usize },
    /// Wall-clock seconds spent on the point (`@batch_time`)
    BatchTime,
    /// Number of averaged runs (`@runs`)
    Runs,
}

impl MetricSelector {
    /// Resolve this selector against one evaluated point
    pub fn value(&self, point: &SweepPoint) -> Result<f64> {
        let mean = point.result.mean();
        match self {
            Self::BatchTime => Ok(point.elapsed.as_secs_f64()),
            Self::Runs => Ok(point.result.runs() as f64),
            Self::Field(field) => match mean.get(field) {
                Some(MetricValue::Scalar(value)) => Ok(*value),
                Some(MetricValue::Vector(values)) => Err(self.unknown(format!(
                    "is a vector of length {}, select an element as `{field}[i]`",
                    values.len()
                ))),
                None => Err(self.unknown("not present in the results".to_string())),
            },
            Self::Element { field, index } => match mean.get(field) {
                Some(MetricValue::Vector(values)) => values.get(*index).copied().ok_or_else(|| {
                    self.unknown(format!("index out of range for length {}", values.len()))
                }),
                Some(MetricValue::Scalar(_)) => Err(self.unknown("is a scalar".to_string())),
                None => Err(self.unknown("not present in the results".to_string())),
            },
        }
    }

    fn unknown(&self, reason: String) -> HarnessError {
        HarnessError::UnknownMetric {
            selector: self.to_string(),
            reason,
        }
    }
}

impl FromStr for MetricSelector {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let unknown = |reason: &str| HarnessError::UnknownMetric {
            selector: s.to_string(),
            reason: reason.to_string(),
        };

        if let Some(special) = s.strip_prefix('@') {
            return match special {
                "batch_time" => Ok(Self::BatchTime),
                "runs" => Ok(Self::Runs),
                _ => Err(unknown("expected `@batch_time` or `@runs`")),
            };
        }

        if let Some(body) = s.strip_suffix(']') {
            let (field, index) = body
                .split_once('[')
                .ok_or_else(|| unknown("unbalanced brackets"))?;
            let index = index
                .trim()
                .parse()
                .map_err(|_| unknown("element index must be a non-negative integer"))?;
            if field.is_empty() {
                return Err(unknown("empty field name"));
            }
            return Ok(Self::Element {
                field: field.to_string(),
                index,
            });
        }

        if s.is_empty() || s.contains(['[', ']']) {
            return Err(unknown("not a field name"));
        }
        Ok(Self::Field(s.to_string()))
    }
}

impl fmt::Display for MetricSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(field) => f.write_str(field),
            Self::Element { field, index } => write!(f, "{field}[{index}]"),
            Self::BatchTime => f.write_str("@batch_time"),
            Self::Runs => f.write_str("@runs"),
        }
    }
}

/// One labelled column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub label: String,
    pub values: Vec<f64>,
}

/// Index-aligned columns: one per axis, then one per selected metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSet {
    pub axes: Vec<Series>,
    pub metrics: Vec<Series>,
}

impl SeriesSet {
    /// Number of rows (kept points)
    pub fn len(&self) -> usize {
        self.axes.first().map_or(0, |series| series.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All columns, axes first
    pub fn columns(&self) -> impl Iterator<Item = &Series> {
        self.axes.iter().chain(&self.metrics)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.columns().map(|series| series.label.as_str())
    }

    /// Find a column by label
    pub fn column(&self, label: &str) -> Option<&[f64]> {
        self.columns()
            .find(|series| series.label == label)
            .map(|series| series.values.as_slice())
    }

    /// Row `i` across all columns
    pub fn row(&self, i: usize) -> Option<Vec<f64>> {
        self.columns()
            .map(|series| series.values.get(i).copied())
            .collect()
    }
}

impl SweepResults {
    /// Extract one column per axis and per selector over the kept points
    pub fn series(&self, selectors: &[MetricSelector]) -> Result<SeriesSet> {
        let axes = self
            .labels
            .iter()
            .enumerate()
            .map(|(dim, label)| Series {
                label: label.clone(),
                values: self
                    .points
                    .iter()
                    .map(|point| point.coordinates[dim])
                    .collect(),
            })
            .collect();

        let metrics = selectors
            .iter()
            .map(|selector| {
                Ok(Series {
                    label: selector.to_string(),
                    values: self
                        .points
                        .iter()
                        .map(|point| selector.value(point))
                        .collect::<Result<_>>()?,
                })
            })
            .collect::<Result<_>>()?;

        Ok(SeriesSet { axes, metrics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selectors() {
        assert_eq!(
            "average_speed".parse::<MetricSelector>().unwrap(),
            MetricSelector::Field("average_speed".to_string())
        );
        assert_eq!(
            "flows[2]".parse::<MetricSelector>().unwrap(),
            MetricSelector::Element {
                field: "flows".to_string(),
                index: 2
            }
        );
        assert_eq!(
            " @batch_time ".parse::<MetricSelector>().unwrap(),
            MetricSelector::BatchTime
        );
        assert_eq!("@runs".parse::<MetricSelector>().unwrap(), MetricSelector::Runs);

        for bad in ["", "@speed", "flows[x]", "flows[-1]", "[0]", "flows]", "a[b"] {
            assert!(
                matches!(
                    bad.parse::<MetricSelector>(),
                    Err(HarnessError::UnknownMetric { .. })
                ),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_selector_display_round_trips() {
        for text in ["flow", "flows[3]", "@batch_time", "@runs"] {
            assert_eq!(text.parse::<MetricSelector>().unwrap().to_string(), text);
        }
    }
}
