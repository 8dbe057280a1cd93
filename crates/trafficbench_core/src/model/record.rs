use rustc_hash::FxHashMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::{MetricValue, Shape};
use crate::error::{HarnessError, Result};

/// Metrics reported by one simulator run.
///
/// Fields keep the order in which they were inserted, which is the schema order
/// for decoded records. Two records can only be combined when they agree on
/// every field's shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsRecord {
    names: Vec<String>,
    values: FxHashMap<String, MetricValue>,
}

impl MetricsRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, value: MetricValue) {
        let name = name.into();
        if !self.values.contains_key(&name) {
            self.names.push(name.clone());
        }
        self.values.insert(name, value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.values.get(name)
    }

    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(MetricValue::as_scalar)
    }

    #[must_use]
    pub fn vector(&self, name: &str) -> Option<&[f64]> {
        self.get(name).and_then(MetricValue::as_vector)
    }

    #[must_use]
    pub fn shape(&self, name: &str) -> Shape {
        self.get(name).map_or(Shape::Absent, MetricValue::shape)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Field names in record order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Iterate over `(name, value)` pairs in record order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.names
            .iter()
            .filter_map(|name| self.values.get(name).map(|value| (name.as_str(), value)))
    }

    /// Add `other` into this record field by field.
    ///
    /// Scalars sum; vectors sum element-wise. Fails with `ShapeMismatch` if a
    /// field is missing on either side or the shapes differ, in which case
    /// `self` is left unchanged.
    pub fn add(&mut self, other: &MetricsRecord) -> Result<()> {
        self.check_compatible(other)?;
        for (name, value) in &mut self.values {
            if let Some(addend) = other.values.get(name) {
                value.add_assign(addend);
            }
        }
        Ok(())
    }

    /// Divide every scalar and every vector element by `n`.
    ///
    /// `n` must be at least 1.
    pub fn divide_all(&mut self, n: i64) -> Result<()> {
        if n < 1 {
            return Err(HarnessError::InvalidDivisor(n));
        }
        let by = n as f64;
        for value in self.values.values_mut() {
            value.divide(by);
        }
        Ok(())
    }

    fn check_compatible(&self, other: &MetricsRecord) -> Result<()> {
        for name in &self.names {
            let expected = self.shape(name);
            let found = other.shape(name);
            if expected != found {
                return Err(HarnessError::ShapeMismatch {
                    field: name.clone(),
                    expected,
                    found,
                });
            }
        }
        if let Some(extra) = other.names.iter().find(|n| !self.values.contains_key(*n)) {
            return Err(HarnessError::ShapeMismatch {
                field: extra.clone(),
                expected: Shape::Absent,
                found: other.shape(extra),
            });
        }
        Ok(())
    }
}

impl<K: Into<String>> FromIterator<(K, MetricValue)> for MetricsRecord {
    fn from_iter<I: IntoIterator<Item = (K, MetricValue)>>(iter: I) -> Self {
        let mut record = MetricsRecord::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

impl Serialize for MetricsRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
