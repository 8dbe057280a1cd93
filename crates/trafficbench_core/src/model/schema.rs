//! Versioned output schemas and decoding of the simulator's result line.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{MetricValue, MetricsRecord};
use crate::error::{HarnessError, Result};

/// Expected kind of an output field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Scalar,
    Vector,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Scalar => "scalar",
            FieldKind::Vector => "vector",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar,
        }
    }

    pub fn vector(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Vector,
        }
    }
}

/// The fields a particular simulator revision prints.
///
/// Revisions rename equivalent concepts, so no schema is treated as the
/// canonical one. Extra fields in the output are ignored; missing or
/// mistyped fields are a `ParseFailure`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSchema {
    pub revision: String,
    pub fields: Vec<FieldSpec>,
}

impl MetricsSchema {
    pub fn new(revision: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            revision: revision.into(),
            fields,
        }
    }

    /// Single-lane revision reporting flow at the exit cell
    #[must_use]
    pub fn exit_flow() -> Self {
        Self::new(
            "exit-flow",
            vec![
                FieldSpec::scalar("rounds"),
                FieldSpec::scalar("max_speed"),
                FieldSpec::scalar("dilly_dally_probability"),
                FieldSpec::scalar("place_car_probability"),
                FieldSpec::scalar("spawn_car_at_entrance_probability"),
                FieldSpec::scalar("remove_car_on_exit_probability"),
                FieldSpec::scalar("runtime"),
                FieldSpec::scalar("average_speed__kilometers_per_hour"),
                FieldSpec::scalar("exit_cell_flow__cars_per_minute"),
                FieldSpec::scalar("accelerations"),
                FieldSpec::scalar("deaccelerations"),
            ],
        )
    }

    /// Multi-lane revision reporting one flow value per monitored cell
    #[must_use]
    pub fn monitored_cells() -> Self {
        Self::new(
            "monitored-cells",
            vec![
                FieldSpec::scalar("rounds"),
                FieldSpec::scalar("lanes"),
                FieldSpec::scalar("length"),
                FieldSpec::scalar("dilly_dally_probability"),
                FieldSpec::scalar("stay_in_lane_probability"),
                FieldSpec::scalar("runtime"),
                FieldSpec::scalar("average_speed_kilometers_per_hour"),
                FieldSpec::vector("monitor_cells_flow_cars_per_minute"),
                FieldSpec::scalar("average_accelerations_n_per_car_per_round"),
                FieldSpec::scalar("average_deaccelerations_n_per_car_per_round"),
            ],
        )
    }

    /// All built-in revisions
    #[must_use]
    pub fn builtin() -> Vec<Self> {
        vec![Self::exit_flow(), Self::monitored_cells()]
    }

    /// Look up a built-in revision by name
    #[must_use]
    pub fn by_revision(revision: &str) -> Option<Self> {
        Self::builtin().into_iter().find(|s| s.revision == revision)
    }

    /// Decode a result line into a record holding exactly this schema's fields
    pub fn decode(&self, line: &str) -> Result<MetricsRecord> {
        let object = parse_object(line)?;
        let mut record = MetricsRecord::new();

        for field in &self.fields {
            let raw = object
                .get(&field.name)
                .ok_or_else(|| parse_failure(line, format!("missing field `{}`", field.name)))?;
            let value = match (field.kind, metric_value(raw)) {
                (FieldKind::Scalar, Some(value @ MetricValue::Scalar(_)))
                | (FieldKind::Vector, Some(value @ MetricValue::Vector(_))) => value,
                (kind, _) => {
                    return Err(parse_failure(
                        line,
                        format!("field `{}` is not a {}", field.name, kind.as_str()),
                    ));
                }
            };
            record.insert(field.name.clone(), value);
        }

        Ok(record)
    }
}

/// Decode a result line with `schema`, or infer every numeric field when no
/// schema is given.
pub fn decode_line(line: &str, schema: Option<&MetricsSchema>) -> Result<MetricsRecord> {
    match schema {
        Some(schema) => schema.decode(line),
        None => decode_inferred(line),
    }
}

fn decode_inferred(line: &str) -> Result<MetricsRecord> {
    let object = parse_object(line)?;
    let mut record = MetricsRecord::new();

    for (name, raw) in &object {
        match metric_value(raw) {
            Some(value) => record.insert(name.clone(), value),
            None => tracing::trace!(field = %name, "skipping non-numeric output field"),
        }
    }

    if record.is_empty() {
        return Err(parse_failure(line, "no numeric fields".to_string()));
    }
    Ok(record)
}

fn parse_object(line: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(parse_failure(line, "not a JSON object".to_string())),
        Err(e) => Err(parse_failure(line, e.to_string())),
    }
}

/// Numbers become scalars, arrays of numbers become vectors
fn metric_value(raw: &Value) -> Option<MetricValue> {
    match raw {
        Value::Number(n) => n.as_f64().map(MetricValue::Scalar),
        Value::Array(items) => items
            .iter()
            .map(Value::as_f64)
            .collect::<Option<Vec<f64>>>()
            .map(MetricValue::Vector),
        _ => None,
    }
}

fn parse_failure(line: &str, reason: String) -> HarnessError {
    HarnessError::ParseFailure {
        reason,
        line: line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXIT_FLOW_LINE: &str = r#"{"rounds":4096,"max_speed":5,"dilly_dally_probability":0.5,"place_car_probability":0.5,"spawn_car_at_entrance_probability":0.5,"remove_car_on_exit_probability":0.5,"runtime":0.12,"average_speed__kilometers_per_hour":41.3,"exit_cell_flow__cars_per_minute":18.0,"accelerations":1200,"deaccelerations":1100}"#;

    #[test]
    fn test_decode_builtin_exit_flow() {
        let record = MetricsSchema::exit_flow().decode(EXIT_FLOW_LINE).unwrap();
        assert_eq!(record.len(), 11);
        assert_eq!(record.scalar("rounds"), Some(4096.0));
        assert_eq!(record.scalar("exit_cell_flow__cars_per_minute"), Some(18.0));
        assert_eq!(record.names().next(), Some("rounds"));
    }

    #[test]
    fn test_decode_vector_field() {
        let schema = MetricsSchema::new(
            "test",
            vec![
                FieldSpec::scalar("average_speed_kilometers_per_hour"),
                FieldSpec::vector("monitor_cells_flow_cars_per_minute"),
            ],
        );
        let line = r#"{"average_speed_kilometers_per_hour":50.5,"monitor_cells_flow_cars_per_minute":[30,31.5,29],"extra":"ignored"}"#;
        let record = schema.decode(line).unwrap();
        assert_eq!(
            record.vector("monitor_cells_flow_cars_per_minute"),
            Some(&[30.0, 31.5, 29.0][..])
        );
        assert_eq!(record.get("extra"), None);
    }

    #[test]
    fn test_decode_missing_field_fails() {
        let err = MetricsSchema::monitored_cells()
            .decode(EXIT_FLOW_LINE)
            .unwrap_err();
        match err {
            HarnessError::ParseFailure { reason, .. } => {
                assert!(reason.contains("missing field `lanes`"), "{reason}")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_wrong_kind_fails() {
        let schema = MetricsSchema::new("test", vec![FieldSpec::vector("flow")]);
        assert!(matches!(
            schema.decode(r#"{"flow": 3}"#),
            Err(HarnessError::ParseFailure { .. })
        ));

        let schema = MetricsSchema::new("test", vec![FieldSpec::scalar("flow")]);
        assert!(matches!(
            schema.decode(r#"{"flow": [1, "x"]}"#),
            Err(HarnessError::ParseFailure { .. })
        ));

        let schema = MetricsSchema::new("test", vec![FieldSpec::vector("Exit_Flow")]);
        match schema.decode(r#"{"Exit_Flow": 3}"#) {
            Err(HarnessError::ParseFailure { reason, .. }) => {
                assert_eq!(reason, "field `Exit_Flow` is not a vector")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_decode_inferred() {
        let record = decode_line(
            r#"{"speed": 3.5, "flows": [1, 2], "label": "x", "verbose": false}"#,
            None,
        )
        .unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record.scalar("speed"), Some(3.5));
        assert_eq!(record.vector("flows"), Some(&[1.0, 2.0][..]));
    }

    #[test]
    fn test_decode_rejects_non_objects() {
        for line in ["", "not json", "[1, 2]", "42", r#"{"label": "x"}"#] {
            assert!(
                matches!(
                    decode_line(line, None),
                    Err(HarnessError::ParseFailure { .. })
                ),
                "accepted {line:?}"
            );
        }
    }

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(
            MetricsSchema::by_revision("monitored-cells"),
            Some(MetricsSchema::monitored_cells())
        );
        assert!(MetricsSchema::by_revision("unknown").is_none());
        assert_eq!(MetricsSchema::builtin().len(), 2);
    }
}
