//! Metrics types reported by a simulator run.
//!
//! A run's output is a [`MetricsRecord`]: an ordered mapping from field name to
//! a [`MetricValue`], which is either a scalar or a vector whose length depends
//! on the configuration (e.g. one flow value per monitored cell).
//!
//! Which fields a simulator prints depends on its revision, so decoding is
//! driven by a versioned [`MetricsSchema`] or, when none is given, by inferring
//! the kind of every numeric field.

mod record;
mod schema;
mod value;

pub use record::MetricsRecord;
pub use schema::{FieldKind, FieldSpec, MetricsSchema, decode_line};
pub use value::{MetricValue, Shape};
