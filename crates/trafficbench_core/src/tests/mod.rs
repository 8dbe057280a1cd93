//! Cross-module tests for the harness
//!
//! Tests are organized by topic:
//! - `support` - In-process fake simulators shared by the other modules
//! - `averaging` - Repeated runs under one configuration
//! - `sweep` - Grid iteration, parallel ordering, filtering and series extraction
//! - `process` - The subprocess runner against small shell scripts (unix only)

mod averaging;
mod support;
