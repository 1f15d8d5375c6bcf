//! Operator-facing report for a field no candidate format could handle.
//!
//! The rendered text is what lands in pipeline logs, so it carries enough to
//! fix the source without rerunning: every candidate tried with its success
//! count, the size of the sample, and a handful of the values that failed.

use std::fmt;

use serde::Serialize;

use crate::schema::FieldType;

/// Failing values quoted in the report.
pub const MAX_REPORTED_FAILURES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriedCandidate {
    pub format: String,
    pub successes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CasterNotFound {
    pub field: String,
    pub field_type: FieldType,
    /// Candidates in ranking order.
    pub tried: Vec<TriedCandidate>,
    /// Non-empty raw values in the sample.
    pub sample_size: usize,
    /// Up to [`MAX_REPORTED_FAILURES`] values, in sample order.
    pub failing_values: Vec<String>,
    pub failures: usize,
    pub max_allowed_failures: usize,
}

impl CasterNotFound {
    /// Keeps only the first [`MAX_REPORTED_FAILURES`] failing values.
    pub fn new(
        field: impl Into<String>,
        field_type: FieldType,
        tried: Vec<TriedCandidate>,
        sample_size: usize,
        failing_values: impl IntoIterator<Item = String>,
        failures: usize,
        max_allowed_failures: usize,
    ) -> Self {
        Self {
            field: field.into(),
            field_type,
            tried,
            sample_size,
            failing_values: failing_values
                .into_iter()
                .take(MAX_REPORTED_FAILURES)
                .collect(),
            failures,
            max_allowed_failures,
        }
    }
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|err| format!("<unprintable: {err}>"))
}

impl fmt::Display for CasterNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Could not find a parser for {}", self.field)?;
        writeln!(f, "Tried")?;
        writeln!(f, "{} on {} rows", pretty(&self.tried), self.sample_size)?;
        writeln!(f, "Sample values =")?;
        writeln!(f, "{}", pretty(&self.failing_values))?;
        write!(
            f,
            "Failed {} times (maximum allowed = {})",
            self.failures, self.max_allowed_failures
        )
    }
}

impl std::error::Error for CasterNotFound {}
