//! Per-field format sniffing.
//!
//! A [`Sniffer`] is calibrated once from a column sample: every candidate is
//! tried against every raw value, candidates are ranked by how many values
//! they cast, and the ranked list becomes the order used to cast every row of
//! the resource afterwards. Calibration is a fold over the sample producing an
//! immutable [`Calibration`]; a sniffer never changes after construction.

use std::{cmp::Reverse, collections::HashSet};

use itertools::Itertools;
use log::{debug, info};

use crate::{
    config::SnifferConfig,
    data::{CastOptions, Value, cast_date, cast_number, post_cast_check},
    diagnostics::{CasterNotFound, TriedCandidate},
    error::{CastError, Result},
    formats::{Candidate, date_candidates, number_candidates},
    schema::{Field, FieldType},
};

/// Which family of candidates a field is sniffed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnifferKind {
    Date,
    Number,
}

impl SnifferKind {
    /// `None` for string fields, whose values pass through untouched.
    pub fn for_field(field: &Field) -> Option<Self> {
        match field.field_type {
            FieldType::Date => Some(SnifferKind::Date),
            FieldType::Number => Some(SnifferKind::Number),
            FieldType::String => None,
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            SnifferKind::Date => FieldType::Date,
            SnifferKind::Number => FieldType::Number,
        }
    }

    /// The full catalog for this kind, in tie-break order.
    pub fn catalog(&self) -> Vec<Candidate> {
        match self {
            SnifferKind::Date => date_candidates(),
            SnifferKind::Number => number_candidates(),
        }
    }

    fn is_target(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (SnifferKind::Date, Value::Date(_)) | (SnifferKind::Number, Value::Number(_))
        )
    }
}

/// Casts `raw` with one candidate, including the candidate's post-cast checks.
pub fn try_candidate(
    candidate: &Candidate,
    raw: &str,
    options: &CastOptions,
) -> std::result::Result<Value, CastError> {
    match candidate {
        Candidate::Date(format) => cast_date(raw, format).map(Value::Date),
        Candidate::Number(format) => {
            let number = cast_number(raw, format, &options.currency)?;
            post_cast_check(raw.trim(), &number, options.max_fraction_digits)?;
            Ok(Value::Number(number))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateScore {
    pub candidate: Candidate,
    pub successes: usize,
}

/// Outcome of calibrating one field against its sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    ranked: Vec<CandidateScore>,
    sample_size: usize,
    empty_count: usize,
    typed_count: usize,
    failures: usize,
    failing_values: Vec<String>,
    max_allowed_failures: usize,
}

#[derive(Debug)]
struct Tally {
    successes: Vec<usize>,
    sample_size: usize,
    empty_count: usize,
    typed_count: usize,
    failures: usize,
    failing_values: Vec<String>,
}

impl Tally {
    fn new(candidates: usize) -> Self {
        Self {
            successes: vec![0; candidates],
            sample_size: 0,
            empty_count: 0,
            typed_count: 0,
            failures: 0,
            failing_values: Vec::new(),
        }
    }

    fn fail(mut self, value: String) -> Self {
        self.failures += 1;
        self.failing_values.push(value);
        self
    }
}

impl Calibration {
    fn run<'a, I>(
        kind: SnifferKind,
        candidates: &[Candidate],
        column: I,
        options: &CastOptions,
        config: &SnifferConfig,
    ) -> Self
    where
        I: IntoIterator<Item = Option<&'a Value>>,
    {
        let tally = column
            .into_iter()
            .fold(Tally::new(candidates.len()), |mut tally, cell| match cell {
                None => {
                    tally.empty_count += 1;
                    tally
                }
                Some(value) if value.is_blank() => {
                    tally.empty_count += 1;
                    tally
                }
                Some(value) if kind.is_target(value) => {
                    tally.typed_count += 1;
                    tally
                }
                Some(Value::String(raw)) => {
                    tally.sample_size += 1;
                    let mut matched = false;
                    for (slot, candidate) in tally.successes.iter_mut().zip(candidates) {
                        if try_candidate(candidate, raw, options).is_ok() {
                            *slot += 1;
                            matched = true;
                        }
                    }
                    if matched { tally } else { tally.fail(raw.clone()) }
                }
                Some(other) => {
                    tally.sample_size += 1;
                    tally.fail(other.as_display())
                }
            });

        let ranked = candidates
            .iter()
            .cloned()
            .zip(tally.successes)
            .map(|(candidate, successes)| CandidateScore {
                candidate,
                successes,
            })
            .sorted_by_key(|score| Reverse(score.successes))
            .collect();

        Calibration {
            ranked,
            sample_size: tally.sample_size,
            empty_count: tally.empty_count,
            typed_count: tally.typed_count,
            failures: tally.failures,
            failing_values: tally.failing_values,
            max_allowed_failures: config.tolerance.max_allowed_failures(tally.sample_size),
        }
    }

    /// Candidates by success count descending, ties in catalog order.
    pub fn ranked(&self) -> &[CandidateScore] {
        &self.ranked
    }

    /// The top-ranked candidate, if any candidate cast a sample value.
    pub fn best(&self) -> Option<&CandidateScore> {
        self.ranked.first().filter(|score| score.successes > 0)
    }

    /// Raw, non-empty values that were tried.
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn empty_count(&self) -> usize {
        self.empty_count
    }

    /// Values that already had the target type.
    pub fn typed_count(&self) -> usize {
        self.typed_count
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn failing_values(&self) -> &[String] {
        &self.failing_values
    }

    pub fn max_allowed_failures(&self) -> usize {
        self.max_allowed_failures
    }

    pub fn is_acceptable(&self) -> bool {
        self.failures <= self.max_allowed_failures
    }

    fn report(&self, field: &str, field_type: FieldType) -> CasterNotFound {
        let tried = self
            .ranked
            .iter()
            .map(|score| TriedCandidate {
                format: score.candidate.to_string(),
                successes: score.successes,
            })
            .collect();
        CasterNotFound::new(
            field,
            field_type,
            tried,
            self.sample_size,
            self.failing_values.iter().cloned(),
            self.failures,
            self.max_allowed_failures,
        )
    }
}

#[derive(Debug, Clone)]
pub struct Sniffer {
    field: String,
    kind: SnifferKind,
    options: CastOptions,
    calibration: Calibration,
    resolution: Vec<Candidate>,
    tolerated: HashSet<String>,
}

impl Sniffer {
    /// Builds the sniffer for a schema field, honoring its format hints.
    ///
    /// Returns `Ok(None)` for string fields.
    pub fn from_field<'a, I>(field: &Field, column: I, config: &SnifferConfig) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = Option<&'a Value>>,
    {
        let Some(kind) = SnifferKind::for_field(field) else {
            return Ok(None);
        };
        let candidates = match field.hinted_candidates()? {
            Some(hinted) => {
                debug!("Field '{}' restricted to {} hinted format(s)", field.name, hinted.len());
                hinted
            }
            None => kind.catalog(),
        };
        let options = field.cast_options(config.currency.as_deref(), config.max_fraction_digits);
        Self::calibrate(&field.name, kind, candidates, options, column, config).map(Some)
    }

    /// Calibrates `candidates` against one column of the sample.
    ///
    /// Fails with [`CasterNotFound`](crate::Error::CasterNotFound) when more
    /// values than the tolerance allows are cast by no candidate at all.
    pub fn calibrate<'a, I>(
        field: &str,
        kind: SnifferKind,
        candidates: Vec<Candidate>,
        options: CastOptions,
        column: I,
        config: &SnifferConfig,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = Option<&'a Value>>,
    {
        let calibration = Calibration::run(kind, &candidates, column, &options, config);
        for score in calibration.ranked() {
            debug!(
                "Field '{}' candidate {} cast {}/{} value(s)",
                field,
                score.candidate,
                score.successes,
                calibration.sample_size()
            );
        }

        if !calibration.is_acceptable() {
            return Err(calibration.report(field, kind.field_type()).into());
        }

        let resolution = if calibration.best().is_some() {
            calibration
                .ranked()
                .iter()
                .filter(|score| score.successes > 0)
                .map(|score| score.candidate.clone())
                .collect()
        } else {
            calibration
                .ranked()
                .iter()
                .map(|score| score.candidate.clone())
                .collect()
        };

        let guess = calibration
            .best()
            .map(|score| score.candidate.to_string())
            .unwrap_or_else(|| "undetermined (no raw values sampled)".to_string());
        info!(
            "Caster guess for {} is {}, number of failures = {} (allowed {})",
            field,
            guess,
            calibration.failures(),
            calibration.max_allowed_failures()
        );

        let tolerated = calibration
            .failing_values()
            .iter()
            .map(|value| value.trim().to_string())
            .collect();
        Ok(Self {
            field: field.to_string(),
            kind,
            options,
            calibration,
            resolution,
            tolerated,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn kind(&self) -> SnifferKind {
        self.kind
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Candidates tried at runtime, in order.
    pub fn resolution(&self) -> &[Candidate] {
        &self.resolution
    }

    /// Winning candidate, if the sample determined one.
    pub fn best(&self) -> Option<&Candidate> {
        self.calibration.best().map(|score| &score.candidate)
    }

    /// True when calibration already counted `value` as a failure within tolerance.
    pub fn tolerates(&self, value: &Value) -> bool {
        !self.tolerated.is_empty() && self.tolerated.contains(value.as_display().trim())
    }

    /// Casts one cell with the first candidate in resolution order that accepts it.
    ///
    /// Blank values become `None`; values that already carry the target type
    /// are returned unchanged.
    pub fn cast(&self, value: &Value) -> std::result::Result<Option<Value>, CastError> {
        if value.is_blank() {
            return Ok(None);
        }
        if self.kind.is_target(value) {
            return Ok(Some(value.clone()));
        }
        let Value::String(raw) = value else {
            return Err(CastError::TypeMismatch {
                expected: self.kind.field_type().as_str(),
                found: value.type_name(),
                value: value.as_display(),
            });
        };
        self.resolution
            .iter()
            .find_map(|candidate| try_candidate(candidate, raw, &self.options).ok())
            .map(Some)
            .ok_or_else(|| CastError::Unmatched {
                raw: raw.trim().to_string(),
                tried: self.resolution.len(),
            })
    }
}
