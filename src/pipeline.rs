//! Row pipeline adapter.
//!
//! Wraps one resource's row stream: the first rows are buffered as the
//! calibration sample, one [`Sniffer`] is built per typed field, and then the
//! sample followed by the untouched remainder is cast row by row.

use std::{collections::HashSet, iter::Chain, vec};

use indexmap::IndexMap;
use log::{debug, warn};

use crate::{
    config::{RuntimeFailurePolicy, SnifferConfig},
    data::Value,
    error::{Error, Result},
    schema::Field,
    sniffer::Sniffer,
};

/// One row keyed by column name, in source column order. `None` is an empty cell.
pub type Row = IndexMap<String, Option<Value>>;

/// Pulls at most `size` rows off `rows`, leaving the rest unread.
///
/// Read errors inside the sample abort immediately.
pub fn extract_data_sample<I>(rows: &mut I, size: usize) -> Result<Vec<Row>>
where
    I: Iterator<Item = Result<Row>>,
{
    rows.by_ref().take(size).collect()
}

/// Chains the buffered sample back in front of the remaining rows.
pub fn concatenate_data_sample<I>(
    sample: Vec<Row>,
    rest: I,
) -> Chain<vec::IntoIter<Result<Row>>, I>
where
    I: Iterator<Item = Result<Row>>,
{
    sample
        .into_iter()
        .map(Ok)
        .collect::<Vec<_>>()
        .into_iter()
        .chain(rest)
}

/// The cells of one column across the sample.
pub fn project_column<'a>(sample: &'a [Row], name: &'a str) -> impl Iterator<Item = Option<&'a Value>> + 'a {
    sample
        .iter()
        .map(move |row| row.get(name).and_then(Option::as_ref))
}

/// One sniffer per typed field of a resource, plus the runtime failure policy.
#[derive(Debug, Clone)]
pub struct Casters {
    sniffers: IndexMap<String, Option<Sniffer>>,
    policy: RuntimeFailurePolicy,
}

/// Calibrates every non-string field against the sample.
pub fn get_casters(fields: &[Field], sample: &[Row], config: &SnifferConfig) -> Result<Casters> {
    let mut sniffers = IndexMap::with_capacity(fields.len());
    for field in fields {
        let sniffer = Sniffer::from_field(field, project_column(sample, &field.name), config)?;
        sniffers.insert(field.name.clone(), sniffer);
    }
    debug!(
        "Built {} caster(s) for {} field(s)",
        sniffers.values().filter(|s| s.is_some()).count(),
        fields.len()
    );
    Ok(Casters {
        sniffers,
        policy: config.on_runtime_failure,
    })
}

impl Casters {
    pub fn sniffer(&self, field: &str) -> Option<&Sniffer> {
        self.sniffers.get(field).and_then(Option::as_ref)
    }

    /// Calibrated sniffers in schema order.
    pub fn sniffers(&self) -> impl Iterator<Item = &Sniffer> {
        self.sniffers.values().flatten()
    }

    pub fn policy(&self) -> RuntimeFailurePolicy {
        self.policy
    }

    /// Casts every cell that has a sniffer; other cells pass through.
    ///
    /// `row_index` is zero-based; schema drift is reported on the first row only.
    pub fn cast_values(&self, row: Row, row_index: usize) -> Result<Row> {
        if row_index == 0 {
            self.warn_on_drift(&row);
        }
        row.into_iter()
            .map(|(name, cell)| -> Result<(String, Option<Value>)> {
                let cast = match (self.sniffer(&name), cell) {
                    (Some(sniffer), Some(value)) => self.cast_cell(sniffer, value, row_index)?,
                    (_, cell) => cell,
                };
                Ok((name, cast))
            })
            .collect()
    }

    /// Columns of `row` outside the schema and schema fields absent from `row`.
    pub fn schema_drift(&self, row: &Row) -> SchemaDrift {
        let columns = row.keys().map(String::as_str).collect::<HashSet<_>>();
        SchemaDrift {
            unknown_columns: row
                .keys()
                .filter(|c| !self.sniffers.contains_key(*c))
                .cloned()
                .collect(),
            missing_fields: self
                .sniffers
                .keys()
                .filter(|f| !columns.contains(f.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// The first row and values already tolerated during calibration never abort.
    fn cast_cell(&self, sniffer: &Sniffer, value: Value, row_index: usize) -> Result<Option<Value>> {
        let reason = match sniffer.cast(&value) {
            Ok(cast) => return Ok(cast),
            Err(reason) => reason,
        };
        let lenient = row_index == 0 || sniffer.tolerates(&value);
        if self.policy == RuntimeFailurePolicy::Abort && !lenient {
            return Err(Error::RuntimeCastFailure {
                field: sniffer.field().to_string(),
                value: value.as_display(),
                row: row_index + 1,
                reason: reason.to_string(),
            });
        }
        warn!(
            "Could not cast {} = {:?} at row {}, emitting empty value: {}",
            sniffer.field(),
            value.as_display(),
            row_index + 1,
            reason
        );
        Ok(None)
    }

    fn warn_on_drift(&self, row: &Row) {
        let drift = self.schema_drift(row);
        for column in &drift.unknown_columns {
            warn!("Column '{}' is not declared in the schema", column);
        }
        for field in &drift.missing_fields {
            warn!("Schema field '{}' is missing from the data", field);
        }
    }
}

/// Mismatch between a row's columns and the schema's fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDrift {
    pub unknown_columns: Vec<String>,
    pub missing_fields: Vec<String>,
}

impl SchemaDrift {
    pub fn is_empty(&self) -> bool {
        self.unknown_columns.is_empty() && self.missing_fields.is_empty()
    }
}

/// Streaming cast over a resource's rows.
///
/// Yields rows in input order and stops after the first error.
pub struct CastRows<I> {
    casters: Casters,
    rows: I,
    row_index: usize,
    failed: bool,
}

impl<I> CastRows<I> {
    pub fn casters(&self) -> &Casters {
        &self.casters
    }
}

impl<I> Iterator for CastRows<I>
where
    I: Iterator<Item = Result<Row>>,
{
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let next = self
            .rows
            .next()?
            .and_then(|row| self.casters.cast_values(row, self.row_index));
        self.row_index += 1;
        if next.is_err() {
            self.failed = true;
        }
        Some(next)
    }
}

/// Samples `rows`, calibrates one sniffer per typed field and returns the cast stream.
pub fn sniff_and_cast<I>(
    fields: &[Field],
    mut rows: I,
    config: &SnifferConfig,
) -> Result<CastRows<Chain<vec::IntoIter<Result<Row>>, I>>>
where
    I: Iterator<Item = Result<Row>>,
{
    config.validate()?;
    let sample = extract_data_sample(&mut rows, config.sample_size)?;
    debug!("Sampled {} row(s) for calibration", sample.len());
    let casters = get_casters(fields, &sample, config)?;
    Ok(CastRows {
        casters,
        rows: concatenate_data_sample(sample, rows),
        row_index: 0,
        failed: false,
    })
}
