//! Error taxonomy for sniffing and casting.
//!
//! [`CastError`] is the single failure signal of the value caster primitives:
//! one raw value did not match one candidate format. It stays inside the
//! sniffing loop. Everything that reaches a caller is an [`Error`].

use std::io;

use thiserror::Error;

use crate::diagnostics::CasterNotFound;

/// Convenience result type for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A raw value does not match one specific candidate format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CastError {
    #[error("'{raw}' does not match date format {pattern}")]
    DateMismatch { raw: String, pattern: String },

    #[error("'{raw}' parsed with {pattern} has a year outside 1000..=9999")]
    YearOutOfRange { raw: String, pattern: String },

    #[error("'{raw}' contains the decimal separator '{decimal}' more than once")]
    RepeatedDecimal { raw: String, decimal: char },

    #[error("'{raw}' has group separator '{group}' after decimal separator '{decimal}'")]
    GroupAfterDecimal {
        raw: String,
        decimal: char,
        group: char,
    },

    #[error("'{raw}' is not grouped in thousands by '{group}'")]
    MisplacedGroup { raw: String, group: char },

    #[error("'{raw}' is not a number")]
    NotNumeric { raw: String },

    #[error("'{raw}' has {digits} fraction digits (at most {max} allowed)")]
    TooManyFractionDigits { raw: String, digits: u32, max: u32 },

    #[error("expected a {expected} value, found {found} '{value}'")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
        value: String,
    },

    #[error("'{raw}' matches none of the {tried} calibrated format(s)")]
    Unmatched { raw: String, tried: usize },
}

/// Errors surfaced by the sniffer, the pipeline adapter and descriptor loading.
#[derive(Debug, Error)]
pub enum Error {
    /// No candidate format is acceptable for a field during calibration.
    #[error(transparent)]
    CasterNotFound(Box<CasterNotFound>),

    /// A calibrated sniffer could not cast a value after calibration succeeded.
    #[error("Could not cast {field} = {value:?} at row {row}: {reason}")]
    RuntimeCastFailure {
        field: String,
        value: String,
        row: usize,
        reason: String,
    },

    /// The schema declares a type the sniffer does not know.
    #[error("Unsupported field type '{0}' (expected string, date or number)")]
    UnsupportedFieldType(String),

    /// A format hint on a schema field cannot be turned into a candidate.
    #[error("Invalid format hint {hint:?} for field '{field}': {reason}")]
    InvalidFormatHint {
        field: String,
        hint: String,
        reason: String,
    },

    /// Decimal and group separators must differ.
    #[error("Invalid number format: decimal separator '{decimal}' equals group separator")]
    InvalidNumberFormat { decimal: char },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Resource {0} not found in source descriptor")]
    ResourceNotFound(String),

    #[error("Failed to decode text with encoding {0}")]
    Decode(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<CasterNotFound> for Error {
    fn from(value: CasterNotFound) -> Self {
        Error::CasterNotFound(Box::new(value))
    }
}

impl Error {
    /// Diagnostic payload when calibration failed, if this is that error.
    pub fn caster_not_found(&self) -> Option<&CasterNotFound> {
        match self {
            Error::CasterNotFound(report) => Some(report),
            _ => None,
        }
    }
}
