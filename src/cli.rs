use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{FailureTolerance, RuntimeFailurePolicy, SnifferConfig};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Infer date and number conventions of CSV columns and cast them to typed values",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Calibrate every date/number field and report the winning formats
    Sniff(SniffArgs),
    /// Cast a CSV file to typed values using the sniffed formats
    Cast(CastArgs),
}

/// Input and calibration options shared by every subcommand.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Input CSV file (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Source descriptor (YAML or JSON) declaring the resource schema
    #[arg(short = 's', long = "schema")]
    pub schema: PathBuf,
    /// Resource name inside the descriptor (defaults to the first resource)
    #[arg(long)]
    pub resource: Option<String>,
    /// YAML `field: type` lookup applied to the schema before sniffing
    #[arg(long = "types")]
    pub types: Option<PathBuf>,
    /// Sniffer configuration file; flags below override its values
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Number of rows sampled to calibrate each field
    #[arg(long = "sample-rows")]
    pub sample_rows: Option<usize>,
    /// Sample values allowed to match no candidate format
    #[arg(long = "max-failures", conflicts_with = "max_failure_rate")]
    pub max_failures: Option<usize>,
    /// Share of sample values (0..=1) allowed to match no candidate format
    #[arg(long = "max-failure-rate")]
    pub max_failure_rate: Option<f64>,
    /// Currency symbol stripped from number fields before parsing
    #[arg(long)]
    pub currency: Option<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

impl SourceArgs {
    /// Loads `--config` (or defaults) and applies the command-line overrides.
    pub fn sniffer_config(&self) -> Result<SnifferConfig> {
        let mut config = match &self.config {
            Some(path) => SnifferConfig::load(path)
                .with_context(|| format!("Loading sniffer configuration from {path:?}"))?,
            None => SnifferConfig::default(),
        };
        if let Some(sample_rows) = self.sample_rows {
            config = config.with_sample_size(sample_rows);
        }
        if let Some(count) = self.max_failures {
            config = config.with_tolerance(FailureTolerance::Count(count));
        }
        if let Some(ratio) = self.max_failure_rate {
            config = config.with_tolerance(FailureTolerance::Ratio(ratio));
        }
        if let Some(currency) = &self.currency {
            config = config.with_currency(currency.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Args)]
pub struct SniffArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Write the descriptor back with the winning format hints recorded
    #[arg(long = "write-descriptor")]
    pub write_descriptor: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CastArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding for the output file/stdout (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    /// What to do with a value that no calibrated format can cast
    #[arg(long = "on-runtime-failure", value_enum)]
    pub on_runtime_failure: Option<RuntimeFailurePolicy>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "pipe" | "|" => Ok(b'|'),
        "semicolon" | ";" => Ok(b';'),
        other => match other.as_bytes() {
            [] => Err("Delimiter cannot be empty".to_string()),
            [byte] if byte.is_ascii() => Ok(*byte),
            _ if other.chars().count() == 1 => Err("Delimiter must be ASCII".to_string()),
            _ => Err("Delimiter must be a single character".to_string()),
        },
    }
}
