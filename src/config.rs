//! Sniffer configuration.
//!
//! Supplied by the surrounding pipeline: either built in code, loaded from a
//! YAML file, or assembled from command-line flags (which override the file).
//!
//! ```yaml
//! sample_size: 5000
//! tolerance:
//!   ratio: 0.01
//! currency: "€"
//! max_fraction_digits: 2
//! on_runtime_failure: abort
//! ```

use std::{fs::File, io::BufReader, path::Path};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_SAMPLE_SIZE: usize = 5000;
pub const DEFAULT_MAX_FRACTION_DIGITS: u32 = 2;

/// How many sample values may stay unmatched by every candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureTolerance {
    /// A fixed number of failures; `Count(0)` means every value must cast.
    Count(usize),
    /// A share of the non-empty sample, rounded up.
    Ratio(f64),
}

impl Default for FailureTolerance {
    fn default() -> Self {
        FailureTolerance::Count(0)
    }
}

impl FailureTolerance {
    pub fn max_allowed_failures(&self, sample_size: usize) -> usize {
        match *self {
            FailureTolerance::Count(count) => count,
            FailureTolerance::Ratio(ratio) => (ratio * sample_size as f64).ceil() as usize,
        }
    }

    fn validate(&self) -> Result<()> {
        if let FailureTolerance::Ratio(ratio) = *self
            && !(ratio.is_finite() && (0.0..=1.0).contains(&ratio))
        {
            return Err(Error::Config(format!(
                "failure ratio must be between 0 and 1, got {ratio}"
            )));
        }
        Ok(())
    }
}

/// What to do when a calibrated sniffer cannot cast a later value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "kebab-case")]
pub enum RuntimeFailurePolicy {
    /// Stop processing the resource.
    #[default]
    Abort,
    /// Log a warning and emit an empty cell.
    Null,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SnifferConfig {
    pub sample_size: usize,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub tolerance: FailureTolerance,
    /// Currency symbol stripped from every number field before parsing.
    pub currency: Option<String>,
    pub max_fraction_digits: u32,
    pub on_runtime_failure: RuntimeFailurePolicy,
}

impl Default for SnifferConfig {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            tolerance: FailureTolerance::default(),
            currency: None,
            max_fraction_digits: DEFAULT_MAX_FRACTION_DIGITS,
            on_runtime_failure: RuntimeFailurePolicy::default(),
        }
    }
}

impl SnifferConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let config: SnifferConfig = serde_yaml::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_size == 0 {
            return Err(Error::Config("sample size must be positive".to_string()));
        }
        self.tolerance.validate()
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_tolerance(mut self, tolerance: FailureTolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_runtime_failure_policy(mut self, policy: RuntimeFailurePolicy) -> Self {
        self.on_runtime_failure = policy;
        self
    }
}
