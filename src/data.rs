//! Cell values and the value caster primitives.
//!
//! [`cast_date`] and [`cast_number`] try one raw string against one candidate
//! format. They are pure and deterministic; a mismatch is reported as a
//! [`CastError`] and nothing else.

use std::{borrow::Cow, fmt, str::FromStr};

use chrono::{
    Datelike, NaiveDate,
    format::{Parsed, StrftimeItems, parse},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    error::CastError,
    formats::{DateFormat, DateShape, NumberFormat},
};

/// Currency symbols stripped from fields whose format is `currency`.
pub const COMMON_CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Value {
    String(String),
    Date(NaiveDate),
    Number(Decimal),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Number(n) => n.to_string(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Number(_) => "number",
        }
    }

    /// Empty or whitespace-only strings. Typed values are never blank.
    pub fn is_blank(&self) -> bool {
        matches!(self, Value::String(s) if s.trim().is_empty())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Number(value)
    }
}

/// Which currency markers to remove before a number is parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrencyStrip {
    symbol: Option<String>,
    common_symbols: bool,
}

impl CurrencyStrip {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn symbol(symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        Self {
            symbol: (!symbol.trim().is_empty()).then(|| symbol.trim().to_string()),
            common_symbols: false,
        }
    }

    pub fn with_common_symbols(mut self) -> Self {
        self.common_symbols = true;
        self
    }

    pub fn strip<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        let mut value = Cow::Borrowed(raw);
        if let Some(symbol) = self.symbol.as_deref()
            && value.contains(symbol)
        {
            value = Cow::Owned(value.replace(symbol, ""));
        }
        if self.common_symbols && value.contains(COMMON_CURRENCY_SYMBOLS) {
            value = Cow::Owned(value.replace(COMMON_CURRENCY_SYMBOLS, ""));
        }
        value
    }
}

/// Per-field options shared by every candidate tried on that field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastOptions {
    pub currency: CurrencyStrip,
    pub max_fraction_digits: u32,
}

impl Default for CastOptions {
    fn default() -> Self {
        Self {
            currency: CurrencyStrip::none(),
            max_fraction_digits: crate::config::DEFAULT_MAX_FRACTION_DIGITS,
        }
    }
}

/// Parses `raw` with exactly `format`; partial matches are rejected.
pub fn cast_date(raw: &str, format: &DateFormat) -> Result<NaiveDate, CastError> {
    let trimmed = raw.trim();
    let mismatch = || CastError::DateMismatch {
        raw: trimmed.to_string(),
        pattern: format.pattern().to_string(),
    };
    if trimmed.is_empty() {
        return Err(mismatch());
    }

    let mut parsed = Parsed::default();
    parse(&mut parsed, trimmed, StrftimeItems::new(format.strftime())).map_err(|_| mismatch())?;
    match format.shape() {
        DateShape::Day => {}
        DateShape::Month => parsed.set_day(1).map_err(|_| mismatch())?,
        DateShape::Year => {
            parsed.set_month(1).map_err(|_| mismatch())?;
            parsed.set_day(1).map_err(|_| mismatch())?;
        }
    }
    let date = parsed.to_naive_date().map_err(|_| mismatch())?;

    if format.has_four_digit_year() && !(1000..=9999).contains(&date.year()) {
        return Err(CastError::YearOutOfRange {
            raw: trimmed.to_string(),
            pattern: format.pattern().to_string(),
        });
    }
    Ok(date)
}

/// Rejects values whose separators contradict `format` without parsing them.
pub fn pre_cast_check(raw: &str, format: &NumberFormat) -> Result<(), CastError> {
    let decimal = format.decimal_char();
    if raw.matches(decimal).count() > 1 {
        return Err(CastError::RepeatedDecimal {
            raw: raw.to_string(),
            decimal,
        });
    }
    if let (Some(position), Some(group)) = (raw.find(decimal), format.group_char())
        && raw[position + decimal.len_utf8()..].contains(group)
    {
        return Err(CastError::GroupAfterDecimal {
            raw: raw.to_string(),
            decimal,
            group,
        });
    }
    Ok(())
}

/// Rejects casts with more fraction digits than a monetary amount carries.
///
/// Three or more digits after the point usually means the separators were
/// swapped and a thousands group was read as a fraction.
pub fn post_cast_check(raw: &str, value: &Decimal, max_fraction_digits: u32) -> Result<(), CastError> {
    if value.scale() > max_fraction_digits {
        return Err(CastError::TooManyFractionDigits {
            raw: raw.to_string(),
            digits: value.scale(),
            max: max_fraction_digits,
        });
    }
    Ok(())
}

/// Parses `raw` as a decimal written with `format`'s separators.
///
/// Currency markers are stripped first, then the separator pre-cast checks
/// run. A leading sign or surrounding parentheses mark a negative amount.
pub fn cast_number(
    raw: &str,
    format: &NumberFormat,
    currency: &CurrencyStrip,
) -> Result<Decimal, CastError> {
    let stripped = currency.strip(raw.trim());
    let body = stripped.trim();
    let not_numeric = || CastError::NotNumeric {
        raw: raw.trim().to_string(),
    };
    if body.is_empty() {
        return Err(not_numeric());
    }

    pre_cast_check(body, format)?;

    let (negative, unsigned) = split_sign(body);
    let (integer, fraction) = match unsigned.split_once(format.decimal_char()) {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    let integer_digits = ungroup(integer, format.group_char()).ok_or_else(|| {
        match format.group_char() {
            Some(group) if integer.contains(group) => CastError::MisplacedGroup {
                raw: raw.trim().to_string(),
                group,
            },
            _ => not_numeric(),
        }
    })?;
    let fraction_digits = fraction.unwrap_or_default();
    if !fraction_digits.chars().all(|c| c.is_ascii_digit())
        || (integer_digits.is_empty() && fraction_digits.is_empty())
    {
        return Err(not_numeric());
    }

    let mut normalized = String::with_capacity(body.len() + 2);
    if negative {
        normalized.push('-');
    }
    normalized.push_str(if integer_digits.is_empty() { "0" } else { &integer_digits });
    if !fraction_digits.is_empty() {
        normalized.push('.');
        normalized.push_str(fraction_digits);
    }
    Decimal::from_str(&normalized).map_err(|_| not_numeric())
}

fn split_sign(body: &str) -> (bool, &str) {
    if body.len() > 2 && body.starts_with('(') && body.ends_with(')') {
        return (true, body[1..body.len() - 1].trim());
    }
    match body.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, body.strip_prefix('+').unwrap_or(body).trim_start()),
    }
}

/// Removes group separators, requiring thousands grouping when any are present.
fn ungroup(integer: &str, group: Option<char>) -> Option<String> {
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    let Some(group) = group.filter(|g| integer.contains(*g)) else {
        return all_digits(integer).then(|| integer.to_string());
    };

    let mut parts = integer.split(group);
    let leading = parts.next()?;
    if leading.is_empty() || leading.len() > 3 || !all_digits(leading) {
        return None;
    }
    let mut digits = leading.to_string();
    for part in parts {
        if part.len() != 3 || !all_digits(part) {
            return None;
        }
        digits.push_str(part);
    }
    Some(digits)
}
