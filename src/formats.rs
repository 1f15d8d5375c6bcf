//! Candidate format catalog.
//!
//! Two static, ordered tables: [`DATE_FORMATS`] and [`NUMBER_FORMATS`]. The
//! order is the preference order used to break ties between candidates that
//! cast the same number of sample values; it never affects which values a
//! candidate accepts.
//!
//! Format hints found on schema fields resolve against these tables:
//!
//! - a date hint is a catalog pattern name (`DD/MM/YYYY`), `fmt:<strftime>`,
//!   or a bare strftime pattern (`%d/%m/%Y`);
//! - a number hint is a `decimalChar` / `groupChar` pair, where an empty
//!   group string means "no grouping".

use std::{borrow::Cow, fmt};

use chrono::{
    NaiveDate,
    format::{Fixed, Item, Numeric, StrftimeItems},
};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// How much of a calendar date a pattern carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateShape {
    /// Year, month and day.
    Day,
    /// Year and month; casts to the first day of the month.
    Month,
    /// Bare year; casts to January 1st.
    Year,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat {
    pattern: Cow<'static, str>,
    strftime: Cow<'static, str>,
    shape: DateShape,
}

impl DateFormat {
    const fn catalog(pattern: &'static str, strftime: &'static str, shape: DateShape) -> Self {
        Self {
            pattern: Cow::Borrowed(pattern),
            strftime: Cow::Borrowed(strftime),
            shape,
        }
    }

    /// Builds a format from a strftime pattern that is not in the catalog.
    pub fn custom(strftime: &str) -> Result<Self> {
        let items = StrftimeItems::new(strftime).collect::<Vec<_>>();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Err(Error::InvalidFormatHint {
                field: String::new(),
                hint: strftime.to_string(),
                reason: "not a valid strftime pattern".to_string(),
            });
        }
        if !items.iter().all(is_date_item) {
            return Err(Error::InvalidFormatHint {
                field: String::new(),
                hint: strftime.to_string(),
                reason: "only date specifiers are allowed, not time or zone".to_string(),
            });
        }
        let has = |spec: &str| strftime.contains(spec);
        let shape = if has("%d") || has("%e") || has("%j") {
            DateShape::Day
        } else if has("%m") || has("%b") || has("%B") {
            DateShape::Month
        } else {
            DateShape::Year
        };
        Ok(Self {
            pattern: Cow::Owned(format!("fmt:{strftime}")),
            strftime: Cow::Owned(strftime.to_string()),
            shape,
        })
    }

    /// Human-readable pattern, e.g. `DD/MM/YYYY`.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn strftime(&self) -> &str {
        &self.strftime
    }

    pub fn shape(&self) -> DateShape {
        self.shape
    }

    /// True when the pattern expects a four-digit year (`%Y`).
    pub fn has_four_digit_year(&self) -> bool {
        self.strftime.contains("%Y")
    }

    /// Renders `date` the way a source file using this convention would.
    pub fn format(&self, date: NaiveDate) -> String {
        date.format(&self.strftime).to_string()
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// A decimal separator paired with an optional group (thousands) separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NumberFormat {
    decimal_char: char,
    group_char: Option<char>,
}

impl NumberFormat {
    const fn catalog(decimal_char: char, group_char: Option<char>) -> Self {
        Self {
            decimal_char,
            group_char,
        }
    }

    /// Rejects pairings where both separators are the same character.
    pub fn new(decimal_char: char, group_char: Option<char>) -> Result<Self> {
        if group_char == Some(decimal_char) {
            return Err(Error::InvalidNumberFormat {
                decimal: decimal_char,
            });
        }
        Ok(Self {
            decimal_char,
            group_char,
        })
    }

    pub fn decimal_char(&self) -> char {
        self.decimal_char
    }

    pub fn group_char(&self) -> Option<char> {
        self.group_char
    }

    /// Group separator as it appears in a schema hint (`""` for none).
    pub fn group_hint(&self) -> String {
        self.group_char.map(String::from).unwrap_or_default()
    }

    /// Renders `value` with this format's separators, grouping by thousands.
    pub fn format(&self, value: &Decimal) -> String {
        let rendered = value.abs().to_string();
        let (integer, fraction) = match rendered.split_once('.') {
            Some((integer, fraction)) => (integer, Some(fraction)),
            None => (rendered.as_str(), None),
        };

        let mut output = String::with_capacity(rendered.len() + integer.len() / 3 + 1);
        if value.is_sign_negative() && !value.is_zero() {
            output.push('-');
        }
        let digits = integer.chars().collect::<Vec<_>>();
        for (idx, digit) in digits.iter().enumerate() {
            let remaining = digits.len() - idx;
            if idx > 0 && remaining % 3 == 0 {
                if let Some(group) = self.group_char {
                    output.push(group);
                }
            }
            output.push(*digit);
        }
        if let Some(fraction) = fraction {
            output.push(self.decimal_char);
            output.push_str(fraction);
        }
        output
    }
}

impl fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "decimalChar='{}' groupChar='{}'",
            self.decimal_char,
            self.group_hint()
        )
    }
}

/// One candidate convention for a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Date(DateFormat),
    Number(NumberFormat),
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Candidate::Date(format) => fmt::Display::fmt(format, f),
            Candidate::Number(format) => fmt::Display::fmt(format, f),
        }
    }
}

impl Serialize for Candidate {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

pub const DATE_FORMATS: &[DateFormat] = &[
    DateFormat::catalog("YYYY-MM-DD", "%Y-%m-%d", DateShape::Day),
    DateFormat::catalog("DD/MM/YYYY", "%d/%m/%Y", DateShape::Day),
    DateFormat::catalog("MM/DD/YYYY", "%m/%d/%Y", DateShape::Day),
    DateFormat::catalog("DD.MM.YYYY", "%d.%m.%Y", DateShape::Day),
    DateFormat::catalog("DD-MM-YYYY", "%d-%m-%Y", DateShape::Day),
    DateFormat::catalog("MM-DD-YYYY", "%m-%d-%Y", DateShape::Day),
    DateFormat::catalog("YYYY/MM/DD", "%Y/%m/%d", DateShape::Day),
    DateFormat::catalog("DD-MMM-YYYY", "%d-%b-%Y", DateShape::Day),
    DateFormat::catalog("DD MMM YYYY", "%d %b %Y", DateShape::Day),
    DateFormat::catalog("DD/MM/YY", "%d/%m/%y", DateShape::Day),
    DateFormat::catalog("MM/DD/YY", "%m/%d/%y", DateShape::Day),
    DateFormat::catalog("DD.MM.YY", "%d.%m.%y", DateShape::Day),
    DateFormat::catalog("DD-MM-YY", "%d-%m-%y", DateShape::Day),
    DateFormat::catalog("MM-DD-YY", "%m-%d-%y", DateShape::Day),
    DateFormat::catalog("DD-MMM-YY", "%d-%b-%y", DateShape::Day),
    DateFormat::catalog("YYYY-MM", "%Y-%m", DateShape::Month),
    DateFormat::catalog("MM/YYYY", "%m/%Y", DateShape::Month),
    DateFormat::catalog("YYYY", "%Y", DateShape::Year),
];

pub const NUMBER_FORMATS: &[NumberFormat] = &[
    NumberFormat::catalog('.', Some(',')),
    NumberFormat::catalog(',', Some('.')),
    NumberFormat::catalog('.', Some(' ')),
    NumberFormat::catalog(',', Some(' ')),
    NumberFormat::catalog('.', None),
    NumberFormat::catalog(',', None),
    NumberFormat::catalog('.', Some('\'')),
    NumberFormat::catalog(',', Some('\'')),
    NumberFormat::catalog('.', Some('`')),
    NumberFormat::catalog(',', Some('`')),
];

pub fn date_candidates() -> Vec<Candidate> {
    DATE_FORMATS.iter().cloned().map(Candidate::Date).collect()
}

pub fn number_candidates() -> Vec<Candidate> {
    NUMBER_FORMATS.iter().copied().map(Candidate::Number).collect()
}

/// Resolves a date `format` hint to a single candidate.
/// Items a [`NaiveDate`] can be formatted and parsed with.
fn is_date_item(item: &Item<'_>) -> bool {
    match item {
        Item::Literal(_) | Item::OwnedLiteral(_) | Item::Space(_) | Item::OwnedSpace(_) => true,
        Item::Numeric(numeric, _) => matches!(
            numeric,
            Numeric::Year
                | Numeric::YearDiv100
                | Numeric::YearMod100
                | Numeric::IsoYear
                | Numeric::IsoYearDiv100
                | Numeric::IsoYearMod100
                | Numeric::Month
                | Numeric::Day
                | Numeric::WeekFromSun
                | Numeric::WeekFromMon
                | Numeric::IsoWeek
                | Numeric::NumDaysFromSun
                | Numeric::WeekdayFromMon
                | Numeric::Ordinal
        ),
        Item::Fixed(fixed) => matches!(
            fixed,
            Fixed::ShortMonthName
                | Fixed::LongMonthName
                | Fixed::ShortWeekdayName
                | Fixed::LongWeekdayName
        ),
        _ => false,
    }
}

pub fn resolve_date_hint(field: &str, hint: &str) -> Result<DateFormat> {
    let trimmed = hint.trim();
    if let Some(known) = DATE_FORMATS.iter().find(|f| f.pattern() == trimmed) {
        return Ok(known.clone());
    }
    let strftime = trimmed.strip_prefix("fmt:").unwrap_or(trimmed);
    if !strftime.contains('%') {
        return Err(Error::InvalidFormatHint {
            field: field.to_string(),
            hint: hint.to_string(),
            reason: "neither a catalog pattern nor a strftime pattern".to_string(),
        });
    }
    DateFormat::custom(strftime).map_err(|err| match err {
        Error::InvalidFormatHint { hint, reason, .. } => Error::InvalidFormatHint {
            field: field.to_string(),
            hint,
            reason,
        },
        other => other,
    })
}

/// Resolves `decimalChar` / `groupChar` hints to the candidates they allow.
///
/// Both hints pin a single format; one hint narrows the catalog to the
/// entries that agree with it.
pub fn resolve_number_hints(
    field: &str,
    decimal: Option<&str>,
    group: Option<&str>,
) -> Result<Vec<NumberFormat>> {
    let decimal = decimal
        .map(|hint| single_char(field, hint, false))
        .transpose()?
        .flatten();
    let group = group
        .map(|hint| single_char(field, hint, true))
        .transpose()?;

    if let (Some(decimal), Some(group)) = (decimal, group) {
        return NumberFormat::new(decimal, group).map(|format| vec![format]);
    }

    let narrowed = NUMBER_FORMATS
        .iter()
        .copied()
        .filter(|format| decimal.is_none_or(|d| format.decimal_char() == d))
        .filter(|format| group.is_none_or(|g| format.group_char() == g))
        .collect::<Vec<_>>();
    if narrowed.is_empty() {
        return Err(Error::InvalidFormatHint {
            field: field.to_string(),
            hint: format!("decimalChar={decimal:?} groupChar={group:?}"),
            reason: "no catalog number format agrees with the hint".to_string(),
        });
    }
    Ok(narrowed)
}

fn single_char(field: &str, hint: &str, allow_empty: bool) -> Result<Option<char>> {
    let mut chars = hint.chars();
    match (chars.next(), chars.next()) {
        (None, _) if allow_empty => Ok(None),
        (Some(ch), None) => Ok(Some(ch)),
        _ => Err(Error::InvalidFormatHint {
            field: field.to_string(),
            hint: hint.to_string(),
            reason: "separator hints must be a single character".to_string(),
        }),
    }
}
