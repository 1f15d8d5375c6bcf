use chrono::{Datelike, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;
use sniffcast::{
    config::{FailureTolerance, SnifferConfig},
    data::{CastOptions, CurrencyStrip, Value, cast_date, cast_number},
    formats::{Candidate, DATE_FORMATS, DateShape, NUMBER_FORMATS, NumberFormat},
    sniffer::{Sniffer, SnifferKind},
};

fn calibrate(kind: SnifferKind, sample: &[Value], config: &SnifferConfig) -> sniffcast::error::Result<Sniffer> {
    Sniffer::calibrate(
        "column",
        kind,
        kind.catalog(),
        CastOptions::default(),
        sample.iter().map(Some),
        config,
    )
}

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (1970i32..=2068, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).expect("valid generated date"))
}

fn decimal_strategy() -> impl Strategy<Value = Decimal> {
    (-999_999_999_999i64..=999_999_999_999, 0u32..=2).prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale))
}

fn sample_strategy() -> impl Strategy<Value = Vec<Value>> {
    proptest::collection::vec(
        prop_oneof![
            Just("2001-02-03"),
            Just("2020-12-31"),
            Just(""),
            Just("31/12/2020"),
            Just("not a date"),
            Just("2020/13/45"),
        ],
        0..20,
    )
    .prop_map(|raw| raw.into_iter().map(Value::from).collect())
}

proptest! {
    #[test]
    fn catalog_dates_cast_back_to_the_written_date(date in date_strategy()) {
        for format in DATE_FORMATS {
            let expected = match format.shape() {
                DateShape::Day => date,
                DateShape::Month => date.with_day(1).expect("first of month"),
                DateShape::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).expect("new year"),
            };
            let rendered = format.format(expected);
            prop_assert_eq!(cast_date(&rendered, format).ok(), Some(expected), "{} via {}", rendered, format);
        }
    }

    #[test]
    fn catalog_numbers_cast_back_to_the_written_amount(value in decimal_strategy()) {
        for format in NUMBER_FORMATS {
            let rendered = format.format(&value);
            let cast = cast_number(&rendered, format, &CurrencyStrip::none());
            prop_assert_eq!(cast.ok(), Some(value), "{} via {}", rendered, format);
        }
    }

    #[test]
    fn typed_values_cast_to_themselves(date in date_strategy(), amount in decimal_strategy()) {
        let empty = Vec::new();
        let dates = calibrate(SnifferKind::Date, &empty, &SnifferConfig::default()).unwrap();
        let numbers = calibrate(SnifferKind::Number, &empty, &SnifferConfig::default()).unwrap();
        prop_assert_eq!(dates.cast(&Value::Date(date)).unwrap(), Some(Value::Date(date)));
        prop_assert_eq!(numbers.cast(&Value::Number(amount)).unwrap(), Some(Value::Number(amount)));
    }

    #[test]
    fn ranking_is_stable_across_runs(sample in sample_strategy()) {
        let config = SnifferConfig::default().with_tolerance(FailureTolerance::Ratio(1.0));
        let first = calibrate(SnifferKind::Date, &sample, &config).unwrap();
        let second = calibrate(SnifferKind::Date, &sample, &config).unwrap();
        prop_assert_eq!(first.calibration(), second.calibration());
        prop_assert_eq!(first.resolution(), second.resolution());
    }

    #[test]
    fn raising_the_tolerance_never_breaks_calibration(sample in sample_strategy(), allowed in 0usize..20) {
        let looser = SnifferConfig::default().with_tolerance(FailureTolerance::Count(allowed + 1));
        let stricter = SnifferConfig::default().with_tolerance(FailureTolerance::Count(allowed));
        if calibrate(SnifferKind::Date, &sample, &stricter).is_ok() {
            prop_assert!(calibrate(SnifferKind::Date, &sample, &looser).is_ok());
        }

        let low = SnifferConfig::default().with_tolerance(FailureTolerance::Ratio(0.1));
        let high = SnifferConfig::default().with_tolerance(FailureTolerance::Ratio(0.5));
        if calibrate(SnifferKind::Date, &sample, &low).is_ok() {
            prop_assert!(calibrate(SnifferKind::Date, &sample, &high).is_ok());
        }
    }
}

#[test]
fn separator_ambiguity_is_resolved_by_position() {
    let european = NumberFormat::new(',', Some('.')).unwrap();
    let english = NumberFormat::new('.', Some(',')).unwrap();
    assert_eq!(
        cast_number("1.234,56", &european, &CurrencyStrip::none()).unwrap(),
        Decimal::new(123456, 2)
    );
    assert!(cast_number("1.234,56", &english, &CurrencyStrip::none()).is_err());
}

#[test]
fn swiss_apostrophe_grouping_is_detected() {
    let sample = ["1'234.50", "12'000", "7.25"]
        .into_iter()
        .map(Value::from)
        .collect::<Vec<_>>();
    let sniffer = calibrate(SnifferKind::Number, &sample, &SnifferConfig::default()).unwrap();
    assert_eq!(
        sniffer.best(),
        Some(&Candidate::Number(NumberFormat::new('.', Some('\'')).unwrap()))
    );
    assert_eq!(
        sniffer.cast(&Value::from("1'234.50")).unwrap(),
        Some(Value::Number(Decimal::new(123450, 2)))
    );
}

#[test]
fn failing_values_are_reported_in_sample_order() {
    let sample = (0..15)
        .map(|idx| Value::from(format!("bad-{idx}")))
        .chain(std::iter::once(Value::from("2020-01-01")))
        .collect::<Vec<_>>();
    let err = calibrate(SnifferKind::Date, &sample, &SnifferConfig::default()).unwrap_err();
    let report = err.caster_not_found().unwrap();
    assert_eq!(report.failures, 15);
    assert_eq!(report.sample_size, 16);
    assert_eq!(report.failing_values.len(), 10);
    assert_eq!(report.failing_values[0], "bad-0");
    assert_eq!(report.failing_values[9], "bad-9");
    assert_eq!(report.tried[0].format, "YYYY-MM-DD");
    assert_eq!(report.tried[0].successes, 1);
    assert_eq!(report.tried.len(), DATE_FORMATS.len());
}
