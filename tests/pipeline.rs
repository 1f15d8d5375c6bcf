mod common;

use std::{collections::BTreeMap, fs::File, io::BufReader};

use chrono::NaiveDate;
use common::{TestWorkspace, fixture_path, raw_row};
use encoding_rs::UTF_8;
use rust_decimal::Decimal;
use sniffcast::{
    Error,
    config::{FailureTolerance, RuntimeFailurePolicy, SnifferConfig},
    data::Value,
    error::Result,
    io_utils::{CsvRows, open_csv_reader},
    pipeline::{Row, get_casters, sniff_and_cast},
    schema::{FieldType, SourceDescriptor, load_type_lookup},
};

fn fixture_rows() -> CsvRows<BufReader<File>> {
    let file = File::open(fixture_path("projects.csv")).expect("open fixture");
    CsvRows::new(open_csv_reader(BufReader::new(file), b','), UTF_8).expect("read headers")
}

fn fixture_descriptor() -> SourceDescriptor {
    SourceDescriptor::load(&fixture_path("datapackage.yaml")).expect("load descriptor")
}

fn date(y: i32, m: u32, d: u32) -> Option<Value> {
    Some(Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap()))
}

fn number(mantissa: i64, scale: u32) -> Option<Value> {
    Some(Value::Number(Decimal::new(mantissa, scale)))
}

#[test]
fn fixture_resource_is_cast_end_to_end() {
    let descriptor = fixture_descriptor();
    let fields = &descriptor.resource(Some("projects")).unwrap().schema.fields;
    let rows = sniff_and_cast(fields, fixture_rows(), &SnifferConfig::default())
        .unwrap()
        .collect::<Result<Vec<Row>>>()
        .unwrap();

    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0]["project_id"], Some(Value::from("P-001")));
    assert_eq!(rows[0]["total_amount"], number(123456789, 2));
    assert_eq!(rows[0]["eu_cofinancing"], number(61728395, 2));
    assert_eq!(rows[0]["approval_date"], date(2015, 12, 31));
    assert_eq!(rows[0]["end_year"], date(2018, 1, 1));
    assert_eq!(rows[1]["approval_date"], date(2016, 2, 1));
    assert_eq!(rows[2]["total_amount"], number(9805, 1));
    assert_eq!(rows[2]["eu_cofinancing"], None);
    assert_eq!(rows[2]["end_year"], None);
}

#[test]
fn calibration_reports_winning_formats() {
    let descriptor = fixture_descriptor();
    let fields = &descriptor.resource(None).unwrap().schema.fields;
    let sample = fixture_rows().collect::<Result<Vec<Row>>>().unwrap();
    let casters = get_casters(fields, &sample, &SnifferConfig::default()).unwrap();

    let formats = casters
        .sniffers()
        .map(|s| (s.field().to_string(), s.best().map(ToString::to_string)))
        .collect::<BTreeMap<_, _>>();
    assert_eq!(formats.len(), 4);
    assert_eq!(formats["approval_date"].as_deref(), Some("DD/MM/YYYY"));
    assert_eq!(formats["end_year"].as_deref(), Some("YYYY"));
    assert_eq!(
        formats["total_amount"].as_deref(),
        Some("decimalChar=',' groupChar='.'")
    );

    let end_year = casters.sniffer("end_year").unwrap().calibration();
    assert_eq!(end_year.sample_size(), 3);
    assert_eq!(end_year.empty_count(), 1);
    assert!(casters.sniffer("beneficiary_name").is_none());
}

#[test]
fn type_lookup_turns_fields_into_strings() {
    let mut descriptor = fixture_descriptor();
    let lookup = load_type_lookup(&fixture_path("fiscal_types.yaml")).unwrap();
    assert_eq!(lookup["end_year"], FieldType::String);
    descriptor.update_field_types(Some("projects"), &lookup).unwrap();

    let fields = &descriptor.resource(None).unwrap().schema.fields;
    let rows = sniff_and_cast(fields, fixture_rows(), &SnifferConfig::default())
        .unwrap()
        .collect::<Result<Vec<Row>>>()
        .unwrap();
    assert_eq!(rows[0]["end_year"], Some(Value::from("2018")));
    assert_eq!(rows[0]["approval_date"], date(2015, 12, 31));
}

#[test]
fn rows_beyond_the_sample_must_match_the_calibrated_formats() {
    let workspace = TestWorkspace::new();
    let descriptor_path =
        workspace.write_descriptor("datapackage.yaml", &[("id", "string"), ("signed", "date")]);
    let descriptor = SourceDescriptor::load(&descriptor_path).unwrap();
    let fields = &descriptor.resource(None).unwrap().schema.fields;

    let rows = vec![
        raw_row(&[("id", Some("1")), ("signed", Some("2021-03-04"))]),
        raw_row(&[("id", Some("2")), ("signed", Some("2021-03-05"))]),
        raw_row(&[("id", Some("3")), ("signed", Some("05/03/2021"))]),
        raw_row(&[("id", Some("4")), ("signed", Some("2021-03-06"))]),
    ];
    let config = SnifferConfig::default().with_sample_size(2);

    let outcome = sniff_and_cast(fields, rows.clone().into_iter().map(Ok), &config)
        .unwrap()
        .collect::<Vec<_>>();
    assert_eq!(outcome.len(), 3);
    match &outcome[2] {
        Err(Error::RuntimeCastFailure { field, value, row, .. }) => {
            assert_eq!(field, "signed");
            assert_eq!(value, "05/03/2021");
            assert_eq!(*row, 3);
        }
        other => panic!("expected a runtime cast failure, got {other:?}"),
    }

    let lenient = config.with_runtime_failure_policy(RuntimeFailurePolicy::Null);
    let rows = sniff_and_cast(fields, rows.into_iter().map(Ok), &lenient)
        .unwrap()
        .collect::<Result<Vec<Row>>>()
        .unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[2]["signed"], None);
    assert_eq!(rows[3]["signed"], date(2021, 3, 6));
}

#[test]
fn ratio_tolerance_accepts_a_noisy_column() {
    let workspace = TestWorkspace::new();
    let descriptor_path = workspace.write_descriptor("datapackage.yaml", &[("amount", "number")]);
    let descriptor = SourceDescriptor::load(&descriptor_path).unwrap();
    let fields = &descriptor.resource(None).unwrap().schema.fields;

    let mut rows = (1..=19)
        .map(|idx| raw_row(&[("amount", Some(format!("{idx},50").as_str()))]))
        .collect::<Vec<_>>();
    rows.push(raw_row(&[("amount", Some("n/a"))]));

    let strict = sniff_and_cast(fields, rows.clone().into_iter().map(Ok), &SnifferConfig::default());
    assert!(matches!(strict, Err(Error::CasterNotFound(_))));

    let config = SnifferConfig::default().with_tolerance(FailureTolerance::Ratio(0.05));
    assert_eq!(config.on_runtime_failure, RuntimeFailurePolicy::Abort);
    let cast = sniff_and_cast(fields, rows.into_iter().map(Ok), &config)
        .unwrap()
        .collect::<Result<Vec<Row>>>()
        .unwrap();
    assert_eq!(cast[0]["amount"], number(150, 2));
    assert_eq!(cast[19]["amount"], None);
}
