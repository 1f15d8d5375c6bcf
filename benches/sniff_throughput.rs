use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use sniffcast::config::SnifferConfig;
use sniffcast::data::Value;
use sniffcast::pipeline::{Row, sniff_and_cast};
use sniffcast::schema::{Field, FieldType};

fn generate_projects(rows: usize) -> Vec<Row> {
    (0..rows)
        .map(|i| {
            let day = (i % 28) + 1;
            let month = (i % 12) + 1;
            let mut row = Row::new();
            row.insert("id".to_string(), Some(Value::from(i.to_string())));
            row.insert(
                "approved".to_string(),
                Some(Value::from(format!("{day:02}/{month:02}/2019"))),
            );
            row.insert(
                "amount".to_string(),
                Some(Value::from(format!("{}.{:03},{:02}", i % 900 + 1, i % 1000, i % 100))),
            );
            row
        })
        .collect()
}

fn fields() -> Vec<Field> {
    vec![
        Field::new("id", FieldType::String),
        Field::new("approved", FieldType::Date),
        Field::new("amount", FieldType::Number),
    ]
}

fn bench_sniff_and_cast(c: &mut Criterion) {
    let rows = generate_projects(20_000);
    let fields = fields();
    let mut group = c.benchmark_group("sniff_and_cast");

    for sample_size in [500usize, 5000] {
        let config = SnifferConfig::default().with_sample_size(sample_size);
        group.bench_function(format!("sample_{sample_size}"), |b| {
            b.iter_batched(
                || rows.clone(),
                |rows| {
                    let cast = sniff_and_cast(&fields, rows.into_iter().map(Ok), &config)
                        .expect("calibrate")
                        .count();
                    assert_eq!(cast, 20_000);
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sniff_and_cast);
criterion_main!(benches);
