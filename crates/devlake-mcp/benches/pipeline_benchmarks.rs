//! Benchmarks for the CPU-bound pipeline stages
//!
//! Covers query validation and result masking; database round-trips are not measured.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use devlake_mcp::db::{ResultSet, SqlValue};
use devlake_mcp::{Masker, QueryValidator};

const QUERIES: &[(&str, &str)] = &[
    ("simple", "SELECT id, title FROM incidents WHERE status = 'OPEN' LIMIT 50"),
    (
        "join",
        "SELECT i.id, p.name, COUNT(c.id) AS commits FROM incidents i \
         JOIN projects p ON p.id = i.project_id \
         LEFT JOIN commits c ON c.project_id = p.id \
         WHERE i.created_date > NOW() - INTERVAL 30 DAY \
         GROUP BY i.id, p.name ORDER BY commits DESC",
    ),
    ("stacked", "SELECT 1; DROP TABLE users"),
    ("tautology", "SELECT * FROM users WHERE name = '' OR 'a'='a'"),
];

fn incident_rows(count: usize) -> ResultSet {
    let rows = (0..count)
        .map(|i| {
            vec![
                SqlValue::Int(i64::try_from(i).unwrap_or(i64::MAX)),
                SqlValue::Text(format!("Deploy failed for release {i}")),
                SqlValue::Text(format!("user{i}@example.com")),
                SqlValue::Text("token=abc123 contact 555-123-4567".to_string()),
            ]
        })
        .collect();
    ResultSet {
        columns: vec![
            "id".into(),
            "title".into(),
            "reporter_email".into(),
            "notes".into(),
        ],
        rows,
        truncated: false,
        effective_limit: u32::try_from(count).unwrap_or(u32::MAX),
    }
}

fn bench_validate(c: &mut Criterion) {
    let validator = QueryValidator::default();
    let mut group = c.benchmark_group("validate");

    for (name, query) in QUERIES {
        group.throughput(Throughput::Bytes(query.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), query, |b, query| {
            b.iter(|| black_box(validator.validate(black_box(query))));
        });
    }

    group.finish();
}

fn bench_mask_text(c: &mut Criterion) {
    let masker = Masker::new().unwrap();
    let mut group = c.benchmark_group("mask_text");

    group.bench_function("no_match", |b| {
        b.iter(|| black_box(masker.mask_text(black_box("Deployment finished in 42 seconds"))));
    });
    group.bench_function("email", |b| {
        b.iter(|| black_box(masker.mask_text(black_box("assigned to john.doe@example.com"))));
    });

    group.finish();
}

fn bench_mask_result(c: &mut Criterion) {
    let masker = Masker::new().unwrap();
    let mut group = c.benchmark_group("mask_result");

    for rows in [10, 100, 1000] {
        let result = incident_rows(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &result, |b, result| {
            b.iter(|| black_box(masker.mask_result(result.clone())));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_validate, bench_mask_text, bench_mask_result);
criterion_main!(benches);
