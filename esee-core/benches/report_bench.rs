//! Criterion benchmarks for the device report parser.
//!
//! Run with:
//! ```bash
//! cargo bench --package esee-core --bench report_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use esee_core::parse_report;

fn full_report(tests_per_eye: usize) -> String {
    let mut report = String::from("ID: 10123456\n15/01/2024 10:30:00\nOD / Right\nTest  Sph    Cyl    Ax   SE\n");
    for n in 1..=tests_per_eye {
        report.push_str(&format!("{} +1.25 -0.50 180 +1.00\n", n));
    }
    report.push_str("OS / Left\nTest  Sph    Cyl    Ax   SE\n");
    for n in 1..=tests_per_eye {
        report.push_str(&format!("{} -2.00 -0.75 +2.38\n", n));
    }
    report.push_str("------------------------\nAurolab E-SEE\nS/N: ES2024001\n");
    report
}

fn bench_parse(c: &mut Criterion) {
    let typical = full_report(3);
    let large = full_report(200).replace('\n', "\r\n");

    c.bench_function("parse_report/typical", |b| {
        b.iter(|| parse_report(black_box(&typical)))
    });
    c.bench_function("parse_report/large_crlf", |b| {
        b.iter(|| parse_report(black_box(&large)))
    });
    c.bench_function("parse_report/garbage", |b| {
        b.iter(|| parse_report(black_box("no report here\r\nstill nothing\r\n")))
    });
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
