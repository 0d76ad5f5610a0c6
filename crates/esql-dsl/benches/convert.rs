//! Conversion benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use esql_dsl::Esql;

const QUERIES: [(&str, &str); 4] = [
    ("match_all", "SELECT * FROM t"),
    (
        "where",
        "SELECT * FROM t WHERE colA = 'x' AND (colB > 10 OR colC IN ('a', 'b')) AND NOT colD LIKE 'abc%' ORDER BY colE DESC LIMIT 100",
    ),
    (
        "group_by",
        "SELECT colA, colB, COUNT(*), AVG(colC) FROM t WHERE colD BETWEEN 1 AND 5 GROUP BY colA, colB ORDER BY AVG(colC) DESC",
    ),
    (
        "having",
        "SELECT colA, SUM(colB) / COUNT(colC) AS ratio FROM t GROUP BY colA HAVING SUM(colB) > 100 AND COUNT(*) >= 2",
    ),
];

fn bench_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert");
    let esql = Esql::new();

    group.throughput(Throughput::Elements(1));
    for (name, sql) in QUERIES.iter() {
        group.bench_function(*name, |b| {
            b.iter(|| black_box(esql.convert(black_box(sql), &[]).unwrap()));
        });
    }

    group.finish();
}

fn bench_convert_pretty(c: &mut Criterion) {
    let esql = Esql::new();
    let (_, sql) = QUERIES[2];

    c.bench_function("convert_pretty_group_by", |b| {
        b.iter(|| black_box(esql.convert_pretty(black_box(sql), &[]).unwrap()));
    });
}

criterion_group!(benches, bench_convert, bench_convert_pretty);
criterion_main!(benches);
