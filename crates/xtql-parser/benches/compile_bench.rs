//! Benchmarks for the XTQL compiler

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use xtql_parser::xtql::Lexer;
use xtql_parser::{compile, compile_to_string};

const PIPELINE: &str = r#"(-> (unify (from :orders [{:xt/id order-id} customer-id total])
                               (left-join (from :customers [{:xt/id customer-id} name]) [name]))
                        (where (> total $min-total) (in? name #{"ALICE" "BOB"}))
                        (order-by {:val total :dir :desc :nulls :last})
                        (limit 100))"#;

fn bench_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");
    group.throughput(Throughput::Bytes(PIPELINE.len() as u64));

    group.bench_function("pipeline", |b| {
        b.iter(|| {
            let tokens: Vec<_> = Lexer::new(black_box(PIPELINE)).collect();
            black_box(tokens)
        })
    });

    group.finish();
}

fn bench_simple_query(c: &mut Criterion) {
    let input = "(from :users [name])";

    let mut group = c.benchmark_group("compile");
    group.throughput(Throughput::Bytes(input.len() as u64));

    group.bench_function("simple_query", |b| {
        b.iter(|| black_box(compile_to_string(black_box(input))))
    });

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    group.throughput(Throughput::Bytes(PIPELINE.len() as u64));

    group.bench_function("pipeline", |b| {
        b.iter(|| black_box(compile(black_box(PIPELINE))))
    });

    group.finish();
}

fn bench_large_rel(c: &mut Criterion) {
    let rows: Vec<String> = (0..10_000)
        .map(|i| format!("{{:id {} :name \"user-{}\" :score {}.5}}", i, i, i % 100))
        .collect();
    let input = format!("(rel [{}] [id name score])", rows.join(" "));

    let mut group = c.benchmark_group("compile");
    group.throughput(Throughput::Bytes(input.len() as u64));
    group.sample_size(20);

    group.bench_function("large_rel", |b| {
        b.iter(|| black_box(compile_to_string(black_box(&input))))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_lexer,
    bench_simple_query,
    bench_pipeline,
    bench_large_rel
);
criterion_main!(benches);
