//! Expression resolution and compilation benchmarks.

use std::collections::HashSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lazyflow::binder::resolve_with;
use lazyflow::compile::{ExpressionCompiler, Interpreter};
use lazyflow::DataType;

fn known(n: usize) -> HashSet<String> {
    (0..n).map(|i| format!("c{i}")).collect()
}

fn sum_expression(n: usize) -> String {
    (0..n).map(|i| format!("c{i}")).collect::<Vec<_>>().join(" + ")
}

fn bench_resolve(c: &mut Criterion) {
    let names = known(8);
    c.bench_function("resolve_simple_cut", |b| {
        b.iter(|| resolve_with(black_box("c0 > 0 && abs(c1) < 2.5"), &names));
    });

    let mut group = c.benchmark_group("resolve_terms");
    for n in [4usize, 16, 64] {
        let names = known(n);
        let expression = sum_expression(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &expression, |b, e| {
            b.iter(|| resolve_with(black_box(e), &names));
        });
    }
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let interpreter = Interpreter::new();
    let parameters = vec![
        ("pt".to_string(), DataType::Float64),
        ("eta".to_string(), DataType::Float64),
    ];
    c.bench_function("compile_kinematic_cut", |b| {
        b.iter(|| {
            interpreter.compile(
                black_box("pt.value() > 25.0 && abs(eta.value()) < 2.5"),
                &parameters,
            )
        });
    });
}

criterion_group!(benches, bench_resolve, bench_compile);
criterion_main!(benches);
