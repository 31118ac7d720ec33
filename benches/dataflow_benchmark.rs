//! End-to-end dataflow pass benchmarks.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lazyflow::{
    ColumnSpec, Counter, Dataflow, DataflowConfig, Histogram1D, MemoryDataset, QuerySpec,
    ResultRequest, SelectionSpec,
};
use rand::{Rng, SeedableRng};

fn events(rows: usize) -> MemoryDataset {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let pt: Vec<f64> = (0..rows).map(|_| rng.gen_range(0.0..100.0)).collect();
    let eta: Vec<f64> = (0..rows).map(|_| rng.gen_range(-3.0..3.0)).collect();
    MemoryDataset::new()
        .with_column("pt", pt)
        .unwrap()
        .with_column("eta", eta)
        .unwrap()
        .with_partition_size(4096)
}

fn run(rows: usize, threads: usize, varied: bool) {
    let mut df = Dataflow::with_config(DataflowConfig::new().with_threads(threads));
    df.load(events(rows)).unwrap();
    df.define("pt", ColumnSpec::field("pt")).unwrap();
    df.define("eta", ColumnSpec::field("eta")).unwrap();
    if varied {
        df.define("pt_up", ColumnSpec::expression("pt * 1.05")).unwrap();
        df.define("pt_down", ColumnSpec::expression("pt * 0.95"))
            .unwrap();
        df.vary("pt", [("up", "pt_up"), ("down", "pt_down")]).unwrap();
    }
    df.apply("central", SelectionSpec::filter("abs(eta) < 2.5"))
        .unwrap();
    df.apply("hard", SelectionSpec::filter("pt > 25.0")).unwrap();
    df.book("n", QuerySpec::new(Counter), ["central", "hard"])
        .unwrap();
    df.book(
        "pt_hist",
        QuerySpec::new(Histogram1D::new(50, 0.0, 100.0).unwrap()).fill(["pt"]),
        ["hard"],
    )
    .unwrap();
    df.get(&ResultRequest::new("pt_hist", "hard")).unwrap();
}

fn bench_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("dataflow_pass");
    group.sample_size(10);
    for rows in [10_000usize, 100_000] {
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("single", rows), &rows, |b, &rows| {
            b.iter(|| run(rows, 1, false));
        });
        group.bench_with_input(BenchmarkId::new("threads_4", rows), &rows, |b, &rows| {
            b.iter(|| run(rows, 4, false));
        });
        group.bench_with_input(BenchmarkId::new("varied", rows), &rows, |b, &rows| {
            b.iter(|| run(rows, 1, true));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pass);
criterion_main!(benches);
