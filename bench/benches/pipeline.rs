use criterion::{criterion_group, criterion_main, Criterion};
use gofra::{codegen::Target, compile, CompileOptions};
use std::hint::black_box;

mod common;

fn criterion_benchmark(c: &mut Criterion) {
    let input = common::big_program();
    let mut options = CompileOptions::new(Target::X86_64_LINUX);

    c.bench_function("pipeline", |b| {
        b.iter(|| black_box(compile(black_box(&input), "big.gof", Vec::new(), &options).unwrap()))
    });

    options.optimize = true;
    c.bench_function("pipeline optimized", |b| {
        b.iter(|| black_box(compile(black_box(&input), "big.gof", Vec::new(), &options).unwrap()))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
