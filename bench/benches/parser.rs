use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use gofra::{lexer, parser};
use std::hint::black_box;

mod common;

fn criterion_benchmark(c: &mut Criterion) {
    let input = common::big_program();
    let tokens = lexer::lex_in_new(&input, "big.gof").unwrap();

    c.bench_function("parser", |b| {
        b.iter_batched(
            || tokens.clone(),
            |tokens| black_box(parser::parse(tokens, "big.gof").unwrap()),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
