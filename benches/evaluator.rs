//! Benchmarks comparing the two evaluation strategies.
//!
//! Run with: `cargo bench`.
//!
//! Benchmark groups:
//! 1. arithmetic_chain: `1 + 1 + ... + 1`, flat vs recursive, by chain length
//! 2. fold: an `all`-style comprehension over a list, by range size
//! 3. state_reuse: repeated evaluation with and without reusing state

use bumpalo::Bump;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use cairn::{
    RuntimeOptions, SimpleActivation,
    ast::{Expr, ExprFactory, operators},
    functions::{FunctionRegistry, builtins::register_standard_functions},
    plan,
    values::RecordFactory,
};

/// `1 + 1 + ... + 1` with `n` additions.
fn arithmetic_chain(f: &mut ExprFactory, n: usize) -> Expr {
    let mut expr = f.int(1);
    for _ in 0..n {
        let one = f.int(1);
        expr = f.call(operators::ADD, vec![expr, one]);
    }
    expr
}

/// `[0, 1, ..., n-1].all(x, x == x)`
fn fold_over(f: &mut ExprFactory, n: usize) -> Expr {
    let elements = (0..n as i64).map(|i| f.int(i)).collect();
    let range = f.list(elements);
    let x = f.ident("x");
    let x2 = f.ident("x");
    let predicate = f.call(operators::EQUALS, vec![x, x2]);
    f.fold_all("x", range, predicate)
}

fn options_for(depth: usize) -> RuntimeOptions {
    RuntimeOptions {
        max_recursion_depth: depth,
        ..RuntimeOptions::default()
    }
}

fn bench_arithmetic_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("arithmetic_chain");
    for size in [16, 64, 256] {
        group.throughput(Throughput::Elements(size as u64));
        for (strategy, depth) in [("flat", 0), ("recursive", usize::MAX)] {
            group.bench_with_input(
                BenchmarkId::new(strategy, size),
                &size,
                |b, &size| {
                    let arena = Bump::new();
                    let factory = RecordFactory;
                    let options = options_for(depth);
                    let mut registry = FunctionRegistry::new();
                    register_standard_functions(&mut registry, &options);
                    let activation = SimpleActivation::new();
                    let mut f = ExprFactory::new();
                    let expr = arithmetic_chain(&mut f, size);
                    let program = plan(&arena, &registry, &factory, options, &expr).unwrap();
                    let mut state = program.make_state();
                    b.iter(|| {
                        black_box(
                            program
                                .evaluate_with_state(&arena, &activation, &mut state)
                                .unwrap(),
                        )
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_fold(c: &mut Criterion) {
    let mut group = c.benchmark_group("fold");
    for size in [16, 256, 1024] {
        group.throughput(Throughput::Elements(size as u64));
        for (strategy, depth) in [("flat", 0), ("recursive", usize::MAX)] {
            group.bench_with_input(
                BenchmarkId::new(strategy, size),
                &size,
                |b, &size| {
                    let arena = Bump::new();
                    let factory = RecordFactory;
                    let options = options_for(depth);
                    let mut registry = FunctionRegistry::new();
                    register_standard_functions(&mut registry, &options);
                    let activation = SimpleActivation::new();
                    let mut f = ExprFactory::new();
                    let expr = fold_over(&mut f, size);
                    let program = plan(&arena, &registry, &factory, options, &expr).unwrap();
                    let mut state = program.make_state();
                    b.iter(|| {
                        black_box(
                            program
                                .evaluate_with_state(&arena, &activation, &mut state)
                                .unwrap(),
                        )
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_state_reuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("state_reuse");
    let arena = Bump::new();
    let factory = RecordFactory;
    let options = options_for(0);
    let mut registry = FunctionRegistry::new();
    register_standard_functions(&mut registry, &options);
    let activation = SimpleActivation::new();
    let mut f = ExprFactory::new();
    let expr = arithmetic_chain(&mut f, 64);
    let program = plan(&arena, &registry, &factory, options, &expr).unwrap();

    group.bench_function("fresh_state", |b| {
        b.iter(|| black_box(program.evaluate(&arena, &activation).unwrap()))
    });
    group.bench_function("reused_state", |b| {
        let mut state = program.make_state();
        b.iter(|| {
            black_box(
                program
                    .evaluate_with_state(&arena, &activation, &mut state)
                    .unwrap(),
            )
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_arithmetic_chain,
    bench_fold,
    bench_state_reuse
);
criterion_main!(benches);
